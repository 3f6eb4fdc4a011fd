// init: Parameter initialisation
//
// Weights start either at zero or drawn i.i.d. from N(0, factor), where the
// normalising factor follows Glorot & Bengio (2010):
//
//   zeros            all elements 0
//   xavier_glorot    factor = sqrt(2 / (fan_in + fan_out))
//   xavier_fan_in    factor = sqrt(1 / fan_in)
//   xavier_fan_out   factor = sqrt(1 / fan_out)
//
// For a [rows, cols] parameter, fan_in = rows and fan_out = cols.
//
// RANDOMNESS:
//
// The random source is always injected. `initialise` takes any `Rng`;
// `InitConfig::rng()` derives one from an optional seed, so a seeded config
// reproduces the same parameters run after run and an unseeded one draws
// from OS entropy.

use std::fmt;
use std::str::FromStr;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};
use w2v_core::{Element, Error, Result, Tensor};

/// Which initialisation routine to apply to fresh parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum WeightsInit {
    Zeros,
    #[default]
    XavierGlorot,
    XavierFanIn,
    XavierFanOut,
}

impl WeightsInit {
    /// Standard deviation of the sampling distribution, `None` for `Zeros`.
    pub fn normalising_factor(&self, fan_in: usize, fan_out: usize) -> Option<f64> {
        match self {
            WeightsInit::Zeros => None,
            WeightsInit::XavierGlorot => Some((2.0 / (fan_in + fan_out) as f64).sqrt()),
            WeightsInit::XavierFanIn => Some((1.0 / fan_in as f64).sqrt()),
            WeightsInit::XavierFanOut => Some((1.0 / fan_out as f64).sqrt()),
        }
    }

    fn as_str(&self) -> &'static str {
        match self {
            WeightsInit::Zeros => "zeros",
            WeightsInit::XavierGlorot => "xavier_glorot",
            WeightsInit::XavierFanIn => "xavier_fan_in",
            WeightsInit::XavierFanOut => "xavier_fan_out",
        }
    }
}

impl fmt::Display for WeightsInit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WeightsInit {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "zeros" => Ok(WeightsInit::Zeros),
            "xavier_glorot" => Ok(WeightsInit::XavierGlorot),
            "xavier_fan_in" => Ok(WeightsInit::XavierFanIn),
            "xavier_fan_out" => Ok(WeightsInit::XavierFanOut),
            other => Err(Error::UnknownInitialisation(other.to_string())),
        }
    }
}

/// Initialisation settings for fresh parameters.
///
/// ```
/// use w2v_nn::init::{InitConfig, WeightsInit};
///
/// let cfg = InitConfig::new().mode(WeightsInit::XavierFanIn).seed(42);
/// assert_eq!(cfg.seed_value(), Some(42));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct InitConfig {
    mode: WeightsInit,
    seed: Option<u64>,
}

impl InitConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mode(mut self, mode: WeightsInit) -> Self {
        self.mode = mode;
        self
    }

    /// Fix the random seed for reproducible initialisation.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn init_mode(&self) -> WeightsInit {
        self.mode
    }

    pub fn seed_value(&self) -> Option<u64> {
        self.seed
    }

    /// Random source for this config: seeded if a seed was set, otherwise
    /// from entropy.
    pub fn rng(&self) -> StdRng {
        match self.seed {
            Some(s) => StdRng::seed_from_u64(s),
            None => StdRng::from_entropy(),
        }
    }
}

/// Initialise `tensor` in place according to `mode`.
///
/// Logical elements are written in iteration order, one sample each;
/// padding is left untouched.
pub fn initialise<T: Element, const RANK: usize>(
    tensor: &Tensor<T, RANK>,
    fan_in: usize,
    fan_out: usize,
    mode: WeightsInit,
    rng: &mut impl Rng,
) -> Result<()> {
    match mode.normalising_factor(fan_in, fan_out) {
        None => tensor.fill(T::zero()),
        Some(std) => {
            let normal = Normal::new(0.0, std).map_err(|e| {
                Error::msg(format!("bad normalising factor {std} for {mode}: {e}"))
            })?;
            let mut data = tensor.storage().write();
            for pos in tensor.indices() {
                data[pos] = T::from_f64(normal.sample(rng));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalising_factors() {
        let close = |a: f64, b: f64| (a - b).abs() < 1e-12;
        assert!(close(
            WeightsInit::XavierGlorot.normalising_factor(10, 6).unwrap(),
            (2.0f64 / 16.0).sqrt()
        ));
        assert!(close(
            WeightsInit::XavierFanIn.normalising_factor(4, 100).unwrap(),
            0.5
        ));
        assert!(close(
            WeightsInit::XavierFanOut.normalising_factor(100, 25).unwrap(),
            0.2
        ));
        assert_eq!(WeightsInit::Zeros.normalising_factor(3, 3), None);
    }

    #[test]
    fn test_parse_and_display() {
        for mode in [
            WeightsInit::Zeros,
            WeightsInit::XavierGlorot,
            WeightsInit::XavierFanIn,
            WeightsInit::XavierFanOut,
        ] {
            assert_eq!(mode.to_string().parse::<WeightsInit>().unwrap(), mode);
        }
        assert!(matches!(
            "he_normal".parse::<WeightsInit>(),
            Err(Error::UnknownInitialisation(s)) if s == "he_normal"
        ));
    }

    #[test]
    fn test_zeros_fill() {
        let t = Tensor::<f32, 2>::full([3, 4], 7.0);
        let mut rng = StdRng::seed_from_u64(0);
        initialise(&t, 3, 4, WeightsInit::Zeros, &mut rng).unwrap();
        assert_eq!(t.to_vec(), vec![0.0; 12]);
    }

    #[test]
    fn test_seeded_reproducible() {
        let cfg = InitConfig::new().seed(7);
        let a = Tensor::<f64, 2>::new([5, 6]);
        let b = Tensor::<f64, 2>::new([5, 6]);
        initialise(&a, 5, 6, cfg.init_mode(), &mut cfg.rng()).unwrap();
        initialise(&b, 5, 6, cfg.init_mode(), &mut cfg.rng()).unwrap();
        assert_eq!(a.to_vec(), b.to_vec());
        assert!(a.to_vec().iter().any(|&x| x != 0.0));
    }

    #[test]
    fn test_sample_spread() {
        let t = Tensor::<f64, 2>::new([200, 50]);
        let mut rng = StdRng::seed_from_u64(3);
        initialise(&t, 200, 50, WeightsInit::XavierGlorot, &mut rng).unwrap();

        let v = t.to_vec();
        let n = v.len() as f64;
        let mean = v.iter().sum::<f64>() / n;
        let var = v.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n;
        assert!(mean.abs() < 0.01, "mean {mean}");
        assert!((var - 2.0 / 250.0).abs() < 0.001, "var {var}");
    }

    #[test]
    fn test_padding_untouched() {
        let t = Tensor::<f32, 2>::new([2, 3]);
        let mut rng = StdRng::seed_from_u64(1);
        initialise(&t, 2, 3, WeightsInit::XavierFanIn, &mut rng).unwrap();
        let data = t.storage().read();
        assert_eq!(&data[3..8], &[0.0; 5]);
    }
}
