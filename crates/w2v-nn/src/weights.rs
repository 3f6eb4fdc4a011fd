// Weights: Trainable dense parameter
//
// A Weights node has no inputs: forward hands out the parameter tensor
// itself (same storage, no copy), and backward adds the incoming error
// signal into a gradient accumulator of the same shape.
//
// UPDATE RULE:
//
//   step(lr):  acc   <- acc * (-lr)
//              param <- param + acc
//              acc   <- 0
//
// The accumulator is allocated (zeroed) whenever the parameter's shape
// changes through set_data, so the two always have equal shapes.

use log::debug;
use w2v_core::{Element, Error, Matrix, Result};

use crate::init::{initialise, InitConfig};
use crate::operation::{check_arity, check_shape, Operation, Trainable};
use crate::state_dict::StateDict;

/// A trainable `[rows, cols]` parameter with its gradient accumulator.
#[derive(Clone, Debug, Default)]
pub struct Weights<T: Element> {
    parameter: Option<Matrix<T>>,
    gradient_accumulator: Option<Matrix<T>>,
}

impl<T: Element> Weights<T> {
    pub const NAME: &'static str = "Weights";

    /// Weights with no parameter yet; use [`Weights::set_data`] before the
    /// first forward.
    pub fn new() -> Self {
        Weights {
            parameter: None,
            gradient_accumulator: None,
        }
    }

    /// Weights wrapping an existing tensor (shared storage).
    pub fn from_tensor(parameter: Matrix<T>) -> Self {
        let mut w = Self::new();
        w.set_data(parameter);
        w
    }

    /// Fresh `shape` parameter initialised per `config`, with
    /// `fan_in = shape[0]` and `fan_out = shape[1]`.
    pub fn initialised(shape: [usize; 2], config: &InitConfig) -> Result<Self> {
        let parameter = Matrix::new(shape);
        initialise(
            &parameter,
            shape[0],
            shape[1],
            config.init_mode(),
            &mut config.rng(),
        )?;
        Ok(Self::from_tensor(parameter))
    }

    /// Replace the parameter. A zeroed accumulator is allocated if none
    /// exists or its shape differs from the new parameter's. Returns true if
    /// the parameter shape changed.
    pub fn set_data(&mut self, parameter: Matrix<T>) -> bool {
        let shape = *parameter.shape();
        let changed = self.parameter.as_ref().map(|p| *p.shape()) != Some(shape);
        self.parameter = Some(parameter);

        let stale = self
            .gradient_accumulator
            .as_ref()
            .map_or(true, |acc| acc.shape() != &shape);
        if stale {
            debug!("{}: allocating gradient accumulator {:?}", Self::NAME, shape);
            self.gradient_accumulator = Some(Matrix::new(shape));
        }
        changed
    }

    pub fn parameter(&self) -> Option<&Matrix<T>> {
        self.parameter.as_ref()
    }

    pub fn gradient_accumulator(&self) -> Option<&Matrix<T>> {
        self.gradient_accumulator.as_ref()
    }

    /// Parameter and accumulator together, or `Uninitialised` under the
    /// given operation name.
    pub(crate) fn buffers(&self, op: &'static str) -> Result<(&Matrix<T>, &Matrix<T>)> {
        match (&self.parameter, &self.gradient_accumulator) {
            (Some(p), Some(acc)) => Ok((p, acc)),
            _ => Err(Error::Uninitialised(op)),
        }
    }

    pub(crate) fn load_leaf(&mut self, op: &'static str, dict: &StateDict<T>) -> Result<()> {
        let weights = dict.leaf_weights(op)?;
        debug!("{op}: loading state dict {:?}", weights.shape());
        self.set_data(weights.clone());
        Ok(())
    }
}

impl<T: Element> Operation<T> for Weights<T> {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn compute_output_shape(&self, inputs: &[&Matrix<T>]) -> Result<[usize; 2]> {
        check_arity(Self::NAME, inputs, 0)?;
        let (param, _) = self.buffers(Self::NAME)?;
        Ok(*param.shape())
    }

    fn forward(&self, inputs: &[&Matrix<T>], output: &Matrix<T>) -> Result<Matrix<T>> {
        let shape = self.compute_output_shape(inputs)?;
        check_shape(&shape, output.shape())?;
        let (param, _) = self.buffers(Self::NAME)?;
        Ok(param.clone())
    }

    fn backward(
        &mut self,
        inputs: &[&Matrix<T>],
        error_signal: &Matrix<T>,
    ) -> Result<Vec<Matrix<T>>> {
        check_arity(Self::NAME, inputs, 0)?;
        let (_, acc) = self.buffers(Self::NAME)?;
        check_shape(acc.shape(), error_signal.shape())?;
        acc.inline_add(error_signal)?;
        Ok(Vec::new())
    }
}

impl<T: Element> Trainable<T> for Weights<T> {
    fn step(&mut self, learning_rate: T) {
        let Ok((param, acc)) = self.buffers(Self::NAME) else {
            return;
        };
        acc.inline_multiply_scalar(T::zero() - learning_rate);
        // Same shape by construction, so the element counts always agree.
        let _ = param.inline_add(acc);
        acc.fill(T::zero());
    }

    fn state_dict(&self) -> StateDict<T> {
        StateDict {
            weights: self.parameter.clone(),
            ..StateDict::default()
        }
    }

    fn load_state_dict(&mut self, dict: &StateDict<T>) -> Result<()> {
        self.load_leaf(Self::NAME, dict)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::init::WeightsInit;

    fn column(values: &[i32]) -> Matrix<i32> {
        Matrix::from_vec([values.len(), 1], values.to_vec()).unwrap()
    }

    #[test]
    fn test_forward_shares_parameter() {
        let data = column(&[1, -2, 3, -4, 5, -6, 7, -8]);
        let w = Weights::from_tensor(data.clone());
        let out = w.evaluate(&[]).unwrap();
        assert!(out.shares_storage(&data));
        assert_eq!(out.to_vec(), data.to_vec());
    }

    #[test]
    fn test_backward_then_step() {
        let data = column(&[1, -2, 3, -4, 5, -6, 7, -8]);
        let error = column(&[-1, 2, 3, -5, -8, 13, -21, -34]);
        let mut w = Weights::from_tensor(data.clone());

        let grads = w.backward(&[], &error).unwrap();
        assert!(grads.is_empty());
        assert_eq!(data.to_vec(), vec![1, -2, 3, -4, 5, -6, 7, -8]);

        w.step(1);
        assert_eq!(data.to_vec(), vec![2, -4, 0, 1, 13, -19, 28, 26]);
        assert_eq!(w.gradient_accumulator().unwrap().to_vec(), vec![0; 8]);

        w.step(1);
        assert_eq!(data.to_vec(), vec![2, -4, 0, 1, 13, -19, 28, 26]);
    }

    #[test]
    fn test_backward_rejects_inputs_and_bad_shape() {
        let data = column(&[1, 2]);
        let mut w = Weights::from_tensor(data.clone());
        assert!(matches!(
            w.backward(&[&data], &data),
            Err(Error::ArityMismatch { .. })
        ));
        assert!(matches!(
            w.backward(&[], &column(&[1, 2, 3])),
            Err(Error::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_set_data_reallocates_on_shape_change() {
        let mut w = Weights::from_tensor(Matrix::<f32>::new([2, 2]));
        w.backward(&[], &Matrix::full([2, 2], 1.0)).unwrap();

        assert!(!w.set_data(Matrix::full([2, 2], 3.0)));
        assert_eq!(w.gradient_accumulator().unwrap().to_vec(), vec![1.0; 4]);

        assert!(w.set_data(Matrix::new([3, 1])));
        let acc = w.gradient_accumulator().unwrap();
        assert_eq!(acc.shape(), &[3, 1]);
        assert_eq!(acc.to_vec(), vec![0.0; 3]);
    }

    #[test]
    fn test_uninitialised() {
        let mut w = Weights::<f32>::new();
        assert!(matches!(
            w.evaluate(&[]),
            Err(Error::Uninitialised("Weights"))
        ));
        w.step(0.1);
        assert!(w.state_dict().weights.is_none());
    }

    #[test]
    fn test_state_dict_roundtrip() {
        let w = Weights::from_tensor(Matrix::full([2, 3], 0.5f64));
        let dict = w.state_dict();
        assert!(dict.children.is_empty());
        assert!(dict.weights.as_ref().unwrap().shares_storage(w.parameter().unwrap()));

        let mut other = Weights::new();
        other.load_state_dict(&dict).unwrap();
        assert_eq!(other.parameter().unwrap().to_vec(), vec![0.5; 6]);
        assert_eq!(other.gradient_accumulator().unwrap().shape(), &[2, 3]);
    }

    #[test]
    fn test_load_rejects_children() {
        let dict = StateDict::leaf(Matrix::<f32>::new([1, 1]))
            .with_child("x", StateDict::leaf(Matrix::new([1, 1])));
        let mut w = Weights::new();
        assert!(matches!(
            w.load_state_dict(&dict),
            Err(Error::InvalidStateDict(_))
        ));
        assert!(w.parameter().is_none());
    }

    #[test]
    fn test_initialised_zeros() {
        let cfg = InitConfig::new().mode(WeightsInit::Zeros);
        let w = Weights::<f32>::initialised([4, 3], &cfg).unwrap();
        assert_eq!(w.parameter().unwrap().to_vec(), vec![0.0; 12]);
    }

    #[test]
    fn test_initialised_seeded() {
        let cfg = InitConfig::new().seed(11);
        let a = Weights::<f32>::initialised([4, 3], &cfg).unwrap();
        let b = Weights::<f32>::initialised([4, 3], &cfg).unwrap();
        assert_eq!(a.parameter().unwrap().to_vec(), b.parameter().unwrap().to_vec());
    }
}
