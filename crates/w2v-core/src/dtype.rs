use std::fmt;
use std::ops::{AddAssign, DivAssign, MulAssign, SubAssign};

use num_traits::{Num, NumCast};

// DType: Element types a tensor can hold
//
// Parameters and activations are floats; the integer types exist so index
// tensors (embedding lookups) and exact-arithmetic tests can use the same
// Tensor type. Only signed types are supported: the weight update scales the
// accumulator by -learning_rate, which has no meaning for unsigned storage.

/// Runtime tag for the element type of a tensor.
///
/// Used where the concrete Rust type is erased, e.g. the checkpoint format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DType {
    F32,
    F64,
    I32,
    I64,
}

impl DType {
    /// Size of one element in bytes.
    pub fn size_in_bytes(&self) -> usize {
        match self {
            DType::F32 | DType::I32 => 4,
            DType::F64 | DType::I64 => 8,
        }
    }

    /// Stable one-byte tag used in serialized files.
    pub fn tag(&self) -> u8 {
        match self {
            DType::F32 => 0,
            DType::F64 => 1,
            DType::I32 => 2,
            DType::I64 => 3,
        }
    }

    pub fn from_tag(tag: u8) -> Option<DType> {
        match tag {
            0 => Some(DType::F32),
            1 => Some(DType::F64),
            2 => Some(DType::I32),
            3 => Some(DType::I64),
            _ => None,
        }
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DType::F32 => "f32",
            DType::F64 => "f64",
            DType::I32 => "i32",
            DType::I64 => "i64",
        };
        write!(f, "{}", s)
    }
}

/// Trait implemented by Rust types that can be stored in a tensor.
///
/// Maps the concrete type to its [`DType`] and provides lossy conversion
/// through `f64`, which the generic numeric code (sigmoid, initialisation,
/// serialization) goes through.
pub trait Element:
    Copy
    + Send
    + Sync
    + 'static
    + fmt::Debug
    + PartialOrd
    + Num
    + NumCast
    + AddAssign
    + SubAssign
    + MulAssign
    + DivAssign
{
    /// The corresponding DType enum variant.
    const DTYPE: DType;

    fn as_f64(self) -> f64;

    fn from_f64(v: f64) -> Self;
}

impl Element for f32 {
    const DTYPE: DType = DType::F32;
    fn as_f64(self) -> f64 {
        self as f64
    }
    fn from_f64(v: f64) -> Self {
        v as f32
    }
}

impl Element for f64 {
    const DTYPE: DType = DType::F64;
    fn as_f64(self) -> f64 {
        self
    }
    fn from_f64(v: f64) -> Self {
        v
    }
}

impl Element for i32 {
    const DTYPE: DType = DType::I32;
    fn as_f64(self) -> f64 {
        self as f64
    }
    fn from_f64(v: f64) -> Self {
        v as i32
    }
}

impl Element for i64 {
    const DTYPE: DType = DType::I64;
    fn as_f64(self) -> f64 {
        self as f64
    }
    fn from_f64(v: f64) -> Self {
        v as i64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dtype_size() {
        assert_eq!(DType::F32.size_in_bytes(), 4);
        assert_eq!(DType::F64.size_in_bytes(), 8);
        assert_eq!(DType::I32.size_in_bytes(), 4);
        assert_eq!(DType::I64.size_in_bytes(), 8);
    }

    #[test]
    fn test_tag_roundtrip() {
        for dtype in [DType::F32, DType::F64, DType::I32, DType::I64] {
            assert_eq!(DType::from_tag(dtype.tag()), Some(dtype));
        }
        assert_eq!(DType::from_tag(9), None);
    }

    #[test]
    fn test_element_f32_precision() {
        assert_eq!(f32::DTYPE, DType::F32);
        assert_eq!(f32::from_f64(3.14).as_f64(), 3.140000104904175);
    }

    #[test]
    fn test_integer_truncation() {
        assert_eq!(i32::from_f64(2.9), 2);
        assert_eq!(i64::from_f64(-2.9), -2);
    }
}
