//! # w2v-core
//!
//! Tensor primitives for w2v.
//!
//! This crate provides:
//! - [`Tensor`] : fixed-rank strided array over shared storage, with
//!   zero-copy slicing and transpose views
//! - [`Layout`] / [`TensorIterator`] : shape, strides, padding and offset,
//!   and the cursor that walks logical elements through them
//! - [`Element`] / [`DType`] : element types a tensor can hold
//! - [`linalg`] : dense matrix products used by the matrix-multiply op
//! - [`Error`] / [`Result`] : the error type shared by every w2v crate

pub mod dtype;
pub mod error;
pub mod layout;
pub mod linalg;
pub mod tensor;

pub use dtype::{DType, Element};
pub use error::{Error, Result};
pub use layout::{Layout, TensorIterator, DEFAULT_ALIGNMENT};
pub use tensor::{Matrix, Storage, Tensor, Vector};
