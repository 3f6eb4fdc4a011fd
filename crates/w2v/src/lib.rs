//! # w2v
//!
//! Tensor and autodiff core for training word2vec-style embeddings.
//!
//! This is the top-level facade crate that re-exports everything you need.
//!
//! ## Usage
//!
//! ```rust
//! use w2v::prelude::*;
//!
//! let table = Matrix::<f32>::new([4, 3]);
//! let mut emb = Embeddings::from_tensor(table);
//! let idx = Matrix::from_vec([1, 1], vec![2.0f32]).unwrap();
//! let out = emb.evaluate(&[&idx]).unwrap();
//! emb.backward(&[&idx], &out).unwrap();
//! emb.step(0.1);
//! ```
//!
//! ## Architecture
//!
//! | Crate | Purpose |
//! |-------|---------|
//! | `w2v-core` | Tensor, Layout, TensorIterator, Element/DType, matrix kernels, Error |
//! | `w2v-nn` | Operations (PlaceHolder, Weights, Embeddings, MatrixMultiply, Sigmoid), init, StateDict |
//!
//! ## Modules
//!
//! - [`checkpoint`]: save/load state dicts in a binary format
//! - [`vectors`]: write and read trained word vectors

pub mod checkpoint;
pub mod vectors;

/// Re-export core types.
pub use w2v_core::{
    linalg, DType, Element, Error, Layout, Matrix, Result, Storage, Tensor, TensorIterator,
    Vector, DEFAULT_ALIGNMENT,
};

/// Re-export operations.
pub mod nn {
    pub use w2v_nn::*;
}

/// Convenient imports for common usage.
pub mod prelude {
    pub use crate::vectors::{Vocab, VocabEntry, WordVectors};
    pub use w2v_core::{DType, Element, Error, Matrix, Result, Tensor, Vector};
    pub use w2v_nn::{
        Embeddings, InitConfig, MatrixMultiply, Op, Operation, PlaceHolder, Sigmoid, StateDict,
        Trainable, Weights, WeightsInit,
    };
}
