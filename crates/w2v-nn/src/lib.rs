//! # w2v-nn
//!
//! Differentiable operations for training word embeddings.
//!
//! Every operation implements [`Operation`]: `forward()` maps ordered rank-2
//! inputs to one output, `backward()` maps an error signal back to one
//! gradient per input. Operations owning parameters also implement
//! [`Trainable`]:
//!
//! 1. **PlaceHolder**: externally supplied input tensor
//! 2. **Weights**: dense trainable parameter
//! 3. **Embeddings**: lookup table with sparse row updates
//! 4. **MatrixMultiply**: `[m, k] x [k, n] -> [m, n]`
//! 5. **Sigmoid**: elementwise logistic function
//!
//! [`Op`] wraps them in one enum for graph storage, [`StateDict`] exports
//! and imports parameters, and [`init`] holds the initialisation routines.

pub mod activation;
pub mod embeddings;
pub mod init;
pub mod matmul;
pub mod op;
pub mod operation;
pub mod placeholder;
pub mod state_dict;
pub mod weights;

pub use activation::Sigmoid;
pub use embeddings::Embeddings;
pub use init::{initialise, InitConfig, WeightsInit};
pub use matmul::MatrixMultiply;
pub use op::Op;
pub use operation::{Operation, Trainable};
pub use placeholder::PlaceHolder;
pub use state_dict::StateDict;
pub use weights::Weights;
