// Op: Closed set of operations
//
// A computation graph stores its nodes as Op<T> values. Every variant
// implements Operation<T>, and Op<T> forwards each call to the wrapped
// operation. Trainable variants (Weights, Embeddings) are reachable through
// as_trainable / as_trainable_mut; Op::step forwards the update to them and
// does nothing for the rest.

use w2v_core::{Element, Matrix, Result};

use crate::activation::Sigmoid;
use crate::embeddings::Embeddings;
use crate::matmul::MatrixMultiply;
use crate::operation::{Operation, Trainable};
use crate::placeholder::PlaceHolder;
use crate::weights::Weights;

#[derive(Clone, Debug)]
pub enum Op<T: Element> {
    PlaceHolder(PlaceHolder<T>),
    Weights(Weights<T>),
    Embeddings(Embeddings<T>),
    MatrixMultiply(MatrixMultiply),
    Sigmoid(Sigmoid),
}

macro_rules! dispatch {
    ($self:expr, $op:ident => $body:expr) => {
        match $self {
            Op::PlaceHolder($op) => $body,
            Op::Weights($op) => $body,
            Op::Embeddings($op) => $body,
            Op::MatrixMultiply($op) => $body,
            Op::Sigmoid($op) => $body,
        }
    };
}

impl<T: Element> Op<T> {
    pub fn is_trainable(&self) -> bool {
        matches!(self, Op::Weights(_) | Op::Embeddings(_))
    }

    pub fn as_trainable(&self) -> Option<&dyn Trainable<T>> {
        match self {
            Op::Weights(w) => Some(w),
            Op::Embeddings(e) => Some(e),
            _ => None,
        }
    }

    pub fn as_trainable_mut(&mut self) -> Option<&mut dyn Trainable<T>> {
        match self {
            Op::Weights(w) => Some(w),
            Op::Embeddings(e) => Some(e),
            _ => None,
        }
    }

    /// Apply accumulated gradients if this op is trainable.
    pub fn step(&mut self, learning_rate: T) {
        if let Some(t) = self.as_trainable_mut() {
            t.step(learning_rate);
        }
    }
}

impl<T: Element> Operation<T> for Op<T> {
    fn name(&self) -> &'static str {
        dispatch!(self, op => Operation::<T>::name(op))
    }

    fn compute_output_shape(&self, inputs: &[&Matrix<T>]) -> Result<[usize; 2]> {
        dispatch!(self, op => op.compute_output_shape(inputs))
    }

    fn forward(&self, inputs: &[&Matrix<T>], output: &Matrix<T>) -> Result<Matrix<T>> {
        dispatch!(self, op => op.forward(inputs, output))
    }

    fn backward(
        &mut self,
        inputs: &[&Matrix<T>],
        error_signal: &Matrix<T>,
    ) -> Result<Vec<Matrix<T>>> {
        dispatch!(self, op => op.backward(inputs, error_signal))
    }
}

impl<T: Element> From<PlaceHolder<T>> for Op<T> {
    fn from(op: PlaceHolder<T>) -> Self {
        Op::PlaceHolder(op)
    }
}

impl<T: Element> From<Weights<T>> for Op<T> {
    fn from(op: Weights<T>) -> Self {
        Op::Weights(op)
    }
}

impl<T: Element> From<Embeddings<T>> for Op<T> {
    fn from(op: Embeddings<T>) -> Self {
        Op::Embeddings(op)
    }
}

impl<T: Element> From<MatrixMultiply> for Op<T> {
    fn from(op: MatrixMultiply) -> Self {
        Op::MatrixMultiply(op)
    }
}

impl<T: Element> From<Sigmoid> for Op<T> {
    fn from(op: Sigmoid) -> Self {
        Op::Sigmoid(op)
    }
}
