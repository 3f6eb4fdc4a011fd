// MatrixMultiply: [m, k] x [k, n] -> [m, n]
//
// Gradients for out = L · R with upstream error E ([m, n]):
//
//   dL = E  · Rᵀ     [m, k]
//   dR = Lᵀ · E      [k, n]
//
// Both are computed with the accumulating kernels from w2v_core::linalg, so
// backward_into adds into whatever the caller's buffers already hold.

use w2v_core::linalg::{dot, dot_transpose, transpose_dot};
use w2v_core::{Element, Error, Matrix, Result};

use crate::operation::{check_arity, check_shape, Operation};

/// Dense matrix product of two inputs: left operand first.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MatrixMultiply;

impl MatrixMultiply {
    pub const NAME: &'static str = "MatrixMultiply";

    pub fn new() -> Self {
        MatrixMultiply
    }

    /// Accumulate both input gradients into caller buffers.
    ///
    /// `left_grad` must be shaped like the left input and `right_grad` like
    /// the right one. Nothing is zeroed first.
    pub fn backward_into<T: Element>(
        &self,
        inputs: &[&Matrix<T>],
        error_signal: &Matrix<T>,
        left_grad: &Matrix<T>,
        right_grad: &Matrix<T>,
    ) -> Result<()> {
        let shape = self.output_shape(inputs)?;
        check_shape(&shape, error_signal.shape())?;
        let (left, right) = (inputs[0], inputs[1]);
        check_shape(left.shape(), left_grad.shape())?;
        check_shape(right.shape(), right_grad.shape())?;

        dot_transpose(error_signal, right, left_grad)?;
        transpose_dot(left, error_signal, right_grad)?;
        Ok(())
    }

    fn output_shape<T: Element>(&self, inputs: &[&Matrix<T>]) -> Result<[usize; 2]> {
        check_arity(Self::NAME, inputs, 2)?;
        let [m, k1] = *inputs[0].shape();
        let [k2, n] = *inputs[1].shape();
        if k1 != k2 {
            return Err(Error::MatmulShapeMismatch { m, k1, k2, n });
        }
        Ok([m, n])
    }
}

impl<T: Element> Operation<T> for MatrixMultiply {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn compute_output_shape(&self, inputs: &[&Matrix<T>]) -> Result<[usize; 2]> {
        self.output_shape(inputs)
    }

    fn forward(&self, inputs: &[&Matrix<T>], output: &Matrix<T>) -> Result<Matrix<T>> {
        let shape = self.output_shape(inputs)?;
        check_shape(&shape, output.shape())?;
        dot(inputs[0], inputs[1], output)?;
        Ok(output.clone())
    }

    fn backward(
        &mut self,
        inputs: &[&Matrix<T>],
        error_signal: &Matrix<T>,
    ) -> Result<Vec<Matrix<T>>> {
        check_arity(Self::NAME, inputs, 2)?;
        let left_grad = Matrix::new(*inputs[0].shape());
        let right_grad = Matrix::new(*inputs[1].shape());
        self.backward_into(inputs, error_signal, &left_grad, &right_grad)?;
        Ok(vec![left_grad, right_grad])
    }
}
