// Activation operations
//
// Sigmoid: σ(x) = 1 / (1 + e^(-x)), elementwise, with derivative
// σ'(x) = σ(x) · (1 - σ(x)).
//
// The exponential is evaluated in f64 and converted back to the element
// type, so the same code serves f32 and f64 tensors.

use w2v_core::{Element, Matrix, Result};

use crate::operation::{check_arity, check_shape, Operation};

/// Elementwise logistic sigmoid.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Sigmoid;

impl Sigmoid {
    pub const NAME: &'static str = "Sigmoid";

    pub fn new() -> Self {
        Sigmoid
    }
}

fn sigmoid<T: Element>(x: T) -> T {
    T::from_f64(1.0 / (1.0 + (-x.as_f64()).exp()))
}

impl<T: Element> Operation<T> for Sigmoid {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn compute_output_shape(&self, inputs: &[&Matrix<T>]) -> Result<[usize; 2]> {
        check_arity(Self::NAME, inputs, 1)?;
        Ok(*inputs[0].shape())
    }

    fn forward(&self, inputs: &[&Matrix<T>], output: &Matrix<T>) -> Result<Matrix<T>> {
        let shape = Operation::<T>::compute_output_shape(self, inputs)?;
        check_shape(&shape, output.shape())?;
        output.copy_from(inputs[0])?;
        output.map_inplace(sigmoid);
        Ok(output.clone())
    }

    fn backward(
        &mut self,
        inputs: &[&Matrix<T>],
        error_signal: &Matrix<T>,
    ) -> Result<Vec<Matrix<T>>> {
        let shape = Operation::<T>::compute_output_shape(self, inputs)?;
        check_shape(&shape, error_signal.shape())?;

        let s = self.evaluate(inputs)?;
        let grad = Matrix::full(shape, T::one());
        grad.inline_subtract(&s)?;
        grad.inline_multiply(&s)?;
        grad.inline_multiply(error_signal)?;
        Ok(vec![grad])
    }
}
