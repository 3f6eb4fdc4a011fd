// Operation: The interface every differentiable node implements
//
// An operation maps an ordered list of rank-2 inputs to one rank-2 output
// (forward) and maps an error signal on that output back to one gradient per
// input (backward). Input order encodes role: for MatrixMultiply the first
// input is the left operand, the second the right.
//
// forward() writes into a caller-provided buffer whose shape must equal
// compute_output_shape(inputs); evaluate() allocates that buffer for you.
// Parameter-producing operations (PlaceHolder, Weights) return their own
// tensor instead of copying into the buffer.
//
// Operations that own parameters additionally implement Trainable: backward
// accumulates into a private gradient buffer and step() applies and clears
// it. backward and step both take `&mut self`, so a step can never run while
// a backward on the same operation is in flight.

use w2v_core::{Element, Error, Matrix, Result};

use crate::state_dict::StateDict;

/// A differentiable node over rank-2 tensors.
pub trait Operation<T: Element> {
    /// Descriptor of the operation kind, e.g. `"Weights"`.
    fn name(&self) -> &'static str;

    /// Output shape produced for these inputs. Pure.
    fn compute_output_shape(&self, inputs: &[&Matrix<T>]) -> Result<[usize; 2]>;

    /// Compute the output for `inputs` into `output`.
    ///
    /// `output.shape()` must equal `compute_output_shape(inputs)`. Inputs are
    /// never modified.
    fn forward(&self, inputs: &[&Matrix<T>], output: &Matrix<T>) -> Result<Matrix<T>>;

    /// Forward pass into a freshly allocated output buffer.
    fn evaluate(&self, inputs: &[&Matrix<T>]) -> Result<Matrix<T>> {
        let shape = self.compute_output_shape(inputs)?;
        let output = Matrix::new(shape);
        self.forward(inputs, &output)
    }

    /// Gradients of the loss with respect to each input, in input order.
    ///
    /// `error_signal` is the gradient with respect to this operation's
    /// output. Trainable operations also fold it into their accumulator.
    fn backward(&mut self, inputs: &[&Matrix<T>], error_signal: &Matrix<T>)
        -> Result<Vec<Matrix<T>>>;
}

/// An operation owning parameters that are updated by gradient steps.
pub trait Trainable<T: Element> {
    /// Apply the accumulated gradient once, scaled by `learning_rate`, and
    /// reset the accumulator. Parameters are unchanged if nothing was
    /// accumulated since the last step.
    fn step(&mut self, learning_rate: T);

    /// Export parameters. The returned tensors share storage with the
    /// live parameters.
    fn state_dict(&self) -> StateDict<T>;

    /// Replace parameters from a dictionary.
    fn load_state_dict(&mut self, dict: &StateDict<T>) -> Result<()>;
}

pub(crate) fn check_arity<T: Element>(
    op: &'static str,
    inputs: &[&Matrix<T>],
    expected: usize,
) -> Result<()> {
    if inputs.len() != expected {
        return Err(Error::ArityMismatch {
            op,
            expected,
            got: inputs.len(),
        });
    }
    Ok(())
}

pub(crate) fn check_shape(expected: &[usize; 2], got: &[usize; 2]) -> Result<()> {
    if expected != got {
        return Err(Error::shape_mismatch(expected, got));
    }
    Ok(())
}
