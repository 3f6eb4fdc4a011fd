use w2v_core::{Element, Error, Matrix, Result};

use crate::operation::{check_arity, check_shape, Operation};

/// Graph input node: holds a tensor supplied from outside and hands it out
/// on forward.
///
/// Takes no inputs and produces no gradients.
#[derive(Clone, Debug, Default)]
pub struct PlaceHolder<T: Element> {
    data: Option<Matrix<T>>,
}

impl<T: Element> PlaceHolder<T> {
    pub const NAME: &'static str = "PlaceHolder";

    pub fn new() -> Self {
        PlaceHolder { data: None }
    }

    /// Replace the held tensor. Returns true if the shape changed (or no
    /// tensor was held before).
    pub fn set_data(&mut self, data: Matrix<T>) -> bool {
        let changed = self.data.as_ref().map(|d| d.shape()) != Some(data.shape());
        self.data = Some(data);
        changed
    }

    pub fn data(&self) -> Option<&Matrix<T>> {
        self.data.as_ref()
    }

    fn require_data(&self) -> Result<&Matrix<T>> {
        self.data.as_ref().ok_or(Error::Uninitialised(Self::NAME))
    }
}

impl<T: Element> Operation<T> for PlaceHolder<T> {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn compute_output_shape(&self, inputs: &[&Matrix<T>]) -> Result<[usize; 2]> {
        check_arity(Self::NAME, inputs, 0)?;
        Ok(*self.require_data()?.shape())
    }

    fn forward(&self, inputs: &[&Matrix<T>], output: &Matrix<T>) -> Result<Matrix<T>> {
        let shape = self.compute_output_shape(inputs)?;
        check_shape(&shape, output.shape())?;
        Ok(self.require_data()?.clone())
    }

    fn backward(
        &mut self,
        inputs: &[&Matrix<T>],
        _error_signal: &Matrix<T>,
    ) -> Result<Vec<Matrix<T>>> {
        check_arity(Self::NAME, inputs, 0)?;
        Ok(Vec::new())
    }
}
