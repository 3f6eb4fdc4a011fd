// Embeddings: Trainable lookup table with sparse updates
//
// The table is a [rows, dims] matrix. Forward takes one input whose
// elements are row indices and gathers those rows, in the input's logical
// order, into a [n, dims] output.
//
// SPARSE UPDATES:
//
// A vocabulary-sized table receives gradient on only a handful of rows per
// batch. backward therefore records which rows it touched, and step walks
// only those rows (ascending), applying
//
//   param[r] += acc[r] * lr
//   acc[r]    = 0
//
// before forgetting the touched set. Note the sign: unlike Weights::step the
// rate is applied as given.

use std::collections::BTreeSet;

use log::trace;
use num_traits::ToPrimitive;
use w2v_core::{Element, Error, Matrix, Result};

use crate::init::InitConfig;
use crate::operation::{check_arity, check_shape, Operation, Trainable};
use crate::state_dict::StateDict;
use crate::weights::Weights;

/// A trainable `[rows, dims]` lookup table.
///
/// # Example
/// ```
/// use w2v_core::Matrix;
/// use w2v_nn::{Embeddings, Operation};
///
/// let table = Matrix::from_vec([3, 2], vec![0.0f32, 0.1, 1.0, 1.1, 2.0, 2.1]).unwrap();
/// let emb = Embeddings::from_tensor(table);
/// let idx = Matrix::from_vec([2, 1], vec![2.0f32, 0.0]).unwrap();
/// let out = emb.evaluate(&[&idx]).unwrap();
/// assert_eq!(out.to_vec(), vec![2.0, 2.1, 0.0, 0.1]);
/// ```
#[derive(Clone, Debug)]
pub struct Embeddings<T: Element> {
    weights: Weights<T>,
    updated_rows: BTreeSet<usize>,
}

impl<T: Element> Embeddings<T> {
    pub const NAME: &'static str = "Embeddings";

    /// Fresh table initialised per `config`, with fans `(rows, dims)`.
    pub fn new(rows: usize, dims: usize, config: &InitConfig) -> Result<Self> {
        Ok(Embeddings {
            weights: Weights::initialised([rows, dims], config)?,
            updated_rows: BTreeSet::new(),
        })
    }

    /// Wrap an existing table. Storage is shared with `table`.
    pub fn from_tensor(table: Matrix<T>) -> Self {
        Embeddings {
            weights: Weights::from_tensor(table),
            updated_rows: BTreeSet::new(),
        }
    }

    /// Replace the table. Pending row updates are dropped if the shape
    /// changes.
    pub fn set_data(&mut self, table: Matrix<T>) -> bool {
        let changed = self.weights.set_data(table);
        if changed {
            self.updated_rows.clear();
        }
        changed
    }

    pub fn table(&self) -> Option<&Matrix<T>> {
        self.weights.parameter()
    }

    pub fn gradient_accumulator(&self) -> Option<&Matrix<T>> {
        self.weights.gradient_accumulator()
    }

    /// Rows with pending gradient, ascending.
    pub fn updated_rows(&self) -> impl Iterator<Item = usize> + '_ {
        self.updated_rows.iter().copied()
    }

    fn table_shape(&self) -> Result<[usize; 2]> {
        let (table, _) = self.weights.buffers(Self::NAME)?;
        Ok(*table.shape())
    }
}

/// Convert every element of `input` to a row number below `rows`.
///
/// Fails on the first value that is negative, non-finite or out of range,
/// so callers can validate everything before writing anything.
fn row_indices<T: Element>(input: &Matrix<T>, rows: usize) -> Result<Vec<usize>> {
    input
        .to_vec()
        .into_iter()
        .map(|v| {
            let index = v.to_usize().ok_or(Error::InvalidIndex(v.as_f64()))?;
            if index >= rows {
                return Err(Error::IndexOutOfRange { index, len: rows });
            }
            Ok(index)
        })
        .collect()
}

impl<T: Element> Operation<T> for Embeddings<T> {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn compute_output_shape(&self, inputs: &[&Matrix<T>]) -> Result<[usize; 2]> {
        check_arity(Self::NAME, inputs, 1)?;
        let [_, dims] = self.table_shape()?;
        Ok([inputs[0].size(), dims])
    }

    fn forward(&self, inputs: &[&Matrix<T>], output: &Matrix<T>) -> Result<Matrix<T>> {
        let shape = self.compute_output_shape(inputs)?;
        check_shape(&shape, output.shape())?;
        let (table, _) = self.weights.buffers(Self::NAME)?;
        let indices = row_indices(inputs[0], table.shape()[0])?;

        for (j, &i) in indices.iter().enumerate() {
            output.slice(j)?.copy_from(&table.slice(i)?)?;
        }
        Ok(output.clone())
    }

    fn backward(
        &mut self,
        inputs: &[&Matrix<T>],
        error_signal: &Matrix<T>,
    ) -> Result<Vec<Matrix<T>>> {
        let shape = self.compute_output_shape(inputs)?;
        check_shape(&shape, error_signal.shape())?;
        let (_, acc) = self.weights.buffers(Self::NAME)?;
        let indices = row_indices(inputs[0], acc.shape()[0])?;

        for (j, &i) in indices.iter().enumerate() {
            acc.slice(i)?.inline_add(&error_signal.slice(j)?)?;
            self.updated_rows.insert(i);
        }
        Ok(vec![error_signal.clone()])
    }
}

impl<T: Element> Trainable<T> for Embeddings<T> {
    fn step(&mut self, learning_rate: T) {
        let Ok((table, acc)) = self.weights.buffers(Self::NAME) else {
            return;
        };
        trace!(
            "{}: applying {} sparse row update(s)",
            Self::NAME,
            self.updated_rows.len()
        );
        for &r in &self.updated_rows {
            let (Ok(param_row), Ok(acc_row)) = (table.slice(r), acc.slice(r)) else {
                continue;
            };
            // Rows of one table have equal length.
            let _ = param_row.inline_add_scaled(&acc_row, learning_rate);
            acc_row.fill(T::zero());
        }
        self.updated_rows.clear();
    }

    fn state_dict(&self) -> StateDict<T> {
        self.weights.state_dict()
    }

    fn load_state_dict(&mut self, dict: &StateDict<T>) -> Result<()> {
        self.weights.load_leaf(Self::NAME, dict)?;
        if let Some(acc) = self.weights.gradient_accumulator() {
            acc.fill(T::zero());
        }
        self.updated_rows.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::init::WeightsInit;

    // Row r, column c holds 10r + c.
    fn table() -> Matrix<i32> {
        let t = Matrix::new([10, 6]);
        for r in 0..10 {
            for c in 0..6 {
                t.set([r, c], (10 * r + c) as i32);
            }
        }
        t
    }

    fn indices(values: &[i32]) -> Matrix<i32> {
        Matrix::from_vec([values.len(), 1], values.to_vec()).unwrap()
    }

    #[test]
    fn test_forward_gathers_rows() {
        let emb = Embeddings::from_tensor(table());
        let out = emb.evaluate(&[&indices(&[3, 5])]).unwrap();
        assert_eq!(out.shape(), &[2, 6]);
        assert_eq!(
            out.to_vec(),
            vec![30, 31, 32, 33, 34, 35, 50, 51, 52, 53, 54, 55]
        );
    }

    #[test]
    fn test_backward_and_step() {
        let t = table();
        let mut emb = Embeddings::from_tensor(t.clone());
        let idx = indices(&[3, 5]);
        let error = Matrix::from_vec([2, 6], (0..12).collect::<Vec<i32>>()).unwrap();

        let grads = emb.backward(&[&idx], &error).unwrap();
        assert_eq!(grads.len(), 1);
        assert!(grads[0].shares_storage(&error));
        assert_eq!(emb.updated_rows().collect::<Vec<_>>(), vec![3, 5]);

        emb.step(1);
        assert_eq!(t.slice(3).unwrap().to_vec(), vec![30, 32, 34, 36, 38, 40]);
        assert_eq!(t.slice(5).unwrap().to_vec(), vec![56, 58, 60, 62, 64, 66]);
        assert_eq!(t.slice(4).unwrap().to_vec(), vec![40, 41, 42, 43, 44, 45]);
        assert_eq!(emb.updated_rows().count(), 0);

        emb.step(1);
        assert_eq!(t.slice(3).unwrap().to_vec(), vec![30, 32, 34, 36, 38, 40]);
        assert_eq!(t.slice(5).unwrap().to_vec(), vec![56, 58, 60, 62, 64, 66]);
    }

    #[test]
    fn test_repeated_index_accumulates() {
        let t = table();
        let mut emb = Embeddings::from_tensor(t.clone());
        let idx = indices(&[2, 2]);
        let error = Matrix::full([2, 6], 1);

        emb.backward(&[&idx], &error).unwrap();
        assert_eq!(emb.updated_rows().collect::<Vec<_>>(), vec![2]);
        emb.step(1);
        assert_eq!(t.slice(2).unwrap().to_vec(), vec![22, 23, 24, 25, 26, 27]);
    }

    #[test]
    fn test_out_of_range_writes_nothing() {
        let emb = Embeddings::from_tensor(table());
        let output = Matrix::full([2, 6], -1);
        assert!(matches!(
            emb.forward(&[&indices(&[1, 10])], &output),
            Err(Error::IndexOutOfRange { index: 10, len: 10 })
        ));
        assert_eq!(output.to_vec(), vec![-1; 12]);
    }

    #[test]
    fn test_negative_index() {
        let mut emb = Embeddings::from_tensor(table());
        let error = Matrix::new([1, 6]);
        assert!(matches!(
            emb.backward(&[&indices(&[-1])], &error),
            Err(Error::InvalidIndex(_))
        ));
        assert_eq!(emb.updated_rows().count(), 0);
    }

    #[test]
    fn test_arity() {
        let emb = Embeddings::from_tensor(table());
        assert!(matches!(
            emb.evaluate(&[]),
            Err(Error::ArityMismatch { expected: 1, got: 0, .. })
        ));
    }

    #[test]
    fn test_load_state_dict_discards_pending_rows() {
        let mut emb = Embeddings::from_tensor(table());
        emb.backward(&[&indices(&[1])], &Matrix::full([1, 6], 1))
            .unwrap();

        let replacement = Matrix::full([10, 6], 0);
        emb.load_state_dict(&StateDict::leaf(replacement.clone()))
            .unwrap();
        assert_eq!(emb.updated_rows().count(), 0);
        assert_eq!(emb.gradient_accumulator().unwrap().to_vec(), vec![0; 60]);
        assert!(emb.table().unwrap().shares_storage(&replacement));
    }

    #[test]
    fn test_new_seeded() {
        let cfg = InitConfig::new().mode(WeightsInit::XavierFanOut).seed(5);
        let a = Embeddings::<f32>::new(20, 4, &cfg).unwrap();
        let b = Embeddings::<f32>::new(20, 4, &cfg).unwrap();
        assert_eq!(a.table().unwrap().shape(), &[20, 4]);
        assert_eq!(a.table().unwrap().to_vec(), b.table().unwrap().to_vec());
    }
}
