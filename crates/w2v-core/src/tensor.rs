use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::dtype::Element;
use crate::error::{Error, Result};
use crate::layout::{Layout, TensorIterator};

// Tensor: Fixed-rank strided array over shared storage
//
// A Tensor is a Layout (shape, strides, padding, offset) plus a handle to a
// flat storage buffer. The rank is a const generic, so shapes are plain
// arrays and a wrong number of indices is a compile error.
//
// MEMORY MODEL:
//
//   Storage is Arc<RwLock<Vec<T>>>. Cloning a Tensor (the `Clone` trait) is
//   cheap and shallow: both handles see the same elements. `slice()` and
//   `transpose()` are views too; they build a new Layout and share the Arc.
//   Writes through any view are visible through every other view. Only
//   `deep_clone()` allocates new storage.
//
//   Mutating methods take `&self`: the buffer is shared between views by
//   construction, so exclusivity of one handle would not mean exclusivity of
//   the data. Each method holds the lock only for its own duration.
//
// ITERATION:
//
//   Every whole-tensor routine walks logical elements through the layout's
//   TensorIterator rather than flat offsets, so tensors with different
//   strides or padding but equal logical size combine correctly.

/// Shared storage buffer behind one or more tensor views.
pub type Storage<T> = Arc<RwLock<Vec<T>>>;

/// A fixed-rank, strided, padded array of `T`.
///
/// # Example
/// ```
/// use w2v_core::Tensor;
///
/// let t = Tensor::<f32, 2>::new([2, 3]);
/// t.set([1, 2], 5.0);
/// let row = t.slice(1).unwrap();
/// assert_eq!(row.get([2]), 5.0);
/// ```
pub struct Tensor<T: Element, const RANK: usize> {
    storage: Storage<T>,
    layout: Layout<RANK>,
}

/// Rank-2 tensor, the operand type of every operation.
pub type Matrix<T> = Tensor<T, 2>;

/// Rank-1 tensor, e.g. one row of a matrix.
pub type Vector<T> = Tensor<T, 1>;

// Manual Clone: shares storage, never copies elements.
impl<T: Element, const RANK: usize> Clone for Tensor<T, RANK> {
    fn clone(&self) -> Self {
        Tensor {
            storage: Arc::clone(&self.storage),
            layout: self.layout,
        }
    }
}

impl<T: Element, const RANK: usize> fmt::Debug for Tensor<T, RANK> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Tensor(shape={:?}, strides={:?}, padding={:?}, offset={}, dtype={})",
            self.layout.shape(),
            self.layout.strides(),
            self.layout.padding(),
            self.layout.offset(),
            T::DTYPE,
        )
    }
}

impl<T: Element, const RANK: usize> Tensor<T, RANK> {
    // Creation

    /// Zero-filled tensor with the default (aligned) layout.
    pub fn new(shape: [usize; RANK]) -> Self {
        Self::allocate(Layout::new(shape))
    }

    /// Zero-filled tensor with explicit input strides and/or padding.
    /// Omitted values are defaulted exactly as in [`Tensor::new`].
    pub fn with_layout(
        shape: [usize; RANK],
        input_strides: Option<[usize; RANK]>,
        padding: Option<[usize; RANK]>,
    ) -> Self {
        Self::allocate(Layout::with_options(shape, input_strides, padding, 0))
    }

    /// Tensor filled with a constant value.
    pub fn full(shape: [usize; RANK], value: T) -> Self {
        let t = Self::new(shape);
        t.fill(value);
        t
    }

    /// Tensor whose logical elements, in row-major order, are `values`.
    pub fn from_vec(shape: [usize; RANK], values: Vec<T>) -> Result<Self> {
        let t = Self::new(shape);
        if values.len() != t.size() {
            return Err(Error::ElementCountMismatch {
                op: "from_vec",
                expected: t.size(),
                got: values.len(),
            });
        }
        {
            let mut data = t.storage.write();
            for (pos, v) in t.layout.indices().zip(values) {
                data[pos] = v;
            }
        }
        Ok(t)
    }

    /// View over an existing storage buffer. Nothing is allocated.
    ///
    /// Fails if the layout addresses a position past the end of the buffer.
    pub fn from_storage(storage: Storage<T>, layout: Layout<RANK>) -> Result<Self> {
        let len = storage.read().len();
        if layout.size() > 0 {
            let last = layout
                .shape()
                .iter()
                .zip(layout.strides().iter())
                .fold(layout.offset(), |acc, (&n, &s)| acc + (n - 1) * s);
            if last >= len {
                return Err(Error::IndexOutOfRange { index: last, len });
            }
        }
        Ok(Tensor { storage, layout })
    }

    fn allocate(layout: Layout<RANK>) -> Self {
        let layout = layout.with_offset(0);
        Tensor {
            storage: Arc::new(RwLock::new(vec![T::zero(); layout.capacity()])),
            layout,
        }
    }

    /// Create a view sharing this tensor's storage with a different layout.
    fn view_with_layout<const R: usize>(&self, layout: Layout<R>) -> Tensor<T, R> {
        Tensor {
            storage: Arc::clone(&self.storage),
            layout,
        }
    }

    // Accessors

    pub fn shape(&self) -> &[usize; RANK] {
        self.layout.shape()
    }

    pub fn layout(&self) -> &Layout<RANK> {
        &self.layout
    }

    pub fn strides(&self) -> &[usize; RANK] {
        self.layout.strides()
    }

    pub fn padding(&self) -> &[usize; RANK] {
        self.layout.padding()
    }

    pub fn offset(&self) -> usize {
        self.layout.offset()
    }

    pub fn rank(&self) -> usize {
        RANK
    }

    /// Number of logical elements.
    pub fn size(&self) -> usize {
        self.layout.size()
    }

    /// Storage slots spanned by this tensor, padding included.
    pub fn capacity(&self) -> usize {
        self.layout.capacity()
    }

    /// The shared storage handle.
    pub fn storage(&self) -> &Storage<T> {
        &self.storage
    }

    /// Whether two tensors (of any rank) are views over the same buffer.
    pub fn shares_storage<const R: usize>(&self, other: &Tensor<T, R>) -> bool {
        Arc::ptr_eq(&self.storage, &other.storage)
    }

    /// Storage positions of every logical element, row-major.
    pub fn indices(&self) -> TensorIterator<RANK> {
        self.layout.indices()
    }

    // Element access
    //
    // Indices are not validated against the shape; an index past the end of
    // the storage buffer panics, one that lands inside the buffer reads
    // whatever element sits there.

    pub fn get(&self, index: [usize; RANK]) -> T {
        self.storage.read()[self.layout.flat_index(&index)]
    }

    pub fn set(&self, index: [usize; RANK], value: T) {
        self.storage.write()[self.layout.flat_index(&index)] = value;
    }

    /// Logical elements in row-major order.
    pub fn to_vec(&self) -> Vec<T> {
        let data = self.storage.read();
        self.layout.indices().map(|pos| data[pos]).collect()
    }

    // Whole-tensor operations

    pub fn fill(&self, value: T) {
        self.map_inplace(|_| value);
    }

    /// Replace every logical element `x` with `f(x)`.
    pub fn map_inplace(&self, f: impl Fn(T) -> T) {
        let mut data = self.storage.write();
        for pos in self.layout.indices() {
            data[pos] = f(data[pos]);
        }
    }

    /// Fold of all logical elements, left to right, starting from zero.
    pub fn sum(&self) -> T {
        let data = self.storage.read();
        self.layout
            .indices()
            .fold(T::zero(), |acc, pos| acc + data[pos])
    }

    /// Copy into fresh storage with the default layout for this shape.
    /// Padding slots of the source are not carried over.
    pub fn deep_clone(&self) -> Self {
        let copy = Self::new(*self.shape());
        {
            let src = self.storage.read();
            let mut dst = copy.storage.write();
            for (d, s) in copy.layout.indices().zip(self.layout.indices()) {
                dst[d] = src[s];
            }
        }
        copy
    }

    /// Overwrite this tensor's logical elements with `other`'s.
    pub fn copy_from(&self, other: &Self) -> Result<()> {
        self.zip_apply(other, "copy", |dst, src| *dst = src)
    }

    pub fn inline_add(&self, other: &Self) -> Result<()> {
        self.zip_apply(other, "inline_add", |dst, src| *dst += src)
    }

    /// `self += other * alpha`, elementwise.
    pub fn inline_add_scaled(&self, other: &Self, alpha: T) -> Result<()> {
        self.zip_apply(other, "inline_add_scaled", |dst, src| *dst += src * alpha)
    }

    pub fn inline_subtract(&self, other: &Self) -> Result<()> {
        self.zip_apply(other, "inline_subtract", |dst, src| *dst -= src)
    }

    pub fn inline_multiply(&self, other: &Self) -> Result<()> {
        self.zip_apply(other, "inline_multiply", |dst, src| *dst *= src)
    }

    pub fn inline_divide(&self, other: &Self) -> Result<()> {
        self.zip_apply(other, "inline_divide", |dst, src| *dst /= src)
    }

    pub fn inline_add_scalar(&self, value: T) {
        self.map_inplace(|x| x + value);
    }

    pub fn inline_subtract_scalar(&self, value: T) {
        self.map_inplace(|x| x - value);
    }

    pub fn inline_multiply_scalar(&self, value: T) {
        self.map_inplace(|x| x * value);
    }

    pub fn inline_divide_scalar(&self, value: T) {
        self.map_inplace(|x| x / value);
    }

    /// Walk both tensors' logical elements in lockstep, applying
    /// `f(self_elem, other_elem)`.
    ///
    /// Operands sharing one buffer (a tensor and its own slice, say) are
    /// served from a single write lock; each source element is read before
    /// its paired destination is written.
    fn zip_apply(&self, other: &Self, op: &'static str, f: impl Fn(&mut T, T)) -> Result<()> {
        if self.size() != other.size() {
            return Err(Error::ElementCountMismatch {
                op,
                expected: self.size(),
                got: other.size(),
            });
        }

        if self.shares_storage(other) {
            let mut data = self.storage.write();
            for (d, s) in self.layout.indices().zip(other.layout.indices()) {
                let src = data[s];
                f(&mut data[d], src);
            }
        } else {
            let mut dst = self.storage.write();
            let src = other.storage.read();
            for (d, s) in self.layout.indices().zip(other.layout.indices()) {
                f(&mut dst[d], src[s]);
            }
        }
        Ok(())
    }
}

impl<T: Element> Tensor<T, 2> {
    /// Rows and columns swapped, sharing storage. `t.transpose().get([j, i])`
    /// is `t.get([i, j])`, and writes through either view alias.
    pub fn transpose(&self) -> Self {
        self.view_with_layout(self.layout.transpose())
    }
}

macro_rules! impl_slice {
    ($($rank:literal => $lower:literal),* $(,)?) => {$(
        impl<T: Element> Tensor<T, $rank> {
            /// Row `i` along the leading dimension as a view one rank lower.
            ///
            /// The view shares storage; its strides and padding are the
            /// parent's, not recomputed for the smaller shape.
            pub fn slice(&self, i: usize) -> Result<Tensor<T, $lower>> {
                let layout = self.layout.slice_leading::<$lower>(i)?;
                Ok(self.view_with_layout(layout))
            }
        }
    )*};
}

impl_slice!(2 => 1, 3 => 2, 4 => 3, 5 => 4, 6 => 5);

/// Fixed five decimals with explicit sign, tab-separated. For rank > 1 every
/// innermost row ends with a newline, and each completed block of an outer
/// dimension adds one more, so rank 3 prints a blank line after every
/// matrix.
impl<T: Element, const RANK: usize> fmt::Display for Tensor<T, RANK> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // blocks[d]: elements per index step of dimension d
        let mut blocks = [1usize; RANK];
        for d in (0..RANK - 1).rev() {
            blocks[d] = blocks[d + 1] * self.shape()[d + 1];
        }
        for (k, v) in self.to_vec().into_iter().enumerate() {
            write!(f, "{:+.5}\t", v.as_f64())?;
            for d in (0..RANK - 1).rev() {
                if (k + 1) % blocks[d] != 0 {
                    break;
                }
                writeln!(f)?;
            }
        }
        Ok(())
    }
}
