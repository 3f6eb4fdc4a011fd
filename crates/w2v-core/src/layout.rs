use crate::error::{Error, Result};

// Layout: Memory layout of a tensor (shape + strides + padding + offset)
//
// The Layout decouples the *logical* shape of a tensor from how its elements
// sit in the flat storage buffer. Slicing and transposing only build a new
// Layout over the same storage, which is what makes them zero-copy.
//
// KEY CONCEPTS:
//
// 1. **Padding**: extra elements appended after each dimension's logical
//    extent. By default only the innermost dimension is padded, just enough
//    to make its span a multiple of DEFAULT_ALIGNMENT elements:
//      shape [10, 6] → padding [0, 2], each row occupies 8 slots
//
// 2. **Input strides**: a caller-supplied step multiplier per dimension
//    (default 1). An input stride of 2 on the last dimension places logical
//    neighbours two slots apart.
//
// 3. **Strides**: derived from the next-inner dimension:
//      strides[last] = input_strides[last]
//      strides[d]    = (strides[d+1] * shape[d+1] + padding[d+1]) * input_strides[d]
//
// 4. **Slice**: dropping the leading dimension keeps every remaining
//    shape/stride/padding entry verbatim and only moves the offset by
//    i * strides[0]. Recomputing strides here would break addressing into
//    the parent's packing.
//
// 5. **Transpose** (rank 2): reverse shape, strides and padding. Same data,
//    read column-major.

/// Alignment, in elements, applied to the innermost dimension by default.
pub const DEFAULT_ALIGNMENT: usize = 8;

/// Layout describes how a tensor's logical shape maps to flat storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Layout<const RANK: usize> {
    shape: [usize; RANK],
    strides: [usize; RANK],
    padding: [usize; RANK],
    input_strides: [usize; RANK],
    /// Offset into the storage buffer where this view's data starts.
    offset: usize,
}

impl<const RANK: usize> Layout<RANK> {
    const NON_SCALAR: () = assert!(RANK > 0, "tensor rank must be at least 1");

    /// Default layout: unit input strides, innermost dimension padded to
    /// [`DEFAULT_ALIGNMENT`], offset 0.
    pub fn new(shape: [usize; RANK]) -> Self {
        Self::with_options(shape, None, None, 0)
    }

    /// Layout with optional input strides and padding.
    ///
    /// Omitted input strides default to 1 in every dimension; omitted padding
    /// is computed from the innermost dimension's span.
    pub fn with_options(
        shape: [usize; RANK],
        input_strides: Option<[usize; RANK]>,
        padding: Option<[usize; RANK]>,
        offset: usize,
    ) -> Self {
        #[allow(clippy::let_unit_value)]
        let () = Self::NON_SCALAR;

        let input_strides = input_strides.unwrap_or([1; RANK]);
        let padding = padding.unwrap_or_else(|| default_padding(&shape, &input_strides));
        let strides = compute_strides(&shape, &input_strides, &padding);
        Layout {
            shape,
            strides,
            padding,
            input_strides,
            offset,
        }
    }

    pub fn shape(&self) -> &[usize; RANK] {
        &self.shape
    }

    /// Derived element step per dimension.
    pub fn strides(&self) -> &[usize; RANK] {
        &self.strides
    }

    pub fn padding(&self) -> &[usize; RANK] {
        &self.padding
    }

    /// The caller-supplied step multipliers this layout was built from.
    pub fn input_strides(&self) -> &[usize; RANK] {
        &self.input_strides
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn rank(&self) -> usize {
        RANK
    }

    /// Number of logical elements.
    pub fn size(&self) -> usize {
        self.shape.iter().product()
    }

    /// Number of storage slots spanned from the offset, padding included.
    pub fn capacity(&self) -> usize {
        (self.strides[0] * self.shape[0] + self.padding[0]).max(1)
    }

    /// Same layout relocated to a different storage offset.
    pub fn with_offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    /// Flat storage position of a multi-dimensional index:
    /// offset + sum(index[i] * stride[i]).
    pub fn flat_index(&self, index: &[usize; RANK]) -> usize {
        index
            .iter()
            .zip(self.strides.iter())
            .fold(self.offset, |acc, (&i, &s)| acc + i * s)
    }

    /// Layout of row `i` along the leading dimension, one rank lower.
    ///
    /// `LOWER` must be `RANK - 1`; this is checked at compile time.
    pub fn slice_leading<const LOWER: usize>(&self, i: usize) -> Result<Layout<LOWER>> {
        #[allow(clippy::let_unit_value)]
        let () = RankStep::<RANK, LOWER>::VALID;

        if i >= self.shape[0] {
            return Err(Error::IndexOutOfRange {
                index: i,
                len: self.shape[0],
            });
        }
        Ok(Layout {
            shape: tail(&self.shape),
            strides: tail(&self.strides),
            padding: tail(&self.padding),
            input_strides: tail(&self.input_strides),
            offset: self.offset + i * self.strides[0],
        })
    }

    /// Storage positions of every logical element, in row-major order.
    pub fn indices(&self) -> TensorIterator<RANK> {
        TensorIterator::new(self)
    }
}

impl Layout<2> {
    /// Swap rows and columns without touching storage.
    pub fn transpose(&self) -> Self {
        Layout {
            shape: reversed(&self.shape),
            strides: reversed(&self.strides),
            padding: reversed(&self.padding),
            input_strides: reversed(&self.input_strides),
            offset: self.offset,
        }
    }
}

struct RankStep<const RANK: usize, const LOWER: usize>;

impl<const RANK: usize, const LOWER: usize> RankStep<RANK, LOWER> {
    const VALID: () = assert!(LOWER + 1 == RANK, "slice must drop exactly one dimension");
}

fn default_padding<const RANK: usize>(
    shape: &[usize; RANK],
    input_strides: &[usize; RANK],
) -> [usize; RANK] {
    let mut padding = [0; RANK];
    let span = input_strides[RANK - 1] * shape[RANK - 1];
    let rem = span % DEFAULT_ALIGNMENT;
    if rem != 0 {
        padding[RANK - 1] = DEFAULT_ALIGNMENT - rem;
    }
    padding
}

fn compute_strides<const RANK: usize>(
    shape: &[usize; RANK],
    input_strides: &[usize; RANK],
    padding: &[usize; RANK],
) -> [usize; RANK] {
    let mut strides = [0; RANK];
    strides[RANK - 1] = input_strides[RANK - 1];
    for d in (0..RANK - 1).rev() {
        strides[d] = (strides[d + 1] * shape[d + 1] + padding[d + 1]) * input_strides[d];
    }
    strides
}

fn tail<const N: usize, const M: usize>(src: &[usize; N]) -> [usize; M] {
    std::array::from_fn(|d| src[d + 1])
}

fn reversed(src: &[usize; 2]) -> [usize; 2] {
    [src[1], src[0]]
}

// TensorIterator: Walks storage positions of a layout in logical order
//
// Strides and padding mean the logical elements of a tensor are not laid out
// back to back. The iterator keeps the current coordinate and storage
// position; stepping the innermost coordinate is a single add, and only when
// it overflows are the outer coordinates carried and the position rebuilt
// from scratch. Padding gaps are skipped because the position is always
// derived from strides, never from a running count.

/// Iterator over the storage positions of every logical element of a layout.
///
/// Holds a snapshot of the layout taken at creation; request a fresh one
/// from the layout or tensor for each pass.
#[derive(Debug, Clone)]
pub struct TensorIterator<const RANK: usize> {
    shape: [usize; RANK],
    strides: [usize; RANK],
    coordinate: [usize; RANK],
    base: usize,
    position: usize,
    remaining: usize,
}

impl<const RANK: usize> TensorIterator<RANK> {
    fn new(layout: &Layout<RANK>) -> Self {
        TensorIterator {
            shape: layout.shape,
            strides: layout.strides,
            coordinate: [0; RANK],
            base: layout.offset,
            position: layout.offset,
            remaining: layout.size(),
        }
    }

    /// Coordinate of the element the next call to `next()` yields.
    pub fn coordinate(&self) -> &[usize; RANK] {
        &self.coordinate
    }

    fn advance(&mut self) {
        let last = RANK - 1;
        self.coordinate[last] += 1;
        self.position += self.strides[last];
        if self.coordinate[last] < self.shape[last] {
            return;
        }

        let mut d = last;
        while d > 0 && self.coordinate[d] >= self.shape[d] {
            self.coordinate[d] = 0;
            self.coordinate[d - 1] += 1;
            d -= 1;
        }
        self.position = self.base;
        for d in 0..last {
            self.position += self.coordinate[d] * self.strides[d];
        }
    }
}

impl<const RANK: usize> Iterator for TensorIterator<RANK> {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        if self.remaining == 0 {
            return None;
        }
        let current = self.position;
        self.remaining -= 1;
        if self.remaining > 0 {
            self.advance();
        }
        Some(current)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<const RANK: usize> ExactSizeIterator for TensorIterator<RANK> {}

impl<const RANK: usize> std::iter::FusedIterator for TensorIterator<RANK> {}
