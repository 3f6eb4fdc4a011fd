/// All errors that can occur within w2v.
///
/// Precondition violations (wrong arity, mismatched shapes, bad indices) are
/// reported before anything is written, so a failed call never leaves a
/// partial result behind. A single error type is shared by every crate in the
/// workspace so `?` works across crate boundaries.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Shape mismatch between a tensor and the shape an operation requires.
    #[error("shape mismatch: expected {expected:?}, got {got:?}")]
    ShapeMismatch {
        expected: Vec<usize>,
        got: Vec<usize>,
    },

    /// Elementwise operation between tensors of different logical size.
    #[error("element count mismatch in {op}: expected {expected} elements, got {got}")]
    ElementCountMismatch {
        op: &'static str,
        expected: usize,
        got: usize,
    },

    /// Matrix multiplication dimension mismatch.
    #[error("matmul shape mismatch: [{m}x{k1}] @ [{k2}x{n}], inner dims must match")]
    MatmulShapeMismatch {
        m: usize,
        k1: usize,
        k2: usize,
        n: usize,
    },

    /// An operation received the wrong number of inputs.
    #[error("{op} expects {expected} input(s), got {got}")]
    ArityMismatch {
        op: &'static str,
        expected: usize,
        got: usize,
    },

    /// Slice or row lookup past the end of the leading dimension.
    #[error("index {index} out of range for dimension of size {len}")]
    IndexOutOfRange { index: usize, len: usize },

    /// A row-index value that cannot be converted to a row number.
    #[error("invalid row index value {0}")]
    InvalidIndex(f64),

    /// A trainable or placeholder was used before its data was set.
    #[error("{0} has no data set")]
    Uninitialised(&'static str),

    /// Unrecognised weights initialisation mode.
    #[error("unrecognised weights initialisation: {0:?}")]
    UnknownInitialisation(String),

    /// State dictionary does not fit the operation loading it.
    #[error("invalid state dict: {0}")]
    InvalidStateDict(String),

    /// Malformed checkpoint or vector file.
    #[error("invalid format: {0}")]
    InvalidFormat(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Generic message for cases not covered above.
    #[error("{0}")]
    Msg(String),
}

impl Error {
    /// Create an error from any string message.
    pub fn msg(s: impl Into<String>) -> Self {
        Error::Msg(s.into())
    }

    /// Shape mismatch built from two dimension slices.
    pub fn shape_mismatch(expected: &[usize], got: &[usize]) -> Self {
        Error::ShapeMismatch {
            expected: expected.to_vec(),
            got: got.to_vec(),
        }
    }
}

/// Convenience Result type used throughout w2v.
pub type Result<T> = std::result::Result<T, Error>;
