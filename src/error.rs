use thiserror::Error;

/// Internal consistency failures. Any of these means the layout engine or
/// the writer produced something it cannot stand behind, so the whole
/// operation is aborted.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum InvariantViolation {
    /// A node array grew between two compression passes.
    #[error("node array at index {array} grew from {before} to {after} bytes")]
    SizeIncreased {
        array: usize,
        before: usize,
        after: usize,
    },

    /// A single node grew between two compression passes.
    #[error("node {node} grew from {before} to {after} bytes")]
    NodeSizeIncreased {
        node: usize,
        before: usize,
        after: usize,
    },

    /// The fixed point was not reached within the pass ceiling.
    #[error("address compression did not converge after {0} passes")]
    TooManyPasses(usize),

    /// The writer is not where the layout said the next node starts.
    #[error("write cursor at {actual} but node was placed at {expected}")]
    WriteCursorMismatch { expected: usize, actual: usize },

    /// A node array ended somewhere other than its computed size.
    #[error("node array at {address} wrote {written} bytes, layout says {expected}")]
    ArraySizeMismatch {
        address: usize,
        written: usize,
        expected: usize,
    },

    /// An address needed a width outside 0..=3 bytes.
    #[error("address {0} does not fit in three bytes")]
    AddressSize(i64),

    /// A terminal node was not numbered during flattening.
    #[error("terminal node {0} has no terminal id")]
    MissingTerminalId(usize),

    /// A bigram names a word that is not a terminal in the dictionary.
    #[error("bigram target \"{0}\" is not placed in the dictionary")]
    UnplacedBigramTarget(String),
}

#[derive(Error, Debug)]
pub enum DictError {
    /// Version, header size or container shape this implementation refuses.
    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    /// A defect in the encoder or a structurally impossible input.
    #[error("internal invariant violated: {0}")]
    Invariant(#[from] InvariantViolation),

    /// Truncated or corrupt dictionary bytes.
    #[error("malformed dictionary: {0}")]
    Malformed(String),

    /// Caller supplied something the dictionary cannot hold.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Propagated I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T, E = DictError> = std::result::Result<T, E>;
