//! Error type shared by the codec, the adapter and the descent loop.

use thiserror::Error;

use crate::path::Path;

pub type Result<T> = std::result::Result<T, Error>;

/// Boxed failure raised by a user objective.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, Error)]
pub enum Error {
    /// A terminal value that is not a floating-point array.
    #[error("unsupported leaf at {path}: expected a numeric array, found {found}")]
    UnsupportedLeafType { path: Path, found: &'static str },

    /// The structure has no leaves at all.
    #[error("structure contains no leaves")]
    EmptyStructure,

    #[error("flat vector has {actual} elements, expected {expected}")]
    LengthMismatch { expected: usize, actual: usize },

    #[error("objective returned {elements} elements, expected a single scalar")]
    NonScalarOutput { elements: usize },

    #[error("objective failed: {0}")]
    Objective(#[source] BoxError),

    #[error("gradient operator returned {actual} components for a point of {expected}")]
    GradientLength { expected: usize, actual: usize },

    #[error("cannot shape {elements} elements as {shape:?} at {path}")]
    InvalidShape {
        path: Path,
        shape: Vec<usize>,
        elements: usize,
    },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl Error {
    pub(crate) fn config(msg: impl Into<String>) -> Self {
        Error::InvalidConfig(msg.into())
    }
}
