//! Error type shared by all canopy crates

use thiserror::Error;

/// Errors raised by the canopy data structures. Every variant corresponds to one category of
/// misuse, and all of them are raised synchronously at the point of violation
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// An erased element type was accessed as a different type
    #[error("Type error: {0}")]
    Type(String),

    /// A row, dimension or child position was out of range
    #[error("Index error: {0}")]
    Index(String),

    /// An array, point cloud or node was requested that does not exist
    #[error("Key error: {0}")]
    Key(String),

    /// A structural invariant would be violated, e.g. mismatched major-axis sizes within a `Dataset`
    #[error("Invariant violated: {0}")]
    Invariant(String),
}

/// Result type used throughout canopy
pub type Result<T> = std::result::Result<T, Error>;
