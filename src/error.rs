use thiserror::Error;

/// Errors raised when constructing a [`DropQueue`](crate::DropQueue).
///
/// Every other queue operation is total: empty input is a no-op and counts
/// larger than the queue saturate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Error {
    /// The requested capacity cannot hold a single element.
    #[error("capacity must be at least 1, got {0}")]
    InvalidCapacity(usize),
}

/// Result alias for queue construction.
pub type Result<T> = std::result::Result<T, Error>;
