use blocks_crypto::HasherError;
use blocks_types::{Multihash, TypeError};

/// Errors from block and store operations.
///
/// A missing block is never an error: lookups return `Ok(None)`.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A caller passed a value the operation cannot accept.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Attempted to open the content of a block that carries none.
    #[error("block {0} has no content")]
    NoContent(Multihash),

    /// Content does not match the block's id or size.
    #[error("invalid block {id}: {reason}")]
    InvalidBlock { id: Multihash, reason: String },

    /// Hash algorithm resolution or hashing failure.
    #[error(transparent)]
    Hasher(#[from] HasherError),

    /// Malformed identifier.
    #[error(transparent)]
    Type(#[from] TypeError),

    /// I/O error from content streams or the underlying storage backend.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Storage backend failure that is not an I/O error.
    #[error("backend error: {0}")]
    Backend(String),

    /// Store configuration could not be parsed or assembled.
    #[error("configuration error: {0}")]
    Config(String),
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
