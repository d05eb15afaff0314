use thiserror::Error;

/// Errors produced by identifier parsing and validation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid hex string: {0}")]
    InvalidHex(String),

    #[error("invalid base58 string: {0}")]
    InvalidBase58(String),

    #[error("invalid multihash: {0}")]
    InvalidMultihash(String),

    #[error("multihash digest is empty")]
    EmptyDigest,
}
