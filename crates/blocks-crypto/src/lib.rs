//! Content hashing for block identifiers.
//!
//! Provides the fixed registry of supported hash algorithms and the checked
//! [`Hasher`] that turns bytes into a validated [`Multihash`].
//!
//! All digests wrap established libraries — no custom cryptography.
//!
//! [`Multihash`]: blocks_types::Multihash

pub mod hasher;

pub use hasher::{
    algorithm_for_code, algorithm_for_name, Algorithm, HashDesignator, HashFn, Hasher,
    HasherError, ALGORITHMS, DEFAULT_ALGORITHM,
};
