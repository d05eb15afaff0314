//! Foundation types for content-addressed block storage.
//!
//! Every block is named by a [`Multihash`]: a self-describing digest that
//! encodes both the hash algorithm and the digest bytes. Identity is derived
//! from content, never from location.
//!
//! # Key Types
//!
//! - [`Multihash`] — Content identifier, a wrapper over the `multihash` crate
//! - [`TypeError`] — Parse and validation failures for identifiers

pub mod error;
pub mod multihash;

pub use self::error::TypeError;
pub use self::multihash::{Multihash, MAX_DIGEST_LEN};
