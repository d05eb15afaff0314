//! Content-addressed block storage.
//!
//! A [`Block`] is an immutable unit of data named by the [`Multihash`] of its
//! content. Its bytes are either resident in memory or opened on demand, and
//! either way can be streamed in full or by range.
//!
//! # Storage Backends
//!
//! All backends and decorators implement the [`BlockStore`] trait:
//!
//! - [`MemoryBlockStore`] -- ordered in-memory store for tests, embedding,
//!   and as the default buffer tier
//! - [`BufferBlockStore`] -- decorator that buffers small writes in a fast
//!   store and migrates them to a durable one on [`flush`](BufferBlockStore::flush)
//!
//! Decorators hold `Arc<dyn BlockStore>`, so they compose over any backend,
//! including other decorators.
//!
//! # Design Rules
//!
//! 1. Block identity (`id`, `size`, `attrs`) is fixed at construction; edits
//!    produce new values.
//! 2. A missing block is `Ok(None)`, never an error.
//! 3. `put` is idempotent: an existing id keeps its stored bytes.
//! 4. Listings are lazy, ascending by id, and re-query on every call.
//! 5. Backend errors propagate unchanged through decorators.
//! 6. Opened content streams belong to the caller.
//!
//! [`Multihash`]: blocks_types::Multihash

pub mod block;
pub mod buffer;
pub mod config;
pub mod content;
pub mod error;
pub mod memory;
pub mod merge;
pub mod stat;
pub mod summary;
pub mod sync;
pub mod traits;

// Re-export primary types at crate root for ergonomic imports.
pub use block::{Attrs, Block, RESERVED_KEYS};
pub use buffer::{BufferBlockStore, BufferStoreOptions};
pub use config::BufferConfig;
pub use content::{Content, ContentReader, ContentStream};
pub use error::{StoreError, StoreResult};
pub use memory::MemoryBlockStore;
pub use merge::merge_block_lists;
pub use stat::{BlockStat, ListQuery};
pub use summary::Summary;
pub use sync::{erase, missing, scan, sync};
pub use traits::{BlockStats, BlockStore};
