use blocks_types::Multihash;

use crate::block::Block;
use crate::error::StoreResult;
use crate::stat::{BlockStat, ListQuery};

/// Lazy, ascending-by-id sequence of stat records.
pub type BlockStats<'a> = Box<dyn Iterator<Item = StoreResult<BlockStat>> + Send + 'a>;

/// Content-addressed block store.
///
/// Leaf backends and decorators alike implement this trait, so decorators
/// hold `Arc<dyn BlockStore>` and compose over any backend. All
/// implementations must satisfy these invariants:
/// - Blocks are immutable once stored. Storing an id that is already present
///   leaves the stored bytes unchanged and returns the existing block.
/// - A missing block is `Ok(None)`, never an error.
/// - `list` re-queries on every call; it never replays a cached snapshot.
/// - I/O errors are propagated, never silently ignored.
pub trait BlockStore: Send + Sync {
    /// Describe a stored block without opening its content.
    fn stat(&self, id: &Multihash) -> StoreResult<Option<BlockStat>>;

    /// Enumerate stored blocks in ascending id order, filtered by `query`.
    ///
    /// The sequence is produced on demand. Backends must tolerate mutation
    /// while it is being consumed, offering either a snapshot or an
    /// eventually-consistent view.
    fn list(&self, query: &ListQuery) -> StoreResult<BlockStats<'_>>;

    /// Fetch a block with openable content.
    fn get(&self, id: &Multihash) -> StoreResult<Option<Block>>;

    /// Store a block and return the stored value. Idempotent.
    fn put(&self, block: &Block) -> StoreResult<Block>;

    /// Remove a block. Returns `true` if something was removed.
    fn delete(&self, id: &Multihash) -> StoreResult<bool>;

    /// Check whether a block is stored.
    fn contains(&self, id: &Multihash) -> StoreResult<bool> {
        Ok(self.stat(id)?.is_some())
    }

    /// Fetch several blocks.
    ///
    /// Default implementation calls `get()` for each id. Backends may
    /// override for fewer round-trips.
    fn get_batch(&self, ids: &[Multihash]) -> StoreResult<Vec<Option<Block>>> {
        ids.iter().map(|id| self.get(id)).collect()
    }

    /// Store several blocks.
    ///
    /// Default implementation calls `put()` for each block.
    fn put_batch(&self, blocks: &[Block]) -> StoreResult<Vec<Block>> {
        blocks.iter().map(|block| self.put(block)).collect()
    }

    /// Remove several blocks and return the ids that were actually removed.
    fn delete_batch(&self, ids: &[Multihash]) -> StoreResult<Vec<Multihash>> {
        let mut removed = Vec::new();
        for id in ids {
            if self.delete(id)? {
                removed.push(id.clone());
            }
        }
        Ok(removed)
    }
}
