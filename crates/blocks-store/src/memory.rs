use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use blocks_types::Multihash;
use chrono::{DateTime, Utc};

use crate::block::Block;
use crate::error::{StoreError, StoreResult};
use crate::stat::{BlockStat, ListQuery};
use crate::traits::{BlockStats, BlockStore};

struct Entry {
    block: Block,
    stored_at: DateTime<Utc>,
}

impl Entry {
    fn stat(&self) -> BlockStat {
        self.block.stat().stored_at(self.stored_at)
    }
}

/// In-memory, ordered block store.
///
/// Intended for tests, embedding, and as the default buffer tier. Blocks are
/// held loaded behind a `RwLock`; lazy content is read in full on `put`.
/// Listing walks the map with a cursor and re-takes the lock for every
/// record, so concurrent writers are never blocked by a slow consumer and
/// the listing reflects writes made while it is in progress.
pub struct MemoryBlockStore {
    blocks: RwLock<BTreeMap<Multihash, Entry>>,
}

fn poisoned() -> StoreError {
    StoreError::Backend("memory store lock poisoned".to_string())
}

impl MemoryBlockStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self {
            blocks: RwLock::new(BTreeMap::new()),
        }
    }

    fn read_map(&self) -> StoreResult<RwLockReadGuard<'_, BTreeMap<Multihash, Entry>>> {
        self.blocks.read().map_err(|_| poisoned())
    }

    fn write_map(&self) -> StoreResult<RwLockWriteGuard<'_, BTreeMap<Multihash, Entry>>> {
        self.blocks.write().map_err(|_| poisoned())
    }

    /// Number of blocks currently stored.
    pub fn len(&self) -> StoreResult<usize> {
        Ok(self.read_map()?.len())
    }

    /// Returns `true` if the store is empty.
    pub fn is_empty(&self) -> StoreResult<bool> {
        Ok(self.read_map()?.is_empty())
    }

    /// Total bytes across all stored blocks.
    pub fn total_bytes(&self) -> StoreResult<u64> {
        Ok(self.read_map()?.values().map(|e| e.block.size()).sum())
    }

    /// Remove all blocks from the store.
    pub fn clear(&self) -> StoreResult<()> {
        self.write_map()?.clear();
        Ok(())
    }
}

impl Default for MemoryBlockStore {
    fn default() -> Self {
        Self::new()
    }
}

impl BlockStore for MemoryBlockStore {
    fn stat(&self, id: &Multihash) -> StoreResult<Option<BlockStat>> {
        Ok(self.read_map()?.get(id).map(Entry::stat))
    }

    fn list(&self, query: &ListQuery) -> StoreResult<BlockStats<'_>> {
        query.validate()?;
        let walk = MemoryStats {
            store: self,
            cursor: seek(query.after.as_deref()),
            done: false,
        };
        Ok(query.apply(Box::new(walk)))
    }

    fn get(&self, id: &Multihash) -> StoreResult<Option<Block>> {
        Ok(self.read_map()?.get(id).map(|e| e.block.clone()))
    }

    fn put(&self, block: &Block) -> StoreResult<Block> {
        if let Some(existing) = self.read_map()?.get(block.id()) {
            return Ok(existing.block.clone());
        }
        // Load outside the lock; lazy content may be slow to read.
        let loaded = block.load()?;
        let mut map = self.write_map()?;
        // Idempotent: a concurrent writer may have stored the same id first.
        let entry = map.entry(block.id().clone()).or_insert_with(|| Entry {
            block: loaded,
            stored_at: Utc::now(),
        });
        Ok(entry.block.clone())
    }

    fn delete(&self, id: &Multihash) -> StoreResult<bool> {
        Ok(self.write_map()?.remove(id).is_some())
    }
}

impl std::fmt::Debug for MemoryBlockStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let count = self.blocks.read().map(|m| m.len()).ok();
        f.debug_struct("MemoryBlockStore")
            .field("block_count", &count)
            .finish()
    }
}

/// Lower bound for a walk honoring `after`, in encoded-id bytes.
///
/// Hex ordering equals byte ordering, so an even-length bound decodes
/// directly. An odd trailing digit is dropped, which only widens the bound;
/// [`ListQuery::apply`] still filters the exact comparison.
fn seek(after: Option<&str>) -> Bound<Vec<u8>> {
    let Some(after) = after else {
        return Bound::Unbounded;
    };
    let even = &after[..after.len() - after.len() % 2];
    match hex::decode(even) {
        Ok(bytes) if !bytes.is_empty() => Bound::Included(bytes),
        _ => Bound::Unbounded,
    }
}

/// Cursor walk over a [`MemoryBlockStore`].
struct MemoryStats<'a> {
    store: &'a MemoryBlockStore,
    cursor: Bound<Vec<u8>>,
    done: bool,
}

impl Iterator for MemoryStats<'_> {
    type Item = StoreResult<BlockStat>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let map = match self.store.read_map() {
            Ok(map) => map,
            Err(e) => {
                self.done = true;
                return Some(Err(e));
            }
        };
        let start = self.cursor.as_ref().map(Vec::as_slice);
        let next = map.range::<[u8], _>((start, Bound::Unbounded)).next();
        match next {
            Some((id, entry)) => {
                let stat = entry.stat();
                self.cursor = Bound::Excluded(id.as_bytes().to_vec());
                Some(Ok(stat))
            }
            None => {
                self.done = true;
                None
            }
        }
    }
}
