use std::fmt;
use std::sync::Arc;

use blocks_types::Multihash;
use tracing::{debug, info, warn};

use crate::block::Block;
use crate::config::BufferConfig;
use crate::error::StoreResult;
use crate::memory::MemoryBlockStore;
use crate::merge::merge_block_lists;
use crate::stat::{BlockStat, ListQuery};
use crate::summary::Summary;
use crate::sync::erase;
use crate::traits::{BlockStats, BlockStore};

/// Inputs for [`BufferBlockStore::assemble`].
pub struct BufferStoreOptions {
    /// Fast tier. Defaults to a fresh [`MemoryBlockStore`].
    pub buffer: Option<Arc<dyn BlockStore>>,
    /// Durable backing tier.
    pub store: Arc<dyn BlockStore>,
    /// Blocks larger than this skip the buffer. `None` buffers everything.
    pub max_block_size: Option<u64>,
}

impl BufferStoreOptions {
    /// Options over `store` with a default buffer and no size limit.
    pub fn new(store: Arc<dyn BlockStore>) -> Self {
        Self {
            buffer: None,
            store,
            max_block_size: None,
        }
    }
}

/// Write-buffering decorator over two block stores.
///
/// Reads consult the buffer first, then the backing store, so a buffered
/// block shadows a backing copy with the same id. Writes of blocks no larger
/// than `max_block_size` land in the buffer; larger ones go straight to the
/// backing store. [`flush`](Self::flush) migrates buffered blocks to the
/// backing store and [`clear`](Self::clear) discards them.
///
/// The decorator adds no locking of its own. Migration is copy-then-delete,
/// so a crash or a concurrent flush can leave a block in both tiers; reads
/// prefer the buffer and `put` is idempotent, so repeating the flush is safe.
pub struct BufferBlockStore {
    buffer: Arc<dyn BlockStore>,
    store: Arc<dyn BlockStore>,
    max_block_size: Option<u64>,
}

impl BufferBlockStore {
    pub fn new(
        buffer: Arc<dyn BlockStore>,
        store: Arc<dyn BlockStore>,
        max_block_size: Option<u64>,
    ) -> Self {
        Self {
            buffer,
            store,
            max_block_size,
        }
    }

    /// Build from options, creating an in-memory buffer when none is given.
    pub fn assemble(options: BufferStoreOptions) -> Self {
        let buffer = options
            .buffer
            .unwrap_or_else(|| Arc::new(MemoryBlockStore::new()) as Arc<dyn BlockStore>);
        Self::new(buffer, options.store, options.max_block_size)
    }

    /// Build over `store` with an in-memory buffer and settings from `config`.
    pub fn from_config(config: &BufferConfig, store: Arc<dyn BlockStore>) -> Self {
        Self::assemble(BufferStoreOptions {
            buffer: None,
            store,
            max_block_size: config.max_block_size,
        })
    }

    /// The buffer tier.
    pub fn buffer(&self) -> &Arc<dyn BlockStore> {
        &self.buffer
    }

    /// The backing tier.
    pub fn store(&self) -> &Arc<dyn BlockStore> {
        &self.store
    }

    /// Largest block size routed to the buffer, if limited.
    pub fn max_block_size(&self) -> Option<u64> {
        self.max_block_size
    }

    fn buffers(&self, size: u64) -> bool {
        self.max_block_size.map(|max| size <= max).unwrap_or(true)
    }

    /// Delete every buffered block. The backing store is untouched.
    pub fn clear(&self) -> StoreResult<Summary> {
        let summary = erase(self.buffer.as_ref())?;
        info!(count = summary.count, size = summary.size, "cleared buffer");
        Ok(summary)
    }

    /// Move buffered blocks to the backing store.
    ///
    /// With `ids` of `None`, every block buffered when the call starts is
    /// considered. Each id is copied and then deleted from the buffer; ids
    /// no longer buffered when their turn comes are skipped without error.
    /// Returns a summary of exactly the migrated blocks.
    pub fn flush(&self, ids: Option<&[Multihash]>) -> StoreResult<Summary> {
        let ids: Vec<Multihash> = match ids {
            Some(ids) => ids.to_vec(),
            None => self
                .buffer
                .list(&ListQuery::all())?
                .map(|res| res.map(|stat| stat.id))
                .collect::<StoreResult<_>>()?,
        };

        let mut summary = Summary::new();
        for id in &ids {
            let Some(block) = self.buffer.get(id)? else {
                warn!(%id, "skipping block no longer buffered");
                continue;
            };
            self.store.put(&block)?;
            self.buffer.delete(id)?;
            debug!(%id, size = block.size(), "flushed block");
            summary.update(&block.stat());
        }
        info!(count = summary.count, size = summary.size, "flushed buffer");
        Ok(summary)
    }
}

impl BlockStore for BufferBlockStore {
    fn stat(&self, id: &Multihash) -> StoreResult<Option<BlockStat>> {
        match self.buffer.stat(id)? {
            Some(stat) => Ok(Some(stat)),
            None => self.store.stat(id),
        }
    }

    fn list(&self, query: &ListQuery) -> StoreResult<BlockStats<'_>> {
        let merged = merge_block_lists(vec![self.buffer.list(query)?, self.store.list(query)?]);
        Ok(match query.limit {
            Some(limit) => Box::new(merged.take(limit)),
            None => merged,
        })
    }

    fn get(&self, id: &Multihash) -> StoreResult<Option<Block>> {
        match self.buffer.get(id)? {
            Some(block) => Ok(Some(block)),
            None => self.store.get(id),
        }
    }

    fn put(&self, block: &Block) -> StoreResult<Block> {
        // Already durable; nothing to buffer.
        if self.store.stat(block.id())?.is_some() {
            if let Some(existing) = self.store.get(block.id())? {
                debug!(id = %block.id(), "block already in backing store");
                return Ok(existing);
            }
        }
        if self.buffers(block.size()) {
            debug!(id = %block.id(), size = block.size(), "buffering block");
            self.buffer.put(block)
        } else {
            debug!(id = %block.id(), size = block.size(), "block exceeds buffer limit");
            self.store.put(block)
        }
    }

    fn delete(&self, id: &Multihash) -> StoreResult<bool> {
        let from_buffer = self.buffer.delete(id)?;
        let from_store = self.store.delete(id)?;
        Ok(from_buffer || from_store)
    }
}

impl fmt::Debug for BufferBlockStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BufferBlockStore")
            .field("max_block_size", &self.max_block_size)
            .finish_non_exhaustive()
    }
}
