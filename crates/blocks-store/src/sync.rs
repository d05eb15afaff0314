//! Whole-store operations built on the [`BlockStore`] capability.

use std::iter::Peekable;

use tracing::{info, warn};

use crate::error::StoreResult;
use crate::stat::{BlockStat, ListQuery};
use crate::summary::Summary;
use crate::traits::{BlockStats, BlockStore};

/// Summarize every block matching `query`.
pub fn scan(store: &dyn BlockStore, query: &ListQuery) -> StoreResult<Summary> {
    let mut summary = Summary::new();
    for stat in store.list(query)? {
        summary.update(&stat?);
    }
    Ok(summary)
}

/// Delete every block currently listed in `store`.
///
/// Ids are enumerated first and deleted afterwards. Blocks that disappear
/// in between are skipped and not counted.
pub fn erase(store: &dyn BlockStore) -> StoreResult<Summary> {
    let stats: Vec<BlockStat> = store
        .list(&ListQuery::all())?
        .collect::<StoreResult<_>>()?;
    let mut summary = Summary::new();
    for stat in &stats {
        if store.delete(&stat.id)? {
            summary.update(stat);
        } else {
            warn!(id = %stat.id, "block vanished before delete");
        }
    }
    Ok(summary)
}

/// Lazily list blocks matching `query` that are in `source` but not `dest`.
pub fn missing<'a>(
    source: &'a dyn BlockStore,
    dest: &'a dyn BlockStore,
    query: &ListQuery,
) -> StoreResult<BlockStats<'a>> {
    // The limit applies to the output, not to the walk of `dest`.
    let dest_query = ListQuery {
        limit: None,
        ..query.clone()
    };
    let source_query = ListQuery {
        limit: None,
        ..query.clone()
    };
    let diff = Missing {
        source: source.list(&source_query)?.peekable(),
        dest: dest.list(&dest_query)?.peekable(),
        failed: false,
    };
    Ok(match query.limit {
        Some(limit) => Box::new(diff.take(limit)),
        None => Box::new(diff),
    })
}

struct Missing<'a> {
    source: Peekable<BlockStats<'a>>,
    dest: Peekable<BlockStats<'a>>,
    failed: bool,
}

impl Iterator for Missing<'_> {
    type Item = StoreResult<BlockStat>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        loop {
            let stat = match self.source.next()? {
                Ok(stat) => stat,
                Err(e) => {
                    self.failed = true;
                    return Some(Err(e));
                }
            };
            // Advance dest past everything below the source id.
            loop {
                match self.dest.peek() {
                    Some(Ok(d)) if d.id < stat.id => {
                        self.dest.next();
                    }
                    Some(Err(_)) => {
                        self.failed = true;
                        return self.dest.next();
                    }
                    _ => break,
                }
            }
            match self.dest.peek() {
                Some(Ok(d)) if d.id == stat.id => continue,
                _ => return Some(Ok(stat)),
            }
        }
    }
}

/// Copy blocks matching `query` from `source` into `dest` when `dest`
/// lacks them. Returns a summary of the copied blocks.
pub fn sync(
    source: &dyn BlockStore,
    dest: &dyn BlockStore,
    query: &ListQuery,
) -> StoreResult<Summary> {
    let mut summary = Summary::new();
    for stat in missing(source, dest, query)? {
        let stat = stat?;
        let Some(block) = source.get(&stat.id)? else {
            warn!(id = %stat.id, "block vanished before sync copy");
            continue;
        };
        dest.put(&block)?;
        summary.update(&stat);
    }
    info!(count = summary.count, size = summary.size, "sync complete");
    Ok(summary)
}
