//! Ordered merging of stat sequences from several stores.

use std::iter::Peekable;

use blocks_types::Multihash;

use crate::error::StoreResult;
use crate::stat::BlockStat;
use crate::traits::BlockStats;

/// Merge ascending stat sequences into one ascending, id-deduplicated sequence.
///
/// When an id appears in more than one source, the record from the
/// earliest-listed source wins. The first error from any source is yielded
/// and ends the merged sequence.
pub fn merge_block_lists<'a>(sources: Vec<BlockStats<'a>>) -> BlockStats<'a> {
    Box::new(MergedStats {
        sources: sources.into_iter().map(Iterator::peekable).collect(),
        failed: false,
    })
}

struct MergedStats<'a> {
    sources: Vec<Peekable<BlockStats<'a>>>,
    failed: bool,
}

impl Iterator for MergedStats<'_> {
    type Item = StoreResult<BlockStat>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }

        let mut lowest: Option<(usize, Multihash)> = None;
        for (i, source) in self.sources.iter_mut().enumerate() {
            match source.peek() {
                None => {}
                Some(Err(_)) => {
                    self.failed = true;
                    return source.next();
                }
                Some(Ok(stat)) => {
                    let lower = match &lowest {
                        Some((_, id)) => stat.id < *id,
                        None => true,
                    };
                    if lower {
                        lowest = Some((i, stat.id.clone()));
                    }
                }
            }
        }

        let (winner, id) = lowest?;
        let record = self.sources[winner].next();
        // Drop shadowed records with the same id from every other source.
        for source in self.sources.iter_mut().skip(winner + 1) {
            while matches!(source.peek(), Some(Ok(stat)) if stat.id == id) {
                source.next();
            }
        }
        record
    }
}
