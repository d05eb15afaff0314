use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::stat::BlockStat;

/// Order-independent tally of blocks: count, total size, size histogram.
///
/// Folding any permutation of the same stats gives the same summary, and
/// [`merge`](Summary::merge) is associative and commutative, so partial
/// summaries from separate walks can be combined freely.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    pub count: u64,
    pub size: u64,
    /// Block counts by size bucket: bucket `n > 0` holds sizes in
    /// `[2^(n-1), 2^n)`, bucket 0 holds zero-length entries.
    #[serde(default)]
    pub sizes: BTreeMap<u32, u64>,
}

/// Histogram bucket for a block size (its bit length).
pub fn size_bucket(size: u64) -> u32 {
    u64::BITS - size.leading_zeros()
}

impl Summary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one block of `size` bytes.
    pub fn record(&mut self, size: u64) {
        self.count += 1;
        self.size += size;
        *self.sizes.entry(size_bucket(size)).or_insert(0) += 1;
    }

    /// Count the block described by `stat`.
    pub fn update(&mut self, stat: &BlockStat) {
        self.record(stat.size);
    }

    /// Combine two summaries.
    pub fn merge(mut self, other: &Summary) -> Self {
        self.count += other.count;
        self.size += other.size;
        for (bucket, n) in &other.sizes {
            *self.sizes.entry(*bucket).or_insert(0) += n;
        }
        self
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }
}

impl<'a> Extend<&'a BlockStat> for Summary {
    fn extend<I: IntoIterator<Item = &'a BlockStat>>(&mut self, iter: I) {
        for stat in iter {
            self.update(stat);
        }
    }
}

impl<'a> FromIterator<&'a BlockStat> for Summary {
    fn from_iter<I: IntoIterator<Item = &'a BlockStat>>(iter: I) -> Self {
        let mut summary = Self::new();
        summary.extend(iter);
        summary
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} blocks, {} bytes", self.count, self.size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use blocks_crypto::Hasher;
    use proptest::prelude::*;

    fn stat(n: u64, size: u64) -> BlockStat {
        let id = Hasher::default().hash(&n.to_be_bytes()).unwrap();
        BlockStat::new(id, size)
    }

    #[test]
    fn zero_value() {
        let summary = Summary::new();
        assert_eq!(summary.count, 0);
        assert_eq!(summary.size, 0);
        assert!(summary.sizes.is_empty());
        assert!(summary.is_empty());
    }

    #[test]
    fn buckets_are_bit_lengths() {
        assert_eq!(size_bucket(0), 0);
        assert_eq!(size_bucket(1), 1);
        assert_eq!(size_bucket(2), 2);
        assert_eq!(size_bucket(3), 2);
        assert_eq!(size_bucket(1024), 11);
        assert_eq!(size_bucket(u64::MAX), 64);
    }

    #[test]
    fn update_tallies() {
        let stats = [stat(1, 5), stat(2, 20), stat(3, 6)];
        let summary: Summary = stats.iter().collect();
        assert_eq!(summary.count, 3);
        assert_eq!(summary.size, 31);
        assert_eq!(summary.sizes.get(&3), Some(&2));
        assert_eq!(summary.sizes.get(&5), Some(&1));
        assert_eq!(summary.to_string(), "3 blocks, 31 bytes");
    }

    #[test]
    fn merge_with_zero_is_identity() {
        let summary: Summary = [stat(1, 9)].iter().collect();
        assert_eq!(summary.clone().merge(&Summary::new()), summary);
        assert_eq!(Summary::new().merge(&summary), summary);
    }

    proptest! {
        #[test]
        fn fold_is_order_independent(sizes in proptest::collection::vec(0u64..10_000, 0..40),
                                     seed in any::<u64>()) {
            let stats: Vec<BlockStat> =
                sizes.iter().enumerate().map(|(i, s)| stat(i as u64, *s)).collect();
            let forward: Summary = stats.iter().collect();

            let mut shuffled = stats.clone();
            // Deterministic Fisher-Yates driven by the seed.
            let mut state = seed | 1;
            for i in (1..shuffled.len()).rev() {
                state ^= state << 13;
                state ^= state >> 7;
                state ^= state << 17;
                shuffled.swap(i, (state % (i as u64 + 1)) as usize);
            }
            let permuted: Summary = shuffled.iter().collect();
            prop_assert_eq!(forward, permuted);
        }

        #[test]
        fn merge_is_associative_and_commutative(a in proptest::collection::vec(0u64..5000, 0..10),
                                                b in proptest::collection::vec(0u64..5000, 0..10),
                                                c in proptest::collection::vec(0u64..5000, 0..10)) {
            let summarize = |sizes: &[u64]| {
                let mut s = Summary::new();
                for size in sizes {
                    s.record(*size);
                }
                s
            };
            let (sa, sb, sc) = (summarize(&a), summarize(&b), summarize(&c));
            prop_assert_eq!(sa.clone().merge(&sb), sb.clone().merge(&sa));
            prop_assert_eq!(
                sa.clone().merge(&sb).merge(&sc),
                sa.clone().merge(&sb.clone().merge(&sc))
            );
        }
    }
}
