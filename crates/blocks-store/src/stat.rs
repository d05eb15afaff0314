use blocks_crypto::algorithm_for_name;
use blocks_types::Multihash;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::block::Attrs;
use crate::error::{StoreError, StoreResult};
use crate::traits::BlockStats;

/// Metadata-only descriptor of a stored block. Never carries content.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BlockStat {
    pub id: Multihash,
    pub size: u64,
    /// When the backend stored the block, if it tracks that.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stored_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Attrs::is_empty")]
    pub attrs: Attrs,
}

impl BlockStat {
    pub fn new(id: Multihash, size: u64) -> Self {
        Self {
            id,
            size,
            stored_at: None,
            attrs: Attrs::new(),
        }
    }

    pub fn with_attrs(mut self, attrs: Attrs) -> Self {
        self.attrs = attrs;
        self
    }

    pub fn stored_at(mut self, at: DateTime<Utc>) -> Self {
        self.stored_at = Some(at);
        self
    }
}

/// Filters for [`BlockStore::list`](crate::BlockStore::list).
///
/// `after`, `before` and `prefix` are lowercase hex renderings of the
/// encoded multihash. Because ids order the same way as their hex form, a
/// backend walking ids in ascending order can stop at `before`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListQuery {
    /// Registry name of the hash algorithm, e.g. `"sha2-256"`.
    pub algorithm: Option<String>,
    /// Only ids strictly greater than this hex string.
    pub after: Option<String>,
    /// Only ids strictly less than this hex string.
    pub before: Option<String>,
    /// Only ids whose hex form starts with this prefix.
    pub prefix: Option<String>,
    /// Maximum number of records returned.
    pub limit: Option<usize>,
}

impl ListQuery {
    /// A query with no filters.
    pub fn all() -> Self {
        Self::default()
    }

    pub fn algorithm(mut self, name: impl Into<String>) -> Self {
        self.algorithm = Some(name.into());
        self
    }

    pub fn after(mut self, hex: impl Into<String>) -> Self {
        self.after = Some(hex.into().to_ascii_lowercase());
        self
    }

    pub fn before(mut self, hex: impl Into<String>) -> Self {
        self.before = Some(hex.into().to_ascii_lowercase());
        self
    }

    pub fn prefix(mut self, hex: impl Into<String>) -> Self {
        self.prefix = Some(hex.into().to_ascii_lowercase());
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Reject unknown algorithms and non-hex bounds.
    pub fn validate(&self) -> StoreResult<()> {
        if let Some(name) = &self.algorithm {
            if algorithm_for_name(name).is_none() {
                return Err(StoreError::InvalidArgument(format!(
                    "unknown hash algorithm in list query: {name}"
                )));
            }
        }
        for (field, value) in [
            ("after", &self.after),
            ("before", &self.before),
            ("prefix", &self.prefix),
        ] {
            if let Some(hex) = value {
                if !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
                    return Err(StoreError::InvalidArgument(format!(
                        "list query {field} is not hex: {hex:?}"
                    )));
                }
            }
        }
        Ok(())
    }

    /// Returns `true` if `id` passes every filter except `limit`.
    pub fn matches(&self, id: &Multihash) -> bool {
        if let Some(name) = &self.algorithm {
            match algorithm_for_name(name) {
                Some(alg) if alg.code == id.code() => {}
                _ => return false,
            }
        }
        let hex = id.to_hex();
        if let Some(after) = &self.after {
            if hex.as_str() <= after.to_ascii_lowercase().as_str() {
                return false;
            }
        }
        if let Some(prefix) = &self.prefix {
            if !hex.starts_with(&prefix.to_ascii_lowercase()) {
                return false;
            }
        }
        !self.is_past_end(id)
    }

    /// Returns `true` once an ascending walk has passed `before`.
    pub fn is_past_end(&self, id: &Multihash) -> bool {
        match &self.before {
            Some(before) => id.to_hex().as_str() >= before.to_ascii_lowercase().as_str(),
            None => false,
        }
    }

    /// Apply the filters and the limit to an ascending stat sequence.
    ///
    /// Errors pass through untouched.
    pub fn apply<'a>(&self, stats: BlockStats<'a>) -> BlockStats<'a> {
        let filter = self.clone();
        let stop = self.clone();
        let filtered = stats
            .take_while(move |res| match res {
                Ok(stat) => !stop.is_past_end(&stat.id),
                Err(_) => true,
            })
            .filter(move |res| match res {
                Ok(stat) => filter.matches(&stat.id),
                Err(_) => true,
            });
        match self.limit {
            Some(limit) => Box::new(filtered.take(limit)),
            None => Box::new(filtered),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use blocks_crypto::Hasher;

    fn id(data: &[u8]) -> Multihash {
        Hasher::default().hash(data).unwrap()
    }

    fn sorted_ids(n: usize) -> Vec<Multihash> {
        let mut ids: Vec<Multihash> = (0..n).map(|i| id(format!("block-{i}").as_bytes())).collect();
        ids.sort();
        ids
    }

    fn stats(ids: &[Multihash]) -> BlockStats<'static> {
        let items: Vec<StoreResult<BlockStat>> =
            ids.iter().map(|id| Ok(BlockStat::new(id.clone(), 1))).collect();
        Box::new(items.into_iter())
    }

    fn collect(stats: BlockStats<'_>) -> Vec<Multihash> {
        stats.map(|res| res.unwrap().id).collect()
    }

    #[test]
    fn empty_query_matches_everything() {
        let ids = sorted_ids(5);
        assert_eq!(collect(ListQuery::all().apply(stats(&ids))), ids);
    }

    #[test]
    fn after_and_before_are_exclusive() {
        let ids = sorted_ids(6);
        let query = ListQuery::all().after(ids[1].to_hex()).before(ids[4].to_hex());
        assert_eq!(collect(query.apply(stats(&ids))), ids[2..4].to_vec());
    }

    #[test]
    fn prefix_filter() {
        let ids = sorted_ids(20);
        let hex = ids[7].to_hex();
        let prefix = &hex[..8];
        let got = collect(ListQuery::all().prefix(prefix).apply(stats(&ids)));
        assert!(got.contains(&ids[7]));
        assert!(got.iter().all(|id| id.to_hex().starts_with(prefix)));
    }

    #[test]
    fn algorithm_filter() {
        let sha = id(b"x");
        let b3 = Hasher::named("blake3").unwrap().hash(b"x").unwrap();
        let query = ListQuery::all().algorithm("blake3");
        assert!(query.matches(&b3));
        assert!(!query.matches(&sha));
    }

    #[test]
    fn limit_truncates() {
        let ids = sorted_ids(5);
        assert_eq!(collect(ListQuery::all().limit(2).apply(stats(&ids))), ids[..2].to_vec());
        assert!(collect(ListQuery::all().limit(0).apply(stats(&ids))).is_empty());
    }

    #[test]
    fn bounds_are_case_insensitive() {
        let ids = sorted_ids(3);
        let upper = ListQuery::all().after(ids[0].to_hex().to_uppercase());
        assert_eq!(collect(upper.apply(stats(&ids))), ids[1..].to_vec());
    }

    #[test]
    fn validate_rejects_bad_queries() {
        assert!(ListQuery::all().algorithm("sha2-256").validate().is_ok());
        assert!(ListQuery::all().algorithm("crc32").validate().is_err());
        assert!(ListQuery::all().prefix("12zz").validate().is_err());
    }

    #[test]
    fn errors_pass_through() {
        let items: Vec<StoreResult<BlockStat>> = vec![
            Ok(BlockStat::new(id(b"a"), 1)),
            Err(StoreError::Backend("boom".into())),
        ];
        let out: Vec<_> = ListQuery::all().apply(Box::new(items.into_iter())).collect();
        assert_eq!(out.len(), 2);
        assert!(out[1].is_err());
    }

    #[test]
    fn stat_serde_skips_empty_fields() {
        let stat = BlockStat::new(id(b"serde"), 5);
        let json = serde_json::to_value(&stat).unwrap();
        assert!(json.get("stored_at").is_none());
        assert!(json.get("attrs").is_none());
        let back: BlockStat = serde_json::from_value(json).unwrap();
        assert_eq!(back, stat);
    }
}
