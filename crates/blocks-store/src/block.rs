use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::io::Read;

use blocks_crypto::{HashDesignator, Hasher};
use blocks_types::Multihash;
use bytes::Bytes;
use serde_json::Value;

use crate::content::{Content, ContentReader, ContentStream};
use crate::error::{StoreError, StoreResult};
use crate::stat::BlockStat;

/// Open-ended extension attributes. An empty map means "no attributes".
pub type Attrs = BTreeMap<String, Value>;

/// Keys that name the fixed identity fields and cannot be set as attributes.
pub const RESERVED_KEYS: [&str; 3] = ["id", "size", "content"];

/// Immutable, content-addressed unit of data.
///
/// `id` and `size` are fixed at construction and never recomputed. Equality
/// and ordering consider `id`, `size` and `attrs` only: a loaded block and a
/// lazily-backed block with the same identity compare equal, and `meta` is
/// ignored entirely. Every "edit" returns a new `Block`.
#[derive(Clone)]
pub struct Block {
    id: Multihash,
    size: u64,
    content: Option<Content>,
    attrs: Attrs,
    meta: Attrs,
}

impl Block {
    fn with_content(id: Multihash, size: u64, content: Option<Content>) -> Self {
        Self {
            id,
            size,
            content,
            attrs: Attrs::new(),
            meta: Attrs::new(),
        }
    }

    /// Declare a lazy block backed by `reader`. The id and size are trusted.
    pub fn from_reader<R: ContentReader + 'static>(id: Multihash, size: u64, reader: R) -> Self {
        Self::with_content(id, size, Some(Content::reader(reader)))
    }

    /// Wrap already-resident bytes under a trusted id.
    ///
    /// Returns `None` for empty input.
    pub fn from_loaded(id: Multihash, bytes: Bytes) -> Option<Self> {
        if bytes.is_empty() {
            return None;
        }
        let size = bytes.len() as u64;
        Some(Self::with_content(id, size, Some(Content::Bytes(bytes))))
    }

    /// Read `source` fully and wrap it under a trusted id.
    ///
    /// Returns `Ok(None)` when the source is empty.
    pub fn from_bytes<R: Read>(id: Multihash, mut source: R) -> StoreResult<Option<Self>> {
        let mut buf = Vec::new();
        source.read_to_end(&mut buf)?;
        Ok(Self::from_loaded(id, Bytes::from(buf)))
    }

    /// Read `source` fully and derive the id with the designated algorithm.
    ///
    /// Returns `Ok(None)` when the source is empty.
    pub fn hash_and_load<R: Read>(
        algorithm: Option<&HashDesignator>,
        source: R,
    ) -> StoreResult<Option<Self>> {
        let hasher = Hasher::resolve(algorithm)?;
        Self::hash_with(&hasher, source)
    }

    /// [`hash_and_load`](Self::hash_and_load) with an already-resolved hasher.
    pub fn hash_with<R: Read>(hasher: &Hasher, mut source: R) -> StoreResult<Option<Self>> {
        let mut buf = Vec::new();
        source.read_to_end(&mut buf)?;
        if buf.is_empty() {
            return Ok(None);
        }
        let id = hasher.hash(&buf)?;
        Ok(Self::from_loaded(id, Bytes::from(buf)))
    }

    /// Hash and load `source` with the default algorithm.
    pub fn read<R: Read>(source: R) -> StoreResult<Option<Self>> {
        Self::hash_with(&Hasher::default(), source)
    }

    /// A contentless block carrying a stat record's identity and attributes.
    pub fn from_stat(stat: &BlockStat) -> Self {
        let mut block = Self::with_content(stat.id.clone(), stat.size, None);
        block.attrs = stat.attrs.clone();
        block
    }

    // ---- Accessors ----

    /// Content identifier.
    pub fn id(&self) -> &Multihash {
        &self.id
    }

    /// Content length in bytes.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Content representation, if any.
    pub fn content(&self) -> Option<&Content> {
        self.content.as_ref()
    }

    /// Returns `true` if the block carries openable content.
    pub fn has_content(&self) -> bool {
        self.content.is_some()
    }

    /// Returns `true` if the content is fully resident in memory.
    pub fn is_loaded(&self) -> bool {
        self.content.as_ref().map(Content::is_bytes).unwrap_or(false)
    }

    /// Extension attributes.
    pub fn attrs(&self) -> &Attrs {
        &self.attrs
    }

    /// Display and implementation metadata; never part of equality.
    pub fn meta(&self) -> &Attrs {
        &self.meta
    }

    /// Uniform lookup: `"id"` and `"size"` resolve to the identity fields,
    /// anything else to the attribute map.
    pub fn attr(&self, key: &str) -> Option<Value> {
        match key {
            "id" => Some(Value::String(self.id.to_base58())),
            "size" => Some(Value::from(self.size)),
            "content" => None,
            _ => self.attrs.get(key).cloned(),
        }
    }

    /// The metadata-only descriptor of this block.
    pub fn stat(&self) -> BlockStat {
        BlockStat::new(self.id.clone(), self.size).with_attrs(self.attrs.clone())
    }

    // ---- Content ----

    /// Open a stream over the full content.
    pub fn open(&self) -> StoreResult<ContentStream> {
        let content = self
            .content
            .as_ref()
            .ok_or_else(|| StoreError::NoContent(self.id.clone()))?;
        Ok(content.open()?)
    }

    /// Open a stream over `[start, end)`; requires `start <= end <= size`.
    ///
    /// Lazy content is skipped forward from the beginning, so the cost grows
    /// with `start`.
    pub fn open_range(&self, start: u64, end: u64) -> StoreResult<ContentStream> {
        if start > end || end > self.size {
            return Err(StoreError::InvalidArgument(format!(
                "range [{start}, {end}) out of bounds for {}-byte block",
                self.size
            )));
        }
        let content = self
            .content
            .as_ref()
            .ok_or_else(|| StoreError::NoContent(self.id.clone()))?;
        Ok(content.open_range(start, end)?)
    }

    /// A copy whose content is resident in memory.
    pub fn load(&self) -> StoreResult<Self> {
        match &self.content {
            Some(Content::Bytes(_)) => Ok(self.clone()),
            Some(content @ Content::Reader(_)) => {
                let bytes = content.read_to_bytes()?;
                Ok(self.rewrap(|_| Content::Bytes(bytes)))
            }
            None => Err(StoreError::NoContent(self.id.clone())),
        }
    }

    /// Re-hash the content and check it against the id and size.
    pub fn validate(&self) -> StoreResult<()> {
        let content = self
            .content
            .as_ref()
            .ok_or_else(|| StoreError::NoContent(self.id.clone()))?;
        let bytes = content.read_to_bytes()?;
        if bytes.len() as u64 != self.size {
            return Err(StoreError::InvalidBlock {
                id: self.id.clone(),
                reason: format!("size {} does not match content length {}", self.size, bytes.len()),
            });
        }
        let hasher = Hasher::for_code(self.id.code())?;
        if !hasher.verify(&bytes, &self.id)? {
            return Err(StoreError::InvalidBlock {
                id: self.id.clone(),
                reason: "content does not hash to id".to_string(),
            });
        }
        Ok(())
    }

    // ---- Derived values ----

    /// Apply `transform` to the content, keeping id, size, attrs and meta.
    ///
    /// A contentless block is returned unchanged.
    pub fn rewrap<F>(&self, transform: F) -> Self
    where
        F: FnOnce(Content) -> Content,
    {
        let mut block = self.clone();
        block.content = self.content.clone().map(transform);
        block
    }

    /// Drop attrs and meta, keeping id, size and content.
    pub fn strip(&self) -> Self {
        Self::with_content(self.id.clone(), self.size, self.content.clone())
    }

    /// Set one attribute. Reserved keys are rejected.
    pub fn with_attr(&self, key: impl Into<String>, value: impl Into<Value>) -> StoreResult<Self> {
        let key = key.into();
        if RESERVED_KEYS.contains(&key.as_str()) {
            return Err(StoreError::InvalidArgument(format!(
                "cannot change block field {key:?}"
            )));
        }
        let mut block = self.clone();
        block.attrs.insert(key, value.into());
        Ok(block)
    }

    /// Set several attributes at once. Reserved keys are rejected.
    pub fn with_attrs(&self, attrs: Attrs) -> StoreResult<Self> {
        attrs
            .into_iter()
            .try_fold(self.clone(), |block, (key, value)| block.with_attr(key, value))
    }

    /// Set one metadata entry.
    pub fn with_meta(&self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        let mut block = self.clone();
        block.meta.insert(key.into(), value.into());
        block
    }

    /// Merge two blocks with the same id.
    ///
    /// The result takes `other`'s size and content; attrs and meta are
    /// deep-merged with `other` winning conflicts.
    pub fn merge(&self, other: &Block) -> StoreResult<Self> {
        if self.id != other.id {
            return Err(StoreError::InvalidArgument(format!(
                "cannot merge blocks with different ids: {} and {}",
                self.id, other.id
            )));
        }
        let mut attrs = self.attrs.clone();
        deep_merge(&mut attrs, &other.attrs);
        let mut meta = self.meta.clone();
        deep_merge(&mut meta, &other.meta);
        Ok(Self {
            id: other.id.clone(),
            size: other.size,
            content: other.content.clone(),
            attrs,
            meta,
        })
    }
}

fn deep_merge(into: &mut Attrs, from: &Attrs) {
    for (key, value) in from {
        match (into.get_mut(key), value) {
            (Some(Value::Object(left)), Value::Object(right)) => merge_objects(left, right),
            _ => {
                into.insert(key.clone(), value.clone());
            }
        }
    }
}

fn merge_objects(into: &mut serde_json::Map<String, Value>, from: &serde_json::Map<String, Value>) {
    for (key, value) in from {
        match (into.get_mut(key), value) {
            (Some(Value::Object(left)), Value::Object(right)) => merge_objects(left, right),
            _ => {
                into.insert(key.clone(), value.clone());
            }
        }
    }
}

/// Total order over attribute maps: keys first, then JSON text of values.
pub(crate) fn cmp_attrs(a: &Attrs, b: &Attrs) -> Ordering {
    let left = a.iter().map(|(k, v)| (k, v.to_string()));
    let right = b.iter().map(|(k, v)| (k, v.to_string()));
    left.cmp(right)
}

impl PartialEq for Block {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.size == other.size && self.attrs == other.attrs
    }
}

impl Eq for Block {}

impl PartialOrd for Block {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Block {
    fn cmp(&self, other: &Self) -> Ordering {
        self.id
            .cmp(&other.id)
            .then(self.size.cmp(&other.size))
            .then_with(|| cmp_attrs(&self.attrs, &other.attrs))
    }
}

impl fmt::Display for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Block[{} {}]", self.id, self.size)
    }
}

impl fmt::Debug for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Block")
            .field("id", &self.id)
            .field("size", &self.size)
            .field("content", &self.content)
            .field("attrs", &self.attrs)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::ContentStream;
    use proptest::prelude::*;
    use serde_json::json;
    use std::io::{self, Cursor};

    fn loaded(data: &'static [u8]) -> Block {
        Block::read(data).unwrap().expect("non-empty")
    }

    fn lazy_copy(block: &Block, data: &'static [u8]) -> Block {
        Block::from_reader(block.id().clone(), block.size(), move || -> io::Result<ContentStream> {
            Ok(Box::new(Cursor::new(data)))
        })
    }

    fn read_all(mut stream: ContentStream) -> Vec<u8> {
        let mut out = Vec::new();
        stream.read_to_end(&mut out).unwrap();
        out
    }

    // -----------------------------------------------------------------------
    // Construction
    // -----------------------------------------------------------------------

    #[test]
    fn hash_and_load_derives_id_and_size() {
        let block = Block::hash_and_load(Some(&"sha2-256".into()), &b"hello"[..])
            .unwrap()
            .unwrap();
        assert_eq!(block.size(), 5);
        assert_eq!(block.id(), &Hasher::default().hash(b"hello").unwrap());
        assert!(block.is_loaded());
    }

    #[test]
    fn hash_and_load_rejects_bad_designators() {
        assert!(matches!(
            Block::hash_and_load(None, &b"x"[..]),
            Err(StoreError::Hasher(_))
        ));
        assert!(matches!(
            Block::hash_and_load(Some(&"whirlpool".into()), &b"x"[..]),
            Err(StoreError::Hasher(_))
        ));
    }

    #[test]
    fn empty_input_yields_no_block() {
        assert!(Block::read(&b""[..]).unwrap().is_none());
        let id = Hasher::default().hash(b"x").unwrap();
        assert!(Block::from_bytes(id, &b""[..]).unwrap().is_none());
    }

    #[test]
    fn from_bytes_trusts_the_caller_id() {
        let id = Hasher::default().hash(b"something else").unwrap();
        let block = Block::from_bytes(id.clone(), &b"data"[..]).unwrap().unwrap();
        assert_eq!(block.id(), &id);
        assert_eq!(block.size(), 4);
        assert!(block.validate().is_err());
    }

    #[test]
    fn from_stat_has_no_content() {
        let block = loaded(b"stat me").with_attr("tag", "x").unwrap();
        let stub = Block::from_stat(&block.stat());
        assert_eq!(stub, block);
        assert!(!stub.has_content());
        assert!(matches!(stub.open(), Err(StoreError::NoContent(_))));
    }

    // -----------------------------------------------------------------------
    // Equality and ordering
    // -----------------------------------------------------------------------

    #[test]
    fn equality_ignores_content_representation() {
        let block = loaded(b"same bytes");
        let lazy = lazy_copy(&block, b"same bytes");
        assert!(!lazy.is_loaded());
        assert_eq!(block, lazy);
    }

    #[test]
    fn equality_ignores_meta_but_not_attrs() {
        let block = loaded(b"meta");
        assert_eq!(block, block.with_meta("source", "disk"));
        assert_ne!(block, block.with_attr("tag", 1).unwrap());
    }

    #[test]
    fn ordering_is_id_then_size_then_attrs() {
        let a = loaded(b"aaa");
        let b = loaded(b"bbb");
        let (lo, hi) = if a.id() < b.id() { (a, b) } else { (b, a) };
        assert!(lo < hi);

        let plain = loaded(b"attrs");
        let tagged_1 = plain.with_attr("n", 1).unwrap();
        let tagged_2 = plain.with_attr("n", 2).unwrap();
        assert!(plain < tagged_1);
        assert!(tagged_1 < tagged_2);
    }

    // -----------------------------------------------------------------------
    // Content access
    // -----------------------------------------------------------------------

    #[test]
    fn open_returns_exact_content() {
        let block = loaded(b"round trip");
        assert_eq!(read_all(block.open().unwrap()), b"round trip");
    }

    #[test]
    fn open_range_boundaries() {
        let data: &'static [u8] = b"abcdefgh";
        let block = loaded(data);
        let lazy = lazy_copy(&block, data);
        for b in [&block, &lazy] {
            assert!(read_all(b.open_range(3, 3).unwrap()).is_empty());
            assert_eq!(read_all(b.open_range(0, 1).unwrap()), b"a");
            assert_eq!(read_all(b.open_range(7, 8).unwrap()), b"h");
            assert_eq!(read_all(b.open_range(2, 6).unwrap()), b"cdef");
            assert_eq!(read_all(b.open_range(0, 8).unwrap()), data);
        }
    }

    #[test]
    fn open_range_out_of_bounds_is_invalid() {
        let block = loaded(b"12345");
        assert!(matches!(
            block.open_range(0, 6),
            Err(StoreError::InvalidArgument(_))
        ));
        assert!(matches!(
            block.open_range(4, 2),
            Err(StoreError::InvalidArgument(_))
        ));
    }

    #[test]
    fn load_makes_lazy_content_resident() {
        let block = loaded(b"lazy load");
        let lazy = lazy_copy(&block, b"lazy load");
        let resident = lazy.load().unwrap();
        assert!(resident.is_loaded());
        assert_eq!(resident, block);
        assert_eq!(read_all(resident.open().unwrap()), b"lazy load");
    }

    #[test]
    fn validate_checks_hash_and_size() {
        let block = loaded(b"valid");
        block.validate().unwrap();

        let wrong_size = Block::from_reader(block.id().clone(), 99, || -> io::Result<ContentStream> {
            Ok(Box::new(Cursor::new(&b"valid"[..])))
        });
        assert!(matches!(
            wrong_size.validate(),
            Err(StoreError::InvalidBlock { .. })
        ));
    }

    // -----------------------------------------------------------------------
    // Derived values
    // -----------------------------------------------------------------------

    #[test]
    fn reserved_fields_cannot_be_set() {
        let block = loaded(b"reserved");
        for key in RESERVED_KEYS {
            assert!(matches!(
                block.with_attr(key, 1),
                Err(StoreError::InvalidArgument(_))
            ));
        }
        let mut attrs = Attrs::new();
        attrs.insert("ok".into(), json!(true));
        attrs.insert("size".into(), json!(0));
        assert!(block.with_attrs(attrs).is_err());
        assert!(block.attrs().is_empty());
    }

    #[test]
    fn uniform_attribute_access() {
        let block = loaded(b"access").with_attr("label", "x").unwrap();
        assert_eq!(block.attr("size"), Some(json!(6)));
        assert_eq!(block.attr("id"), Some(json!(block.id().to_base58())));
        assert_eq!(block.attr("label"), Some(json!("x")));
        assert_eq!(block.attr("missing"), None);
    }

    #[test]
    fn rewrap_preserves_identity() {
        let block = loaded(b"rewrap").with_attr("k", "v").unwrap().with_meta("m", 1);
        let rewrapped = block.rewrap(|content| {
            let bytes = content.read_to_bytes().unwrap();
            Content::reader(move || -> io::Result<ContentStream> {
                Ok(Box::new(Cursor::new(bytes.clone())))
            })
        });
        assert_eq!(rewrapped, block);
        assert_eq!(rewrapped.meta(), block.meta());
        assert!(!rewrapped.is_loaded());
        assert_eq!(read_all(rewrapped.open().unwrap()), b"rewrap");
    }

    #[test]
    fn strip_clears_attrs_and_meta() {
        let block = loaded(b"strip").with_attr("k", "v").unwrap().with_meta("m", 1);
        let stripped = block.strip();
        assert!(stripped.attrs().is_empty());
        assert!(stripped.meta().is_empty());
        assert!(stripped.is_loaded());
        assert_eq!(stripped, loaded(b"strip"));
    }

    #[test]
    fn merge_requires_matching_ids() {
        let err = loaded(b"one").merge(&loaded(b"two")).unwrap_err();
        assert!(matches!(err, StoreError::InvalidArgument(_)));
    }

    #[test]
    fn merge_takes_other_content_and_deep_merges_attrs() {
        let base = loaded(b"merge");
        let a = base
            .with_attr("shared", "a")
            .unwrap()
            .with_attr("only_a", 1)
            .unwrap()
            .with_attr("nested", json!({"x": 1, "y": {"p": 1}}))
            .unwrap();
        let b = lazy_copy(&base, b"merge")
            .with_attr("shared", "b")
            .unwrap()
            .with_attr("nested", json!({"y": {"q": 2}}))
            .unwrap()
            .with_meta("tier", "cold");

        let merged = a.merge(&b).unwrap();
        assert!(!merged.is_loaded());
        assert_eq!(merged.size(), 5);
        assert_eq!(merged.attr("shared"), Some(json!("b")));
        assert_eq!(merged.attr("only_a"), Some(json!(1)));
        assert_eq!(merged.attr("nested"), Some(json!({"x": 1, "y": {"p": 1, "q": 2}})));
        assert_eq!(merged.meta().get("tier"), Some(&json!("cold")));
    }

    #[test]
    fn merge_of_plain_blocks_has_no_attrs() {
        let a = loaded(b"plain");
        let merged = a.merge(&a.strip()).unwrap();
        assert!(merged.attrs().is_empty());
        assert!(merged.meta().is_empty());
    }

    #[test]
    fn display_shows_id_and_size() {
        let block = loaded(b"display");
        assert_eq!(block.to_string(), format!("Block[{} 7]", block.id()));
    }

    proptest! {
        #[test]
        fn hashing_identical_bytes_is_deterministic(data in proptest::collection::vec(any::<u8>(), 1..512)) {
            let a = Block::read(&data[..]).unwrap().unwrap();
            let b = Block::read(&data[..]).unwrap().unwrap();
            prop_assert_eq!(a.id(), b.id());
            prop_assert_eq!(a.size(), data.len() as u64);
            prop_assert_eq!(a, b);
        }

        #[test]
        fn range_matches_slice(data in proptest::collection::vec(any::<u8>(), 1..128),
                               x in any::<prop::sample::Index>(),
                               y in any::<prop::sample::Index>()) {
            let block = Block::read(&data[..]).unwrap().unwrap();
            let (a, b) = {
                let i = x.index(data.len() + 1);
                let j = y.index(data.len() + 1);
                (i.min(j), i.max(j))
            };
            let got = read_all(block.open_range(a as u64, b as u64).unwrap());
            prop_assert_eq!(&got[..], &data[a..b]);
        }
    }
}
