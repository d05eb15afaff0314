use std::borrow::Borrow;
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Largest digest a [`Multihash`] can carry (sha2-512 size).
pub const MAX_DIGEST_LEN: usize = 64;

type Inner = multihash::Multihash<MAX_DIGEST_LEN>;

/// Self-describing content identifier.
///
/// Wraps a [`multihash::Multihash`] together with its encoded form
/// `varint(code) || varint(len) || digest`, where `code` names the hash
/// algorithm. Equality and ordering follow the encoded bytes, which makes
/// ordering by id identical to ordering by the lowercase hex rendering.
#[derive(Clone, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Multihash {
    inner: Inner,
    encoded: Vec<u8>,
}

impl Multihash {
    /// Build a multihash from an algorithm code and a raw digest.
    pub fn new(code: u64, digest: &[u8]) -> Result<Self, TypeError> {
        if digest.is_empty() {
            return Err(TypeError::EmptyDigest);
        }
        let inner = Inner::wrap(code, digest).map_err(invalid)?;
        Ok(Self::from_inner(inner))
    }

    /// Parse and validate an encoded multihash.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, TypeError> {
        let inner = Inner::from_bytes(bytes).map_err(invalid)?;
        if inner.size() == 0 {
            return Err(TypeError::EmptyDigest);
        }
        Ok(Self::from_inner(inner))
    }

    fn from_inner(inner: Inner) -> Self {
        let encoded = inner.to_bytes();
        Self { inner, encoded }
    }

    /// The multicodec code of the hash algorithm.
    pub fn code(&self) -> u64 {
        self.inner.code()
    }

    /// The raw digest bytes, without the header.
    pub fn digest(&self) -> &[u8] {
        self.inner.digest()
    }

    /// The full encoded form.
    pub fn as_bytes(&self) -> &[u8] {
        &self.encoded
    }

    /// The underlying [`multihash::Multihash`].
    pub fn as_multihash(&self) -> &multihash::Multihash<MAX_DIGEST_LEN> {
        &self.inner
    }

    /// Hex encoding of the full encoded form.
    pub fn to_hex(&self) -> String {
        hex::encode(&self.encoded)
    }

    /// Parse from a hex string of the encoded form.
    pub fn from_hex(s: &str) -> Result<Self, TypeError> {
        let bytes = hex::decode(s).map_err(|e| TypeError::InvalidHex(e.to_string()))?;
        Self::from_bytes(&bytes)
    }

    /// Base58 (bitcoin alphabet) encoding, the usual display form.
    pub fn to_base58(&self) -> String {
        bs58::encode(&self.encoded).into_string()
    }

    /// Parse from a base58 string.
    pub fn from_base58(s: &str) -> Result<Self, TypeError> {
        let bytes = bs58::decode(s)
            .into_vec()
            .map_err(|e| TypeError::InvalidBase58(e.to_string()))?;
        Self::from_bytes(&bytes)
    }
}

impl fmt::Debug for Multihash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Multihash({})", self.to_base58())
    }
}

impl fmt::Display for Multihash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_base58())
    }
}

impl TryFrom<String> for Multihash {
    type Error = TypeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::from_base58(&s)
    }
}

impl From<Multihash> for String {
    fn from(id: Multihash) -> Self {
        id.to_base58()
    }
}

impl std::str::FromStr for Multihash {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_base58(s)
    }
}

impl AsRef<[u8]> for Multihash {
    fn as_ref(&self) -> &[u8] {
        &self.encoded
    }
}

// Eq, Ord and Hash all follow the encoded bytes, so maps keyed by
// `Multihash` can be probed with raw byte slices.
impl Borrow<[u8]> for Multihash {
    fn borrow(&self) -> &[u8] {
        &self.encoded
    }
}

impl From<Inner> for Multihash {
    fn from(inner: Inner) -> Self {
        Self::from_inner(inner)
    }
}

impl PartialEq for Multihash {
    fn eq(&self, other: &Self) -> bool {
        self.encoded == other.encoded
    }
}

impl Eq for Multihash {}

impl Hash for Multihash {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.encoded.hash(state);
    }
}

impl PartialOrd for Multihash {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Multihash {
    fn cmp(&self, other: &Self) -> Ordering {
        self.encoded.cmp(&other.encoded)
    }
}

fn invalid(e: multihash::Error) -> TypeError {
    TypeError::InvalidMultihash(e.to_string())
}
