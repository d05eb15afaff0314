use std::fmt;
use std::sync::Arc;

use blocks_types::Multihash;
use sha2::Digest;

/// A registered hash algorithm: display name, multihash code, digest function.
pub struct Algorithm {
    /// Registry name, e.g. `"sha2-256"`.
    pub name: &'static str,
    /// Multicodec code written into the multihash header.
    pub code: u64,
    digest: fn(&[u8]) -> Vec<u8>,
}

impl Algorithm {
    /// Raw digest of `data`, without multihash framing.
    pub fn digest(&self, data: &[u8]) -> Vec<u8> {
        (self.digest)(data)
    }
}

impl fmt::Debug for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Algorithm")
            .field("name", &self.name)
            .field("code", &format_args!("{:#x}", self.code))
            .finish()
    }
}

fn sha2_256(data: &[u8]) -> Vec<u8> {
    sha2::Sha256::digest(data).to_vec()
}

fn sha2_512(data: &[u8]) -> Vec<u8> {
    sha2::Sha512::digest(data).to_vec()
}

fn blake3_256(data: &[u8]) -> Vec<u8> {
    blake3::hash(data).as_bytes().to_vec()
}

/// Name of the algorithm used when a caller does not pick one.
pub const DEFAULT_ALGORITHM: &str = "sha2-256";

/// The fixed process-wide algorithm table.
pub static ALGORITHMS: [Algorithm; 3] = [
    Algorithm {
        name: "sha2-256",
        code: 0x12,
        digest: sha2_256,
    },
    Algorithm {
        name: "sha2-512",
        code: 0x13,
        digest: sha2_512,
    },
    Algorithm {
        name: "blake3",
        code: 0x1e,
        digest: blake3_256,
    },
];

/// Look up a registered algorithm by name.
pub fn algorithm_for_name(name: &str) -> Option<&'static Algorithm> {
    ALGORITHMS.iter().find(|alg| alg.name == name)
}

/// Look up a registered algorithm by multihash code.
pub fn algorithm_for_code(code: u64) -> Option<&'static Algorithm> {
    ALGORITHMS.iter().find(|alg| alg.code == code)
}

/// A caller-supplied hash function returning an *encoded* multihash.
///
/// The output is untrusted: [`Hasher::hash`] checks that it decodes.
pub type HashFn = Arc<dyn Fn(&[u8]) -> Vec<u8> + Send + Sync>;

/// How a caller names a hash function: by registry name, or directly.
#[derive(Clone)]
pub enum HashDesignator {
    /// A name from [`ALGORITHMS`].
    Named(String),
    /// An unregistered function.
    Custom(HashFn),
}

impl HashDesignator {
    /// Wrap a closure as a custom designator.
    pub fn custom<F>(f: F) -> Self
    where
        F: Fn(&[u8]) -> Vec<u8> + Send + Sync + 'static,
    {
        Self::Custom(Arc::new(f))
    }
}

impl From<&str> for HashDesignator {
    fn from(name: &str) -> Self {
        Self::Named(name.to_string())
    }
}

impl From<String> for HashDesignator {
    fn from(name: String) -> Self {
        Self::Named(name)
    }
}

impl fmt::Debug for HashDesignator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Named(name) => f.debug_tuple("Named").field(name).finish(),
            Self::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

#[derive(Clone)]
enum HasherKind {
    Registered(&'static Algorithm),
    Custom(HashFn),
}

/// Checked content hasher.
///
/// Resolved from a [`HashDesignator`]; every digest it produces is verified
/// to be a well-formed [`Multihash`] before it is handed back.
#[derive(Clone)]
pub struct Hasher {
    kind: HasherKind,
}

impl Hasher {
    /// Resolve a designator. `None` is rejected rather than defaulted.
    pub fn resolve(designator: Option<&HashDesignator>) -> Result<Self, HasherError> {
        match designator {
            None => Err(HasherError::MissingDesignator),
            Some(HashDesignator::Named(name)) => Self::named(name),
            Some(HashDesignator::Custom(f)) => Ok(Self {
                kind: HasherKind::Custom(Arc::clone(f)),
            }),
        }
    }

    /// Resolve a registered algorithm by name.
    pub fn named(name: &str) -> Result<Self, HasherError> {
        algorithm_for_name(name)
            .map(|alg| Self {
                kind: HasherKind::Registered(alg),
            })
            .ok_or_else(|| HasherError::UnknownAlgorithm(name.to_string()))
    }

    /// Resolve the registered algorithm that produced ids with this code.
    pub fn for_code(code: u64) -> Result<Self, HasherError> {
        algorithm_for_code(code)
            .map(|alg| Self {
                kind: HasherKind::Registered(alg),
            })
            .ok_or(HasherError::UnknownCode(code))
    }

    /// Registry name, or `None` for a custom function.
    pub fn name(&self) -> Option<&'static str> {
        match self.kind {
            HasherKind::Registered(alg) => Some(alg.name),
            HasherKind::Custom(_) => None,
        }
    }

    /// Hash `data` into a validated multihash.
    ///
    /// A result that is not a valid multihash means the hash function itself
    /// is broken and is reported as [`HasherError::InvariantViolation`].
    pub fn hash(&self, data: &[u8]) -> Result<Multihash, HasherError> {
        match &self.kind {
            HasherKind::Registered(alg) => {
                Multihash::new(alg.code, &alg.digest(data)).map_err(|e| {
                    HasherError::InvariantViolation {
                        hasher: alg.name.to_string(),
                        reason: e.to_string(),
                    }
                })
            }
            HasherKind::Custom(f) => Multihash::from_bytes(&f(data)).map_err(|e| {
                HasherError::InvariantViolation {
                    hasher: "custom".to_string(),
                    reason: e.to_string(),
                }
            }),
        }
    }

    /// Verify that `data` hashes to `expected`.
    pub fn verify(&self, data: &[u8], expected: &Multihash) -> Result<bool, HasherError> {
        Ok(self.hash(data)? == *expected)
    }
}

impl Default for Hasher {
    fn default() -> Self {
        // ALGORITHMS[0] is DEFAULT_ALGORITHM.
        Self {
            kind: HasherKind::Registered(&ALGORITHMS[0]),
        }
    }
}

impl fmt::Debug for Hasher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            HasherKind::Registered(alg) => write!(f, "Hasher({})", alg.name),
            HasherKind::Custom(_) => f.write_str("Hasher(custom)"),
        }
    }
}

/// Errors from hasher resolution and hashing.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum HasherError {
    #[error("no hash algorithm designator given")]
    MissingDesignator,

    #[error("unknown hash algorithm: {0}")]
    UnknownAlgorithm(String),

    #[error("no registered hash algorithm for code {0:#x}")]
    UnknownCode(u64),

    /// The hash function returned something that is not a multihash.
    #[error("hash function {hasher} produced an invalid identifier: {reason}")]
    InvariantViolation { hasher: String, reason: String },
}
