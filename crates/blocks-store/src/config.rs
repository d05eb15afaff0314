use serde::{Deserialize, Serialize};

use crate::error::{StoreError, StoreResult};

/// Settings for a [`BufferBlockStore`](crate::BufferBlockStore).
///
/// ```toml
/// # Blocks larger than this bypass the buffer. Omit to buffer everything.
/// max_block_size = 65536
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BufferConfig {
    /// Largest block, in bytes, that is written to the buffer tier.
    pub max_block_size: Option<u64>,
}

impl BufferConfig {
    /// Parse from TOML text.
    pub fn from_toml_str(text: &str) -> StoreResult<Self> {
        toml::from_str(text).map_err(|e| StoreError::Config(e.to_string()))
    }

    /// Render as TOML text.
    pub fn to_toml_string(&self) -> StoreResult<String> {
        toml::to_string(self).map_err(|e| StoreError::Config(e.to_string()))
    }
}
