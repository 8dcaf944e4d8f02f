use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// Storage-specific Result type
pub type Result<T> = std::result::Result<T, StorageError>;

#[derive(Debug, Clone, Serialize, Deserialize, thiserror::Error)]
pub enum StorageError {
    #[error("Read error: {0}")]
    ReadError(String),
    #[error("Write error: {0}")]
    WriteError(String),
    #[error("Invalid data: {0}")]
    InvalidData(String),
    #[error("Storage error: {0}")]
    Other(String),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageStats {
    pub total_size: u64,
    pub num_entries: u64,
}

/// Flat key-value port the registry is scoped to.
///
/// Implementations are driven by a single invocation at a time, so writes
/// take `&mut self` and no interior locking is expected.
pub trait Storage: Send + Sync {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>>;
    fn put(&mut self, key: &[u8], value: &[u8]) -> Result<()>;
    fn get_stats(&self) -> Result<StorageStats>;

    /// Make buffered writes durable
    fn flush(&mut self) -> Result<()> {
        Ok(())
    }

    /// Apply one invocation's writes as a unit and make them durable.
    /// On `Err` none of `writes` is visible.
    fn commit(&mut self, writes: BTreeMap<Vec<u8>, Vec<u8>>) -> Result<()>;

    fn exists(&self, key: &[u8]) -> Result<bool> {
        Ok(self.get(key)?.is_some())
    }
}

pub mod file;
pub mod keys;
pub mod memory;
pub mod overlay;

pub use file::FileStorage;
pub use memory::MemoryStorage;
pub use overlay::OverlayStorage;
