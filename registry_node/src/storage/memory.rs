use super::{Result, Storage, StorageStats};
use std::collections::BTreeMap;

/// Simple in-memory storage implementation for testing
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryStorage {
    data: BTreeMap<Vec<u8>, Vec<u8>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl Storage for MemoryStorage {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        Ok(self.data.get(key).cloned())
    }

    fn put(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        self.data.insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn get_stats(&self) -> Result<StorageStats> {
        Ok(StorageStats {
            total_size: self.data.values().map(|v| v.len() as u64).sum::<u64>(),
            num_entries: self.data.len() as u64,
        })
    }

    fn commit(&mut self, writes: BTreeMap<Vec<u8>, Vec<u8>>) -> Result<()> {
        self.data.extend(writes);
        Ok(())
    }
}
