//! Copy-on-write view over a base store.
//!
//! Reads fall through to the base unless the key was written in this
//! overlay. Writes never reach the base; the owner collects them with
//! [`OverlayStorage::into_writes`] and applies them once the invocation has
//! succeeded, or drops them to abort.

use super::{Result, Storage, StorageStats};
use std::collections::BTreeMap;

pub struct OverlayStorage<'a, S: Storage + ?Sized> {
    base: &'a S,
    writes: BTreeMap<Vec<u8>, Vec<u8>>,
}

impl<'a, S: Storage + ?Sized> OverlayStorage<'a, S> {
    pub fn new(base: &'a S) -> Self {
        Self {
            base,
            writes: BTreeMap::new(),
        }
    }

    pub fn into_writes(self) -> BTreeMap<Vec<u8>, Vec<u8>> {
        self.writes
    }
}

impl<'a, S: Storage + ?Sized> Storage for OverlayStorage<'a, S> {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        match self.writes.get(key) {
            Some(value) => Ok(Some(value.clone())),
            None => self.base.get(key),
        }
    }

    fn put(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        self.writes.insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn get_stats(&self) -> Result<StorageStats> {
        let mut stats = self.base.get_stats()?;
        for (key, value) in &self.writes {
            match self.base.get(key)? {
                Some(old) => {
                    stats.total_size = stats.total_size - old.len() as u64 + value.len() as u64;
                }
                None => {
                    stats.total_size += value.len() as u64;
                    stats.num_entries += 1;
                }
            }
        }
        Ok(stats)
    }

    /// Nested commits fold into this overlay; the base is still untouched
    fn commit(&mut self, writes: BTreeMap<Vec<u8>, Vec<u8>>) -> Result<()> {
        self.writes.extend(writes);
        Ok(())
    }
}
