use super::{Result, Storage, StorageError, StorageStats};
use log::{debug, warn};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Single-file persistent store.
///
/// The whole map lives in memory and is written out with bincode on
/// `flush`. The file is replaced through a temporary sibling so a crash
/// mid-write leaves the previous snapshot intact.
#[derive(Debug)]
pub struct FileStorage {
    path: PathBuf,
    data: BTreeMap<Vec<u8>, Vec<u8>>,
    dirty: bool,
}

impl FileStorage {
    /// Open the store at `path`, loading the existing snapshot if any
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let data = if path.exists() {
            let raw = fs::read(&path)
                .map_err(|e| StorageError::ReadError(format!("{}: {}", path.display(), e)))?;
            bincode::deserialize(&raw)
                .map_err(|e| StorageError::InvalidData(format!("{}: {}", path.display(), e)))?
        } else {
            BTreeMap::new()
        };
        debug!("Opened file storage at {:?} with {} entries", path, data.len());

        Ok(Self {
            path,
            data,
            dirty: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Storage for FileStorage {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        Ok(self.data.get(key).cloned())
    }

    fn put(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        self.data.insert(key.to_vec(), value.to_vec());
        self.dirty = true;
        Ok(())
    }

    fn get_stats(&self) -> Result<StorageStats> {
        Ok(StorageStats {
            total_size: self.data.values().map(|v| v.len() as u64).sum::<u64>(),
            num_entries: self.data.len() as u64,
        })
    }

    fn flush(&mut self) -> Result<()> {
        if !self.dirty {
            return Ok(());
        }

        let encoded = bincode::serialize(&self.data)
            .map_err(|e| StorageError::WriteError(format!("serialize snapshot: {}", e)))?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)
                    .map_err(|e| StorageError::WriteError(format!("{}: {}", parent.display(), e)))?;
            }
        }

        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, encoded)
            .map_err(|e| StorageError::WriteError(format!("{}: {}", tmp.display(), e)))?;
        fs::rename(&tmp, &self.path)
            .map_err(|e| StorageError::WriteError(format!("{}: {}", self.path.display(), e)))?;

        self.dirty = false;
        debug!("Flushed {} entries to {:?}", self.data.len(), self.path);
        Ok(())
    }

    /// The snapshot on disk is replaced by `flush`; if that fails the
    /// previous values are put back in memory so the map matches the file.
    fn commit(&mut self, writes: BTreeMap<Vec<u8>, Vec<u8>>) -> Result<()> {
        let was_dirty = self.dirty;
        let mut previous = Vec::with_capacity(writes.len());
        for (key, value) in writes {
            let old = self.data.insert(key.clone(), value);
            previous.push((key, old));
        }
        self.dirty = true;

        if let Err(e) = self.flush() {
            for (key, old) in previous.into_iter().rev() {
                match old {
                    Some(old) => self.data.insert(key, old),
                    None => self.data.remove(&key),
                };
            }
            self.dirty = was_dirty;
            warn!("Commit to {:?} rolled back: {}", self.path, e);
            return Err(e);
        }
        Ok(())
    }
}
