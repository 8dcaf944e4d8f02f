//! Upload accounting, replica slots and per-node file lists.

use super::Registry;
use crate::error::{display_id, RegistryError, Result};
use crate::ledger;
use crate::storage::{keys, Storage};
use crate::types::FileRecord;
use log::{debug, warn};
use num_bigint::BigUint;

/// Put `node_id` in the first free replica slot. Returns false when the
/// node already holds a slot or all `slots` are taken.
pub fn assign_replica(file: &mut FileRecord, node_id: &[u8], slots: usize) -> bool {
    if file.replicas.iter().any(|holder| holder.as_slice() == node_id) {
        return false;
    }
    if file.replicas.len() >= slots {
        return false;
    }
    file.replicas.push(node_id.to_vec());
    true
}

impl<S: Storage> Registry<S> {
    /// Account an upload of `size` bytes of `file_id` onto `node_id`.
    /// Returns the node's remaining free capacity.
    pub fn confirm_upload(
        &mut self,
        node_id: &[u8],
        file_id: &[u8],
        size: BigUint,
        caller: &[u8],
    ) -> Result<BigUint> {
        let mut node = self.load_node(node_id)?;
        let free = ledger::allocate(&node.free, &size)?;
        let mut file = self.find_file(file_id)?.unwrap_or_default();
        let count_key = keys::node_file_count(node_id);
        let position = self.read_counter(&count_key)?.checked_add(1).ok_or_else(|| {
            RegistryError::invalid_argument("confirmupload", "file list of node is full")
        })?;

        node.free = free;
        file.size = size;
        let slots = self.config.replica_slots;
        if !assign_replica(&mut file, node_id, slots) {
            debug!(
                "{} not recorded as replica of {} (slots full or already holder)",
                display_id(node_id),
                display_id(file_id)
            );
        }

        self.write_counter(&count_key, position)?;
        self.store
            .put(&keys::node_file_slot(node_id, position), file_id)?;
        self.save_node(node_id, &node)?;
        self.save_file(file_id, &file)?;

        debug!(
            "Upload of {} ({} bytes) confirmed on {} by {}, {} free",
            display_id(file_id),
            file.size,
            display_id(node_id),
            display_id(caller),
            node.free
        );
        Ok(node.free)
    }

    /// Re-account an existing file that now has `new_size` bytes.
    /// Returns the node's remaining free capacity.
    pub fn confirm_update(
        &mut self,
        node_id: &[u8],
        file_id: &[u8],
        new_size: BigUint,
    ) -> Result<BigUint> {
        let mut node = self.load_node(node_id)?;
        let mut file = self.load_file(file_id)?;
        let credit = ledger::resize(&node.free, &node.size, &file.size, &new_size)?;
        if credit.clamped {
            warn!(
                "Update of {} would lift free space of {} above its pledge, capped at {}",
                display_id(file_id),
                display_id(node_id),
                node.size
            );
        }

        node.free = credit.free;
        file.size = new_size;
        self.save_node(node_id, &node)?;
        self.save_file(file_id, &file)?;
        Ok(node.free)
    }

    /// Return `size` bytes to the node's free pool. The amount is taken on
    /// the caller's word and is not checked against the file record.
    pub fn notify_space_freed(
        &mut self,
        node_id: &[u8],
        file_id: &[u8],
        size: BigUint,
    ) -> Result<()> {
        let mut node = self.load_node(node_id)?;
        let credit = ledger::release(&node.free, &node.size, &size);
        if credit.clamped {
            warn!(
                "Freeing {} bytes of {} on {} exceeds its pledge, capped at {}",
                size,
                display_id(file_id),
                display_id(node_id),
                node.size
            );
        }

        node.free = credit.free;
        self.save_node(node_id, &node)
    }

    pub fn get_file_size(&self, file_id: &[u8]) -> Result<BigUint> {
        Ok(self.load_file(file_id)?.size)
    }

    /// Replica holders of `file_id`, one entry per slot, empty for unused
    /// slots and for unknown files
    pub fn get_storing_peers(&self, file_id: &[u8]) -> Result<Vec<Vec<u8>>> {
        let slots = self.config.replica_slots;
        Ok(self
            .find_file(file_id)?
            .map(|file| file.slots(slots))
            .unwrap_or_else(|| vec![Vec::new(); slots]))
    }

    /// Number of upload confirmations recorded for `node_id`
    pub fn get_files_number(&self, node_id: &[u8]) -> Result<u64> {
        self.read_counter(&keys::node_file_count(node_id))
    }

    /// The file at 1-based `position` in the node's file list and its
    /// current size
    pub fn get_file(&self, node_id: &[u8], position: u64) -> Result<(Vec<u8>, BigUint)> {
        let file_id = self
            .store
            .get(&keys::node_file_slot(node_id, position))?
            .ok_or_else(|| {
                RegistryError::NoSuchFile(format!("{}:{}", display_id(node_id), position))
            })?;
        let file = self.load_file(&file_id)?;
        Ok((file_id, file.size))
    }
}
