//! Registry state machine.
//!
//! [`Registry`] holds nothing but a handle to the key-value port, the policy
//! constants and the event sink. Each operation reads the entities it needs,
//! validates every precondition, and only then writes. An operation that
//! returns `Err` has not written anything.

pub mod files;
pub mod health;
pub mod nodes;
pub mod selector;

pub use health::PingPolicy;
pub use selector::{EntropySource, FixedEntropy};

use crate::codec;
use crate::config::RegistryConfig;
use crate::error::{display_id, RegistryError, Result};
use crate::events::{EventSink, RegistryEvent};
use crate::storage::{keys, Storage};
use crate::types::{FileRecord, Node};
use std::sync::Arc;

pub struct Registry<S: Storage> {
    store: S,
    config: Arc<RegistryConfig>,
    events: Arc<dyn EventSink>,
}

impl<S: Storage> Registry<S> {
    pub fn new(store: S, config: Arc<RegistryConfig>, events: Arc<dyn EventSink>) -> Self {
        Self {
            store,
            config,
            events,
        }
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    pub(crate) fn emit(&self, event: RegistryEvent) {
        self.events.notify(&event);
    }

    /// Emit a `verification(nodeID, fileID)` event. No state change.
    pub fn notify_verification_target(&self, node_id: &[u8], file_id: &[u8]) {
        self.emit(RegistryEvent::Verification {
            node_id: node_id.to_vec(),
            file_id: file_id.to_vec(),
        });
    }

    /// Emit a `consensus(fileID, ...)` event with empty result fields.
    /// No state change.
    pub fn check_verification(&self, file_id: &[u8]) {
        self.emit(RegistryEvent::Consensus {
            file_id: file_id.to_vec(),
            result: vec![Vec::new(); 4],
        });
    }

    // Entity access

    pub(crate) fn find_node(&self, node_id: &[u8]) -> Result<Option<Node>> {
        match self.store.get(&keys::node_record(node_id))? {
            Some(raw) => Ok(Some(codec::decode_node(&raw)?)),
            None => Ok(None),
        }
    }

    pub(crate) fn load_node(&self, node_id: &[u8]) -> Result<Node> {
        self.find_node(node_id)?
            .ok_or_else(|| RegistryError::NotFound(display_id(node_id)))
    }

    pub(crate) fn save_node(&mut self, node_id: &[u8], node: &Node) -> Result<()> {
        let raw = codec::encode_node(node)?;
        self.store.put(&keys::node_record(node_id), &raw)?;
        Ok(())
    }

    pub(crate) fn find_file(&self, file_id: &[u8]) -> Result<Option<FileRecord>> {
        match self.store.get(&keys::file_record(file_id))? {
            Some(raw) => Ok(Some(codec::decode_file(&raw)?)),
            None => Ok(None),
        }
    }

    pub(crate) fn load_file(&self, file_id: &[u8]) -> Result<FileRecord> {
        self.find_file(file_id)?
            .ok_or_else(|| RegistryError::NoSuchFile(display_id(file_id)))
    }

    pub(crate) fn save_file(&mut self, file_id: &[u8], file: &FileRecord) -> Result<()> {
        let raw = codec::encode_file(file)?;
        self.store.put(&keys::file_record(file_id), &raw)?;
        Ok(())
    }

    /// Absent counters read as zero
    pub(crate) fn read_counter(&self, key: &[u8]) -> Result<u64> {
        match self.store.get(key)? {
            Some(raw) => Ok(codec::decode_counter(&raw)?),
            None => Ok(0),
        }
    }

    pub(crate) fn write_counter(&mut self, key: &[u8], value: u64) -> Result<()> {
        self.store.put(key, &codec::encode_counter(value))?;
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::events::MemoryEventSink;
    use crate::storage::MemoryStorage;
    use num_bigint::BigUint;

    pub const OWNER: &[u8] = b"owner-script-hash";

    pub fn registry() -> (Registry<MemoryStorage>, Arc<MemoryEventSink>) {
        registry_with(RegistryConfig::default())
    }

    pub fn registry_with(config: RegistryConfig) -> (Registry<MemoryStorage>, Arc<MemoryEventSink>) {
        let sink = Arc::new(MemoryEventSink::new());
        let registry = Registry::new(MemoryStorage::new(), Arc::new(config), sink.clone());
        (registry, sink)
    }

    pub fn big(v: u64) -> BigUint {
        BigUint::from(v)
    }

    pub fn register(registry: &mut Registry<MemoryStorage>, node_id: &str, size: u64) {
        registry
            .register(
                node_id.as_bytes(),
                big(size),
                b"127.0.0.1:8080",
                b"127.0.0.1:9090",
                b"@contact",
                OWNER,
            )
            .unwrap();
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;

    #[test]
    fn test_verification_events() {
        let (registry, sink) = registry();
        registry.notify_verification_target(b"n1", b"f1");
        registry.check_verification(b"f1");

        let events = sink.published();
        assert_eq!(
            events[0],
            RegistryEvent::Verification {
                node_id: b"n1".to_vec(),
                file_id: b"f1".to_vec()
            }
        );
        match &events[1] {
            RegistryEvent::Consensus { file_id, result } => {
                assert_eq!(file_id, b"f1");
                assert!(result.iter().all(|field| field.is_empty()));
            }
            other => panic!("unexpected event {:?}", other),
        }
        assert_eq!(registry.store().len(), 0);
    }

    #[test]
    fn test_corrupt_node_record_surfaces_codec_error() {
        let (registry, _) = registry();
        let mut store = registry.into_store();
        store.put(b"n1", &[42, 1, 2]).unwrap();
        let registry = Registry::new(
            store,
            Arc::new(RegistryConfig::default()),
            Arc::new(crate::events::LogEventSink),
        );
        assert!(matches!(
            registry.get_info(b"n1"),
            Err(RegistryError::Codec(_))
        ));
    }
}
