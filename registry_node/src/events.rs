//! Notifications emitted by the registry. Fire-and-forget: the registry
//! never reads them back.

use crate::error::display_id;
use log::{debug, info};
use num_bigint::BigUint;
use serde::Serialize;
use std::sync::Mutex;

pub const CONSENSUS_RESULT_EVENT: &str = "consensus";
pub const VERIFICATION_TARGET_EVENT: &str = "verification";
pub const NODE_LISTED_EVENT: &str = "node";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum RegistryEvent {
    /// Diagnostic emitted on every operation entry
    Invoked {
        operation: String,
        args: Vec<String>,
    },
    /// A node was picked to have a file verified
    Verification { node_id: Vec<u8>, file_id: Vec<u8> },
    /// Verification outcome for a file. The result fields are not populated
    /// yet and are always empty.
    Consensus {
        file_id: Vec<u8>,
        result: Vec<Vec<u8>>,
    },
    /// One entry of a `debugprint` enumeration
    NodeListed { node_id: Vec<u8>, size: BigUint },
}

impl RegistryEvent {
    pub fn name(&self) -> &str {
        match self {
            RegistryEvent::Invoked { operation, .. } => operation,
            RegistryEvent::Verification { .. } => VERIFICATION_TARGET_EVENT,
            RegistryEvent::Consensus { .. } => CONSENSUS_RESULT_EVENT,
            RegistryEvent::NodeListed { .. } => NODE_LISTED_EVENT,
        }
    }
}

pub trait EventSink: Send + Sync {
    fn notify(&self, event: &RegistryEvent);
}

/// Forwards events to the `log` facade
#[derive(Debug, Default, Clone, Copy)]
pub struct LogEventSink;

impl EventSink for LogEventSink {
    fn notify(&self, event: &RegistryEvent) {
        match event {
            RegistryEvent::Invoked { operation, args } => {
                debug!("exec: {} {:?}", operation, args);
            }
            RegistryEvent::Verification { node_id, file_id } => {
                info!(
                    "{}: node={} file={}",
                    event.name(),
                    display_id(node_id),
                    display_id(file_id)
                );
            }
            RegistryEvent::Consensus { file_id, .. } => {
                info!("{}: file={}", event.name(), display_id(file_id));
            }
            RegistryEvent::NodeListed { node_id, size } => {
                info!("{}: {} size={}", event.name(), display_id(node_id), size);
            }
        }
    }
}

/// Keeps every event in memory, for tests and the CLI transcript
#[derive(Debug, Default)]
pub struct MemoryEventSink {
    events: Mutex<Vec<RegistryEvent>>,
}

impl MemoryEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<RegistryEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    /// Events other than the per-operation diagnostics
    pub fn published(&self) -> Vec<RegistryEvent> {
        self.events()
            .into_iter()
            .filter(|e| !matches!(e, RegistryEvent::Invoked { .. }))
            .collect()
    }

    pub fn drain(&self) -> Vec<RegistryEvent> {
        self.events
            .lock()
            .map(|mut events| std::mem::take(&mut *events))
            .unwrap_or_default()
    }
}

impl EventSink for MemoryEventSink {
    fn notify(&self, event: &RegistryEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
    }
}
