//! In-process execution host.
//!
//! Invocations are serialized through an async mutex. Each one runs against
//! a write overlay of the store; the overlay and the events it produced are
//! committed only when the operation returns `Ok`.

use crate::config::RegistryConfig;
use crate::dispatch::{dispatch, Value};
use crate::error::Result;
use crate::events::{EventSink, RegistryEvent};
use crate::registry::{EntropySource, Registry};
use crate::storage::{OverlayStorage, Storage};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex as StdMutex};
use tokio::sync::Mutex;

/// Block-level facts supplied with every invocation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostContext {
    pub height: u64,
    /// Seconds since the epoch
    pub timestamp: u64,
    pub block_hash: Vec<u8>,
    /// Identity of the invoking account
    pub caller: Vec<u8>,
}

impl EntropySource for HostContext {
    fn entropy(&self) -> Vec<u8> {
        self.block_hash.clone()
    }
}

/// Holds events until the invocation outcome is known
#[derive(Default)]
struct PendingEvents {
    events: StdMutex<Vec<RegistryEvent>>,
}

impl PendingEvents {
    fn take(&self) -> Vec<RegistryEvent> {
        self.events
            .lock()
            .map(|mut events| std::mem::take(&mut *events))
            .unwrap_or_default()
    }
}

impl EventSink for PendingEvents {
    fn notify(&self, event: &RegistryEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
    }
}

pub struct RegistryHost<S: Storage> {
    store: Mutex<S>,
    config: Arc<RegistryConfig>,
    events: Arc<dyn EventSink>,
}

impl<S: Storage> RegistryHost<S> {
    pub fn new(store: S, config: RegistryConfig, events: Arc<dyn EventSink>) -> Self {
        Self {
            store: Mutex::new(store),
            config: Arc::new(config),
            events,
        }
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Run one operation atomically.
    ///
    /// On error the store is left untouched and only the entry diagnostic
    /// is forwarded to the event sink.
    pub async fn invoke(&self, op: &str, args: &[Value], ctx: &HostContext) -> Result<Vec<Value>> {
        let mut store = self.store.lock().await;
        let pending = Arc::new(PendingEvents::default());

        let (outcome, writes) = {
            let mut registry = Registry::new(
                OverlayStorage::new(&*store),
                self.config.clone(),
                pending.clone(),
            );
            let outcome = dispatch(&mut registry, ctx, op, args);
            (outcome, registry.into_store().into_writes())
        };

        let events = pending.take();
        let count = writes.len();
        let outcome = outcome.and_then(|values| {
            store.commit(writes)?;
            Ok(values)
        });

        match outcome {
            Ok(values) => {
                for event in &events {
                    self.events.notify(event);
                }
                debug!("{} committed {} writes at height {}", op, count, ctx.height);
                Ok(values)
            }
            Err(err) => {
                for event in events
                    .iter()
                    .filter(|e| matches!(e, RegistryEvent::Invoked { .. }))
                {
                    self.events.notify(event);
                }
                warn!("{} aborted, {} writes discarded: {}", op, count, err);
                Err(err)
            }
        }
    }

    /// Inspect the committed store
    pub async fn with_store<R>(&self, f: impl FnOnce(&S) -> R) -> R {
        let store = self.store.lock().await;
        f(&store)
    }

    pub fn into_store(self) -> S {
        self.store.into_inner()
    }
}
