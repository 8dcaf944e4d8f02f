//! Registry state machine for a decentralized storage marketplace.
//!
//! Providers register pledged capacity, clients record uploaded files and
//! the providers holding replicas of them, and a ping health monitor bans
//! providers that keep failing liveness checks. All state lives in a flat
//! key-value [`storage::Storage`] port; every operation is atomic with
//! respect to it.
//!
//! External callers go through [`dispatch::dispatch`] by operation name, or
//! through the in-process [`host::RegistryHost`] which adds serialized,
//! invoke-or-abort execution.

pub mod codec;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod events;
pub mod host;
pub mod ledger;
pub mod registry;
pub mod storage;
pub mod types;

pub use config::RegistryConfig;
pub use dispatch::{dispatch, Operation, Value};
pub use error::{RegistryError, Result};
pub use events::{EventSink, LogEventSink, MemoryEventSink, RegistryEvent};
pub use host::{HostContext, RegistryHost};
pub use registry::{EntropySource, FixedEntropy, PingPolicy, Registry};
pub use storage::{FileStorage, MemoryStorage, Storage};
pub use types::{FileRecord, Node, NodeInfo, Role};
