//! Registry entities.
//!
//! Field order in [`Node`] and [`FileRecord`] is the serialization order; a
//! change here needs a new codec version.

use num_bigint::BigUint;
use serde::{Deserialize, Serialize};

/// Provider status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    Normal,
    Banned,
}

impl Role {
    /// Wire code returned by `getinfo`
    pub fn code(self) -> u8 {
        match self {
            Role::Normal => 0x01,
            Role::Banned => 0x02,
        }
    }
}

/// A registered storage provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    /// Pledged capacity
    pub size: BigUint,
    /// Unallocated capacity, never above `size`
    pub free: BigUint,
    /// 1-based enumeration position
    pub index: u64,
    /// Consecutive ping failure counter
    pub fping: u64,
    /// Timestamp of the most recent ping failure
    pub last_failure: Option<u64>,
    pub role: Role,
    pub api_addr: Vec<u8>,
    pub rpc_addr: Vec<u8>,
    pub contact: Vec<u8>,
    /// Caller that registered the node
    pub owner: Vec<u8>,
}

impl Node {
    pub fn new(
        index: u64,
        size: BigUint,
        api_addr: Vec<u8>,
        rpc_addr: Vec<u8>,
        contact: Vec<u8>,
        owner: Vec<u8>,
    ) -> Self {
        Self {
            free: size.clone(),
            size,
            index,
            fping: 0,
            last_failure: None,
            role: Role::Normal,
            api_addr,
            rpc_addr,
            contact,
            owner,
        }
    }

    pub fn is_banned(&self) -> bool {
        self.role == Role::Banned
    }

    pub fn info(&self) -> NodeInfo {
        NodeInfo {
            size: self.size.clone(),
            free: self.free.clone(),
            api_addr: self.api_addr.clone(),
            rpc_addr: self.rpc_addr.clone(),
            role: self.role,
        }
    }
}

/// Public view of a node returned by `getinfo`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeInfo {
    pub size: BigUint,
    pub free: BigUint,
    pub api_addr: Vec<u8>,
    pub rpc_addr: Vec<u8>,
    pub role: Role,
}

/// An uploaded file and the nodes holding a replica of it
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    pub size: BigUint,
    /// Replica holders in slot order, at most `replica_slots` long
    pub replicas: Vec<Vec<u8>>,
}

impl FileRecord {
    pub fn new(size: BigUint) -> Self {
        Self {
            size,
            replicas: Vec::new(),
        }
    }

    /// Replica slots padded with empty ids up to `slots` entries
    pub fn slots(&self, slots: usize) -> Vec<Vec<u8>> {
        let mut out: Vec<Vec<u8>> = self.replicas.iter().take(slots).cloned().collect();
        out.resize(slots, Vec::new());
        out
    }
}
