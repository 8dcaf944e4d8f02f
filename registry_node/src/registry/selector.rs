//! Peer and ping-target selection.

use super::Registry;
use crate::error::{display_id, RegistryError, Result};
use crate::storage::Storage;
use log::debug;
use num_bigint::BigUint;
use num_traits::{ToPrimitive, Zero};

/// Source of the shared randomness ping targets are derived from.
///
/// The same entropy, nonce and registry size always select the same node,
/// so anyone who knows the block hash can recompute the choice.
pub trait EntropySource {
    /// Entropy bytes, read as an unsigned little-endian integer
    fn entropy(&self) -> Vec<u8>;
}

/// Entropy fixed at construction
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FixedEntropy(pub Vec<u8>);

impl EntropySource for FixedEntropy {
    fn entropy(&self) -> Vec<u8> {
        self.0.clone()
    }
}

/// `1 + (entropy + nonce) mod nodes`: a 1-based enumeration position
pub fn target_index(entropy: &[u8], nonce: &[u8], nodes: u64) -> Result<u64> {
    if nodes == 0 {
        return Err(RegistryError::NoNodes);
    }
    let rand = BigUint::from_bytes_le(entropy) + BigUint::from_bytes_le(nonce);
    let offset = (rand % BigUint::from(nodes))
        .to_u64()
        .ok_or(RegistryError::NoNodes)?;
    Ok(1 + offset)
}

impl<S: Storage> Registry<S> {
    /// Up to `want` node ids with at least `min_free` free space, in
    /// enumeration order. Banned nodes are not filtered out.
    pub fn get_peers(&self, min_free: &BigUint, want: usize) -> Result<Vec<Vec<u8>>> {
        let mut peers = Vec::new();
        if want == 0 {
            return Ok(peers);
        }

        for index in 1..self.next_node_index()? {
            let Some(node_id) = self.node_at(index)? else {
                continue;
            };
            let Some(node) = self.find_node(&node_id)? else {
                debug!("Index {} points at missing node {}", index, display_id(&node_id));
                continue;
            };
            if &node.free >= min_free {
                peers.push(node_id);
                if peers.len() == want {
                    break;
                }
            }
        }
        Ok(peers)
    }

    /// Node to health-check this round, derived from `entropy` and `nonce`
    pub fn get_ping_target(&self, entropy: &dyn EntropySource, nonce: &[u8]) -> Result<Vec<u8>> {
        let nodes = self.node_count()?;
        let index = target_index(&entropy.entropy(), nonce, nodes)?;
        let node_id = self
            .node_at(index)?
            .ok_or_else(|| RegistryError::NotFound(format!("node index {}", index)))?;
        debug!(
            "Ping target {} at index {} of {}",
            display_id(&node_id),
            index,
            nodes
        );
        Ok(node_id)
    }
}

/// Convert a requested count to `usize`, saturating on overflow
pub fn want_count(count: &BigUint) -> usize {
    if count.is_zero() {
        return 0;
    }
    count.to_usize().unwrap_or(usize::MAX)
}
