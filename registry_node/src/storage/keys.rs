//! Persisted key layout.
//!
//! ```text
//! nodes                 next free enumeration index
//! nodes:<i>             node id at enumeration position i (i >= 1)
//! <nodeID>              node record
//! nodef:<nodeID>        number of files held by the node
//! nodef:<nodeID>:<k>    k-th file id held by the node (k >= 1)
//! files:<fileID>        file record
//! ```

pub const NODE_COUNTER: &[u8] = b"nodes";
pub const NODE_SLOT_PREFIX: &[u8] = b"nodes:";
pub const NODE_FILES_PREFIX: &[u8] = b"nodef:";
pub const FILE_PREFIX: &[u8] = b"files:";

const SEPARATOR: u8 = b':';

fn join(prefix: &[u8], id: &[u8]) -> Vec<u8> {
    let mut key = Vec::with_capacity(prefix.len() + id.len());
    key.extend_from_slice(prefix);
    key.extend_from_slice(id);
    key
}

pub fn node_slot(index: u64) -> Vec<u8> {
    join(NODE_SLOT_PREFIX, index.to_string().as_bytes())
}

/// Node records are keyed by the bare identifier
pub fn node_record(node_id: &[u8]) -> Vec<u8> {
    node_id.to_vec()
}

pub fn node_file_count(node_id: &[u8]) -> Vec<u8> {
    join(NODE_FILES_PREFIX, node_id)
}

pub fn node_file_slot(node_id: &[u8], position: u64) -> Vec<u8> {
    let mut key = node_file_count(node_id);
    key.push(SEPARATOR);
    key.extend_from_slice(position.to_string().as_bytes());
    key
}

pub fn file_record(file_id: &[u8]) -> Vec<u8> {
    join(FILE_PREFIX, file_id)
}

/// Node ids share the key space with registry bookkeeping, so ids that
/// would alias a bookkeeping key are refused at registration. The separator
/// is refused anywhere in an id: `nodef:<a>:<k>` must never equal
/// `nodef:<b>` for another node `b`.
pub fn is_reserved_node_id(node_id: &[u8]) -> bool {
    node_id.is_empty()
        || node_id.contains(&SEPARATOR)
        || node_id == NODE_COUNTER
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout() {
        assert_eq!(node_slot(12), b"nodes:12".to_vec());
        assert_eq!(node_record(b"n1"), b"n1".to_vec());
        assert_eq!(node_file_count(b"n1"), b"nodef:n1".to_vec());
        assert_eq!(node_file_slot(b"n1", 3), b"nodef:n1:3".to_vec());
        assert_eq!(file_record(b"f"), b"files:f".to_vec());
    }

    #[test]
    fn test_reserved_ids() {
        assert!(is_reserved_node_id(b""));
        assert!(is_reserved_node_id(b"nodes"));
        assert!(is_reserved_node_id(b"nodes:1"));
        assert!(is_reserved_node_id(b"files:x"));
        assert!(is_reserved_node_id(b"nodef:x"));
        assert!(!is_reserved_node_id(b"nodesmith"));
        assert!(!is_reserved_node_id(b"provider-1"));
        assert!(is_reserved_node_id(b"a:1"));
        assert!(is_reserved_node_id(b":"));
    }

    #[test]
    fn test_file_list_keys_do_not_alias_across_nodes() {
        // a slot of `a` would be the counter of `a:1` if that id were legal
        assert_eq!(node_file_slot(b"a", 1), node_file_count(b"a:1"));
        assert!(is_reserved_node_id(b"a:1"));
        for id in [&b"a"[..], b"ab", b"a1", b"nodes1"] {
            assert_ne!(node_file_count(id), node_file_slot(b"a", 1));
        }
    }
}
