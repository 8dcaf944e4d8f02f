//! Provider registration, lookup and the global enumeration index.

use super::Registry;
use crate::error::{display_id, RegistryError, Result};
use crate::events::RegistryEvent;
use crate::storage::{keys, Storage};
use crate::types::{Node, NodeInfo};
use log::{debug, info};
use num_bigint::BigUint;

impl<S: Storage> Registry<S> {
    /// Register a new provider owned by `caller`. Returns the pledged size.
    pub fn register(
        &mut self,
        node_id: &[u8],
        size: BigUint,
        api_addr: &[u8],
        rpc_addr: &[u8],
        contact: &[u8],
        caller: &[u8],
    ) -> Result<BigUint> {
        // TODO check the caller's balance covers the pledge once payments land
        if keys::is_reserved_node_id(node_id) {
            return Err(RegistryError::invalid_argument(
                "register",
                format!("node id {:?} is reserved", display_id(node_id)),
            ));
        }
        if self.find_node(node_id)?.is_some() {
            return Err(RegistryError::AlreadyRegistered(display_id(node_id)));
        }

        let index = self.next_node_index()?;
        let next = index.checked_add(1).ok_or_else(|| {
            RegistryError::invalid_argument("register", "node index space exhausted")
        })?;
        let node = Node::new(
            index,
            size.clone(),
            api_addr.to_vec(),
            rpc_addr.to_vec(),
            contact.to_vec(),
            caller.to_vec(),
        );

        self.store.put(&keys::node_slot(index), node_id)?;
        self.save_node(node_id, &node)?;
        self.write_counter(keys::NODE_COUNTER, next)?;

        info!(
            "Registered provider {} at index {} with {} bytes",
            display_id(node_id),
            index,
            size
        );
        Ok(size)
    }

    pub fn get_info(&self, node_id: &[u8]) -> Result<NodeInfo> {
        Ok(self.load_node(node_id)?.info())
    }

    /// Replace the node's API address. Only the registering owner may do so.
    pub fn update_address(
        &mut self,
        node_id: &[u8],
        api_addr: &[u8],
        caller: &[u8],
    ) -> Result<Vec<u8>> {
        let mut node = self.load_node(node_id)?;
        if node.owner != caller {
            return Err(RegistryError::Unauthorized(display_id(node_id)));
        }

        node.api_addr = api_addr.to_vec();
        self.save_node(node_id, &node)?;
        debug!("Updated API address of {}", display_id(node_id));
        Ok(node.api_addr)
    }

    /// Next free enumeration index. Starts at 1.
    pub fn next_node_index(&self) -> Result<u64> {
        Ok(self.read_counter(keys::NODE_COUNTER)?.max(1))
    }

    /// Number of enumerable nodes
    pub fn node_count(&self) -> Result<u64> {
        Ok(self.next_node_index()? - 1)
    }

    /// Node id stored at enumeration position `index`
    pub fn node_at(&self, index: u64) -> Result<Option<Vec<u8>>> {
        Ok(self.store.get(&keys::node_slot(index))?)
    }

    /// Enumerate all nodes in index order, emitting one event per node
    pub fn debug_print(&self) -> Result<Vec<(Vec<u8>, BigUint)>> {
        let mut listed = Vec::new();
        for index in 1..self.next_node_index()? {
            let Some(node_id) = self.node_at(index)? else {
                continue;
            };
            let node = self.load_node(&node_id)?;
            self.emit(RegistryEvent::NodeListed {
                node_id: node_id.clone(),
                size: node.size.clone(),
            });
            listed.push((node_id, node.size));
        }
        Ok(listed)
    }

    /// Reset the enumeration counter to 1. Node records stay in place, so
    /// previously registered ids remain registered but unenumerable.
    pub fn debug_clear(&mut self) -> Result<()> {
        self.write_counter(keys::NODE_COUNTER, 1)?;
        info!("Node enumeration counter reset");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;
    use crate::types::Role;

    #[test]
    fn test_register_then_get_info() {
        let (mut registry, _) = registry();
        let size = registry
            .register(b"n1", big(1000), b"api", b"rpc", b"@tg", OWNER)
            .unwrap();
        assert_eq!(size, big(1000));

        let info = registry.get_info(b"n1").unwrap();
        assert_eq!(info.size, big(1000));
        assert_eq!(info.free, big(1000));
        assert_eq!(info.api_addr, b"api".to_vec());
        assert_eq!(info.rpc_addr, b"rpc".to_vec());
        assert_eq!(info.role, Role::Normal);
    }

    #[test]
    fn test_indexes_are_sequential_from_one() {
        let (mut registry, _) = registry();
        assert_eq!(registry.node_count().unwrap(), 0);
        register(&mut registry, "a", 10);
        register(&mut registry, "b", 20);

        assert_eq!(registry.node_count().unwrap(), 2);
        assert_eq!(registry.node_at(1).unwrap(), Some(b"a".to_vec()));
        assert_eq!(registry.node_at(2).unwrap(), Some(b"b".to_vec()));
        assert_eq!(registry.load_node(b"b").unwrap().index, 2);
        assert_eq!(registry.node_at(3).unwrap(), None);
    }

    #[test]
    fn test_duplicate_registration_fails_without_writes() {
        let (mut registry, _) = registry();
        register(&mut registry, "n1", 1000);
        let before = registry.store().clone();

        let err = registry
            .register(b"n1", big(5), b"x", b"y", b"z", b"someone-else")
            .unwrap_err();
        assert!(matches!(err, RegistryError::AlreadyRegistered(_)));
        assert_eq!(registry.store(), &before);
    }

    #[test]
    fn test_reserved_ids_rejected() {
        let (mut registry, _) = registry();
        let reserved: [&[u8]; 5] = [b"nodes", b"nodes:1", b"files:x", b"", b"a:1"];
        for id in reserved {
            let err = registry
                .register(id, big(1), b"", b"", b"", OWNER)
                .unwrap_err();
            assert!(matches!(err, RegistryError::InvalidArgument { .. }));
        }
        assert!(registry.store().is_empty());
    }

    #[test]
    fn test_colon_ids_cannot_hijack_file_lists() {
        let (mut registry, _) = registry();
        register(&mut registry, "a", 1000);
        assert!(matches!(
            registry.register(b"a:1", big(1000), b"", b"", b"", OWNER),
            Err(RegistryError::InvalidArgument { .. })
        ));

        registry
            .confirm_upload(b"a", b"file-of-a", big(10), OWNER)
            .unwrap();
        assert_eq!(registry.get_files_number(b"a").unwrap(), 1);
        assert_eq!(
            registry.get_file(b"a", 1).unwrap(),
            (b"file-of-a".to_vec(), big(10))
        );
        registry.confirm_upload(b"a", b"f2", big(5), OWNER).unwrap();
        assert_eq!(registry.get_files_number(b"a").unwrap(), 2);
    }

    #[test]
    fn test_get_info_unknown_node() {
        let (registry, _) = registry();
        assert!(matches!(
            registry.get_info(b"ghost"),
            Err(RegistryError::NotFound(_))
        ));
    }

    #[test]
    fn test_update_address_by_owner() {
        let (mut registry, _) = registry();
        register(&mut registry, "n1", 1000);
        let addr = registry
            .update_address(b"n1", b"10.1.1.1:80", OWNER)
            .unwrap();
        assert_eq!(addr, b"10.1.1.1:80".to_vec());
        assert_eq!(registry.get_info(b"n1").unwrap().api_addr, addr);
    }

    #[test]
    fn test_update_address_by_stranger_is_unauthorized() {
        let (mut registry, _) = registry();
        register(&mut registry, "n1", 1000);

        let err = registry
            .update_address(b"n1", b"evil:80", b"intruder")
            .unwrap_err();
        assert!(matches!(err, RegistryError::Unauthorized(_)));
        assert_eq!(
            registry.get_info(b"n1").unwrap().api_addr,
            b"127.0.0.1:8080".to_vec()
        );

        assert!(matches!(
            registry.update_address(b"ghost", b"x", OWNER),
            Err(RegistryError::NotFound(_))
        ));
    }

    #[test]
    fn test_debug_print_and_clear() {
        let (mut registry, sink) = registry();
        register(&mut registry, "a", 10);
        register(&mut registry, "b", 20);

        let listed = registry.debug_print().unwrap();
        assert_eq!(listed, vec![(b"a".to_vec(), big(10)), (b"b".to_vec(), big(20))]);
        assert_eq!(sink.published().len(), 2);

        registry.debug_clear().unwrap();
        assert_eq!(registry.node_count().unwrap(), 0);
        assert!(registry.debug_print().unwrap().is_empty());
        // the record itself survives the reset
        assert!(registry.get_info(b"a").is_ok());
        assert!(matches!(
            registry.register(b"a", big(1), b"", b"", b"", OWNER),
            Err(RegistryError::AlreadyRegistered(_))
        ));
    }
}
