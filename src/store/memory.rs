//! In-memory node store.

use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;

use crate::error::{AuthError, Result};
use crate::store::{prop_string, NodeRef, NodeStore, PropertyMap, PROP_USER_NAME};
use crate::txn::Txn;

/// Reference [`NodeStore`] backend holding user nodes in process memory.
///
/// Maintains a case-sensitive username index alongside the node table; the
/// index follows every write that touches [`PROP_USER_NAME`].
#[derive(Default)]
pub struct MemoryNodeStore {
    nodes: RwLock<HashMap<NodeRef, PropertyMap>>,
    by_username: RwLock<HashMap<String, NodeRef>>,
}

impl MemoryNodeStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn require_writable(txn: &Txn) -> Result<()> {
        if txn.read_only() {
            return Err(AuthError::Store(
                "write attempted in a read-only transaction".to_string(),
            ));
        }
        Ok(())
    }

    fn reindex(&self, node: NodeRef, before: Option<&str>, after: Option<&str>) {
        if before == after {
            return;
        }
        let mut index = self.by_username.write();
        if let Some(old) = before {
            index.remove(old);
        }
        if let Some(new) = after {
            index.insert(new.to_string(), node);
        }
    }
}

impl NodeStore for MemoryNodeStore {
    fn create_user_node(&self, txn: &Txn, properties: PropertyMap) -> Result<NodeRef> {
        Self::require_writable(txn)?;
        let username = prop_string(&properties, PROP_USER_NAME)
            .ok_or_else(|| AuthError::Store("user node without a username".to_string()))?;
        let node = NodeRef::new();
        self.nodes.write().insert(node, properties);
        self.by_username.write().insert(username, node);
        Ok(node)
    }

    fn find_user_node(&self, _txn: &Txn, username: &str) -> Result<Option<NodeRef>> {
        Ok(self.by_username.read().get(username).copied())
    }

    fn exists(&self, _txn: &Txn, node: NodeRef) -> Result<bool> {
        Ok(self.nodes.read().contains_key(&node))
    }

    fn properties(&self, _txn: &Txn, node: NodeRef) -> Result<PropertyMap> {
        self.nodes
            .read()
            .get(&node)
            .cloned()
            .ok_or_else(|| AuthError::Store(format!("no such node: {node}")))
    }

    fn set_properties(&self, txn: &Txn, node: NodeRef, properties: PropertyMap) -> Result<()> {
        Self::require_writable(txn)?;
        let mut nodes = self.nodes.write();
        let existing = nodes
            .get_mut(&node)
            .ok_or_else(|| AuthError::Store(format!("no such node: {node}")))?;
        let before = prop_string(existing, PROP_USER_NAME);
        let after = prop_string(&properties, PROP_USER_NAME);
        *existing = properties;
        drop(nodes);
        self.reindex(node, before.as_deref(), after.as_deref());
        Ok(())
    }

    fn set_property(&self, txn: &Txn, node: NodeRef, name: &str, value: Value) -> Result<()> {
        Self::require_writable(txn)?;
        let mut nodes = self.nodes.write();
        let existing = nodes
            .get_mut(&node)
            .ok_or_else(|| AuthError::Store(format!("no such node: {node}")))?;
        let before = prop_string(existing, PROP_USER_NAME);
        existing.insert(name.to_string(), value);
        let after = prop_string(existing, PROP_USER_NAME);
        drop(nodes);
        if name == PROP_USER_NAME {
            self.reindex(node, before.as_deref(), after.as_deref());
        }
        Ok(())
    }

    fn remove_property(&self, txn: &Txn, node: NodeRef, name: &str) -> Result<()> {
        Self::require_writable(txn)?;
        let mut nodes = self.nodes.write();
        let existing = nodes
            .get_mut(&node)
            .ok_or_else(|| AuthError::Store(format!("no such node: {node}")))?;
        existing.remove(name);
        Ok(())
    }

    fn delete_node(&self, txn: &Txn, node: NodeRef) -> Result<()> {
        Self::require_writable(txn)?;
        let mut nodes = self.nodes.write();
        let removed = nodes
            .remove(&node)
            .ok_or_else(|| AuthError::Store(format!("no such node: {node}")))?;
        drop(nodes);
        if let Some(username) = prop_string(&removed, PROP_USER_NAME) {
            self.by_username.write().remove(&username);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::MemoryNodeStore;
    use crate::error::AuthError;
    use crate::store::{NodeStore, PropertyMap, PROP_ENABLED, PROP_USER_NAME};
    use crate::txn::RetryingTransactionHelper;
    use serde_json::json;

    fn user_properties(username: &str) -> PropertyMap {
        let mut properties = PropertyMap::new();
        properties.insert(PROP_USER_NAME.to_string(), json!(username));
        properties.insert(PROP_ENABLED.to_string(), json!(true));
        properties
    }

    #[test]
    fn create_find_delete_round_trip() {
        let store = MemoryNodeStore::new();
        let helper = RetryingTransactionHelper::default();

        let node = helper
            .do_in_transaction(false, |txn| {
                store.create_user_node(txn, user_properties("Andy"))
            })
            .unwrap();

        helper
            .do_in_transaction(true, |txn| {
                assert_eq!(store.find_user_node(txn, "Andy")?, Some(node));
                // The index is case sensitive.
                assert_eq!(store.find_user_node(txn, "andy")?, None);
                assert!(store.exists(txn, node)?);
                Ok(())
            })
            .unwrap();

        helper
            .do_in_transaction(false, |txn| store.delete_node(txn, node))
            .unwrap();
        helper
            .do_in_transaction(true, |txn| {
                assert_eq!(store.find_user_node(txn, "Andy")?, None);
                assert!(!store.exists(txn, node)?);
                Ok(())
            })
            .unwrap();
    }

    #[test]
    fn writes_require_a_writable_transaction() {
        let store = MemoryNodeStore::new();
        let helper = RetryingTransactionHelper::default();
        let result = helper.do_in_transaction(true, |txn| {
            store.create_user_node(txn, user_properties("Andy"))
        });
        assert!(matches!(result, Err(AuthError::Store(_))));
    }

    #[test]
    fn username_rename_moves_the_index_entry() {
        let store = MemoryNodeStore::new();
        let helper = RetryingTransactionHelper::default();
        let node = helper
            .do_in_transaction(false, |txn| {
                store.create_user_node(txn, user_properties("Andy"))
            })
            .unwrap();

        helper
            .do_in_transaction(false, |txn| {
                store.set_property(txn, node, PROP_USER_NAME, json!("Andrew"))
            })
            .unwrap();

        helper
            .do_in_transaction(true, |txn| {
                assert_eq!(store.find_user_node(txn, "Andy")?, None);
                assert_eq!(store.find_user_node(txn, "Andrew")?, Some(node));
                Ok(())
            })
            .unwrap();
    }
}
