use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;

use super::node::{Node, NodeId};

/// Errors surfaced by a record store implementation.
#[derive(Debug, thiserror::Error)]
pub enum RecordError {
    #[error("record not found: {0}")]
    NotFound(NodeId),
    /// The `(parent, name)` uniqueness invariant would be violated.
    ///
    /// Implementations must enforce this inside the same transaction
    /// (or lock) as the mutation, not only as a pre-check.
    #[error("sibling name already taken: '{name}'")]
    DuplicateName { name: String, parent: NodeId },
    #[error("record store backend error: {0}")]
    Backend(#[from] anyhow::Error),
}

/// The persistent record store the node store is built over.
///
/// Kept deliberately small: create/read/update/delete plus an ordered
/// child scan on the parent index. A relational table with a unique
/// `(parent, name)` constraint satisfies this contract; so does the
/// in-memory implementation below.
#[async_trait]
pub trait NodeRecords: Send + Sync + 'static {
    async fn get(&self, id: NodeId) -> Result<Option<Node>, RecordError>;

    /// Insert a new node. Fails with [`RecordError::DuplicateName`] if a
    /// sibling already holds the name.
    async fn insert(&self, node: Node) -> Result<(), RecordError>;

    /// Update an existing node (rename, reparent, payload change).
    /// Enforces the same sibling-name uniqueness as `insert`.
    async fn update(&self, node: Node) -> Result<(), RecordError>;

    async fn remove(&self, id: NodeId) -> Result<(), RecordError>;

    /// Direct children of `parent`, ordered by name.
    async fn children_of(&self, parent: NodeId) -> Result<Vec<Node>, RecordError>;
}

/// In-memory record store backed by hash maps plus a `(parent, name)` index.
///
/// The index doubles as the uniqueness constraint: collisions are detected
/// under the same write lock that applies the mutation, so two racing
/// inserts of the same sibling name cannot both succeed.
#[derive(Debug, Clone, Default)]
pub struct MemoryRecords {
    inner: Arc<RwLock<MemoryRecordsInner>>,
}

#[derive(Debug, Default)]
struct MemoryRecordsInner {
    nodes: HashMap<NodeId, Node>,
    /// parent -> name -> child id, kept name-ordered for child scans
    by_parent: HashMap<NodeId, BTreeMap<String, NodeId>>,
}

impl MemoryRecords {
    pub fn new() -> Self {
        Self::default()
    }
}

fn lock_err(e: impl std::fmt::Display) -> RecordError {
    RecordError::Backend(anyhow::anyhow!("failed to acquire lock: {}", e))
}

#[async_trait]
impl NodeRecords for MemoryRecords {
    async fn get(&self, id: NodeId) -> Result<Option<Node>, RecordError> {
        let inner = self.inner.read().map_err(lock_err)?;
        Ok(inner.nodes.get(&id).cloned())
    }

    async fn insert(&self, node: Node) -> Result<(), RecordError> {
        let mut inner = self.inner.write().map_err(lock_err)?;

        if let Some(parent) = node.parent {
            let siblings = inner.by_parent.entry(parent).or_default();
            if siblings.contains_key(&node.name) {
                return Err(RecordError::DuplicateName {
                    name: node.name.clone(),
                    parent,
                });
            }
            siblings.insert(node.name.clone(), node.id);
        }

        inner.nodes.insert(node.id, node);
        Ok(())
    }

    async fn update(&self, node: Node) -> Result<(), RecordError> {
        let mut inner = self.inner.write().map_err(lock_err)?;

        let previous = inner
            .nodes
            .get(&node.id)
            .cloned()
            .ok_or(RecordError::NotFound(node.id))?;

        // Collision check against the new position before touching the index
        if let Some(parent) = node.parent {
            let moved = previous.parent != node.parent || previous.name != node.name;
            if moved {
                if let Some(siblings) = inner.by_parent.get(&parent) {
                    if siblings.contains_key(&node.name) {
                        return Err(RecordError::DuplicateName {
                            name: node.name.clone(),
                            parent,
                        });
                    }
                }
            }
        }

        if let Some(old_parent) = previous.parent {
            if let Some(siblings) = inner.by_parent.get_mut(&old_parent) {
                siblings.remove(&previous.name);
            }
        }
        if let Some(parent) = node.parent {
            inner
                .by_parent
                .entry(parent)
                .or_default()
                .insert(node.name.clone(), node.id);
        }

        inner.nodes.insert(node.id, node);
        Ok(())
    }

    async fn remove(&self, id: NodeId) -> Result<(), RecordError> {
        let mut inner = self.inner.write().map_err(lock_err)?;

        let node = inner.nodes.remove(&id).ok_or(RecordError::NotFound(id))?;
        if let Some(parent) = node.parent {
            if let Some(siblings) = inner.by_parent.get_mut(&parent) {
                siblings.remove(&node.name);
            }
        }
        inner.by_parent.remove(&id);
        Ok(())
    }

    async fn children_of(&self, parent: NodeId) -> Result<Vec<Node>, RecordError> {
        let inner = self.inner.read().map_err(lock_err)?;

        let Some(children) = inner.by_parent.get(&parent) else {
            return Ok(Vec::new());
        };
        Ok(children
            .values()
            .filter_map(|id| inner.nodes.get(id).cloned())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_insert_and_get() {
        let records = MemoryRecords::new();
        let root = Node::root("root");
        records.insert(root.clone()).await.unwrap();

        let loaded = records.get(root.id).await.unwrap().unwrap();
        assert_eq!(loaded, root);
    }

    #[tokio::test]
    async fn test_duplicate_sibling_name_rejected() {
        let records = MemoryRecords::new();
        let root = Node::root("root");
        records.insert(root.clone()).await.unwrap();

        let a = Node::new_folder("docs", root.id, None);
        let b = Node::new_folder("docs", root.id, None);
        records.insert(a).await.unwrap();

        let result = records.insert(b).await;
        assert!(matches!(result, Err(RecordError::DuplicateName { .. })));
    }

    #[tokio::test]
    async fn test_children_name_ordered() {
        let records = MemoryRecords::new();
        let root = Node::root("root");
        records.insert(root.clone()).await.unwrap();

        for name in ["zeta", "alpha", "mid"] {
            records
                .insert(Node::new_folder(name, root.id, None))
                .await
                .unwrap();
        }

        let names: Vec<String> = records
            .children_of(root.id)
            .await
            .unwrap()
            .into_iter()
            .map(|n| n.name)
            .collect();
        assert_eq!(names, vec!["alpha", "mid", "zeta"]);
    }

    #[tokio::test]
    async fn test_update_rename_collision() {
        let records = MemoryRecords::new();
        let root = Node::root("root");
        records.insert(root.clone()).await.unwrap();

        let a = Node::new_folder("a", root.id, None);
        let mut b = Node::new_folder("b", root.id, None);
        records.insert(a).await.unwrap();
        records.insert(b.clone()).await.unwrap();

        b.name = "a".to_string();
        let result = records.update(b).await;
        assert!(matches!(result, Err(RecordError::DuplicateName { .. })));
    }

    #[tokio::test]
    async fn test_update_same_position_allowed() {
        let records = MemoryRecords::new();
        let root = Node::root("root");
        records.insert(root.clone()).await.unwrap();

        let mut a = Node::new_folder("a", root.id, None);
        records.insert(a.clone()).await.unwrap();

        // touching a node without renaming it must not self-collide
        a.touch();
        records.update(a).await.unwrap();
    }

    #[tokio::test]
    async fn test_remove_clears_index() {
        let records = MemoryRecords::new();
        let root = Node::root("root");
        records.insert(root.clone()).await.unwrap();

        let a = Node::new_folder("a", root.id, None);
        records.insert(a.clone()).await.unwrap();
        records.remove(a.id).await.unwrap();

        // name is free again
        records
            .insert(Node::new_folder("a", root.id, None))
            .await
            .unwrap();
    }
}
