use std::collections::HashSet;
use std::sync::Arc;

use mime::Mime;

use super::blobs::{BlobError, BlobStore};
use super::node::{BlobRef, Node, NodeId, NodeKind};
use super::records::{NodeRecords, RecordError};
use super::types::TypeRegistry;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("unknown hash: {0}")]
    NotFound(NodeId),
    #[error("'{name}' already exists in the destination folder")]
    NameCollision { name: String },
    #[error("invalid parent: {0}")]
    InvalidParent(NodeId),
    #[error("the root folder cannot be modified")]
    RootImmutable,
    #[error("node name must not be empty")]
    EmptyName,
    #[error("record store error: {0}")]
    Records(RecordError),
    #[error("blob store error: {0}")]
    Blobs(#[from] BlobError),
}

impl From<RecordError> for StoreError {
    fn from(err: RecordError) -> Self {
        // the store-level uniqueness backstop surfaces as a collision,
        // indistinguishable from the pre-check catching it first
        match err {
            RecordError::DuplicateName { name, .. } => StoreError::NameCollision { name },
            RecordError::NotFound(id) => StoreError::NotFound(id),
            other => StoreError::Records(other),
        }
    }
}

/// Tree-aware store over the record and blob collaborators.
///
/// Owns identity, parent/child/sibling/ancestor queries, and the
/// uniqueness and acyclicity invariants. Permission checks live above
/// this layer; nothing here consults a user.
#[derive(Clone)]
pub struct NodeStore {
    records: Arc<dyn NodeRecords>,
    blobs: Arc<dyn BlobStore>,
    registry: TypeRegistry,
}

impl NodeStore {
    /// Open the store, creating the root node if it does not exist yet.
    pub async fn init(
        records: Arc<dyn NodeRecords>,
        blobs: Arc<dyn BlobStore>,
        registry: TypeRegistry,
        root_name: impl Into<String>,
    ) -> Result<Self, StoreError> {
        if records.get(NodeId::root()).await?.is_none() {
            tracing::debug!("initializing root node");
            records.insert(Node::root(root_name)).await?;
        }
        Ok(Self {
            records,
            blobs,
            registry,
        })
    }

    pub fn blobs(&self) -> &Arc<dyn BlobStore> {
        &self.blobs
    }

    pub fn registry(&self) -> &TypeRegistry {
        &self.registry
    }

    pub async fn get(&self, id: NodeId) -> Result<Node, StoreError> {
        self.records
            .get(id)
            .await?
            .ok_or(StoreError::NotFound(id))
    }

    /// Direct children, name-ordered. Files have none.
    pub async fn children(&self, node: &Node) -> Result<Vec<Node>, StoreError> {
        if !node.is_folder() {
            return Ok(Vec::new());
        }
        Ok(self.records.children_of(node.id).await?)
    }

    /// Walk the parent chain up to the global root.
    ///
    /// Returned in root-to-node order; `include_self` controls whether
    /// `node` itself appears at the tail. A revisited id means the
    /// parent graph is corrupt and aborts the walk.
    pub async fn ancestors(&self, node: &Node, include_self: bool) -> Result<Vec<Node>, StoreError> {
        let mut chain = Vec::new();
        if include_self {
            chain.push(node.clone());
        }

        let mut seen: HashSet<NodeId> = HashSet::from([node.id]);
        let mut current = node.parent;
        while let Some(id) = current {
            if !seen.insert(id) {
                tracing::warn!("cycle detected walking ancestors of {}", node.id);
                return Err(StoreError::InvalidParent(id));
            }
            let parent = self.get(id).await?;
            current = parent.parent;
            chain.push(parent);
        }

        chain.reverse();
        Ok(chain)
    }

    /// Other children of the node's parent.
    pub async fn siblings(&self, node: &Node, include_self: bool) -> Result<Vec<Node>, StoreError> {
        let Some(parent) = node.parent else {
            // the root has no siblings
            return Ok(Vec::new());
        };
        let mut siblings = self.records.children_of(parent).await?;
        if !include_self {
            siblings.retain(|n| n.id != node.id);
        }
        Ok(siblings)
    }

    pub async fn create_folder(
        &self,
        name: &str,
        parent: &Node,
        owner: Option<String>,
    ) -> Result<Node, StoreError> {
        self.check_create(name, parent).await?;
        let node = Node::new_folder(name, parent.id, owner);
        self.records.insert(node.clone()).await?;
        tracing::debug!("created folder '{}' ({}) under {}", name, node.id, parent.id);
        Ok(node)
    }

    /// Create a file node; the registry picks the concrete variant from
    /// the mimetype.
    pub async fn create_file(
        &self,
        name: &str,
        parent: &Node,
        owner: Option<String>,
        mime: Mime,
        blob: BlobRef,
        dimensions: Option<(u32, u32)>,
    ) -> Result<Node, StoreError> {
        self.check_create(name, parent).await?;
        let kind = self.registry.make_kind(mime, blob, dimensions);
        let node = Node::new_file(name, parent.id, owner, kind);
        self.records.insert(node.clone()).await?;
        tracing::debug!("created file '{}' ({}) under {}", name, node.id, parent.id);
        Ok(node)
    }

    /// Rename in place. The id stays stable and the mimetype is not
    /// re-derived from the new name.
    pub async fn rename(&self, node: &Node, new_name: &str) -> Result<Node, StoreError> {
        if node.is_root() {
            return Err(StoreError::RootImmutable);
        }
        if new_name.is_empty() {
            return Err(StoreError::EmptyName);
        }
        if self.sibling_named(node.parent, new_name).await? {
            return Err(StoreError::NameCollision {
                name: new_name.to_string(),
            });
        }

        let mut renamed = node.clone();
        renamed.name = new_name.to_string();
        renamed.touch();
        self.records.update(renamed.clone()).await?;
        Ok(renamed)
    }

    /// Move (`duplicate = false`) or deep-copy (`duplicate = true`) the
    /// node under a new parent.
    ///
    /// A move keeps identity and ownership and only updates the parent
    /// pointer. A copy rebuilds the whole subtree with fresh ids and
    /// fresh timestamps, duplicates every backing blob, and assigns
    /// `owner` to the new nodes.
    pub async fn relink(
        &self,
        node: &Node,
        new_parent: &Node,
        duplicate: bool,
        owner: Option<String>,
    ) -> Result<Node, StoreError> {
        if node.is_root() {
            return Err(StoreError::RootImmutable);
        }
        if !new_parent.is_folder() {
            return Err(StoreError::InvalidParent(new_parent.id));
        }
        // a node may never become its own ancestor
        if new_parent.id == node.id
            || self
                .ancestors(new_parent, false)
                .await?
                .iter()
                .any(|a| a.id == node.id)
        {
            return Err(StoreError::InvalidParent(new_parent.id));
        }
        if self.sibling_named(Some(new_parent.id), &node.name).await? {
            return Err(StoreError::NameCollision {
                name: node.name.clone(),
            });
        }

        if duplicate {
            self.deep_copy(node, new_parent.id, owner).await
        } else {
            let mut moved = node.clone();
            moved.parent = Some(new_parent.id);
            moved.touch();
            self.records.update(moved.clone()).await?;
            tracing::debug!("moved {} under {}", moved.id, new_parent.id);
            Ok(moved)
        }
    }

    fn deep_copy<'a>(
        &'a self,
        node: &'a Node,
        new_parent: NodeId,
        owner: Option<String>,
    ) -> futures::future::BoxFuture<'a, Result<Node, StoreError>> {
        Box::pin(async move {
            let kind = match &node.kind {
                NodeKind::Folder => NodeKind::Folder,
                NodeKind::File { mime, blob } => NodeKind::File {
                    mime: mime.clone(),
                    blob: self.blobs.duplicate(blob.id).await?,
                },
                NodeKind::Image {
                    mime,
                    blob,
                    width,
                    height,
                    thumb,
                } => NodeKind::Image {
                    mime: mime.clone(),
                    blob: self.blobs.duplicate(blob.id).await?,
                    width: *width,
                    height: *height,
                    thumb: thumb.clone(),
                },
            };

            let copy = match kind {
                NodeKind::Folder => Node::new_folder(&node.name, new_parent, owner.clone()),
                kind => Node::new_file(&node.name, new_parent, owner.clone(), kind),
            };
            self.records.insert(copy.clone()).await?;

            if node.is_folder() {
                for child in self.records.children_of(node.id).await? {
                    self.deep_copy(&child, copy.id, owner.clone()).await?;
                }
            }
            Ok(copy)
        })
    }

    /// Recursively delete the node and all descendants, dropping backing
    /// blobs along the way. The root itself cannot be deleted.
    pub async fn delete(&self, node: &Node) -> Result<(), StoreError> {
        if node.is_root() {
            return Err(StoreError::RootImmutable);
        }
        self.delete_subtree(node).await
    }

    fn delete_subtree<'a>(
        &'a self,
        node: &'a Node,
    ) -> futures::future::BoxFuture<'a, Result<(), StoreError>> {
        Box::pin(async move {
            for child in self.records.children_of(node.id).await? {
                self.delete_subtree(&child).await?;
            }
            if let Some(blob) = node.kind.blob() {
                self.blobs.delete(blob.id).await?;
            }
            self.records.remove(node.id).await?;
            tracing::debug!("deleted {} ('{}')", node.id, node.name);
            Ok(())
        })
    }

    /// Sum of the byte lengths of every file in the subtree. A file
    /// reports its own blob length; an empty folder reports 0.
    pub fn total_size<'a>(
        &'a self,
        node: &'a Node,
    ) -> futures::future::BoxFuture<'a, Result<u64, StoreError>> {
        Box::pin(async move {
            if !node.is_folder() {
                return Ok(node.kind.byte_len());
            }
            let mut total = 0;
            for child in self.records.children_of(node.id).await? {
                total += self.total_size(&child).await?;
            }
            Ok(total)
        })
    }

    async fn check_create(&self, name: &str, parent: &Node) -> Result<(), StoreError> {
        if name.is_empty() {
            return Err(StoreError::EmptyName);
        }
        if !parent.is_folder() {
            return Err(StoreError::InvalidParent(parent.id));
        }
        if self.sibling_named(Some(parent.id), name).await? {
            return Err(StoreError::NameCollision {
                name: name.to_string(),
            });
        }
        Ok(())
    }

    async fn sibling_named(
        &self,
        parent: Option<NodeId>,
        name: &str,
    ) -> Result<bool, StoreError> {
        let Some(parent) = parent else {
            return Ok(false);
        };
        Ok(self
            .records
            .children_of(parent)
            .await?
            .iter()
            .any(|n| n.name == name))
    }
}
