use std::collections::HashSet;

use bytes::Bytes;
use serde_json::{json, Value};

use crate::acl::{Action, Resolver, User};
use crate::vfs::{BlobError, BlobRef, Node, NodeId, NodeStore, StoreError};

use super::descriptor::Views;

#[derive(Debug, thiserror::Error)]
pub enum DriverError {
    #[error("you do not have permission to {action} '{name}'")]
    PermissionDenied { action: Action, name: String },
    #[error("'{0}' is not a file")]
    NotAFile(String),
    #[error("unknown hash: {0}")]
    UnknownHash(String),
    #[error("mandatory parameter '{0}' missing")]
    MissingParameter(&'static str),
    #[error("command '{0}' not available")]
    UnknownCommand(String),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("blob store error: {0}")]
    Blobs(#[from] BlobError),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// One file received by the transport layer for the `upload` command.
///
/// Width/height come from the request when the client measured the
/// image; the core never decodes blob bytes itself.
#[derive(Debug, Clone)]
pub struct Upload {
    pub name: String,
    pub content: Bytes,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

impl Upload {
    pub fn new(name: impl Into<String>, content: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
            width: None,
            height: None,
        }
    }

    pub fn with_dimensions(mut self, width: u32, height: u32) -> Self {
        self.width = Some(width);
        self.height = Some(height);
        self
    }
}

/// Resolved blob location handed to the transport layer for the `file`
/// command, the one operation that does not answer with the standard
/// json envelope.
#[derive(Debug, Clone, PartialEq)]
pub struct FileContent {
    pub name: String,
    pub mime: String,
    pub blob: BlobRef,
}

/// The mutation engine and view operations behind the command protocol.
///
/// Every operation checks permissions through the resolver before it
/// touches the node store, and permission or collision failures leave
/// the tree unchanged.
#[derive(Clone)]
pub struct Driver {
    store: NodeStore,
    resolver: Resolver,
}

impl Driver {
    pub fn new(store: NodeStore, resolver: Resolver) -> Self {
        Self { store, resolver }
    }

    pub fn store(&self) -> &NodeStore {
        &self.store
    }

    fn views(&self) -> Views<'_> {
        Views::new(&self.store, &self.resolver)
    }

    fn require(&self, node: &Node, action: Action, user: &User) -> Result<(), DriverError> {
        if self.resolver.allows(node, action, user) {
            return Ok(());
        }
        Err(DriverError::PermissionDenied {
            action,
            name: node.name.clone(),
        })
    }

    /// List the permission-visible subtree under `target` plus the
    /// working-directory descriptor. With `with_ancestors` the
    /// breadcrumb view is folded in so a fresh client can draw its tree
    /// from one response.
    pub async fn open(
        &self,
        target: Option<NodeId>,
        with_ancestors: bool,
        root: NodeId,
        user: &User,
    ) -> Result<Value, DriverError> {
        let node = self.store.get(target.unwrap_or(root)).await?;
        self.require(&node, Action::Read, user)?;

        let views = self.views();
        let mut files = views.subtree(&node, root, user).await?;
        if with_ancestors {
            let mut seen: HashSet<String> = files.iter().map(|d| d.hash.clone()).collect();
            for descriptor in views.ancestors_with_siblings(&node, root, user).await? {
                if seen.insert(descriptor.hash.clone()) {
                    files.push(descriptor);
                }
            }
        }
        let cwd = views.force_describe(&node, root, user).await?;
        Ok(json!({ "files": files, "cwd": cwd }))
    }

    pub async fn tree(
        &self,
        target: NodeId,
        root: NodeId,
        user: &User,
    ) -> Result<Value, DriverError> {
        let node = self.store.get(target).await?;
        self.require(&node, Action::Read, user)?;
        let tree = self.views().subtree(&node, root, user).await?;
        Ok(json!({ "tree": tree }))
    }

    /// The breadcrumb view used to pre-populate a client-side tree.
    pub async fn parents(
        &self,
        target: NodeId,
        root: NodeId,
        user: &User,
    ) -> Result<Value, DriverError> {
        let node = self.store.get(target).await?;
        self.require(&node, Action::Read, user)?;
        let parents = self
            .views()
            .ancestors_with_siblings(&node, root, user)
            .await?;
        Ok(json!({ "parents": parents }))
    }

    pub async fn list(
        &self,
        target: NodeId,
        root: NodeId,
        user: &User,
    ) -> Result<Value, DriverError> {
        let node = self.store.get(target).await?;
        self.require(&node, Action::Read, user)?;
        let names: Vec<String> = self
            .views()
            .subtree(&node, root, user)
            .await?
            .into_iter()
            .map(|d| d.name)
            .collect();
        Ok(json!({ "list": names }))
    }

    pub async fn mkdir(
        &self,
        name: &str,
        target: NodeId,
        root: NodeId,
        user: &User,
    ) -> Result<Value, DriverError> {
        let parent = self.store.get(target).await?;
        self.require(&parent, Action::Add, user)?;

        let node = self
            .store
            .create_folder(name, &parent, Some(user.id.clone()))
            .await?;
        let added = self.views().force_describe(&node, root, user).await?;
        Ok(json!({ "added": [added] }))
    }

    /// Create an empty file; the mimetype is guessed from the name.
    pub async fn mkfile(
        &self,
        name: &str,
        target: NodeId,
        root: NodeId,
        user: &User,
    ) -> Result<Value, DriverError> {
        let parent = self.store.get(target).await?;
        self.require(&parent, Action::Add, user)?;

        // validate before the blob is persisted, so a rejected mkfile
        // leaves nothing behind in the blob store
        if name.is_empty() {
            return Err(StoreError::EmptyName.into());
        }
        if !parent.is_folder() {
            return Err(StoreError::InvalidParent(parent.id).into());
        }
        if self.store.children(&parent).await?.iter().any(|n| n.name == name) {
            return Err(StoreError::NameCollision {
                name: name.to_string(),
            }
            .into());
        }

        let blob = self.store.blobs().put(Bytes::new()).await?;
        let mime = self.store.registry().mime_for_name(name);
        let node = match self
            .store
            .create_file(name, &parent, Some(user.id.clone()), mime, blob, None)
            .await
        {
            Ok(node) => node,
            Err(err) => {
                // the pre-check lost a race; drop the blob again
                if let Err(del) = self.store.blobs().delete(blob.id).await {
                    tracing::warn!("failed to drop blob of aborted mkfile: {}", del);
                }
                return Err(err.into());
            }
        };
        let added = self.views().force_describe(&node, root, user).await?;
        Ok(json!({ "added": [added] }))
    }

    /// Rename in place. The hash stays stable, but the protocol treats a
    /// rename as replace-in-place so clients invalidate their cache.
    pub async fn rename(
        &self,
        name: &str,
        target: NodeId,
        root: NodeId,
        user: &User,
    ) -> Result<Value, DriverError> {
        let node = self.store.get(target).await?;
        self.require(&node, Action::Write, user)?;

        let renamed = self.store.rename(&node, name).await?;
        let added = self.views().force_describe(&renamed, root, user).await?;
        Ok(json!({ "added": [added], "removed": [target.to_string()] }))
    }

    /// Best-effort batch delete: targets the user may not remove, that
    /// no longer exist, or that are the root folder are skipped and
    /// simply absent from `removed`.
    pub async fn remove(&self, targets: &[NodeId], user: &User) -> Result<Value, DriverError> {
        let mut removed = Vec::new();
        for &target in targets {
            let node = match self.store.get(target).await {
                Ok(node) => node,
                Err(StoreError::NotFound(_)) => {
                    tracing::warn!("rm: skipping unknown target {}", target);
                    continue;
                }
                Err(err) => return Err(err.into()),
            };
            if !self.resolver.allows(&node, Action::Remove, user) {
                tracing::warn!("rm: no remove permission on '{}', skipping", node.name);
                continue;
            }
            if node.is_root() {
                tracing::warn!("rm: the root folder cannot be removed, skipping");
                continue;
            }
            self.store.delete(&node).await?;
            removed.push(target.to_string());
        }
        Ok(json!({ "removed": removed }))
    }

    /// Copy (`cut = false`) or move (`cut = true`) a batch of nodes into
    /// `dst`.
    ///
    /// All permission and collision checks for the whole batch run
    /// before anything mutates: one conflicting name fails the entire
    /// paste with nothing changed.
    pub async fn paste(
        &self,
        targets: &[NodeId],
        src: NodeId,
        dst: NodeId,
        cut: bool,
        root: NodeId,
        user: &User,
    ) -> Result<Value, DriverError> {
        // src is only validated; targets carry their own parentage
        let _src = self.store.get(src).await?;
        let dst_node = self.store.get(dst).await?;
        self.require(&dst_node, Action::Add, user)?;
        if !dst_node.is_folder() {
            return Err(StoreError::InvalidParent(dst_node.id).into());
        }

        // every structural check runs before the first relink, so a bad
        // target late in the batch cannot leave earlier ones mutated
        let dst_chain: HashSet<NodeId> = self
            .store
            .ancestors(&dst_node, true)
            .await?
            .iter()
            .map(|n| n.id)
            .collect();

        let mut nodes = Vec::with_capacity(targets.len());
        for &target in targets {
            let node = self.store.get(target).await?;
            self.require(&node, Action::Read, user)?;
            if cut {
                self.require(&node, Action::Remove, user)?;
            }
            if node.is_root() {
                return Err(StoreError::RootImmutable.into());
            }
            if dst_chain.contains(&node.id) {
                return Err(StoreError::InvalidParent(dst_node.id).into());
            }
            nodes.push(node);
        }

        let mut taken: HashSet<String> = self
            .store
            .children(&dst_node)
            .await?
            .into_iter()
            .map(|n| n.name)
            .collect();
        for node in &nodes {
            if !taken.insert(node.name.clone()) {
                return Err(StoreError::NameCollision {
                    name: node.name.clone(),
                }
                .into());
            }
        }

        let views = self.views();
        let mut added = Vec::new();
        let mut removed = Vec::new();
        for node in &nodes {
            if cut {
                let moved = self.store.relink(node, &dst_node, false, None).await?;
                added.push(views.force_describe(&moved, root, user).await?);
                removed.push(node.id.to_string());
            } else {
                let copy = self
                    .store
                    .relink(node, &dst_node, true, Some(user.id.clone()))
                    .await?;
                added.push(views.force_describe(&copy, root, user).await?);
            }
        }
        Ok(json!({ "added": added, "removed": removed }))
    }

    /// Persist a batch of uploaded files under `target`.
    ///
    /// Name collisions fail the whole batch before any blob is stored.
    pub async fn upload(
        &self,
        target: NodeId,
        files: &[Upload],
        root: NodeId,
        user: &User,
    ) -> Result<Value, DriverError> {
        let parent = self.store.get(target).await?;
        self.require(&parent, Action::Add, user)?;

        let mut taken: HashSet<String> = self
            .store
            .children(&parent)
            .await?
            .into_iter()
            .map(|n| n.name)
            .collect();
        for file in files {
            if !taken.insert(file.name.clone()) {
                return Err(StoreError::NameCollision {
                    name: file.name.clone(),
                }
                .into());
            }
        }

        let views = self.views();
        let mut added = Vec::new();
        for file in files {
            let blob = self.store.blobs().put(file.content.clone()).await?;
            let mime = self.store.registry().mime_for_name(&file.name);
            let dimensions = file.width.zip(file.height);
            let node = self
                .store
                .create_file(
                    &file.name,
                    &parent,
                    Some(user.id.clone()),
                    mime,
                    blob,
                    dimensions,
                )
                .await?;
            added.push(views.force_describe(&node, root, user).await?);
        }
        Ok(json!({ "added": added }))
    }

    /// Total byte size over the targets, folders aggregated recursively.
    pub async fn size(&self, targets: &[NodeId], user: &User) -> Result<Value, DriverError> {
        let mut total = 0;
        for &target in targets {
            let node = self.store.get(target).await?;
            self.require(&node, Action::Read, user)?;
            total += self.store.total_size(&node).await?;
        }
        Ok(json!({ "size": total }))
    }

    /// Literal, case-sensitive substring search over the visible subtree.
    pub async fn search(
        &self,
        query: &str,
        root: NodeId,
        user: &User,
    ) -> Result<Value, DriverError> {
        let node = self.store.get(root).await?;
        self.require(&node, Action::Read, user)?;
        let files: Vec<_> = self
            .views()
            .subtree(&node, root, user)
            .await?
            .into_iter()
            .filter(|d| d.name.contains(query))
            .collect();
        Ok(json!({ "files": files }))
    }

    /// Resolve a file's blob location for the transport layer to stream
    /// or redirect to.
    pub async fn file(&self, target: NodeId, user: &User) -> Result<FileContent, DriverError> {
        let node = self.store.get(target).await?;
        self.require(&node, Action::Read, user)?;
        let blob = node
            .kind
            .blob()
            .copied()
            .ok_or_else(|| DriverError::NotAFile(node.name.clone()))?;
        Ok(FileContent {
            name: node.name,
            mime: node.kind.mime_str(),
            blob,
        })
    }
}
