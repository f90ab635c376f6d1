use std::collections::VecDeque;

use serde::Serialize;

use crate::acl::{Action, Resolver, User};
use crate::vfs::{Node, NodeId, NodeKind, NodeStore, StoreError};

/// The flat wire record describing one node.
///
/// Field names match the client protocol exactly; optional fields are
/// omitted rather than sent as null.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Descriptor {
    pub name: String,
    pub hash: String,
    /// Parent hash as visible to the caller; empty for the declared root.
    pub phash: String,
    pub mime: String,
    pub size: u64,
    pub read: bool,
    pub write: bool,
    pub rm: bool,
    /// Modification time as a unix timestamp.
    pub ts: i64,
    /// 1 only for the global root, which can never be renamed or removed.
    pub locked: u8,
    /// For folders: 1 if any permission-visible folder child exists.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dirs: Option<u8>,
    /// For images: "WxH".
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dim: Option<String>,
    /// For images: thumbnail reference, when one exists.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tmb: Option<String>,
}

/// Shapes permission-filtered views of the tree into descriptor lists.
///
/// A node the caller may not read is silently omitted, never an error;
/// the caller cannot distinguish "hidden" from "absent".
pub struct Views<'a> {
    store: &'a NodeStore,
    resolver: &'a Resolver,
}

impl<'a> Views<'a> {
    pub fn new(store: &'a NodeStore, resolver: &'a Resolver) -> Self {
        Self { store, resolver }
    }

    /// Describe one node for `user`, sandboxed under `root`.
    ///
    /// Returns `None` when the caller lacks read on the node. The parent
    /// hash is blanked for the declared root so a caller confined to a
    /// subtree perceives it as the top of the filesystem.
    pub async fn describe(
        &self,
        node: &Node,
        root: NodeId,
        user: &User,
    ) -> Result<Option<Descriptor>, StoreError> {
        if !self.resolver.allows(node, Action::Read, user) {
            return Ok(None);
        }
        Ok(Some(self.force_describe(node, root, user).await?))
    }

    /// Build a descriptor without the read gate.
    ///
    /// Used for mutation responses: the node was just created or renamed
    /// on the caller's behalf, so it is reported back even when the
    /// policy would hide it from a listing.
    pub async fn force_describe(
        &self,
        node: &Node,
        root: NodeId,
        user: &User,
    ) -> Result<Descriptor, StoreError> {
        let phash = match node.parent {
            Some(parent) if node.id != root => parent.to_string(),
            _ => String::new(),
        };

        let dirs = if node.is_folder() {
            let mut visible_folder_child = 0;
            for child in self.store.children(node).await? {
                if child.is_folder() && self.resolver.allows(&child, Action::Read, user) {
                    visible_folder_child = 1;
                    break;
                }
            }
            Some(visible_folder_child)
        } else {
            None
        };

        let (dim, tmb) = match &node.kind {
            NodeKind::Image {
                width,
                height,
                thumb,
                ..
            } if *width > 0 && *height > 0 => {
                (Some(format!("{}x{}", width, height)), thumb.clone())
            }
            NodeKind::Image { thumb, .. } => (None, thumb.clone()),
            _ => (None, None),
        };

        Ok(Descriptor {
            name: node.name.clone(),
            hash: node.id.to_string(),
            phash,
            mime: node.kind.mime_str(),
            size: node.kind.byte_len(),
            read: self.resolver.allows(node, Action::Read, user),
            write: self.resolver.allows(node, Action::Write, user),
            rm: self.resolver.allows(node, Action::Remove, user),
            ts: node.modified.timestamp(),
            locked: u8::from(node.is_root()),
            dirs,
            dim,
            tmb,
        })
    }

    /// Breadth-first walk of the permission-visible subtree below `start`.
    ///
    /// An unreadable child is skipped and its descendants are never
    /// visited; readable branches elsewhere keep going.
    pub async fn subtree(
        &self,
        start: &Node,
        root: NodeId,
        user: &User,
    ) -> Result<Vec<Descriptor>, StoreError> {
        let mut out = Vec::new();
        let mut queue: VecDeque<Node> = VecDeque::from([start.clone()]);

        while let Some(folder) = queue.pop_front() {
            for child in self.store.children(&folder).await? {
                let Some(descriptor) = self.describe(&child, root, user).await? else {
                    continue;
                };
                out.push(descriptor);
                if child.is_folder() {
                    queue.push_back(child);
                }
            }
        }
        Ok(out)
    }

    /// The breadcrumb view: every level from the declared root down to
    /// `node`, each level accompanied by its readable siblings.
    ///
    /// The declared root itself is included but its siblings are not;
    /// nothing above the caller's root may leak into the response.
    pub async fn ancestors_with_siblings(
        &self,
        node: &Node,
        root: NodeId,
        user: &User,
    ) -> Result<Vec<Descriptor>, StoreError> {
        let chain = self.store.ancestors(node, true).await?;

        // only the part of the chain at or below the declared root
        let start = chain
            .iter()
            .position(|n| n.id == root)
            .unwrap_or(chain.len().saturating_sub(1));

        let mut out = Vec::new();
        for (index, level) in chain[start..].iter().enumerate() {
            if let Some(descriptor) = self.describe(level, root, user).await? {
                out.push(descriptor);
            }
            if index == 0 {
                continue;
            }
            for sibling in self.store.siblings(level, false).await? {
                if let Some(descriptor) = self.describe(&sibling, root, user).await? {
                    out.push(descriptor);
                }
            }
        }
        Ok(out)
    }
}
