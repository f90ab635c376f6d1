use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use mime::Mime;
use serde::{Deserialize, Serialize};

/**
 * Nodes
 * =====
 * Nodes are the building blocks of the virtual filesystem.
 * Every addressable object (folder, file, image) is one node
 *  in a single tree: a node carries its own identity, a link
 *  to its parent, and a kind-specific payload.
 * The node id doubles as the public "hash" clients use to
 *  address it over the wire. Real storage paths never leak.
 */

/// The public identifier of a node.
///
/// Stable for the lifetime of the node: renames and moves keep it,
/// copies mint a fresh one. The root of the tree always has the
/// well-known nil id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(uuid::Uuid);

impl NodeId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4())
    }

    /// The fixed id of the global root node.
    pub fn root() -> Self {
        Self(uuid::Uuid::nil())
    }

    pub fn is_root(&self) -> bool {
        self.0.is_nil()
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}

impl FromStr for NodeId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(uuid::Uuid::parse_str(s)?))
    }
}

/// Opaque reference into the blob store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlobId(uuid::Uuid);

impl BlobId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl fmt::Display for BlobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}

/// A handle to stored blob content plus its byte length.
///
/// The length is captured at put time so size queries never have to
/// round-trip to the blob store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlobRef {
    pub id: BlobId,
    pub len: u64,
}

/// The kind key used by the permission policy and the type registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KindTag {
    Folder,
    File,
    Image,
}

impl fmt::Display for KindTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KindTag::Folder => write!(f, "folder"),
            KindTag::File => write!(f, "file"),
            KindTag::Image => write!(f, "image"),
        }
    }
}

/// The wire mimetype reported for folders.
pub const DIRECTORY_MIME: &str = "directory";

/// Kind-specific payload of a node.
///
/// A node's kind is fixed at creation: a folder never becomes a file
/// and the mimetype of a file does not change on rename.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum NodeKind {
    Folder,
    File {
        #[serde(with = "mime_serde")]
        mime: Mime,
        blob: BlobRef,
    },
    Image {
        #[serde(with = "mime_serde")]
        mime: Mime,
        blob: BlobRef,
        width: u32,
        height: u32,
        thumb: Option<String>,
    },
}

impl NodeKind {
    pub fn tag(&self) -> KindTag {
        match self {
            NodeKind::Folder => KindTag::Folder,
            NodeKind::File { .. } => KindTag::File,
            NodeKind::Image { .. } => KindTag::Image,
        }
    }

    pub fn is_folder(&self) -> bool {
        matches!(self, NodeKind::Folder)
    }

    /// The mimetype string reported over the wire.
    pub fn mime_str(&self) -> String {
        match self {
            NodeKind::Folder => DIRECTORY_MIME.to_string(),
            NodeKind::File { mime, .. } => mime.to_string(),
            NodeKind::Image { mime, .. } => mime.to_string(),
        }
    }

    pub fn blob(&self) -> Option<&BlobRef> {
        match self {
            NodeKind::Folder => None,
            NodeKind::File { blob, .. } => Some(blob),
            NodeKind::Image { blob, .. } => Some(blob),
        }
    }

    /// Byte length of the backing blob; folders report 0.
    pub fn byte_len(&self) -> u64 {
        self.blob().map(|b| b.len).unwrap_or(0)
    }
}

/// A single entry in the hierarchy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    /// Non-empty and unique among siblings.
    pub name: String,
    /// None only for the global root.
    pub parent: Option<NodeId>,
    /// The user that created the node. Fixed for the node's lifetime.
    pub owner: Option<String>,
    pub created: DateTime<Utc>,
    pub modified: DateTime<Utc>,
    pub kind: NodeKind,
}

impl Node {
    /// The global root node. Its id is fixed, it has no parent, and it
    /// can never be renamed or removed.
    pub fn root(name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: NodeId::root(),
            name: name.into(),
            parent: None,
            owner: None,
            created: now,
            modified: now,
            kind: NodeKind::Folder,
        }
    }

    pub fn new_folder(
        name: impl Into<String>,
        parent: NodeId,
        owner: Option<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: NodeId::generate(),
            name: name.into(),
            parent: Some(parent),
            owner,
            created: now,
            modified: now,
            kind: NodeKind::Folder,
        }
    }

    pub fn new_file(
        name: impl Into<String>,
        parent: NodeId,
        owner: Option<String>,
        kind: NodeKind,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: NodeId::generate(),
            name: name.into(),
            parent: Some(parent),
            owner,
            created: now,
            modified: now,
            kind,
        }
    }

    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    pub fn is_folder(&self) -> bool {
        self.kind.is_folder()
    }

    /// Bump the modification timestamp.
    pub fn touch(&mut self) {
        self.modified = Utc::now();
    }
}

mod mime_serde {
    use std::str::FromStr;

    use mime::Mime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(mime: &Mime, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(mime.as_ref())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Mime, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Mime::from_str(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blob() -> BlobRef {
        BlobRef {
            id: BlobId::generate(),
            len: 42,
        }
    }

    #[test]
    fn test_root_id_is_fixed() {
        assert_eq!(NodeId::root(), NodeId::root());
        assert!(NodeId::root().is_root());
        assert!(!NodeId::generate().is_root());
    }

    #[test]
    fn test_node_id_roundtrip() {
        let id = NodeId::generate();
        let parsed: NodeId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn test_kind_mime_strings() {
        assert_eq!(NodeKind::Folder.mime_str(), "directory");

        let file = NodeKind::File {
            mime: "text/plain".parse().unwrap(),
            blob: blob(),
        };
        assert_eq!(file.mime_str(), "text/plain");
        assert_eq!(file.byte_len(), 42);
        assert_eq!(file.tag(), KindTag::File);
    }

    #[test]
    fn test_kind_serde_roundtrip() {
        let kind = NodeKind::Image {
            mime: "image/png".parse().unwrap(),
            blob: blob(),
            width: 640,
            height: 480,
            thumb: None,
        };
        let json = serde_json::to_string(&kind).unwrap();
        let decoded: NodeKind = serde_json::from_str(&json).unwrap();
        assert_eq!(kind, decoded);
    }

    #[test]
    fn test_root_node_shape() {
        let root = Node::root("root");
        assert!(root.is_root());
        assert!(root.is_folder());
        assert_eq!(root.id, NodeId::root());
        assert_eq!(root.kind.byte_len(), 0);
    }
}
