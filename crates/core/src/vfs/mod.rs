//! The virtual filesystem: a single tree of addressable nodes.
//!
//! This module defines the core types for the permission-aware hierarchy:
//!
//! - **[`Node`]**: one entry in the tree, a tagged variant of folder, file, or image
//! - **[`NodeRecords`]**: the persistent record store the tree is kept in
//! - **[`BlobStore`]**: the collaborator that holds raw file content
//! - **[`NodeStore`]**: tree-aware queries and mutations over both
//! - **[`TypeRegistry`]**: static mimetype -> node-kind table
//!
//! # Architecture
//!
//! Clients address nodes only by their stable public hash:
//! ```text
//! root (nil hash, locked)
//!    |
//!    +---------------+--------------+
//!    |               |              |
//!  docs/          notes.txt      photo.png
//!  (folder)       (file, blob)   (image, blob + dimensions)
//!    |
//!  report.pdf
//!  (file, blob)
//! ```
//!
//! The record store enforces `(parent, name)` uniqueness inside its own
//! lock or transaction; the [`NodeStore`] pre-checks are a fast path,
//! not the source of truth. Acyclicity is preserved by rejecting any
//! relink that would make a node its own ancestor.

mod blobs;
mod node;
mod records;
mod store;
mod types;

pub use blobs::{BlobError, BlobStore, MemoryBlobs};
pub use node::{BlobId, BlobRef, KindTag, Node, NodeId, NodeKind, DIRECTORY_MIME};
pub use records::{MemoryRecords, NodeRecords, RecordError};
pub use store::{NodeStore, StoreError};
pub use types::{FileVariant, TypeRegistry};
