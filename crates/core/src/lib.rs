/**
 * Access control for the virtual filesystem.
 *  - Enumerated actions (read, write, add, remove, execute)
 *  - Policy trait the host application implements
 *  - Resolver with superuser override
 */
pub mod acl;
/**
 * The command connector.
 * Maps wire commands onto vfs operations,
 *  shapes descriptor views, and produces the
 *  json envelopes the browser client expects.
 */
pub mod connector;
/**
 * The node hierarchy itself.
 * Nodes, the record and blob store collaborator
 *  traits, the tree-aware store, and the mime
 *  type registry.
 */
pub mod vfs;

pub mod prelude {
    pub use crate::acl::{Action, AllowAll, Policy, Resolver, User};
    pub use crate::connector::{Dispatcher, Driver, DriverError, ParamBag, Response, Upload};
    pub use crate::vfs::{
        BlobStore, MemoryBlobs, MemoryRecords, Node, NodeId, NodeRecords, NodeStore, StoreError,
        TypeRegistry,
    };
}
