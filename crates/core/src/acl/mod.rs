//! # Access control
//!
//! Every mutation and every node added to a view is gated through the
//! [`Resolver`]. Resolution order:
//!
//! 1. a superuser passes every check unconditionally
//! 2. otherwise the host-supplied [`Policy`] is consulted with the
//!    node, the action and the user
//! 3. no applicable policy means deny
//!
//! The policy itself is owned by the host application (its users, groups
//! and grants live elsewhere); the core only asks yes/no questions.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use crate::vfs::Node;
pub use crate::vfs::KindTag;

/// The actions a user can be granted on a node kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    /// See the node and its descriptor.
    Read,
    /// Rename the node.
    Write,
    /// Pass through a folder. Reserved, currently unused.
    Execute,
    /// Delete the node.
    Remove,
    /// Create children under a folder.
    Add,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Read => write!(f, "read"),
            Action::Write => write!(f, "write"),
            Action::Execute => write!(f, "execute"),
            Action::Remove => write!(f, "remove"),
            Action::Add => write!(f, "add"),
        }
    }
}

/// The identity a command runs as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: String,
    pub superuser: bool,
}

impl User {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            superuser: false,
        }
    }

    pub fn superuser(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            superuser: true,
        }
    }
}

/// The externally-owned ACL the resolver consults for non-superusers.
///
/// The whole node is passed so a host can key decisions on ownership
/// or position in the tree, not just the kind.
pub trait Policy: Send + Sync + 'static {
    fn grants(&self, node: &Node, action: Action, user: &User) -> bool;
}

/// Grants everything to everyone. Useful for single-user deployments
/// and tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

impl Policy for AllowAll {
    fn grants(&self, _node: &Node, _action: Action, _user: &User) -> bool {
        true
    }
}

/// Explicit grant table keyed by `(kind, action, user id)`.
#[derive(Debug, Clone, Default)]
pub struct GrantTable {
    grants: HashSet<(KindTag, Action, String)>,
}

impl GrantTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allow(mut self, kind: KindTag, action: Action, user_id: impl Into<String>) -> Self {
        self.grants.insert((kind, action, user_id.into()));
        self
    }

    /// Grant one action on every kind to one user.
    pub fn allow_on_all_kinds(mut self, action: Action, user_id: impl Into<String>) -> Self {
        let user_id = user_id.into();
        for kind in [KindTag::Folder, KindTag::File, KindTag::Image] {
            self.grants.insert((kind, action, user_id.clone()));
        }
        self
    }

    /// Grant every action on every kind to one user.
    pub fn allow_all_for(mut self, user_id: impl Into<String>) -> Self {
        let user_id = user_id.into();
        for action in [
            Action::Read,
            Action::Write,
            Action::Execute,
            Action::Remove,
            Action::Add,
        ] {
            self = self.allow_on_all_kinds(action, user_id.clone());
        }
        self
    }
}

impl Policy for GrantTable {
    fn grants(&self, node: &Node, action: Action, user: &User) -> bool {
        self.grants
            .contains(&(node.kind.tag(), action, user.id.clone()))
    }
}

/// Answers "may user U perform action A on node N".
#[derive(Clone)]
pub struct Resolver {
    policy: Arc<dyn Policy>,
}

impl Resolver {
    pub fn new(policy: Arc<dyn Policy>) -> Self {
        Self { policy }
    }

    pub fn allow_all() -> Self {
        Self::new(Arc::new(AllowAll))
    }

    pub fn allows(&self, node: &Node, action: Action, user: &User) -> bool {
        if user.superuser {
            return true;
        }
        self.policy.grants(node, action, user)
    }
}
