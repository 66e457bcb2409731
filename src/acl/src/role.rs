//! Roles: the actors of the access-control hierarchy
//!
//! A role is a user, a group or any other actor. Roles inherit from parent
//! roles (user → group → ...), and every role descends from the universal
//! `EVERYONE` role.

use crate::error::Result;
use crate::hierarchy::{Hierarchy, HierarchyNode};
use crate::registry::{Acl, NodeTable};
use crate::types::{NodeId, NodeKind};
use std::sync::Arc;

/// An actor or group of actors
#[derive(Debug)]
pub struct Role {
    node: HierarchyNode,
}

impl Role {
    /// The universal role every other role descends from
    pub fn everyone(acl: &Acl) -> Result<Arc<Role>> {
        acl.root::<Role>()
    }
}

impl Hierarchy for Role {
    const KIND: NodeKind = NodeKind::Role;

    fn node(&self) -> &HierarchyNode {
        &self.node
    }

    fn from_node(node: HierarchyNode) -> Self {
        Self { node }
    }

    fn table(acl: &Acl) -> &NodeTable<Self> {
        acl.roles()
    }
}

impl From<&Role> for NodeId {
    fn from(role: &Role) -> Self {
        role.id().clone()
    }
}

impl From<&Arc<Role>> for NodeId {
    fn from(role: &Arc<Role>) -> Self {
        role.id().clone()
    }
}
