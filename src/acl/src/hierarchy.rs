//! Parent/child graph shared by roles and entities
//!
//! Every node stores an ordered set of parent ids. Parents are resolved
//! lazily through the [`Acl`] registry, optionally materializing unknown
//! ids through a [`NodeLoader`]. A node without parents is attached to the
//! root sentinel of its kind; the root itself never has parents.
//!
//! Ancestry queries walk the parent graph breadth-first, one generation at
//! a time, and keep a visited set so an accidental cycle cannot hang them.

use crate::error::{AclError, Result};
use crate::loader::NodeLoader;
use crate::registry::{Acl, NodeTable};
use crate::types::{NodeId, NodeKind};
use parking_lot::RwLock;
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use tracing::trace;

/// Identity and parent list of a role or entity
#[derive(Debug)]
pub struct HierarchyNode {
    kind: NodeKind,
    id: NodeId,
    parents: RwLock<Vec<NodeId>>,
}

impl HierarchyNode {
    /// Create a node, validating the id and normalizing the parent list
    pub fn new(kind: NodeKind, id: NodeId, parents: Vec<NodeId>) -> Result<Self> {
        if id.is_empty() {
            return Err(AclError::InvalidIdentifier(format!(
                "{}-ID must not be empty",
                kind
            )));
        }
        let parents = normalize_parents(kind, &id, parents)?;
        Ok(Self {
            kind,
            id,
            parents: RwLock::new(parents),
        })
    }

    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    pub fn id(&self) -> &NodeId {
        &self.id
    }

    pub fn is_root(&self) -> bool {
        self.kind.is_root(&self.id)
    }

    /// Snapshot of the parent ids, in order
    pub fn parent_ids(&self) -> Vec<NodeId> {
        self.parents.read().clone()
    }

    pub fn has_parents(&self) -> bool {
        !self.parents.read().is_empty()
    }

    pub(crate) fn replace_parents(&self, parents: Vec<NodeId>) -> Result<()> {
        let parents = normalize_parents(self.kind, &self.id, parents)?;
        *self.parents.write() = parents;
        Ok(())
    }
}

/// Deduplicate (keeping first occurrence) and default to the root
fn normalize_parents(kind: NodeKind, id: &NodeId, parents: Vec<NodeId>) -> Result<Vec<NodeId>> {
    let mut seen = HashSet::with_capacity(parents.len());
    let mut normalized = Vec::with_capacity(parents.len().max(1));

    for parent in parents {
        if parent.is_empty() {
            return Err(AclError::InvalidIdentifier(format!(
                "Parent-ID of {} {} must not be empty",
                kind, id
            )));
        }
        if seen.insert(parent.clone()) {
            normalized.push(parent);
        }
    }

    if kind.is_root(id) {
        if !normalized.is_empty() {
            return Err(AclError::StructuralConflict(format!(
                "the root {} {} can not have parents",
                kind, id
            )));
        }
    } else if normalized.is_empty() {
        normalized.push(NodeId::from(kind.root_id()));
    }

    Ok(normalized)
}

/// Behaviour shared by [`Role`](crate::Role) and [`Entity`](crate::Entity)
///
/// Implementors only provide access to their [`HierarchyNode`] and to their
/// instance table in the registry; everything else is provided.
pub trait Hierarchy: Sized + Send + Sync + 'static {
    /// Which hierarchy this node belongs to
    const KIND: NodeKind;

    fn node(&self) -> &HierarchyNode;

    /// Wrap a freshly validated node
    fn from_node(node: HierarchyNode) -> Self;

    /// The registry table holding the live instances of this kind
    fn table(acl: &Acl) -> &NodeTable<Self>;

    fn id(&self) -> &NodeId {
        self.node().id()
    }

    /// Whether both refer to the same node (same kind and id)
    fn is(&self, other: &Self) -> bool {
        self.id() == other.id()
    }

    fn is_root(&self) -> bool {
        self.node().is_root()
    }

    fn parent_ids(&self) -> Vec<NodeId> {
        self.node().parent_ids()
    }

    fn has_parents(&self) -> bool {
        self.node().has_parents()
    }

    /// Replace the parents of this node. An empty list attaches the node to
    /// the root of its kind.
    fn set_parents<I, P>(&self, parents: I) -> Result<()>
    where
        I: IntoIterator<Item = P>,
        P: Into<NodeId>,
    {
        self.node()
            .replace_parents(parents.into_iter().map(Into::into).collect())
    }

    /// Create and register a node of this kind
    fn create<I, P>(acl: &Acl, id: impl Into<NodeId>, parents: I) -> Result<Arc<Self>>
    where
        I: IntoIterator<Item = P>,
        P: Into<NodeId>,
    {
        acl.create_node::<Self>(id.into(), parents.into_iter().map(Into::into).collect())
    }

    /// The root sentinel of this kind
    fn root(acl: &Acl) -> Result<Arc<Self>> {
        acl.root::<Self>()
    }

    /// Resolve the parents through the registry, preserving their order.
    ///
    /// Unknown parents are materialized through `loader` when one is given;
    /// otherwise resolving them fails with `UnknownElement`.
    fn parents(&self, acl: &Acl, loader: Option<&dyn NodeLoader>) -> Result<Vec<Arc<Self>>> {
        self.parent_ids()
            .iter()
            .map(|id| acl.resolve::<Self>(id, loader))
            .collect()
    }

    /// Number of generations between this node and its ancestor `other`
    /// (1 for a direct parent), or `None` when `other` is not an ancestor.
    /// A node is never its own ancestor, even inside a cycle.
    fn is_offspring_of(
        &self,
        other: &Self,
        acl: &Acl,
        loader: Option<&dyn NodeLoader>,
    ) -> Result<Option<u32>> {
        if self.is(other) {
            return Ok(None);
        }

        let mut queue: VecDeque<(u32, Arc<Self>)> = self
            .parents(acl, loader)?
            .into_iter()
            .map(|parent| (1, parent))
            .collect();

        let mut seen: HashSet<NodeId> = HashSet::new();
        seen.insert(self.id().clone());

        while let Some((depth, current)) = queue.pop_front() {
            if !seen.insert(current.id().clone()) {
                continue;
            }

            if current.id() == other.id() {
                trace!(kind = %Self::KIND, from = %self.id(), to = %other.id(), depth, "ancestor found");
                return Ok(Some(depth));
            }

            for parent in current.parents(acl, loader)? {
                if !seen.contains(parent.id()) {
                    queue.push_back((depth + 1, parent));
                }
            }
        }

        Ok(None)
    }

    /// Number of generations between this node and its offspring `other`,
    /// or `None` when unrelated
    fn is_ancestor_of(
        &self,
        other: &Self,
        acl: &Acl,
        loader: Option<&dyn NodeLoader>,
    ) -> Result<Option<u32>> {
        other.is_offspring_of(self, acl, loader)
    }
}
