//! Entities and policy resolution
//!
//! An entity is any object or class of objects rules apply to. Every entity
//! has one or more parents; at the top of the hierarchy sits `EVERYTHING`,
//! the ancestor of all entities.
//!
//! # Resolution
//!
//! [`Entity::get_policy`] answers "may `role` perform `action` on this
//! entity?":
//!
//! 1. A rule for exactly `role` and `action` is definitive; the first one in
//!    rule order wins.
//! 2. Otherwise the rule whose role is the closest ancestor of `role` wins.
//!    Between equally close rules the preferred policy wins, and failing
//!    that the first one in rule order.
//! 3. Otherwise, unless a `NOINHERIT` rule is present, the parent entities
//!    are consulted in order. The first parent answering with the preferred
//!    policy decides; if none does, the answer of the last parent is used.
//! 4. A query nothing decided yields `UNDEFINED`, which
//!    [`Entity::is_allowed`] maps to the default policy.

use crate::error::Result;
use crate::hierarchy::{Hierarchy, HierarchyNode};
use crate::loader::NodeLoader;
use crate::policy::{Policy, PolicySettings};
use crate::registry::{Acl, NodeTable};
use crate::role::Role;
use crate::rule::Rule;
use crate::types::{NodeId, NodeKind};
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// A protected object or class of objects
#[derive(Debug)]
pub struct Entity {
    node: HierarchyNode,

    /// Rules loaded from the registry's rule loader, until reset
    rules: RwLock<Option<Arc<[Rule]>>>,
}

impl Entity {
    /// The universal entity every other entity descends from
    pub fn everything(acl: &Acl) -> Result<Arc<Entity>> {
        acl.root::<Entity>()
    }

    /// Rules applying to this entity, in stored order.
    ///
    /// Loaded once through the registry and cached until [`reset_rules`].
    ///
    /// [`reset_rules`]: Entity::reset_rules
    pub fn rules(&self, acl: &Acl) -> Result<Arc<[Rule]>> {
        if let Some(rules) = self.rules.read().as_ref() {
            return Ok(Arc::clone(rules));
        }

        let loaded: Arc<[Rule]> = acl.load_rules(self.id())?.into();
        debug!(entity = %self.id(), count = loaded.len(), "rules loaded");

        // A concurrent load may have finished first; keep the stored list
        let mut slot = self.rules.write();
        Ok(Arc::clone(slot.get_or_insert(loaded)))
    }

    /// Drop the cached rules so the next query loads them again
    pub fn reset_rules(&self) -> &Self {
        *self.rules.write() = None;
        self
    }

    /// Whether `role` may perform `action` on this entity, applying the
    /// registry's default policy when no rule decides
    pub fn is_allowed(
        &self,
        acl: &Acl,
        role: &Role,
        action: &str,
        loader: Option<&dyn NodeLoader>,
    ) -> Result<bool> {
        let settings = acl.settings();
        let policy = self.resolve(acl, &settings, role, action, loader, &mut Vec::new())?;
        Ok(settings.finalize(policy) == Policy::Allow)
    }

    /// The policy for `role` performing `action` on this entity: `ALLOW`,
    /// `DENY` or `UNDEFINED` when nothing decided it
    pub fn get_policy(
        &self,
        acl: &Acl,
        role: &Role,
        action: &str,
        loader: Option<&dyn NodeLoader>,
    ) -> Result<Policy> {
        let settings = acl.settings();
        self.resolve(acl, &settings, role, action, loader, &mut Vec::new())
    }

    /// `path` holds the entities currently being resolved, so a cycle in the
    /// entity graph ends the branch instead of recursing forever
    fn resolve(
        &self,
        acl: &Acl,
        settings: &PolicySettings,
        role: &Role,
        action: &str,
        loader: Option<&dyn NodeLoader>,
        path: &mut Vec<NodeId>,
    ) -> Result<Policy> {
        let rules = self.rules(acl)?;

        let mut inherit = true;
        let mut closest: Option<(u32, Policy)> = None;

        for rule in rules.iter() {
            match rule.policy() {
                Policy::NoInherit => {
                    inherit = false;
                    continue;
                }
                Policy::Inherit => continue,
                _ => {}
            }

            if rule.action() != action {
                continue;
            }

            let Some(rule_role) = rule.role(acl)? else {
                trace!(entity = %self.id(), action, "rule without role skipped");
                continue;
            };

            if rule_role.is(role) {
                debug!(
                    entity = %self.id(),
                    role = %role.id(),
                    action,
                    policy = %rule.policy(),
                    "exact rule match"
                );
                return Ok(rule.policy());
            }

            if let Some(distance) = rule_role.is_ancestor_of(role, acl, loader)? {
                let replace = match closest {
                    None => true,
                    Some((best, _)) => {
                        distance < best
                            || (distance == best && rule.policy() == settings.preferred_policy)
                    }
                };
                if replace {
                    closest = Some((distance, rule.policy()));
                }
            }
        }

        if let Some((distance, policy)) = closest {
            debug!(
                entity = %self.id(),
                role = %role.id(),
                action,
                distance,
                policy = %policy,
                "ancestor rule match"
            );
            return Ok(policy);
        }

        if !inherit || !self.has_parents() {
            trace!(entity = %self.id(), inherit, "no applicable rule");
            return Ok(Policy::Undefined);
        }

        path.push(self.id().clone());
        let mut policy = Policy::Undefined;
        for parent in self.parents(acl, loader)? {
            if path.contains(parent.id()) {
                warn!(entity = %self.id(), parent = %parent.id(), "cycle in entity hierarchy");
                policy = Policy::Undefined;
                continue;
            }

            policy = parent.resolve(acl, settings, role, action, loader, path)?;

            // One parent granting the preferred policy decides for all
            if policy == settings.preferred_policy {
                break;
            }
        }
        path.pop();

        trace!(entity = %self.id(), policy = %policy, "inherited from parents");
        Ok(policy)
    }
}

impl Hierarchy for Entity {
    const KIND: NodeKind = NodeKind::Entity;

    fn node(&self) -> &HierarchyNode {
        &self.node
    }

    fn from_node(node: HierarchyNode) -> Self {
        Self {
            node,
            rules: RwLock::new(None),
        }
    }

    fn table(acl: &Acl) -> &NodeTable<Self> {
        acl.entities()
    }
}

impl From<&Entity> for NodeId {
    fn from(entity: &Entity) -> Self {
        entity.id().clone()
    }
}

impl From<&Arc<Entity>> for NodeId {
    fn from(entity: &Arc<Entity>) -> Self {
        entity.id().clone()
    }
}
