//! The `Acl` registry: owner of all live nodes and of the policy settings
//!
//! Nodes are looked up by kind and id only through the registry. It also
//! holds the default and preferred policies, the action validator, the rule
//! loader and the class registrations used to resolve external ids.
//!
//! # Thread Safety
//!
//! The registry is `Send + Sync` and is meant to be shared behind an `Arc`.
//! Node tables are `DashMap`s populated through the entry API, so concurrent
//! lazy loading of the same id registers a single instance.

use crate::config::AclConfig;
use crate::entity::Entity;
use crate::error::{AclError, Result};
use crate::external_id::ExternalId;
use crate::hierarchy::{Hierarchy, HierarchyNode};
use crate::loader::{ExternalIdLoader, NodeLoader, RecordLoader, RuleLoader};
use crate::policy::{decisive, Policy, PolicySettings, PolicyValue};
use crate::role::Role;
use crate::rule::{ActionValidator, Rule};
use crate::types::{NodeId, NodeRecord};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

/// Live instances of one node kind, keyed by id
#[derive(Debug)]
pub struct NodeTable<T> {
    nodes: DashMap<NodeId, Arc<T>>,
}

impl<T: Hierarchy> NodeTable<T> {
    fn new() -> Self {
        Self {
            nodes: DashMap::new(),
        }
    }

    pub fn get(&self, id: &NodeId) -> Option<Arc<T>> {
        self.nodes.get(id).map(|entry| Arc::clone(entry.value()))
    }

    pub fn contains(&self, id: &NodeId) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Registered ids, in no particular order
    pub fn ids(&self) -> Vec<NodeId> {
        self.nodes.iter().map(|entry| entry.key().clone()).collect()
    }

    fn insert_new(&self, node: T) -> Result<Arc<T>> {
        match self.nodes.entry(node.id().clone()) {
            Entry::Occupied(entry) => Err(AclError::DuplicateNode {
                kind: T::KIND,
                id: entry.key().clone(),
            }),
            Entry::Vacant(entry) => {
                let node = Arc::new(node);
                entry.insert(Arc::clone(&node));
                Ok(node)
            }
        }
    }

    /// First insert wins; `build` only runs for a vacant id
    fn get_or_insert_with<F>(&self, id: &NodeId, build: F) -> Result<Arc<T>>
    where
        F: FnOnce() -> Result<T>,
    {
        match self.nodes.entry(id.clone()) {
            Entry::Occupied(entry) => Ok(Arc::clone(entry.get())),
            Entry::Vacant(entry) => {
                let node = Arc::new(build()?);
                entry.insert(Arc::clone(&node));
                Ok(node)
            }
        }
    }

    fn clear(&self) {
        self.nodes.clear();
    }
}

/// Bijective mapping between external id kind names and record classes
#[derive(Debug, Default)]
struct ClassRegistry {
    by_name: HashMap<String, String>,
    by_class: HashMap<String, String>,
}

/// Registry and configuration authority for roles, entities and rules
pub struct Acl {
    roles: NodeTable<Role>,
    entities: NodeTable<Entity>,
    settings: RwLock<PolicySettings>,
    classes: RwLock<ClassRegistry>,
    action_validator: RwLock<Option<Arc<dyn ActionValidator>>>,
    rule_loader: RwLock<Option<Arc<dyn RuleLoader>>>,
    record_loader: RwLock<Option<Arc<dyn RecordLoader>>>,
}

impl Acl {
    /// Create a registry with the default configuration (default policy
    /// `DENY`, preferred policy `ALLOW`) and no collaborators
    pub fn new() -> Self {
        Self {
            roles: NodeTable::new(),
            entities: NodeTable::new(),
            settings: RwLock::new(PolicySettings::default()),
            classes: RwLock::new(ClassRegistry::default()),
            action_validator: RwLock::new(None),
            rule_loader: RwLock::new(None),
            record_loader: RwLock::new(None),
        }
    }

    /// Create a registry from a configuration, validating it first
    pub fn with_config(config: &AclConfig) -> Result<Self> {
        let acl = Self::new();
        acl.apply_config(config)?;
        Ok(acl)
    }

    /// Replace both policies at once
    pub fn apply_config(&self, config: &AclConfig) -> Result<()> {
        config.validate()?;
        *self.settings.write() = config.settings();
        info!(
            default_policy = %config.default_policy,
            preferred_policy = %config.preferred_policy,
            "ACL configuration applied"
        );
        Ok(())
    }

    // ------------------------------------------------------------------
    // Policy settings
    // ------------------------------------------------------------------

    /// Consistent snapshot of the default and preferred policy
    pub fn settings(&self) -> PolicySettings {
        *self.settings.read()
    }

    pub fn default_policy(&self) -> Policy {
        self.settings.read().default_policy
    }

    /// Accepts `ALLOW`/`DENY` as a [`Policy`], a name or a numeric code
    pub fn set_default_policy(&self, policy: impl PolicyValue) -> Result<()> {
        let policy = decisive(policy, "Default")?;
        self.settings.write().default_policy = policy;
        debug!(%policy, "default policy set");
        Ok(())
    }

    pub fn preferred_policy(&self) -> Policy {
        self.settings.read().preferred_policy
    }

    /// Accepts `ALLOW`/`DENY` as a [`Policy`], a name or a numeric code
    pub fn set_preferred_policy(&self, policy: impl PolicyValue) -> Result<()> {
        let policy = decisive(policy, "Preferred")?;
        self.settings.write().preferred_policy = policy;
        debug!(%policy, "preferred policy set");
        Ok(())
    }

    // ------------------------------------------------------------------
    // Collaborators
    // ------------------------------------------------------------------

    pub fn set_action_validator(&self, validator: Arc<dyn ActionValidator>) {
        *self.action_validator.write() = Some(validator);
    }

    pub fn clear_action_validator(&self) {
        *self.action_validator.write() = None;
    }

    pub fn has_action_validator(&self) -> bool {
        self.action_validator.read().is_some()
    }

    /// Run the configured validator; every action is valid without one
    pub fn validate_action(&self, action: &str) -> Result<()> {
        let validator = self.action_validator.read().clone();
        match validator {
            Some(validator) => validator
                .is_valid(action)
                .map_err(AclError::ValidationFailed),
            None => Ok(()),
        }
    }

    pub fn set_rule_loader(&self, loader: Arc<dyn RuleLoader>) {
        *self.rule_loader.write() = Some(loader);
    }

    /// Rules for an entity from the configured loader; without a loader no
    /// entity has rules
    pub fn load_rules(&self, entity_id: &NodeId) -> Result<Vec<Rule>> {
        let loader = self.rule_loader.read().clone();
        match loader {
            Some(loader) => loader.load_rules(self, entity_id),
            None => Ok(Vec::new()),
        }
    }

    pub fn set_record_loader(&self, loader: Arc<dyn RecordLoader>) {
        *self.record_loader.write() = Some(loader);
    }

    // ------------------------------------------------------------------
    // Node instances
    // ------------------------------------------------------------------

    pub(crate) fn roles(&self) -> &NodeTable<Role> {
        &self.roles
    }

    pub(crate) fn entities(&self) -> &NodeTable<Entity> {
        &self.entities
    }

    /// Look up a registered node. The root of a kind is created on first
    /// reference; any other unknown id is an `UnknownElement` error.
    pub fn get_instance<T: Hierarchy>(&self, id: &NodeId) -> Result<Arc<T>> {
        if let Some(node) = T::table(self).get(id) {
            return Ok(node);
        }
        if T::KIND.is_root(id) {
            return self.materialize::<T>(id, Vec::new());
        }
        Err(AclError::unknown(T::KIND, id))
    }

    pub fn has_instance<T: Hierarchy>(&self, id: &NodeId) -> bool {
        T::table(self).contains(id)
    }

    /// Register a node; fails with `DuplicateNode` when the id is taken
    pub fn set_instance<T: Hierarchy>(&self, node: T) -> Result<Arc<T>> {
        let node = T::table(self).insert_new(node)?;
        debug!(kind = %T::KIND, id = %node.id(), "node registered");
        Ok(node)
    }

    /// Like [`get_instance`](Acl::get_instance), but unknown ids are first
    /// offered to `loader`. Roots are never loaded.
    pub fn resolve<T: Hierarchy>(
        &self,
        id: &NodeId,
        loader: Option<&dyn NodeLoader>,
    ) -> Result<Arc<T>> {
        if let Some(node) = T::table(self).get(id) {
            return Ok(node);
        }

        if let Some(loader) = loader.filter(|_| !T::KIND.is_root(id)) {
            if let Some(record) = loader.load(self, T::KIND, id)? {
                debug!(kind = %T::KIND, %id, "node loaded");
                return self.materialize::<T>(id, record.parents);
            }
        }

        self.get_instance::<T>(id)
    }

    /// Create and register a node
    pub fn create_node<T: Hierarchy>(&self, id: NodeId, parents: Vec<NodeId>) -> Result<Arc<T>> {
        if T::table(self).contains(&id) {
            return Err(AclError::DuplicateNode { kind: T::KIND, id });
        }
        let node = T::from_node(HierarchyNode::new(T::KIND, id, parents)?);
        self.set_instance(node)
    }

    pub fn root<T: Hierarchy>(&self) -> Result<Arc<T>> {
        self.get_instance::<T>(&NodeId::from(T::KIND.root_id()))
    }

    fn materialize<T: Hierarchy>(&self, id: &NodeId, parents: Vec<NodeId>) -> Result<Arc<T>> {
        T::table(self).get_or_insert_with(id, || {
            HierarchyNode::new(T::KIND, id.clone(), parents).map(T::from_node)
        })
    }

    pub fn role(&self, id: impl Into<NodeId>) -> Result<Arc<Role>> {
        self.get_instance::<Role>(&id.into())
    }

    pub fn entity(&self, id: impl Into<NodeId>) -> Result<Arc<Entity>> {
        self.get_instance::<Entity>(&id.into())
    }

    pub fn create_role<I, P>(&self, id: impl Into<NodeId>, parents: I) -> Result<Arc<Role>>
    where
        I: IntoIterator<Item = P>,
        P: Into<NodeId>,
    {
        Role::create(self, id, parents)
    }

    pub fn create_entity<I, P>(&self, id: impl Into<NodeId>, parents: I) -> Result<Arc<Entity>>
    where
        I: IntoIterator<Item = P>,
        P: Into<NodeId>,
    {
        Entity::create(self, id, parents)
    }

    /// Forget every node of one kind
    pub fn clear_kind<T: Hierarchy>(&self) {
        T::table(self).clear();
        debug!(kind = %T::KIND, "node cache cleared");
    }

    /// Forget every role and entity, including their cached rules
    pub fn clear(&self) {
        self.clear_kind::<Role>();
        self.clear_kind::<Entity>();
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    /// Policy of a registered role performing `action` on a registered
    /// entity. Returns `UNDEFINED` when nothing decides.
    pub fn get_policy(
        &self,
        role: impl Into<NodeId>,
        entity: impl Into<NodeId>,
        action: &str,
    ) -> Result<Policy> {
        let role = self.role(role)?;
        self.entity(entity)?.get_policy(self, &role, action, None)
    }

    /// Whether a registered role may perform `action` on a registered
    /// entity, falling back to the default policy
    pub fn is_allowed(
        &self,
        role: impl Into<NodeId>,
        entity: impl Into<NodeId>,
        action: &str,
    ) -> Result<bool> {
        let role = self.role(role)?;
        self.entity(entity)?.is_allowed(self, &role, action, None)
    }

    // ------------------------------------------------------------------
    // External ids
    // ------------------------------------------------------------------

    /// Register `name` as the external id kind name of `class`. Both sides
    /// of the mapping must be unused.
    pub fn register_class(&self, name: impl Into<String>, class: impl Into<String>) -> Result<()> {
        let name = name.into();
        let class = class.into();

        if name.is_empty() || name.contains('#') {
            return Err(AclError::InvalidIdentifier(format!(
                "invalid class name '{}'",
                name
            )));
        }

        let mut classes = self.classes.write();
        if classes.by_name.contains_key(&name) {
            return Err(AclError::DuplicateRegistration(name));
        }
        if let Some(existing) = classes.by_class.get(&class) {
            return Err(AclError::DuplicateRegistration(format!(
                "{} is already registered as {}",
                class, existing
            )));
        }

        classes.by_name.insert(name.clone(), class.clone());
        classes.by_class.insert(class.clone(), name.clone());
        debug!(%name, %class, "class registered");
        Ok(())
    }

    pub fn class_for(&self, name: &str) -> Option<String> {
        self.classes.read().by_name.get(name).cloned()
    }

    pub fn name_for(&self, class: &str) -> Option<String> {
        self.classes.read().by_class.get(class).cloned()
    }

    /// External id of the record of `class` with the given key parts
    pub fn external_id<I, S>(&self, class: &str, key: I) -> Result<ExternalId>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let name = self
            .name_for(class)
            .ok_or_else(|| AclError::UnknownClass(class.to_string()))?;
        ExternalId::new(name, key)
    }

    /// Entity for an external id, loading it through the record loader when
    /// it is not registered yet
    pub fn load_by_external_id(&self, id: &str) -> Result<Arc<Entity>> {
        self.resolve::<Entity>(&NodeId::from(id), Some(&ExternalIdLoader))
    }

    /// Node record behind an external id, from the record loader
    pub fn load_external_record(&self, id: &str) -> Result<Option<NodeRecord>> {
        let external = ExternalId::parse(id)?;
        let class = self
            .class_for(external.kind())
            .ok_or_else(|| AclError::UnknownClass(external.kind().to_string()))?;

        let loader = self.record_loader.read().clone();
        match loader {
            Some(loader) => loader.load_record(&class, external.key()),
            None => Ok(None),
        }
    }
}

impl Default for Acl {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Acl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Acl")
            .field("roles", &self.roles.len())
            .field("entities", &self.entities.len())
            .field("settings", &self.settings())
            .field("action_validator", &self.has_action_validator())
            .field("rule_loader", &self.rule_loader.read().is_some())
            .field("record_loader", &self.record_loader.read().is_some())
            .finish()
    }
}
