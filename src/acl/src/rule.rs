//! Rules: policy statements relating one role to one entity for one action
//!
//! A rule with policy `NOINHERIT` is a per-entity directive disabling
//! inheritance. It can not carry a role or an action, and every setter
//! re-checks this against the current state of the other fields.

use crate::entity::Entity;
use crate::error::{AclError, Result};
use crate::policy::{deserialize_lenient, Policy, PolicyValue};
use crate::registry::Acl;
use crate::role::Role;
use crate::types::NodeId;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::{Arc, OnceLock, Weak};

/// Read permission on an entity
pub const READ: &str = "READ";

/// Write permission on an entity
pub const WRITE: &str = "WRITE";

/// Validates action names assigned to rules
pub trait ActionValidator: Send + Sync {
    /// `Err` carries the reason the action is rejected
    fn is_valid(&self, action: &str) -> std::result::Result<(), String>;
}

impl<F> ActionValidator for F
where
    F: Fn(&str) -> std::result::Result<(), String> + Send + Sync,
{
    fn is_valid(&self, action: &str) -> std::result::Result<(), String> {
        self(action)
    }
}

/// Validator accepting a fixed set of action names (case-sensitive)
#[derive(Debug, Clone, Default)]
pub struct AllowedActions {
    actions: HashSet<String>,
}

impl AllowedActions {
    pub fn new<I, S>(actions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            actions: actions.into_iter().map(Into::into).collect(),
        }
    }

    /// Only [`READ`] and [`WRITE`]
    pub fn read_write() -> Self {
        Self::new([READ, WRITE])
    }

    pub fn with_action(mut self, action: impl Into<String>) -> Self {
        self.actions.insert(action.into());
        self
    }
}

impl ActionValidator for AllowedActions {
    fn is_valid(&self, action: &str) -> std::result::Result<(), String> {
        if self.actions.contains(action) {
            Ok(())
        } else {
            Err(format!("unknown action '{}'", action))
        }
    }
}

/// Persisted form of a rule, as stored by a rule backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleRecord {
    pub entity_id: NodeId,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role_id: Option<NodeId>,

    #[serde(default)]
    pub action: String,

    /// Policy name or numeric code
    #[serde(deserialize_with = "deserialize_lenient")]
    pub policy: Policy,
}

/// One policy statement: `policy` applies when `role` performs `action` on
/// `entity`
#[derive(Debug)]
pub struct Rule {
    entity_id: NodeId,
    role_id: Option<NodeId>,
    action: String,
    policy: Policy,

    /// Set when any field changed after construction
    changed: bool,

    /// External storage the rule was loaded from
    record: Option<serde_json::Value>,

    role: OnceLock<Arc<Role>>,

    /// Weak: the entity caches its own rules. Refreshed once it expires.
    entity: RwLock<Weak<Entity>>,
}

impl Clone for Rule {
    fn clone(&self) -> Self {
        Self {
            entity_id: self.entity_id.clone(),
            role_id: self.role_id.clone(),
            action: self.action.clone(),
            policy: self.policy,
            changed: self.changed,
            record: self.record.clone(),
            role: self.role.clone(),
            entity: RwLock::new(self.entity.read().clone()),
        }
    }
}

impl Rule {
    /// Create a rule, assigning entity, role, action and policy in that
    /// order. A `NOINHERIT` rule takes an empty role and an empty action.
    pub fn new(
        acl: &Acl,
        entity: impl Into<NodeId>,
        role: impl Into<NodeId>,
        action: impl Into<String>,
        policy: impl PolicyValue,
    ) -> Result<Self> {
        let mut rule = Self {
            entity_id: NodeId::from(""),
            role_id: None,
            action: String::new(),
            policy: Policy::Undefined,
            changed: false,
            record: None,
            role: OnceLock::new(),
            entity: RwLock::new(Weak::new()),
        };

        rule.set_entity(entity)?;
        rule.set_role(role)?;
        rule.set_action(acl, action)?;
        rule.set_policy(policy)?;
        rule.changed = false;

        Ok(rule)
    }

    /// Build a rule from a persisted record and attach the record to it
    pub fn from_record(acl: &Acl, record: RuleRecord) -> Result<Self> {
        let stored = serde_json::to_value(&record).map_err(AclError::collaborator)?;
        let mut rule = Self::new(
            acl,
            record.entity_id,
            record.role_id.unwrap_or_else(|| NodeId::from("")),
            record.action,
            record.policy,
        )?;
        rule.record = Some(stored);
        Ok(rule)
    }

    /// Current state as a persisted record
    pub fn to_record(&self) -> RuleRecord {
        RuleRecord {
            entity_id: self.entity_id.clone(),
            role_id: self.role_id.clone(),
            action: self.action.clone(),
            policy: self.policy,
        }
    }

    pub fn entity_id(&self) -> &NodeId {
        &self.entity_id
    }

    /// `None` for rules without a role, such as `NOINHERIT`
    pub fn role_id(&self) -> Option<&NodeId> {
        self.role_id.as_ref()
    }

    pub fn action(&self) -> &str {
        &self.action
    }

    pub fn policy(&self) -> Policy {
        self.policy
    }

    pub fn is_changed(&self) -> bool {
        self.changed
    }

    /// Mark the rule as persisted
    pub fn reset_changed(&mut self) {
        self.changed = false;
    }

    pub fn record(&self) -> Option<&serde_json::Value> {
        self.record.as_ref()
    }

    pub fn set_record(&mut self, record: serde_json::Value) -> &mut Self {
        self.record = Some(record);
        self
    }

    pub fn set_entity(&mut self, entity: impl Into<NodeId>) -> Result<()> {
        let entity = entity.into();
        if entity.is_empty() {
            return Err(AclError::InvalidIdentifier(
                "Entity-ID of a rule must not be empty".to_string(),
            ));
        }

        if entity != self.entity_id {
            self.entity_id = entity;
            self.entity = RwLock::new(Weak::new());
            self.changed = true;
        }
        Ok(())
    }

    /// An empty id clears the role
    pub fn set_role(&mut self, role: impl Into<NodeId>) -> Result<()> {
        let role = role.into();
        let role = if role.is_empty() { None } else { Some(role) };

        if role.is_some() && self.policy == Policy::NoInherit {
            return Err(AclError::StructuralConflict(
                "NOINHERIT can not be used in combination with a role".to_string(),
            ));
        }

        if role != self.role_id {
            self.role_id = role;
            self.role = OnceLock::new();
            self.changed = true;
        }
        Ok(())
    }

    /// Non-empty actions must pass the registry's action validator
    pub fn set_action(&mut self, acl: &Acl, action: impl Into<String>) -> Result<()> {
        let action = action.into();

        if !action.is_empty() && self.policy == Policy::NoInherit {
            return Err(AclError::StructuralConflict(
                "NOINHERIT can not be used in combination with an action".to_string(),
            ));
        }

        if action != self.action {
            if !action.is_empty() {
                acl.validate_action(&action)?;
            }
            self.action = action;
            self.changed = true;
        }
        Ok(())
    }

    /// `UNDEFINED` is a result only and can not be stored in a rule
    pub fn set_policy(&mut self, policy: impl PolicyValue) -> Result<()> {
        let policy = policy.into_policy()?;

        if policy == Policy::Undefined {
            return Err(AclError::InvalidPolicyValue(
                "Policy must be either ALLOW, DENY, INHERIT or NOINHERIT".to_string(),
            ));
        }

        if policy == Policy::NoInherit {
            if !self.action.is_empty() {
                return Err(AclError::StructuralConflict(
                    "NOINHERIT can not be used in combination with an action".to_string(),
                ));
            }
            if self.role_id.is_some() {
                return Err(AclError::StructuralConflict(
                    "NOINHERIT can not be used in combination with a role".to_string(),
                ));
            }
        }

        if policy != self.policy {
            self.policy = policy;
            self.changed = true;
        }
        Ok(())
    }

    /// The role this rule applies to, resolved through the registry once
    pub fn role(&self, acl: &Acl) -> Result<Option<Arc<Role>>> {
        let Some(id) = &self.role_id else {
            return Ok(None);
        };

        if let Some(role) = self.role.get() {
            return Ok(Some(Arc::clone(role)));
        }

        let role = acl.get_instance::<Role>(id)?;
        Ok(Some(Arc::clone(self.role.get_or_init(|| role))))
    }

    /// The entity this rule applies to, resolved through the registry
    /// while no resolved instance is alive
    pub fn entity(&self, acl: &Acl) -> Result<Arc<Entity>> {
        if let Some(entity) = self.entity.read().upgrade() {
            return Ok(entity);
        }

        let entity = acl.get_instance::<Entity>(&self.entity_id)?;
        *self.entity.write() = Arc::downgrade(&entity);
        Ok(entity)
    }
}
