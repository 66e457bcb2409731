//! Collaborator interfaces: where rules and unknown nodes come from

use crate::error::Result;
use crate::registry::Acl;
use crate::rule::{Rule, RuleRecord};
use crate::types::{NodeId, NodeKind, NodeRecord};
use parking_lot::RwLock;
use std::collections::HashMap;
use tracing::trace;

/// Source of the rules applying to an entity
///
/// Must be deterministic for a given id within a query, and must preserve
/// storage order: the first exact match in that order is definitive.
pub trait RuleLoader: Send + Sync {
    fn load_rules(&self, acl: &Acl, entity_id: &NodeId) -> Result<Vec<Rule>>;
}

/// Materializes nodes the registry does not know yet.
///
/// Passed per query. Returning `Ok(None)` means the id is unknown to the
/// loader as well.
pub trait NodeLoader: Send + Sync {
    fn load(&self, acl: &Acl, kind: NodeKind, id: &NodeId) -> Result<Option<NodeRecord>>;
}

impl<F> NodeLoader for F
where
    F: Fn(&Acl, NodeKind, &NodeId) -> Result<Option<NodeRecord>> + Send + Sync,
{
    fn load(&self, acl: &Acl, kind: NodeKind, id: &NodeId) -> Result<Option<NodeRecord>> {
        self(acl, kind, id)
    }
}

/// Loads the record behind an external id (`<kind-name>#<key>`), given the
/// class registered for the kind name and the `-`-separated key parts
pub trait RecordLoader: Send + Sync {
    fn load_record(&self, class: &str, key: &[String]) -> Result<Option<NodeRecord>>;
}

/// In-memory rule store keyed by entity id
#[derive(Debug, Default)]
pub struct InMemoryRuleLoader {
    rules: RwLock<HashMap<NodeId, Vec<Rule>>>,
}

impl InMemoryRuleLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from persisted records, preserving their order
    pub fn from_records<I>(acl: &Acl, records: I) -> Result<Self>
    where
        I: IntoIterator<Item = RuleRecord>,
    {
        let loader = Self::new();
        for record in records {
            loader.add_rule(Rule::from_record(acl, record)?);
        }
        Ok(loader)
    }

    /// Replace the rules of one entity
    pub fn set_rules(&self, entity_id: impl Into<NodeId>, rules: Vec<Rule>) {
        self.rules.write().insert(entity_id.into(), rules);
    }

    /// Append a rule to the list of its own entity
    pub fn add_rule(&self, rule: Rule) {
        self.rules
            .write()
            .entry(rule.entity_id().clone())
            .or_default()
            .push(rule);
    }

    pub fn clear(&self) {
        self.rules.write().clear();
    }

    /// Total number of stored rules
    pub fn len(&self) -> usize {
        self.rules.read().values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl RuleLoader for InMemoryRuleLoader {
    fn load_rules(&self, _acl: &Acl, entity_id: &NodeId) -> Result<Vec<Rule>> {
        Ok(self.rules.read().get(entity_id).cloned().unwrap_or_default())
    }
}

/// In-memory node definitions, for fixtures and tests
#[derive(Debug, Default)]
pub struct InMemoryNodeLoader {
    records: RwLock<HashMap<(NodeKind, NodeId), NodeRecord>>,
}

impl InMemoryNodeLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, kind: NodeKind, id: impl Into<NodeId>, record: NodeRecord) {
        self.records.write().insert((kind, id.into()), record);
    }

    pub fn with_node<I, P>(self, kind: NodeKind, id: impl Into<NodeId>, parents: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<NodeId>,
    {
        self.insert(kind, id, NodeRecord::new(parents));
        self
    }
}

impl NodeLoader for InMemoryNodeLoader {
    fn load(&self, _acl: &Acl, kind: NodeKind, id: &NodeId) -> Result<Option<NodeRecord>> {
        Ok(self.records.read().get(&(kind, id.clone())).cloned())
    }
}

/// Resolves entities named by external id through the registry's
/// [`RecordLoader`]. Roles and plain ids are left unresolved.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExternalIdLoader;

impl NodeLoader for ExternalIdLoader {
    fn load(&self, acl: &Acl, kind: NodeKind, id: &NodeId) -> Result<Option<NodeRecord>> {
        match (kind, id.as_str()) {
            (NodeKind::Entity, Some(compound)) if compound.contains('#') => {
                acl.load_external_record(compound)
            }
            _ => {
                trace!(%kind, %id, "not an external id");
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::Policy;
    use crate::rule::{READ, WRITE};

    #[test]
    fn test_rules_keep_insertion_order() {
        let acl = Acl::new();
        let loader = InMemoryRuleLoader::new();
        loader.add_rule(Rule::new(&acl, "file", "a", READ, Policy::Allow).unwrap());
        loader.add_rule(Rule::new(&acl, "file", "a", READ, Policy::Deny).unwrap());
        loader.add_rule(Rule::new(&acl, "other", "a", WRITE, Policy::Deny).unwrap());

        let rules = loader.load_rules(&acl, &NodeId::from("file")).unwrap();
        assert_eq!(rules.len(), 2);
        assert_eq!(rules[0].policy(), Policy::Allow);
        assert_eq!(rules[1].policy(), Policy::Deny);
        assert_eq!(loader.len(), 3);
    }

    #[test]
    fn test_unknown_entity_has_no_rules() {
        let acl = Acl::new();
        let loader = InMemoryRuleLoader::new();
        assert!(loader.load_rules(&acl, &NodeId::from("nope")).unwrap().is_empty());
        assert!(loader.is_empty());
    }

    #[test]
    fn test_from_records() {
        let acl = Acl::new();
        let records = vec![
            RuleRecord {
                entity_id: "file".into(),
                role_id: Some("user".into()),
                action: READ.to_string(),
                policy: Policy::Allow,
            },
            RuleRecord {
                entity_id: "file".into(),
                role_id: None,
                action: String::new(),
                policy: Policy::NoInherit,
            },
        ];
        let loader = InMemoryRuleLoader::from_records(&acl, records).unwrap();
        let rules = loader.load_rules(&acl, &NodeId::from("file")).unwrap();
        assert_eq!(rules[1].policy(), Policy::NoInherit);
        assert!(rules.iter().all(|r| r.record().is_some()));
    }

    #[test]
    fn test_external_loader_ignores_roles_and_plain_ids() {
        let acl = Acl::new();
        let loader = ExternalIdLoader;
        assert!(loader
            .load(&acl, NodeKind::Role, &NodeId::from("Doc#1"))
            .unwrap()
            .is_none());
        assert!(loader
            .load(&acl, NodeKind::Entity, &NodeId::from("plain"))
            .unwrap()
            .is_none());
    }
}
