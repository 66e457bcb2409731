//! # Arbor ACL
//!
//! Hierarchical access-control engine. Answers "is this role allowed to
//! perform this action on this entity?" by combining explicit rules with
//! inheritance through two independent hierarchies: one of roles
//! (user → group → `EVERYONE`) and one of entities
//! (file → folder → `EVERYTHING`).
//!
//! ## Features
//!
//! - **Exact matches first**: a rule for the very role asking is definitive
//! - **Closest ancestor wins** among rules for parent roles, ties going to
//!   the preferred policy
//! - **Entity inheritance** with explicit opt-out (`NOINHERIT`)
//! - **Lazy loading** of rules and of unknown nodes through pluggable loaders
//! - **Cycle safe** hierarchy walks
//! - **Thread-safe registry** shared across concurrent queries
//!
//! ## Example
//!
//! ```rust
//! use arbor_acl::{Acl, InMemoryRuleLoader, Policy, Rule, NO_PARENTS};
//! use std::sync::Arc;
//!
//! # fn main() -> arbor_acl::Result<()> {
//! let acl = Acl::new();
//! let rules = Arc::new(InMemoryRuleLoader::new());
//! acl.set_rule_loader(rules.clone());
//!
//! let group = acl.create_role("editors", NO_PARENTS)?;
//! let alice = acl.create_role("alice", [&group])?;
//! let folder = acl.create_entity("folder", NO_PARENTS)?;
//! let file = acl.create_entity("file", [&folder])?;
//!
//! rules.add_rule(Rule::new(&acl, "folder", "editors", "WRITE", Policy::Allow)?);
//!
//! assert!(file.is_allowed(&acl, &alice, "WRITE", None)?);
//! assert!(!file.is_allowed(&acl, &alice, "DELETE", None)?);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod entity;
pub mod error;
pub mod external_id;
pub mod hierarchy;
pub mod loader;
pub mod policy;
pub mod registry;
pub mod role;
pub mod rule;
pub mod types;

// Re-export commonly used types
pub use config::AclConfig;
pub use entity::Entity;
pub use error::{AclError, Result};
pub use external_id::ExternalId;
pub use hierarchy::{Hierarchy, HierarchyNode};
pub use loader::{
    ExternalIdLoader, InMemoryNodeLoader, InMemoryRuleLoader, NodeLoader, RecordLoader, RuleLoader,
};
pub use policy::{Policy, PolicySettings, PolicyValue};
pub use registry::{Acl, NodeTable};
pub use role::Role;
pub use rule::{ActionValidator, AllowedActions, Rule, RuleRecord, READ, WRITE};
pub use types::{NodeId, NodeKind, NodeRecord, NO_PARENTS};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
