//! Registry tests: configuration, class registrations, external ids and
//! cache management

mod common;

use arbor_acl::{
    Acl, AclConfig, AclError, Entity, Hierarchy, NodeId, NodeKind, NodeRecord, Policy,
    RecordLoader, Result, Role, Rule, NO_PARENTS, READ,
};
use common::{acl_with_rules, init_tracing};
use parking_lot::Mutex;
use std::io::Write;
use std::sync::Arc;

// ============================================================================
// CONFIGURATION
// ============================================================================

#[test]
fn test_config_from_file() {
    init_tracing();
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "default_policy = \"ALLOW\"").unwrap();
    writeln!(file, "preferred_policy = \"DENY\"").unwrap();

    let config = AclConfig::from_file(file.path()).unwrap();
    let acl = Acl::with_config(&config).unwrap();
    assert_eq!(acl.default_policy(), Policy::Allow);
    assert_eq!(acl.preferred_policy(), Policy::Deny);
}

#[test]
fn test_config_file_missing() {
    let dir = tempfile::tempdir().unwrap();
    let result = AclConfig::from_file(dir.path().join("acl.toml"));
    assert!(matches!(result, Err(AclError::Io(_))));
}

#[test]
fn test_config_file_invalid() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "default_policy = \"INHERIT\"").unwrap();
    assert!(matches!(
        AclConfig::from_file(file.path()),
        Err(AclError::InvalidPolicyValue(_))
    ));

    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "default_policy = [").unwrap();
    assert!(matches!(
        AclConfig::from_file(file.path()),
        Err(AclError::Config(_))
    ));
}

#[test]
fn test_with_config_rejects_programmatic_markers() {
    let config = AclConfig {
        default_policy: Policy::Undefined,
        ..AclConfig::default()
    };
    assert!(matches!(
        Acl::with_config(&config),
        Err(AclError::InvalidPolicyValue(_))
    ));
}

#[test]
fn test_apply_config_changes_outcome() {
    let (acl, _rules) = acl_with_rules();
    acl.create_role("user", NO_PARENTS).unwrap();
    acl.create_entity("file", NO_PARENTS).unwrap();
    assert!(!acl.is_allowed("user", "file", READ).unwrap());

    acl.apply_config(&AclConfig::from_toml_str("default_policy = 1").unwrap())
        .unwrap();
    assert!(acl.is_allowed("user", "file", READ).unwrap());
}

// ============================================================================
// CLASS REGISTRATIONS
// ============================================================================

#[test]
fn test_register_class_is_bijective() {
    let acl = Acl::new();
    acl.register_class("Post", "blog::Post").unwrap();

    assert_eq!(acl.class_for("Post").as_deref(), Some("blog::Post"));
    assert_eq!(acl.name_for("blog::Post").as_deref(), Some("Post"));
    assert_eq!(acl.class_for("Comment"), None);

    assert!(matches!(
        acl.register_class("Post", "blog::Article"),
        Err(AclError::DuplicateRegistration(_))
    ));
    assert!(matches!(
        acl.register_class("Article", "blog::Post"),
        Err(AclError::DuplicateRegistration(_))
    ));
    assert!(matches!(
        acl.register_class("", "blog::Comment"),
        Err(AclError::InvalidIdentifier(_))
    ));
    assert!(matches!(
        acl.register_class("Co#mment", "blog::Comment"),
        Err(AclError::InvalidIdentifier(_))
    ));
}

#[test]
fn test_external_id_for_registered_class() {
    let acl = Acl::new();
    acl.register_class("Membership", "org::Membership").unwrap();

    let id = acl.external_id("org::Membership", ["12", "7"]).unwrap();
    assert_eq!(id.to_string(), "Membership#12-7");

    assert!(matches!(
        acl.external_id("org::Unknown", ["1"]),
        Err(AclError::UnknownClass(_))
    ));
    assert!(matches!(
        acl.external_id("org::Membership", ["1-2"]),
        Err(AclError::InvalidExternalId(_))
    ));
}

// ============================================================================
// EXTERNAL ID LOADING
// ============================================================================

/// Record store answering for posts in a blog, recording every request
#[derive(Default)]
struct BlogStore {
    requests: Mutex<Vec<(String, Vec<String>)>>,
}

impl RecordLoader for BlogStore {
    fn load_record(&self, class: &str, key: &[String]) -> Result<Option<NodeRecord>> {
        self.requests.lock().push((class.to_string(), key.to_vec()));
        match (class, key) {
            ("blog::Post", [id]) if id.parse::<u32>().is_ok() => {
                Ok(Some(NodeRecord::new(["blog"])))
            }
            ("blog::Post", _) => Ok(None),
            _ => Err(AclError::collaborator(format!("no table for {}", class))),
        }
    }
}

fn blog_acl() -> (Acl, Arc<BlogStore>) {
    let (acl, rules) = acl_with_rules();
    let store = Arc::new(BlogStore::default());
    acl.set_record_loader(store.clone());
    acl.register_class("Post", "blog::Post").unwrap();
    acl.register_class("Page", "site::Page").unwrap();
    acl.create_entity("blog", NO_PARENTS).unwrap();
    acl.create_role("readers", NO_PARENTS).unwrap();
    rules.add_rule(Rule::new(&acl, "blog", "readers", READ, Policy::Allow).unwrap());
    (acl, store)
}

#[test]
fn test_load_by_external_id() {
    let (acl, store) = blog_acl();

    let post = acl.load_by_external_id("Post#42").unwrap();
    assert_eq!(post.id(), &NodeId::from("Post#42"));
    assert_eq!(post.parent_ids(), vec![NodeId::from("blog")]);
    assert!(acl.is_allowed("readers", "Post#42", READ).unwrap());

    // Second lookup is served by the registry
    let again = acl.load_by_external_id("Post#42").unwrap();
    assert!(Arc::ptr_eq(&post, &again));
    assert_eq!(
        store.requests.lock().as_slice(),
        &[("blog::Post".to_string(), vec!["42".to_string()])]
    );
}

#[test]
fn test_load_by_external_id_errors() {
    let (acl, _store) = blog_acl();

    assert!(matches!(
        acl.load_by_external_id("Post#abc"),
        Err(AclError::UnknownElement { kind: NodeKind::Entity, .. })
    ));
    assert!(matches!(
        acl.load_by_external_id("Comment#1"),
        Err(AclError::UnknownClass(_))
    ));
    assert!(matches!(
        acl.load_by_external_id("Page#1"),
        Err(AclError::Collaborator(_))
    ));
    assert!(matches!(
        acl.load_by_external_id("Post#1#2"),
        Err(AclError::InvalidExternalId(_))
    ));
    assert!(matches!(
        acl.load_by_external_id("plain"),
        Err(AclError::UnknownElement { .. })
    ));
}

#[test]
fn test_external_id_without_record_loader() {
    let acl = Acl::new();
    acl.register_class("Post", "blog::Post").unwrap();
    assert!(matches!(
        acl.load_by_external_id("Post#1"),
        Err(AclError::UnknownElement { .. })
    ));
}

#[test]
fn test_registered_external_entity_needs_no_loader() {
    let acl = Acl::new();
    let post = acl.create_entity("Post#9", NO_PARENTS).unwrap();
    assert!(Arc::ptr_eq(&acl.load_by_external_id("Post#9").unwrap(), &post));
}

// ============================================================================
// INSTANCE CACHE
// ============================================================================

#[test]
fn test_set_instance_and_lookup() {
    let acl = Acl::new();
    let role = acl.create_role("user", ["staff"]).unwrap();

    assert!(Arc::ptr_eq(&acl.role("user").unwrap(), &role));
    assert!(Arc::ptr_eq(
        &acl.get_instance::<Role>(&NodeId::from("user")).unwrap(),
        &role
    ));
    assert!(acl.has_instance::<Role>(&NodeId::from("user")));
    assert!(!acl.has_instance::<Entity>(&NodeId::from("user")));
}

#[test]
fn test_clear_forgets_nodes_and_rules() {
    let (acl, rules) = acl_with_rules();
    acl.create_role("user", NO_PARENTS).unwrap();
    acl.create_entity("file", NO_PARENTS).unwrap();
    rules.add_rule(Rule::new(&acl, "file", "user", READ, Policy::Allow).unwrap());
    assert!(acl.is_allowed("user", "file", READ).unwrap());

    acl.clear();
    assert!(acl.role("user").is_err());
    assert!(acl.entity("file").is_err());

    // Recreated nodes load their rules afresh
    rules.clear();
    acl.create_role("user", NO_PARENTS).unwrap();
    acl.create_entity("file", NO_PARENTS).unwrap();
    assert!(!acl.is_allowed("user", "file", READ).unwrap());
}

#[test]
fn test_clear_kind_keeps_other_kind() {
    let acl = Acl::new();
    acl.create_role("user", NO_PARENTS).unwrap();
    acl.create_entity("file", NO_PARENTS).unwrap();

    acl.clear_kind::<Entity>();
    assert!(acl.role("user").is_ok());
    assert!(acl.entity("file").is_err());

    // Roots come back on demand
    assert!(Entity::everything(&acl).unwrap().is_root());
}
