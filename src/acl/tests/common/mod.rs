//! Shared fixtures for the integration tests

#![allow(dead_code)]

use arbor_acl::{Acl, InMemoryRuleLoader};
use std::sync::{Arc, Once};

static TRACING: Once = Once::new();

/// Install a test subscriber honoring `RUST_LOG`
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// Fresh registry wired to an empty in-memory rule store
pub fn acl_with_rules() -> (Acl, Arc<InMemoryRuleLoader>) {
    init_tracing();
    let acl = Acl::new();
    let rules = Arc::new(InMemoryRuleLoader::new());
    acl.set_rule_loader(rules.clone());
    (acl, rules)
}
