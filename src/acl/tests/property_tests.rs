//! Property-based tests for ancestry distances and rule selection

mod common;

use arbor_acl::{Acl, ExternalId, Hierarchy, Policy, Role, Rule, NO_PARENTS, READ};
use common::acl_with_rules;
use proptest::prelude::*;
use std::sync::Arc;

/// Roles `r0 ⊂ r1 ⊂ ... ⊂ r{len-1}` with r{len-1} directly under EVERYONE
fn role_chain(acl: &Acl, len: usize) -> Vec<Arc<Role>> {
    let mut chain: Vec<Arc<Role>> = Vec::with_capacity(len);
    for idx in (0..len).rev() {
        let parents: Vec<String> = if idx + 1 < len {
            vec![format!("r{}", idx + 1)]
        } else {
            Vec::new()
        };
        chain.push(acl.create_role(format!("r{}", idx), parents).unwrap());
    }
    chain.reverse();
    chain
}

fn decisive_policy() -> impl Strategy<Value = Policy> {
    prop_oneof![Just(Policy::Allow), Just(Policy::Deny)]
}

proptest! {
    #[test]
    fn test_chain_distance_is_index_difference(len in 2usize..12, a in 0usize..12, b in 0usize..12) {
        let a = a % len;
        let b = b % len;
        let acl = Acl::new();
        let chain = role_chain(&acl, len);

        let distance = chain[a].is_offspring_of(&chain[b], &acl, None).unwrap();
        if a < b {
            prop_assert_eq!(distance, Some((b - a) as u32));
        } else {
            prop_assert_eq!(distance, None);
        }
        prop_assert_eq!(
            chain[b].is_ancestor_of(&chain[a], &acl, None).unwrap(),
            distance
        );
    }

    #[test]
    fn test_random_graphs_terminate_without_self_ancestry(
        size in 1usize..8,
        edges in prop::collection::vec((0usize..8, 0usize..8), 0..20),
    ) {
        let acl = Acl::new();
        let mut parents: Vec<Vec<String>> = vec![Vec::new(); size];
        for (child, parent) in edges {
            parents[child % size].push(format!("n{}", parent % size));
        }
        let nodes: Vec<Arc<Role>> = parents
            .into_iter()
            .enumerate()
            .map(|(idx, p)| acl.create_role(format!("n{}", idx), p).unwrap())
            .collect();

        for a in &nodes {
            prop_assert_eq!(a.is_offspring_of(a, &acl, None).unwrap(), None);
            for b in &nodes {
                if let Some(distance) = a.is_offspring_of(b, &acl, None).unwrap() {
                    prop_assert!(distance >= 1 && distance as usize <= size);
                }
            }
        }
    }

    #[test]
    fn test_policy_names_parse_in_any_case(
        name in prop::sample::select(vec!["ALLOW", "DENY", "INHERIT", "NOINHERIT"]),
        lower in prop::collection::vec(any::<bool>(), 9),
        pad in " {0,3}",
    ) {
        let mixed: String = name
            .chars()
            .zip(lower.iter().cycle())
            .map(|(c, lower)| if *lower { c.to_ascii_lowercase() } else { c })
            .collect();
        let input = format!("{pad}{mixed}{pad}");

        let parsed = Policy::parse(&input, false).unwrap();
        prop_assert_eq!(parsed.as_str(), name);
        prop_assert_eq!(Policy::parse(&input, true).is_ok(), parsed.is_decisive());
    }

    #[test]
    fn test_closest_rule_then_preferred_policy(
        len in 1usize..8,
        rules in prop::collection::vec((0usize..8, decisive_policy()), 1..10),
        preferred in decisive_policy(),
    ) {
        let (acl, store) = acl_with_rules();
        acl.set_preferred_policy(preferred).unwrap();
        let chain = role_chain(&acl, len);
        let user = acl.create_role("user", [&chain[0]]).unwrap();
        let doc = acl.create_entity("doc", NO_PARENTS).unwrap();

        let rules: Vec<(usize, Policy)> = rules.into_iter().map(|(idx, p)| (idx % len, p)).collect();
        for (idx, policy) in &rules {
            store.add_rule(Rule::new(&acl, "doc", format!("r{}", idx), READ, *policy).unwrap());
        }

        // Lowest index is the closest ancestor of the user
        let closest = rules.iter().map(|(idx, _)| *idx).min().unwrap();
        let candidates: Vec<Policy> = rules
            .iter()
            .filter(|(idx, _)| *idx == closest)
            .map(|(_, p)| *p)
            .collect();
        let expected = if candidates.contains(&preferred) {
            preferred
        } else {
            candidates[0]
        };

        prop_assert_eq!(doc.get_policy(&acl, &user, READ, None).unwrap(), expected);
    }

    #[test]
    fn test_exact_rule_wins_anywhere(
        len in 1usize..6,
        ancestors in prop::collection::vec((0usize..6, decisive_policy()), 0..8),
        position in 0usize..9,
        exact in decisive_policy(),
    ) {
        let (acl, store) = acl_with_rules();
        let chain = role_chain(&acl, len);
        let user = acl.create_role("user", [&chain[0]]).unwrap();
        let doc = acl.create_entity("doc", NO_PARENTS).unwrap();

        let mut rules: Vec<Rule> = ancestors
            .iter()
            .map(|(idx, p)| Rule::new(&acl, "doc", format!("r{}", idx % len), READ, *p).unwrap())
            .collect();
        let position = position.min(rules.len());
        rules.insert(position, Rule::new(&acl, "doc", "user", READ, exact).unwrap());
        store.set_rules("doc", rules);

        prop_assert_eq!(doc.get_policy(&acl, &user, READ, None).unwrap(), exact);
    }

    #[test]
    fn test_is_allowed_matches_finalized_policy(
        grant in prop::option::of(decisive_policy()),
        default in decisive_policy(),
    ) {
        let (acl, store) = acl_with_rules();
        acl.set_default_policy(default).unwrap();
        let user = acl.create_role("user", NO_PARENTS).unwrap();
        let doc = acl.create_entity("doc", NO_PARENTS).unwrap();
        if let Some(policy) = grant {
            store.add_rule(Rule::new(&acl, "doc", "user", READ, policy).unwrap());
        }

        let policy = doc.get_policy(&acl, &user, READ, None).unwrap();
        prop_assert!(matches!(policy, Policy::Allow | Policy::Deny | Policy::Undefined));
        prop_assert_eq!(
            doc.is_allowed(&acl, &user, READ, None).unwrap(),
            acl.settings().finalize(policy) == Policy::Allow
        );
        prop_assert_eq!(policy == Policy::Undefined, grant.is_none());
    }

    #[test]
    fn test_external_id_display_parses_back(
        kind in "[A-Za-z_]{1,12}",
        key in prop::collection::vec("[a-z0-9]{1,6}", 1..4),
    ) {
        let id = ExternalId::new(kind.clone(), key.clone()).unwrap();
        let parsed = ExternalId::parse(&id.to_string()).unwrap();
        prop_assert_eq!(parsed.kind(), kind.as_str());
        prop_assert_eq!(parsed.key(), key.as_slice());
    }
}
