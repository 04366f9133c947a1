//! Policy map check and normalization tests.

use mergeguard::policy::{check_destination, normalize, PolicyMap};

fn map(entries: &[(&str, &[&str])]) -> PolicyMap {
    entries
        .iter()
        .map(|(k, v)| ((*k).to_owned(), v.iter().map(|b| (*b).to_owned()).collect()))
        .collect()
}

#[test]
fn destination_in_list_is_allowed() {
    let policy = map(&[("teamx/svc", &["main", "release"])]);
    let check = check_destination(&policy, "teamx/svc", "main");
    assert!(check.allowed);
    assert!(!check.no_rules);
    assert_eq!(check.allowed_destinations, vec!["main", "release"]);
}

#[test]
fn destination_outside_list_is_denied() {
    let policy = map(&[("teamx/svc", &["main", "release"])]);
    let check = check_destination(&policy, "teamx/svc", "feature/x");
    assert!(!check.allowed);
    assert!(!check.no_rules);
}

#[test]
fn missing_entry_means_no_rules_and_allowed() {
    let check = check_destination(&PolicyMap::new(), "teamx/svc", "anything");
    assert!(check.allowed);
    assert!(check.no_rules);
    assert!(check.allowed_destinations.is_empty());
}

#[test]
fn empty_entry_behaves_like_no_rules() {
    let policy = map(&[("teamx/svc", &[])]);
    let check = check_destination(&policy, "teamx/svc", "main");
    assert!(check.allowed);
    assert!(check.no_rules);
}

#[test]
fn other_repositories_do_not_leak_rules() {
    let policy = map(&[("teamx/other", &["main"])]);
    let check = check_destination(&policy, "teamx/svc", "main");
    assert!(check.no_rules);
}

#[test]
fn branch_match_is_exact() {
    let policy = map(&[("teamx/svc", &["main"])]);
    assert!(!check_destination(&policy, "teamx/svc", "Main").allowed);
    assert!(!check_destination(&policy, "teamx/svc", "main ").allowed);
}

#[test]
fn normalize_trims_and_deduplicates_preserving_order() {
    let policy = map(&[("teamx/svc", &["release", " main ", "main", "release"])]);
    let normalized = normalize(policy);
    assert_eq!(
        normalized.get("teamx/svc").expect("entry kept"),
        &vec!["release".to_owned(), "main".to_owned()]
    );
}

#[test]
fn normalize_drops_entries_that_end_up_empty() {
    let policy = map(&[("teamx/svc", &["  ", ""]), ("teamx/keep", &["main"])]);
    let normalized = normalize(policy);
    assert!(!normalized.contains_key("teamx/svc"));
    assert!(normalized.contains_key("teamx/keep"));
}
