//! In-memory settings store contract tests.

use mergeguard::policy::PolicyMap;
use mergeguard::settings::{MemorySettingsStore, SettingsKey, SettingsRecord, SettingsStore};

fn policy_of(repo: &str, branches: &[&str]) -> PolicyMap {
    let mut map = PolicyMap::new();
    map.insert(
        repo.to_owned(),
        branches.iter().map(|b| (*b).to_owned()).collect(),
    );
    map
}

#[tokio::test]
async fn get_returns_only_requested_keys() {
    let store = MemorySettingsStore::with_record(SettingsRecord {
        credential_email: Some("dev@example.com".to_owned()),
        credential_token: Some("secret".to_owned()),
        policy_map: Some(policy_of("teamx/svc", &["main"])),
    });

    let record = store
        .get(&[SettingsKey::CredentialEmail])
        .await
        .expect("get");
    assert_eq!(record.credential_email.as_deref(), Some("dev@example.com"));
    assert_eq!(record.credential_token, None);
    assert_eq!(record.policy_map, None);
}

#[tokio::test]
async fn unset_keys_are_absent_not_errors() {
    let store = MemorySettingsStore::new();
    let record = store
        .get(&[
            SettingsKey::CredentialEmail,
            SettingsKey::CredentialToken,
            SettingsKey::PolicyMap,
        ])
        .await
        .expect("get");
    assert_eq!(record, SettingsRecord::default());
}

#[tokio::test]
async fn set_merges_instead_of_replacing() {
    let store = MemorySettingsStore::new();
    store
        .set(SettingsRecord {
            credential_email: Some("dev@example.com".to_owned()),
            ..SettingsRecord::default()
        })
        .await
        .expect("set email");
    store
        .set(SettingsRecord {
            policy_map: Some(policy_of("teamx/svc", &["main"])),
            ..SettingsRecord::default()
        })
        .await
        .expect("set policy");

    let record = store
        .get(&[SettingsKey::CredentialEmail, SettingsKey::PolicyMap])
        .await
        .expect("get");
    assert_eq!(record.credential_email.as_deref(), Some("dev@example.com"));
    assert!(record.policy_map.is_some());
}

#[tokio::test]
async fn later_set_overwrites_the_same_key() {
    let store = MemorySettingsStore::new();
    store
        .set(SettingsRecord {
            policy_map: Some(policy_of("teamx/svc", &["main"])),
            ..SettingsRecord::default()
        })
        .await
        .expect("set");
    store
        .set(SettingsRecord {
            policy_map: Some(policy_of("teamx/svc", &["release"])),
            ..SettingsRecord::default()
        })
        .await
        .expect("set again");

    let record = store.get(&[SettingsKey::PolicyMap]).await.expect("get");
    let map = record.policy_map.expect("policy map");
    assert_eq!(
        map.get("teamx/svc").expect("entry"),
        &vec!["release".to_owned()]
    );
}

#[test]
fn record_serializes_with_camel_case_keys() {
    let record = SettingsRecord {
        credential_email: Some("dev@example.com".to_owned()),
        credential_token: None,
        policy_map: Some(policy_of("teamx/svc", &["main"])),
    };
    let json = serde_json::to_value(&record).expect("serialize");
    assert_eq!(json["credentialEmail"], "dev@example.com");
    assert_eq!(json["policyMap"]["teamx/svc"][0], "main");
    // Unset keys are omitted entirely, matching a partial KV record.
    assert!(json.get("credentialToken").is_none());
}
