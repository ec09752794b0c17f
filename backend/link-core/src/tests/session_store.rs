// Unit tests for the persisted credential bundle

use crate::session_store::{CredentialDelta, SessionStore, merge_patch};

use std::fs;

use serde_json::json;
use tempfile::TempDir;

fn store_in(dir: &TempDir) -> SessionStore {
    SessionStore::new(dir.path().join("auth"))
}

#[tokio::test]
async fn given_missing_directory_when_checked_then_no_session() {
    let dir = TempDir::new().unwrap();

    assert!(!store_in(&dir).has_session().await);
}

#[tokio::test]
async fn given_bundle_with_identity_when_checked_then_session_exists() {
    let dir = TempDir::new().unwrap();
    let store = store_in(&dir);
    store
        .apply_update(&CredentialDelta(json!({"me": {"id": "123@s.example"}, "keys": {"a": 1}})))
        .await
        .unwrap();

    assert!(store.has_session().await);
    assert!(store.path().exists());
}

/// **VALUE**: Every flavor of half-valid bundle counts as "no session" and is
/// wiped.
///
/// **WHY THIS MATTERS**: Reusing a corrupt bundle produces a confusing protocol
/// failure instead of a clean re-authentication.
///
/// **BUG THIS CATCHES**: Returning false without clearing, leaving the corrupt
/// file to trip the next start.
#[tokio::test]
async fn given_invalid_bundles_when_checked_then_no_session_and_directory_cleared() {
    let bundles = [
        "{not json",
        r#"{"keys": {"a": 1}}"#,
        r#"{"me": {"id": ""}}"#,
        r#"{"me": null}"#,
    ];

    for contents in bundles {
        // GIVEN
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        store.ensure_directory().await.unwrap();
        fs::write(store.credentials_path(), contents).unwrap();
        fs::write(store.path().join("pre-key-1.json"), "{}").unwrap();

        // WHEN
        let found = store.has_session().await;

        // THEN
        assert!(!found, "bundle {contents:?} must not count as a session");
        assert!(!store.path().exists(), "bundle {contents:?} must be cleared");
    }
}

#[tokio::test]
async fn given_empty_directory_when_checked_then_no_session_and_cleared() {
    let dir = TempDir::new().unwrap();
    let store = store_in(&dir);
    store.ensure_directory().await.unwrap();

    assert!(!store.has_session().await);
    assert!(!store.path().exists());
}

#[tokio::test]
async fn given_nested_entries_when_cleared_twice_then_idempotent() {
    let dir = TempDir::new().unwrap();
    let store = store_in(&dir);
    store.ensure_directory().await.unwrap();
    fs::create_dir_all(store.path().join("sessions/device")).unwrap();
    fs::write(store.path().join("sessions/device/state.json"), "{}").unwrap();

    store.clear().await.unwrap();
    store.clear().await.unwrap();

    assert!(!store.path().exists());
}

#[tokio::test]
async fn given_sequential_updates_when_applied_then_merged_in_order() {
    // GIVEN
    let dir = TempDir::new().unwrap();
    let store = store_in(&dir);

    // WHEN
    store
        .apply_update(&CredentialDelta(json!({"me": {"id": "1@s"}, "keys": {"a": 1, "b": 2}})))
        .await
        .unwrap();
    store
        .apply_update(&CredentialDelta(json!({"keys": {"a": null, "c": 3}})))
        .await
        .unwrap();

    // THEN
    let bundle = store.load_credentials().await.unwrap().unwrap();
    assert_eq!(bundle, json!({"me": {"id": "1@s"}, "keys": {"b": 2, "c": 3}}));
    assert!(!store.path().join("creds.json.tmp").exists());
}

#[tokio::test]
async fn given_non_object_update_when_applied_then_rejected() {
    let dir = TempDir::new().unwrap();
    let store = store_in(&dir);

    assert!(store.apply_update(&CredentialDelta(json!([1, 2]))).await.is_err());
    assert_eq!(store.load_credentials().await.unwrap(), None);
}

#[test]
fn given_scalar_target_when_patched_with_object_then_replaced_by_object() {
    let mut target = json!("old");

    merge_patch(&mut target, &json!({"a": {"b": 1}}));

    assert_eq!(target, json!({"a": {"b": 1}}));
}
