//! Six end-to-end scenarios covering login, remote pull/push, conflicting
//! concurrent edits, key rotation, and disabling remote backup.

mod common;

use std::collections::BTreeMap;

use serde_json::json;
use wallet_core::{storage_fields, RemoteStatus, WalletError};
use wallet_testkit::InMemoryTransport;

use common::{new_container, new_container_with_seed, new_recording_container, Capture};

#[tokio::test]
async fn first_login_offline() {
    let container = new_container();
    let capture = Capture::new();
    container.subscribe(capture.clone(), None).unwrap();

    container.login("a@x", "alice", "pw", Some("chainA")).await.unwrap();

    let state = container.get_state().await.unwrap();
    assert_eq!(state["chain_id"], json!("chainA"));
    assert_eq!(state["created"], state["last_modified"]);
    assert_eq!(state["weak_password"], json!(false));
    assert!(!container.is_empty());

    let snapshot = capture.last();
    assert!(snapshot.unlocked);
    assert_eq!(snapshot.remote_status, None);
    assert!(snapshot.local_status.is_clean());
}

#[tokio::test]
async fn first_login_remote_no_token_remote_copy_false() {
    let container = new_container();
    let capture = Capture::new();
    container.subscribe(capture.clone(), None).unwrap();

    container.use_backup_server(Some("https://fake.wallet")).await.unwrap();
    container.login("a@x", "alice", "pw", Some("chainA")).await.unwrap();

    let state = container.get_state().await.unwrap();
    assert_eq!(state["chain_id"], json!("chainA"));
    assert!(!container.is_empty());
    assert_eq!(capture.last().remote_status, Some(RemoteStatus::NoContent));
}

#[tokio::test]
async fn first_login_remote_first_fetch_wallet_carries_no_local_hash() {
    // Branch 3 of `login` initializes the wallet in memory and opens the
    // first `fetch_wallet` subscription *before* anything is encrypted or
    // persisted, so that first call necessarily has nothing to hash yet.
    let (container, last_transport) = new_recording_container();
    container.use_backup_server(Some("https://fake.wallet")).await.unwrap();
    container.login("a@x", "alice", "pw", Some("chainA")).await.unwrap();

    let transport = last_transport.lock().unwrap().clone().unwrap();
    let hashes = transport.fetch_wallet_hashes();
    assert_eq!(hashes.len(), 1);
    assert_eq!(hashes[0], None);
}

#[tokio::test]
async fn use_backup_server_notifies_on_url_change() {
    let container = new_container();

    // Setting a remote URL for the first time writes `remote_url` and must
    // fire a notification, even though nothing about the wallet object
    // itself changed.
    let capture = Capture::new();
    container.subscribe(capture.clone(), None).unwrap();
    container.use_backup_server(Some("https://fake.wallet")).await.unwrap();
    capture.last(); // panics if no notification was dispatched

    // Pointing at a different URL (including back to none) is also a change
    // and must notify again.
    let capture2 = Capture::new();
    container.subscribe(capture2.clone(), None).unwrap();
    container.use_backup_server(None).await.unwrap();
    capture2.last();
}

#[tokio::test]
async fn delete_field_removes_path_and_notifies() {
    let container = new_container();
    container.login("a@x", "alice", "pw", Some("chainA")).await.unwrap();
    container
        .set_state(json!({"profile": {"nickname": "bob", "avatar": "x"}}))
        .await
        .unwrap();

    let before = container.get_state().await.unwrap();
    let last_modified_before = before["last_modified"].clone();

    let capture = Capture::new();
    container.subscribe(capture.clone(), None).unwrap();
    container.delete_field(&["profile", "nickname"]).await.unwrap();

    let after = container.get_state().await.unwrap();
    assert!(after["profile"].get("nickname").is_none());
    // Sibling fields are untouched by the deletion.
    assert_eq!(after["profile"]["avatar"], json!("x"));
    assert_ne!(after["last_modified"], last_modified_before);

    let snapshot = capture.last();
    assert!(snapshot.unlocked);
    assert!(snapshot.wallet_object["profile"].get("nickname").is_none());
}

#[tokio::test]
async fn delete_field_while_locked_fails() {
    let container = new_container();
    let result = container.delete_field(&["profile", "nickname"]).await;
    assert!(matches!(result, Err(WalletError::Locked)));
}

#[tokio::test]
async fn pull_overwrite_from_existing_remote() {
    let server = InMemoryTransport::new();

    // Container A is seeded with a single-use invite token, so its first
    // `login` creates the wallet on the shared server.
    let mut a_seed = BTreeMap::new();
    a_seed.insert(storage_fields::REMOTE_COPY.to_owned(), Some(json!(true)));
    a_seed.insert(storage_fields::REMOTE_TOKEN.to_owned(), Some(json!("tok-a")));
    server.issue_token("tok-a");

    let a = new_container_with_seed(&server, a_seed).await;
    a.use_backup_server(Some("https://fake.wallet")).await.unwrap();
    a.login("a@x", "alice", "pw", Some("chainA")).await.unwrap();
    a.set_state(json!({"k": 1})).await.unwrap();

    // Container B, same credentials, same server, starts from an empty
    // local store with just the intent to keep a remote copy.
    let mut b_seed = BTreeMap::new();
    b_seed.insert(storage_fields::REMOTE_COPY.to_owned(), Some(json!(true)));
    let b = new_container_with_seed(&server, b_seed).await;
    b.use_backup_server(Some("https://fake.wallet")).await.unwrap();
    b.login("a@x", "alice", "pw", Some("chainA")).await.unwrap();

    let state = b.get_state().await.unwrap();
    assert_eq!(state["k"], json!(1));
}

#[tokio::test]
async fn conflicting_concurrent_edit_is_rejected() {
    let server = InMemoryTransport::new();

    let mut a_seed = BTreeMap::new();
    a_seed.insert(storage_fields::REMOTE_COPY.to_owned(), Some(json!(true)));
    a_seed.insert(storage_fields::REMOTE_TOKEN.to_owned(), Some(json!("tok-a")));
    server.issue_token("tok-a");
    let a = new_container_with_seed(&server, a_seed).await;
    a.use_backup_server(Some("https://fake.wallet")).await.unwrap();
    a.login("a@x", "alice", "pw", Some("chainA")).await.unwrap();

    let mut b_seed = BTreeMap::new();
    b_seed.insert(storage_fields::REMOTE_COPY.to_owned(), Some(json!(true)));
    let b = new_container_with_seed(&server, b_seed).await;
    b.use_backup_server(Some("https://fake.wallet")).await.unwrap();
    b.login("a@x", "alice", "pw", Some("chainA")).await.unwrap();
    // B pulled A's wallet during login and is now holding remote_hash(1).
    // Re-open the transport so B drops its live push subscription — the
    // shared-credentials server keys subscribers by public key, so A and B
    // would otherwise collide on the same subscriber slot.
    b.use_backup_server(Some("https://fake.wallet")).await.unwrap();

    // A pushes first; the server now has a hash B never saw.
    a.set_state(json!({"k": "A"})).await.unwrap();

    // B, still holding the pre-A remote hash, tries to push its own edit.
    // The server's optimistic-concurrency check rejects the save.
    let capture = Capture::new();
    b.subscribe(capture.clone(), None).unwrap();
    let result = b.set_state(json!({"k": "B"})).await;
    assert!(matches!(
        result,
        Err(WalletError::TransportError { ref status_text, .. })
            if status_text == "Conflict"
    ));

    // B's local edit is applied and persisted even though the push failed.
    assert_eq!(capture.last().wallet_object["k"], json!("B"));
    assert_eq!(capture.last().remote_status, Some(RemoteStatus::Conflict));
}

#[tokio::test]
async fn change_password_with_remote_rotates_the_key() {
    let server = InMemoryTransport::new();
    let mut seed = BTreeMap::new();
    seed.insert(storage_fields::REMOTE_COPY.to_owned(), Some(json!(true)));
    seed.insert(storage_fields::REMOTE_TOKEN.to_owned(), Some(json!("tok")));
    server.issue_token("tok");

    let container = new_container_with_seed(&server, seed).await;
    container.use_backup_server(Some("https://fake.wallet")).await.unwrap();
    container.login("a@x", "alice", "pw", Some("chainA")).await.unwrap();
    container.set_state(json!({"k": 1})).await.unwrap();

    let before = container.get_state().await.unwrap();

    container.change_password("pw2", "a@x", "alice").await.unwrap();

    // The old password no longer unlocks an equivalent key; the new one does.
    assert!(!container.verify_password("a@x", "alice", "pw").await.unwrap());
    assert!(container.verify_password("a@x", "alice", "pw2").await.unwrap());

    let after = container.get_state().await.unwrap();
    assert_eq!(after["k"], before["k"]);
    assert_eq!(after["chain_id"], before["chain_id"]);
}

#[tokio::test]
async fn disabling_remote_copy_deletes_the_remote_wallet() {
    let server = InMemoryTransport::new();
    let mut seed = BTreeMap::new();
    seed.insert(storage_fields::REMOTE_TOKEN.to_owned(), Some(json!("tok")));
    server.issue_token("tok");

    let container = new_container_with_seed(&server, seed).await;
    container.use_backup_server(Some("https://fake.wallet")).await.unwrap();
    container.keep_remote_copy(true).await.unwrap();
    container.login("a@x", "alice", "pw", Some("chainA")).await.unwrap();
    container.set_state(json!({"k": 1})).await.unwrap();

    // Reconcile once more so `remote_status` settles to "Not Modified".
    let _ = container.get_state().await.unwrap();

    let capture = Capture::new();
    container.subscribe(capture.clone(), None).unwrap();
    container.keep_remote_copy(false).await.unwrap();

    // `delete_remote_wallet` clears the remote bookkeeping fields but not
    // `remote_status` itself.
    assert_eq!(capture.last().remote_status, Some(RemoteStatus::NotModified));
    // The local ciphertext is retained even though the remote copy is gone.
    assert!(!container.is_empty());
}
