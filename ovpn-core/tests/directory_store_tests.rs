//! Directory store integration tests: error messages, atomic-write safety,
//! and parity between the YAML and in-memory backings.

use assert_fs::prelude::*;
use chrono::{TimeZone, Utc};
use ovpn_core::{
    Directory, DirectoryFile, MemoryDirectory, NewClientLog, StoreError, YamlDirectory,
};
use predicates::prelude::predicate;
use rstest::rstest;
use std::fs;

fn started() -> chrono::DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000, 0).single().expect("valid timestamp")
}

fn open_row(user_id: ovpn_core::UserId) -> NewClientLog {
    NewClientLog {
        user_id,
        online_duration_secs: 30,
        traffic_usage: 4096,
        session_started_at: started(),
        created_at: started(),
    }
}

// ---------------------------------------------------------------------------
// 1. Load error messages
// ---------------------------------------------------------------------------

#[test]
fn wrong_shape_yaml_returns_parse_error_with_path() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    home.child(".ovpnadm/directory.yaml")
        .write_str("- this is a list, not a mapping\n")
        .expect("write");

    let store = YamlDirectory::open_at(home.path());
    let err = store.find_online_users().unwrap_err();
    assert!(matches!(err, StoreError::Parse { .. }), "got: {err}");
    assert!(err.to_string().contains("directory.yaml"));
}

#[test]
fn saving_unknown_session_is_not_found() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    let store = YamlDirectory::open_at(home.path());
    let alice = store.add_user("alice").expect("add");
    let mut row = store.create_session(open_row(alice.id)).expect("create");
    row.id = ovpn_core::SessionId(404);

    let err = store.save_session(&row).unwrap_err();
    assert!(matches!(err, StoreError::SessionNotFound(_)), "got: {err}");
    assert!(err.to_string().contains("404"));
}

// ---------------------------------------------------------------------------
// 2. Atomic write safety
// ---------------------------------------------------------------------------

#[test]
fn mid_write_crash_leaves_original_intact() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    let store = YamlDirectory::open_at(home.path());
    store.add_user("alice").expect("add");

    let original_bytes = fs::read(store.path()).expect("read original");

    // Simulate crash: .tmp written but process died before rename
    let tmp = store.path().with_extension("yaml.tmp");
    fs::write(&tmp, b"CRASH - INCOMPLETE WRITE").expect("write crash tmp");

    let current_bytes = fs::read(store.path()).expect("read after crash");
    assert_eq!(original_bytes, current_bytes, "original must be unchanged after crash");
    assert_eq!(store.list_users().expect("list").len(), 1);
}

#[test]
fn first_write_creates_directory_file() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    let store = YamlDirectory::open_at(home.path());
    store.add_user("alice").expect("add");

    home.child(".ovpnadm/directory.yaml")
        .assert(predicate::path::exists());
    home.child(".ovpnadm/directory.yaml")
        .assert(predicate::str::contains("alice"));
}

// ---------------------------------------------------------------------------
// 3. Backing parity
// ---------------------------------------------------------------------------

fn yaml_backed(home: &assert_fs::TempDir) -> Box<dyn Directory> {
    let store = YamlDirectory::open_at(home.path());
    store.add_user("alice").expect("alice");
    store.add_user("bob").expect("bob");
    Box::new(store)
}

fn memory_backed(_home: &assert_fs::TempDir) -> Box<dyn Directory> {
    Box::new(MemoryDirectory::with_users(["alice", "bob"]).expect("seed"))
}

#[rstest]
#[case::yaml(yaml_backed as fn(&assert_fs::TempDir) -> Box<dyn Directory>)]
#[case::memory(memory_backed as fn(&assert_fs::TempDir) -> Box<dyn Directory>)]
fn open_then_finalize_lifecycle(#[case] make: fn(&assert_fs::TempDir) -> Box<dyn Directory>) {
    let home = assert_fs::TempDir::new().expect("tempdir");
    let store = make(&home);

    let mut alice = store.find_user_by_name("alice").unwrap().expect("alice");
    alice.is_online = true;
    alice.last_connection_time = Some(started());
    store.save_user(&alice).expect("save user");

    let mut row = store.create_session(open_row(alice.id)).expect("create");
    assert!(row.is_online);
    assert_eq!(store.find_open_session(alice.id).unwrap(), Some(row.clone()));

    row.is_online = false;
    row.session_ended_at = Some(started() + chrono::Duration::seconds(90));
    row.online_duration_secs = 90;
    store.save_session(&row).expect("finalize");

    assert!(store.find_open_session(alice.id).unwrap().is_none());
    let online: Vec<String> = store
        .find_online_users()
        .unwrap()
        .into_iter()
        .map(|u| u.name)
        .collect();
    assert_eq!(online, vec!["alice".to_string()]);
    assert_eq!(store.list_sessions(alice.id).unwrap().len(), 1);
}

#[test]
fn directory_file_yaml_roundtrip() {
    let mut file = DirectoryFile::default();
    let alice = file.add_user("alice").expect("alice");
    file.create_session(open_row(alice.id));

    let yaml = serde_yaml::to_string(&file).expect("serialize");
    let back: DirectoryFile = serde_yaml::from_str(&yaml).expect("deserialize");
    assert_eq!(back, file);
}
