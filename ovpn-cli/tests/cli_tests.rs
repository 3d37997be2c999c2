use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use assert_cmd::prelude::*;
use predicates::prelude::*;
use predicates::str::contains;
use tempfile::TempDir;

use ovpn_core::{config, paths, Directory, YamlDirectory};

fn ovpnadm(home: &Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("ovpnadm"));
    cmd.env("HOME", home)
        .env("USERPROFILE", home)
        .env("NO_COLOR", "1");
    cmd
}

/// Tagged status file with `connected` fresh and `stale` last seen an hour ago.
fn write_status_log(home: &Path, connected: &[&str], stale: &[&str]) -> PathBuf {
    let now = chrono::Utc::now().timestamp();
    let mut text = format!("TITLE,OpenVPN 2.6.8\nTIME,x,{now}\n");
    text.push_str("HEADER,CLIENT_LIST,Common Name,Real Address,Virtual Address,Virtual IPv6 Address,Bytes Received,Bytes Sent,Connected Since,Connected Since (time_t),Username,Client ID,Peer ID,Data Channel Cipher\n");
    for (i, name) in connected.iter().chain(stale.iter()).enumerate() {
        text.push_str(&format!(
            "CLIENT_LIST,{name},203.0.113.{i}:51234,10.8.0.{i},,1024,2048,x,{since},UNDEF,{i},0,AES-256-GCM\n",
            since = now - 120
        ));
    }
    text.push_str("HEADER,ROUTING_TABLE,Virtual Address,Common Name,Real Address,Last Ref,Last Ref (time_t)\n");
    for (i, name) in connected.iter().enumerate() {
        text.push_str(&format!(
            "ROUTING_TABLE,10.8.0.{i},{name},203.0.113.{i}:51234,x,{now}\n"
        ));
    }
    for (j, name) in stale.iter().enumerate() {
        let i = connected.len() + j;
        text.push_str(&format!(
            "ROUTING_TABLE,10.8.0.{i},{name},203.0.113.{i}:51234,x,{}\n",
            now - 3600
        ));
    }
    text.push_str("END\n");

    let path = home.join("openvpn-status.log");
    fs::write(&path, text).expect("write status log");
    path
}

fn init_with_log(home: &Path, log: &Path) {
    ovpnadm(home)
        .args(["init", "--status-log"])
        .arg(log)
        .assert()
        .success();
}

fn seed_users(home: &Path, names: &[&str]) {
    let directory = YamlDirectory::open_at(home);
    for name in names {
        directory.add_user(name).expect("seed user");
    }
}

#[test]
fn init_writes_config_and_refuses_to_clobber() {
    let home = TempDir::new().expect("home");

    ovpnadm(home.path())
        .args(["init", "--status-log", "/srv/status.log", "--poll-interval", "15"])
        .assert()
        .success()
        .stdout(contains("config.yaml"));

    let saved = config::load_at(home.path()).expect("load config");
    assert_eq!(saved.status_log, PathBuf::from("/srv/status.log"));
    assert_eq!(saved.poll_interval_secs, 15);
    assert_eq!(saved.cycle_timeout_secs, 30);

    ovpnadm(home.path())
        .arg("init")
        .assert()
        .failure()
        .stderr(contains("--force"));

    ovpnadm(home.path())
        .args(["init", "--force", "--prefix", "vpn-"])
        .assert()
        .success();
    let saved = config::load_at(home.path()).expect("reload config");
    assert_eq!(saved.common_name_prefix.as_deref(), Some("vpn-"));
    assert_eq!(saved.poll_interval_secs, 10);
}

#[test]
fn init_rejects_zero_poll_interval() {
    let home = TempDir::new().expect("home");
    ovpnadm(home.path())
        .args(["init", "--poll-interval", "0"])
        .assert()
        .failure()
        .stderr(contains("poll_interval_secs"));
    assert!(!paths::config_path_at(home.path()).exists());
}

#[test]
fn clients_lists_only_online_by_default() {
    let home = TempDir::new().expect("home");
    let log = write_status_log(home.path(), &["alice"], &["bob"]);

    ovpnadm(home.path())
        .arg("clients")
        .arg("--status-log")
        .arg(&log)
        .assert()
        .success()
        .stdout(contains("alice"))
        .stdout(contains("1.0K"))
        .stdout(contains("1 online / 2 listed"))
        .stdout(contains("bob").not());

    ovpnadm(home.path())
        .args(["clients", "--all"])
        .arg("--status-log")
        .arg(&log)
        .assert()
        .success()
        .stdout(contains("bob"))
        .stdout(contains("stale"));
}

#[test]
fn clients_json_is_sorted_and_complete() {
    let home = TempDir::new().expect("home");
    let log = write_status_log(home.path(), &["carol", "alice"], &[]);
    init_with_log(home.path(), &log);

    let output = ovpnadm(home.path())
        .args(["clients", "--json"])
        .output()
        .expect("run clients");
    assert!(output.status.success());
    let clients: serde_json::Value = serde_json::from_slice(&output.stdout).expect("json");
    let clients = clients.as_array().expect("array");
    assert_eq!(clients.len(), 2);
    assert_eq!(clients[0]["common_name"], "alice");
    assert_eq!(clients[1]["common_name"], "carol");
    assert_eq!(clients[0]["is_online"], true);
    assert_eq!(clients[0]["bytes_received"], 1024);
    assert!(clients[0]["online_duration_secs"].as_u64().expect("duration") >= 120);
}

#[test]
fn clients_on_missing_log_names_the_path() {
    let home = TempDir::new().expect("home");
    ovpnadm(home.path())
        .args(["clients", "--status-log", "/nonexistent/openvpn-status.log"])
        .assert()
        .failure()
        .stderr(contains("/nonexistent/openvpn-status.log"));
}

#[test]
fn sync_updates_directory_and_ledger() {
    let home = TempDir::new().expect("home");
    let log = write_status_log(home.path(), &["alice", "mallory"], &[]);
    init_with_log(home.path(), &log);
    seed_users(home.path(), &["alice", "bob"]);

    ovpnadm(home.path())
        .arg("sync")
        .assert()
        .success()
        .stdout(contains("+  alice"))
        .stdout(contains("?  mallory"));

    let directory = YamlDirectory::open_at(home.path());
    let alice = directory
        .find_user_by_name("alice")
        .expect("lookup")
        .expect("alice exists");
    assert!(alice.is_online);
    assert!(alice.last_connection_time.is_some());
    let open = directory
        .find_open_session(alice.id)
        .expect("lookup")
        .expect("open session");
    assert_eq!(open.traffic_usage, 1024 + 2048);
    assert!(!directory
        .find_user_by_name("bob")
        .expect("lookup")
        .expect("bob exists")
        .is_online);
}

#[test]
fn sync_twice_then_disconnect_finalizes() {
    let home = TempDir::new().expect("home");
    let log = write_status_log(home.path(), &["alice"], &[]);
    init_with_log(home.path(), &log);
    seed_users(home.path(), &["alice"]);

    ovpnadm(home.path()).arg("sync").assert().success();
    ovpnadm(home.path()).arg("sync").assert().success();

    write_status_log(home.path(), &[], &[]);
    let output = ovpnadm(home.path())
        .args(["sync", "--json"])
        .output()
        .expect("run sync");
    assert!(output.status.success());
    let summary: serde_json::Value = serde_json::from_slice(&output.stdout).expect("json");
    assert_eq!(summary["disconnected"], serde_json::json!(["alice"]));
    assert_eq!(summary["sessions_finalized"], 1);

    let directory = YamlDirectory::open_at(home.path());
    let alice = directory
        .find_user_by_name("alice")
        .expect("lookup")
        .expect("alice exists");
    let sessions = directory.list_sessions(alice.id).expect("sessions");
    assert_eq!(sessions.len(), 1, "repeat syncs must not open extra rows");
    assert!(!sessions[0].is_online);
    assert!(sessions[0].session_ended_at.is_some());
}

#[test]
fn users_and_sessions_reflect_sync() {
    let home = TempDir::new().expect("home");
    let log = write_status_log(home.path(), &["alice"], &[]);
    init_with_log(home.path(), &log);
    seed_users(home.path(), &["alice", "bob"]);
    ovpnadm(home.path()).arg("sync").assert().success();

    ovpnadm(home.path())
        .arg("users")
        .assert()
        .success()
        .stdout(contains("alice"))
        .stdout(contains("bob"));

    ovpnadm(home.path())
        .args(["users", "--online"])
        .assert()
        .success()
        .stdout(contains("alice"))
        .stdout(contains("bob").not());

    ovpnadm(home.path())
        .args(["sessions", "alice"])
        .assert()
        .success()
        .stdout(contains("open"))
        .stdout(contains("3.0K"));

    ovpnadm(home.path())
        .args(["sessions", "bob"])
        .assert()
        .success()
        .stdout(contains("No sessions recorded"));

    ovpnadm(home.path())
        .args(["sessions", "nobody"])
        .assert()
        .failure()
        .stderr(contains("no user named 'nobody'"));
}

#[test]
fn daemon_status_when_not_running() {
    let home = TempDir::new().expect("home");
    let output = ovpnadm(home.path())
        .args(["daemon", "status"])
        .output()
        .expect("run daemon status");
    assert!(output.status.success());
    let payload: serde_json::Value = serde_json::from_slice(&output.stdout).expect("json");
    assert_eq!(payload["running"], false);
    assert!(payload["socket"]
        .as_str()
        .expect("socket path")
        .ends_with("daemon.sock"));

    ovpnadm(home.path())
        .args(["daemon", "stop"])
        .assert()
        .success()
        .stdout(contains("not running"));

    ovpnadm(home.path())
        .args(["daemon", "sync"])
        .assert()
        .failure()
        .stderr(contains("daemon sync failed").and(contains("not running")));
}
