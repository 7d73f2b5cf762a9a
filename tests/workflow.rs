//! End-to-end workflow over the public API, entirely offline.
//!
//! Link issuance, snapshots, stats, resets and the command surface never
//! touch the network; remote validation outcomes are covered by unit tests
//! against the provider seam.

use keygate::{dispatch, Caller, Command, KeyManager, KeygateConfig, Reply};
use tempfile::TempDir;

fn config_in(dir: &TempDir) -> KeygateConfig {
    let json = format!(
        r#"{{
            "checkpoint_url": "https://checkpoint.example.com/cp/start",
            "validation_url": "https://checkpoint.example.com/api/validate",
            "api_key": "integration-test-key",
            "zone": "Asia/Jakarta",
            "store_path": {}
        }}"#,
        serde_json::to_string(&dir.path().join("store.json")).unwrap()
    );
    serde_json::from_str(&json).unwrap()
}

#[test]
fn request_flow_persists_across_restarts() {
    let dir = TempDir::new().unwrap();

    {
        let manager = KeyManager::new(config_in(&dir)).unwrap();
        let request = manager
            .request_key("1234", Some("alice"), "ABCDE12345")
            .unwrap();
        assert_eq!(request.binding.request_count, 1);
        assert!(request.link.as_str().contains("hwid=ABCDE12345"));
        assert!(request.link.as_str().contains("zone=Asia%2FJakarta"));
    }

    // A fresh manager over the same store sees the binding.
    let manager = KeyManager::new(config_in(&dir)).unwrap();
    let snapshot = manager.user_snapshot("1234");
    assert!(snapshot.has_data());
    assert_eq!(snapshot.binding.as_ref().unwrap().hwid, "ABCDE12345");
    assert_eq!(snapshot.binding.as_ref().unwrap().request_count, 1);

    let request = manager
        .request_key("1234", Some("alice"), "ABCDE12345")
        .unwrap();
    assert_eq!(request.binding.request_count, 2);
}

#[test]
fn short_hwid_is_rejected_and_nothing_is_stored() {
    let dir = TempDir::new().unwrap();
    let manager = KeyManager::new(config_in(&dir)).unwrap();

    let result = manager.request_key("1234", None, "AB12");
    assert!(result.is_err());
    assert_eq!(result.unwrap_err().reason_code(), "hwid_too_short");
    assert!(!manager.user_snapshot("1234").has_data());
    assert_eq!(manager.stats().total_users, 0);
}

#[test]
fn command_surface_end_to_end() {
    let dir = TempDir::new().unwrap();
    let manager = KeyManager::new(config_in(&dir)).unwrap();

    let reply = dispatch(
        &manager,
        &Caller::user("1234"),
        Command::RequestKey {
            hwid: "ABCDE12345".to_string(),
        },
    )
    .unwrap();
    assert!(matches!(reply, Reply::KeyIssued { .. }));

    // Regular callers cannot see stats...
    let denied = dispatch(&manager, &Caller::user("1234"), Command::Stats);
    assert_eq!(denied.unwrap_err().reason_code(), "permission_denied");

    // ...admins can.
    match dispatch(&manager, &Caller::admin("boss"), Command::Stats).unwrap() {
        Reply::Stats(stats) => {
            assert_eq!(stats.total_users, 1);
            assert_eq!(stats.total_keys, 0);
        }
        other => panic!("expected Stats, got {:?}", other),
    }

    // Reset wipes the user and the store reflects it immediately.
    dispatch(
        &manager,
        &Caller::admin("boss"),
        Command::ResetUser {
            target: "1234".to_string(),
        },
    )
    .unwrap();
    assert!(!manager.user_snapshot("1234").has_data());
}

#[test]
fn replies_serialize_for_transports() {
    let dir = TempDir::new().unwrap();
    let manager = KeyManager::new(config_in(&dir)).unwrap();

    let reply = dispatch(
        &manager,
        &Caller::user("1234"),
        Command::RequestKey {
            hwid: "ABCDE12345".to_string(),
        },
    )
    .unwrap();

    let json = serde_json::to_value(&reply).unwrap();
    assert_eq!(json["kind"], "key_issued");
    assert_eq!(json["request_count"], 1);
}
