//! Abstract command surface consumed by a transport collaborator.
//!
//! The transport (a chat platform, a CLI, an HTTP shim) parses user input
//! into a [`Command`], attaches a [`Caller`], and renders the resulting
//! [`Reply`] however it likes. The core never formats platform-specific
//! content and never delivers messages itself: a broadcast, for instance,
//! comes back as a recipient list for the transport to fan out.
//!
//! Caller authority is established by the platform (its own permission
//! system decides who is an admin); the core only enforces the flag, and it
//! does so before touching any state.

use crate::manager::{KeyManager, ResetOutcome, SystemInfo, UserSnapshot};
use crate::stats::AggregateStats;
use crate::KeygateError;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Who is invoking a command.
#[derive(Debug, Clone)]
pub struct Caller {
    /// Platform user identifier.
    pub user_id: String,

    /// Display name, if the platform knows one.
    pub username: Option<String>,

    /// Whether the platform granted this caller administrative authority.
    pub is_admin: bool,
}

impl Caller {
    /// A regular, unprivileged caller.
    pub fn user(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            username: None,
            is_admin: false,
        }
    }

    /// An administrative caller.
    pub fn admin(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            username: None,
            is_admin: true,
        }
    }
}

/// Commands the transport can issue.
#[derive(Debug, Clone)]
pub enum Command {
    /// Request a checkpoint link for the given HWID.
    RequestKey {
        /// Hardware identifier from the user's script.
        hwid: String,
    },

    /// Validate a provider-issued key.
    ValidateKey {
        /// The key to validate.
        key: String,
        /// HWID, required in permissive deployments, optional in strict ones.
        hwid: Option<String>,
    },

    /// The caller's own binding and key status.
    MyStatus,

    /// Static description of the key system.
    SystemInfo,

    /// Aggregate usage statistics. Privileged.
    Stats,

    /// Delete a user's data. Privileged.
    ResetUser {
        /// User to reset.
        target: String,
    },

    /// Announce a message to every known user. Privileged.
    Broadcast {
        /// Message to deliver.
        message: String,
    },
}

impl Command {
    /// Command name, used in permission errors and logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::RequestKey { .. } => "request-key",
            Self::ValidateKey { .. } => "validate-key",
            Self::MyStatus => "get-my-status",
            Self::SystemInfo => "get-system-info",
            Self::Stats => "get-stats",
            Self::ResetUser { .. } => "reset-user",
            Self::Broadcast { .. } => "broadcast",
        }
    }

    /// Whether the command requires administrative authority.
    pub fn is_privileged(&self) -> bool {
        matches!(
            self,
            Self::Stats | Self::ResetUser { .. } | Self::Broadcast { .. }
        )
    }
}

/// Structured command results for the transport to render.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Reply {
    /// A checkpoint link was issued.
    KeyIssued {
        /// Link the user must complete.
        link: String,
        /// The HWID that was bound.
        hwid: String,
        /// How many times this user has requested a key.
        request_count: u64,
        /// When this request was recorded.
        requested_at: DateTime<Utc>,
        /// How long a validated key will stay active, in hours.
        validity_hours: i64,
    },

    /// A key passed remote validation and was recorded.
    KeyAccepted {
        /// The validated key.
        key: String,
        /// HWID it was validated against.
        hwid: String,
        /// When the key stops being active.
        expires_at: DateTime<Utc>,
        /// Provider message.
        message: String,
    },

    /// The caller's stored data.
    Status(UserSnapshot),

    /// Deployment description.
    Info(SystemInfo),

    /// Aggregate statistics.
    Stats(AggregateStats),

    /// A user's data was deleted.
    UserReset {
        /// The user that was reset.
        target: String,
        /// What was actually removed.
        outcome: ResetOutcome,
    },

    /// Broadcast plan: the transport delivers `message` to `recipients`.
    Broadcast {
        /// Every known user id.
        recipients: Vec<String>,
        /// Message to deliver.
        message: String,
    },
}

/// Execute a command on behalf of a caller.
///
/// Privileged commands from unprivileged callers fail with
/// `PermissionDenied` before any state is read or written.
pub fn dispatch(
    manager: &KeyManager,
    caller: &Caller,
    command: Command,
) -> Result<Reply, KeygateError> {
    if command.is_privileged() && !caller.is_admin {
        return Err(KeygateError::PermissionDenied {
            command: command.name().to_string(),
        });
    }

    match command {
        Command::RequestKey { hwid } => {
            let request =
                manager.request_key(&caller.user_id, caller.username.as_deref(), &hwid)?;
            Ok(Reply::KeyIssued {
                link: request.link.to_string(),
                hwid: request.binding.hwid,
                request_count: request.binding.request_count,
                requested_at: request.binding.last_request_at,
                validity_hours: manager.config().key_validity_hours,
            })
        }
        Command::ValidateKey { key, hwid } => {
            let validation = manager.validate_key(&caller.user_id, &key, hwid.as_deref())?;
            Ok(Reply::KeyAccepted {
                key: validation.record.key,
                hwid: validation.record.hwid,
                expires_at: validation.record.expires_at,
                message: validation.message,
            })
        }
        Command::MyStatus => Ok(Reply::Status(manager.user_snapshot(&caller.user_id))),
        Command::SystemInfo => Ok(Reply::Info(manager.system_info())),
        Command::Stats => Ok(Reply::Stats(manager.stats())),
        Command::ResetUser { target } => {
            let outcome = manager.reset_user(&target)?;
            Ok(Reply::UserReset { target, outcome })
        }
        Command::Broadcast { message } => Ok(Reply::Broadcast {
            recipients: manager.known_users(),
            message,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::MockClock;
    use crate::config::{HwidPolicy, KeygateConfig};
    use crate::provider::{KeyProvider, ProviderVerdict};
    use serde_json::json;
    use std::sync::Arc;
    use tempfile::TempDir;
    use url::Url;

    /// Provider that accepts everything; command routing is under test here,
    /// not validation outcomes.
    struct AcceptAllProvider;

    impl KeyProvider for AcceptAllProvider {
        fn checkpoint_link(&self, hwid: &str) -> Url {
            Url::parse_with_params("https://cp.example.com/start", &[("hwid", hwid)]).unwrap()
        }

        fn validate_key(&self, _key: &str, _hwid: &str) -> Result<ProviderVerdict, KeygateError> {
            Ok(ProviderVerdict {
                valid: true,
                message: "ok".to_string(),
                raw: json!({"valid": true}),
            })
        }
    }

    fn manager_in(dir: &TempDir) -> KeyManager {
        let config = KeygateConfig {
            checkpoint_url: "https://cp.example.com/start".to_string(),
            validation_url: "https://cp.example.com/api/validate".to_string(),
            api_key: "test-api-key".to_string(),
            zone: None,
            user_agent: "keygate-test".to_string(),
            request_timeout_secs: 15,
            key_validity_hours: 24,
            min_hwid_len: 5,
            hwid_policy: HwidPolicy::Permissive,
            store_path: Some(dir.path().join("store.json")),
        };
        let clock = Arc::new(MockClock::from_rfc3339("2025-06-01T08:00:00Z"));
        KeyManager::new_with_parts(config, clock, Arc::new(AcceptAllProvider)).unwrap()
    }

    #[test]
    fn test_privileged_commands_rejected_for_regular_callers() {
        let dir = TempDir::new().unwrap();
        let manager = manager_in(&dir);
        let caller = Caller::user("u1");

        for command in [
            Command::Stats,
            Command::ResetUser {
                target: "u2".to_string(),
            },
            Command::Broadcast {
                message: "hi".to_string(),
            },
        ] {
            let name = command.name();
            let result = dispatch(&manager, &caller, command);
            assert!(
                matches!(result, Err(KeygateError::PermissionDenied { command }) if command == name)
            );
        }
    }

    #[test]
    fn test_denied_reset_touches_no_state() {
        let dir = TempDir::new().unwrap();
        let manager = manager_in(&dir);
        dispatch(
            &manager,
            &Caller::user("u2"),
            Command::RequestKey {
                hwid: "ABCDE12345".to_string(),
            },
        )
        .unwrap();

        let result = dispatch(
            &manager,
            &Caller::user("u1"),
            Command::ResetUser {
                target: "u2".to_string(),
            },
        );
        assert!(matches!(result, Err(KeygateError::PermissionDenied { .. })));
        assert!(manager.user_snapshot("u2").has_data());
    }

    #[test]
    fn test_request_key_reply_shape() {
        let dir = TempDir::new().unwrap();
        let manager = manager_in(&dir);
        let mut caller = Caller::user("u1");
        caller.username = Some("alice".to_string());

        let reply = dispatch(
            &manager,
            &caller,
            Command::RequestKey {
                hwid: "ABCDE12345".to_string(),
            },
        )
        .unwrap();

        match reply {
            Reply::KeyIssued {
                link,
                hwid,
                request_count,
                validity_hours,
                ..
            } => {
                assert!(link.contains("hwid=ABCDE12345"));
                assert_eq!(hwid, "ABCDE12345");
                assert_eq!(request_count, 1);
                assert_eq!(validity_hours, 24);
            }
            other => panic!("expected KeyIssued, got {:?}", other),
        }
    }

    #[test]
    fn test_validate_then_status_roundtrip() {
        let dir = TempDir::new().unwrap();
        let manager = manager_in(&dir);
        let caller = Caller::user("u1");

        dispatch(
            &manager,
            &caller,
            Command::ValidateKey {
                key: "KEY-ABC".to_string(),
                hwid: Some("ABCDE12345".to_string()),
            },
        )
        .unwrap();

        let reply = dispatch(&manager, &caller, Command::MyStatus).unwrap();
        match reply {
            Reply::Status(snapshot) => {
                assert_eq!(snapshot.key.unwrap().key, "KEY-ABC");
                assert_eq!(snapshot.key_expired, Some(false));
            }
            other => panic!("expected Status, got {:?}", other),
        }
    }

    #[test]
    fn test_admin_stats_and_reset() {
        let dir = TempDir::new().unwrap();
        let manager = manager_in(&dir);
        dispatch(
            &manager,
            &Caller::user("u1"),
            Command::RequestKey {
                hwid: "ABCDE12345".to_string(),
            },
        )
        .unwrap();

        let admin = Caller::admin("boss");
        match dispatch(&manager, &admin, Command::Stats).unwrap() {
            Reply::Stats(stats) => assert_eq!(stats.total_users, 1),
            other => panic!("expected Stats, got {:?}", other),
        }

        match dispatch(
            &manager,
            &admin,
            Command::ResetUser {
                target: "u1".to_string(),
            },
        )
        .unwrap()
        {
            Reply::UserReset { target, outcome } => {
                assert_eq!(target, "u1");
                assert!(outcome.removed_binding);
                assert!(!outcome.removed_key);
            }
            other => panic!("expected UserReset, got {:?}", other),
        }
    }

    #[test]
    fn test_broadcast_returns_plan_not_delivery() {
        let dir = TempDir::new().unwrap();
        let manager = manager_in(&dir);
        for (user, hwid) in [("u1", "ABCDE12345"), ("u2", "FGHIJ67890")] {
            dispatch(
                &manager,
                &Caller::user(user),
                Command::RequestKey {
                    hwid: hwid.to_string(),
                },
            )
            .unwrap();
        }

        let reply = dispatch(
            &manager,
            &Caller::admin("boss"),
            Command::Broadcast {
                message: "maintenance at noon".to_string(),
            },
        )
        .unwrap();

        match reply {
            Reply::Broadcast {
                mut recipients,
                message,
            } => {
                recipients.sort();
                assert_eq!(recipients, vec!["u1".to_string(), "u2".to_string()]);
                assert_eq!(message, "maintenance at noon");
            }
            other => panic!("expected Broadcast, got {:?}", other),
        }
    }

    #[test]
    fn test_system_info_is_unprivileged() {
        let dir = TempDir::new().unwrap();
        let manager = manager_in(&dir);
        let reply = dispatch(&manager, &Caller::user("u1"), Command::SystemInfo).unwrap();
        match reply {
            Reply::Info(info) => assert_eq!(info.key_validity_hours, 24),
            other => panic!("expected Info, got {:?}", other),
        }
    }
}
