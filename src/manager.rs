//! Key manager - the main public API for keygate.
//!
//! The `KeyManager` orchestrates the key lifecycle:
//! - Checkpoint link issuance with HWID binding
//! - Remote key validation with expiry bookkeeping
//! - Read-only status snapshots and administrative resets
//!
//! Remote provider calls never run while the store lock is held; the lock is
//! taken only for the read-modify-persist step once the remote outcome is
//! known. Concurrent validations for the same user therefore race harmlessly:
//! the last commit applied wins.

use crate::clock::{Clock, SystemClock};
use crate::config::{HwidPolicy, KeygateConfig};
use crate::provider::{CheckpointClient, KeyProvider};
use crate::stats::{compute_stats, AggregateStats};
use crate::store::document::{KeyRecord, UserBinding};
use crate::store::KeyStore;
use crate::KeygateError;
use serde::Serialize;
use std::sync::Arc;
use tracing::info;
use url::Url;

/// Outcome of a key request: the checkpoint link plus the refreshed binding.
#[derive(Debug, Clone)]
pub struct KeyRequest {
    /// Link the user must complete to obtain a key.
    pub link: Url,

    /// The user's binding after this request was recorded.
    pub binding: UserBinding,
}

/// Outcome of a successful key validation.
#[derive(Debug, Clone)]
pub struct KeyValidation {
    /// The key record as persisted.
    pub record: KeyRecord,

    /// Message reported by the provider.
    pub message: String,
}

/// Read-only view of one user's data.
#[derive(Debug, Clone, Serialize)]
pub struct UserSnapshot {
    /// The user's HWID binding, if they ever requested a key.
    pub binding: Option<UserBinding>,

    /// The user's most recent validated key, if any.
    pub key: Option<KeyRecord>,

    /// Whether that key has expired, computed at snapshot time.
    pub key_expired: Option<bool>,
}

impl UserSnapshot {
    /// Whether anything at all is on record for the user.
    pub fn has_data(&self) -> bool {
        self.binding.is_some() || self.key.is_some()
    }
}

/// What an administrative reset removed.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct ResetOutcome {
    /// A HWID binding was present and deleted.
    pub removed_binding: bool,

    /// A key record was present and deleted.
    pub removed_key: bool,
}

/// Static description of the deployment, for the info command.
#[derive(Debug, Clone, Serialize)]
pub struct SystemInfo {
    /// Hours a validated key stays active.
    pub key_validity_hours: i64,

    /// Minimum accepted HWID length.
    pub min_hwid_len: usize,

    /// Whether validation uses the bound HWID or a caller-supplied one.
    pub strict_binding: bool,
}

/// Main key lifecycle manager.
///
/// Create one instance per process and share it; all mutations are
/// serialized internally.
pub struct KeyManager {
    config: KeygateConfig,
    clock: Arc<dyn Clock>,
    provider: Arc<dyn KeyProvider>,
    store: KeyStore,
}

impl KeyManager {
    /// Create a manager with the given configuration.
    ///
    /// # Errors
    /// Returns an error if the configuration is invalid, an endpoint URL is
    /// malformed, or the store cannot be opened.
    pub fn new(config: KeygateConfig) -> Result<Self, KeygateError> {
        config.validate()?;
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let provider = Arc::new(CheckpointClient::new(&config, clock.clone())?);
        Self::with_parts(config, clock, provider)
    }

    /// Create a manager with injected clock and provider (for testing).
    #[cfg(any(test, feature = "test-seams"))]
    pub fn new_with_parts(
        config: KeygateConfig,
        clock: Arc<dyn Clock>,
        provider: Arc<dyn KeyProvider>,
    ) -> Result<Self, KeygateError> {
        config.validate()?;
        Self::with_parts(config, clock, provider)
    }

    fn with_parts(
        config: KeygateConfig,
        clock: Arc<dyn Clock>,
        provider: Arc<dyn KeyProvider>,
    ) -> Result<Self, KeygateError> {
        let store = KeyStore::open(config.resolved_store_path()?)?;
        Ok(Self {
            config,
            clock,
            provider,
            store,
        })
    }

    /// Issue a checkpoint link and record the HWID binding.
    ///
    /// Repeated calls refresh the binding and increment its request count;
    /// they never create duplicates. The store is persisted before returning.
    ///
    /// # Errors
    /// - `HwidTooShort` - HWID fails the minimum-length constraint; nothing
    ///   is recorded
    /// - `StoreIo` - the binding could not be persisted
    pub fn request_key(
        &self,
        user_id: &str,
        username: Option<&str>,
        hwid: &str,
    ) -> Result<KeyRequest, KeygateError> {
        let len = hwid.chars().count();
        if len < self.config.min_hwid_len {
            return Err(KeygateError::HwidTooShort {
                len,
                min: self.config.min_hwid_len,
            });
        }

        let link = self.provider.checkpoint_link(hwid);
        let binding = self
            .store
            .mutate(|doc| doc.upsert_binding(user_id, hwid, username, self.clock.now()))?;

        info!(
            user_id,
            request_count = binding.request_count,
            "checkpoint link issued"
        );
        Ok(KeyRequest { link, binding })
    }

    /// Validate a key with the remote provider and persist it on success.
    ///
    /// The HWID used depends on the configured policy: `Permissive` takes the
    /// caller-supplied one, `StrictBinding` uses the HWID bound at request
    /// time and rejects a conflicting supplied one before any remote call.
    ///
    /// # Errors
    /// - `MissingKey` / `MissingHwid` / `NotBound` / `HwidMismatch` - input
    ///   rejected locally, provider never contacted
    /// - `ProviderUnreachable` - both transports failed; the key may still be
    ///   good, the caller should retry later
    /// - `InvalidKey` - the provider was reached and rejected the key
    /// - `StoreIo` - the record could not be persisted
    ///
    /// Nothing is persisted on any error path.
    pub fn validate_key(
        &self,
        user_id: &str,
        key: &str,
        hwid: Option<&str>,
    ) -> Result<KeyValidation, KeygateError> {
        if key.is_empty() {
            return Err(KeygateError::MissingKey);
        }

        let hwid = self.resolve_hwid(user_id, hwid)?;

        // Remote call first, with no store lock held.
        let verdict = self.provider.validate_key(key, &hwid)?;
        if !verdict.valid {
            info!(user_id, message = %verdict.message, "key rejected by provider");
            return Err(KeygateError::InvalidKey {
                message: verdict.message,
            });
        }

        // Commit under the lock. If another validation for this user landed
        // while we were waiting on the network, the later commit overwrites.
        let record = self.store.mutate(|doc| {
            doc.record_key(
                user_id,
                key,
                &hwid,
                self.clock.now(),
                self.config.validity_window(),
            )
        })?;

        info!(user_id, expires_at = %record.expires_at, "key validated");
        Ok(KeyValidation {
            record,
            message: verdict.message,
        })
    }

    /// Resolve which HWID the validation runs against, per policy.
    fn resolve_hwid(&self, user_id: &str, supplied: Option<&str>) -> Result<String, KeygateError> {
        match self.config.hwid_policy {
            HwidPolicy::Permissive => supplied
                .filter(|s| !s.is_empty())
                .map(String::from)
                .ok_or(KeygateError::MissingHwid),
            HwidPolicy::StrictBinding => {
                let doc = self.store.snapshot();
                let (binding, _) = doc.user_view(user_id);
                let bound = binding.ok_or(KeygateError::NotBound)?.hwid.clone();
                if let Some(supplied) = supplied {
                    if supplied != bound {
                        return Err(KeygateError::HwidMismatch);
                    }
                }
                Ok(bound)
            }
        }
    }

    /// Read-only view of a user's binding and key, with expiry computed now.
    pub fn user_snapshot(&self, user_id: &str) -> UserSnapshot {
        let doc = self.store.snapshot();
        let (binding, key) = doc.user_view(user_id);
        let now = self.clock.now();

        UserSnapshot {
            binding: binding.cloned(),
            key: key.cloned(),
            key_expired: key.map(|record| !record.is_active(now)),
        }
    }

    /// Delete a user's binding and key record. Irreversible.
    pub fn reset_user(&self, user_id: &str) -> Result<ResetOutcome, KeygateError> {
        let (removed_binding, removed_key) =
            self.store.mutate(|doc| doc.remove_user(user_id))?;

        info!(user_id, removed_binding, removed_key, "user reset");
        Ok(ResetOutcome {
            removed_binding,
            removed_key,
        })
    }

    /// Aggregate statistics, classified against the current instant.
    pub fn stats(&self) -> AggregateStats {
        compute_stats(&self.store.snapshot(), self.clock.now())
    }

    /// Every user id with a binding, for transport-level fan-out.
    pub fn known_users(&self) -> Vec<String> {
        self.store.snapshot().users.keys().cloned().collect()
    }

    /// Static deployment description.
    pub fn system_info(&self) -> SystemInfo {
        SystemInfo {
            key_validity_hours: self.config.key_validity_hours,
            min_hwid_len: self.config.min_hwid_len,
            strict_binding: self.config.hwid_policy == HwidPolicy::StrictBinding,
        }
    }

    /// Get the current configuration.
    pub fn config(&self) -> &KeygateConfig {
        &self.config
    }
}
