//! Persisted key store document model.
//!
//! One keyed document holds everything: user bindings, validated key records,
//! and running counters. Mutation helpers live here so they can be exercised
//! without any file I/O.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A user's HWID binding, created on first key request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserBinding {
    /// Hardware identifier submitted with the most recent request.
    pub hwid: String,

    /// Display name of the requester, if the transport knows one.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub username: Option<String>,

    /// When the most recent request was made.
    pub last_request_at: DateTime<Utc>,

    /// How many key requests this user has made. Starts at 1.
    pub request_count: u64,
}

/// A validated key, one active record per user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyRecord {
    /// The provider-issued key.
    pub key: String,

    /// HWID the key was validated against.
    pub hwid: String,

    /// When the provider confirmed the key.
    pub validated_at: DateTime<Utc>,

    /// When the key stops being active. Always `validated_at` plus the
    /// configured validity window.
    pub expires_at: DateTime<Utc>,
}

impl KeyRecord {
    /// Whether the key is still active at `now`.
    ///
    /// Expiry is derived from the stored timestamps on every call; it is
    /// never persisted as a flag.
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }
}

/// Running counters persisted alongside the maps.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsSummary {
    /// Number of users with a binding. Recounted on every mutation.
    pub total_users: u64,

    /// Successful validations ever, including replaced records.
    pub total_keys_issued: u64,
}

/// The whole persisted store: `users`, `keys`, and a `stats` summary.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreDocument {
    /// User id → HWID binding.
    #[serde(default)]
    pub users: BTreeMap<String, UserBinding>,

    /// User id → most recently validated key.
    #[serde(default)]
    pub keys: BTreeMap<String, KeyRecord>,

    /// Running counters.
    #[serde(default)]
    pub stats: StatsSummary,
}

impl StoreDocument {
    /// Create or refresh a user's binding for a new key request.
    ///
    /// The request count increments across calls; hwid, username and
    /// timestamp always reflect the latest request.
    pub fn upsert_binding(
        &mut self,
        user_id: &str,
        hwid: &str,
        username: Option<&str>,
        now: DateTime<Utc>,
    ) -> UserBinding {
        let entry = self
            .users
            .entry(user_id.to_string())
            .and_modify(|binding| {
                binding.hwid = hwid.to_string();
                binding.username = username.map(String::from);
                binding.last_request_at = now;
                binding.request_count += 1;
            })
            .or_insert_with(|| UserBinding {
                hwid: hwid.to_string(),
                username: username.map(String::from),
                last_request_at: now,
                request_count: 1,
            });
        let binding = entry.clone();
        self.stats.total_users = self.users.len() as u64;
        binding
    }

    /// Record a successfully validated key, replacing any prior record.
    pub fn record_key(
        &mut self,
        user_id: &str,
        key: &str,
        hwid: &str,
        validated_at: DateTime<Utc>,
        validity: chrono::Duration,
    ) -> KeyRecord {
        let record = KeyRecord {
            key: key.to_string(),
            hwid: hwid.to_string(),
            validated_at,
            expires_at: validated_at + validity,
        };
        self.keys.insert(user_id.to_string(), record.clone());
        self.stats.total_keys_issued += 1;
        record
    }

    /// Remove a user's binding and key record, adjusting counters.
    ///
    /// Returns which of the two were present.
    pub fn remove_user(&mut self, user_id: &str) -> (bool, bool) {
        let removed_binding = self.users.remove(user_id).is_some();
        let removed_key = self.keys.remove(user_id).is_some();
        self.stats.total_users = self.users.len() as u64;
        if removed_key {
            self.stats.total_keys_issued = self.stats.total_keys_issued.saturating_sub(1);
        }
        (removed_binding, removed_key)
    }

    /// Read a user's binding and key record, if any.
    pub fn user_view(&self, user_id: &str) -> (Option<&UserBinding>, Option<&KeyRecord>) {
        (self.users.get(user_id), self.keys.get(user_id))
    }
}
