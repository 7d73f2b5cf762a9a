//! Aggregate statistics derived from a store snapshot.

use crate::store::document::StoreDocument;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Point-in-time usage statistics.
///
/// Active/expired classification is recomputed against `now` on every call;
/// nothing here is cached between calls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AggregateStats {
    /// Users with a HWID binding.
    pub total_users: u64,

    /// Users currently holding a key record, active or expired.
    pub total_keys: u64,

    /// Key records whose expiry is still in the future.
    pub active_keys: u64,

    /// Key records whose expiry has passed.
    pub expired_keys: u64,

    /// Successful validations ever, including replaced records.
    pub lifetime_keys_issued: u64,
}

/// Classify every key record against `now` in a single pass.
pub fn compute_stats(doc: &StoreDocument, now: DateTime<Utc>) -> AggregateStats {
    let active_keys = doc
        .keys
        .values()
        .filter(|record| record.is_active(now))
        .count() as u64;
    let total_keys = doc.keys.len() as u64;

    AggregateStats {
        total_users: doc.users.len() as u64,
        total_keys,
        active_keys,
        expired_keys: total_keys - active_keys,
        lifetime_keys_issued: doc.stats.total_keys_issued,
    }
}
