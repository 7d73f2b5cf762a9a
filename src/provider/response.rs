//! Normalization of provider validation responses.
//!
//! The checkpoint service has shipped more than one response shape: some
//! versions answer `{"valid": bool, ...}`, others `{"success": bool, ...}`.
//! Everything funnels through [`normalize_response`] into one canonical
//! verdict; shapes carrying neither field are logged and treated as a
//! rejection, never a crash.

use serde_json::Value;
use tracing::warn;

/// Canonical outcome of a reachable validation call.
#[derive(Debug, Clone)]
pub struct ProviderVerdict {
    /// Whether the provider accepted the key for the HWID.
    pub valid: bool,

    /// Human-readable message from the provider, or a stock one.
    pub message: String,

    /// The raw response body, for the transport layer's diagnostics.
    pub raw: Value,
}

/// Map any known provider response shape into a [`ProviderVerdict`].
///
/// A key counts as valid when either recognized flag is true.
pub fn normalize_response(raw: Value) -> ProviderVerdict {
    let valid_flag = raw.get("valid").and_then(Value::as_bool);
    let success_flag = raw.get("success").and_then(Value::as_bool);

    let valid = match (valid_flag, success_flag) {
        (None, None) => {
            warn!(body = %raw, "unrecognized provider response shape, treating as invalid");
            false
        }
        (v, s) => v.unwrap_or(false) || s.unwrap_or(false),
    };

    let message = raw
        .get("message")
        .and_then(Value::as_str)
        .map(String::from)
        .unwrap_or_else(|| {
            if valid {
                "Key valid".to_string()
            } else {
                "Key rejected".to_string()
            }
        });

    ProviderVerdict {
        valid,
        message,
        raw,
    }
}
