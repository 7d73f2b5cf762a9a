//! Keygate error types.

use thiserror::Error;

/// Errors that can occur during key issuance and validation.
#[derive(Debug, Error)]
pub enum KeygateError {
    /// Configuration is invalid.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Submitted HWID is shorter than the configured minimum.
    #[error("HWID too short ({len} chars, minimum {min})")]
    HwidTooShort {
        /// Length of the submitted HWID.
        len: usize,
        /// Minimum accepted length.
        min: usize,
    },

    /// No key was provided for validation.
    #[error("No key provided")]
    MissingKey,

    /// No HWID was provided and the deployment requires one at validation time.
    #[error("No HWID provided")]
    MissingHwid,

    /// Strict-binding deployment and the user never requested a key.
    #[error("No key request on record for this user")]
    NotBound,

    /// Supplied HWID disagrees with the HWID bound at request time.
    #[error("HWID does not match the one bound at request time")]
    HwidMismatch,

    /// Both validation transports failed; the provider could not be reached.
    #[error("Key provider unreachable: {0}")]
    ProviderUnreachable(String),

    /// The provider was reached and explicitly rejected the key.
    #[error("Key rejected by provider: {message}")]
    InvalidKey {
        /// Rejection message reported by the provider.
        message: String,
    },

    /// Key store could not be read or written.
    #[error("Key store I/O error: {0}")]
    StoreIo(String),

    /// Privileged command attempted without authorization.
    #[error("Permission denied for command: {command}")]
    PermissionDenied {
        /// Name of the rejected command.
        command: String,
    },
}

impl KeygateError {
    /// Stable machine-readable reason code for the transport layer.
    ///
    /// The transport renders user-facing text from these; the strings are part
    /// of the crate's public contract and never change between releases.
    pub fn reason_code(&self) -> &'static str {
        match self {
            Self::ConfigError(_) => "config_error",
            Self::HwidTooShort { .. } => "hwid_too_short",
            Self::MissingKey => "missing_key",
            Self::MissingHwid => "missing_hwid",
            Self::NotBound => "not_bound",
            Self::HwidMismatch => "hwid_mismatch",
            Self::ProviderUnreachable(_) => "provider_unreachable",
            Self::InvalidKey { .. } => "invalid_key",
            Self::StoreIo(_) => "store_io",
            Self::PermissionDenied { .. } => "permission_denied",
        }
    }

    /// Whether the user should retry the same key later (provider outage)
    /// rather than request a new one.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ProviderUnreachable(_) | Self::StoreIo(_))
    }
}
