//! Key provider client: checkpoint link generation and remote key
//! validation against the external checkpoint service.

pub mod http;
pub mod response;

pub use self::http::CheckpointClient;
pub use self::response::ProviderVerdict;

use crate::KeygateError;
use url::Url;

/// The provider operations the lifecycle layer depends on.
///
/// [`CheckpointClient`] is the real implementation; tests substitute scripted
/// ones so no validation flow ever needs a live provider.
pub trait KeyProvider: Send + Sync {
    /// Build the checkpoint link a user follows to obtain a key for `hwid`.
    fn checkpoint_link(&self, hwid: &str) -> Url;

    /// Validate `key` against `hwid` with the remote provider.
    ///
    /// `Ok` means the provider was reached and gave a verdict (which may be
    /// negative); `Err(ProviderUnreachable)` means every transport failed.
    fn validate_key(&self, key: &str, hwid: &str) -> Result<ProviderVerdict, KeygateError>;
}
