//! # Keygate
//!
//! **Checkpoint-gated access key issuance and validation.**
//!
//! Keygate manages time-limited access keys for a script whose issuance is
//! gated behind an external link-checkpoint provider. A user binds a hardware
//! identifier (HWID) to a request, completes the provider's checkpoint flow
//! to obtain a key, and later proves possession of a valid, non-expired,
//! HWID-matching key.
//!
//! ## Features
//!
//! - **HWID binding** — key requests record the requester's hardware id and
//!   a running request count
//! - **Dual-transport validation** — a query-parameter GET is tried first,
//!   then a body-carrying POST, under one shared timeout budget
//! - **Derived expiry** — keys stay active for a fixed window after
//!   validation; active/expired is always recomputed from timestamps
//! - **Single-writer store** — one persisted JSON document, every mutation a
//!   serialized read-modify-persist cycle with atomic writes
//! - **Transport-agnostic commands** — a structured command surface for
//!   whatever chat platform or CLI fronts the system
//!
//! ## Quickstart
//!
//! ```no_run
//! use keygate::{Caller, Command, KeygateConfig, KeyManager};
//!
//! fn main() -> Result<(), keygate::KeygateError> {
//!     let config = KeygateConfig::from_file("keygate.json".as_ref())?;
//!     let manager = KeyManager::new(config)?;
//!
//!     let reply = keygate::dispatch(
//!         &manager,
//!         &Caller::user("1234"),
//!         Command::RequestKey { hwid: "ABCDE12345".into() },
//!     )?;
//!     println!("{:?}", reply);
//!     Ok(())
//! }
//! ```
//!
//! ## Error handling
//!
//! Every failure path yields a typed [`KeygateError`] with a stable
//! [`reason_code`](KeygateError::reason_code). A provider outage
//! (`provider_unreachable`) is reported distinctly from a rejected key
//! (`invalid_key`) so the transport can tell users to retry rather than
//! request a new key.

#![deny(warnings)]
#![deny(missing_docs)]

// Core modules
pub mod clock;
pub mod config;
pub mod errors;

// Provider layer
pub mod provider;

// Store layer
pub mod store;

// Stats layer
pub mod stats;

// Manager (main lifecycle API)
pub mod manager;

// Command surface
pub mod commands;

// Re-exports for public API
pub use clock::{Clock, SystemClock};
pub use commands::{dispatch, Caller, Command, Reply};
pub use config::{HwidPolicy, KeygateConfig};
pub use errors::KeygateError;
pub use manager::{KeyManager, KeyRequest, KeyValidation, UserSnapshot};
pub use provider::{CheckpointClient, KeyProvider, ProviderVerdict};
pub use stats::AggregateStats;

#[cfg(any(test, feature = "test-seams"))]
pub use clock::MockClock;
