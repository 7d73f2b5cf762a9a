//! Reqwest-based client for the checkpoint service.
//!
//! Validation hedges across two transport conventions because the provider's
//! accepted method has not been stable across its releases: a query-parameter
//! GET with a bearer credential first, then a JSON POST carrying the
//! credential in the body. Both run under one shared timeout budget.

use crate::clock::Clock;
use crate::config::KeygateConfig;
use crate::provider::response::{normalize_response, ProviderVerdict};
use crate::provider::KeyProvider;
use crate::KeygateError;
use reqwest::blocking::Client;
use reqwest::header::{AUTHORIZATION, USER_AGENT};
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};
use url::Url;

/// Validation transport conventions, in the order they are attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    /// GET with `key`/`hwid` query parameters and a bearer credential header.
    Query,
    /// POST with a JSON body carrying `key`, `hwid` and the credential.
    JsonBody,
}

const TRANSPORT_ORDER: [Transport; 2] = [Transport::Query, Transport::JsonBody];

/// HTTP client for the checkpoint service.
pub struct CheckpointClient {
    http: Client,
    checkpoint_url: Url,
    validation_url: Url,
    api_key: String,
    user_agent: String,
    zone: Option<String>,
    timeout: Duration,
    clock: Arc<dyn Clock>,
}

impl CheckpointClient {
    /// Create a client from config.
    ///
    /// Both endpoint URLs are parsed here; a malformed one is a fatal
    /// configuration error, never a runtime failure.
    pub fn new(config: &KeygateConfig, clock: Arc<dyn Clock>) -> Result<Self, KeygateError> {
        let checkpoint_url = Url::parse(&config.checkpoint_url)
            .map_err(|e| KeygateError::ConfigError(format!("Bad checkpoint_url: {}", e)))?;
        let validation_url = Url::parse(&config.validation_url)
            .map_err(|e| KeygateError::ConfigError(format!("Bad validation_url: {}", e)))?;

        let timeout = Duration::from_secs(config.request_timeout_secs);
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| KeygateError::ConfigError(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            checkpoint_url,
            validation_url,
            api_key: config.api_key.clone(),
            user_agent: config.user_agent.clone(),
            zone: config.zone.clone(),
            timeout,
            clock,
        })
    }

    /// One validation attempt over the given transport.
    ///
    /// Network errors, timeouts, non-2xx statuses and unparsable bodies are
    /// all attempt failures; the caller decides whether another transport
    /// gets a turn.
    fn attempt(
        &self,
        transport: Transport,
        key: &str,
        hwid: &str,
        timeout: Duration,
    ) -> Result<Value, String> {
        let request = match transport {
            Transport::Query => self
                .http
                .get(self.validation_url.clone())
                .query(&[("key", key), ("hwid", hwid)])
                .header(AUTHORIZATION, format!("Bearer {}", self.api_key)),
            Transport::JsonBody => self.http.post(self.validation_url.clone()).json(
                &serde_json::json!({
                    "key": key,
                    "hwid": hwid,
                    "apiKey": self.api_key,
                }),
            ),
        };

        let response = request
            .header(USER_AGENT, &self.user_agent)
            .timeout(timeout)
            .send()
            .map_err(|e| format!("request failed: {}", e))?
            .error_for_status()
            .map_err(|e| format!("bad status: {}", e))?;

        response
            .json::<Value>()
            .map_err(|e| format!("body not JSON: {}", e))
    }
}

impl KeyProvider for CheckpointClient {
    fn checkpoint_link(&self, hwid: &str) -> Url {
        let mut url = self.checkpoint_url.clone();
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("hwid", hwid);
            if let Some(zone) = &self.zone {
                pairs.append_pair("zone", zone);
            }
            pairs.append_pair("ts", &self.clock.now().timestamp_millis().to_string());
        }
        url
    }

    fn validate_key(&self, key: &str, hwid: &str) -> Result<ProviderVerdict, KeygateError> {
        run_transports(self.timeout, |transport, remaining| {
            self.attempt(transport, key, hwid, remaining)
        })
    }
}

/// Try each transport in order under one shared timeout budget.
///
/// A transport that reaches the provider settles the call, whatever the
/// verdict; the next transport only gets a turn after a failed attempt, and
/// only with whatever budget remains.
fn run_transports<F>(budget: Duration, mut attempt: F) -> Result<ProviderVerdict, KeygateError>
where
    F: FnMut(Transport, Duration) -> Result<Value, String>,
{
    let deadline = Instant::now() + budget;
    let mut failures = Vec::new();

    for transport in TRANSPORT_ORDER {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            failures.push(format!("{:?}: timeout budget exhausted", transport));
            continue;
        }

        match attempt(transport, remaining) {
            Ok(raw) => {
                debug!(?transport, "validation transport settled the call");
                return Ok(normalize_response(raw));
            }
            Err(err) => {
                warn!(?transport, error = %err, "validation transport failed");
                failures.push(format!("{:?}: {}", transport, err));
            }
        }
    }

    Err(KeygateError::ProviderUnreachable(failures.join("; ")))
}
