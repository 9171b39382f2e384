// Credential probe - negotiates how to authenticate against an unknown API

//! # Credential Probe
//!
//! Given nothing but a base URL and an opaque secret, the probe determines
//! which credential encoding the API accepts. It tries the six shapes in
//! [`AuthShape::ALL`] strictly in order - each attempt must complete or fail
//! before the next starts, because the probe intentionally stops at the first
//! HTTP 200.
//!
//! Per-attempt semantics:
//! - exactly HTTP 200 means the shape worked; the probe records it and stops
//! - any other status (401, 404, whatever the API felt like) means the shape
//!   plainly did not succeed; the status is recorded and the loop moves on
//! - a transport-level failure (refused connection, timeout) is swallowed and
//!   treated as "try next"
//!
//! Only total exhaustion of all six shapes is a failure, surfaced as
//! [`ChainReactorError::AuthExhausted`] with one line per attempt.
//!
//! Probing is read-only GET traffic; no side effects on the target API.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE};
use reqwest::{Client, RequestBuilder, StatusCode};
use tracing::{debug, info};

use crate::models::AuthShape;
use crate::{ChainReactorError, Result};

/// Outbound HTTP settings shared by the probe, discoverer and executor
///
/// The source behavior carried no timeout at all; the bounded per-request
/// timeout here is the hardening addition the concurrency model calls for.
#[derive(Debug, Clone)]
pub struct ProbeConfig {
    /// Applied to every outbound call individually
    pub request_timeout: Duration,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(10),
        }
    }
}

/// Apply a credential encoding to an outgoing request
///
/// This is the single place that knows how each [`AuthShape`] is spelled on
/// the wire. Discovery and workflow test mode reuse it so the negotiated
/// shape is applied identically everywhere.
pub fn apply_auth(shape: AuthShape, request: RequestBuilder, secret: &str) -> RequestBuilder {
    use base64::Engine as _;

    match shape {
        AuthShape::BearerToken => request.bearer_auth(secret),
        AuthShape::XApiKeyHeader => request.header("X-API-Key", secret),
        AuthShape::BasicAuth => {
            // The secret is the whole encoded payload, not user:pass
            let encoded = base64::engine::general_purpose::STANDARD.encode(secret);
            request.header(reqwest::header::AUTHORIZATION, format!("Basic {}", encoded))
        }
        AuthShape::ApiKeyQuery => request.query(&[("apiKey", secret)]),
        AuthShape::AppIdQuery => request.query(&[("appid", secret)]),
        AuthShape::ApiKeyHeader => request.header("Api-Key", secret),
    }
}

/// Headers common to every probe and discovery request
pub(crate) fn json_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
    headers
}

/// Result of a successful probe
#[derive(Debug, Clone)]
pub struct ProbeOutcome {
    /// The shape that yielded HTTP 200
    pub auth_shape: AuthShape,
    /// The status of the winning response (always 200 today, kept for
    /// diagnostics symmetry with attempt records)
    pub status: u16,
    /// The raw response body, fed to capability inference when the API
    /// exposes no discovery endpoints
    pub body: serde_json::Value,
}

/// Probes an unknown HTTP API with each credential encoding in turn
pub struct CredentialProbe {
    client: Client,
    config: ProbeConfig,
}

impl CredentialProbe {
    pub fn new() -> Self {
        Self::with_config(ProbeConfig::default())
    }

    pub fn with_config(config: ProbeConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    /// Try each auth shape in order until one yields HTTP 200
    ///
    /// ## Errors
    /// [`ChainReactorError::AuthExhausted`] when no shape reaches 200; the
    /// aggregate error names every attempted shape and what it returned.
    pub async fn probe(&self, base_url: &str, secret: &str) -> Result<ProbeOutcome> {
        let mut attempts = Vec::new();

        for shape in AuthShape::ALL {
            debug!(url = base_url, shape = shape.describe(), "trying authentication method");

            let request = self
                .client
                .get(base_url)
                .headers(json_headers())
                .timeout(self.config.request_timeout);
            let request = apply_auth(shape, request, secret);

            match request.send().await {
                Ok(response) => {
                    let status = response.status();
                    if status == StatusCode::OK {
                        info!(url = base_url, shape = shape.describe(), "credential shape accepted");
                        let body = response
                            .json::<serde_json::Value>()
                            .await
                            .unwrap_or(serde_json::Value::Null);
                        return Ok(ProbeOutcome {
                            auth_shape: shape,
                            status: status.as_u16(),
                            body,
                        });
                    }
                    debug!(url = base_url, shape = shape.describe(), status = status.as_u16(), "shape rejected");
                    attempts.push(format!("{}: HTTP {}", shape.describe(), status.as_u16()));
                }
                Err(err) => {
                    // Transport failures are per-attempt, not fatal
                    debug!(url = base_url, shape = shape.describe(), error = %err, "attempt failed");
                    attempts.push(format!("{}: {}", shape.describe(), err));
                }
            }
        }

        Err(ChainReactorError::AuthExhausted {
            url: base_url.to_string(),
            attempts,
        })
    }
}

impl Default for CredentialProbe {
    fn default() -> Self {
        Self::new()
    }
}
