// API connection models - negotiated third-party HTTP services

//! # API Connection Models
//!
//! This module defines the data model for a registered third-party API:
//! which credential encoding it accepted ([`AuthShape`]), which triggers and
//! actions it exposes ([`CapabilityDescriptor`]), and the health status the
//! registry keeps current.
//!
//! The six auth shapes cover the encodings real-world APIs conventionally
//! accept: bearer tokens, `X-API-Key` style headers, HTTP Basic, credential
//! query parameters (including the `appid` convention popularized by weather
//! APIs), and a bare `Api-Key` header.
//!
//! ## Rust Learning Notes:
//!
//! ### Enums with Behavior
//! `AuthShape` is a C-like enum, but Rust lets us attach methods to it.
//! `AuthShape::ALL` gives the probe its fixed attempt order as a const array,
//! so the ordering lives next to the type instead of inside the probe loop.

use serde::{Deserialize, Serialize};

/// The credential encoding a third-party API accepted during probing
///
/// The probe tries these in the order of [`AuthShape::ALL`], stopping at the
/// first shape that yields HTTP 200. The accepted shape is stored on the
/// connection and reused for every later call (discovery, retest, workflow
/// test mode).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthShape {
    /// `Authorization: Bearer <secret>`
    BearerToken,
    /// `X-API-Key: <secret>`
    XApiKeyHeader,
    /// `Authorization: Basic <base64(secret)>` - the secret is the whole
    /// encoded payload, matching how single-token Basic credentials are sent
    BasicAuth,
    /// `?apiKey=<secret>` query parameter
    ApiKeyQuery,
    /// `?appid=<secret>` query parameter (third-party weather-API convention)
    AppIdQuery,
    /// `Api-Key: <secret>` custom header
    ApiKeyHeader,
}

impl AuthShape {
    /// The fixed probe order. The probe stops at the first shape that
    /// returns HTTP 200, so this ordering is part of the contract.
    pub const ALL: [AuthShape; 6] = [
        AuthShape::BearerToken,
        AuthShape::XApiKeyHeader,
        AuthShape::BasicAuth,
        AuthShape::ApiKeyQuery,
        AuthShape::AppIdQuery,
        AuthShape::ApiKeyHeader,
    ];

    /// Human-readable label used in logs and aggregate probe errors
    pub fn describe(&self) -> &'static str {
        match self {
            AuthShape::BearerToken => "bearer token",
            AuthShape::XApiKeyHeader => "X-API-Key header",
            AuthShape::BasicAuth => "HTTP basic auth",
            AuthShape::ApiKeyQuery => "apiKey query parameter",
            AuthShape::AppIdQuery => "appid query parameter",
            AuthShape::ApiKeyHeader => "Api-Key header",
        }
    }
}

impl std::fmt::Display for AuthShape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.describe())
    }
}

/// Health status of a registered connection
///
/// `register` only persists connections whose probe succeeded, so new entries
/// start `Active`. `retest` flips this in place based on the probe's present
/// success without touching the stored id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    Active,
    Inactive,
}

impl std::fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionStatus::Active => write!(f, "active"),
            ConnectionStatus::Inactive => write!(f, "inactive"),
        }
    }
}

/// A single discovered trigger or action
///
/// Descriptors come either from the API's own discovery endpoints or from
/// keyword inference over its raw response. Third-party endpoints return
/// arbitrary JSON objects, so every field is defaulted - an array of partial
/// objects still deserializes instead of poisoning the whole discovery pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilityDescriptor {
    /// Identifier unique within the owning connection and kind,
    /// e.g. `weather_change` or `get_weather`
    #[serde(default)]
    pub id: String,
    /// Human name, e.g. "Weather Change"
    #[serde(default)]
    pub name: String,
    /// Human description of what the capability does
    #[serde(default)]
    pub description: String,
}

impl CapabilityDescriptor {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: description.into(),
        }
    }
}

/// Registration request for a new API connection
///
/// `webhook_url` is optional bookkeeping carried alongside the connection;
/// Chain Reactor only makes outbound calls, it never listens on it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewConnection {
    pub name: String,
    pub base_url: String,
    pub secret: String,
    pub webhook_url: Option<String>,
}

impl NewConnection {
    pub fn new(name: impl Into<String>, base_url: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            base_url: base_url.into(),
            secret: secret.into(),
            webhook_url: None,
        }
    }

    pub fn with_webhook(mut self, webhook_url: impl Into<String>) -> Self {
        self.webhook_url = Some(webhook_url.into());
        self
    }
}

/// A negotiated third-party API connection
///
/// Created only by a successful probe + discovery run. Ids come from a
/// monotonically increasing counter and are never reused, so deleting a
/// connection cannot silently repoint another record at an unrelated API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConnection {
    /// Opaque identifier, unique for the lifetime of the registry
    pub id: u64,
    /// Display name supplied at registration
    pub name: String,
    /// Base URL the probe negotiated against
    pub base_url: String,
    /// The opaque secret credential (may be empty)
    pub secret: String,
    /// Optional outbound webhook URL stored for the caller's benefit
    pub webhook_url: Option<String>,
    /// Which credential encoding the probe succeeded with
    pub auth_shape: AuthShape,
    /// Discovered triggers, in discovery order (not deduplicated)
    pub events: Vec<CapabilityDescriptor>,
    /// Discovered actions, in discovery order (not deduplicated)
    pub actions: Vec<CapabilityDescriptor>,
    /// Present health of the connection
    pub status: ConnectionStatus,
}

impl ApiConnection {
    /// Project into the `{id, name, status}` summary listings return
    pub fn summary(&self) -> ConnectionSummary {
        ConnectionSummary {
            id: self.id,
            name: self.name.clone(),
            status: self.status,
        }
    }
}

/// The projection of a connection that listings expose
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionSummary {
    pub id: u64,
    pub name: String,
    pub status: ConnectionStatus,
}
