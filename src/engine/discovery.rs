// Capability discovery - what triggers and actions does this API expose?

//! # Capability Discovery
//!
//! Once the probe has negotiated a working credential, the discoverer works
//! out what the API can do. Three tiers, each an explicit fallback for the
//! one above it, so tests can target them independently:
//!
//! 1. **Discovery endpoints**: nine conventional relative paths are probed
//!    with the established auth shape. Paths whose name contains "event" feed
//!    the trigger set, "action" feeds the action set. Endpoints that error or
//!    return non-JSON are skipped silently.
//! 2. **Keyword inference**: if either set is still empty, the raw body from
//!    the original probe success is serialized and scanned case-insensitively
//!    for domain keywords; each match contributes a fixed descriptor pair.
//! 3. **Generic fallback**: with no keyword match, two generic descriptor
//!    pairs are emitted so downstream composition always has at least one
//!    trigger and one action to offer.
//!
//! Accordingly `discover` never fails. Degraded discovery is logged, not
//! surfaced. Paths are tried strictly in order and duplicate descriptors
//! across sources are not deduplicated.

use reqwest::Client;
use serde_json::Value;
use tracing::{debug, info, warn};
use url::Url;

use crate::engine::probe::{apply_auth, json_headers, ProbeConfig};
use crate::models::{AuthShape, CapabilityDescriptor};

/// The conventional relative paths probed for explicit capability listings,
/// in fixed order
pub const DISCOVERY_PATHS: [&str; 9] = [
    "/events",
    "/actions",
    "/webhooks",
    "/triggers",
    "/capabilities",
    "/api/events",
    "/api/actions",
    "/v1/events",
    "/v1/actions",
];

/// The capability sets a discovery pass produced
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiscoveredCapabilities {
    pub events: Vec<CapabilityDescriptor>,
    pub actions: Vec<CapabilityDescriptor>,
}

/// Probes discovery endpoints and infers capabilities from response bodies
pub struct CapabilityDiscoverer {
    client: Client,
    config: ProbeConfig,
}

impl CapabilityDiscoverer {
    pub fn new() -> Self {
        Self::with_config(ProbeConfig::default())
    }

    pub fn with_config(config: ProbeConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    /// Discover the triggers and actions an API exposes
    ///
    /// `probe_body` is the raw body from the probe's winning response; it
    /// only matters when the endpoint tier comes up empty.
    ///
    /// ## Parameters
    /// - `base_url`: the connection's base URL
    /// - `auth_shape`: the credential encoding the probe negotiated
    /// - `secret`: the stored credential
    /// - `probe_body`: raw probe response body for the inference tier
    pub async fn discover(
        &self,
        base_url: &str,
        auth_shape: AuthShape,
        secret: &str,
        probe_body: &Value,
    ) -> DiscoveredCapabilities {
        let mut events = Vec::new();
        let mut actions = Vec::new();

        match Url::parse(base_url) {
            Ok(base) => {
                for path in DISCOVERY_PATHS {
                    let url = match base.join(path) {
                        Ok(url) => url,
                        Err(err) => {
                            debug!(path, error = %err, "discovery path did not join");
                            continue;
                        }
                    };

                    let request = self
                        .client
                        .get(url.clone())
                        .headers(json_headers())
                        .timeout(self.config.request_timeout);
                    let request = apply_auth(auth_shape, request, secret);

                    let response = match request.send().await {
                        Ok(response) => response,
                        Err(err) => {
                            debug!(path, error = %err, "discovery endpoint not available");
                            continue;
                        }
                    };

                    // Anything below 500 counts as reachable; the body decides
                    if response.status().is_server_error() {
                        debug!(path, status = response.status().as_u16(), "discovery endpoint errored");
                        continue;
                    }

                    let body = match response.json::<Value>().await {
                        Ok(body) => body,
                        Err(err) => {
                            debug!(path, error = %err, "discovery endpoint returned non-JSON");
                            continue;
                        }
                    };

                    if path.contains("event") {
                        let found = extract_descriptors(&body, "events");
                        debug!(path, count = found.len(), "discovered event descriptors");
                        events.extend(found);
                    }
                    if path.contains("action") {
                        let found = extract_descriptors(&body, "actions");
                        debug!(path, count = found.len(), "discovered action descriptors");
                        actions.extend(found);
                    }
                }
            }
            Err(err) => {
                warn!(url = base_url, error = %err, "base URL unparseable, falling back to inference");
            }
        }

        // Inference tier fills whichever set the endpoints left empty
        if events.is_empty() || actions.is_empty() {
            let inferred = infer_capabilities(probe_body);
            if events.is_empty() {
                warn!(url = base_url, "no event endpoints discovered, using inferred triggers");
                events = inferred.events;
            }
            if actions.is_empty() {
                warn!(url = base_url, "no action endpoints discovered, using inferred actions");
                actions = inferred.actions;
            }
        }

        info!(
            url = base_url,
            events = events.len(),
            actions = actions.len(),
            "capability discovery complete"
        );

        DiscoveredCapabilities { events, actions }
    }
}

impl Default for CapabilityDiscoverer {
    fn default() -> Self {
        Self::new()
    }
}

/// Pull descriptor lists out of a discovery endpoint body
///
/// Accepts a bare array, or an object carrying the list under the kind's
/// field name (`events`/`actions`) or the generic `data` field.
fn extract_descriptors(body: &Value, field: &str) -> Vec<CapabilityDescriptor> {
    let candidate = if body.is_array() {
        body.clone()
    } else {
        body.get(field)
            .or_else(|| body.get("data"))
            .cloned()
            .unwrap_or(Value::Null)
    };

    serde_json::from_value(candidate).unwrap_or_default()
}

/// Tier two and three: keyword inference over the raw probe body, with a
/// generic fallback pair per kind so composition always has something to bind
pub fn infer_capabilities(probe_body: &Value) -> DiscoveredCapabilities {
    let mut events = Vec::new();
    let mut actions = Vec::new();

    let haystack = probe_body.to_string().to_lowercase();

    if haystack.contains("weather") {
        events.push(CapabilityDescriptor::new(
            "weather_change",
            "Weather Change",
            "Weather conditions change",
        ));
        actions.push(CapabilityDescriptor::new(
            "get_weather",
            "Get Weather",
            "Fetch weather data",
        ));
    }

    if haystack.contains("user") {
        events.push(CapabilityDescriptor::new(
            "user_update",
            "User Update",
            "User data changes",
        ));
        actions.push(CapabilityDescriptor::new(
            "get_user",
            "Get User",
            "Fetch user data",
        ));
    }

    if events.is_empty() {
        events.push(CapabilityDescriptor::new(
            "data_update",
            "Data Update",
            "Data has been updated",
        ));
        events.push(CapabilityDescriptor::new(
            "status_change",
            "Status Change",
            "Status has changed",
        ));
    }

    if actions.is_empty() {
        actions.push(CapabilityDescriptor::new(
            "get_data",
            "Get Data",
            "Fetch data",
        ));
        actions.push(CapabilityDescriptor::new(
            "update_data",
            "Update Data",
            "Update data",
        ));
    }

    DiscoveredCapabilities { events, actions }
}
