// Connection registry - the unit of truth for negotiated API connections

//! # Connection Registry
//!
//! Owns every registered [`ApiConnection`]. Registration sequences the
//! credential probe and then capability discovery; only a connection whose
//! probe succeeded is ever persisted, and it enters the registry `active`.
//!
//! Ids come from a monotonically increasing counter that is never reused.
//! Deleting a connection leaves every other id untouched, so an external
//! chain link referencing a deleted connection dangles visibly (reported as
//! `ConnectionNotFound` at run time) instead of being silently repointed at
//! an unrelated API.
//!
//! ## Concurrency
//!
//! The registry is shared across cooperative async tasks. Entries live in a
//! `DashMap`, and `retest` re-checks that the id still exists after its
//! awaited I/O completes - no invariant is held across a suspension point.

use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use tracing::{info, warn};

use crate::engine::discovery::CapabilityDiscoverer;
use crate::engine::probe::{CredentialProbe, ProbeConfig};
use crate::models::{ApiConnection, ConnectionStatus, ConnectionSummary, NewConnection};
use crate::{ChainReactorError, Result};

/// Registry of negotiated third-party API connections
pub struct ConnectionRegistry {
    connections: DashMap<u64, ApiConnection>,
    next_id: AtomicU64,
    probe: CredentialProbe,
    discoverer: CapabilityDiscoverer,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::with_config(ProbeConfig::default())
    }

    pub fn with_config(config: ProbeConfig) -> Self {
        Self {
            connections: DashMap::new(),
            next_id: AtomicU64::new(1),
            probe: CredentialProbe::with_config(config.clone()),
            discoverer: CapabilityDiscoverer::with_config(config),
        }
    }

    /// Register a new API connection
    ///
    /// Runs the credential probe, then capability discovery with the
    /// negotiated shape. The connection is persisted only when the probe
    /// succeeds; discovery itself cannot fail (worst case it yields the
    /// generic fallback descriptors).
    ///
    /// ## Errors
    /// - `InvalidInput` when name or base URL is empty (the secret may be
    ///   empty - some APIs genuinely take none)
    /// - `AuthExhausted` when no credential shape reached HTTP 200
    pub async fn register(&self, request: NewConnection) -> Result<ApiConnection> {
        if request.name.trim().is_empty() {
            return Err(ChainReactorError::InvalidInput(
                "connection name is required".to_string(),
            ));
        }
        if request.base_url.trim().is_empty() {
            return Err(ChainReactorError::InvalidInput(
                "connection base URL is required".to_string(),
            ));
        }

        let outcome = self.probe.probe(&request.base_url, &request.secret).await?;
        let capabilities = self
            .discoverer
            .discover(
                &request.base_url,
                outcome.auth_shape,
                &request.secret,
                &outcome.body,
            )
            .await;

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let connection = ApiConnection {
            id,
            name: request.name,
            base_url: request.base_url,
            secret: request.secret,
            webhook_url: request.webhook_url,
            auth_shape: outcome.auth_shape,
            events: capabilities.events,
            actions: capabilities.actions,
            status: ConnectionStatus::Active,
        };

        info!(
            id,
            name = %connection.name,
            shape = %connection.auth_shape,
            events = connection.events.len(),
            actions = connection.actions.len(),
            "API connection registered"
        );

        self.connections.insert(id, connection.clone());
        Ok(connection)
    }

    /// Get the full record for a connection
    pub fn get(&self, id: u64) -> Result<ApiConnection> {
        self.connections
            .get(&id)
            .map(|entry| entry.clone())
            .ok_or(ChainReactorError::ConnectionNotFound { id })
    }

    /// Whether a connection id currently exists
    pub fn contains(&self, id: u64) -> bool {
        self.connections.contains_key(&id)
    }

    /// List `{id, name, status}` summaries in id order
    ///
    /// Id order makes repeated listings identical when nothing mutated
    /// in between.
    pub fn list(&self) -> Vec<ConnectionSummary> {
        let mut summaries: Vec<ConnectionSummary> = self
            .connections
            .iter()
            .map(|entry| entry.summary())
            .collect();
        summaries.sort_by_key(|summary| summary.id);
        summaries
    }

    /// Delete a connection, returning the removed record
    ///
    /// Remaining ids are left untouched; the counter never hands the removed
    /// id out again.
    pub fn delete(&self, id: u64) -> Result<ApiConnection> {
        match self.connections.remove(&id) {
            Some((_, connection)) => {
                info!(id, name = %connection.name, "API connection deleted");
                Ok(connection)
            }
            None => Err(ChainReactorError::ConnectionNotFound { id }),
        }
    }

    /// Re-run the probe (and, on success, discovery) for a stored connection
    ///
    /// Status reflects only the probe's present success. On probe failure the
    /// previously discovered descriptors are kept - a transient hiccup must
    /// not silently drop known triggers/actions. On probe success discovery
    /// runs again and replaces the descriptor sets wholesale.
    pub async fn retest(&self, id: u64) -> Result<ConnectionStatus> {
        let (base_url, secret) = {
            let entry = self
                .connections
                .get(&id)
                .ok_or(ChainReactorError::ConnectionNotFound { id })?;
            (entry.base_url.clone(), entry.secret.clone())
        };

        let probe_result = self.probe.probe(&base_url, &secret).await;

        let status = match probe_result {
            Ok(outcome) => {
                let capabilities = self
                    .discoverer
                    .discover(&base_url, outcome.auth_shape, &secret, &outcome.body)
                    .await;

                // The entry may have been deleted while we were probing
                let mut entry = self
                    .connections
                    .get_mut(&id)
                    .ok_or(ChainReactorError::ConnectionNotFound { id })?;
                entry.status = ConnectionStatus::Active;
                entry.auth_shape = outcome.auth_shape;
                entry.events = capabilities.events;
                entry.actions = capabilities.actions;
                ConnectionStatus::Active
            }
            Err(err) => {
                warn!(id, error = %err, "connection retest failed");
                let mut entry = self
                    .connections
                    .get_mut(&id)
                    .ok_or(ChainReactorError::ConnectionNotFound { id })?;
                entry.status = ConnectionStatus::Inactive;
                ConnectionStatus::Inactive
            }
        };

        info!(id, status = %status, "connection retested");
        Ok(status)
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
impl ConnectionRegistry {
    /// Insert a pre-negotiated connection without probing. Unit tests for the
    /// composer and executor use this; negotiation itself is covered by the
    /// integration tests.
    pub(crate) fn seed_for_tests(&self, mut connection: ApiConnection) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        connection.id = id;
        self.connections.insert(id, connection);
        id
    }
}
