// Chain link storage - control-plane records of composed workflows

//! # Chain Link Storage
//!
//! This module provides the storage abstraction for [`ChainLink`] records.
//! The abstraction separates the composer/executor from storage details, the
//! same repository pattern the rest of the engine follows: a trait defining
//! the operations, and an in-memory implementation constructed once at
//! process start and injected wherever it is needed.
//!
//! Ids are assigned by the store from a never-reused counter; deletion does
//! not renumber surviving records.
//!
//! ## Rust Learning Notes:
//!
//! ### Async Traits
//! Rust doesn't natively support async functions in trait objects; the
//! `async-trait` crate provides the macro that makes
//! `Arc<dyn ChainLinkStorage>` work.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;
use tracing::{debug, info};

use crate::models::{ChainLink, ChainLinkStatus, RunRecord};
use crate::{ChainReactorError, Result};

/// Storage trait for chain link persistence
///
/// All operations are async so a future backend (database, message bus) can
/// slot in without touching the composer or executor.
#[async_trait]
pub trait ChainLinkStorage: Send + Sync {
    /// Create a new chain link record; the store assigns the id and the
    /// creation timestamp
    async fn create(
        &self,
        name: &str,
        triggers: Vec<String>,
        actions: Vec<String>,
        api_id: u64,
    ) -> Result<ChainLink>;

    /// Get a chain link by id
    ///
    /// `Ok(None)` means no record with that id (not an error).
    async fn get(&self, id: u64) -> Result<Option<ChainLink>>;

    /// List all chain links in id order
    async fn list(&self) -> Result<Vec<ChainLink>>;

    /// Delete a chain link; returns whether a record was removed
    async fn delete(&self, id: u64) -> Result<bool>;

    /// Flip a chain link's status, returning the updated record
    async fn set_status(&self, id: u64, status: ChainLinkStatus) -> Result<ChainLink>;

    /// Attach the outcome of the latest run or test to the record
    async fn record_run(&self, id: u64, record: RunRecord) -> Result<()>;
}

/// In-memory implementation of [`ChainLinkStorage`]
///
/// The default store for a single-process deployment; durable persistence is
/// explicitly out of scope.
pub struct InMemoryChainLinkStore {
    links: DashMap<u64, ChainLink>,
    next_id: AtomicU64,
}

impl InMemoryChainLinkStore {
    pub fn new() -> Self {
        Self {
            links: DashMap::new(),
            next_id: AtomicU64::new(1),
        }
    }
}

impl Default for InMemoryChainLinkStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChainLinkStorage for InMemoryChainLinkStore {
    async fn create(
        &self,
        name: &str,
        triggers: Vec<String>,
        actions: Vec<String>,
        api_id: u64,
    ) -> Result<ChainLink> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let link = ChainLink::new(id, name, triggers, actions, api_id);
        info!(id, name = %link.name, api_id, "chain link created");
        self.links.insert(id, link.clone());
        Ok(link)
    }

    async fn get(&self, id: u64) -> Result<Option<ChainLink>> {
        Ok(self.links.get(&id).map(|entry| entry.clone()))
    }

    async fn list(&self) -> Result<Vec<ChainLink>> {
        let mut links: Vec<ChainLink> = self.links.iter().map(|entry| entry.clone()).collect();
        links.sort_by_key(|link| link.id);
        Ok(links)
    }

    async fn delete(&self, id: u64) -> Result<bool> {
        let removed = self.links.remove(&id).is_some();
        if removed {
            info!(id, "chain link deleted");
        }
        Ok(removed)
    }

    async fn set_status(&self, id: u64, status: ChainLinkStatus) -> Result<ChainLink> {
        let mut entry = self
            .links
            .get_mut(&id)
            .ok_or(ChainReactorError::ChainLinkNotFound { id })?;
        entry.status = status;
        debug!(id, status = %status, "chain link status updated");
        Ok(entry.clone())
    }

    async fn record_run(&self, id: u64, record: RunRecord) -> Result<()> {
        // Best effort: the chain link may have been deleted mid-run
        if let Some(mut entry) = self.links.get_mut(&id) {
            entry.last_run = Some(record);
        }
        Ok(())
    }
}
