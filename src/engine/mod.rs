// Engine module - the automation core behind the public facade

//! # Engine Module
//!
//! Everything that *does* something lives here; `models` only describes.
//!
//! - [`probe`]: credential negotiation against an unknown API
//! - [`discovery`]: capability harvesting and keyword inference
//! - [`connections`]: registry of negotiated API connections
//! - [`rules`]: named executable triggers, actions and conditions
//! - [`chain_links`]: persistence trait for composed chain link records
//! - [`composer`]: binds names + condition + connection into a chain link
//! - [`executor`]: runs and live-tests composed chain links
//!
//! [`AutomationEngine`] wires the pieces together with shared `Arc` handles
//! so embedders get one object to hold. Every collaborator is injected, not
//! reached through globals; tests build the same graph with their own store.

pub mod chain_links;
pub mod composer;
pub mod connections;
pub mod discovery;
pub mod executor;
pub mod probe;
pub mod rules;

use std::sync::Arc;

use serde_json::Value;

use crate::models::{
    ApiConnection, ChainLink, ChainLinkStatus, ConnectionStatus, ConnectionSummary, NewConnection,
};
use crate::Result;

use chain_links::{ChainLinkStorage, InMemoryChainLinkStore};
use composer::WorkflowComposer;
use connections::ConnectionRegistry;
use executor::{RunReport, TestReport, WorkflowExecutor};
use probe::ProbeConfig;
use rules::{ActionFn, ConditionFn, RuleRegistry, TriggerFn};

/// Facade over the whole automation core
///
/// Owns one connection registry, one rule registry, one chain link store and
/// the composer/executor pair built on top of them. Cloning is cheap; all
/// state sits behind shared handles.
///
/// ## Rust Learning Notes:
///
/// ### Facade over `Arc`-shared parts
/// Each subsystem is its own type with its own tests. The facade only wires
/// them: it holds `Arc`s and delegates, so embedders that want finer control
/// can build the same graph by hand with a different `ChainLinkStorage`.
#[derive(Clone)]
pub struct AutomationEngine {
    connections: Arc<ConnectionRegistry>,
    rules: Arc<RuleRegistry>,
    store: Arc<dyn ChainLinkStorage>,
    composer: Arc<WorkflowComposer>,
    executor: Arc<WorkflowExecutor>,
}

impl AutomationEngine {
    /// Build an engine with in-memory chain link storage and default timeouts
    pub fn new() -> Self {
        Self::with_store(Arc::new(InMemoryChainLinkStore::new()), ProbeConfig::default())
    }

    /// Build an engine around an injected chain link store
    pub fn with_store(store: Arc<dyn ChainLinkStorage>, config: ProbeConfig) -> Self {
        let connections = Arc::new(ConnectionRegistry::with_config(config.clone()));
        let rules = Arc::new(RuleRegistry::new());
        let composer = Arc::new(WorkflowComposer::new(
            rules.clone(),
            connections.clone(),
            store.clone(),
        ));
        let executor = Arc::new(WorkflowExecutor::new(
            composer.clone(),
            store.clone(),
            connections.clone(),
            config,
        ));
        Self {
            connections,
            rules,
            store,
            composer,
            executor,
        }
    }

    // ---- connections ----

    /// Negotiate, discover and register a new API connection
    pub async fn register_connection(&self, request: NewConnection) -> Result<ApiConnection> {
        self.connections.register(request).await
    }

    pub fn get_connection(&self, id: u64) -> Result<ApiConnection> {
        self.connections.get(id)
    }

    /// Summaries of all registered connections, in id order
    pub fn list_connections(&self) -> Vec<ConnectionSummary> {
        self.connections.list()
    }

    /// Re-probe an existing connection and update its health
    pub async fn retest_connection(&self, id: u64) -> Result<ConnectionStatus> {
        self.connections.retest(id).await
    }

    /// Remove a connection; its id is never reused, so chain links that
    /// referenced it dangle visibly instead of silently repointing
    pub fn delete_connection(&self, id: u64) -> Result<ApiConnection> {
        self.connections.delete(id)
    }

    // ---- rules ----

    pub fn register_trigger(&self, name: impl Into<String>, f: TriggerFn) -> Result<()> {
        self.rules.register_trigger(name, f)
    }

    pub fn register_action(&self, name: impl Into<String>, f: ActionFn) -> Result<()> {
        self.rules.register_action(name, f)
    }

    pub fn trigger_names(&self) -> Vec<String> {
        self.rules.trigger_names()
    }

    pub fn action_names(&self) -> Vec<String> {
        self.rules.action_names()
    }

    // ---- chain links ----

    /// Compose registered trigger/action names and a condition into a chain link
    pub async fn compose_workflow(
        &self,
        name: &str,
        trigger_names: &[String],
        condition: ConditionFn,
        action_names: &[String],
        api_id: u64,
    ) -> Result<ChainLink> {
        self.composer
            .compose(name, trigger_names, condition, action_names, api_id)
            .await
    }

    pub async fn get_workflow(&self, id: u64) -> Result<Option<ChainLink>> {
        self.store.get(id).await
    }

    /// All chain link records, in id order
    pub async fn list_workflows(&self) -> Result<Vec<ChainLink>> {
        self.store.list().await
    }

    pub async fn set_workflow_status(&self, id: u64, status: ChainLinkStatus) -> Result<ChainLink> {
        self.store.set_status(id, status).await
    }

    /// Delete a chain link record and drop its executable binding
    pub async fn delete_workflow(&self, id: u64) -> Result<bool> {
        let deleted = self.store.delete(id).await?;
        if deleted {
            self.composer.remove_binding(id);
        }
        Ok(deleted)
    }

    /// Execute a chain link: concurrent triggers, one condition evaluation,
    /// concurrent actions
    pub async fn run_workflow(&self, id: u64) -> Result<RunReport> {
        self.executor.run(id).await
    }

    /// Diagnostic run against the chain link's live API connection
    pub async fn test_workflow(&self, id: u64) -> Result<TestReport> {
        self.executor.test(id).await
    }
}

impl Default for AutomationEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// Convenience re-export so condition closures can be written inline at the
/// facade level without importing the rules module
pub fn condition<F>(f: F) -> ConditionFn
where
    F: Fn(&[Value]) -> bool + Send + Sync + 'static,
{
    RuleRegistry::condition(f)
}
