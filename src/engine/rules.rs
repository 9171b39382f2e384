// Rule registry - named executable triggers and actions

//! # Rule Registry
//!
//! The hosting application contributes executable units here, independent of
//! any specific API connection:
//!
//! - a **trigger** is a zero-argument producer that asynchronously yields a
//!   JSON value representing "something happened"
//! - an **action** consumes such a value and performs a side effect
//!
//! Names are unique within their kind; registering under an existing name
//! overwrites it (last writer wins, no versioning). Resolution of an unknown
//! name is a named-lookup error, never a silent substitution.
//!
//! ## Rust Learning Notes:
//!
//! ### Boxed Async Closures
//! Async closures can't be named directly, so the registry stores
//! `Arc<dyn Fn() -> BoxFuture<...>>`. The [`RuleRegistry::trigger`] and
//! [`RuleRegistry::action`] helpers wrap an ordinary `async fn` (or closure
//! returning a future) into that shape, so callers never spell the boxed
//! type themselves.

use std::future::Future;
use std::sync::Arc;

use dashmap::DashMap;
use futures::future::BoxFuture;
use serde_json::Value;
use tracing::debug;

use crate::{ChainReactorError, Result};

/// A registered trigger: produces a value asynchronously with no input
pub type TriggerFn = Arc<dyn Fn() -> BoxFuture<'static, Result<Value>> + Send + Sync>;

/// A registered action: consumes a trigger value and performs a side effect
pub type ActionFn = Arc<dyn Fn(Value) -> BoxFuture<'static, Result<()>> + Send + Sync>;

/// A workflow condition: a predicate over the ordered array of trigger
/// results, one slot per bound trigger
pub type ConditionFn = Arc<dyn Fn(&[Value]) -> bool + Send + Sync>;

/// Registry of named trigger and action functions
///
/// Shared freely across tasks; both maps are concurrent and every stored
/// function is an `Arc` handed out by clone on resolution.
pub struct RuleRegistry {
    triggers: DashMap<String, TriggerFn>,
    actions: DashMap<String, ActionFn>,
}

impl RuleRegistry {
    pub fn new() -> Self {
        Self {
            triggers: DashMap::new(),
            actions: DashMap::new(),
        }
    }

    /// Wrap an async producer into a storable [`TriggerFn`]
    pub fn trigger<F, Fut>(f: F) -> TriggerFn
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value>> + Send + 'static,
    {
        Arc::new(move || Box::pin(f()))
    }

    /// Wrap an async consumer into a storable [`ActionFn`]
    pub fn action<F, Fut>(f: F) -> ActionFn
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        Arc::new(move |value| Box::pin(f(value)))
    }

    /// Wrap a plain predicate into a storable [`ConditionFn`]
    pub fn condition<F>(f: F) -> ConditionFn
    where
        F: Fn(&[Value]) -> bool + Send + Sync + 'static,
    {
        Arc::new(f)
    }

    /// Register a trigger under a name
    ///
    /// Re-registration under the same name overwrites (last writer wins).
    ///
    /// ## Errors
    /// `InvalidInput` when the name is empty.
    pub fn register_trigger(&self, name: impl Into<String>, f: TriggerFn) -> Result<()> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(ChainReactorError::InvalidInput(
                "trigger name must be non-empty".to_string(),
            ));
        }
        debug!(name = %name, "trigger registered");
        self.triggers.insert(name, f);
        Ok(())
    }

    /// Register an action under a name (same constraints as triggers)
    pub fn register_action(&self, name: impl Into<String>, f: ActionFn) -> Result<()> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(ChainReactorError::InvalidInput(
                "action name must be non-empty".to_string(),
            ));
        }
        debug!(name = %name, "action registered");
        self.actions.insert(name, f);
        Ok(())
    }

    /// Resolve a trigger by name
    ///
    /// ## Errors
    /// `UnknownTrigger` naming the missing identifier.
    pub fn resolve_trigger(&self, name: &str) -> Result<TriggerFn> {
        self.triggers
            .get(name)
            .map(|entry| entry.clone())
            .ok_or_else(|| ChainReactorError::UnknownTrigger {
                name: name.to_string(),
            })
    }

    /// Resolve an action by name
    ///
    /// ## Errors
    /// `UnknownAction` naming the missing identifier.
    pub fn resolve_action(&self, name: &str) -> Result<ActionFn> {
        self.actions
            .get(name)
            .map(|entry| entry.clone())
            .ok_or_else(|| ChainReactorError::UnknownAction {
                name: name.to_string(),
            })
    }

    /// All registered trigger names, sorted
    pub fn trigger_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.triggers.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    /// All registered action names, sorted
    pub fn action_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.actions.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }
}

impl Default for RuleRegistry {
    fn default() -> Self {
        Self::new()
    }
}
