// Workflow composer - binds registered names into an executable chain link

//! # Workflow Composer
//!
//! Composition turns names into a runnable workflow: one or more registered
//! trigger names, a single condition predicate over the ordered array of
//! their results, and one or more registered action names, tied to an owning
//! API connection.
//!
//! Resolution is **eager and fail-fast**: every trigger and action name is
//! resolved through the [`RuleRegistry`] at composition time, and any unknown
//! name aborts the whole composition with an error naming the missing
//! identifier - no partial workflow is ever registered, in storage or in the
//! binding table. The owning connection id is likewise validated at
//! composition time (and re-validated by the executor at run time, since the
//! connection can be deleted afterwards).
//!
//! The declarative [`ChainLink`] record lands in storage; the executable
//! closures stay here in the binding table, keyed by the same id.

use std::sync::Arc;

use dashmap::DashMap;
use tracing::info;

use crate::engine::chain_links::ChainLinkStorage;
use crate::engine::connections::ConnectionRegistry;
use crate::engine::rules::{ActionFn, ConditionFn, RuleRegistry, TriggerFn};
use crate::models::ChainLink;
use crate::{ChainReactorError, Result};

/// The executable side of a composed chain link
///
/// Triggers and actions keep their registered names alongside the closures
/// so failures can be attributed by identifier.
#[derive(Clone)]
pub struct ComposedWorkflow {
    pub chain_link_id: u64,
    /// Resolved triggers in composition order; the condition sees one result
    /// slot per entry, in this order
    pub triggers: Vec<(String, TriggerFn)>,
    pub condition: ConditionFn,
    pub actions: Vec<(String, ActionFn)>,
}

/// Composes registered trigger/action names into executable chain links
pub struct WorkflowComposer {
    rules: Arc<RuleRegistry>,
    connections: Arc<ConnectionRegistry>,
    store: Arc<dyn ChainLinkStorage>,
    bindings: DashMap<u64, ComposedWorkflow>,
}

impl WorkflowComposer {
    pub fn new(
        rules: Arc<RuleRegistry>,
        connections: Arc<ConnectionRegistry>,
        store: Arc<dyn ChainLinkStorage>,
    ) -> Self {
        Self {
            rules,
            connections,
            store,
            bindings: DashMap::new(),
        }
    }

    /// Compose a chain link
    ///
    /// ## Errors
    /// - `InvalidInput` when name, triggers or actions are empty
    /// - `UnknownTrigger` / `UnknownAction` naming the first unresolvable
    ///   identifier (nothing is stored)
    /// - `ConnectionNotFound` when `api_id` does not exist at composition time
    pub async fn compose(
        &self,
        name: &str,
        trigger_names: &[String],
        condition: ConditionFn,
        action_names: &[String],
        api_id: u64,
    ) -> Result<ChainLink> {
        if name.trim().is_empty() {
            return Err(ChainReactorError::InvalidInput(
                "chain link name is required".to_string(),
            ));
        }
        if trigger_names.is_empty() {
            return Err(ChainReactorError::InvalidInput(
                "at least one trigger is required".to_string(),
            ));
        }
        if action_names.is_empty() {
            return Err(ChainReactorError::InvalidInput(
                "at least one action is required".to_string(),
            ));
        }

        // Resolve everything before touching any state
        let triggers: Vec<(String, TriggerFn)> = trigger_names
            .iter()
            .map(|n| Ok((n.clone(), self.rules.resolve_trigger(n)?)))
            .collect::<Result<_>>()?;
        let actions: Vec<(String, ActionFn)> = action_names
            .iter()
            .map(|n| Ok((n.clone(), self.rules.resolve_action(n)?)))
            .collect::<Result<_>>()?;

        if !self.connections.contains(api_id) {
            return Err(ChainReactorError::ConnectionNotFound { id: api_id });
        }

        let link = self
            .store
            .create(name, trigger_names.to_vec(), action_names.to_vec(), api_id)
            .await?;

        self.bindings.insert(
            link.id,
            ComposedWorkflow {
                chain_link_id: link.id,
                triggers,
                condition,
                actions,
            },
        );

        info!(
            id = link.id,
            name = %link.name,
            triggers = link.triggers.len(),
            actions = link.actions.len(),
            api_id,
            "workflow composed"
        );

        Ok(link)
    }

    /// Fetch the executable bindings for a chain link
    pub fn binding(&self, chain_link_id: u64) -> Option<ComposedWorkflow> {
        self.bindings.get(&chain_link_id).map(|entry| entry.clone())
    }

    /// Drop the executable bindings for a deleted chain link
    pub fn remove_binding(&self, chain_link_id: u64) {
        self.bindings.remove(&chain_link_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::chain_links::InMemoryChainLinkStore;
    use crate::models::{ApiConnection, AuthShape, ConnectionStatus};
    use serde_json::json;

    fn fixture() -> (Arc<RuleRegistry>, Arc<ConnectionRegistry>, WorkflowComposer, u64) {
        let rules = Arc::new(RuleRegistry::new());
        let connections = Arc::new(ConnectionRegistry::new());
        let store: Arc<dyn ChainLinkStorage> = Arc::new(InMemoryChainLinkStore::new());

        // Seed a connection without probing; negotiation is covered elsewhere
        let api_id = connections.seed_for_tests(ApiConnection {
            id: 0,
            name: "Weather".to_string(),
            base_url: "https://api.example.com".to_string(),
            secret: "k".to_string(),
            webhook_url: None,
            auth_shape: AuthShape::AppIdQuery,
            events: vec![],
            actions: vec![],
            status: ConnectionStatus::Active,
        });

        let composer = WorkflowComposer::new(rules.clone(), connections.clone(), store);
        (rules, connections, composer, api_id)
    }

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|n| n.to_string()).collect()
    }

    #[tokio::test]
    async fn test_compose_resolves_and_stores() {
        let (rules, _connections, composer, api_id) = fixture();
        rules
            .register_trigger("rain", RuleRegistry::trigger(|| async { Ok(json!(5)) }))
            .unwrap();
        rules
            .register_action("notify", RuleRegistry::action(|_| async { Ok(()) }))
            .unwrap();

        let link = composer
            .compose(
                "rain-alert",
                &names(&["rain"]),
                RuleRegistry::condition(|results| results[0].as_i64().unwrap_or(0) > 0),
                &names(&["notify"]),
                api_id,
            )
            .await
            .unwrap();

        assert_eq!(link.triggers, vec!["rain"]);
        assert_eq!(link.api_id, api_id);

        let binding = composer.binding(link.id).expect("binding stored");
        assert_eq!(binding.triggers.len(), 1);
        assert_eq!(binding.triggers[0].0, "rain");
    }

    #[tokio::test]
    async fn test_unknown_trigger_leaves_no_partial_state() {
        let (rules, _connections, composer, api_id) = fixture();
        rules
            .register_action("notify", RuleRegistry::action(|_| async { Ok(()) }))
            .unwrap();

        let err = composer
            .compose(
                "broken",
                &names(&["never_registered"]),
                RuleRegistry::condition(|_| true),
                &names(&["notify"]),
                api_id,
            )
            .await
            .expect_err("unknown trigger must abort");

        match err {
            ChainReactorError::UnknownTrigger { name } => assert_eq!(name, "never_registered"),
            other => panic!("expected UnknownTrigger, got {other}"),
        }
        assert!(composer.binding(1).is_none());
        assert!(composer.store.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_connection_aborts() {
        let (rules, _connections, composer, _api_id) = fixture();
        rules
            .register_trigger("t", RuleRegistry::trigger(|| async { Ok(json!(null)) }))
            .unwrap();
        rules
            .register_action("a", RuleRegistry::action(|_| async { Ok(()) }))
            .unwrap();

        let err = composer
            .compose(
                "dangling",
                &names(&["t"]),
                RuleRegistry::condition(|_| true),
                &names(&["a"]),
                999,
            )
            .await
            .expect_err("connection must exist at composition time");
        assert!(matches!(
            err,
            ChainReactorError::ConnectionNotFound { id: 999 }
        ));
    }

    #[tokio::test]
    async fn test_empty_bindings_rejected() {
        let (_rules, _connections, composer, api_id) = fixture();

        let err = composer
            .compose(
                "no-triggers",
                &[],
                RuleRegistry::condition(|_| true),
                &names(&["a"]),
                api_id,
            )
            .await
            .expect_err("empty trigger list");
        assert!(matches!(err, ChainReactorError::InvalidInput(_)));
    }
}
