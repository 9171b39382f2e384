// Workflow executor - runs and tests composed chain links

//! # Workflow Executor
//!
//! Two entry points, both explicit and both returning structured results
//! (nothing here is fire-and-forget):
//!
//! - [`WorkflowExecutor::run`] executes a chain link's registered bindings:
//!   all bound triggers launch concurrently and are joined all-or-nothing, the
//!   condition is applied once to the full ordered result array, and when it
//!   holds every bound action runs concurrently. A single failing trigger
//!   aborts the run before the condition is ever evaluated; action failures
//!   are reported per-action with no rollback of already-completed actions.
//!
//! - [`WorkflowExecutor::test`] is the diagnostic path. Instead of the
//!   abstract bindings it re-derives concrete HTTP calls from the chain
//!   link's dotted capability identifiers (`"<type>.<command>"`), issues them
//!   against the owning connection with its negotiated auth shape, and
//!   reports structured per-phase results. Any non-2xx response or transport
//!   error aborts immediately with phase attribution; `test` never retries.
//!
//! ## Endpoint mapping
//!
//! The dotted identifier is dispatched through a fixed mapping table rather
//! than string branching scattered through the call sites:
//!
//! | identifier        | call                                   |
//! |-------------------|----------------------------------------|
//! | `weather.*`       | `GET /data/2.5/weather?q=...` (trigger) |
//! | `<type>.<cmd>`    | `GET /api/<type>/<cmd>` (trigger default) |
//! | `notification.*`  | `POST /notify` (action)                |
//! | `email.*`         | `POST /email` (action)                 |
//! | `<type>.<cmd>`    | `POST /<cmd>` (action default)         |
//!
//! The negotiated credential shape is applied by the same helper the probe
//! uses, so a connection negotiated with (say) the `appid` query convention
//! tests with its secret in exactly that position.

use std::sync::Arc;

use futures::future::{join_all, try_join_all};
use reqwest::{Client, Method};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{debug, info, warn};
use url::Url;
use uuid::Uuid;

use crate::engine::chain_links::ChainLinkStorage;
use crate::engine::composer::WorkflowComposer;
use crate::engine::connections::ConnectionRegistry;
use crate::engine::probe::{apply_auth, json_headers, ProbeConfig};
use crate::models::{ApiConnection, ChainLink, RunRecord};
use crate::{ChainReactorError, Result, TestPhase};

/// Per-action result from a fired run
#[derive(Debug, Clone, Serialize)]
pub struct ActionOutcome {
    pub name: String,
    pub success: bool,
    pub error: Option<String>,
}

/// What a run did
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RunOutcome {
    /// The chain link is inactive; nothing was invoked
    Skipped,
    /// All triggers settled but the condition did not hold; no action ran
    ConditionNotMet,
    /// The condition held and every action was invoked
    Fired { actions: Vec<ActionOutcome> },
}

/// Structured result of [`WorkflowExecutor::run`]
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub chain_link_id: u64,
    #[serde(flatten)]
    pub outcome: RunOutcome,
}

/// Structured result of [`WorkflowExecutor::test`]
#[derive(Debug, Clone, Serialize)]
pub struct TestReport {
    pub run_id: Uuid,
    pub chain_link_id: u64,
    pub trigger_result: Value,
    pub action_result: Value,
}

/// How a dotted capability identifier maps onto a concrete HTTP call
struct MappedCall {
    method: Method,
    path: String,
    query: Vec<(&'static str, String)>,
    /// The identifier's `<type>` prefix, used to tag the structured result
    kind: String,
}

/// Split `"<type>.<command>"`; a bare identifier has no type prefix
fn split_identifier(identifier: &str) -> (&str, &str) {
    identifier.split_once('.').unwrap_or(("", identifier))
}

/// Trigger mapping table: identifier prefix → GET call
fn map_trigger(identifier: &str) -> MappedCall {
    let (kind, command) = split_identifier(identifier);
    match kind {
        "weather" => MappedCall {
            method: Method::GET,
            path: "/data/2.5/weather".to_string(),
            query: vec![("q", "London".to_string())],
            kind: kind.to_string(),
        },
        // Declared default: conventional REST shape
        "" => MappedCall {
            method: Method::GET,
            path: format!("/api/{}", command),
            query: Vec::new(),
            kind: command.to_string(),
        },
        _ => MappedCall {
            method: Method::GET,
            path: format!("/api/{}/{}", kind, command),
            query: Vec::new(),
            kind: kind.to_string(),
        },
    }
}

/// Action mapping table: identifier prefix → POST call
fn map_action(identifier: &str) -> MappedCall {
    let (kind, command) = split_identifier(identifier);
    match kind {
        "notification" => MappedCall {
            method: Method::POST,
            path: "/notify".to_string(),
            query: Vec::new(),
            kind: kind.to_string(),
        },
        "email" => MappedCall {
            method: Method::POST,
            path: "/email".to_string(),
            query: Vec::new(),
            kind: kind.to_string(),
        },
        _ => MappedCall {
            method: Method::POST,
            path: format!("/{}", command),
            query: Vec::new(),
            kind: if kind.is_empty() {
                command.to_string()
            } else {
                kind.to_string()
            },
        },
    }
}

/// JSON body sent with a test-mode action call
fn action_body(identifier: &str, link_name: &str, trigger_result: &Value) -> Value {
    let (kind, _) = split_identifier(identifier);
    match kind {
        "notification" => json!({
            "message": format!("Chain link '{}' test notification", link_name),
            "trigger": trigger_result,
        }),
        "email" => json!({
            "subject": format!("Chain link '{}' test", link_name),
            "body": trigger_result,
        }),
        _ => json!({
            "test": true,
            "trigger": trigger_result,
        }),
    }
}

/// Runs and tests composed chain links
pub struct WorkflowExecutor {
    composer: Arc<WorkflowComposer>,
    store: Arc<dyn ChainLinkStorage>,
    connections: Arc<ConnectionRegistry>,
    client: Client,
    config: ProbeConfig,
}

impl WorkflowExecutor {
    pub fn new(
        composer: Arc<WorkflowComposer>,
        store: Arc<dyn ChainLinkStorage>,
        connections: Arc<ConnectionRegistry>,
        config: ProbeConfig,
    ) -> Self {
        Self {
            composer,
            store,
            connections,
            client: Client::new(),
            config,
        }
    }

    /// Execute a chain link's registered bindings
    ///
    /// ## Errors
    /// - `ChainLinkNotFound` when the id does not exist
    /// - `NotComposed` when the record has no executable binding
    /// - `TriggerFailed` when any trigger rejects (the run aborts; the
    ///   condition never sees partial results)
    ///
    /// Action failures do NOT error the call; they come back per-action in
    /// the report, since completed side effects are not rolled back.
    pub async fn run(&self, chain_link_id: u64) -> Result<RunReport> {
        let run_id = Uuid::new_v4();
        let link = self
            .store
            .get(chain_link_id)
            .await?
            .ok_or(ChainReactorError::ChainLinkNotFound { id: chain_link_id })?;

        if !link.is_active() {
            info!(id = chain_link_id, "chain link inactive, run skipped");
            return Ok(RunReport {
                run_id,
                chain_link_id,
                outcome: RunOutcome::Skipped,
            });
        }

        let binding = self
            .composer
            .binding(chain_link_id)
            .ok_or(ChainReactorError::NotComposed { id: chain_link_id })?;

        // All triggers launch together; the join is all-or-nothing
        let trigger_futures = binding.triggers.iter().map(|(name, f)| {
            let name = name.clone();
            let fut = f();
            async move {
                fut.await.map_err(|err| ChainReactorError::TriggerFailed {
                    name,
                    reason: err.to_string(),
                })
            }
        });

        let results = match try_join_all(trigger_futures).await {
            Ok(results) => results,
            Err(err) => {
                warn!(id = chain_link_id, error = %err, "trigger batch aborted");
                self.store
                    .record_run(chain_link_id, RunRecord::failure(err.to_string()))
                    .await?;
                return Err(err);
            }
        };

        if !(binding.condition)(&results) {
            debug!(id = chain_link_id, "condition not met");
            // Still a completed run: the triggers all settled and nothing
            // errored, so the bookkeeping records a success
            self.store
                .record_run(chain_link_id, RunRecord::success())
                .await?;
            return Ok(RunReport {
                run_id,
                chain_link_id,
                outcome: RunOutcome::ConditionNotMet,
            });
        }

        // A single trigger hands its bare result to actions; multiple
        // triggers hand over the full ordered array
        let payload = if results.len() == 1 {
            results[0].clone()
        } else {
            Value::Array(results)
        };

        let action_futures = binding.actions.iter().map(|(name, f)| {
            let name = name.clone();
            let fut = f(payload.clone());
            async move {
                match fut.await {
                    Ok(()) => ActionOutcome {
                        name,
                        success: true,
                        error: None,
                    },
                    Err(err) => {
                        let wrapped = ChainReactorError::ActionFailed {
                            name: name.clone(),
                            reason: err.to_string(),
                        };
                        warn!(action = %name, error = %wrapped, "action failed");
                        ActionOutcome {
                            name,
                            success: false,
                            error: Some(wrapped.to_string()),
                        }
                    }
                }
            }
        });

        let actions = join_all(action_futures).await;
        let success = actions.iter().all(|outcome| outcome.success);
        let record = if success {
            RunRecord::success()
        } else {
            let first_error = actions
                .iter()
                .find_map(|outcome| outcome.error.clone())
                .unwrap_or_else(|| "action failed".to_string());
            RunRecord::failure(first_error)
        };
        self.store.record_run(chain_link_id, record).await?;

        info!(id = chain_link_id, %run_id, success, "chain link fired");
        Ok(RunReport {
            run_id,
            chain_link_id,
            outcome: RunOutcome::Fired { actions },
        })
    }

    /// Test a chain link against its live API connection
    ///
    /// Issues a real trigger call and then a real action call derived from
    /// the chain link's dotted identifiers. Never retries.
    ///
    /// ## Errors
    /// - `ChainLinkNotFound` / `ConnectionNotFound` on dangling references
    ///   (the connection is re-validated here, not trusted from composition
    ///   time)
    /// - `TestFailed` with phase attribution on any non-2xx response or
    ///   transport error
    pub async fn test(&self, chain_link_id: u64) -> Result<TestReport> {
        let link = self
            .store
            .get(chain_link_id)
            .await?
            .ok_or(ChainReactorError::ChainLinkNotFound { id: chain_link_id })?;
        let connection = self.connections.get(link.api_id)?;

        let result = self.test_impl(&link, &connection).await;

        let record = match &result {
            Ok(_) => RunRecord::success(),
            Err(err) => RunRecord::failure(err.to_string()),
        };
        self.store.record_run(chain_link_id, record).await?;

        result
    }

    async fn test_impl(&self, link: &ChainLink, connection: &ApiConnection) -> Result<TestReport> {
        let trigger_id = link.triggers.first().ok_or_else(|| {
            ChainReactorError::InvalidInput("chain link binds no trigger".to_string())
        })?;
        let action_id = link.actions.first().ok_or_else(|| {
            ChainReactorError::InvalidInput("chain link binds no action".to_string())
        })?;

        let trigger_call = map_trigger(trigger_id);
        let (status, data) = self
            .call_mapped(connection, &trigger_call, None, TestPhase::Trigger)
            .await?;
        let trigger_result = json!({
            "type": format!("{}_test", trigger_call.kind),
            "endpoint": trigger_call.path,
            "status": status,
            "data": data,
        });
        debug!(id = link.id, endpoint = %trigger_call.path, status, "trigger test passed");

        let action_call = map_action(action_id);
        let body = action_body(action_id, &link.name, &trigger_result);
        let (status, data) = self
            .call_mapped(connection, &action_call, Some(body), TestPhase::Action)
            .await?;
        let action_result = json!({
            "type": format!("{}_test", action_call.kind),
            "endpoint": action_call.path,
            "status": status,
            "data": data,
        });

        info!(id = link.id, "chain link test passed");
        Ok(TestReport {
            run_id: Uuid::new_v4(),
            chain_link_id: link.id,
            trigger_result,
            action_result,
        })
    }

    /// Issue one mapped call against the connection, with the negotiated
    /// auth shape applied and failures attributed to `phase`
    async fn call_mapped(
        &self,
        connection: &ApiConnection,
        call: &MappedCall,
        body: Option<Value>,
        phase: TestPhase,
    ) -> Result<(u16, Value)> {
        let base = Url::parse(&connection.base_url)?;
        let url = base.join(&call.path)?;

        let mut request = self
            .client
            .request(call.method.clone(), url)
            .headers(json_headers())
            .timeout(self.config.request_timeout);
        if !call.query.is_empty() {
            request = request.query(&call.query);
        }
        request = apply_auth(connection.auth_shape, request, &connection.secret);
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request
            .send()
            .await
            .map_err(|err| ChainReactorError::TestFailed {
                phase,
                reason: err.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ChainReactorError::TestFailed {
                phase,
                reason: format!("HTTP {} from {}", status.as_u16(), call.path),
            });
        }

        let data = response
            .json::<Value>()
            .await
            .unwrap_or(Value::Null);
        Ok((status.as_u16(), data))
    }
}
