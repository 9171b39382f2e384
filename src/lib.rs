// Chain Reactor - Rust Edition
// An IFTTT-style automation core: negotiate credentials against third-party
// HTTP APIs, discover their capabilities, and chain them into automation rules

//! # Chain Reactor Library
//!
//! This is the main library crate for Chain Reactor, an automation engine that
//! connects arbitrary third-party HTTP APIs and composes their capabilities
//! into "chain links" of the form *when trigger T satisfies condition C,
//! perform action X*. This file serves as the **library root** and defines the
//! public API that external crates can use.
//!
//! ## Core Components
//!
//! ### Domain Models
//! - [`ApiConnection`]: A negotiated third-party API (credential, capabilities, health)
//! - [`AuthShape`]: The credential encoding a probed API accepted
//! - [`CapabilityDescriptor`]: A single trigger or action an API exposes
//! - [`ChainLink`]: The persisted declarative record of a composed workflow
//!
//! ### Engine
//!
//! - [`CredentialProbe`]: tries a fixed ordered list of six credential
//!   encodings against an unknown API until one yields HTTP 200
//! - [`CapabilityDiscoverer`]: probes conventional discovery paths and falls
//!   back to keyword inference from the raw API response; never fails outright
//! - [`ConnectionRegistry`]: owns the registered connections that the probe
//!   and discoverer populate and the executor reads
//! - [`RuleRegistry`]: named executable trigger producers and action consumers
//!   contributed by the hosting application
//! - [`WorkflowComposer`]: binds registered trigger/action names plus a
//!   condition predicate into an addressable chain link (fail-fast resolution)
//! - [`WorkflowExecutor`]: runs a chain link (concurrent triggers, single
//!   condition evaluation, concurrent actions) or tests it against the live
//!   connection with phase-attributed diagnostics
//! - [`AutomationEngine`]: the facade wiring all of the above together
//!
//! ## Execution Semantics
//!
//! All bound triggers run concurrently and are joined all-or-nothing: a single
//! failing trigger aborts the run and the condition is never evaluated on
//! partial results. When the condition holds, every bound action runs
//! concurrently with per-action outcome reporting and no rollback.
//!
//! ## Rust Learning Notes:
//!
//! ### Module System
//! Rust organizes code into modules. Each `mod` declaration tells Rust to include
//! code from either a `.rs` file or a directory with a `mod.rs` file.
//!
//! ### Re-exports
//! `pub use` statements create shortcuts so users don't need to know the internal
//! module structure. Instead of `use chain_reactor::models::connection::ApiConnection`,
//! users can write `use chain_reactor::ApiConnection`.

// Core domain models (language-agnostic)
pub mod models;

// Engine implementations (probe, discovery, registries, composer, executor)
pub mod engine;

// Re-export core domain types for easy access
// This creates a "flat" API - users can import directly from the crate root
pub use models::{
    ApiConnection,        // A negotiated third-party API connection
    AuthShape,            // Which credential encoding the API accepted
    CapabilityDescriptor, // A single discovered trigger or action
    ChainLink,            // Declarative record of a composed workflow
    ChainLinkStatus,      // active / inactive
    ConnectionStatus,     // active / inactive
    ConnectionSummary,    // {id, name, status} projection for listings
    NewConnection,        // Registration request for a connection
    RunRecord,            // Last-run bookkeeping on a chain link
};

// Re-export engine types for convenience
pub use engine::{
    chain_links::{ChainLinkStorage, InMemoryChainLinkStore},
    composer::{ComposedWorkflow, WorkflowComposer},
    connections::ConnectionRegistry,
    discovery::{CapabilityDiscoverer, DiscoveredCapabilities},
    executor::{ActionOutcome, RunOutcome, RunReport, TestReport, WorkflowExecutor},
    probe::{CredentialProbe, ProbeConfig, ProbeOutcome},
    rules::{ActionFn, ConditionFn, RuleRegistry, TriggerFn},
    AutomationEngine,
};

// Core error types
// Using the `thiserror` crate to make error handling easier
use thiserror::Error;

/// Which phase of a diagnostic test broke
///
/// `test_workflow` issues a real trigger call and then a real action call
/// against the owning connection; failures carry this attribution so the
/// caller knows which leg of the chain to look at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TestPhase {
    Trigger,
    Action,
}

impl std::fmt::Display for TestPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TestPhase::Trigger => write!(f, "trigger"),
            TestPhase::Action => write!(f, "action"),
        }
    }
}

/// Custom error types for Chain Reactor operations
///
/// ## Rust Learning Notes:
///
/// ### Error Handling in Rust
/// Rust doesn't have exceptions. Instead, it uses `Result<T, E>` types where:
/// - `Ok(value)` represents success
/// - `Err(error)` represents failure
///
/// ### The `thiserror` Crate
/// - `#[derive(Error)]` implements the `std::error::Error` trait
/// - `#[error("...")]` provides human-readable error messages
/// - `#[from]` enables automatic conversion from other error types
#[derive(Error, Debug)]
pub enum ChainReactorError {
    /// All six credential encodings failed against the probed API.
    /// `attempts` carries one line per shape describing what happened.
    #[error("no authentication method worked for {url}: {}", .attempts.join("; "))]
    AuthExhausted { url: String, attempts: Vec<String> },

    /// A composition or execution referenced a trigger name that was
    /// never registered
    #[error("trigger not found: {name}")]
    UnknownTrigger { name: String },

    /// A composition or execution referenced an action name that was
    /// never registered
    #[error("action not found: {name}")]
    UnknownAction { name: String },

    /// Error when an API connection cannot be found
    #[error("API connection not found: {id}")]
    ConnectionNotFound { id: u64 },

    /// Error when a chain link cannot be found
    #[error("chain link not found: {id}")]
    ChainLinkNotFound { id: u64 },

    /// A chain link record exists but carries no executable bindings
    /// (its composer entry was removed out from under it)
    #[error("chain link {id} has no executable binding")]
    NotComposed { id: u64 },

    /// A trigger rejected during a concurrent run; the whole run aborts
    /// and the condition is never evaluated on partial results
    #[error("trigger '{name}' failed: {reason}")]
    TriggerFailed { name: String, reason: String },

    /// An action rejected during execution; reported per-action, already
    /// completed actions are not rolled back
    #[error("action '{name}' failed: {reason}")]
    ActionFailed { name: String, reason: String },

    /// A diagnostic test broke, with phase attribution (trigger vs action)
    #[error("{phase} test failed: {reason}")]
    TestFailed { phase: TestPhase, reason: String },

    /// Error when invalid input is provided
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A base URL or discovery path could not be parsed
    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Outbound HTTP transport errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization errors
    /// Also uses `#[from]` for automatic conversion
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Internal errors
    /// Using anyhow::Error for flexible wrapping of one-off failures
    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

/// Type alias for Results that use our custom error type
///
/// Instead of writing `std::result::Result<ChainLink, ChainReactorError>`
/// everywhere, we can just write `Result<ChainLink>`.
pub type Result<T> = std::result::Result<T, ChainReactorError>;
