// Core domain models for Chain Reactor
// These are the generic, serialization-friendly data structures

//! # Domain Models Module
//!
//! This module contains the core domain models for Chain Reactor. These are
//! plain data structures with no I/O of their own - the engine modules do the
//! probing, discovery and execution against them.
//!
//! ## Rust Learning Notes:
//!
//! ### Module Organization
//! This `mod.rs` file serves as the **module root** for the `models` directory.
//! Each `pub mod` declaration includes a `.rs` file from the same directory as
//! a publicly accessible submodule.
//!
//! ### Re-exports for Clean APIs
//! The `pub use` statements at the bottom create a clean, flat API.
//! Users can import `use chain_reactor::models::ApiConnection` instead of
//! `use chain_reactor::models::connection::ApiConnection`.

// Declares the `connection` submodule from `connection.rs`
// Contains ApiConnection, AuthShape and the discovered capability descriptors
pub mod connection;

// Declares the `chain_link` submodule from `chain_link.rs`
// Contains ChainLink - the declarative record of a composed workflow
pub mod chain_link;

/// Re-export connection types
/// - ApiConnection: A negotiated third-party API connection
/// - AuthShape: The credential encoding the API accepted during probing
/// - CapabilityDescriptor: A single trigger or action the API exposes
/// - ConnectionStatus: Health of the connection (active/inactive)
/// - ConnectionSummary: The {id, name, status} projection used by listings
/// - NewConnection: Registration request payload
pub use connection::{
    ApiConnection, AuthShape, CapabilityDescriptor, ConnectionStatus, ConnectionSummary,
    NewConnection,
};

/// Re-export chain link types
/// - ChainLink: Persisted workflow record (name, triggers, actions, owning API)
/// - ChainLinkStatus: active / inactive
/// - RunRecord: Bookkeeping from the most recent run or test
pub use chain_link::{ChainLink, ChainLinkStatus, RunRecord};
