// Chain link records - the declarative side of a composed workflow

//! # Chain Link Records
//!
//! A [`ChainLink`] is the persisted, declarative description of a workflow:
//! its name, which registered trigger and action names it binds, which API
//! connection it belongs to, and its status. The executable closures live in
//! the composer's binding table; the record here is the control-plane
//! bookkeeping that listings and the executor's lookups consume.
//!
//! Records also carry a [`RunRecord`] updated by the executor after every run
//! or test, so a caller can see when a chain link last fired and whether it
//! succeeded.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Whether a chain link participates in execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChainLinkStatus {
    Active,
    Inactive,
}

impl std::fmt::Display for ChainLinkStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChainLinkStatus::Active => write!(f, "active"),
            ChainLinkStatus::Inactive => write!(f, "inactive"),
        }
    }
}

/// Bookkeeping from the most recent run or test of a chain link
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunRecord {
    /// When the run finished
    pub ran_at: DateTime<Utc>,
    /// Whether every phase of the run succeeded
    pub success: bool,
    /// The surfaced failure message, if any
    pub error: Option<String>,
}

impl RunRecord {
    pub fn success() -> Self {
        Self {
            ran_at: Utc::now(),
            success: true,
            error: None,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            ran_at: Utc::now(),
            success: false,
            error: Some(error.into()),
        }
    }
}

/// The persisted record of a composed workflow
///
/// Ids are assigned by the store from a never-reused counter. The owning
/// `api_id` is validated at composition time only; deleting the connection
/// later leaves this record dangling, and the executor reports
/// `ConnectionNotFound` when it re-validates at run/test time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainLink {
    /// Unique identifier, never reused after deletion
    pub id: u64,
    /// Display name supplied at composition
    pub name: String,
    /// Bound trigger names, in composition order (the condition sees one
    /// result slot per entry, in this order)
    pub triggers: Vec<String>,
    /// Bound action names, in composition order
    pub actions: Vec<String>,
    /// The owning API connection
    pub api_id: u64,
    /// Whether the executor will run this chain link
    pub status: ChainLinkStatus,
    /// When the chain link was composed
    pub created: DateTime<Utc>,
    /// Outcome of the most recent run or test, if any
    pub last_run: Option<RunRecord>,
}

impl ChainLink {
    /// Create a new active chain link record
    pub fn new(
        id: u64,
        name: impl Into<String>,
        triggers: Vec<String>,
        actions: Vec<String>,
        api_id: u64,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            triggers,
            actions,
            api_id,
            status: ChainLinkStatus::Active,
            created: Utc::now(),
            last_run: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == ChainLinkStatus::Active
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_chain_link_is_active() {
        let link = ChainLink::new(
            1,
            "rain-alert",
            vec!["weather_change".to_string()],
            vec!["send_notification".to_string()],
            7,
        );

        assert!(link.is_active());
        assert_eq!(link.api_id, 7);
        assert!(link.last_run.is_none());
        assert_eq!(link.triggers, vec!["weather_change"]);
    }

    #[test]
    fn test_run_records() {
        let ok = RunRecord::success();
        assert!(ok.success);
        assert!(ok.error.is_none());

        let failed = RunRecord::failure("trigger 'weather_change' failed: boom");
        assert!(!failed.success);
        assert_eq!(
            failed.error.as_deref(),
            Some("trigger 'weather_change' failed: boom")
        );
    }
}
