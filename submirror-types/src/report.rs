use crate::error::RunError;
use crate::ids::ReviewId;
use crate::plan::{Checkout, DecisionCounts, Revision, SyncDecision};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub schema: String,
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,

    /// True when nothing was fetched on purpose (`--pending`).
    #[serde(default)]
    pub dry_run: bool,

    pub counts: DecisionCounts,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub decisions: Vec<SyncDecision>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fetched: Vec<FetchRecord>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub skipped: Vec<SkippedFetch>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<RunError>,
}

impl RunReport {
    pub fn new(run_id: Uuid, started_at: DateTime<Utc>) -> Self {
        Self {
            schema: crate::schema::SUBMIRROR_REPORT_V1.to_string(),
            run_id,
            started_at,
            ended_at: None,
            dry_run: false,
            counts: DecisionCounts::default(),
            decisions: vec![],
            fetched: vec![],
            skipped: vec![],
            errors: vec![],
        }
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

/// A checkout or update that completed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchRecord {
    pub checkout: Checkout,
    pub revision: Revision,

    #[serde(default)]
    pub reviews: Vec<ReviewId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedFetch {
    pub checkout: Checkout,
    pub reason: SkipReason,

    #[serde(default)]
    pub reviews: Vec<ReviewId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// The operator aborted before this job started.
    Cancelled,
    /// Fetch-only-updates mode and no working copy exists yet.
    OnlyUpdates,
    DryRun,
}
