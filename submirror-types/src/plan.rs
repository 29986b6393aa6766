use crate::ids::{CourseId, ReviewId};
use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Repository revision number as reported by the version-control server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Revision(pub u64);

impl fmt::Display for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "r{}", self.0)
    }
}

/// One unit of repository work: fetch `subpath` of `repository` into `local_dir`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Checkout {
    pub repository: String,
    /// Empty for a whole-repository (unsorted) fetch.
    pub subpath: String,
    pub local_dir: Utf8PathBuf,
}

impl Checkout {
    pub fn is_whole_repository(&self) -> bool {
        self.subpath.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncMode {
    /// No usable working copy exists yet.
    Checkout,
    /// Working copy is behind the remote head.
    Update,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DecisionKind {
    Sync { mode: SyncMode },
    UpToDate,
    UnsortedFetch,
    Ignored,
    Unresolved,
}

impl DecisionKind {
    pub fn label(&self) -> &'static str {
        match self {
            DecisionKind::Sync {
                mode: SyncMode::Checkout,
            } => "checkout",
            DecisionKind::Sync {
                mode: SyncMode::Update,
            } => "update",
            DecisionKind::UpToDate => "up-to-date",
            DecisionKind::UnsortedFetch => "unsorted",
            DecisionKind::Ignored => "ignored",
            DecisionKind::Unresolved => "unresolved",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncDecision {
    pub review: ReviewId,
    pub course: CourseId,
    /// `/`-joined task segments, e.g. `hw1/part1`.
    pub task_path: String,
    /// Student display name.
    pub student: String,
    pub login: String,
    /// Effective repository name (relocation applied).
    pub repository: String,
    pub kind: DecisionKind,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<Checkout>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local: Option<Revision>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote: Option<Revision>,
}

impl SyncDecision {
    /// True when the Executor has work to do for this decision.
    ///
    /// An unsorted fetch whose working copy already sits at the remote head is a no-op.
    pub fn needs_fetch(&self) -> bool {
        if self.target.is_none() {
            return false;
        }
        match self.kind {
            DecisionKind::Sync { .. } => true,
            DecisionKind::UnsortedFetch => match (self.local, self.remote) {
                (Some(local), Some(remote)) => local < remote,
                _ => true,
            },
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecisionCounts {
    pub sync: u64,
    pub up_to_date: u64,
    pub unsorted_fetch: u64,
    pub ignored: u64,
    pub unresolved: u64,
}

impl DecisionCounts {
    pub fn record(&mut self, kind: &DecisionKind) {
        match kind {
            DecisionKind::Sync { .. } => self.sync += 1,
            DecisionKind::UpToDate => self.up_to_date += 1,
            DecisionKind::UnsortedFetch => self.unsorted_fetch += 1,
            DecisionKind::Ignored => self.ignored += 1,
            DecisionKind::Unresolved => self.unresolved += 1,
        }
    }

    pub fn from_decisions<'a>(decisions: impl IntoIterator<Item = &'a SyncDecision>) -> Self {
        let mut counts = Self::default();
        for d in decisions {
            counts.record(&d.kind);
        }
        counts
    }

    pub fn total(&self) -> u64 {
        self.sync + self.up_to_date + self.unsorted_fetch + self.ignored + self.unresolved
    }
}
