use crate::catalog::Catalog;
use crate::filters::Filters;
use crate::resolver::{Layout, Resolution, ResolutionOutcome};
use camino::Utf8PathBuf;
use std::collections::{BTreeMap, BTreeSet};
use submirror_types::error::{RepositoryError, RunError};
use submirror_types::plan::{
    Checkout, DecisionCounts, DecisionKind, Revision, SyncDecision, SyncMode,
};
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct PlanOptions {
    /// Emit `UnsortedFetch` for unresolved reviews instead of leaving them `Unresolved`.
    pub whole_repository: bool,
    pub layout: Layout,
}

/// Checkouts whose local revision must be known, grouped by repository.
pub type RevisionQueries = BTreeMap<String, BTreeSet<Checkout>>;

/// Remote heads and local working-copy revisions captured before planning.
#[derive(Debug, Clone, Default)]
pub struct RevisionSnapshot {
    remote: BTreeMap<String, Result<Revision, RepositoryError>>,
    /// `Err` holds why the working copy could not be read.
    local: BTreeMap<Utf8PathBuf, Result<Option<Revision>, String>>,
}

impl RevisionSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_remote(&mut self, repository: &str, head: Result<Revision, RepositoryError>) {
        self.remote.insert(repository.to_string(), head);
    }

    pub fn record_local(&mut self, local_dir: &Utf8PathBuf, revision: Option<Revision>) {
        self.local.insert(local_dir.clone(), Ok(revision));
    }

    pub fn record_local_failure(&mut self, local_dir: &Utf8PathBuf, message: impl Into<String>) {
        self.local.insert(local_dir.clone(), Err(message.into()));
    }

    pub fn remote(&self, repository: &str) -> Option<&Result<Revision, RepositoryError>> {
        self.remote.get(repository)
    }

    /// `None` when no usable working copy exists or it could not be read.
    pub fn local(&self, local_dir: &Utf8PathBuf) -> Option<Revision> {
        match self.local.get(local_dir) {
            Some(Ok(revision)) => *revision,
            _ => None,
        }
    }

    pub fn local_failure(&self, local_dir: &Utf8PathBuf) -> Option<&str> {
        match self.local.get(local_dir) {
            Some(Err(message)) => Some(message),
            _ => None,
        }
    }

    /// The subset of `queries` this snapshot cannot answer yet.
    pub fn missing(&self, queries: &RevisionQueries) -> RevisionQueries {
        let mut out = RevisionQueries::new();
        for (repository, checkouts) in queries {
            let pending: BTreeSet<Checkout> = checkouts
                .iter()
                .filter(|c| !self.local.contains_key(&c.local_dir))
                .cloned()
                .collect();
            if !pending.is_empty() || !self.remote.contains_key(repository) {
                out.insert(repository.clone(), pending);
            }
        }
        out
    }

    pub fn merge(&mut self, other: RevisionSnapshot) {
        self.remote.extend(other.remote);
        self.local.extend(other.local);
    }
}

#[derive(Debug, Clone, Default)]
pub struct SyncPlan {
    pub decisions: Vec<SyncDecision>,
    pub errors: Vec<RunError>,
}

impl SyncPlan {
    pub fn counts(&self) -> DecisionCounts {
        DecisionCounts::from_decisions(&self.decisions)
    }
}

/// What the revision gathering step has to ask the repository adapter.
pub fn revision_queries(
    catalog: &Catalog,
    resolutions: &[Resolution],
    filters: &Filters,
    options: &PlanOptions,
) -> RevisionQueries {
    let mut out = RevisionQueries::new();
    for r in resolutions
        .iter()
        .filter(|r| filters.matches(catalog, &r.review))
    {
        let checkout = match &r.outcome {
            ResolutionOutcome::Resolved(c) => c.clone(),
            ResolutionOutcome::Unresolved if options.whole_repository => {
                options.layout.unsorted_checkout(&r.repository)
            }
            _ => continue,
        };
        out.entry(checkout.repository.clone())
            .or_default()
            .insert(checkout);
    }
    out
}

/// Decide, per selected review, what the Executor has to do.
///
/// Pure given the revision snapshot; no repository is touched here.
pub fn plan(
    catalog: &Catalog,
    resolutions: &[Resolution],
    filters: &Filters,
    revisions: &RevisionSnapshot,
    options: &PlanOptions,
) -> SyncPlan {
    let mut out = SyncPlan::default();
    let mut reported = BTreeSet::new();
    let mut unreadable = BTreeSet::new();

    for r in resolutions
        .iter()
        .filter(|r| filters.matches(catalog, &r.review))
    {
        let target = match &r.outcome {
            ResolutionOutcome::Ignored => {
                out.decisions
                    .push(decision(r, DecisionKind::Ignored, None, None, None));
                continue;
            }
            ResolutionOutcome::Invalid(kind) => {
                out.errors.push(RunError::DataIntegrity {
                    review: r.review.id.clone(),
                    kind: kind.clone(),
                });
                continue;
            }
            ResolutionOutcome::Unresolved if !options.whole_repository => {
                out.decisions
                    .push(decision(r, DecisionKind::Unresolved, None, None, None));
                continue;
            }
            ResolutionOutcome::Unresolved => options.layout.unsorted_checkout(&r.repository),
            ResolutionOutcome::Resolved(c) => c.clone(),
        };

        let remote = match revisions.remote(&target.repository) {
            Some(Ok(head)) => *head,
            Some(Err(err)) => {
                if reported.insert(target.repository.clone()) {
                    out.errors.push(err.clone().into());
                }
                continue;
            }
            None => {
                if reported.insert(target.repository.clone()) {
                    out.errors.push(RunError::RepositoryUnavailable {
                        repository: target.repository.clone(),
                        message: "remote revision was not queried".to_string(),
                    });
                }
                continue;
            }
        };
        if let Some(message) = revisions.local_failure(&target.local_dir) {
            if unreadable.insert(target.local_dir.clone()) {
                out.errors.push(RunError::WorkingCopyFailure {
                    repository: target.repository.clone(),
                    dir: target.local_dir.clone(),
                    message: message.to_string(),
                });
            }
            continue;
        }
        let local = revisions.local(&target.local_dir);

        let kind = if target.is_whole_repository() {
            DecisionKind::UnsortedFetch
        } else {
            compare(&target, local, remote)
        };
        debug!(
            review = %r.review.id,
            repository = %target.repository,
            decision = kind.label(),
            "planned"
        );
        out.decisions
            .push(decision(r, kind, Some(target), local, Some(remote)));
    }

    out.decisions.sort_by(|a, b| {
        a.course
            .cmp(&b.course)
            .then_with(|| a.task_path.cmp(&b.task_path))
            .then_with(|| a.student.cmp(&b.student))
            .then_with(|| a.review.cmp(&b.review))
    });
    out
}

fn compare(target: &Checkout, local: Option<Revision>, remote: Revision) -> DecisionKind {
    match local {
        None => DecisionKind::Sync {
            mode: SyncMode::Checkout,
        },
        Some(local) if local < remote => DecisionKind::Sync {
            mode: SyncMode::Update,
        },
        Some(local) => {
            if local > remote {
                warn!(
                    path = %target.local_dir,
                    local = %local,
                    remote = %remote,
                    "working copy is ahead of the remote head"
                );
            }
            DecisionKind::UpToDate
        }
    }
}

fn decision(
    r: &Resolution,
    kind: DecisionKind,
    target: Option<Checkout>,
    local: Option<Revision>,
    remote: Option<Revision>,
) -> SyncDecision {
    SyncDecision {
        review: r.review.id.clone(),
        course: r.review.course.clone(),
        task_path: r.task_path.clone(),
        student: r.student.clone(),
        login: r.review.student.clone(),
        repository: r.repository.clone(),
        kind,
        target,
        local,
        remote,
    }
}
