//! The sync pipeline, extracted from the CLI.
//!
//! All course-service, repository and filesystem access goes through the port traits; the
//! operator's override store and prompter are passed in by the caller.

use crate::pool::{CancelFlag, WorkerPool};
use crate::ports::{MetadataError, MetadataSource, RepositoryPort, WritePort};
use crate::settings::SyncSettings;
use anyhow::Context;
use camino::Utf8Path;
use chrono::Utc;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use submirror_domain::{
    Catalog, InteractiveError, InteractiveOutcome, InteractiveResolver, LinkAudit, OverrideSink,
    Prompter, RepositoryListing, Resolution, RevisionQueries, RevisionSnapshot, SyncPlan,
    audit_links, plan, resolve, revision_queries,
};
use submirror_types::error::{RunError, StoreError};
use submirror_types::plan::{Checkout, Revision};
use submirror_types::report::{FetchRecord, RunReport, SkipReason, SkippedFetch};
use submirror_types::{CourseId, ReviewId};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Errors that end a run before a report can be produced.
///
/// Exit codes: 1 settings or internal, 2 authentication, 3 settings-file write.
#[derive(Debug, thiserror::Error)]
pub enum FatalError {
    #[error("invalid settings: {0}")]
    Settings(String),

    #[error("authentication failed: {0}")]
    Authentication(String),

    #[error(transparent)]
    StoreWrite(#[from] StoreError),

    #[error("{0:#}")]
    Internal(#[from] anyhow::Error),
}

impl FatalError {
    pub fn exit_code(&self) -> u8 {
        match self {
            FatalError::Settings(_) | FatalError::Internal(_) => 1,
            FatalError::Authentication(_) => 2,
            FatalError::StoreWrite(_) => 3,
        }
    }
}

impl From<InteractiveError> for FatalError {
    fn from(err: InteractiveError) -> Self {
        match err {
            InteractiveError::Store(e) => FatalError::StoreWrite(e),
            InteractiveError::Prompt(e) => FatalError::Internal(e.context("read operator answer")),
        }
    }
}

/// Exit code of a run that produced a report: 4 when per-item errors were collected.
pub const EXIT_ITEM_ERRORS: u8 = 4;

/// Collaborators of one run.
pub struct RunPorts<'a> {
    pub metadata: &'a dyn MetadataSource,
    pub repository: Arc<dyn RepositoryPort>,
    pub listing: &'a dyn RepositoryListing,
    pub writer: Arc<dyn WritePort>,
    pub cancel: CancelFlag,
}

/// Outcome of `run_sync`.
pub struct SyncOutcome {
    pub plan: SyncPlan,
    pub report: RunReport,
    /// Answers given in the interactive phase, in prompt order.
    pub interactive: Vec<(ReviewId, InteractiveOutcome)>,
}

impl SyncOutcome {
    pub fn exit_code(&self) -> u8 {
        if self.report.has_errors() {
            EXIT_ITEM_ERRORS
        } else {
            0
        }
    }
}

/// Fetch every configured course. Authentication failures abort; any other failure is recorded
/// for that course and the rest still load.
pub fn load_catalog(
    metadata: &dyn MetadataSource,
    courses: &[CourseId],
) -> Result<(Catalog, Vec<RunError>), FatalError> {
    let mut snapshots = Vec::new();
    let mut errors = Vec::new();
    for course in courses {
        match metadata.load_course(course) {
            Ok(snapshot) => {
                debug!(
                    course = %course,
                    tasks = snapshot.tasks.len(),
                    reviews = snapshot.reviews.len(),
                    "course loaded"
                );
                snapshots.push(snapshot);
            }
            Err(MetadataError::Authentication(message)) => {
                return Err(FatalError::Authentication(message));
            }
            Err(err) => {
                error!(course = %course, error = %err, "course metadata unavailable");
                errors.push(RunError::MetadataFetchFailure {
                    course: course.clone(),
                    message: err.to_string(),
                });
            }
        }
    }
    Ok((Catalog::from_snapshots(snapshots), errors))
}

/// Resolve, plan and execute one run.
///
/// The interactive phase (when enabled and a prompter is given) runs before any repository is
/// queried; links it writes are visible to the planning that follows.
pub fn run_sync(
    settings: &SyncSettings,
    ports: &RunPorts<'_>,
    sink: &mut dyn OverrideSink,
    prompter: Option<&mut dyn Prompter>,
) -> Result<SyncOutcome, FatalError> {
    settings.validate().map_err(FatalError::Settings)?;

    let mut report = RunReport::new(Uuid::new_v4(), Utc::now());
    report.dry_run = settings.dry_run;

    let (catalog, metadata_errors) = load_catalog(ports.metadata, &settings.course_ids)?;
    report.errors.extend(metadata_errors);

    let layout = settings.layout();
    let mut resolutions = resolve(&catalog, &sink.snapshot(), &layout);

    let mut interactive = Vec::new();
    if settings.ask_link {
        match prompter {
            Some(prompter) => {
                let pending = pending_prompts(&catalog, &resolutions, settings);
                if !pending.is_empty() {
                    info!(pending = pending.len(), "asking for links");
                    interactive = InteractiveResolver::new(
                        &catalog,
                        &layout,
                        ports.listing,
                        settings.decline_policy(),
                    )
                    .run(&pending, sink, prompter)?;
                    resolutions = resolve(&catalog, &sink.snapshot(), &layout);
                }
            }
            None => warn!("ask-link requested without a prompter; skipping"),
        }
    }

    let pool = WorkerPool::new(settings.jobs, ports.cancel.clone())
        .context("start worker pool")?;
    if settings.watch_interrupt {
        pool.cancel_on_interrupt();
    }

    let options = settings.plan_options();
    let queries = revision_queries(&catalog, &resolutions, &settings.filters, &options);
    let mut revisions = RevisionSnapshot::new();
    gather_revisions(&pool, &ports.repository, &mut revisions, &queries);

    let sync_plan = plan(&catalog, &resolutions, &settings.filters, &revisions, &options);
    report.errors.extend(sync_plan.errors.iter().cloned());
    report.counts = sync_plan.counts();
    report.decisions = sync_plan.decisions.clone();

    execute(settings, &pool, ports, &sync_plan, &mut report);
    report.ended_at = Some(Utc::now());

    info!(
        fetched = report.fetched.len(),
        skipped = report.skipped.len(),
        errors = report.errors.len(),
        "run finished"
    );
    Ok(SyncOutcome {
        plan: sync_plan,
        report,
        interactive,
    })
}

fn pending_prompts(
    catalog: &Catalog,
    resolutions: &[Resolution],
    settings: &SyncSettings,
) -> Vec<Resolution> {
    let mut pending: Vec<Resolution> = resolutions
        .iter()
        .filter(|r| r.is_unresolved() && settings.filters.matches(catalog, &r.review))
        .cloned()
        .collect();
    pending.sort_by(|a, b| {
        a.review
            .course
            .cmp(&b.review.course)
            .then_with(|| a.task_path.cmp(&b.task_path))
            .then_with(|| a.student.cmp(&b.student))
            .then_with(|| a.review.id.cmp(&b.review.id))
    });
    pending
}

/// Answer every query `revisions` cannot answer yet: one remote head per repository, then the
/// local revision of each checkout, repositories in parallel.
pub fn gather_revisions(
    pool: &WorkerPool,
    repository: &Arc<dyn RepositoryPort>,
    revisions: &mut RevisionSnapshot,
    queries: &RevisionQueries,
) {
    let groups: Vec<(String, BTreeSet<Checkout>)> =
        revisions.missing(queries).into_iter().collect();
    if groups.is_empty() {
        return;
    }

    let port = repository.clone();
    let results = pool.run_groups(groups, move |name, checkouts, _| {
        let mut snap = RevisionSnapshot::new();
        let head = port.remote_head(name);
        if let Err(err) = &head {
            warn!(repository = %name, error = %err, "remote revision unavailable");
        }
        let reachable = head.is_ok();
        snap.record_remote(name, head);
        if reachable {
            for checkout in &checkouts {
                match port.local_revision(checkout) {
                    Ok(local) => snap.record_local(&checkout.local_dir, local),
                    Err(err) => {
                        let message = format!("{:#}", err);
                        warn!(dir = %checkout.local_dir, error = %message, "local revision unreadable");
                        snap.record_local_failure(&checkout.local_dir, message);
                    }
                }
            }
        }
        snap
    });

    for (name, snap) in results {
        match snap {
            Some(snap) => revisions.merge(snap),
            None => error!(repository = %name, "revision query worker failed"),
        }
    }
}

#[derive(Debug, Clone)]
struct FetchJob {
    checkout: Checkout,
    local: Option<Revision>,
    reviews: Vec<ReviewId>,
}

enum JobResult {
    Fetched(FetchRecord),
    Skipped(SkippedFetch),
    Failed(RunError),
}

/// One job per distinct local target; reviews sharing an unsorted fetch are merged.
fn collect_jobs(plan: &SyncPlan) -> Vec<FetchJob> {
    let mut jobs: BTreeMap<&Utf8Path, FetchJob> = BTreeMap::new();
    for decision in plan.decisions.iter().filter(|d| d.needs_fetch()) {
        let Some(target) = &decision.target else {
            continue;
        };
        jobs.entry(target.local_dir.as_path())
            .or_insert_with(|| FetchJob {
                checkout: target.clone(),
                local: decision.local,
                reviews: Vec::new(),
            })
            .reviews
            .push(decision.review.clone());
    }
    jobs.into_values().collect()
}

fn skipped(job: FetchJob, reason: SkipReason) -> SkippedFetch {
    SkippedFetch {
        checkout: job.checkout,
        reason,
        reviews: job.reviews,
    }
}

/// Run the fetch jobs of `plan` under the pool and record the outcome in `report`.
fn execute(
    settings: &SyncSettings,
    pool: &WorkerPool,
    ports: &RunPorts<'_>,
    plan: &SyncPlan,
    report: &mut RunReport,
) {
    let mut groups: BTreeMap<String, Vec<FetchJob>> = BTreeMap::new();
    for job in collect_jobs(plan) {
        if settings.dry_run {
            report.skipped.push(skipped(job, SkipReason::DryRun));
        } else if settings.only_updates && job.local.is_none() {
            debug!(dir = %job.checkout.local_dir, "no working copy; skipped in update-only mode");
            report.skipped.push(skipped(job, SkipReason::OnlyUpdates));
        } else {
            groups
                .entry(job.checkout.repository.clone())
                .or_default()
                .push(job);
        }
    }
    if groups.is_empty() {
        return;
    }

    let repository = ports.repository.clone();
    let writer = ports.writer.clone();
    let results = pool.run_groups(groups.into_iter().collect(), move |name, jobs, cancel| {
        jobs.into_iter()
            .map(|job| run_job(name, job, repository.as_ref(), writer.as_ref(), cancel))
            .collect::<Vec<_>>()
    });

    for (name, outcome) in results {
        let Some(outcome) = outcome else {
            report.errors.push(RunError::RepositoryUnavailable {
                repository: name,
                message: "fetch worker failed".to_string(),
            });
            continue;
        };
        for result in outcome {
            match result {
                JobResult::Fetched(record) => report.fetched.push(record),
                JobResult::Skipped(skip) => report.skipped.push(skip),
                JobResult::Failed(err) => report.errors.push(err),
            }
        }
    }
}

fn run_job(
    repository_name: &str,
    job: FetchJob,
    repository: &dyn RepositoryPort,
    writer: &dyn WritePort,
    cancel: &CancelFlag,
) -> JobResult {
    if cancel.is_cancelled() {
        return JobResult::Skipped(skipped(job, SkipReason::Cancelled));
    }
    let dir = &job.checkout.local_dir;
    if let Some(parent) = dir.parent().filter(|p| !p.as_str().is_empty())
        && let Err(err) = writer.create_dir_all(parent)
    {
        let message = format!("cannot create {}: {:#}", parent, err);
        error!(dir = %dir, error = %message, "cannot prepare target directory");
        return JobResult::Failed(RunError::WorkingCopyFailure {
            repository: repository_name.to_string(),
            dir: dir.clone(),
            message,
        });
    }

    match repository.checkout_or_update(&job.checkout) {
        Ok(revision) => {
            info!(
                repository = %repository_name,
                subpath = %job.checkout.subpath,
                dir = %dir,
                revision = %revision,
                "fetched"
            );
            JobResult::Fetched(FetchRecord {
                checkout: job.checkout,
                revision,
                reviews: job.reviews,
            })
        }
        Err(err) => {
            error!(repository = %repository_name, dir = %dir, error = %err, "fetch failed");
            JobResult::Failed(err.into())
        }
    }
}

/// Drop stale and redundant links. With `dry_run` the audit is only reported.
pub fn prune_links(
    catalog: &Catalog,
    sink: &mut dyn OverrideSink,
    dry_run: bool,
) -> Result<LinkAudit, StoreError> {
    let audit = audit_links(catalog, &sink.snapshot());
    for key in audit.stale.iter() {
        warn!(link = %key, "link matches no task");
    }
    for key in audit.redundant.iter() {
        warn!(link = %key, "link is redundant; every review declares its own path");
    }
    if !dry_run {
        for key in audit.keys() {
            sink.remove_link(key)?;
        }
    }
    Ok(audit)
}

/// Write the JSON run report.
pub fn write_report(writer: &dyn WritePort, path: &Utf8Path, report: &RunReport) -> anyhow::Result<()> {
    let mut bytes = serde_json::to_vec_pretty(report).context("serialize run report")?;
    bytes.push(b'\n');
    writer
        .write_file(path, &bytes)
        .with_context(|| format!("write report {}", path))
}
