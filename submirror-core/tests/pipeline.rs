//! End-to-end runs of the pipeline over in-memory collaborators.

use camino::{Utf8Path, Utf8PathBuf};
use pretty_assertions::assert_eq;
use std::sync::Arc;
use submirror_core::adapters::{FsWritePort, InMemoryMetadataSource, InMemoryRepository};
use submirror_core::pipeline::{FatalError, RunPorts, prune_links, run_sync, write_report};
use submirror_core::pool::CancelFlag;
use submirror_core::ports::{MetadataError, WritePort};
use submirror_core::settings::SyncSettings;
use submirror_domain::{
    InteractiveOutcome, MemoryListing, MemoryOverrides, OverrideSink, ScriptedPrompter,
};
use submirror_types::error::RunError;
use submirror_types::model::{Course, CourseSnapshot, Review, Student, Task};
use submirror_types::overrides::Overrides;
use submirror_types::plan::{Checkout, DecisionCounts};
use submirror_types::report::SkipReason;
use submirror_types::{CourseId, ReviewId, TaskId};
use tempfile::TempDir;

fn algo101() -> CourseSnapshot {
    let course = CourseId::from("1");
    let task = |id: &str, title: &str, parent: Option<&str>| Task {
        id: TaskId::from(id),
        course: course.clone(),
        title: title.to_string(),
        parent: parent.map(TaskId::from),
    };
    let student = |login: &str, name: &str| Student {
        login: login.to_string(),
        name: name.to_string(),
    };
    let review = |id: &str, task: &str, login: &str, subpath: Option<&str>| Review {
        id: ReviewId::from(id),
        course: course.clone(),
        task: TaskId::from(task),
        student: login.to_string(),
        subpath: subpath.map(str::to_string),
        revision: None,
    };
    CourseSnapshot {
        course: Course {
            id: course.clone(),
            name: "Algo101".to_string(),
        },
        tasks: vec![
            task("1", "hw1", None),
            task("2", "part1", Some("1")),
            task("3", "part2", Some("1")),
        ],
        students: vec![
            student("ivanov", "Ivan Ivanov"),
            student("petrov", "Petr Petrov"),
            student("sidorov", "Sidor Sidorov"),
        ],
        reviews: vec![
            review("10", "2", "ivanov", Some("hw1/part1")),
            review("11", "3", "ivanov", Some("hw1/part2")),
            review("12", "2", "petrov", None),
            review("13", "3", "sidorov", Some("x")),
        ],
    }
}

struct Fixture {
    _dir: TempDir,
    dest: Utf8PathBuf,
    metadata: InMemoryMetadataSource,
    repository: Arc<InMemoryRepository>,
    listing: MemoryListing,
    cancel: CancelFlag,
}

impl Fixture {
    fn new() -> Self {
        let dir = TempDir::new().expect("temp dir");
        let dest = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).expect("utf8 temp dir");
        let up_to_date = Checkout {
            repository: "ivanov".to_string(),
            subpath: "hw1/part2".to_string(),
            local_dir: dest.join("Algo101/hw1/part2/Ivan Ivanov"),
        };
        let repository = InMemoryRepository::new()
            .with_head("ivanov", 5)
            .with_head("petrov", 2)
            .with_unavailable("sidorov", "connection refused")
            .with_working_copy(up_to_date, 5);
        Self {
            _dir: dir,
            dest,
            metadata: InMemoryMetadataSource::new().with_course(algo101()),
            repository: Arc::new(repository),
            listing: MemoryListing::new(),
            cancel: CancelFlag::new(),
        }
    }

    fn settings(&self) -> SyncSettings {
        SyncSettings {
            dest: self.dest.clone(),
            course_name: "Algo101".to_string(),
            course_ids: vec![CourseId::from("1")],
            jobs: 2,
            ..SyncSettings::default()
        }
    }

    fn ports(&self) -> RunPorts<'_> {
        RunPorts {
            metadata: &self.metadata,
            repository: self.repository.clone(),
            listing: &self.listing,
            writer: Arc::new(FsWritePort),
            cancel: self.cancel.clone(),
        }
    }
}

#[test]
fn plans_and_fetches_what_is_stale() {
    let fx = Fixture::new();
    let mut sink = MemoryOverrides::default();
    let outcome = run_sync(&fx.settings(), &fx.ports(), &mut sink, None).expect("run");

    assert_eq!(
        outcome.report.counts,
        DecisionCounts {
            sync: 1,
            up_to_date: 1,
            unsorted_fetch: 0,
            ignored: 0,
            unresolved: 1,
        }
    );
    let fetched: Vec<_> = outcome
        .report
        .fetched
        .iter()
        .map(|f| f.checkout.local_dir.clone())
        .collect();
    assert_eq!(fetched, vec![fx.dest.join("Algo101/hw1/part1/Ivan Ivanov")]);
    assert!(fx.dest.join("Algo101/hw1/part1").is_dir());

    assert_eq!(
        outcome.report.errors,
        vec![RunError::RepositoryUnavailable {
            repository: "sidorov".to_string(),
            message: "connection refused".to_string(),
        }]
    );
    assert_eq!(outcome.exit_code(), 4);
}

#[test]
fn dry_run_fetches_nothing() {
    let fx = Fixture::new();
    let settings = SyncSettings {
        dry_run: true,
        ..fx.settings()
    };
    let outcome =
        run_sync(&settings, &fx.ports(), &mut MemoryOverrides::default(), None).expect("run");

    assert!(outcome.report.fetched.is_empty());
    assert_eq!(outcome.report.skipped.len(), 1);
    assert_eq!(outcome.report.skipped[0].reason, SkipReason::DryRun);
    assert!(fx.repository.fetches().is_empty());
    assert!(!fx.dest.join("Algo101").exists());
}

#[test]
fn update_only_mode_skips_fresh_checkouts() {
    let fx = Fixture::new();
    let settings = SyncSettings {
        only_updates: true,
        ..fx.settings()
    };
    let outcome =
        run_sync(&settings, &fx.ports(), &mut MemoryOverrides::default(), None).expect("run");

    assert!(outcome.report.fetched.is_empty());
    assert_eq!(outcome.report.skipped[0].reason, SkipReason::OnlyUpdates);
    assert_eq!(outcome.report.skipped[0].reviews, vec![ReviewId::from("10")]);
}

#[test]
fn cancelled_jobs_are_reported_as_skipped() {
    let fx = Fixture::new();
    fx.cancel.cancel();
    let outcome = run_sync(
        &fx.settings(),
        &fx.ports(),
        &mut MemoryOverrides::default(),
        None,
    )
    .expect("run");

    assert!(outcome.report.fetched.is_empty());
    assert_eq!(outcome.report.skipped[0].reason, SkipReason::Cancelled);
    assert!(fx.repository.fetches().is_empty());
}

#[test]
fn linked_answers_are_planned_in_the_same_run() {
    let fx = Fixture::new();
    let settings = SyncSettings {
        whole_repository: true,
        ask_link: true,
        ..fx.settings()
    };
    let mut sink = MemoryOverrides::default();
    let mut prompter = ScriptedPrompter::new(["hw1/part1"]);

    let outcome =
        run_sync(&settings, &fx.ports(), &mut sink, Some(&mut prompter)).expect("run");

    assert_eq!(
        outcome.interactive,
        vec![(
            ReviewId::from("12"),
            InteractiveOutcome::Linked {
                task: TaskId::from("2"),
                subpath: "hw1/part1".to_string(),
            }
        )]
    );
    assert_eq!(sink.snapshot().link("2"), Some("hw1/part1"));
    assert_eq!(outcome.report.counts.sync, 2);
    assert_eq!(outcome.report.counts.unresolved, 0);
    assert!(
        fx.repository
            .fetches()
            .iter()
            .any(|c| c.repository == "petrov" && c.subpath == "hw1/part1")
    );
}

#[test]
fn rejected_credentials_abort_the_run() {
    let mut fx = Fixture::new();
    fx.metadata = InMemoryMetadataSource::new().with_failure(
        CourseId::from("1"),
        MetadataError::Authentication("401".to_string()),
    );
    let err = run_sync(
        &fx.settings(),
        &fx.ports(),
        &mut MemoryOverrides::default(),
        None,
    )
    .err()
    .expect("fatal");
    assert!(matches!(err, FatalError::Authentication(_)));
    assert_eq!(err.exit_code(), 2);
}

#[test]
fn one_failing_course_does_not_hide_the_others() {
    let fx = Fixture::new();
    let settings = SyncSettings {
        course_ids: vec![CourseId::from("1"), CourseId::from("2")],
        ..fx.settings()
    };
    let outcome =
        run_sync(&settings, &fx.ports(), &mut MemoryOverrides::default(), None).expect("run");

    assert!(outcome.report.errors.contains(&RunError::MetadataFetchFailure {
        course: CourseId::from("2"),
        message: "fetch failed: unknown course 2".to_string(),
    }));
    assert_eq!(outcome.report.fetched.len(), 1);
}

#[test]
fn report_is_written_as_json() {
    let fx = Fixture::new();
    let outcome = run_sync(
        &fx.settings(),
        &fx.ports(),
        &mut MemoryOverrides::default(),
        None,
    )
    .expect("run");

    let path = fx.dest.join("out/report.json");
    write_report(&FsWritePort, &path, &outcome.report).expect("write report");
    let raw = std::fs::read_to_string(&path).expect("read report");
    let value: serde_json::Value = serde_json::from_str(&raw).expect("json");
    assert_eq!(value["schema"], "submirror.report.v1");
    assert_eq!(value["errors"][0]["error"], "repository_unavailable");
}

#[test]
fn pruning_drops_stale_and_redundant_links() {
    let (catalog, _) = submirror_core::pipeline::load_catalog(
        &InMemoryMetadataSource::new().with_course(algo101()),
        &[CourseId::from("1")],
    )
    .expect("catalog");
    let mut overrides = Overrides::default();
    overrides.links.insert("hw9".to_string(), "old".to_string());
    overrides.links.insert("3".to_string(), "x".to_string());
    overrides.links.insert("hw1/part1".to_string(), "keep".to_string());

    let mut dry = MemoryOverrides::new(overrides.clone());
    let audit = prune_links(&catalog, &mut dry, true).expect("audit");
    assert_eq!(audit.stale, vec!["hw9".to_string()]);
    assert_eq!(audit.redundant, vec!["3".to_string()]);
    assert_eq!(dry.snapshot(), overrides);

    let mut sink = MemoryOverrides::new(overrides);
    prune_links(&catalog, &mut sink, false).expect("prune");
    let left: Vec<_> = sink.snapshot().links.into_keys().collect();
    assert_eq!(left, vec!["hw1/part1".to_string()]);
}

#[test]
fn unreadable_working_copy_is_reported_and_left_alone() {
    let fx = Fixture::new();
    let locked = fx.dest.join("Algo101/hw1/part2/Ivan Ivanov");
    fx.repository
        .set_unreadable(&locked, "E155036: working copy is locked");

    let outcome = run_sync(
        &fx.settings(),
        &fx.ports(),
        &mut MemoryOverrides::default(),
        None,
    )
    .expect("run");

    assert!(outcome.report.errors.contains(&RunError::WorkingCopyFailure {
        repository: "ivanov".to_string(),
        dir: locked.clone(),
        message: format!("svn info {}: E155036: working copy is locked", locked),
    }));
    assert!(
        !outcome
            .report
            .decisions
            .iter()
            .any(|d| d.review == ReviewId::from("11"))
    );
    let fetched: Vec<_> = fx
        .repository
        .fetches()
        .into_iter()
        .map(|c| c.local_dir)
        .collect();
    assert_eq!(fetched, vec![fx.dest.join("Algo101/hw1/part1/Ivan Ivanov")]);
    assert_eq!(outcome.exit_code(), 4);
}

#[test]
fn failed_fetch_does_not_stop_the_other_jobs() {
    let fx = Fixture::new();
    fx.repository.set_missing_path("ivanov", "hw1/part1");
    let mut overrides = Overrides::default();
    overrides.links.insert("2".to_string(), "solutions/part1".to_string());
    let mut sink = MemoryOverrides::new(overrides);

    let outcome = run_sync(&fx.settings(), &fx.ports(), &mut sink, None).expect("run");

    assert!(outcome.report.errors.contains(&RunError::PathNotFound {
        repository: "ivanov".to_string(),
        subpath: "hw1/part1".to_string(),
    }));
    let fetched: Vec<_> = outcome
        .report
        .fetched
        .iter()
        .map(|f| (f.checkout.repository.as_str(), f.reviews.clone()))
        .collect();
    assert_eq!(fetched, vec![("petrov", vec![ReviewId::from("12")])]);
    assert_eq!(outcome.exit_code(), 4);
}

struct ReadOnlyDisk;

impl WritePort for ReadOnlyDisk {
    fn write_file(&self, path: &Utf8Path, _contents: &[u8]) -> anyhow::Result<()> {
        anyhow::bail!("write {}: read-only file system", path)
    }

    fn create_dir_all(&self, path: &Utf8Path) -> anyhow::Result<()> {
        anyhow::bail!("create {}: read-only file system", path)
    }
}

#[test]
fn unwritable_target_is_a_working_copy_failure() {
    let fx = Fixture::new();
    let ports = RunPorts {
        writer: Arc::new(ReadOnlyDisk),
        ..fx.ports()
    };
    let outcome =
        run_sync(&fx.settings(), &ports, &mut MemoryOverrides::default(), None).expect("run");

    let dir = fx.dest.join("Algo101/hw1/part1/Ivan Ivanov");
    let failure = outcome
        .report
        .errors
        .iter()
        .find_map(|e| match e {
            RunError::WorkingCopyFailure {
                repository,
                dir: d,
                message,
            } if *d == dir => Some((repository.clone(), message.clone())),
            _ => None,
        })
        .expect("working copy failure");
    assert_eq!(failure.0, "ivanov");
    assert!(failure.1.starts_with(&format!("cannot create {}", dir.parent().expect("parent"))));
    assert!(fx.repository.fetches().is_empty());
}
