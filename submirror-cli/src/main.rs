mod config;
mod prompt;

use camino::Utf8PathBuf;
use clap::{ArgAction, Parser};
use config::{ConfigMerger, RunFlags};
use prompt::TerminalPrompter;
use std::process::ExitCode;
use std::sync::Arc;
use submirror_core::adapters::{FsWritePort, HttpMetadataSource, SvnRepository, WorkingCopyListing};
use submirror_core::pipeline::{
    EXIT_ITEM_ERRORS, FatalError, RunPorts, load_catalog, prune_links, run_sync, write_report,
};
use submirror_core::pool::CancelFlag;
use submirror_core::ports::RepositoryPort;
use submirror_domain::{OverrideSink, Prompter};
use submirror_render::{
    render_link_audit, render_plan, render_student_listing, render_summary, render_task_listing,
};
use submirror_store::{SETTINGS_FILE_NAME, SettingsError, SettingsStore};
use submirror_types::ReviewId;
use submirror_types::model::normalize_subpath;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(
    name = "submirror",
    version,
    about = "Mirror student repository submissions into a course/task/student tree."
)]
struct Cli {
    /// Settings file.
    #[arg(short = 'C', long = "config", default_value = SETTINGS_FILE_NAME)]
    config: Utf8PathBuf,

    /// Directory the course tree is created under.
    #[arg(long, default_value = ".")]
    dest: Utf8PathBuf,

    /// Only these course ids (default: COURSE.ids).
    #[arg(short = 'c', long = "course", value_name = "ID")]
    courses: Vec<String>,

    /// Only these tasks (id, title or path) and their subtasks.
    #[arg(short = 't', long = "task", value_name = "TASK")]
    tasks: Vec<String>,

    /// Only these students (login or name).
    #[arg(short = 's', long = "student", value_name = "STUDENT")]
    students: Vec<String>,

    /// Print task paths and exit.
    #[arg(long, default_value_t = false)]
    tasks_list: bool,

    /// Print students and exit.
    #[arg(long, default_value_t = false)]
    students_list: bool,

    /// Show what would be fetched without fetching.
    #[arg(long, default_value_t = false)]
    pending: bool,

    /// Only update existing working copies.
    #[arg(short = 'u', long, default_value_t = false)]
    only_updates: bool,

    /// Fetch whole repositories of reviews without a path into the unsorted directory.
    #[arg(short = 'f', long, default_value_t = false)]
    force: bool,

    /// Ask for a path for every review without one.
    #[arg(short = 'A', long, default_value_t = false, requires = "force")]
    ask_link: bool,

    /// Ignore reviews for which no path was given.
    #[arg(long, default_value_t = false, requires = "ask_link")]
    auto_ignore: bool,

    /// Link a task (id or path) to a repository path, then exit.
    #[arg(short = 'a', long, num_args = 2, value_names = ["TASK", "PATH"], action = ArgAction::Append)]
    add_link: Vec<String>,

    /// Remove a task link, then exit.
    #[arg(long, value_name = "TASK")]
    remove_link: Vec<String>,

    /// Remove links that match no task or that every review overrides.
    #[arg(short = 'r', long, default_value_t = false)]
    prune_links: bool,

    /// Never fetch this review.
    #[arg(long, value_name = "REVIEW")]
    ignore: Vec<String>,

    /// Fetch this review again.
    #[arg(long, value_name = "REVIEW")]
    unignore: Vec<String>,

    /// Read a student's submissions from another repository.
    #[arg(long, num_args = 2, value_names = ["LOGIN", "REPO"], action = ArgAction::Append)]
    relocate: Vec<String>,

    /// Drop a student's repository relocation.
    #[arg(long, value_name = "LOGIN")]
    unrelocate: Vec<String>,

    /// Parallel repository operations (default: COURSE.jobs or 4).
    #[arg(short = 'j', long, value_parser = clap::value_parser!(u16).range(1..))]
    jobs: Option<u16>,

    /// Write the JSON run report to this file.
    #[arg(long, value_name = "FILE")]
    report: Option<Utf8PathBuf>,

    /// Only log errors.
    #[arg(short, long, default_value_t = false, conflicts_with = "verbose")]
    quiet: bool,

    /// Log debug detail.
    #[arg(short, long, default_value_t = false)]
    verbose: bool,
}

impl Cli {
    fn has_directives(&self) -> bool {
        !(self.add_link.is_empty()
            && self.remove_link.is_empty()
            && self.ignore.is_empty()
            && self.unignore.is_empty()
            && self.relocate.is_empty()
            && self.unrelocate.is_empty())
    }

    fn run_flags(&self) -> RunFlags {
        RunFlags {
            dest: self.dest.clone(),
            courses: self.courses.clone(),
            tasks: self.tasks.clone(),
            students: self.students.clone(),
            jobs: self.jobs.map(usize::from),
            pending: self.pending,
            only_updates: self.only_updates,
            force: self.force,
            ask_link: self.ask_link,
            auto_ignore: self.auto_ignore,
        }
    }
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return if e.use_stderr() {
                ExitCode::from(1)
            } else {
                ExitCode::SUCCESS
            };
        }
    };
    init_logging(cli.quiet, cli.verbose);

    match real_main(cli) {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            error!("{}", e);
            ExitCode::from(e.exit_code())
        }
    }
}

fn init_logging(quiet: bool, verbose: bool) {
    let fallback = if verbose {
        "debug"
    } else if quiet {
        "error"
    } else {
        "warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn settings_error(err: SettingsError) -> FatalError {
    match err {
        SettingsError::MissingCredential(key) => {
            FatalError::Authentication(format!("missing {} in settings", key))
        }
        other => FatalError::Settings(other.to_string()),
    }
}

fn real_main(cli: Cli) -> Result<u8, FatalError> {
    let mut store = SettingsStore::open(&cli.config).map_err(settings_error)?;
    debug!(config = %store.path(), "settings opened");

    if cli.has_directives() {
        apply_directives(&cli, &mut store)?;
        return Ok(0);
    }

    let settings = store.settings().clone();
    let credentials = settings.auth.credentials().map_err(settings_error)?;
    let svn_base = settings
        .course
        .svn
        .clone()
        .ok_or_else(|| FatalError::Settings("missing COURSE.svn in settings".to_string()))?;

    let metadata =
        HttpMetadataSource::new(&credentials.url, &credentials.username, &credentials.password)?;
    let flags = cli.run_flags();
    let merger = ConfigMerger::new(settings);

    if cli.tasks_list || cli.students_list || cli.prune_links {
        let (catalog, errors) = load_catalog(&metadata, &merger.course_ids(&flags))?;
        for err in &errors {
            error!("{}", err);
        }
        if cli.tasks_list {
            print!("{}", render_task_listing(&catalog.task_listing()));
        }
        if cli.students_list {
            print!("{}", render_student_listing(&catalog.student_listing()));
        }
        if cli.prune_links {
            let audit = prune_links(&catalog, &mut store, cli.pending)?;
            print!(
                "{}",
                render_link_audit(&audit.stale, &audit.redundant, !cli.pending)
            );
        }
        return Ok(if errors.is_empty() { 0 } else { EXIT_ITEM_ERRORS });
    }

    let sync = merger.merge(&flags);
    let repository: Arc<dyn RepositoryPort> = Arc::new(SvnRepository::new(
        &svn_base,
        &credentials.username,
        &credentials.password,
    )?);
    let listing = WorkingCopyListing::new(sync.layout(), repository.clone());
    let writer = Arc::new(FsWritePort);
    let ports = RunPorts {
        metadata: &metadata,
        repository,
        listing: &listing,
        writer: writer.clone(),
        cancel: CancelFlag::new(),
    };

    let mut prompter = TerminalPrompter::default();
    let prompter: Option<&mut dyn Prompter> = if sync.ask_link {
        Some(&mut prompter)
    } else {
        None
    };
    let outcome = run_sync(&sync, &ports, &mut store, prompter)?;

    if cli.pending {
        print!("{}", render_plan(&outcome.plan.decisions));
    }
    print!("{}", render_summary(&outcome.report));

    if let Some(path) = &cli.report {
        write_report(writer.as_ref(), path, &outcome.report)?;
        info!(path = %path, "report written");
    }
    Ok(outcome.exit_code())
}

/// Link, ignore and relocation edits. Each one is written to the settings file on its own.
fn apply_directives(cli: &Cli, store: &mut SettingsStore) -> Result<(), FatalError> {
    for pair in cli.add_link.chunks(2) {
        let [task, path] = pair else {
            continue;
        };
        let subpath = normalize_subpath(path)
            .ok_or_else(|| FatalError::Settings(format!("empty path for task {}", task)))?;
        store.add_link(task.trim(), &subpath)?;
        println!("linked {} -> {}", task.trim(), subpath);
    }
    for task in &cli.remove_link {
        if store.remove_link(task.trim())? {
            println!("unlinked {}", task.trim());
        } else {
            println!("no link for {}", task.trim());
        }
    }
    for review in &cli.ignore {
        store.add_ignore(&ReviewId::from(review.trim()))?;
        println!("ignoring review {}", review.trim());
    }
    for review in &cli.unignore {
        if store.remove_ignore(&ReviewId::from(review.trim()))? {
            println!("review {} no longer ignored", review.trim());
        }
    }
    for pair in cli.relocate.chunks(2) {
        let [login, repository] = pair else {
            continue;
        };
        store.set_relocation(login.trim(), repository.trim())?;
        println!("{} -> repository {}", login.trim(), repository.trim());
    }
    for login in &cli.unrelocate {
        if store.remove_relocation(login.trim())? {
            println!("{} uses own repository again", login.trim());
        }
    }
    Ok(())
}
