//! Merges the settings file with command-line flags (flags take precedence).

use camino::Utf8PathBuf;
use submirror_core::settings::SyncSettings;
use submirror_domain::Filters;
use submirror_store::{DEFAULT_JOBS, Settings};
use submirror_types::CourseId;
use tracing::debug;

/// Flags that shape a sync run.
#[derive(Debug, Clone, Default)]
pub struct RunFlags {
    pub dest: Utf8PathBuf,
    pub courses: Vec<String>,
    pub tasks: Vec<String>,
    pub students: Vec<String>,
    pub jobs: Option<usize>,
    pub pending: bool,
    pub only_updates: bool,
    pub force: bool,
    pub ask_link: bool,
    pub auto_ignore: bool,
}

/// Builder for merging the settings file with CLI flags.
pub struct ConfigMerger {
    settings: Settings,
}

impl ConfigMerger {
    pub fn new(settings: Settings) -> Self {
        Self { settings }
    }

    /// Course ids to load: `--course` values when given, otherwise `COURSE.ids`.
    pub fn course_ids(&self, flags: &RunFlags) -> Vec<CourseId> {
        let ids = if flags.courses.is_empty() {
            &self.settings.course.ids
        } else {
            &flags.courses
        };
        ids.iter().map(|id| CourseId::from(id.as_str())).collect()
    }

    pub fn merge(self, flags: &RunFlags) -> SyncSettings {
        let course_ids = self.course_ids(flags);
        let jobs = flags
            .jobs
            .or(self.settings.course.jobs)
            .unwrap_or(DEFAULT_JOBS);
        debug!(
            courses = course_ids.len(),
            jobs,
            pending = flags.pending,
            force = flags.force,
            "merged settings"
        );

        SyncSettings {
            dest: flags.dest.clone(),
            course_name: self.settings.course.name,
            unsorted: self.settings.course.unsorted,
            course_ids,
            filters: Filters {
                courses: flags.courses.clone(),
                tasks: flags.tasks.clone(),
                students: flags.students.clone(),
            },
            jobs,
            dry_run: flags.pending,
            only_updates: flags.only_updates,
            whole_repository: flags.force,
            ask_link: flags.ask_link,
            auto_ignore: flags.auto_ignore,
            watch_interrupt: true,
        }
    }
}
