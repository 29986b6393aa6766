//! Clap-free settings for one sync run.

use camino::Utf8PathBuf;
use submirror_domain::{DeclinePolicy, Filters, Layout, PlanOptions};
use submirror_types::CourseId;

/// Everything a run needs besides its collaborators.
#[derive(Debug, Clone)]
pub struct SyncSettings {
    /// Directory the course root is created under.
    pub dest: Utf8PathBuf,
    pub course_name: String,
    pub unsorted: String,
    pub course_ids: Vec<CourseId>,
    pub filters: Filters,

    /// Worker pool bound.
    pub jobs: usize,

    // Modes
    pub dry_run: bool,
    pub only_updates: bool,
    pub whole_repository: bool,
    pub ask_link: bool,
    pub auto_ignore: bool,

    /// Turn Ctrl-C into cancellation once fetching starts.
    pub watch_interrupt: bool,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            dest: Utf8PathBuf::from("."),
            course_name: "course".to_string(),
            unsorted: "_unsorted".to_string(),
            course_ids: Vec::new(),
            filters: Filters::default(),
            jobs: 4,
            dry_run: false,
            only_updates: false,
            whole_repository: false,
            ask_link: false,
            auto_ignore: false,
            watch_interrupt: false,
        }
    }
}

impl SyncSettings {
    pub fn layout(&self) -> Layout {
        Layout::new(self.dest.clone(), &self.course_name, &self.unsorted)
    }

    pub fn plan_options(&self) -> PlanOptions {
        PlanOptions {
            whole_repository: self.whole_repository,
            layout: self.layout(),
        }
    }

    pub fn decline_policy(&self) -> DeclinePolicy {
        if self.auto_ignore {
            DeclinePolicy::AutoIgnore
        } else {
            DeclinePolicy::Keep
        }
    }

    /// Reject mode combinations that make no sense together.
    pub fn validate(&self) -> Result<(), String> {
        if self.course_ids.is_empty() {
            return Err("no course ids configured (COURSE.ids)".to_string());
        }
        if self.jobs == 0 {
            return Err("jobs must be at least 1".to_string());
        }
        if self.ask_link && !self.whole_repository {
            return Err("ask-link requires whole-repository fetching (--force)".to_string());
        }
        if self.auto_ignore && !self.ask_link {
            return Err("auto-ignore requires ask-link".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> SyncSettings {
        SyncSettings {
            course_ids: vec![CourseId::from("12")],
            ..SyncSettings::default()
        }
    }

    #[test]
    fn defaults_validate_once_a_course_is_set() {
        assert!(SyncSettings::default().validate().is_err());
        assert!(base().validate().is_ok());
    }

    #[test]
    fn interactive_modes_are_chained() {
        let ask = SyncSettings {
            ask_link: true,
            ..base()
        };
        assert!(ask.validate().is_err());

        let ask = SyncSettings {
            whole_repository: true,
            ..ask
        };
        assert!(ask.validate().is_ok());

        let ignore_only = SyncSettings {
            auto_ignore: true,
            whole_repository: true,
            ..base()
        };
        assert!(ignore_only.validate().is_err());
    }

    #[test]
    fn layout_roots_under_course_name() {
        let settings = SyncSettings {
            dest: Utf8PathBuf::from("/srv/mirror"),
            course_name: "Algo/101".to_string(),
            ..base()
        };
        assert_eq!(settings.layout().root, Utf8PathBuf::from("/srv/mirror/Algo_101"));
        assert_eq!(settings.decline_policy(), DeclinePolicy::Keep);
    }
}
