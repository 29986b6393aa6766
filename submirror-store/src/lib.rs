//! Settings file access: the `AUTH`/`COURSE` sections are read once per run, the override
//! sections (`COURSE.ignore`, `RB_LINKS`, `RELOCS`) are written back one mutation at a time.

mod settings;
mod store;

pub use settings::{
    AuthSettings, CourseSettings, Credentials, DEFAULT_JOBS, DEFAULT_UNSORTED, SETTINGS_FILE_NAME,
    Settings, SettingsError, parse_settings,
};
pub use store::SettingsStore;
