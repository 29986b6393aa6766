use camino::Utf8PathBuf;
use ini::Ini;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use submirror_types::ReviewId;
use submirror_types::overrides::Overrides;
use thiserror::Error;

/// The settings file looked up in the working directory when `--config` is not given.
pub const SETTINGS_FILE_NAME: &str = "submirror.ini";

pub const DEFAULT_UNSORTED: &str = "_unsorted";

pub const DEFAULT_JOBS: usize = 4;

pub(crate) const AUTH: &str = "AUTH";
pub(crate) const COURSE: &str = "COURSE";
pub(crate) const RB_LINKS: &str = "RB_LINKS";
pub(crate) const RELOCS: &str = "RELOCS";
pub(crate) const IGNORE_KEY: &str = "ignore";

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("settings file {0} not found")]
    Missing(Utf8PathBuf),

    #[error("read {path}: {message}")]
    Read { path: Utf8PathBuf, message: String },

    #[error("invalid {key}: {message}")]
    Invalid { key: String, message: String },

    #[error("missing {0} in settings")]
    MissingCredential(String),
}

/// `[AUTH]` as written; every key is optional until credentials are needed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthSettings {
    pub url: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl AuthSettings {
    pub fn credentials(&self) -> Result<Credentials, SettingsError> {
        let need = |value: &Option<String>, key: &str| {
            value
                .clone()
                .filter(|v| !v.is_empty())
                .ok_or_else(|| SettingsError::MissingCredential(format!("{}.{}", AUTH, key)))
        };
        Ok(Credentials {
            url: need(&self.url, "url")?.trim_end_matches('/').to_string(),
            username: need(&self.username, "username")?,
            password: need(&self.password, "password")?,
        })
    }
}

/// Course service and repository credentials.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub url: String,
    pub username: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("url", &self.url)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CourseSettings {
    /// Local root directory name.
    pub name: String,
    pub unsorted: String,
    /// Repository server base URL.
    pub svn: Option<String>,
    pub ids: Vec<String>,
    pub jobs: Option<usize>,
}

impl Default for CourseSettings {
    fn default() -> Self {
        Self {
            name: "course".to_string(),
            unsorted: DEFAULT_UNSORTED.to_string(),
            svn: None,
            ids: vec![],
            jobs: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Settings {
    pub auth: AuthSettings,
    pub course: CourseSettings,
    pub overrides: Overrides,
}

/// Interpret a parsed settings file.
pub fn parse_settings(ini: &Ini) -> Result<Settings, SettingsError> {
    let get = |section: &str, key: &str| {
        ini.get_from(Some(section), key)
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    };

    let auth = AuthSettings {
        url: get(AUTH, "url"),
        username: get(AUTH, "username"),
        password: ini
            .get_from(Some(AUTH), "password")
            .map(str::to_string)
            .filter(|v| !v.is_empty()),
    };

    let defaults = CourseSettings::default();
    let jobs = match get(COURSE, "jobs") {
        Some(raw) => match raw.parse::<usize>() {
            Ok(0) | Err(_) => {
                return Err(SettingsError::Invalid {
                    key: format!("{}.jobs", COURSE),
                    message: format!("expected a positive number, got `{}`", raw),
                });
            }
            Ok(n) => Some(n),
        },
        None => None,
    };
    let course = CourseSettings {
        name: get(COURSE, "name").unwrap_or(defaults.name),
        unsorted: get(COURSE, "unsorted").unwrap_or(defaults.unsorted),
        svn: get(COURSE, "svn").map(|s| s.trim_end_matches('/').to_string()),
        ids: split_list(get(COURSE, "ids").as_deref().unwrap_or_default()),
        jobs,
    };

    Ok(Settings {
        auth,
        course,
        overrides: read_overrides(ini),
    })
}

/// The three override sections, normalised the way resolution reads them.
pub(crate) fn read_overrides(ini: &Ini) -> Overrides {
    let section = |name: &str| -> BTreeMap<String, String> {
        ini.section(Some(name))
            .map(|props| {
                props
                    .iter()
                    .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
                    .filter(|(k, v)| !k.is_empty() && !v.is_empty())
                    .collect()
            })
            .unwrap_or_default()
    };

    let ignored: BTreeSet<ReviewId> = ini
        .get_from(Some(COURSE), IGNORE_KEY)
        .map(split_list)
        .unwrap_or_default()
        .into_iter()
        .map(ReviewId::from)
        .collect();

    Overrides {
        links: section(RB_LINKS),
        relocations: section(RELOCS),
        ignored,
    }
}

/// Comma and/or whitespace separated values.
pub(crate) fn split_list(raw: &str) -> Vec<String> {
    raw.split(|c: char| c == ',' || c.is_whitespace())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
