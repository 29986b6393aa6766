use crate::settings::{
    COURSE, IGNORE_KEY, RB_LINKS, RELOCS, Settings, SettingsError, parse_settings, read_overrides,
};
use anyhow::Context;
use camino::{Utf8Path, Utf8PathBuf};
use fs_err as fs;
use ini::Ini;
use std::io::Write;
use submirror_domain::OverrideSink;
use submirror_types::ReviewId;
use submirror_types::error::StoreError;
use submirror_types::overrides::Overrides;
use tempfile::NamedTempFile;
use tracing::{debug, info};

/// The settings file plus its parsed view.
///
/// Each override mutation rewrites the whole file through a temp file in the same directory
/// and a rename; the in-memory copy changes only after the rename succeeded.
#[derive(Debug)]
pub struct SettingsStore {
    path: Utf8PathBuf,
    ini: Ini,
    settings: Settings,
}

impl SettingsStore {
    pub fn open(path: &Utf8Path) -> Result<Self, SettingsError> {
        if !path.exists() {
            return Err(SettingsError::Missing(path.to_path_buf()));
        }
        let contents = fs::read_to_string(path).map_err(|e| SettingsError::Read {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        let ini = Ini::load_from_str(&contents).map_err(|e| SettingsError::Read {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        let settings = parse_settings(&ini)?;
        debug!(path = %path, links = settings.overrides.links.len(), "settings loaded");
        Ok(Self {
            path: path.to_path_buf(),
            ini,
            settings,
        })
    }

    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    fn commit(&mut self, next: Ini, entries: Vec<String>) -> Result<(), StoreError> {
        write_atomic(&self.path, &next).map_err(|e| StoreError::Write {
            path: self.path.clone(),
            entries: entries.clone(),
            message: format!("{:#}", e),
        })?;
        self.settings.overrides = read_overrides(&next);
        self.ini = next;
        info!(path = %self.path, entries = %entries.join(", "), "settings updated");
        Ok(())
    }

    fn write_ignored(&mut self, ignored: &Overrides) -> Result<(), StoreError> {
        let mut next = self.ini.clone();
        let joined = ignored
            .ignored
            .iter()
            .map(ReviewId::as_str)
            .collect::<Vec<_>>()
            .join(", ");
        if joined.is_empty() {
            next.delete_from(Some(COURSE), IGNORE_KEY);
        } else {
            next.with_section(Some(COURSE)).set(IGNORE_KEY, joined);
        }
        self.commit(next, vec![format!("{}.{}", COURSE, IGNORE_KEY)])
    }
}

impl OverrideSink for SettingsStore {
    fn snapshot(&self) -> Overrides {
        self.settings.overrides.clone()
    }

    fn add_link(&mut self, task: &str, subpath: &str) -> Result<(), StoreError> {
        let mut next = self.ini.clone();
        next.with_section(Some(RB_LINKS)).set(task, subpath);
        self.commit(next, vec![format!("{}.{}", RB_LINKS, task)])
    }

    fn remove_link(&mut self, task: &str) -> Result<bool, StoreError> {
        if !self.settings.overrides.links.contains_key(task) {
            return Ok(false);
        }
        let mut next = self.ini.clone();
        next.delete_from(Some(RB_LINKS), task);
        self.commit(next, vec![format!("{}.{}", RB_LINKS, task)])?;
        Ok(true)
    }

    fn add_ignore(&mut self, review: &ReviewId) -> Result<bool, StoreError> {
        let mut wanted = self.settings.overrides.clone();
        if !wanted.ignored.insert(review.clone()) {
            return Ok(false);
        }
        self.write_ignored(&wanted)?;
        Ok(true)
    }

    fn remove_ignore(&mut self, review: &ReviewId) -> Result<bool, StoreError> {
        let mut wanted = self.settings.overrides.clone();
        if !wanted.ignored.remove(review) {
            return Ok(false);
        }
        self.write_ignored(&wanted)?;
        Ok(true)
    }

    fn set_relocation(&mut self, login: &str, repository: &str) -> Result<(), StoreError> {
        let mut next = self.ini.clone();
        next.with_section(Some(RELOCS)).set(login, repository);
        self.commit(next, vec![format!("{}.{}", RELOCS, login)])
    }

    fn remove_relocation(&mut self, login: &str) -> Result<bool, StoreError> {
        if !self.settings.overrides.relocations.contains_key(login) {
            return Ok(false);
        }
        let mut next = self.ini.clone();
        next.delete_from(Some(RELOCS), login);
        self.commit(next, vec![format!("{}.{}", RELOCS, login)])?;
        Ok(true)
    }
}

fn write_atomic(path: &Utf8Path, ini: &Ini) -> anyhow::Result<()> {
    let dir = match path.parent() {
        Some(p) if !p.as_str().is_empty() => p,
        _ => Utf8Path::new("."),
    };
    let mut tmp =
        NamedTempFile::new_in(dir).with_context(|| format!("create temp file in {}", dir))?;
    ini.write_to(&mut tmp)
        .with_context(|| format!("write {}", tmp.path().display()))?;
    tmp.flush().context("flush settings")?;
    tmp.as_file().sync_all().context("sync settings")?;
    tmp.persist(path.as_std_path())
        .with_context(|| format!("rename into {}", path))?;
    Ok(())
}
