use crate::interactive::{PromptAnswer, PromptRequest};
use camino::Utf8PathBuf;
use std::collections::BTreeMap;
use submirror_types::ReviewId;
use submirror_types::error::StoreError;
use submirror_types::overrides::Overrides;

/// Writable view of the persisted overrides.
///
/// Every mutation is persisted before it returns; callers never batch.
pub trait OverrideSink {
    /// Frozen copy for one resolution pass.
    fn snapshot(&self) -> Overrides;

    fn add_link(&mut self, task: &str, subpath: &str) -> Result<(), StoreError>;

    /// Returns false when no link existed.
    fn remove_link(&mut self, task: &str) -> Result<bool, StoreError>;

    /// Returns false when the review was already ignored.
    fn add_ignore(&mut self, review: &ReviewId) -> Result<bool, StoreError>;

    fn remove_ignore(&mut self, review: &ReviewId) -> Result<bool, StoreError>;

    fn set_relocation(&mut self, login: &str, repository: &str) -> Result<(), StoreError>;

    fn remove_relocation(&mut self, login: &str) -> Result<bool, StoreError>;
}

/// Subdirectory listing of a student repository, used to offer link candidates.
pub trait RepositoryListing {
    /// Relative directory paths (`/`-separated), at most two levels deep.
    fn list_dirs(&self, repository: &str) -> anyhow::Result<Vec<String>>;
}

/// Operator decision for one unresolved review. Implementations may block on input.
pub trait Prompter {
    fn ask(&mut self, request: &PromptRequest) -> anyhow::Result<PromptAnswer>;
}

/// In-memory `OverrideSink`.
#[derive(Debug, Clone, Default)]
pub struct MemoryOverrides {
    overrides: Overrides,
    fail_writes: bool,
}

impl MemoryOverrides {
    pub fn new(overrides: Overrides) -> Self {
        Self {
            overrides,
            fail_writes: false,
        }
    }

    /// Every mutation fails with a write error and leaves the state untouched.
    pub fn read_only(overrides: Overrides) -> Self {
        Self {
            overrides,
            fail_writes: true,
        }
    }

    fn check(&self, entry: String) -> Result<(), StoreError> {
        if self.fail_writes {
            return Err(StoreError::Write {
                path: Utf8PathBuf::from("<memory>"),
                entries: vec![entry],
                message: "store is read-only".to_string(),
            });
        }
        Ok(())
    }
}

impl OverrideSink for MemoryOverrides {
    fn snapshot(&self) -> Overrides {
        self.overrides.clone()
    }

    fn add_link(&mut self, task: &str, subpath: &str) -> Result<(), StoreError> {
        self.check(format!("RB_LINKS.{}", task))?;
        self.overrides
            .links
            .insert(task.to_string(), subpath.to_string());
        Ok(())
    }

    fn remove_link(&mut self, task: &str) -> Result<bool, StoreError> {
        self.check(format!("RB_LINKS.{}", task))?;
        Ok(self.overrides.links.remove(task).is_some())
    }

    fn add_ignore(&mut self, review: &ReviewId) -> Result<bool, StoreError> {
        self.check("COURSE.ignore".to_string())?;
        Ok(self.overrides.ignored.insert(review.clone()))
    }

    fn remove_ignore(&mut self, review: &ReviewId) -> Result<bool, StoreError> {
        self.check("COURSE.ignore".to_string())?;
        Ok(self.overrides.ignored.remove(review))
    }

    fn set_relocation(&mut self, login: &str, repository: &str) -> Result<(), StoreError> {
        self.check(format!("RELOCS.{}", login))?;
        self.overrides
            .relocations
            .insert(login.to_string(), repository.to_string());
        Ok(())
    }

    fn remove_relocation(&mut self, login: &str) -> Result<bool, StoreError> {
        self.check(format!("RELOCS.{}", login))?;
        Ok(self.overrides.relocations.remove(login).is_some())
    }
}

/// Fixed repository listings keyed by repository name.
#[derive(Debug, Clone, Default)]
pub struct MemoryListing {
    dirs: BTreeMap<String, Vec<String>>,
}

impl MemoryListing {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_dirs(mut self, repository: &str, dirs: &[&str]) -> Self {
        self.dirs.insert(
            repository.to_string(),
            dirs.iter().map(|d| d.to_string()).collect(),
        );
        self
    }
}

impl RepositoryListing for MemoryListing {
    fn list_dirs(&self, repository: &str) -> anyhow::Result<Vec<String>> {
        Ok(self.dirs.get(repository).cloned().unwrap_or_default())
    }
}
