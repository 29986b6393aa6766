//! Port traits abstracting all I/O away from the pipeline.

use camino::Utf8Path;
use submirror_types::CourseId;
use submirror_types::error::RepositoryError;
use submirror_types::model::CourseSnapshot;
use submirror_types::plan::{Checkout, Revision};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MetadataError {
    /// Credentials were rejected; fatal for the whole run.
    #[error("credentials rejected: {0}")]
    Authentication(String),

    #[error("fetch failed: {0}")]
    Fetch(String),

    #[error("unreadable course feed: {0}")]
    Parse(String),
}

/// Course service queries. Called sequentially at the start of a run.
pub trait MetadataSource {
    fn load_course(&self, course: &CourseId) -> Result<CourseSnapshot, MetadataError>;
}

/// Version-control operations for per-student repositories.
///
/// Called from worker threads; calls for one repository are never concurrent.
pub trait RepositoryPort: Send + Sync {
    fn remote_head(&self, repository: &str) -> Result<Revision, RepositoryError>;

    /// Revision of the working copy at `checkout.local_dir`, `None` when there is no working copy
    /// of exactly that repository path.
    fn local_revision(&self, checkout: &Checkout) -> anyhow::Result<Option<Revision>>;

    /// Fetch `checkout` into its local directory and return the revision now on disk.
    fn checkout_or_update(&self, checkout: &Checkout) -> Result<Revision, RepositoryError>;

    /// Directories of the remote repository, at most two levels deep.
    fn list_dirs(&self, repository: &str) -> anyhow::Result<Vec<String>>;
}

/// File-system write operations.
pub trait WritePort: Send + Sync {
    fn write_file(&self, path: &Utf8Path, contents: &[u8]) -> anyhow::Result<()>;
    fn create_dir_all(&self, path: &Utf8Path) -> anyhow::Result<()>;
}
