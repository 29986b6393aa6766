//! Error taxonomy shared by every stage of a run.
//!
//! Per-item errors are collected into the run report; only authentication and store write
//! failures abort a run.

use crate::ids::{CourseId, ReviewId, TaskId};
use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Per-review data problems found while resolving.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum IntegrityError {
    #[error("task {task} is not part of the fetched task tree")]
    DanglingTask { task: TaskId },

    #[error("student `{login}` is not enrolled in the course")]
    UnknownStudent { login: String },

    #[error("task {task} is its own ancestor")]
    TaskCycle { task: TaskId },

    #[error("{} reviews resolve to {path}", reviews.len())]
    Collision {
        path: Utf8PathBuf,
        reviews: Vec<ReviewId>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "error", rename_all = "snake_case")]
pub enum RunError {
    #[error("authentication failed: {message}")]
    AuthenticationFailure { message: String },

    #[error("course {course}: metadata fetch failed: {message}")]
    MetadataFetchFailure { course: CourseId, message: String },

    #[error("review {review}: {kind}")]
    DataIntegrity {
        review: ReviewId,
        kind: IntegrityError,
    },

    #[error("repository `{repository}` unavailable: {message}")]
    RepositoryUnavailable { repository: String, message: String },

    #[error("repository `{repository}` has no path `{subpath}`")]
    PathNotFound { repository: String, subpath: String },

    /// The local side of a checkout: an unreadable working copy or a target directory that
    /// cannot be created.
    #[error("working copy {dir} of `{repository}`: {message}")]
    WorkingCopyFailure {
        repository: String,
        dir: Utf8PathBuf,
        message: String,
    },

    #[error("settings write failed for {}: {message}", entries.join(", "))]
    StoreWriteFailure {
        entries: Vec<String>,
        message: String,
    },
}

impl RunError {
    /// Identifier the operator can narrow a re-run with.
    pub fn subject(&self) -> String {
        match self {
            RunError::AuthenticationFailure { .. } => "auth".to_string(),
            RunError::MetadataFetchFailure { course, .. } => format!("course {}", course),
            RunError::DataIntegrity { review, .. } => format!("review {}", review),
            RunError::RepositoryUnavailable { repository, .. }
            | RunError::PathNotFound { repository, .. }
            | RunError::WorkingCopyFailure { repository, .. } => {
                format!("repository {}", repository)
            }
            RunError::StoreWriteFailure { entries, .. } => entries.join(", "),
        }
    }

    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            RunError::AuthenticationFailure { .. } | RunError::StoreWriteFailure { .. }
        )
    }
}

/// Failure reported by a repository adapter.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RepositoryError {
    #[error("repository `{repository}` unavailable: {message}")]
    Unavailable { repository: String, message: String },

    #[error("repository `{repository}` has no path `{subpath}`")]
    PathNotFound { repository: String, subpath: String },
}

impl From<RepositoryError> for RunError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::Unavailable {
                repository,
                message,
            } => RunError::RepositoryUnavailable {
                repository,
                message,
            },
            RepositoryError::PathNotFound {
                repository,
                subpath,
            } => RunError::PathNotFound {
                repository,
                subpath,
            },
        }
    }
}

/// Failure persisting an override mutation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("write {path}: {message}")]
    Write {
        path: Utf8PathBuf,
        /// `SECTION.key` entries the mutation was meant to persist.
        entries: Vec<String>,
        message: String,
    },
}

impl StoreError {
    pub fn entries(&self) -> &[String] {
        match self {
            StoreError::Write { entries, .. } => entries,
        }
    }
}

impl From<StoreError> for RunError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Write {
                path,
                entries,
                message,
            } => RunError::StoreWriteFailure {
                entries,
                message: format!("{}: {}", path, message),
            },
        }
    }
}
