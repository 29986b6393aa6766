//! Course metadata as fetched fresh on every run.

use crate::ids::{CourseId, ReviewId, TaskId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Course {
    pub id: CourseId,
    pub name: String,
}

/// One node of a course's task tree. Children are found by parent lookup, never owned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub course: CourseId,
    pub title: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<TaskId>,
}

impl Task {
    /// Directory segment for this task: the trimmed title with path separators neutralised.
    pub fn segment(&self) -> String {
        path_segment(&self.title)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Student {
    /// Unique within a course.
    pub login: String,
    /// Full name; used as the leaf directory of a local target.
    pub name: String,
}

impl Student {
    pub fn segment(&self) -> String {
        path_segment(&self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Review {
    pub id: ReviewId,
    pub course: CourseId,
    pub task: TaskId,
    /// Owning student's login.
    pub student: String,

    /// Repository subpath as declared by the student, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subpath: Option<String>,

    /// Revision the submission was made at, as recorded by the course service.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revision: Option<u64>,
}

impl Review {
    /// The declared subpath after normalisation; `None` when absent or blank.
    pub fn declared_subpath(&self) -> Option<String> {
        self.subpath.as_deref().and_then(normalize_subpath)
    }
}

/// Everything the course service reports for one course.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourseSnapshot {
    pub course: Course,

    #[serde(default)]
    pub tasks: Vec<Task>,

    #[serde(default)]
    pub students: Vec<Student>,

    #[serde(default)]
    pub reviews: Vec<Review>,
}

/// Trim whitespace and surrounding slashes; blank input yields `None`.
pub fn normalize_subpath(raw: &str) -> Option<String> {
    let trimmed = raw.trim().trim_matches('/').trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Stable directory name for a title or display name.
pub fn path_segment(raw: &str) -> String {
    let cleaned: String = raw
        .trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    match cleaned.as_str() {
        "" => "_".to_string(),
        "." | ".." => cleaned.replace('.', "_"),
        _ => cleaned,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn review(subpath: Option<&str>) -> Review {
        Review {
            id: ReviewId::from("1"),
            course: CourseId::from("7"),
            task: TaskId::from("3"),
            student: "ivanov".to_string(),
            subpath: subpath.map(str::to_string),
            revision: None,
        }
    }

    #[test]
    fn declared_subpath_is_normalised() {
        assert_eq!(
            review(Some(" /solutions/hw1/ ")).declared_subpath().as_deref(),
            Some("solutions/hw1")
        );
    }

    #[test]
    fn blank_declared_subpath_is_absent() {
        assert_eq!(review(Some("")).declared_subpath(), None);
        assert_eq!(review(Some("  / ")).declared_subpath(), None);
        assert_eq!(review(None).declared_subpath(), None);
    }

    #[test]
    fn path_segment_neutralises_separators() {
        assert_eq!(path_segment(" hw1 "), "hw1");
        assert_eq!(path_segment("a/b\\c"), "a_b_c");
        assert_eq!(path_segment(".."), "__");
        assert_eq!(path_segment("   "), "_");
        assert_eq!(path_segment("Ivan Ivanov"), "Ivan Ivanov");
    }
}
