//! Course feed as served by `GET <url>/course/<id>?format=json`.
//!
//! Every field is optional on the wire; validation happens when the feed is lowered into the
//! model so that one malformed record never hides the rest of the course.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CourseFeedV1 {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub course_id: Option<serde_json::Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Kept raw so that each task can be decoded on its own.
    #[serde(default)]
    pub tasks: Vec<serde_json::Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskRecordV1 {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<serde_json::Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_task_id: Option<serde_json::Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(default)]
    pub students: Vec<serde_json::Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StudentRecordV1 {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<serde_json::Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub svn: Option<SvnRecordV1>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SvnRecordV1 {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub svn_path: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rb_review_id: Option<serde_json::Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub svn_rev: Option<serde_json::Value>,
}

/// Ids arrive as numbers or strings; anything else is not an id.
pub fn scalar_to_string(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) => {
            let s = s.trim();
            (!s.is_empty()).then(|| s.to_string())
        }
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Revisions arrive as numbers or numeric strings.
pub fn scalar_to_u64(value: &serde_json::Value) -> Option<u64> {
    match value {
        serde_json::Value::Number(n) => n.as_u64(),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
