//! Shared DTOs (schemas-as-code) for the submirror workspace.
//!
//! # Design constraints
//! - Run reports are serialized to disk; prefer adding optional fields over changing semantics.
//! - Nothing in this crate performs I/O.

pub mod error;
pub mod ids;
pub mod model;
pub mod overrides;
pub mod plan;
pub mod report;
pub mod wire;

pub use ids::{CourseId, ReviewId, TaskId};

/// Schema identifiers.
pub mod schema {
    pub const SUBMIRROR_REPORT_V1: &str = "submirror.report.v1";
}
