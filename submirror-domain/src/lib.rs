//! Domain logic: turn course metadata + local overrides into a deterministic sync plan.
//!
//! This crate owns *what* should be fetched and where it lands. It does not talk to the course
//! service or the version-control server; those sit behind ports in `submirror-core`.

mod catalog;
mod filters;
mod interactive;
mod links;
mod planner;
mod ports;
mod resolver;

pub use catalog::{Catalog, TaskTree};
pub use filters::Filters;
pub use interactive::{
    DeclinePolicy, InteractiveError, InteractiveOutcome, InteractiveResolver, PromptAnswer,
    PromptRequest, ScriptedPrompter, infer_candidates, offerable_dirs,
};
pub use links::{LinkAudit, audit_links};
pub use planner::{PlanOptions, RevisionQueries, RevisionSnapshot, SyncPlan, plan, revision_queries};
pub use ports::{MemoryListing, MemoryOverrides, OverrideSink, Prompter, RepositoryListing};
pub use resolver::{Layout, Resolution, ResolutionOutcome, resolve, resolve_review};
