//! Operator-driven linking for reviews that resolved to nothing.
//!
//! Sequential by nature: one prompt at a time, each answer persisted before the next prompt.

use crate::catalog::Catalog;
use crate::ports::{OverrideSink, Prompter, RepositoryListing};
use crate::resolver::{Layout, Resolution, ResolutionOutcome, resolve_review};
use std::collections::{BTreeSet, VecDeque};
use submirror_types::error::StoreError;
use submirror_types::model::{Review, normalize_subpath};
use submirror_types::overrides::Overrides;
use submirror_types::{ReviewId, TaskId};
use thiserror::Error;
use tracing::{info, warn};

/// Top-level directories that are never offered on their own.
const LAYOUT_DIRS: &[&str] = &["branches", "tags", "trunk"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptRequest {
    pub review: ReviewId,
    pub login: String,
    pub student: String,
    pub repository: String,
    pub task_path: String,
    pub candidates: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromptAnswer {
    /// Zero-based index into the offered candidates.
    Choose(usize),
    Literal(String),
    Decline,
}

impl PromptAnswer {
    /// Interpret typed input against `candidates` offered choices (numbered from 1).
    pub fn parse(input: &str, candidates: usize) -> Self {
        let input = input.trim();
        if input.is_empty() {
            return if candidates == 1 {
                PromptAnswer::Choose(0)
            } else {
                PromptAnswer::Decline
            };
        }
        if input == "-" {
            return PromptAnswer::Decline;
        }
        if input.chars().all(|c| c.is_ascii_digit()) {
            return match input.parse::<usize>() {
                Ok(n) if (1..=candidates).contains(&n) => PromptAnswer::Choose(n - 1),
                _ => PromptAnswer::Decline,
            };
        }
        match normalize_subpath(input) {
            Some(path) => PromptAnswer::Literal(path),
            None => PromptAnswer::Decline,
        }
    }
}

/// What happens to a review the operator declines.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DeclinePolicy {
    #[default]
    Keep,
    AutoIgnore,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InteractiveOutcome {
    /// A link was written for the review's task.
    Linked { task: TaskId, subpath: String },
    /// An earlier answer in this session already covers the review.
    AutoResolved { subpath: String },
    Ignored,
    Skipped,
}

#[derive(Debug, Error)]
pub enum InteractiveError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Prompt(anyhow::Error),
}

pub struct InteractiveResolver<'a> {
    catalog: &'a Catalog,
    layout: &'a Layout,
    listing: &'a dyn RepositoryListing,
    policy: DeclinePolicy,
}

impl<'a> InteractiveResolver<'a> {
    pub fn new(
        catalog: &'a Catalog,
        layout: &'a Layout,
        listing: &'a dyn RepositoryListing,
        policy: DeclinePolicy,
    ) -> Self {
        Self {
            catalog,
            layout,
            listing,
            policy,
        }
    }

    /// Prompt for every unresolved entry of `pending`, in order.
    ///
    /// Overrides are re-read from `sink` before each review so a link written for one review
    /// resolves the rest of that task without another prompt.
    pub fn run(
        &self,
        pending: &[Resolution],
        sink: &mut dyn OverrideSink,
        prompter: &mut dyn Prompter,
    ) -> Result<Vec<(ReviewId, InteractiveOutcome)>, InteractiveError> {
        let mut outcomes = Vec::new();

        for entry in pending.iter().filter(|r| r.is_unresolved()) {
            let review = &entry.review;
            let overrides = sink.snapshot();
            let current = resolve_review(self.catalog, review, &overrides, self.layout);
            match &current.outcome {
                ResolutionOutcome::Unresolved => {}
                ResolutionOutcome::Resolved(checkout) => {
                    info!(review = %review.id, subpath = %checkout.subpath, "resolved by earlier link");
                    outcomes.push((
                        review.id.clone(),
                        InteractiveOutcome::AutoResolved {
                            subpath: checkout.subpath.clone(),
                        },
                    ));
                    continue;
                }
                ResolutionOutcome::Ignored | ResolutionOutcome::Invalid(_) => continue,
            }

            let candidates = infer_candidates(
                self.catalog,
                review,
                &overrides,
                self.listing,
                &current.repository,
            );
            let request = PromptRequest {
                review: review.id.clone(),
                login: review.student.clone(),
                student: current.student.clone(),
                repository: current.repository.clone(),
                task_path: current.task_path.clone(),
                candidates,
            };

            let answer = prompter.ask(&request).map_err(InteractiveError::Prompt)?;
            let chosen = match answer {
                PromptAnswer::Choose(i) => request.candidates.get(i).cloned(),
                PromptAnswer::Literal(path) => normalize_subpath(&path),
                PromptAnswer::Decline => None,
            };

            let outcome = match chosen {
                Some(subpath) => {
                    sink.add_link(review.task.as_str(), &subpath)?;
                    info!(review = %review.id, task = %review.task, subpath = %subpath, "link added");
                    InteractiveOutcome::Linked {
                        task: review.task.clone(),
                        subpath,
                    }
                }
                None if self.policy == DeclinePolicy::AutoIgnore => {
                    sink.add_ignore(&review.id)?;
                    info!(review = %review.id, "review ignored");
                    InteractiveOutcome::Ignored
                }
                None => InteractiveOutcome::Skipped,
            };
            outcomes.push((review.id.clone(), outcome));
        }

        Ok(outcomes)
    }
}

/// Subpaths worth offering for an unresolved review, most specific first, without duplicates.
///
/// Order: the same student's declared paths on this task and its siblings, links of sibling
/// tasks, then directories present in the repository.
pub fn infer_candidates(
    catalog: &Catalog,
    review: &Review,
    overrides: &Overrides,
    listing: &dyn RepositoryListing,
    repository: &str,
) -> Vec<String> {
    let tree = catalog.tree();
    let siblings = tree.siblings(&review.task);
    let mut related: BTreeSet<&TaskId> = siblings.iter().map(|t| &t.id).collect();
    related.insert(&review.task);

    let mut own: Vec<&Review> = catalog
        .reviews()
        .iter()
        .filter(|o| {
            o.id != review.id
                && o.student == review.student
                && o.course == review.course
                && related.contains(&o.task)
        })
        .collect();
    own.sort_by(|a, b| a.task.cmp(&b.task).then_with(|| a.id.cmp(&b.id)));

    let mut out = Vec::new();
    let mut seen = BTreeSet::new();
    let mut offer = |path: String| {
        if seen.insert(path.clone()) {
            out.push(path);
        }
    };

    for other in own {
        if let Some(path) = other.declared_subpath() {
            offer(path);
        }
    }

    for sibling in &siblings {
        let by_path = tree.display_path(&sibling.id).ok();
        let link = overrides
            .link(sibling.id.as_str())
            .or_else(|| by_path.as_deref().and_then(|p| overrides.link(p)))
            .and_then(normalize_subpath);
        if let Some(link) = link {
            offer(link);
        }
    }

    match listing.list_dirs(repository) {
        Ok(dirs) => {
            for dir in offerable_dirs(dirs) {
                offer(dir);
            }
        }
        Err(err) => warn!(repository = %repository, error = %err, "repository listing failed"),
    }

    out
}

/// Keep directories at most two levels deep, drop `.svn` and bare `branches`/`tags`/`trunk`.
pub fn offerable_dirs(entries: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut out = BTreeSet::new();
    for entry in entries {
        let entry = entry.replace('\\', "/");
        let Some(path) = normalize_subpath(&entry) else {
            continue;
        };
        let parts: Vec<&str> = path.split('/').collect();
        if parts.len() > 2 || parts.iter().any(|p| p.is_empty() || *p == ".svn") {
            continue;
        }
        if parts.len() == 1 && LAYOUT_DIRS.contains(&parts[0]) {
            continue;
        }
        out.insert(path);
    }
    out.into_iter().collect()
}

/// Answers typed in advance; an exhausted script declines.
#[derive(Debug, Clone, Default)]
pub struct ScriptedPrompter {
    answers: VecDeque<String>,
    pub asked: Vec<PromptRequest>,
}

impl ScriptedPrompter {
    pub fn new<I, S>(answers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            answers: answers.into_iter().map(Into::into).collect(),
            asked: vec![],
        }
    }
}

impl Prompter for ScriptedPrompter {
    fn ask(&mut self, request: &PromptRequest) -> anyhow::Result<PromptAnswer> {
        self.asked.push(request.clone());
        Ok(match self.answers.pop_front() {
            Some(raw) => PromptAnswer::parse(&raw, request.candidates.len()),
            None => PromptAnswer::Decline,
        })
    }
}
