use crate::catalog::Catalog;
use camino::Utf8PathBuf;
use std::collections::BTreeMap;
use submirror_types::ReviewId;
use submirror_types::error::IntegrityError;
use submirror_types::model::{Review, Student, normalize_subpath, path_segment};
use submirror_types::overrides::Overrides;
use submirror_types::plan::Checkout;
use tracing::{debug, warn};

/// Where resolved reviews land on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    /// `<dest>/<course name>`.
    pub root: Utf8PathBuf,
    /// Directory under `root` holding whole-repository fetches.
    pub unsorted: String,
}

impl Layout {
    pub fn new(dest: impl Into<Utf8PathBuf>, course_name: &str, unsorted: &str) -> Self {
        Self {
            root: dest.into().join(path_segment(course_name)),
            unsorted: path_segment(unsorted),
        }
    }

    pub fn review_dir(&self, segments: &[String], student: &Student) -> Utf8PathBuf {
        let mut dir = self.root.clone();
        for segment in segments {
            dir.push(segment);
        }
        dir.push(student.segment());
        dir
    }

    pub fn unsorted_dir(&self, repository: &str) -> Utf8PathBuf {
        self.root.join(&self.unsorted).join(path_segment(repository))
    }

    pub fn unsorted_checkout(&self, repository: &str) -> Checkout {
        Checkout {
            repository: repository.to_string(),
            subpath: String::new(),
            local_dir: self.unsorted_dir(repository),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolutionOutcome {
    Resolved(Checkout),
    Ignored,
    Unresolved,
    Invalid(IntegrityError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub review: Review,
    /// Effective repository name (relocation applied).
    pub repository: String,
    /// Display path of the review's task; empty when the task tree is broken.
    pub task_path: String,
    /// Student display name, or the login when the student is unknown.
    pub student: String,
    pub outcome: ResolutionOutcome,
}

impl Resolution {
    pub fn checkout(&self) -> Option<&Checkout> {
        match &self.outcome {
            ResolutionOutcome::Resolved(c) => Some(c),
            _ => None,
        }
    }

    pub fn is_unresolved(&self) -> bool {
        matches!(self.outcome, ResolutionOutcome::Unresolved)
    }
}

/// Resolve every review in the catalog, then flag local-target collisions.
///
/// Pure given the catalog and the overrides snapshot.
pub fn resolve(catalog: &Catalog, overrides: &Overrides, layout: &Layout) -> Vec<Resolution> {
    let mut out: Vec<Resolution> = catalog
        .reviews()
        .iter()
        .map(|r| resolve_review(catalog, r, overrides, layout))
        .collect();
    mark_collisions(&mut out);
    out
}

/// Resolve one review in isolation. Collisions are not detected here.
pub fn resolve_review(
    catalog: &Catalog,
    review: &Review,
    overrides: &Overrides,
    layout: &Layout,
) -> Resolution {
    let tree = catalog.tree();
    let student = catalog.student(&review.course, &review.student);
    let mut resolution = Resolution {
        review: review.clone(),
        repository: overrides.repository_for(&review.student).to_string(),
        task_path: tree.display_path(&review.task).unwrap_or_default(),
        student: student
            .map(|s| s.name.clone())
            .unwrap_or_else(|| review.student.clone()),
        outcome: ResolutionOutcome::Unresolved,
    };

    if overrides.is_ignored(&review.id) {
        resolution.outcome = ResolutionOutcome::Ignored;
        return resolution;
    }

    let segments = match tree.segments(&review.task) {
        Ok(s) => s,
        Err(err) => {
            resolution.outcome = ResolutionOutcome::Invalid(err);
            return resolution;
        }
    };

    let Some(student) = student else {
        resolution.outcome = ResolutionOutcome::Invalid(IntegrityError::UnknownStudent {
            login: review.student.clone(),
        });
        return resolution;
    };

    let link = link_for(overrides, review, &resolution.task_path);
    let subpath = match (review.declared_subpath(), link) {
        (Some(declared), link) => {
            if let Some(link) = link {
                warn!(
                    review = %review.id,
                    task = %resolution.task_path,
                    declared = %declared,
                    link = %link,
                    "link is redundant: review declares its own path"
                );
            }
            Some(declared)
        }
        (None, link) => link,
    };

    resolution.outcome = match subpath {
        Some(subpath) => {
            let checkout = Checkout {
                repository: resolution.repository.clone(),
                subpath,
                local_dir: layout.review_dir(&segments, student),
            };
            debug!(
                review = %review.id,
                repository = %checkout.repository,
                subpath = %checkout.subpath,
                "resolved"
            );
            ResolutionOutcome::Resolved(checkout)
        }
        None => {
            debug!(review = %review.id, task = %resolution.task_path, "unresolved");
            ResolutionOutcome::Unresolved
        }
    };
    resolution
}

/// Link for a review's task: keyed by task id first, then by display path.
fn link_for(overrides: &Overrides, review: &Review, task_path: &str) -> Option<String> {
    overrides
        .link(review.task.as_str())
        .or_else(|| (!task_path.is_empty()).then(|| overrides.link(task_path)).flatten())
        .and_then(normalize_subpath)
}

fn mark_collisions(resolutions: &mut [Resolution]) {
    let mut by_target: BTreeMap<Utf8PathBuf, Vec<usize>> = BTreeMap::new();
    for (idx, r) in resolutions.iter().enumerate() {
        if let Some(c) = r.checkout() {
            by_target.entry(c.local_dir.clone()).or_default().push(idx);
        }
    }

    for (path, idxs) in by_target {
        if idxs.len() < 2 {
            continue;
        }
        let mut reviews: Vec<ReviewId> = idxs
            .iter()
            .map(|&i| resolutions[i].review.id.clone())
            .collect();
        reviews.sort();
        warn!(path = %path, count = reviews.len(), "local target collision");
        for i in idxs {
            resolutions[i].outcome = ResolutionOutcome::Invalid(IntegrityError::Collision {
                path: path.clone(),
                reviews: reviews.clone(),
            });
        }
    }
}
