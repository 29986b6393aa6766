use crate::catalog::Catalog;
use std::collections::BTreeSet;
use submirror_types::TaskId;
use submirror_types::overrides::Overrides;

/// Link keys that no longer pull their weight.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkAudit {
    /// Keys matching no fetched task id or display path.
    pub stale: Vec<String>,
    /// Keys whose task has reviews, all of which declare their own subpath.
    pub redundant: Vec<String>,
}

impl LinkAudit {
    pub fn is_empty(&self) -> bool {
        self.stale.is_empty() && self.redundant.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.stale.iter().chain(self.redundant.iter())
    }
}

pub fn audit_links(catalog: &Catalog, overrides: &Overrides) -> LinkAudit {
    let tree = catalog.tree();
    let mut audit = LinkAudit::default();

    for key in overrides.links.keys() {
        let wanted = key.trim().trim_matches('/');
        let tasks: BTreeSet<&TaskId> = tree
            .iter()
            .filter(|t| {
                t.id.as_str() == wanted
                    || tree.display_path(&t.id).is_ok_and(|p| p == wanted)
            })
            .map(|t| &t.id)
            .collect();

        if tasks.is_empty() {
            audit.stale.push(key.clone());
            continue;
        }

        let mut reviews = catalog
            .reviews()
            .iter()
            .filter(|r| tasks.contains(&r.task))
            .peekable();
        if reviews.peek().is_some() && reviews.all(|r| r.declared_subpath().is_some()) {
            audit.redundant.push(key.clone());
        }
    }

    audit
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use submirror_types::CourseId;
    use submirror_types::ReviewId;
    use submirror_types::model::{Course, CourseSnapshot, Review, Task};

    #[test]
    fn finds_stale_and_redundant_links() {
        let course = CourseId::from("1");
        let review = |id: &str, task: &str, subpath: Option<&str>| Review {
            id: ReviewId::from(id),
            course: course.clone(),
            task: TaskId::from(task),
            student: "ivanov".to_string(),
            subpath: subpath.map(str::to_string),
            revision: None,
        };
        let catalog = Catalog::from_snapshots(vec![CourseSnapshot {
            course: Course {
                id: course.clone(),
                name: "Algo101".to_string(),
            },
            tasks: vec![
                Task {
                    id: TaskId::from("1"),
                    course: course.clone(),
                    title: "hw1".to_string(),
                    parent: None,
                },
                Task {
                    id: TaskId::from("2"),
                    course: course.clone(),
                    title: "hw2".to_string(),
                    parent: None,
                },
                Task {
                    id: TaskId::from("3"),
                    course: course.clone(),
                    title: "hw3".to_string(),
                    parent: None,
                },
            ],
            students: vec![],
            reviews: vec![
                review("10", "1", Some("hw1")),
                review("11", "2", None),
                review("12", "2", Some("hw2")),
            ],
        }]);

        let mut overrides = Overrides::default();
        for key in ["hw1", "2", "3", "old"] {
            overrides.links.insert(key.to_string(), "x".to_string());
        }

        let audit = audit_links(&catalog, &overrides);
        assert_eq!(audit.stale, vec!["old".to_string()]);
        assert_eq!(audit.redundant, vec!["hw1".to_string()]);
    }
}
