use crate::catalog::Catalog;
use submirror_types::model::Review;

/// Selection filters. Values of one kind are OR-ed, kinds are AND-ed; an empty kind matches all.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Filters {
    /// Course ids.
    pub courses: Vec<String>,
    /// Task id, title or display path; matching a task selects its whole subtree.
    pub tasks: Vec<String>,
    /// Student login or display name.
    pub students: Vec<String>,
}

impl Filters {
    pub fn is_empty(&self) -> bool {
        self.courses.is_empty() && self.tasks.is_empty() && self.students.is_empty()
    }

    pub fn matches(&self, catalog: &Catalog, review: &Review) -> bool {
        self.matches_course(review)
            && self.matches_task(catalog, review)
            && self.matches_student(catalog, review)
    }

    fn matches_course(&self, review: &Review) -> bool {
        self.courses.is_empty()
            || self
                .courses
                .iter()
                .any(|c| c.trim() == review.course.as_str())
    }

    fn matches_task(&self, catalog: &Catalog, review: &Review) -> bool {
        if self.tasks.is_empty() {
            return true;
        }
        let tree = catalog.tree();
        let Ok(chain) = tree.ancestry(&review.task) else {
            return self.tasks.iter().any(|f| f.trim() == review.task.as_str());
        };
        let mut path = String::new();
        for task in chain {
            if !path.is_empty() {
                path.push('/');
            }
            path.push_str(&task.segment());
            let hit = self.tasks.iter().any(|f| {
                let f = f.trim().trim_matches('/');
                f == task.id.as_str() || f == task.title.trim() || f == path
            });
            if hit {
                return true;
            }
        }
        false
    }

    fn matches_student(&self, catalog: &Catalog, review: &Review) -> bool {
        if self.students.is_empty() {
            return true;
        }
        let name = catalog
            .student(&review.course, &review.student)
            .map(|s| s.name.as_str());
        self.students.iter().any(|f| {
            let f = f.trim();
            f == review.student || Some(f) == name.map(str::trim)
        })
    }
}
