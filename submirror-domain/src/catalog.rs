use std::collections::{BTreeMap, BTreeSet};
use submirror_types::error::IntegrityError;
use submirror_types::model::{Course, CourseSnapshot, Review, Student, Task};
use submirror_types::{CourseId, TaskId};
use tracing::warn;

/// Task hierarchy stored flat; ancestry is rebuilt by parent-id lookup.
#[derive(Debug, Clone, Default)]
pub struct TaskTree {
    tasks: BTreeMap<TaskId, Task>,
}

impl TaskTree {
    pub fn new(tasks: impl IntoIterator<Item = Task>) -> Self {
        let mut map = BTreeMap::new();
        for task in tasks {
            if map.contains_key(&task.id) {
                warn!(task = %task.id, "duplicate task id in feed; keeping the first");
                continue;
            }
            map.insert(task.id.clone(), task);
        }
        Self { tasks: map }
    }

    pub fn get(&self, id: &TaskId) -> Option<&Task> {
        self.tasks.get(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Task> {
        self.tasks.values()
    }

    /// Tasks from the top-level root down to `id` inclusive.
    pub fn ancestry(&self, id: &TaskId) -> Result<Vec<&Task>, IntegrityError> {
        let mut chain = Vec::new();
        let mut seen = BTreeSet::new();
        let mut cursor = id;
        loop {
            if !seen.insert(cursor) {
                return Err(IntegrityError::TaskCycle { task: id.clone() });
            }
            let task = self
                .tasks
                .get(cursor)
                .ok_or_else(|| IntegrityError::DanglingTask {
                    task: cursor.clone(),
                })?;
            chain.push(task);
            match &task.parent {
                Some(parent) => cursor = parent,
                None => break,
            }
        }
        chain.reverse();
        Ok(chain)
    }

    /// Directory segments for `id`, top-down.
    pub fn segments(&self, id: &TaskId) -> Result<Vec<String>, IntegrityError> {
        Ok(self.ancestry(id)?.iter().map(|t| t.segment()).collect())
    }

    /// `/`-joined segments, e.g. `hw1/part1`.
    pub fn display_path(&self, id: &TaskId) -> Result<String, IntegrityError> {
        Ok(self.segments(id)?.join("/"))
    }

    pub fn children<'a>(&'a self, id: &'a TaskId) -> impl Iterator<Item = &'a Task> + 'a {
        self.tasks
            .values()
            .filter(move |t| t.parent.as_ref() == Some(id))
    }

    /// Tasks sharing `id`'s parent within the same course, excluding `id` itself.
    pub fn siblings(&self, id: &TaskId) -> Vec<&Task> {
        let Some(task) = self.tasks.get(id) else {
            return vec![];
        };
        self.tasks
            .values()
            .filter(|t| t.id != task.id && t.parent == task.parent && t.course == task.course)
            .collect()
    }

    /// True when `ancestor` is `id` or lies on its ancestor chain.
    pub fn is_within(&self, id: &TaskId, ancestor: &TaskId) -> bool {
        match self.ancestry(id) {
            Ok(chain) => chain.iter().any(|t| &t.id == ancestor),
            Err(_) => id == ancestor,
        }
    }
}

/// Everything fetched for one run: courses, the task tree, enrolled students and reviews.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    courses: BTreeMap<CourseId, Course>,
    tree: TaskTree,
    students: BTreeMap<CourseId, BTreeMap<String, Student>>,
    reviews: Vec<Review>,
}

impl Catalog {
    pub fn from_snapshots(snapshots: impl IntoIterator<Item = CourseSnapshot>) -> Self {
        let mut courses = BTreeMap::new();
        let mut tasks = Vec::new();
        let mut students: BTreeMap<CourseId, BTreeMap<String, Student>> = BTreeMap::new();
        let mut reviews = Vec::new();
        let mut review_ids = BTreeSet::new();

        for snap in snapshots {
            let course_id = snap.course.id.clone();
            let roster = students.entry(course_id.clone()).or_default();
            for student in snap.students {
                roster.entry(student.login.clone()).or_insert(student);
            }
            tasks.extend(snap.tasks);
            for review in snap.reviews {
                if !review_ids.insert(review.id.clone()) {
                    warn!(review = %review.id, "duplicate review id in feed; keeping the first");
                    continue;
                }
                reviews.push(review);
            }
            courses.insert(course_id, snap.course);
        }

        Self {
            courses,
            tree: TaskTree::new(tasks),
            students,
            reviews,
        }
    }

    pub fn courses(&self) -> impl Iterator<Item = &Course> {
        self.courses.values()
    }

    pub fn tree(&self) -> &TaskTree {
        &self.tree
    }

    pub fn reviews(&self) -> &[Review] {
        &self.reviews
    }

    pub fn student(&self, course: &CourseId, login: &str) -> Option<&Student> {
        self.students.get(course).and_then(|r| r.get(login))
    }

    /// Unique task display paths, ordered by task id. Tasks with a broken ancestry are left out.
    pub fn task_listing(&self) -> Vec<(TaskId, String)> {
        let mut seen = BTreeSet::new();
        let mut out = Vec::new();
        for task in self.tree.iter() {
            match self.tree.display_path(&task.id) {
                Ok(path) => {
                    if seen.insert(path.clone()) {
                        out.push((task.id.clone(), path));
                    }
                }
                Err(err) => warn!(task = %task.id, error = %err, "task left out of listing"),
            }
        }
        out
    }

    /// Students of every course, one entry per login, sorted by display name.
    pub fn student_listing(&self) -> Vec<&Student> {
        let mut by_login: BTreeMap<&str, &Student> = BTreeMap::new();
        for roster in self.students.values() {
            for student in roster.values() {
                by_login.entry(student.login.as_str()).or_insert(student);
            }
        }
        let mut out: Vec<&Student> = by_login.into_values().collect();
        out.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.login.cmp(&b.login)));
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn task(id: &str, title: &str, parent: Option<&str>) -> Task {
        Task {
            id: TaskId::from(id),
            course: CourseId::from("1"),
            title: title.to_string(),
            parent: parent.map(TaskId::from),
        }
    }

    #[test]
    fn display_path_walks_to_root() {
        let tree = TaskTree::new(vec![
            task("1", "hw1", None),
            task("2", "part1", Some("1")),
            task("3", "a/b", Some("2")),
        ]);
        assert_eq!(tree.display_path(&TaskId::from("2")).unwrap(), "hw1/part1");
        assert_eq!(
            tree.segments(&TaskId::from("3")).unwrap(),
            vec!["hw1", "part1", "a_b"]
        );
    }

    #[test]
    fn missing_parent_is_dangling() {
        let tree = TaskTree::new(vec![task("2", "part1", Some("1"))]);
        assert_eq!(
            tree.ancestry(&TaskId::from("2")).unwrap_err(),
            IntegrityError::DanglingTask {
                task: TaskId::from("1")
            }
        );
    }

    #[test]
    fn cycle_is_reported() {
        let tree = TaskTree::new(vec![task("1", "a", Some("2")), task("2", "b", Some("1"))]);
        assert_eq!(
            tree.ancestry(&TaskId::from("1")).unwrap_err(),
            IntegrityError::TaskCycle {
                task: TaskId::from("1")
            }
        );
    }

    #[test]
    fn siblings_share_parent() {
        let tree = TaskTree::new(vec![
            task("1", "hw1", None),
            task("2", "part1", Some("1")),
            task("3", "part2", Some("1")),
            task("4", "hw2", None),
        ]);
        let ids: Vec<&str> = tree
            .siblings(&TaskId::from("2"))
            .iter()
            .map(|t| t.id.as_str())
            .collect();
        assert_eq!(ids, vec!["3"]);
        let parent_id = TaskId::from("1");
        let children: Vec<&str> = tree
            .children(&parent_id)
            .map(|t| t.id.as_str())
            .collect();
        assert_eq!(children, vec!["2", "3"]);
        assert!(tree.is_within(&TaskId::from("3"), &TaskId::from("1")));
        assert!(!tree.is_within(&TaskId::from("4"), &TaskId::from("1")));
    }

    #[test]
    fn listings_are_unique_and_sorted() {
        let catalog = Catalog::from_snapshots(vec![CourseSnapshot {
            course: Course {
                id: CourseId::from("1"),
                name: "Algo".to_string(),
            },
            tasks: vec![task("10", "hw2", None), task("9", "hw1", None), task("11", "hw1", None)],
            students: vec![
                Student {
                    login: "petrov".to_string(),
                    name: "Petr Petrov".to_string(),
                },
                Student {
                    login: "ivanov".to_string(),
                    name: "Ivan Ivanov".to_string(),
                },
            ],
            reviews: vec![],
        }]);

        let tasks: Vec<String> = catalog.task_listing().into_iter().map(|(_, p)| p).collect();
        assert_eq!(tasks, vec!["hw1", "hw2"]);

        let names: Vec<&str> = catalog
            .student_listing()
            .iter()
            .map(|s| s.name.as_str())
            .collect();
        assert_eq!(names, vec!["Ivan Ivanov", "Petr Petrov"]);
    }
}
