//! BDD harness (cucumber-rs).
//!
//! Scenario steps describe courses by task path; [`CourseBuilder`] turns those descriptions into
//! the snapshot the course service would return.

use std::collections::BTreeMap;
use submirror_types::model::{Course, CourseSnapshot, Review, Student, Task};
use submirror_types::{CourseId, ReviewId, TaskId};

#[derive(Debug, Clone, Default)]
pub struct CourseBuilder {
    tasks: Vec<Task>,
    by_path: BTreeMap<String, TaskId>,
    students: Vec<Student>,
    reviews: Vec<Review>,
}

impl CourseBuilder {
    pub const COURSE_ID: &'static str = "1";

    pub fn new() -> Self {
        Self::default()
    }

    /// Create every task along `path` (`hw1/part1`) that does not exist yet.
    pub fn task(&mut self, path: &str) -> TaskId {
        let mut parent: Option<TaskId> = None;
        let mut prefix = String::new();
        for title in path.split('/').filter(|s| !s.is_empty()) {
            if !prefix.is_empty() {
                prefix.push('/');
            }
            prefix.push_str(title);

            let id = match self.by_path.get(&prefix) {
                Some(id) => id.clone(),
                None => {
                    let id = TaskId::new((self.tasks.len() + 1).to_string());
                    self.tasks.push(Task {
                        id: id.clone(),
                        course: CourseId::from(Self::COURSE_ID),
                        title: title.to_string(),
                        parent: parent.clone(),
                    });
                    self.by_path.insert(prefix.clone(), id.clone());
                    id
                }
            };
            parent = Some(id);
        }
        parent.unwrap_or_else(|| TaskId::from(path))
    }

    pub fn student(&mut self, login: &str, name: &str) {
        if !self.students.iter().any(|s| s.login == login) {
            self.students.push(Student {
                login: login.to_string(),
                name: name.to_string(),
            });
        }
    }

    pub fn review(&mut self, id: &str, task_path: &str, login: &str, declared: Option<&str>) {
        let task = self.task(task_path);
        self.reviews.push(Review {
            id: ReviewId::from(id),
            course: CourseId::from(Self::COURSE_ID),
            task,
            student: login.to_string(),
            subpath: declared.map(str::to_string),
            revision: None,
        });
    }

    pub fn snapshot(&self, name: &str) -> CourseSnapshot {
        CourseSnapshot {
            course: Course {
                id: CourseId::from(Self::COURSE_ID),
                name: name.to_string(),
            },
            tasks: self.tasks.clone(),
            students: self.students.clone(),
            reviews: self.reviews.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn nested_paths_share_their_parents() {
        let mut course = CourseBuilder::new();
        let part1 = course.task("hw1/part1");
        let part2 = course.task("hw1/part2");
        assert_eq!(part1, TaskId::from("2"));
        assert_eq!(part2, TaskId::from("3"));

        let snap = course.snapshot("Algo101");
        assert_eq!(snap.tasks.len(), 3);
        assert_eq!(snap.tasks[2].parent, Some(TaskId::from("1")));
    }
}
