//! Lowering of the course feed into the data model.
//!
//! Malformed records are skipped with a log line; only a body that is not a JSON object at all
//! is an error.

use submirror_types::model::{Course, CourseSnapshot, Review, Student, Task};
use submirror_types::wire::{
    CourseFeedV1, StudentRecordV1, TaskRecordV1, scalar_to_string, scalar_to_u64,
};
use submirror_types::{CourseId, ReviewId, TaskId};
use tracing::{debug, warn};

pub fn parse_course_feed(course: &CourseId, body: &str) -> anyhow::Result<CourseSnapshot> {
    let value: serde_json::Value = serde_json::from_str(body)?;
    if !value.is_object() {
        anyhow::bail!("expected a JSON object");
    }
    let feed: CourseFeedV1 = serde_json::from_value(value)?;
    Ok(lower_feed(course, feed))
}

pub fn lower_feed(course: &CourseId, feed: CourseFeedV1) -> CourseSnapshot {
    let name = feed
        .name
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| course.to_string());

    let mut snapshot = CourseSnapshot {
        course: Course {
            id: course.clone(),
            name,
        },
        tasks: vec![],
        students: vec![],
        reviews: vec![],
    };

    for (idx, raw) in feed.tasks.into_iter().enumerate() {
        let record: TaskRecordV1 = match serde_json::from_value(raw) {
            Ok(r) => r,
            Err(err) => {
                warn!(course = %course, index = idx, error = %err, "skipping malformed task");
                continue;
            }
        };
        let Some(task_id) = record.task_id.as_ref().and_then(scalar_to_string) else {
            warn!(course = %course, index = idx, "skipping task without id");
            continue;
        };
        let Some(title) = record
            .title
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
        else {
            warn!(course = %course, task = %task_id, "skipping task without title");
            continue;
        };

        let task = Task {
            id: TaskId::new(task_id),
            course: course.clone(),
            title: title.to_string(),
            parent: record
                .parent_task_id
                .as_ref()
                .and_then(scalar_to_string)
                .map(TaskId::new),
        };

        for raw_student in record.students {
            lower_student(course, &task, raw_student, &mut snapshot);
        }
        snapshot.tasks.push(task);
    }

    debug!(
        course = %course,
        tasks = snapshot.tasks.len(),
        students = snapshot.students.len(),
        reviews = snapshot.reviews.len(),
        "course feed lowered"
    );
    snapshot
}

fn lower_student(
    course: &CourseId,
    task: &Task,
    raw: serde_json::Value,
    snapshot: &mut CourseSnapshot,
) {
    let record: StudentRecordV1 = match serde_json::from_value(raw) {
        Ok(r) => r,
        Err(err) => {
            warn!(course = %course, task = %task.id, error = %err, "skipping malformed student");
            return;
        }
    };
    let login = record.username.as_deref().map(str::trim).unwrap_or("");
    let name = record.user_name.as_deref().map(str::trim).unwrap_or("");
    if login.is_empty() || name.is_empty() {
        warn!(course = %course, task = %task.id, "skipping student without login or name");
        return;
    }

    if !snapshot.students.iter().any(|s| s.login == login) {
        snapshot.students.push(Student {
            login: login.to_string(),
            name: name.to_string(),
        });
    }

    let Some(svn) = record.svn else {
        debug!(task = %task.id, student = %login, "no submission");
        return;
    };
    let Some(review_id) = svn.rb_review_id.as_ref().and_then(scalar_to_string) else {
        warn!(task = %task.id, student = %login, "skipping submission without review id");
        return;
    };

    snapshot.reviews.push(Review {
        id: ReviewId::new(review_id),
        course: course.clone(),
        task: task.id.clone(),
        student: login.to_string(),
        subpath: svn.svn_path,
        revision: svn.svn_rev.as_ref().and_then(scalar_to_u64),
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const FEED: &str = r#"{
        "name": "Algorithms",
        "tasks": [
            {"task_id": 1, "title": "hw1", "students": []},
            {"task_id": 2, "parent_task_id": 1, "title": " part1 ", "students": [
                {"username": "ivanov", "user_name": "Ivan Ivanov",
                 "svn": {"svn_path": "", "rb_review_id": 17, "svn_rev": "41"}},
                {"username": "petrov", "user_name": "Petr Petrov", "svn": null},
                {"username": "", "user_name": "Nobody"},
                {"username": "sidorov", "user_name": "Sid Sidorov", "svn": {"svn_path": "x"}}
            ]},
            {"title": "no id"},
            "garbage"
        ]
    }"#;

    #[test]
    fn tolerant_lowering_keeps_good_records() {
        let snap = parse_course_feed(&CourseId::from("12"), FEED).expect("parse");

        assert_eq!(snap.course.name, "Algorithms");
        let tasks: Vec<(&str, Option<&str>, &str)> = snap
            .tasks
            .iter()
            .map(|t| {
                (
                    t.id.as_str(),
                    t.parent.as_ref().map(TaskId::as_str),
                    t.title.as_str(),
                )
            })
            .collect();
        assert_eq!(tasks, vec![("1", None, "hw1"), ("2", Some("1"), "part1")]);

        let logins: Vec<&str> = snap.students.iter().map(|s| s.login.as_str()).collect();
        assert_eq!(logins, vec!["ivanov", "petrov", "sidorov"]);

        assert_eq!(
            snap.reviews,
            vec![Review {
                id: ReviewId::from("17"),
                course: CourseId::from("12"),
                task: TaskId::from("2"),
                student: "ivanov".to_string(),
                subpath: Some(String::new()),
                revision: Some(41),
            }]
        );
        assert_eq!(snap.reviews[0].declared_subpath(), None);
    }

    #[test]
    fn non_object_body_is_an_error() {
        assert!(parse_course_feed(&CourseId::from("1"), "[]").is_err());
        assert!(parse_course_feed(&CourseId::from("1"), "<html>").is_err());
    }

    #[test]
    fn course_name_falls_back_to_id() {
        let snap = parse_course_feed(&CourseId::from("12"), r#"{"tasks": []}"#).expect("parse");
        assert_eq!(snap.course.name, "12");
    }
}
