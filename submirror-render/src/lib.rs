//! Rendering helpers (plain text) for listings, plans and run summaries.

use submirror_types::TaskId;
use submirror_types::model::Student;
use submirror_types::plan::{Revision, SyncDecision};
use submirror_types::report::{RunReport, SkipReason};

/// One line per task display path.
pub fn render_task_listing(tasks: &[(TaskId, String)]) -> String {
    let mut out = String::new();
    for (_, path) in tasks {
        out.push_str(path);
        out.push('\n');
    }
    out
}

/// `Name (login)` per student, in the order given.
pub fn render_student_listing(students: &[&Student]) -> String {
    let mut out = String::new();
    for s in students {
        out.push_str(&format!("{} ({})\n", s.name, s.login));
    }
    out
}

fn rev(r: Option<Revision>) -> String {
    r.map(|r| r.to_string()).unwrap_or_else(|| "-".to_string())
}

/// Pending work, one decision per line.
pub fn render_plan(decisions: &[SyncDecision]) -> String {
    if decisions.is_empty() {
        return "nothing selected\n".to_string();
    }

    let width = decisions
        .iter()
        .map(|d| d.kind.label().len())
        .max()
        .unwrap_or(0);
    let mut out = String::new();
    for d in decisions {
        out.push_str(&format!(
            "{:<width$}  {}/{}  {}",
            d.kind.label(),
            d.task_path,
            d.student,
            d.repository,
            width = width
        ));
        if let Some(target) = &d.target
            && !target.subpath.is_empty()
        {
            out.push_str(&format!("/{}", target.subpath));
        }
        if d.remote.is_some() {
            out.push_str(&format!("  {} -> {}", rev(d.local), rev(d.remote)));
        }
        out.push_str(&format!("  (review {})\n", d.review));
    }
    out
}

fn skip_label(reason: SkipReason) -> &'static str {
    match reason {
        SkipReason::Cancelled => "cancelled",
        SkipReason::OnlyUpdates => "no working copy",
        SkipReason::DryRun => "pending",
    }
}

/// Counts, skipped fetches and every collected error with what to re-run it by.
pub fn render_summary(report: &RunReport) -> String {
    let c = &report.counts;
    let mut out = String::new();
    out.push_str(&format!(
        "{} to sync, {} up to date, {} unsorted, {} ignored, {} unresolved\n",
        c.sync, c.up_to_date, c.unsorted_fetch, c.ignored, c.unresolved
    ));
    if !report.dry_run {
        out.push_str(&format!("fetched {}\n", report.fetched.len()));
    }

    if !report.skipped.is_empty() {
        out.push_str(&format!("skipped {}:\n", report.skipped.len()));
        for s in &report.skipped {
            out.push_str(&format!(
                "  {} ({})\n",
                s.checkout.local_dir,
                skip_label(s.reason)
            ));
        }
    }

    if !report.errors.is_empty() {
        out.push_str(&format!("errors {}:\n", report.errors.len()));
        for e in &report.errors {
            out.push_str(&format!("  [{}] {}\n", e.subject(), e));
        }
    }
    out
}

/// Outcome of a link audit; `applied` tells whether the links were removed.
pub fn render_link_audit(stale: &[String], redundant: &[String], applied: bool) -> String {
    if stale.is_empty() && redundant.is_empty() {
        return "no stale or redundant links\n".to_string();
    }
    let verb = if applied { "removed" } else { "would remove" };
    let mut out = String::new();
    for key in stale {
        out.push_str(&format!("{} {} (matches no task)\n", verb, key));
    }
    for key in redundant {
        out.push_str(&format!("{} {} (redundant)\n", verb, key));
    }
    out
}
