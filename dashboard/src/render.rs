//! Plain-text rendering of pipeline snapshots

use std::fmt::Write;

use chrono::{DateTime, Utc};
use colored::{ColoredString, Colorize};

use crate::controller::ControllerStatus;
use crate::models::pipeline::{Action, Pipeline, Stage, Status};

const YEAR_SECS: i64 = 31_557_600;
const DAY_SECS: i64 = 86_400;
const HOUR_SECS: i64 = 3_600;
const MINUTE_SECS: i64 = 60;

fn unit(count: i64, name: &str) -> String {
    if count == 1 {
        format!("{} {}", count, name)
    } else {
        format!("{} {}s", count, name)
    }
}

/// Human-readable age such as `"1 day 2 hours ago"`.
///
/// Seconds are shown only when no larger unit applies. Negative ages from
/// clock skew render as zero.
pub fn humanize_elapsed(elapsed: chrono::Duration) -> String {
    let secs = elapsed.num_seconds().max(0);

    let levels = [
        (secs / YEAR_SECS, "year"),
        (secs % YEAR_SECS / DAY_SECS, "day"),
        (secs % YEAR_SECS % DAY_SECS / HOUR_SECS, "hour"),
        (secs % HOUR_SECS / MINUTE_SECS, "minute"),
    ];

    let parts: Vec<String> = levels
        .iter()
        .filter(|(count, _)| *count > 0)
        .map(|(count, name)| unit(*count, name))
        .collect();

    let text = if parts.is_empty() {
        unit(secs % MINUTE_SECS, "second")
    } else {
        parts.join(" ")
    };
    format!("{} ago", text)
}

fn paint(status: Option<Status>) -> ColoredString {
    match status {
        Some(Status::Succeeded) => "Succeeded".green(),
        Some(Status::Failed) => "Failed".red(),
        Some(Status::InProgress) => "InProgress".blue(),
        Some(Status::Unknown) | None => "Unknown".dimmed(),
    }
}

fn render_action(out: &mut String, action: &Action, now: DateTime<Utc>) {
    let _ = write!(out, "    {}", action.name);
    if let Some(action_type) = &action.action_type {
        let _ = write!(out, " ({})", action_type);
    }
    let _ = write!(out, "  {}", paint(action.status));
    if let Some(status_time) = action.status_time {
        let _ = write!(out, "  {}", humanize_elapsed(now - status_time));
    }
    out.push('\n');

    if let Some(repo) = &action.repo {
        let _ = writeln!(out, "      Repository: {}", repo);
    }
    if let Some(branch) = &action.branch {
        let _ = writeln!(out, "      Branch: {}", branch);
    }
    if let Some(details) = &action.details {
        let _ = writeln!(out, "      Details: {}", details);
    }
    if action.has_build_logs() {
        if let Some(id) = &action.id {
            let _ = writeln!(out, "      Build logs: {}", id);
        }
    }
}

fn render_stage(out: &mut String, stage: &Stage, now: DateTime<Utc>) {
    let _ = writeln!(out, "  {}  {}", stage.name.bold(), paint(stage.status));
    for action in &stage.actions {
        render_action(out, action, now);
    }
}

/// Status tree of one pipeline snapshot
pub fn render_pipeline(pipeline: &Pipeline, now: DateTime<Utc>) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{} (version {})", pipeline.name.bold(), pipeline.version);
    for stage in &pipeline.stages {
        render_stage(&mut out, stage, now);
    }
    out
}

/// Status tree of a controller, with loading and failure notes
pub fn render_status(status: &ControllerStatus, now: DateTime<Utc>) -> String {
    let mut out = match &status.snapshot {
        Some(snapshot) => render_pipeline(snapshot, now),
        None if status.is_loading => format!("{}  {}\n", status.pipeline.bold(), "loading".dimmed()),
        None => format!("{}\n", status.pipeline.bold()),
    };

    if let Some(stale_since) = status.stale_since {
        let _ = writeln!(
            out,
            "  {} since {}",
            "stale".yellow(),
            humanize_elapsed(now - stale_since)
        );
    }
    if let Some(error) = &status.last_error {
        let _ = writeln!(out, "  {}: {}", "error".red(), error);
    }
    out
}
