//! Advisory decision providers
//!
//! A [`DecisionProvider`] looks at the full task inventory plus the policy
//! thresholds and proposes one [`Decision`] per task. Providers have no
//! authority: every proposal still passes the Safety Gate before anything
//! reaches the backend.
//!
//! The request/response contract for text-generating providers lives here as
//! plain functions so that any implementation can share it:
//! - [`TaskSummary`] is the structured view of a task the provider sees
//! - [`build_prompt`] renders thresholds and summaries into one request text
//! - [`strip_wrappers`] removes decorative fencing around the reply
//! - [`parse_decisions`] turns the stripped reply into typed decisions
//! - [`retain_known`] discards decisions for ids outside the inventory

use crate::config::PolicyConfig;
use crate::error::OracleError;
use crate::types::{Decision, Task, TaskId};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::LazyLock;

mod gemini;

pub use gemini::GeminiOracle;

/// Trait for advisory decision providers
#[async_trait]
pub trait DecisionProvider: Send + Sync {
    /// Propose actions for the given tasks
    ///
    /// Returns `None` when no advisory is available (missing credentials,
    /// retries exhausted). `Some(vec![])` means the provider explicitly
    /// proposed nothing. Every returned decision references a task in `tasks`.
    async fn propose(&self, tasks: &[Task], policy: &PolicyConfig) -> Option<Vec<Decision>>;

    /// Human-readable name for logging
    fn name(&self) -> &'static str;
}

/// Provider that never has an opinion
///
/// Used when no oracle is configured; every run becomes read-only.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoOpDecisionProvider;

#[async_trait]
impl DecisionProvider for NoOpDecisionProvider {
    async fn propose(&self, _tasks: &[Task], _policy: &PolicyConfig) -> Option<Vec<Decision>> {
        None
    }

    fn name(&self) -> &'static str {
        "noop"
    }
}

/// Per-task view sent to the oracle
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TaskSummary {
    /// Task id the oracle must echo back
    pub id: String,
    /// Task title
    pub name: String,
    /// Total size in MiB, one decimal
    pub size_mb: f64,
    /// Backend status string
    pub status: String,
    /// Download speed in KiB/s, one decimal
    pub speed_kb: f64,
    /// Progress in percent, one decimal
    pub progress_pct: f64,
    /// Hours since creation, one decimal
    pub age_hours: f64,
}

impl TaskSummary {
    /// Summarize `task` as of `now`
    pub fn from_task(task: &Task, now: DateTime<Utc>) -> Self {
        Self {
            id: task.id.to_string(),
            name: task.title.clone(),
            size_mb: round1(task.size_bytes as f64 / 1_048_576.0),
            status: task.status.to_string(),
            speed_kb: round1(task.speed_bytes_per_sec as f64 / 1024.0),
            progress_pct: round1(task.progress_pct()),
            age_hours: round1(task.age_hours(now)),
        }
    }
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Summaries for every task, unfiltered
pub fn summarize(tasks: &[Task], now: DateTime<Utc>) -> Vec<TaskSummary> {
    tasks.iter().map(|t| TaskSummary::from_task(t, now)).collect()
}

/// Render the request text: thresholds in prose, then the task summary as JSON
pub fn build_prompt(
    summaries: &[TaskSummary],
    policy: &PolicyConfig,
) -> Result<String, serde_json::Error> {
    let tasks_json = serde_json::to_string(summaries)?;
    let ceiling = policy.max_active_tasks;
    let dead_age = policy.dead_task_age_hours;

    Ok(format!(
        "You are the download scheduler for a small, memory-constrained NAS.\n\
         Goal: maximize completed downloads and clear out tasks that will never finish.\n\
         \n\
         Constraints:\n\
         1. Concurrency ceiling: at most {ceiling} tasks may be \"downloading\" or \"waiting\". Every other task must be paused.\n\
         2. Dead tasks: a task whose size is 0 MB or whose progress is 0% and whose age exceeds {dead_age} hours is dead and should be deleted.\n\
         \n\
         Decision rules:\n\
         - delete: dead tasks (0 MB or 0% and older than {dead_age} h) and obvious junk.\n\
         - resume: the {ceiling} remaining tasks most likely to finish, judged by speed, progress and closeness to completion.\n\
         - pause: every task not chosen for resume, to free resources.\n\
         - keep: the task is already where it should be.\n\
         \n\
         Current tasks:\n\
         {tasks_json}\n\
         \n\
         Reply with a JSON array only, one object per task, no prose:\n\
         [{{\"id\": \"<task id>\", \"action\": \"delete|pause|resume|keep\", \"reason\": \"<short reason>\"}}]\n"
    ))
}

#[allow(clippy::expect_used)]
static FENCE: LazyLock<Regex> = LazyLock::new(|| {
    // Opening fence with an optional info string, then everything up to the
    // closing fence or the end of the text
    Regex::new(r"(?s)```[A-Za-z0-9_+.-]*[ \t]*\r?\n?(.*?)(?:```|\z)")
        .expect("fence pattern is a valid regex")
});

/// Remove decorative wrappers around a reply payload
///
/// Trims the text; when a triple-backtick fence is present, keeps only the
/// body of the first fenced block (the info string such as `json` is dropped)
/// and trims again. Unfenced text is returned trimmed.
pub fn strip_wrappers(text: &str) -> &str {
    let trimmed = text.trim();
    match FENCE.captures(trimmed).and_then(|c| c.get(1)) {
        Some(body) => body.as_str().trim(),
        None => trimmed,
    }
}

/// Decode a stripped reply into decisions
///
/// The payload must be a JSON array. Elements that are not decision objects
/// (no string `id`, no string `action`) are dropped with a warning rather
/// than failing the whole reply.
pub fn parse_decisions(payload: &str) -> Result<Vec<Decision>, OracleError> {
    let value: Value = serde_json::from_str(payload)
        .map_err(|e| OracleError::Decode(format!("reply is not JSON: {}", e)))?;

    let Value::Array(items) = value else {
        return Err(OracleError::Decode(
            "reply is not a JSON array of decisions".into(),
        ));
    };

    let mut decisions = Vec::with_capacity(items.len());
    for item in items {
        match serde_json::from_value::<Decision>(item) {
            Ok(decision) => decisions.push(decision),
            Err(e) => tracing::warn!(error = %e, "dropping malformed decision element"),
        }
    }
    Ok(decisions)
}

/// Keep only decisions whose task id is in `tasks`
///
/// Returns the surviving decisions and how many were dropped.
pub fn retain_known(decisions: Vec<Decision>, tasks: &[Task]) -> (Vec<Decision>, usize) {
    let known: HashSet<&TaskId> = tasks.iter().map(|t| &t.id).collect();
    let before = decisions.len();
    let kept: Vec<Decision> = decisions
        .into_iter()
        .filter(|d| {
            let keep = known.contains(&d.task_id);
            if !keep {
                tracing::info!(
                    task_id = %d.task_id,
                    action = %d.action,
                    "dropping decision for unknown task"
                );
            }
            keep
        })
        .collect();
    let dropped = before - kept.len();
    (kept, dropped)
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;
