//! Core types for ds-pilot

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque backend identifier for a task
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(pub String);

impl TaskId {
    /// Create a new TaskId
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the raw identifier
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for TaskId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for TaskId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Backend task status
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TaskStatus {
    /// Queued, no transfer yet
    Waiting,
    /// Actively transferring
    Downloading,
    /// Paused by a user or by this controller
    Paused,
    /// Transfer done, backend is finalizing
    Finishing,
    /// Transfer complete
    Finished,
    /// Backend is verifying pieces
    HashChecking,
    /// Complete and uploading to peers
    Seeding,
    /// Waiting on a file hosting service
    FilehostingWaiting,
    /// Unpacking a completed archive
    Extracting,
    /// Backend reports the task as failed
    Error,
    /// Any status string the controller does not know
    Other(String),
}

impl TaskStatus {
    /// Wire name of the status
    pub fn as_str(&self) -> &str {
        match self {
            TaskStatus::Waiting => "waiting",
            TaskStatus::Downloading => "downloading",
            TaskStatus::Paused => "paused",
            TaskStatus::Finishing => "finishing",
            TaskStatus::Finished => "finished",
            TaskStatus::HashChecking => "hash_checking",
            TaskStatus::Seeding => "seeding",
            TaskStatus::FilehostingWaiting => "filehosting_waiting",
            TaskStatus::Extracting => "extracting",
            TaskStatus::Error => "error",
            TaskStatus::Other(s) => s,
        }
    }

    /// Statuses in which a resume request has nothing left to do
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            TaskStatus::Downloading | TaskStatus::Seeding | TaskStatus::Extracting
        )
    }
}

impl From<String> for TaskStatus {
    fn from(s: String) -> Self {
        match s.as_str() {
            "waiting" => TaskStatus::Waiting,
            "downloading" => TaskStatus::Downloading,
            "paused" => TaskStatus::Paused,
            "finishing" => TaskStatus::Finishing,
            "finished" => TaskStatus::Finished,
            "hash_checking" => TaskStatus::HashChecking,
            "seeding" => TaskStatus::Seeding,
            "filehosting_waiting" => TaskStatus::FilehostingWaiting,
            "extracting" => TaskStatus::Extracting,
            "error" => TaskStatus::Error,
            _ => TaskStatus::Other(s),
        }
    }
}

impl From<&str> for TaskStatus {
    fn from(s: &str) -> Self {
        TaskStatus::from(s.to_string())
    }
}

impl From<TaskStatus> for String {
    fn from(status: TaskStatus) -> Self {
        status.as_str().to_string()
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A backend task as seen in one inventory snapshot
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Task {
    /// Backend identifier
    pub id: TaskId,
    /// Display title
    pub title: String,
    /// Total size in bytes (0 = unknown, e.g. magnet metadata still negotiating)
    pub size_bytes: u64,
    /// Current status
    pub status: TaskStatus,
    /// Bytes transferred so far
    pub downloaded_bytes: u64,
    /// Current download speed in bytes per second
    pub speed_bytes_per_sec: u64,
    /// When the backend created the task
    pub created_at: DateTime<Utc>,
}

impl Task {
    /// Hours elapsed since the task was created, relative to `now`
    ///
    /// Clamped at zero when the backend clock is ahead of ours.
    pub fn age_hours(&self, now: DateTime<Utc>) -> f64 {
        let secs = (now - self.created_at).num_seconds().max(0);
        secs as f64 / 3600.0
    }

    /// Transfer progress in percent, 0 when the size is unknown
    pub fn progress_pct(&self) -> f64 {
        if self.size_bytes == 0 {
            return 0.0;
        }
        self.downloaded_bytes as f64 / self.size_bytes as f64 * 100.0
    }
}

/// Action proposed by the advisory oracle
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Action {
    /// Remove the task from the backend
    Delete,
    /// Stop transferring, keep the task
    Pause,
    /// Start or continue transferring
    Resume,
    /// Leave the task alone
    Keep,
    /// Anything else the oracle produced, kept verbatim for the audit log
    Unrecognized(String),
}

impl Action {
    /// Wire name of the action
    pub fn as_str(&self) -> &str {
        match self {
            Action::Delete => "delete",
            Action::Pause => "pause",
            Action::Resume => "resume",
            Action::Keep => "keep",
            Action::Unrecognized(s) => s,
        }
    }
}

impl From<String> for Action {
    fn from(s: String) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "delete" => Action::Delete,
            "pause" => Action::Pause,
            "resume" => Action::Resume,
            "keep" => Action::Keep,
            _ => Action::Unrecognized(s),
        }
    }
}

/// An element without an action reads as an empty unrecognized one
impl Default for Action {
    fn default() -> Self {
        Action::Unrecognized(String::new())
    }
}

impl From<&str> for Action {
    fn from(s: &str) -> Self {
        Action::from(s.to_string())
    }
}

impl From<Action> for String {
    fn from(action: Action) -> Self {
        action.as_str().to_string()
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One advisory decision for one task
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
    /// Task the decision refers to
    #[serde(rename = "id")]
    pub task_id: TaskId,
    /// Proposed action
    #[serde(default)]
    pub action: Action,
    /// Free-form justification from the oracle
    #[serde(default)]
    pub reason: String,
}

impl Decision {
    /// Convenience constructor
    pub fn new(task_id: impl Into<TaskId>, action: Action, reason: impl Into<String>) -> Self {
        Self {
            task_id: task_id.into(),
            action,
            reason: reason.into(),
        }
    }
}

/// Why the Safety Gate turned a decision into a no-op
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "detail")]
pub enum NoopReason {
    /// Delete refused: the task is larger than the safe-delete threshold
    DeleteProtection,
    /// Pause requested for an already paused task
    AlreadyPaused,
    /// Resume requested for a task that is already transferring
    AlreadyActive,
    /// The oracle asked to keep the task as is
    Keep,
    /// The oracle produced an action outside the known vocabulary
    UnrecognizedAction(String),
}

impl NoopReason {
    /// True when a hard safety invariant overrode the oracle, as opposed to a plain skip
    pub fn is_interception(&self) -> bool {
        matches!(self, NoopReason::DeleteProtection)
    }

    /// Short machine-readable label used in outcome records
    pub fn label(&self) -> &'static str {
        match self {
            NoopReason::DeleteProtection => "delete-protection",
            NoopReason::AlreadyPaused => "already-paused",
            NoopReason::AlreadyActive => "already-active",
            NoopReason::Keep => "keep",
            NoopReason::UnrecognizedAction(_) => "unrecognized-action",
        }
    }
}

impl fmt::Display for NoopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NoopReason::UnrecognizedAction(a) => write!(f, "unrecognized-action({a})"),
            other => f.write_str(other.label()),
        }
    }
}

/// Action that survived the Safety Gate
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EffectiveAction {
    /// Issue a delete control call
    Delete,
    /// Issue a pause control call
    Pause,
    /// Issue a resume control call
    Resume,
    /// Issue nothing
    Noop(NoopReason),
}

impl EffectiveAction {
    /// True when applying this action touches the backend
    pub fn is_mutating(&self) -> bool {
        !matches!(self, EffectiveAction::Noop(_))
    }
}

impl fmt::Display for EffectiveAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EffectiveAction::Delete => f.write_str("delete"),
            EffectiveAction::Pause => f.write_str("pause"),
            EffectiveAction::Resume => f.write_str("resume"),
            EffectiveAction::Noop(reason) => write!(f, "noop({reason})"),
        }
    }
}

/// What happened to one task during a run
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum Outcome {
    /// The control call succeeded
    Applied {
        /// Action that was issued
        action: EffectiveAction,
    },
    /// The backend reported the task already settled (e.g. deleted elsewhere)
    Benign {
        /// Action that was issued
        action: EffectiveAction,
        /// Backend-supplied explanation
        detail: String,
    },
    /// No call was issued because the action was redundant or not actionable
    Skipped {
        /// Why nothing was issued
        reason: SkipReason,
    },
    /// A hard safety invariant overrode the oracle
    Intercepted {
        /// The invariant that fired
        invariant: NoopReason,
    },
    /// The control call failed; the run carried on
    Failed {
        /// Action that was attempted
        action: EffectiveAction,
        /// Error text
        error: String,
    },
}

/// Reason attached to [`Outcome::Skipped`]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// The Safety Gate downgraded the action
    Gate(NoopReason),
    /// The run was a dry run; the action would have been issued
    DryRun(EffectiveAction),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::Gate(reason) => write!(f, "{reason}"),
            SkipReason::DryRun(action) => write!(f, "dry-run({action})"),
        }
    }
}

impl Outcome {
    /// True when a control call was actually sent to the backend
    pub fn issued_call(&self) -> bool {
        matches!(
            self,
            Outcome::Applied { .. } | Outcome::Benign { .. } | Outcome::Failed { .. }
        )
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Applied { action } => write!(f, "applied:{action}"),
            Outcome::Benign { detail, .. } => write!(f, "benign:{detail}"),
            Outcome::Skipped { reason } => write!(f, "skipped:{reason}"),
            Outcome::Intercepted { invariant } => write!(f, "intercepted:{}", invariant.label()),
            Outcome::Failed { error, .. } => write!(f, "failed:{error}"),
        }
    }
}

/// Per-task record in a run report
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskOutcome {
    /// Task the outcome belongs to
    pub task_id: TaskId,
    /// Task title at snapshot time
    pub title: String,
    /// What the oracle proposed
    pub proposed: Action,
    /// The oracle's reason text
    pub reason: String,
    /// What happened
    pub outcome: Outcome,
}

/// States of one reconciliation run
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    /// Nothing done yet
    Init,
    /// Session acquired
    Authenticated,
    /// Inventory snapshot taken
    Inventoried,
    /// Oracle consulted (result may be absent)
    Decided,
    /// Validated decisions applied
    Executed,
    /// Terminal success
    Done,
    /// Terminal failure before any mutation
    Aborted,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RunState::Init => "init",
            RunState::Authenticated => "authenticated",
            RunState::Inventoried => "inventoried",
            RunState::Decided => "decided",
            RunState::Executed => "executed",
            RunState::Done => "done",
            RunState::Aborted => "aborted",
        };
        f.write_str(s)
    }
}
