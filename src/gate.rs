//! Safety Gate
//!
//! Maps an advisory [`Decision`] to the [`EffectiveAction`] that may reach the
//! backend. The mapping is total and never fails. Rules, first match wins:
//!
//! 1. delete on a task larger than the safe-delete threshold becomes a no-op
//! 2. pause on an already paused task becomes a no-op
//! 3. resume on a task that is already transferring becomes a no-op
//! 4. keep and unrecognized actions become no-ops
//!
//! Dead-task detection and the concurrency ceiling are oracle guidance only;
//! the gate enforces neither.

use crate::config::PolicyConfig;
use crate::types::{Action, Decision, EffectiveAction, NoopReason, Task, TaskStatus};

/// Validate one decision against the task it targets
pub fn validate(decision: &Decision, task: &Task, policy: &PolicyConfig) -> EffectiveAction {
    match &decision.action {
        Action::Delete if task.size_bytes > policy.safe_delete_size_threshold_bytes => {
            EffectiveAction::Noop(NoopReason::DeleteProtection)
        }
        Action::Delete => EffectiveAction::Delete,
        Action::Pause if task.status == TaskStatus::Paused => {
            EffectiveAction::Noop(NoopReason::AlreadyPaused)
        }
        Action::Pause => EffectiveAction::Pause,
        Action::Resume if task.status.is_active() => {
            EffectiveAction::Noop(NoopReason::AlreadyActive)
        }
        Action::Resume => EffectiveAction::Resume,
        Action::Keep => EffectiveAction::Noop(NoopReason::Keep),
        Action::Unrecognized(raw) => {
            EffectiveAction::Noop(NoopReason::UnrecognizedAction(raw.clone()))
        }
    }
}
