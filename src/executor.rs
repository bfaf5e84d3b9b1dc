//! Action Executor
//!
//! Applies a validated [`EffectiveAction`] to the backend and reports what
//! happened as an [`Outcome`]. Never fails: backend errors become
//! [`Outcome::Failed`] for the one task involved.

use crate::backend::{Backend, ControlAction, ControlResponse, Session};
use crate::types::{EffectiveAction, Outcome, SkipReason, TaskId};

/// Apply one effective action
///
/// No-ops issue no call. With `dry_run` set, mutating actions are reported as
/// skipped and no call is issued either.
pub async fn apply(
    backend: &dyn Backend,
    session: &Session,
    task_id: &TaskId,
    effective: &EffectiveAction,
    dry_run: bool,
) -> Outcome {
    let control = match effective {
        EffectiveAction::Noop(reason) if reason.is_interception() => {
            return Outcome::Intercepted {
                invariant: reason.clone(),
            };
        }
        EffectiveAction::Noop(reason) => {
            return Outcome::Skipped {
                reason: SkipReason::Gate(reason.clone()),
            };
        }
        EffectiveAction::Delete => ControlAction::Delete,
        EffectiveAction::Pause => ControlAction::Pause,
        EffectiveAction::Resume => ControlAction::Resume,
    };

    if dry_run {
        return Outcome::Skipped {
            reason: SkipReason::DryRun(effective.clone()),
        };
    }

    tracing::debug!(
        task_id = %task_id,
        action = %control,
        backend = backend.name(),
        "issuing control call"
    );

    match backend.control_task(session, task_id, control).await {
        Ok(ControlResponse::Done) => Outcome::Applied {
            action: effective.clone(),
        },
        Ok(ControlResponse::AlreadySettled(detail)) => Outcome::Benign {
            action: effective.clone(),
            detail,
        },
        Err(e) => Outcome::Failed {
            action: effective.clone(),
            error: e.to_string(),
        },
    }
}
