//! Shared in-crate fakes for exercising the reconciliation pipeline without a network.

use crate::backend::{Backend, ControlAction, ControlResponse, Inventory, Session};
use crate::config::PolicyConfig;
use crate::error::{AuthError, ControlError, InventoryError};
use crate::oracle::DecisionProvider;
use crate::types::{Decision, Task, TaskId, TaskStatus};
use async_trait::async_trait;
use chrono::{Duration, Utc};
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

pub(crate) const MIB: u64 = 1024 * 1024;

/// Task created `age_hours` ago with nothing downloaded yet
pub(crate) fn task(id: &str, size_bytes: u64, status: TaskStatus, age_hours: f64) -> Task {
    Task {
        id: TaskId::from(id),
        title: format!("{id}.bin"),
        size_bytes,
        status,
        downloaded_bytes: 0,
        speed_bytes_per_sec: 0,
        created_at: Utc::now() - Duration::seconds((age_hours * 3600.0) as i64),
    }
}

/// In-memory backend that records every control call and applies it to its task list
#[derive(Default)]
pub(crate) struct FakeBackend {
    tasks: Mutex<Vec<Task>>,
    fail_login: bool,
    fail_list: bool,
    control_errors: HashMap<TaskId, i64>,
    calls: Mutex<Vec<(TaskId, ControlAction)>>,
    logins: AtomicUsize,
    logouts: AtomicUsize,
}

impl FakeBackend {
    pub(crate) fn with_tasks(tasks: Vec<Task>) -> Self {
        Self {
            tasks: Mutex::new(tasks),
            ..Self::default()
        }
    }

    pub(crate) fn failing_login() -> Self {
        Self {
            fail_login: true,
            ..Self::default()
        }
    }

    pub(crate) fn failing_list() -> Self {
        Self {
            fail_list: true,
            ..Self::default()
        }
    }

    /// Make control calls for `id` fail with backend `code`
    pub(crate) fn reject_controls(mut self, id: &str, code: i64) -> Self {
        self.control_errors.insert(TaskId::from(id), code);
        self
    }

    pub(crate) fn calls(&self) -> Vec<(TaskId, ControlAction)> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn tasks(&self) -> Vec<Task> {
        self.tasks.lock().unwrap().clone()
    }

    pub(crate) fn logins(&self) -> usize {
        self.logins.load(Ordering::SeqCst)
    }

    pub(crate) fn logouts(&self) -> usize {
        self.logouts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Backend for FakeBackend {
    async fn login(&self) -> Result<Session, AuthError> {
        self.logins.fetch_add(1, Ordering::SeqCst);
        if self.fail_login {
            return Err(AuthError::Rejected { code: 400 });
        }
        Ok(Session::new("fake-sid"))
    }

    async fn list_tasks(&self, _session: &Session) -> Result<Inventory, InventoryError> {
        if self.fail_list {
            return Err(InventoryError::Malformed("simulated network error".into()));
        }
        Ok(Inventory {
            tasks: self.tasks(),
            excluded: 0,
        })
    }

    async fn control_task(
        &self,
        _session: &Session,
        task_id: &TaskId,
        action: ControlAction,
    ) -> Result<ControlResponse, ControlError> {
        self.calls.lock().unwrap().push((task_id.clone(), action));

        if let Some(code) = self.control_errors.get(task_id) {
            return Err(ControlError::Rejected {
                task_id: task_id.to_string(),
                action: action.method(),
                code: *code,
            });
        }

        let mut tasks = self.tasks.lock().unwrap();
        let Some(pos) = tasks.iter().position(|t| &t.id == task_id) else {
            return Ok(ControlResponse::AlreadySettled("task not found".into()));
        };
        match action {
            ControlAction::Pause => tasks[pos].status = TaskStatus::Paused,
            ControlAction::Resume => tasks[pos].status = TaskStatus::Downloading,
            ControlAction::Delete => {
                tasks.remove(pos);
            }
        }
        Ok(ControlResponse::Done)
    }

    async fn logout(&self, _session: &Session) -> Result<(), AuthError> {
        self.logouts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn name(&self) -> &'static str {
        "fake"
    }
}

/// Provider that returns the same answer on every call
pub(crate) struct ScriptedOracle {
    answer: Option<Vec<Decision>>,
    calls: AtomicUsize,
}

impl ScriptedOracle {
    pub(crate) fn new(answer: Option<Vec<Decision>>) -> Self {
        Self {
            answer,
            calls: AtomicUsize::new(0),
        }
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DecisionProvider for ScriptedOracle {
    async fn propose(&self, _tasks: &[Task], _policy: &PolicyConfig) -> Option<Vec<Decision>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.answer.clone()
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}
