//! Reconciliation Loop
//!
//! One [`Reconciler::run`] is one stateless pass over live backend state:
//!
//! ```text
//! Init -> Authenticated -> Inventoried -> Decided -> Executed -> Done
//!   |                          |             |
//!   +-> Aborted  (auth)        |             +-> Done  (no advisory)
//!                              +-> Aborted  (inventory)
//!                              +-> Done     (empty inventory)
//! ```
//!
//! Only authentication and inventory failures abort a run, and both happen
//! before any mutation. Everything after that degrades to fewer mutations,
//! never to wrong ones. Nothing is retried at this level; the run is meant to
//! be triggered again from outside.

use crate::backend::{Backend, DownloadStationClient, Session};
use crate::config::{Config, PolicyConfig, RunConfig};
use crate::error::{Result, RunAborted};
use crate::executor;
use crate::gate;
use crate::oracle::{DecisionProvider, GeminiOracle};
use crate::types::{Decision, Outcome, RunState, Task, TaskId, TaskOutcome};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

/// What the oracle contributed to a run
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "status", content = "decisions")]
pub enum AdvisoryStatus {
    /// Inventory was empty, the oracle was not consulted
    NotRequested,
    /// The oracle could not produce an answer; the run was read-only
    Unavailable,
    /// The oracle answered with no decisions
    Empty,
    /// The oracle proposed this many decisions for known tasks
    Proposed(usize),
}

impl fmt::Display for AdvisoryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AdvisoryStatus::NotRequested => f.write_str("not_requested"),
            AdvisoryStatus::Unavailable => f.write_str("unavailable"),
            AdvisoryStatus::Empty => f.write_str("empty"),
            AdvisoryStatus::Proposed(n) => write!(f, "proposed({n})"),
        }
    }
}

/// Audit record of one completed run
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    /// When the run started
    pub started_at: DateTime<Utc>,
    /// States visited, ending with [`RunState::Done`]
    pub trace: Vec<RunState>,
    /// Tasks in the inventory snapshot
    pub tasks_seen: usize,
    /// Backend records excluded for missing fields
    pub excluded_records: usize,
    /// Oracle contribution
    pub advisory: AdvisoryStatus,
    /// One entry per accepted decision, in oracle order
    pub outcomes: Vec<TaskOutcome>,
    /// Mutating control calls sent to the backend
    pub control_calls: usize,
    /// Decisions discarded by the loop (unknown task or duplicate)
    pub dropped_decisions: usize,
    /// Whether mutations were suppressed
    pub dry_run: bool,
}

impl RunReport {
    /// Last state reached
    pub fn final_state(&self) -> RunState {
        self.trace.last().copied().unwrap_or(RunState::Init)
    }

    /// Outcome recorded for `task_id`, if a decision for it was accepted
    pub fn outcome_for(&self, task_id: &str) -> Option<&Outcome> {
        self.outcomes
            .iter()
            .find(|o| o.task_id.as_str() == task_id)
            .map(|o| &o.outcome)
    }
}

/// Drives reconciliation runs against one backend with one decision provider
pub struct Reconciler {
    backend: Arc<dyn Backend>,
    oracle: Arc<dyn DecisionProvider>,
    policy: PolicyConfig,
    run: RunConfig,
}

impl Reconciler {
    /// Create a reconciler from its collaborators
    pub fn new(
        backend: Arc<dyn Backend>,
        oracle: Arc<dyn DecisionProvider>,
        policy: PolicyConfig,
        run: RunConfig,
    ) -> Self {
        Self {
            backend,
            oracle,
            policy,
            run,
        }
    }

    /// Build the HTTP backend and oracle described by `config`
    ///
    /// # Errors
    /// Returns error if the configuration is invalid or an HTTP client cannot be created
    pub fn from_config(config: Config) -> Result<Self> {
        config.validate()?;
        let backend = DownloadStationClient::new(config.backend)?;
        let oracle = GeminiOracle::new(config.oracle)?;
        Ok(Self::new(
            Arc::new(backend),
            Arc::new(oracle),
            config.policy,
            config.run,
        ))
    }

    /// Execute one reconciliation pass
    ///
    /// The session acquired at the start is released at the end whatever
    /// happens in between.
    ///
    /// # Errors
    /// Returns [`RunAborted`] when authentication or inventory retrieval fails.
    /// No control call has been issued in that case.
    pub async fn run(&self) -> std::result::Result<RunReport, RunAborted> {
        let started_at = Utc::now();
        let mut trace = vec![RunState::Init];
        tracing::info!(
            backend = self.backend.name(),
            oracle = self.oracle.name(),
            dry_run = self.run.dry_run,
            "reconciliation run starting"
        );

        let session = match self.backend.login().await {
            Ok(session) => {
                tracing::info!(backend = self.backend.name(), "authenticated");
                session
            }
            Err(e) => {
                tracing::error!(
                    backend = self.backend.name(),
                    error = %e,
                    "authentication failed"
                );
                transition(&mut trace, RunState::Aborted);
                return Err(RunAborted {
                    trace,
                    cause: e.into(),
                });
            }
        };
        transition(&mut trace, RunState::Authenticated);

        let result = self.run_with_session(&session, trace, started_at).await;

        if let Err(e) = self.backend.logout(&session).await {
            tracing::debug!(error = %e, "logout failed");
        }

        match &result {
            Ok(report) => tracing::info!(
                advisory = %report.advisory,
                control_calls = report.control_calls,
                outcomes = report.outcomes.len(),
                "reconciliation run done"
            ),
            Err(aborted) => tracing::error!(error = %aborted, "reconciliation run aborted"),
        }
        result
    }

    async fn run_with_session(
        &self,
        session: &Session,
        mut trace: Vec<RunState>,
        started_at: DateTime<Utc>,
    ) -> std::result::Result<RunReport, RunAborted> {
        let inventory = match self.backend.list_tasks(session).await {
            Ok(inventory) => {
                tracing::info!(
                    tasks = inventory.tasks.len(),
                    excluded = inventory.excluded,
                    "inventory fetched"
                );
                inventory
            }
            Err(e) => {
                tracing::error!(error = %e, "inventory fetch failed");
                transition(&mut trace, RunState::Aborted);
                return Err(RunAborted {
                    trace,
                    cause: e.into(),
                });
            }
        };
        transition(&mut trace, RunState::Inventoried);

        let mut report = RunReport {
            started_at,
            trace: Vec::new(),
            tasks_seen: inventory.tasks.len(),
            excluded_records: inventory.excluded,
            advisory: AdvisoryStatus::NotRequested,
            outcomes: Vec::new(),
            control_calls: 0,
            dropped_decisions: 0,
            dry_run: self.run.dry_run,
        };

        if inventory.tasks.is_empty() {
            tracing::info!("no tasks, nothing to reconcile");
            transition(&mut trace, RunState::Done);
            report.trace = trace;
            return Ok(report);
        }

        let proposal = self.oracle.propose(&inventory.tasks, &self.policy).await;
        transition(&mut trace, RunState::Decided);

        let Some(decisions) = proposal else {
            tracing::warn!("no advisory available, run is read-only");
            report.advisory = AdvisoryStatus::Unavailable;
            transition(&mut trace, RunState::Done);
            report.trace = trace;
            return Ok(report);
        };

        self.execute(session, &inventory.tasks, decisions, &mut report)
            .await;
        transition(&mut trace, RunState::Executed);
        transition(&mut trace, RunState::Done);
        report.trace = trace;
        Ok(report)
    }

    /// Validate and apply every decision, one task at a time
    async fn execute(
        &self,
        session: &Session,
        tasks: &[Task],
        decisions: Vec<Decision>,
        report: &mut RunReport,
    ) {
        let by_id: HashMap<&TaskId, &Task> = tasks.iter().map(|t| (&t.id, t)).collect();
        let mut seen: HashSet<TaskId> = HashSet::new();

        for decision in decisions {
            let Some(task) = by_id.get(&decision.task_id) else {
                tracing::info!(task_id = %decision.task_id, "dropping decision for unknown task");
                report.dropped_decisions += 1;
                continue;
            };
            if !seen.insert(decision.task_id.clone()) {
                tracing::info!(
                    task_id = %decision.task_id,
                    action = %decision.action,
                    "dropping duplicate decision"
                );
                report.dropped_decisions += 1;
                continue;
            }

            let effective = gate::validate(&decision, task, &self.policy);
            let outcome = executor::apply(
                self.backend.as_ref(),
                session,
                &task.id,
                &effective,
                self.run.dry_run,
            )
            .await;

            log_outcome(task, &decision, &outcome);
            if outcome.issued_call() {
                report.control_calls += 1;
            }
            report.outcomes.push(TaskOutcome {
                task_id: task.id.clone(),
                title: task.title.clone(),
                proposed: decision.action,
                reason: decision.reason,
                outcome,
            });
        }

        report.advisory = if seen.is_empty() {
            AdvisoryStatus::Empty
        } else {
            AdvisoryStatus::Proposed(seen.len())
        };
    }
}

fn transition(trace: &mut Vec<RunState>, next: RunState) {
    tracing::debug!(
        from = %trace.last().copied().unwrap_or(RunState::Init),
        to = %next,
        "state transition"
    );
    trace.push(next);
}

fn log_outcome(task: &Task, decision: &Decision, outcome: &Outcome) {
    match outcome {
        Outcome::Failed { .. } | Outcome::Intercepted { .. } => tracing::warn!(
            task_id = %task.id,
            title = %task.title,
            proposed = %decision.action,
            reason = %decision.reason,
            outcome = %outcome,
            "task decision"
        ),
        _ => tracing::info!(
            task_id = %task.id,
            title = %task.title,
            proposed = %decision.action,
            reason = %decision.reason,
            outcome = %outcome,
            "task decision"
        ),
    }
}
