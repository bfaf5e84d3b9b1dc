//! # ds-pilot
//!
//! Reconciliation controller for a small download backend driven by an
//! advisory oracle.
//!
//! ## Design Philosophy
//!
//! ds-pilot is designed to be:
//! - **Safe before clever** - the oracle only proposes; a pure Safety Gate decides what may run
//! - **Idempotent** - a control call that would change nothing is never sent
//! - **Stateless per run** - every pass starts from one fresh inventory snapshot
//! - **Auditable** - every task decision ends in a labelled [`Outcome`]
//!
//! ## Quick Start
//!
//! ```no_run
//! use ds_pilot::{Config, MemoryConfigStore, Reconciler};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = MemoryConfigStore::from_pairs([
//!         ("dsm_url", "https://nas.local:5001"),
//!         ("dsm_user", "admin"),
//!         ("dsm_pass", "secret"),
//!         ("gemini_api_key", "your-key"),
//!     ]);
//!     let config = Config::from_store(&store)?;
//!
//!     let report = Reconciler::from_config(config)?.run().await?;
//!     for task in &report.outcomes {
//!         println!("{}: {}", task.title, task.outcome);
//!     }
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Download-control backend abstraction and HTTP client
pub mod backend;
/// Configuration types
pub mod config;
/// Error types
pub mod error;
/// Action Executor
pub mod executor;
/// Safety Gate
pub mod gate;
/// Advisory decision providers
pub mod oracle;
/// Reconciliation Loop
pub mod reconcile;
/// Bounded retry policy
pub mod retry;
/// Key/value configuration stores
pub mod store;
/// Core types
pub mod types;

#[allow(clippy::unwrap_used, clippy::expect_used, dead_code)]
#[cfg(test)]
pub(crate) mod test_helpers;

// Re-export commonly used types
pub use backend::{
    Backend, ControlAction, ControlResponse, DownloadStationClient, Inventory, Session,
};
pub use config::{BackendConfig, Config, OracleConfig, PolicyConfig, RetryConfig, RunConfig};
pub use error::{AuthError, ControlError, Error, InventoryError, OracleError, Result, RunAborted};
pub use oracle::{DecisionProvider, GeminiOracle, NoOpDecisionProvider};
pub use reconcile::{AdvisoryStatus, Reconciler, RunReport};
pub use store::{ConfigStore, MemoryConfigStore, SqliteConfigStore};
pub use types::{
    Action, Decision, EffectiveAction, NoopReason, Outcome, RunState, SkipReason, Task, TaskId,
    TaskOutcome, TaskStatus,
};
