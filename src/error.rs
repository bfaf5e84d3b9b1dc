//! Error types for ds-pilot
//!
//! The taxonomy mirrors how far a failure is allowed to reach:
//! - [`AuthError`] and [`InventoryError`] abort a reconciliation run before any mutation
//! - [`OracleError`] degrades the run to read-only once retries are exhausted
//! - [`ControlError`] is isolated to the single task it happened on
//!
//! Everything is wrapped by the crate-level [`Error`] so callers can use `?` freely.

use crate::types::RunState;
use thiserror::Error;

/// Result type alias for ds-pilot operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for ds-pilot
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "max_active_tasks")
        key: Option<String>,
    },

    /// Configuration store could not be opened or read
    #[error("configuration store error: {0}")]
    Store(String),

    /// Authentication against the backend failed
    #[error("authentication failed: {0}")]
    Auth(#[from] AuthError),

    /// Task inventory could not be retrieved
    #[error("inventory unavailable: {0}")]
    Inventory(#[from] InventoryError),

    /// Advisory oracle call failed
    #[error("oracle unavailable: {0}")]
    Oracle(#[from] OracleError),

    /// A backend control call failed
    #[error("control call failed: {0}")]
    Control(#[from] ControlError),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// HTTP client could not be constructed
    #[error("HTTP client error: {0}")]
    HttpClient(String),
}

impl Error {
    /// Shorthand for a configuration error tied to a specific key
    pub fn config(key: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
            key: Some(key.into()),
        }
    }
}

/// Backend authentication errors (fatal for the run)
#[derive(Debug, Error)]
pub enum AuthError {
    /// Backend answered but refused the credentials
    #[error("backend rejected login (code {code})")]
    Rejected {
        /// Backend error code
        code: i64,
    },

    /// Network failure or timeout while logging in
    #[error("transport error during login: {0}")]
    Transport(#[from] reqwest::Error),

    /// Backend answered with something that is not a login response
    #[error("malformed login response: {0}")]
    Malformed(String),
}

/// Task inventory errors (fatal for the run)
#[derive(Debug, Error)]
pub enum InventoryError {
    /// Backend answered the list call with `success = false`
    #[error("backend rejected task listing (code {code})")]
    Rejected {
        /// Backend error code
        code: i64,
    },

    /// Network failure or timeout while listing tasks
    #[error("transport error during task listing: {0}")]
    Transport(#[from] reqwest::Error),

    /// Response body could not be interpreted as a task list
    #[error("malformed task list: {0}")]
    Malformed(String),
}

/// Advisory oracle errors (retried, then degraded to "no advisory")
#[derive(Debug, Error)]
pub enum OracleError {
    /// Network failure or timeout talking to the oracle
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Oracle answered with a non-success HTTP status
    #[error("oracle returned HTTP {status}: {body}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Response body (truncated)
        body: String,
    },

    /// Payload could not be decoded into decisions after wrapper stripping
    #[error("undecodable advisory payload: {0}")]
    Decode(String),

    /// No API key configured; the oracle is never called
    #[error("no oracle credentials configured")]
    MissingCredentials,
}

/// Backend control-call errors (per task, never fatal for the run)
#[derive(Debug, Error)]
pub enum ControlError {
    /// Backend refused the control call
    #[error("backend rejected {action} for task {task_id} (code {code})")]
    Rejected {
        /// Task the call targeted
        task_id: String,
        /// Control method name
        action: &'static str,
        /// Backend error code
        code: i64,
    },

    /// Network failure or timeout during the control call
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Response body could not be interpreted
    #[error("malformed control response: {0}")]
    Malformed(String),
}

/// A reconciliation run that stopped before its mutating phase
///
/// Returned by [`Reconciler::run`](crate::reconcile::Reconciler::run) when
/// authentication or inventory retrieval fails. No control call has been
/// issued when this error is produced.
#[derive(Debug, Error)]
#[error("reconciliation aborted after {}: {cause}", last_state(.trace))]
pub struct RunAborted {
    /// States visited before the abort, ending with [`RunState::Aborted`]
    pub trace: Vec<RunState>,
    /// Why the run was aborted
    pub cause: Error,
}

fn last_state(trace: &[RunState]) -> String {
    trace
        .iter()
        .rev()
        .find(|s| **s != RunState::Aborted)
        .map(|s| s.to_string())
        .unwrap_or_else(|| RunState::Init.to_string())
}
