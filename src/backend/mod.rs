//! Download-control backend abstraction
//!
//! The reconciliation loop talks to the backend only through the [`Backend`]
//! trait: acquire a [`Session`], take an [`Inventory`] snapshot, and issue
//! [`ControlAction`]s. [`DownloadStationClient`] is the HTTP implementation
//! for DownloadStation-style web APIs.

use crate::error::{AuthError, ControlError, InventoryError};
use crate::types::{Task, TaskId};
use async_trait::async_trait;
use std::fmt;

mod download_station;

pub use download_station::DownloadStationClient;

/// Credential handle scoped to one reconciliation run
///
/// Read-only after acquisition. Never cached across runs.
#[derive(Clone, PartialEq, Eq)]
pub struct Session {
    sid: String,
}

impl Session {
    /// Wrap a backend session id
    pub fn new(sid: impl Into<String>) -> Self {
        Self { sid: sid.into() }
    }

    /// Raw session id for request parameters
    pub fn sid(&self) -> &str {
        &self.sid
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session").field("sid", &"<redacted>").finish()
    }
}

/// One inventory snapshot
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Inventory {
    /// Tasks with every required field present
    pub tasks: Vec<Task>,
    /// Number of backend records dropped for missing fields
    pub excluded: usize,
}

/// Mutating control call understood by the backend
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ControlAction {
    /// Stop transferring
    Pause,
    /// Start or continue transferring
    Resume,
    /// Remove the task
    Delete,
}

impl ControlAction {
    /// Backend method name
    pub fn method(&self) -> &'static str {
        match self {
            ControlAction::Pause => "pause",
            ControlAction::Resume => "resume",
            ControlAction::Delete => "delete",
        }
    }
}

impl fmt::Display for ControlAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.method())
    }
}

/// Successful answer to a control call
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ControlResponse {
    /// The backend performed the transition
    Done,
    /// The task was already in the target state or no longer exists
    AlreadySettled(String),
}

/// Trait for download-control backends
#[async_trait]
pub trait Backend: Send + Sync {
    /// Authenticate and obtain a session for this run
    async fn login(&self) -> Result<Session, AuthError>;

    /// Retrieve the live task set
    ///
    /// Records missing a required field are excluded and counted, never fatal.
    async fn list_tasks(&self, session: &Session) -> Result<Inventory, InventoryError>;

    /// Request a state transition for one task
    async fn control_task(
        &self,
        session: &Session,
        task_id: &TaskId,
        action: ControlAction,
    ) -> Result<ControlResponse, ControlError>;

    /// Release the session at the end of a run
    ///
    /// Best effort; the default does nothing.
    async fn logout(&self, _session: &Session) -> Result<(), AuthError> {
        Ok(())
    }

    /// Human-readable name for logging
    fn name(&self) -> &'static str;
}
