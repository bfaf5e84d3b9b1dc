//! HTTP client for DownloadStation-style web APIs.

use super::{Backend, ControlAction, ControlResponse, Inventory, Session};
use crate::config::BackendConfig;
use crate::error::{AuthError, ControlError, Error, InventoryError, Result};
use crate::types::{Task, TaskId, TaskStatus};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

const AUTH_PATH: &str = "auth.cgi";
const TASK_PATH: &str = "DownloadStation/task.cgi";
const SESSION_NAME: &str = "DownloadStation";
const TASK_API: &str = "SYNO.DownloadStation.Task";

/// Backend error code for an unknown task id
const CODE_INVALID_TASK: i64 = 404;

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    success: bool,
    data: Option<T>,
    error: Option<ErrorBody>,
}

impl<T> Envelope<T> {
    fn error_code(&self) -> i64 {
        self.error.as_ref().map(|e| e.code).unwrap_or(-1)
    }
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    code: i64,
}

#[derive(Debug, Deserialize)]
struct LoginData {
    sid: String,
}

#[derive(Debug, Deserialize)]
struct ListData {
    tasks: Option<Vec<Value>>,
}

#[derive(Debug, Deserialize)]
struct ControlItem {
    #[serde(default)]
    id: String,
    #[serde(default)]
    error: i64,
}

/// DownloadStation web API client
///
/// Credentials travel as query parameters, matching what the API expects, so
/// transport errors are stripped of their URL before they leave this module.
/// Each call carries its own timeout from [`BackendConfig`].
pub struct DownloadStationClient {
    http: reqwest::Client,
    config: BackendConfig,
}

impl DownloadStationClient {
    /// Create a client for the backend described by `config`
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be created
    pub fn new(config: BackendConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .danger_accept_invalid_certs(config.accept_invalid_certs)
            .user_agent(concat!("ds-pilot/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::HttpClient(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { http, config })
    }

    fn url(&self, path: &str) -> String {
        format!(
            "{}/webapi/{}",
            self.config.base_url.trim_end_matches('/'),
            path
        )
    }

    async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, &str)],
        timeout: std::time::Duration,
    ) -> std::result::Result<std::result::Result<Envelope<T>, String>, reqwest::Error> {
        let response = self
            .http
            .get(self.url(path))
            .query(params)
            .timeout(timeout)
            .send()
            .await
            .map_err(reqwest::Error::without_url)?;

        let status = response.status();
        let body = response.text().await.map_err(reqwest::Error::without_url)?;
        if !status.is_success() {
            return Ok(Err(format!("HTTP {}", status)));
        }
        Ok(serde_json::from_str::<Envelope<T>>(&body).map_err(|e| e.to_string()))
    }
}

#[async_trait]
impl Backend for DownloadStationClient {
    async fn login(&self) -> std::result::Result<Session, AuthError> {
        let envelope = self
            .get::<LoginData>(
                AUTH_PATH,
                &[
                    ("api", "SYNO.API.Auth"),
                    ("version", "3"),
                    ("method", "login"),
                    ("account", self.config.username.as_str()),
                    ("passwd", self.config.password.as_str()),
                    ("session", SESSION_NAME),
                    ("format", "sid"),
                ],
                self.config.login_timeout,
            )
            .await?
            .map_err(AuthError::Malformed)?;

        if !envelope.success {
            return Err(AuthError::Rejected {
                code: envelope.error_code(),
            });
        }

        envelope
            .data
            .map(|d| Session::new(d.sid))
            .ok_or_else(|| AuthError::Malformed("login succeeded without a sid".into()))
    }

    async fn list_tasks(&self, session: &Session) -> std::result::Result<Inventory, InventoryError> {
        let envelope = self
            .get::<ListData>(
                TASK_PATH,
                &[
                    ("api", TASK_API),
                    ("version", "1"),
                    ("method", "list"),
                    ("additional", "detail,transfer"),
                    ("_sid", session.sid()),
                ],
                self.config.list_timeout,
            )
            .await?
            .map_err(InventoryError::Malformed)?;

        if !envelope.success {
            return Err(InventoryError::Rejected {
                code: envelope.error_code(),
            });
        }

        let raw_tasks = envelope
            .data
            .and_then(|d| d.tasks)
            .ok_or_else(|| InventoryError::Malformed("response has no data.tasks".into()))?;

        let mut inventory = Inventory::default();
        for raw in &raw_tasks {
            match parse_task(raw) {
                Ok(task) => inventory.tasks.push(task),
                Err(field) => {
                    let id = raw.get("id").and_then(Value::as_str).unwrap_or("<no id>");
                    tracing::warn!(
                        task_id = id,
                        missing = field,
                        "excluding task record with missing field"
                    );
                    inventory.excluded += 1;
                }
            }
        }
        Ok(inventory)
    }

    async fn control_task(
        &self,
        session: &Session,
        task_id: &TaskId,
        action: ControlAction,
    ) -> std::result::Result<ControlResponse, ControlError> {
        let mut params = vec![
            ("api", TASK_API),
            ("version", "1"),
            ("method", action.method()),
            ("id", task_id.as_str()),
            ("_sid", session.sid()),
        ];
        if action == ControlAction::Delete {
            params.push(("force_complete", "false"));
        }

        let envelope = self
            .get::<Vec<ControlItem>>(TASK_PATH, &params, self.config.control_timeout)
            .await?
            .map_err(ControlError::Malformed)?;

        let rejected = |code: i64| {
            if code == CODE_INVALID_TASK {
                Ok(ControlResponse::AlreadySettled("task not found".into()))
            } else {
                Err(ControlError::Rejected {
                    task_id: task_id.to_string(),
                    action: action.method(),
                    code,
                })
            }
        };

        if !envelope.success {
            return rejected(envelope.error_code());
        }

        // Per-id results ride inside a successful envelope
        match envelope
            .data
            .unwrap_or_default()
            .into_iter()
            .find(|item| item.id == task_id.as_str())
        {
            Some(item) if item.error != 0 => rejected(item.error),
            _ => Ok(ControlResponse::Done),
        }
    }

    async fn logout(&self, session: &Session) -> std::result::Result<(), AuthError> {
        let envelope = self
            .get::<Value>(
                AUTH_PATH,
                &[
                    ("api", "SYNO.API.Auth"),
                    ("version", "1"),
                    ("method", "logout"),
                    ("session", SESSION_NAME),
                    ("_sid", session.sid()),
                ],
                self.config.login_timeout,
            )
            .await?
            .map_err(AuthError::Malformed)?;

        if envelope.success {
            Ok(())
        } else {
            Err(AuthError::Rejected {
                code: envelope.error_code(),
            })
        }
    }

    fn name(&self) -> &'static str {
        "download-station"
    }
}

/// Build a [`Task`] from one raw list entry, naming the first missing field on failure
fn parse_task(raw: &Value) -> std::result::Result<Task, &'static str> {
    let id = raw.get("id").and_then(Value::as_str).ok_or("id")?;
    let title = raw.get("title").and_then(Value::as_str).ok_or("title")?;
    let size_bytes = raw.get("size").and_then(as_u64).ok_or("size")?;
    let status = raw.get("status").and_then(Value::as_str).ok_or("status")?;

    let transfer = raw
        .pointer("/additional/transfer")
        .ok_or("additional.transfer")?;
    let downloaded_bytes = transfer
        .get("size_downloaded")
        .and_then(as_u64)
        .ok_or("additional.transfer.size_downloaded")?;
    let speed_bytes_per_sec = transfer
        .get("speed_download")
        .and_then(as_u64)
        .ok_or("additional.transfer.speed_download")?;

    let created_at = raw
        .pointer("/additional/detail/create_time")
        .and_then(as_u64)
        .and_then(|secs| i64::try_from(secs).ok())
        .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))
        .ok_or("additional.detail.create_time")?;

    Ok(Task {
        id: TaskId::new(id),
        title: title.to_string(),
        size_bytes,
        status: TaskStatus::from(status),
        downloaded_bytes,
        speed_bytes_per_sec,
        created_at,
    })
}

/// Non-negative integer from a JSON number or numeric string
fn as_u64(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
