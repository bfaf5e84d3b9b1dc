//! Configuration types for ds-pilot
//!
//! A [`Config`] is built once per process, either deserialized directly or
//! assembled key by key from a [`ConfigStore`]. Nothing in the crate reads
//! ambient settings: every component receives the slice of configuration it
//! needs as an explicit argument.

use crate::error::{Error, Result};
use crate::store::ConfigStore;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Store key for the backend base URL
pub const KEY_BACKEND_URL: &str = "dsm_url";
/// Store key for the backend account name
pub const KEY_BACKEND_USER: &str = "dsm_user";
/// Store key for the backend password
pub const KEY_BACKEND_PASS: &str = "dsm_pass";
/// Store key controlling TLS certificate verification against the backend
pub const KEY_ACCEPT_INVALID_CERTS: &str = "dsm_accept_invalid_certs";
/// Store key for the oracle API key
pub const KEY_ORACLE_API_KEY: &str = "gemini_api_key";
/// Store key for the oracle base endpoint
pub const KEY_ORACLE_ENDPOINT: &str = "oracle_endpoint";
/// Store key for the oracle model name
pub const KEY_ORACLE_MODEL: &str = "oracle_model";
/// Store key for the concurrency ceiling
pub const KEY_MAX_ACTIVE_TASKS: &str = "max_active_tasks";
/// Store key for the dead-task age threshold
pub const KEY_DEAD_TASK_AGE_HOURS: &str = "dead_task_age_hours";
/// Store key for the delete-protection size threshold
pub const KEY_SAFE_DELETE_THRESHOLD: &str = "safe_delete_size_threshold_bytes";
/// Store key for dry-run mode
pub const KEY_DRY_RUN: &str = "dry_run";

/// Main configuration for a reconciliation run
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    /// Download-control backend connection settings
    pub backend: BackendConfig,

    /// Advisory oracle settings
    #[serde(default)]
    pub oracle: OracleConfig,

    /// Hard thresholds enforced by the Safety Gate and described to the oracle
    #[serde(default)]
    pub policy: PolicyConfig,

    /// Run-level switches
    #[serde(default)]
    pub run: RunConfig,
}

impl Config {
    /// Assemble a configuration from a key/value store
    ///
    /// Backend URL and credentials are required; every other key falls back to
    /// its default when absent. Present-but-unparsable values are errors.
    pub fn from_store(store: &dyn ConfigStore) -> Result<Self> {
        let mut backend = BackendConfig::new(
            required(store, KEY_BACKEND_URL)?,
            required(store, KEY_BACKEND_USER)?,
            required(store, KEY_BACKEND_PASS)?,
        );
        if let Some(accept) = parse_bool(store, KEY_ACCEPT_INVALID_CERTS)? {
            backend.accept_invalid_certs = accept;
        }

        let mut oracle = OracleConfig {
            api_key: non_empty(store, KEY_ORACLE_API_KEY),
            ..OracleConfig::default()
        };
        if let Some(endpoint) = non_empty(store, KEY_ORACLE_ENDPOINT) {
            oracle.endpoint = endpoint;
        }
        if let Some(model) = non_empty(store, KEY_ORACLE_MODEL) {
            oracle.model = model;
        }

        let defaults = PolicyConfig::default();
        let policy = PolicyConfig {
            max_active_tasks: parse(store, KEY_MAX_ACTIVE_TASKS)?
                .unwrap_or(defaults.max_active_tasks),
            dead_task_age_hours: parse(store, KEY_DEAD_TASK_AGE_HOURS)?
                .unwrap_or(defaults.dead_task_age_hours),
            safe_delete_size_threshold_bytes: parse(store, KEY_SAFE_DELETE_THRESHOLD)?
                .unwrap_or(defaults.safe_delete_size_threshold_bytes),
        };

        let run = RunConfig {
            dry_run: parse_bool(store, KEY_DRY_RUN)?.unwrap_or(false),
        };

        let config = Self {
            backend,
            oracle,
            policy,
            run,
        };
        config.validate()?;
        Ok(config)
    }

    /// Check cross-field and range constraints
    pub fn validate(&self) -> Result<()> {
        if url::Url::parse(&self.backend.base_url).is_err() {
            return Err(Error::config(
                KEY_BACKEND_URL,
                format!("not a valid URL: {}", self.backend.base_url),
            ));
        }
        if url::Url::parse(&self.oracle.endpoint).is_err() {
            return Err(Error::config(
                KEY_ORACLE_ENDPOINT,
                format!("not a valid URL: {}", self.oracle.endpoint),
            ));
        }
        self.policy.validate()
    }
}

/// Download-control backend connection settings
#[derive(Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Base URL of the backend, e.g. `http://nas.local:5000`
    pub base_url: String,

    /// Account name
    pub username: String,

    /// Account password
    pub password: String,

    /// Skip TLS certificate verification (default: true, NAS boxes ship self-signed certs)
    #[serde(default = "default_true")]
    pub accept_invalid_certs: bool,

    /// Timeout for the login call (default: 30 seconds)
    #[serde(default = "default_login_timeout", with = "duration_serde")]
    pub login_timeout: Duration,

    /// Timeout for the task listing call (default: 30 seconds)
    #[serde(default = "default_list_timeout", with = "duration_serde")]
    pub list_timeout: Duration,

    /// Timeout for each control call (default: 10 seconds)
    #[serde(default = "default_control_timeout", with = "duration_serde")]
    pub control_timeout: Duration,
}

impl BackendConfig {
    /// Backend settings with default timeouts
    pub fn new(
        base_url: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            username: username.into(),
            password: password.into(),
            accept_invalid_certs: true,
            login_timeout: default_login_timeout(),
            list_timeout: default_list_timeout(),
            control_timeout: default_control_timeout(),
        }
    }
}

impl fmt::Debug for BackendConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackendConfig")
            .field("base_url", &self.base_url)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("accept_invalid_certs", &self.accept_invalid_certs)
            .field("login_timeout", &self.login_timeout)
            .field("list_timeout", &self.list_timeout)
            .field("control_timeout", &self.control_timeout)
            .finish()
    }
}

/// Advisory oracle settings
#[derive(Clone, Serialize, Deserialize)]
pub struct OracleConfig {
    /// Base endpoint of the generative-language API
    #[serde(default = "default_oracle_endpoint")]
    pub endpoint: String,

    /// Model name appended to the endpoint
    #[serde(default = "default_oracle_model")]
    pub model: String,

    /// API key (None = oracle unavailable, every run is read-only)
    #[serde(default)]
    pub api_key: Option<String>,

    /// Timeout for one round-trip (default: 60 seconds)
    #[serde(default = "default_oracle_timeout", with = "duration_serde")]
    pub timeout: Duration,

    /// Retry policy for the whole round-trip
    #[serde(default)]
    pub retry: RetryConfig,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            endpoint: default_oracle_endpoint(),
            model: default_oracle_model(),
            api_key: None,
            timeout: default_oracle_timeout(),
            retry: RetryConfig::default(),
        }
    }
}

impl fmt::Debug for OracleConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OracleConfig")
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("timeout", &self.timeout)
            .field("retry", &self.retry)
            .finish()
    }
}

/// Thresholds that define every hard invariant of a run
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PolicyConfig {
    /// Maximum tasks that should be transferring at once (default: 3)
    #[serde(default = "default_max_active_tasks")]
    pub max_active_tasks: u32,

    /// Age after which a task without progress counts as dead (default: 3 hours)
    #[serde(default = "default_dead_task_age_hours")]
    pub dead_task_age_hours: f64,

    /// Tasks larger than this are never deleted (default: 100 MiB)
    #[serde(default = "default_safe_delete_threshold")]
    pub safe_delete_size_threshold_bytes: u64,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            max_active_tasks: default_max_active_tasks(),
            dead_task_age_hours: default_dead_task_age_hours(),
            safe_delete_size_threshold_bytes: default_safe_delete_threshold(),
        }
    }
}

impl PolicyConfig {
    /// Check threshold ranges
    pub fn validate(&self) -> Result<()> {
        if self.max_active_tasks < 1 {
            return Err(Error::config(KEY_MAX_ACTIVE_TASKS, "must be at least 1"));
        }
        if !self.dead_task_age_hours.is_finite() || self.dead_task_age_hours < 0.0 {
            return Err(Error::config(
                KEY_DEAD_TASK_AGE_HOURS,
                "must be a finite, non-negative number of hours",
            ));
        }
        Ok(())
    }
}

/// Run-level switches
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct RunConfig {
    /// Evaluate everything but issue no control calls (default: false)
    #[serde(default)]
    pub dry_run: bool,
}

/// Retry configuration for the oracle round-trip
///
/// `max_attempts` counts retries after the first attempt, so the default
/// performs at most two round-trips with a fixed five second pause between them.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of retry attempts (default: 1)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay before the first retry (default: 5 seconds)
    #[serde(default = "default_initial_delay", with = "duration_serde")]
    pub initial_delay: Duration,

    /// Upper bound for any delay (default: 60 seconds)
    #[serde(default = "default_max_delay", with = "duration_serde")]
    pub max_delay: Duration,

    /// Multiplier applied to the delay after each retry (default: 1.0, fixed delay)
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Add random jitter to delays (default: false)
    #[serde(default)]
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay: default_initial_delay(),
            max_delay: default_max_delay(),
            backoff_multiplier: default_backoff_multiplier(),
            jitter: false,
        }
    }
}

fn required(store: &dyn ConfigStore, key: &str) -> Result<String> {
    non_empty(store, key).ok_or_else(|| Error::config(key, format!("missing required key {key}")))
}

fn non_empty(store: &dyn ConfigStore, key: &str) -> Option<String> {
    store
        .get(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse<T>(store: &dyn ConfigStore, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    non_empty(store, key)
        .map(|raw| {
            raw.parse::<T>()
                .map_err(|e| Error::config(key, format!("invalid value {raw:?}: {e}")))
        })
        .transpose()
}

fn parse_bool(store: &dyn ConfigStore, key: &str) -> Result<Option<bool>> {
    non_empty(store, key)
        .map(|raw| match raw.to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(Error::config(key, format!("invalid boolean {raw:?}"))),
        })
        .transpose()
}

fn default_true() -> bool {
    true
}

fn default_login_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_list_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_control_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_oracle_endpoint() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}

fn default_oracle_model() -> String {
    "gemini-flash-latest".to_string()
}

fn default_oracle_timeout() -> Duration {
    Duration::from_secs(60)
}

fn default_max_active_tasks() -> u32 {
    3
}

fn default_dead_task_age_hours() -> f64 {
    3.0
}

fn default_safe_delete_threshold() -> u64 {
    100 * 1024 * 1024
}

fn default_max_attempts() -> u32 {
    1
}

fn default_initial_delay() -> Duration {
    Duration::from_secs(5)
}

fn default_max_delay() -> Duration {
    Duration::from_secs(60)
}

fn default_backoff_multiplier() -> f64 {
    1.0
}

// Durations are stored as whole seconds
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
