//! Backend task records and configuration fixtures

use ds_pilot::config::{
    KEY_BACKEND_PASS, KEY_BACKEND_URL, KEY_BACKEND_USER, KEY_ORACLE_API_KEY, KEY_ORACLE_ENDPOINT,
    KEY_ORACLE_MODEL, KEY_SAFE_DELETE_THRESHOLD,
};
use ds_pilot::{Config, MemoryConfigStore};
use serde_json::{Value, json};
use std::time::Duration;

pub const MIB: u64 = 1024 * 1024;
pub const MODEL: &str = "test-model";
pub const API_KEY: &str = "test-key";

/// One `task.cgi?method=list` entry as the backend returns it
pub fn raw_task(id: &str, size: u64, status: &str, age_hours: f64) -> Value {
    let created = chrono::Utc::now().timestamp() - (age_hours * 3600.0) as i64;
    json!({
        "id": id,
        "title": format!("{id}.mkv"),
        "size": size,
        "status": status,
        "type": "bt",
        "username": "admin",
        "additional": {
            "detail": {"create_time": created, "destination": "downloads"},
            "transfer": {"size_downloaded": 0, "speed_download": 0}
        }
    })
}

/// Store pointing both the backend and the oracle at `base_url`
pub fn store_for(base_url: &str) -> MemoryConfigStore {
    MemoryConfigStore::from_pairs([
        (KEY_BACKEND_URL, base_url.to_string()),
        (KEY_BACKEND_USER, "admin".to_string()),
        (KEY_BACKEND_PASS, "secret".to_string()),
        (KEY_ORACLE_ENDPOINT, base_url.to_string()),
        (KEY_ORACLE_MODEL, MODEL.to_string()),
        (KEY_ORACLE_API_KEY, API_KEY.to_string()),
        (KEY_SAFE_DELETE_THRESHOLD, (100 * MIB).to_string()),
    ])
}

/// Config from [`store_for`] with a fast retry policy
pub fn config_for(base_url: &str) -> Config {
    let mut config = Config::from_store(&store_for(base_url)).unwrap();
    config.oracle.retry.initial_delay = Duration::from_millis(10);
    config
}
