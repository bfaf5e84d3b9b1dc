//! wiremock mounts for the backend web API and the oracle endpoint

use super::fixtures::{API_KEY, MODEL};
use serde_json::{Value, json};
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const AUTH_PATH: &str = "/webapi/auth.cgi";
pub const TASK_PATH: &str = "/webapi/DownloadStation/task.cgi";

pub fn oracle_path() -> String {
    format!("/models/{MODEL}:generateContent")
}

pub async fn mount_login(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path(AUTH_PATH))
        .and(query_param("method", "login"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"success": true, "data": {"sid": "sid-1"}})),
        )
        .expect(1)
        .mount(server)
        .await;
}

pub async fn mount_logout(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path(AUTH_PATH))
        .and(query_param("method", "logout"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": true})))
        .mount(server)
        .await;
}

pub async fn mount_list(server: &MockServer, tasks: Vec<Value>) {
    let total = tasks.len();
    Mock::given(method("GET"))
        .and(path(TASK_PATH))
        .and(query_param("method", "list"))
        .and(query_param("_sid", "sid-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "data": {"offset": 0, "total": total, "tasks": tasks}
        })))
        .mount(server)
        .await;
}

/// Expect exactly `times` control calls of `action` for `id`
pub async fn expect_control(server: &MockServer, action: &str, id: &str, times: u64) {
    Mock::given(method("GET"))
        .and(path(TASK_PATH))
        .and(query_param("method", action))
        .and(query_param("id", id))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "data": [{"id": id, "error": 0}]
        })))
        .expect(times)
        .mount(server)
        .await;
}

/// Reply to every oracle call with `text` as the generated content
pub async fn mount_oracle_reply(server: &MockServer, text: &str) {
    Mock::given(method("POST"))
        .and(path(oracle_path()))
        .and(header("x-goog-api-key", API_KEY))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{"content": {"parts": [{"text": text}], "role": "model"}}]
        })))
        .mount(server)
        .await;
}
