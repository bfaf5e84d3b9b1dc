//! Generative-language API oracle

use super::{
    DecisionProvider, build_prompt, parse_decisions, retain_known, strip_wrappers, summarize,
};
use crate::config::{OracleConfig, PolicyConfig};
use crate::error::{Error, OracleError, Result};
use crate::retry::with_retry;
use crate::types::{Decision, Task};
use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Longest error body kept in an [`OracleError::Status`]
const MAX_ERROR_BODY: usize = 512;

#[derive(Serialize)]
struct GenerateRequest<'a> {
    contents: [Content<'a>; 1],
}

#[derive(Serialize)]
struct Content<'a> {
    parts: [Part<'a>; 1],
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

impl GenerateResponse {
    fn into_text(self) -> Option<String> {
        self.candidates
            .into_iter()
            .next()?
            .content?
            .parts
            .into_iter()
            .next()?
            .text
    }
}

/// Oracle backed by a `generateContent` endpoint
///
/// One proposal is one round-trip; the whole round-trip (transport, status,
/// payload decoding) is retried under the configured [`RetryConfig`](crate::config::RetryConfig).
pub struct GeminiOracle {
    http: reqwest::Client,
    config: OracleConfig,
}

impl GeminiOracle {
    /// Create an oracle client
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be created
    pub fn new(config: OracleConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("ds-pilot/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::HttpClient(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { http, config })
    }

    fn url(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.config.endpoint.trim_end_matches('/'),
            self.config.model
        )
    }

    /// One request/response cycle, without retry
    async fn round_trip(
        &self,
        api_key: &str,
        prompt: &str,
    ) -> std::result::Result<Vec<Decision>, OracleError> {
        let body = GenerateRequest {
            contents: [Content {
                parts: [Part { text: prompt }],
            }],
        };

        let response = self
            .http
            .post(self.url())
            .header("x-goog-api-key", api_key)
            .json(&body)
            .timeout(self.config.timeout)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(OracleError::Status {
                status: status.as_u16(),
                body: text.chars().take(MAX_ERROR_BODY).collect(),
            });
        }

        let reply = serde_json::from_str::<GenerateResponse>(&text)
            .map_err(|e| OracleError::Decode(format!("unexpected response shape: {}", e)))?
            .into_text()
            .ok_or_else(|| OracleError::Decode("response has no candidate text".into()))?;

        parse_decisions(strip_wrappers(&reply))
    }
}

#[async_trait]
impl DecisionProvider for GeminiOracle {
    async fn propose(&self, tasks: &[Task], policy: &PolicyConfig) -> Option<Vec<Decision>> {
        let Some(api_key) = self.config.api_key.as_deref() else {
            tracing::warn!(
                error = %OracleError::MissingCredentials,
                advisory = "unavailable",
                "oracle not called"
            );
            return None;
        };

        let prompt = match build_prompt(&summarize(tasks, Utc::now()), policy) {
            Ok(prompt) => prompt,
            Err(e) => {
                tracing::error!(
                    error = %e,
                    advisory = "unavailable",
                    "failed to build oracle request"
                );
                return None;
            }
        };

        let mut attempts = 0u32;
        let result = with_retry(&self.config.retry, || {
            attempts += 1;
            self.round_trip(api_key, &prompt)
        })
        .await;

        match result {
            Ok(decisions) => {
                let (decisions, dropped) = retain_known(decisions, tasks);
                let advisory = if decisions.is_empty() { "empty" } else { "proposed" };
                tracing::info!(
                    model = %self.config.model,
                    attempts,
                    advisory,
                    decisions = decisions.len(),
                    dropped_unknown = dropped,
                    "oracle call complete"
                );
                Some(decisions)
            }
            Err(e) => {
                tracing::warn!(
                    model = %self.config.model,
                    attempts,
                    advisory = "unavailable",
                    error = %e,
                    "oracle call failed, no advisory this run"
                );
                None
            }
        }
    }

    fn name(&self) -> &'static str {
        "gemini"
    }
}
