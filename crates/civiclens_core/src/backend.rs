//! AI backend client.
//!
//! The backend exposes long-running "responses": a create call that returns a
//! job id and a retrieve call that reports the job's status and output.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

use crate::config::Settings;
use crate::error::{CoreError, CoreResult};
use crate::request::JobSpec;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobStatus {
    Queued,
    InProgress,
    Completed,
    Failed,
    Cancelled,
    Incomplete,
    Other(String),
}

impl JobStatus {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "queued" => JobStatus::Queued,
            "in_progress" | "in-progress" => JobStatus::InProgress,
            "completed" => JobStatus::Completed,
            "failed" => JobStatus::Failed,
            "cancelled" => JobStatus::Cancelled,
            "incomplete" => JobStatus::Incomplete,
            other => JobStatus::Other(other.to_string()),
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(
            self,
            JobStatus::Queued | JobStatus::InProgress | JobStatus::Other(_)
        )
    }

    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            JobStatus::Failed | JobStatus::Cancelled | JobStatus::Incomplete
        )
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let value = match self {
            JobStatus::Queued => "queued",
            JobStatus::InProgress => "in_progress",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Cancelled => "cancelled",
            JobStatus::Incomplete => "incomplete",
            JobStatus::Other(raw) => raw,
        };
        write!(f, "{value}")
    }
}

/// One observation of a job.
#[derive(Debug, Clone, PartialEq)]
pub struct JobSnapshot {
    pub id: String,
    pub status: JobStatus,
    pub output: Vec<Value>,
    pub error: Option<String>,
}

#[derive(Deserialize)]
struct RawResponse {
    id: String,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    output: Option<Vec<Value>>,
    #[serde(default)]
    error: Option<RawError>,
    #[serde(default)]
    incomplete_details: Option<Value>,
}

#[derive(Deserialize)]
struct RawError {
    #[serde(default)]
    message: Option<String>,
}

impl JobSnapshot {
    pub fn from_value(value: Value) -> CoreResult<Self> {
        let raw: RawResponse = serde_json::from_value(value)?;
        let error = raw
            .error
            .and_then(|e| e.message)
            .or_else(|| raw.incomplete_details.map(|d| d.to_string()));
        Ok(Self {
            id: raw.id,
            status: JobStatus::parse(raw.status.as_deref().unwrap_or("queued")),
            output: raw.output.unwrap_or_default(),
            error,
        })
    }
}

#[async_trait]
pub trait ResponsesBackend: Send + Sync {
    fn name(&self) -> &'static str;

    /// Submit a new job.
    async fn create(&self, spec: &JobSpec) -> CoreResult<JobSnapshot>;

    /// Fetch the current state of a job.
    async fn retrieve(&self, job_id: &str) -> CoreResult<JobSnapshot>;
}

pub struct OpenAiResponses {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl OpenAiResponses {
    /// Fails with a configuration error when no credential is set.
    pub fn new(settings: &Settings) -> CoreResult<Self> {
        let api_key = settings.require_api_key()?.to_string();
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.request_timeout_secs))
            .build()
            .map_err(|err| CoreError::configuration(format!("HTTP client: {err}")))?;
        Ok(Self {
            client,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    fn responses_url(&self) -> String {
        format!("{}/responses", self.base_url)
    }

    async fn decode(&self, response: reqwest::Response) -> CoreResult<JobSnapshot> {
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(parse_http_error(status.as_u16(), &body));
        }
        let value: Value = serde_json::from_str(&body)
            .map_err(|err| CoreError::transport(Some(status.as_u16()), format!("invalid JSON body: {err}")))?;
        JobSnapshot::from_value(value)
    }
}

#[async_trait]
impl ResponsesBackend for OpenAiResponses {
    fn name(&self) -> &'static str {
        "openai-responses"
    }

    async fn create(&self, spec: &JobSpec) -> CoreResult<JobSnapshot> {
        debug!(model = %spec.model, kind = ?spec.kind, "creating response");
        let response = self
            .client
            .post(self.responses_url())
            .bearer_auth(&self.api_key)
            .json(spec)
            .send()
            .await?;
        self.decode(response).await
    }

    async fn retrieve(&self, job_id: &str) -> CoreResult<JobSnapshot> {
        let response = self
            .client
            .get(format!("{}/{job_id}", self.responses_url()))
            .bearer_auth(&self.api_key)
            .send()
            .await?;
        self.decode(response).await
    }
}

/// Map a non-success HTTP status to an error. A rejected credential is a
/// configuration problem; everything else is a transport failure.
pub fn parse_http_error(status: u16, body: &str) -> CoreError {
    let message = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v["error"]["message"].as_str().map(str::to_string))
        .unwrap_or_else(|| {
            if body.is_empty() {
                "Unknown error".to_string()
            } else {
                body.to_string()
            }
        });
    match status {
        401 | 403 => CoreError::configuration(format!("API key rejected (HTTP {status}): {message}")),
        _ => CoreError::transport(Some(status), message),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_status_classification() {
        assert!(!JobStatus::parse("queued").is_terminal());
        assert!(!JobStatus::parse("in_progress").is_terminal());
        assert!(!JobStatus::parse("something_new").is_terminal());
        assert!(JobStatus::parse("completed").is_terminal());
        assert!(!JobStatus::Completed.is_failure());
        assert!(JobStatus::parse("failed").is_failure());
        assert!(JobStatus::parse("cancelled").is_failure());
    }

    #[test]
    fn test_snapshot_from_value() {
        let snapshot = JobSnapshot::from_value(json!({
            "id": "resp_1",
            "status": "failed",
            "output": null,
            "error": { "message": "quota exceeded" }
        }))
        .unwrap();
        assert_eq!(snapshot.id, "resp_1");
        assert_eq!(snapshot.status, JobStatus::Failed);
        assert!(snapshot.output.is_empty());
        assert_eq!(snapshot.error.as_deref(), Some("quota exceeded"));
    }

    #[test]
    fn test_snapshot_requires_id() {
        assert!(JobSnapshot::from_value(json!({ "status": "queued" })).is_err());
    }

    #[test]
    fn test_parse_http_error() {
        let err = parse_http_error(401, r#"{"error":{"message":"Incorrect API key"}}"#);
        assert!(matches!(err, CoreError::Configuration(_)));
        assert!(!err.is_retryable());

        let err = parse_http_error(503, "");
        match err {
            CoreError::Transport { status, message } => {
                assert_eq!(status, Some(503));
                assert_eq!(message, "Unknown error");
            }
            other => panic!("expected transport error, got {other:?}"),
        }

        let err = parse_http_error(429, r#"{"error":{"message":"Rate limit"}}"#);
        assert!(err.is_retryable());
        assert!(err.to_string().contains("Rate limit"));
    }

    #[test]
    fn test_client_requires_api_key() {
        let settings = Settings::default();
        let err = OpenAiResponses::new(&settings).err().unwrap();
        assert!(matches!(err, CoreError::Configuration(_)));

        let settings = Settings {
            api_key: Some("sk-test".to_string()),
            base_url: "http://localhost:9/v1/".to_string(),
            ..Settings::default()
        };
        let client = OpenAiResponses::new(&settings).unwrap();
        assert_eq!(client.responses_url(), "http://localhost:9/v1/responses");
    }
}
