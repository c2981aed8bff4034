//! Error types for the retrieval and analysis pipeline.
//!
//! Precondition and jurisdiction failures are raised before any network call.
//! Transport failures are the only retryable category; everything a job reports
//! about itself is terminal.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Could not determine state from address: {address}")]
    UnresolvableJurisdiction { address: String },

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Transport error{}: {message}", .status.map(|s| format!(" (HTTP {s})")).unwrap_or_default())]
    Transport { status: Option<u16>, message: String },

    #[error("Job {job_id} failed: {reason}")]
    JobFailed { job_id: String, reason: String },

    #[error("Job polling timed out after {attempts} attempts{}", .last_error.as_ref().map(|e| format!(" (last error: {e})")).unwrap_or_default())]
    JobTimedOut {
        attempts: u32,
        last_error: Option<String>,
    },

    #[error("No valid JSON found in response: {0}")]
    MalformedPayload(String),

    #[error("No candidates found in election data")]
    NoCandidates,

    #[error("No priority topics found in user survey data")]
    NoPriorityTopics,

    #[error("Insufficient survey data. Please complete the onboarding survey first.")]
    InsufficientSurveyData,

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type CoreResult<T> = Result<T, CoreError>;

impl CoreError {
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn transport(status: Option<u16>, msg: impl Into<String>) -> Self {
        Self::Transport {
            status,
            message: msg.into(),
        }
    }

    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedPayload(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Only transport failures are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport { .. })
    }

    /// True for failures raised by input checks, before any job is submitted.
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            Self::NoCandidates | Self::NoPriorityTopics | Self::InsufficientSurveyData
        )
    }
}

impl From<reqwest::Error> for CoreError {
    fn from(err: reqwest::Error) -> Self {
        Self::transport(err.status().map(|s| s.as_u16()), err.to_string())
    }
}

impl From<CoreError> for String {
    fn from(err: CoreError) -> String {
        err.to_string()
    }
}
