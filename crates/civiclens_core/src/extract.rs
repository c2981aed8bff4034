//! Tolerant extraction of JSON payloads from model output.
//!
//! The model is asked for JSON but may wrap it in a labeled fence, a plain
//! fence, surrounding prose, or nothing at all. [`ExtractionStrategy::ORDER`]
//! lists the wrappings tried, and the first candidate that parses into the
//! expected top-level object wins.

use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

use crate::backend::JobSnapshot;
use crate::error::{CoreError, CoreResult};
use crate::schema::{ElectionRecord, RetrievalMetadata, Source, TopicAnalysis};

pub const METHOD_DISCOVERY: &str = "openai_responses_api_enhanced";
pub const METHOD_ANALYSIS: &str = "openai_responses_api_candidate_analysis";
const MISSING_ASSESSMENT: &str = "Analysis completed but overall assessment not available.";
const PREVIEW_CHARS: usize = 500;
const FENCE: &str = "```";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionStrategy {
    LabeledFence,
    GenericFence,
    BraceSpan,
    WholeText,
}

impl ExtractionStrategy {
    pub const ORDER: [ExtractionStrategy; 4] = [
        ExtractionStrategy::LabeledFence,
        ExtractionStrategy::GenericFence,
        ExtractionStrategy::BraceSpan,
        ExtractionStrategy::WholeText,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ExtractionStrategy::LabeledFence => "json_fence",
            ExtractionStrategy::GenericFence => "generic_fence",
            ExtractionStrategy::BraceSpan => "brace_span",
            ExtractionStrategy::WholeText => "whole_text",
        }
    }

    /// The slice of `text` this strategy would try to parse, if any.
    pub fn candidate<'a>(&self, text: &'a str) -> Option<&'a str> {
        match self {
            ExtractionStrategy::LabeledFence => labeled_fence(text),
            ExtractionStrategy::GenericFence => generic_fence(text),
            ExtractionStrategy::BraceSpan => brace_span(text),
            ExtractionStrategy::WholeText => Some(text.trim()),
        }
    }
}

fn labeled_fence(text: &str) -> Option<&str> {
    // ASCII lowercasing keeps byte offsets aligned with `text`.
    let start = text.to_ascii_lowercase().find("```json")? + "```json".len();
    let rest = &text[start..];
    let end = rest.find(FENCE)?;
    Some(rest[..end].trim())
}

fn generic_fence(text: &str) -> Option<&str> {
    let start = text.find(FENCE)? + FENCE.len();
    let rest = &text[start..];
    let end = rest.find(FENCE)?;
    Some(rest[..end].trim())
}

fn brace_span(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (start < end).then(|| &text[start..=end])
}

/// A top-level object the model is asked to return.
pub trait Payload: DeserializeOwned {
    const NAME: &'static str;

    /// Insert safe values for expected fields the model left out.
    fn fill_defaults(_object: &mut Map<String, Value>) {}
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisPayload {
    pub overall_assessment: String,
    pub topic_analysis: Vec<TopicAnalysis>,
    #[serde(default)]
    pub metadata: Option<BTreeMap<String, Value>>,
}

impl Payload for AnalysisPayload {
    const NAME: &'static str = "analysis";

    fn fill_defaults(object: &mut Map<String, Value>) {
        if !matches!(object.get("overallAssessment"), Some(Value::String(_))) {
            warn!("missing overallAssessment, using fallback text");
            object.insert(
                "overallAssessment".to_string(),
                Value::String(MISSING_ASSESSMENT.to_string()),
            );
        }
        if object.get("topicAnalysis").is_none_or(Value::is_null) {
            warn!("missing topicAnalysis, using empty list");
            object.insert("topicAnalysis".to_string(), Value::Array(Vec::new()));
        }
        if object.get("metadata").is_some_and(|m| !m.is_object()) {
            object.remove("metadata");
        }
    }
}

/// Discovery output. `elections` must be present as an array; an object
/// without one is not a discovery payload and the next strategy runs.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ElectionPayload {
    pub elections: Vec<ElectionRecord>,
}

impl Payload for ElectionPayload {
    const NAME: &'static str = "elections";
}

fn parse_candidate<T: Payload>(candidate: &str) -> Result<T, String> {
    let value: Value = serde_json::from_str(candidate).map_err(|e| e.to_string())?;
    let Value::Object(mut object) = value else {
        return Err("top-level value is not an object".to_string());
    };
    T::fill_defaults(&mut object);
    serde_json::from_value(Value::Object(object)).map_err(|e| e.to_string())
}

/// Run every strategy in order; fails only when none yields a valid payload.
pub fn extract_payload<T: Payload>(text: &str) -> CoreResult<(T, ExtractionStrategy)> {
    for strategy in ExtractionStrategy::ORDER {
        let Some(candidate) = strategy.candidate(text) else {
            continue;
        };
        match parse_candidate::<T>(candidate) {
            Ok(payload) => {
                info!(payload = T::NAME, strategy = strategy.as_str(), "extracted payload");
                return Ok((payload, strategy));
            }
            Err(err) => debug!(strategy = strategy.as_str(), error = %err, "strategy failed"),
        }
    }
    let preview: String = text.chars().take(PREVIEW_CHARS).collect();
    Err(CoreError::malformed(format!("Raw content: {preview}...")))
}

/// The assistant's final text: the `output_text` of the last message item
/// in the job output that carries one.
pub fn final_output_text(job: &JobSnapshot) -> CoreResult<&str> {
    let mut messages = job
        .output
        .iter()
        .filter(|item| item["type"] == "message")
        .peekable();
    if messages.peek().is_none() {
        return Err(CoreError::malformed(
            "No message object found in response output",
        ));
    }
    messages
        .filter_map(|item| item["content"].as_array())
        .filter_map(|parts| {
            parts
                .iter()
                .filter(|part| part["type"] == "output_text")
                .find_map(|part| part["text"].as_str())
                .filter(|text| !text.is_empty())
        })
        .last()
        .ok_or_else(|| CoreError::malformed("No text content found in message"))
}

/// Citations from every web search the job performed, deduplicated by URL.
pub fn collect_sources(job: &JobSnapshot) -> Vec<Source> {
    let mut sources: Vec<Source> = Vec::new();
    for item in job.output.iter().filter(|item| item["type"] == "web_search_call") {
        let Some(listed) = item["action"]["sources"].as_array() else {
            continue;
        };
        for raw in listed {
            let Ok(source) = serde_json::from_value::<Source>(raw.clone()) else {
                continue;
            };
            if !source.url.is_empty() && !sources.iter().any(|s| s.url == source.url) {
                sources.push(source);
            }
        }
    }
    sources
}

/// Retrieval metadata for a job, independent of whether extraction succeeds.
pub fn job_metadata(job: &JobSnapshot, method: &str, fetched_at: String) -> RetrievalMetadata {
    RetrievalMetadata {
        fetched_at,
        method: method.to_string(),
        sources: collect_sources(job),
        response_id: Some(job.id.clone()),
        ..RetrievalMetadata::default()
    }
}

pub fn raw_output(job: &JobSnapshot) -> String {
    if job.output.is_empty() {
        return "No output available".to_string();
    }
    serde_json::to_string_pretty(&job.output).unwrap_or_default()
}

pub fn extract_from_job<T: Payload>(job: &JobSnapshot) -> CoreResult<T> {
    let text = final_output_text(job)?;
    extract_payload::<T>(text).map(|(payload, _)| payload)
}
