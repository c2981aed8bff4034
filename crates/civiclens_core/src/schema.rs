use schemars::JsonSchema;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::collections::BTreeMap;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

/// A web page the backend consulted while answering a job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Source {
    #[serde(default, deserialize_with = "string_or_null")]
    pub url: String,
    #[serde(default, deserialize_with = "string_or_null")]
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CandidateRecord {
    #[serde(default, deserialize_with = "string_or_null")]
    pub name: String,
    #[serde(default, deserialize_with = "string_or_null")]
    pub party: String,
    #[serde(default, deserialize_with = "string_or_null")]
    pub office: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub candidate_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verification_status: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ElectionRecord {
    #[serde(default, deserialize_with = "string_or_null")]
    pub id: String,
    #[serde(default, deserialize_with = "string_or_null")]
    pub name: String,
    #[serde(default, deserialize_with = "string_or_null")]
    pub election_day: String, // ISO date, e.g. "2025-11-04"
    #[serde(default, deserialize_with = "string_or_null")]
    pub office: String,
    #[serde(default)]
    pub candidates: Vec<CandidateRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verification_notes: Option<String>,
}

impl ElectionRecord {
    /// Stand-in returned when discovery output could not be parsed.
    pub fn unavailable(year: i32) -> Self {
        Self {
            id: "unknown_election".to_string(),
            name: "Election Data Unavailable".to_string(),
            election_day: format!("{year}-11-04"),
            office: "Governor".to_string(),
            candidates: Vec::new(),
            verification_notes: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct NormalizedInput {
    pub line1: String,
}

/// Result of one discovery run for an address.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ElectionBundle {
    pub elections: Vec<ElectionRecord>,
    pub metadata: RetrievalMetadata,
    pub state: String,
    pub normalized_input: NormalizedInput,
}

impl ElectionBundle {
    pub fn find(&self, election_id: &str) -> Option<&ElectionRecord> {
        self.elections.iter().find(|e| e.id == election_id)
    }
}

/// Survey answers keyed by `"<topicId>_<questionIndex>"`, values 1..=5.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SurveyResponseSet {
    #[serde(default)]
    pub priority_topics: Vec<String>,
    #[serde(default)]
    pub survey_responses: BTreeMap<String, u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

impl SurveyResponseSet {
    pub fn new(priority_topics: Vec<String>, survey_responses: BTreeMap<String, u8>) -> Self {
        Self {
            priority_topics,
            survey_responses,
            session_id: None,
        }
    }

    pub fn answer(&self, topic_id: &str, index: usize) -> Option<u8> {
        self.survey_responses
            .get(&question_key(topic_id, index))
            .copied()
    }
}

pub fn question_key(topic_id: &str, index: usize) -> String {
    format!("{topic_id}_{index}")
}

/// How closely a candidate's stance matches the voter on one topic.
///
/// Tags outside the four known values are kept verbatim as `Unrecognized` so a
/// model that drifts from the rubric never fails the whole payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Alignment {
    Strong,
    Moderate,
    Weak,
    Opposed,
    Unrecognized(String),
}

impl Alignment {
    pub fn as_str(&self) -> &str {
        match self {
            Alignment::Strong => "strong",
            Alignment::Moderate => "moderate",
            Alignment::Weak => "weak",
            Alignment::Opposed => "opposed",
            Alignment::Unrecognized(raw) => raw,
        }
    }

    pub fn is_recognized(&self) -> bool {
        !matches!(self, Alignment::Unrecognized(_))
    }

    /// Short label for display; unknown tags render as "unrated".
    pub fn label(&self) -> &'static str {
        match self {
            Alignment::Strong => "Strong Alignment",
            Alignment::Moderate => "Moderate Alignment",
            Alignment::Weak => "Weak Alignment",
            Alignment::Opposed => "Opposed",
            Alignment::Unrecognized(_) => "Unrated",
        }
    }
}

impl Default for Alignment {
    fn default() -> Self {
        Alignment::Unrecognized(String::new())
    }
}

impl From<&str> for Alignment {
    fn from(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "strong" => Alignment::Strong,
            "moderate" => Alignment::Moderate,
            "weak" => Alignment::Weak,
            "opposed" => Alignment::Opposed,
            _ => Alignment::Unrecognized(value.to_string()),
        }
    }
}

impl std::fmt::Display for Alignment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl Serialize for Alignment {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Alignment {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?;
        Ok(raw.as_deref().map(Alignment::from).unwrap_or_default())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CandidateAlignment {
    #[serde(default, deserialize_with = "string_or_null")]
    pub name: String,
    #[serde(default, deserialize_with = "string_or_null")]
    pub party: String,
    #[serde(default, deserialize_with = "string_or_null")]
    pub stance: String,
    #[serde(default)]
    #[schemars(with = "String")]
    pub alignment: Alignment,
    #[serde(default, deserialize_with = "string_or_null")]
    pub alignment_reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TopicAnalysis {
    #[serde(default, deserialize_with = "string_or_null")]
    pub topic: String,
    #[serde(default, deserialize_with = "string_or_null")]
    pub topic_title: String,
    #[serde(default)]
    pub candidates: Vec<CandidateAlignment>,
}

/// Provenance attached to every discovery or analysis result.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RetrievalMetadata {
    #[serde(default)]
    pub fetched_at: String,
    #[serde(default)]
    pub method: String,
    #[serde(default)]
    pub sources: Vec<Source>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_response: Option<String>,
    // Fields the model reported about its own run (analysisDate, topicsAnalyzed, ...).
    #[serde(flatten)]
    pub reported: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    #[serde(default)]
    pub overall_assessment: String,
    #[serde(default)]
    pub topic_analysis: Vec<TopicAnalysis>,
    #[serde(default)]
    pub metadata: RetrievalMetadata,
}

impl AnalysisResult {
    /// Value returned in place of an analysis whose payload could not be parsed.
    pub fn degraded(error: &str, metadata: RetrievalMetadata) -> Self {
        Self {
            overall_assessment: format!("Analysis could not be completed. Error: {error}"),
            topic_analysis: Vec::new(),
            metadata: RetrievalMetadata {
                error: Some(error.to_string()),
                ..metadata
            },
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.metadata.error.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub id: String,
    pub election_data: ElectionRecord,
    pub analysis_data: AnalysisResult,
    pub timestamp: String, // RFC 3339
}

impl HistoryEntry {
    pub fn recorded_at(&self) -> Option<OffsetDateTime> {
        OffsetDateTime::parse(&self.timestamp, &Rfc3339).ok()
    }
}

/// Current UTC time as RFC 3339.
pub fn timestamp_now() -> String {
    let now = OffsetDateTime::now_utc();
    now.format(&Rfc3339)
        .unwrap_or_else(|_| now.unix_timestamp().to_string())
}

fn string_or_null<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}
