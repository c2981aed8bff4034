//! Discovery and analysis pipelines.
//!
//! Both pipelines run one job end to end and never persist anything; callers
//! hand the results to [`crate::history::HistoryStore`]. A payload that cannot
//! be extracted becomes a degraded value with `metadata.error` set, while
//! precondition, transport and job failures propagate as errors.

use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use time::Date;
use tracing::{info, warn};

use crate::backend::{JobSnapshot, ResponsesBackend};
use crate::catalog::QuestionCatalog;
use crate::config::Settings;
use crate::error::{CoreError, CoreResult};
use crate::extract::{
    AnalysisPayload, ElectionPayload, METHOD_ANALYSIS, METHOD_DISCOVERY, extract_from_job,
    job_metadata, raw_output,
};
use crate::jurisdiction::resolve_state;
use crate::poller::{JobPoller, RetryPolicy};
use crate::preferences::{build_context, is_usable_for_analysis};
use crate::request::RequestBuilder;
use crate::schema::{
    AnalysisResult, ElectionBundle, ElectionRecord, NormalizedInput, RetrievalMetadata,
    SurveyResponseSet, timestamp_now,
};

// Keys owned by `RetrievalMetadata` itself; the model cannot overwrite them.
const RESERVED_METADATA_KEYS: &[&str] = &[
    "fetchedAt",
    "method",
    "sources",
    "responseId",
    "error",
    "rawResponse",
];

/// Election year to look up: the current year when even, else the next one.
pub fn default_election_year(today: Date) -> i32 {
    let year = today.year();
    if year % 2 == 0 { year } else { year + 1 }
}

/// Fails fast on input an analysis could never use. Checked in order:
/// candidates, priority topics, then answered questions.
pub fn validate_analysis_input(
    election: &ElectionRecord,
    survey: &SurveyResponseSet,
) -> CoreResult<()> {
    if election.candidates.is_empty() {
        return Err(CoreError::NoCandidates);
    }
    if survey.priority_topics.is_empty() {
        return Err(CoreError::NoPriorityTopics);
    }
    if !is_usable_for_analysis(survey) {
        return Err(CoreError::InsufficientSurveyData);
    }
    Ok(())
}

pub struct Orchestrator {
    requests: RequestBuilder,
    poller: JobPoller,
    catalog: QuestionCatalog,
}

impl Orchestrator {
    /// Wire the pipelines from settings, loading a catalog override if one is configured.
    pub fn new(backend: Arc<dyn ResponsesBackend>, settings: &Settings) -> CoreResult<Self> {
        let catalog = match &settings.catalog_path {
            Some(path) => QuestionCatalog::load_from_path(path)?,
            None => QuestionCatalog::builtin(),
        };
        Ok(Self::with_parts(
            RequestBuilder::new(&settings.discovery_model, &settings.analysis_model),
            JobPoller::new(backend, RetryPolicy::from_settings(&settings.polling)),
            catalog,
        ))
    }

    pub fn with_parts(requests: RequestBuilder, poller: JobPoller, catalog: QuestionCatalog) -> Self {
        Self {
            requests,
            poller,
            catalog,
        }
    }

    pub fn catalog(&self) -> &QuestionCatalog {
        &self.catalog
    }

    /// Find the elections on the ballot for `address` in `year`.
    pub async fn fetch_elections(&self, address: &str, year: i32) -> CoreResult<ElectionBundle> {
        let address = address.trim();
        if address.is_empty() {
            return Err(CoreError::validation("Address is required"));
        }
        let state = resolve_state(address)?;
        info!(state = %state, year, "detected state");

        let spec = self.requests.build_election_discovery_job(&state, year);
        let job = self.poller.run(&spec).await?;
        let mut metadata = job_metadata(&job, METHOD_DISCOVERY, timestamp_now());

        let elections = match extract_from_job::<ElectionPayload>(&job) {
            Ok(payload) => {
                info!(count = payload.elections.len(), "elections extracted");
                payload.elections
            }
            Err(CoreError::MalformedPayload(reason)) => {
                warn!(job_id = %job.id, %reason, "discovery payload unusable, returning placeholder");
                metadata.error = Some(reason);
                metadata.raw_response = Some(raw_output(&job));
                vec![ElectionRecord::unavailable(year)]
            }
            Err(err) => return Err(err),
        };

        Ok(ElectionBundle {
            elections,
            metadata,
            state: state.name.to_string(),
            normalized_input: NormalizedInput {
                line1: address.to_string(),
            },
        })
    }

    /// Judge how each candidate aligns with the voter's survey answers.
    pub async fn analyze(
        &self,
        election: &ElectionRecord,
        survey: &SurveyResponseSet,
    ) -> CoreResult<AnalysisResult> {
        validate_analysis_input(election, survey)?;

        let context = build_context(
            &survey.priority_topics,
            &survey.survey_responses,
            &self.catalog,
        );
        let spec = self.requests.build_analysis_job(election, &context);
        info!(
            election_id = %election.id,
            candidates = election.candidates.len(),
            topics = survey.priority_topics.len(),
            "starting candidate analysis"
        );
        let job = self.poller.run(&spec).await?;
        Ok(analysis_from_job(&job))
    }
}

fn analysis_from_job(job: &JobSnapshot) -> AnalysisResult {
    let metadata = job_metadata(job, METHOD_ANALYSIS, timestamp_now());
    match extract_from_job::<AnalysisPayload>(job) {
        Ok(payload) => AnalysisResult {
            overall_assessment: payload.overall_assessment,
            topic_analysis: payload.topic_analysis,
            metadata: RetrievalMetadata {
                reported: reported_fields(payload.metadata),
                ..metadata
            },
        },
        Err(err) => {
            let reason = match err {
                CoreError::MalformedPayload(reason) => reason,
                other => other.to_string(),
            };
            warn!(job_id = %job.id, %reason, "analysis payload unusable, returning degraded result");
            AnalysisResult::degraded(
                &reason,
                RetrievalMetadata {
                    raw_response: Some(raw_output(job)),
                    ..metadata
                },
            )
        }
    }
}

fn reported_fields(reported: Option<BTreeMap<String, Value>>) -> BTreeMap<String, Value> {
    let mut fields = reported.unwrap_or_default();
    fields.retain(|key, _| !RESERVED_METADATA_KEYS.contains(&key.as_str()));
    fields
}
