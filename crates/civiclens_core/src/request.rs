//! Job specifications for the AI backend.
//!
//! The expected JSON shape is described inside the prompt text; the backend is
//! not asked to enforce it, which is why extraction is tolerant.

use crate::jurisdiction::Jurisdiction;
use crate::schema::ElectionRecord;
use serde::Serialize;

pub const DEFAULT_DISCOVERY_MODEL: &str = "gpt-4o-2024-11-20";
pub const DEFAULT_ANALYSIS_MODEL: &str = "gpt-4.1";
pub const DISCOVERY_DOMAINS: &[&str] = &["ballotpedia.org"];
pub const DISCOVERY_OFFICES: &[&str] = &["Governor", "Lieutenant Governor"];
const SOURCES_INCLUDE: &str = "web_search_call.action.sources";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    ElectionDiscovery,
    CandidateAnalysis,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchFilters {
    pub allowed_domains: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ToolSpec {
    WebSearch {
        #[serde(skip_serializing_if = "Option::is_none")]
        filters: Option<SearchFilters>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolChoice {
    Auto,
    Required,
}

/// One long-running request; serializes to the Responses API create body.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobSpec {
    #[serde(skip)]
    pub kind: JobKind,
    pub model: String,
    pub input: String,
    pub tools: Vec<ToolSpec>,
    pub tool_choice: ToolChoice,
    pub include: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    pub background: bool,
}

impl JobSpec {
    pub fn uses_web_search(&self) -> bool {
        self.tools
            .iter()
            .any(|tool| matches!(tool, ToolSpec::WebSearch { .. }))
    }
}

#[derive(Debug, Clone)]
pub struct RequestBuilder {
    discovery_model: String,
    analysis_model: String,
}

impl Default for RequestBuilder {
    fn default() -> Self {
        Self::new(DEFAULT_DISCOVERY_MODEL, DEFAULT_ANALYSIS_MODEL)
    }
}

impl RequestBuilder {
    pub fn new(discovery_model: impl Into<String>, analysis_model: impl Into<String>) -> Self {
        Self {
            discovery_model: discovery_model.into(),
            analysis_model: analysis_model.into(),
        }
    }

    pub fn build_election_discovery_job(&self, state: &Jurisdiction, year: i32) -> JobSpec {
        JobSpec {
            kind: JobKind::ElectionDiscovery,
            model: self.discovery_model.clone(),
            input: discovery_prompt(state, year),
            tools: vec![ToolSpec::WebSearch {
                filters: Some(SearchFilters {
                    allowed_domains: DISCOVERY_DOMAINS.iter().map(|d| d.to_string()).collect(),
                }),
            }],
            tool_choice: ToolChoice::Required,
            include: vec![SOURCES_INCLUDE.to_string()],
            temperature: Some(0.05),
            background: true,
        }
    }

    pub fn build_analysis_job(&self, election: &ElectionRecord, preference_context: &str) -> JobSpec {
        JobSpec {
            kind: JobKind::CandidateAnalysis,
            model: self.analysis_model.clone(),
            input: analysis_prompt(election, preference_context),
            tools: vec![ToolSpec::WebSearch { filters: None }],
            tool_choice: ToolChoice::Auto,
            include: vec![SOURCES_INCLUDE.to_string()],
            temperature: None,
            background: true,
        }
    }
}

fn office_slug(office: &str) -> String {
    office.to_lowercase().replace(' ', "_")
}

fn discovery_prompt(state: &Jurisdiction, year: i32) -> String {
    let state_name = state.name;
    let offices = DISCOVERY_OFFICES.join(" and ");
    let example_elections = DISCOVERY_OFFICES
        .iter()
        .map(|office| {
            format!(
                r#"    {{
      "id": "{slug}_{office_slug}_{year}",
      "name": "{state_name} {office} Election {year}",
      "electionDay": "{year}-11-04",
      "office": "{office}",
      "candidates": [
        {{
          "name": "EXACT_BALLOT_NAME",
          "party": "VERIFIED_PARTY",
          "office": "{office}",
          "candidateUrl": null,
          "photoUrl": null,
          "verificationStatus": "confirmed"
        }}
      ],
      "verificationNotes": "List sources used and any uncertainties"
    }}"#,
                slug = state.slug(),
                office_slug = office_slug(office),
            )
        })
        .collect::<Vec<_>>()
        .join(",\n");

    format!(
        r#"VERIFICATION TASK: Find the CURRENT, ballot-qualified candidates for the {year} {state_name} {offices} elections.

SEARCH STEPS:
1. Search ballotpedia.org for the {state_name} elections page for {year}.
2. Open the general election section and its list of ballot-qualified candidates.
3. Cross-check each candidate on their individual Ballotpedia page.

INCLUSION CRITERIA:
- The candidate is listed for the {year} general election and shown as on the ballot.
- Party affiliation is confirmed on the candidate's own page.
- EXCLUDE withdrawn, suspended, or primary-only candidates.
- EXCLUDE historical or past election data.

Return ONE election object PER OFFICE. Never merge offices into one election entry, even when candidates run on a joint ticket (for example Governor and Lieutenant Governor are separate elections).

REQUIRED OUTPUT FORMAT (JSON):
{{
  "elections": [
{example_elections}
  ]
}}

If you cannot find definitive, current, verified candidate information for an office, return that election with an empty candidates array and explain in verificationNotes. Returning no data is better than returning incorrect data."#
    )
}

fn analysis_prompt(election: &ElectionRecord, preference_context: &str) -> String {
    let election_name = if election.name.is_empty() {
        "election"
    } else {
        election.name.as_str()
    };
    let candidate_list = election
        .candidates
        .iter()
        .map(|c| format!("{} ({})", c.name, c.party))
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        r#"You are analyzing candidates for the {election_name} to provide personalized recommendations based on a voter's survey responses.

CANDIDATES TO ANALYZE: {candidate_list}

USER'S PRIORITY TOPICS AND PREFERENCES:
{preference_context}

TASK: Research each candidate's detailed positions on the user's priority topics using current information from Ballotpedia and other reliable sources. Then provide a comprehensive analysis in this exact JSON format:

{{
  "overallAssessment": "A detailed paragraph explaining which candidates align most closely with the voter's expressed priorities, highlighting the strongest and weakest alignments across all topics.",
  "topicAnalysis": [
    {{
      "topic": "topic-id",
      "topicTitle": "Topic Title",
      "candidates": [
        {{
          "name": "Candidate Name",
          "party": "Party",
          "stance": "Detailed description of the candidate's position on this topic",
          "alignment": "strong" | "moderate" | "weak" | "opposed",
          "alignmentReason": "Why this alignment was given, based on the user's survey responses"
        }}
      ]
    }}
  ]
}}

ALIGNMENT SCORING GUIDE:
- "strong": the candidate's position matches statements the user answered 4-5 (Agree / Strongly Agree).
- "moderate": partial or mixed match with the user's preferences.
- "weak": minimal evidence of alignment with the user's preferences.
- "opposed": the candidate's position directly contradicts the user's preferences (responses of 1-2 against the candidate's stance).

Focus on specific policy positions, voting records, and public statements for each candidate on each topic. Be thorough and accurate in your research."#
    )
}
