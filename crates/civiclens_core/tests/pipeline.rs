use civiclens_core::backend::JobStatus;
use civiclens_core::catalog::QuestionCatalog;
use civiclens_core::poller::{JobPoller, RetryPolicy};
use civiclens_core::request::RequestBuilder;
use civiclens_core::schema::{
    Alignment, CandidateRecord, ElectionRecord, SurveyResponseSet, TopicAnalysis,
};
use civiclens_core::test_support::{
    RecordingSleeper, ScriptedBackend, completed_with_text, snapshot,
};
use civiclens_core::{CoreError, HistoryStore, MemoryStore, Orchestrator};
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

fn orchestrator(backend: Arc<ScriptedBackend>, sleeper: Arc<RecordingSleeper>) -> Orchestrator {
    Orchestrator::with_parts(
        RequestBuilder::default(),
        JobPoller::with_sleeper(backend, RetryPolicy::default(), sleeper),
        QuestionCatalog::builtin(),
    )
}

fn backend_calls(backend: &ScriptedBackend) -> usize {
    backend.create_calls() + backend.retrieve_calls()
}

fn two_candidate_election() -> ElectionRecord {
    let candidate = |name: &str, party: &str| CandidateRecord {
        name: name.to_string(),
        party: party.to_string(),
        office: "Governor".to_string(),
        candidate_url: None,
        photo_url: None,
        verification_status: None,
    };
    ElectionRecord {
        id: "oregon_governor_2026".to_string(),
        name: "Oregon Governor Election 2026".to_string(),
        election_day: "2026-11-03".to_string(),
        office: "Governor".to_string(),
        candidates: vec![candidate("A", "X"), candidate("B", "Y")],
        verification_notes: None,
    }
}

fn healthcare_survey() -> SurveyResponseSet {
    SurveyResponseSet::new(
        vec!["healthcare".to_string()],
        BTreeMap::from([("healthcare_0".to_string(), 5)]),
    )
}

fn expected_topics() -> serde_json::Value {
    json!([{
        "topic": "healthcare",
        "topicTitle": "Healthcare",
        "candidates": [{
            "name": "A",
            "party": "X",
            "stance": "supports universal coverage",
            "alignment": "strong",
            "alignmentReason": "matches strong agree"
        }]
    }])
}

#[tokio::test]
async fn analysis_returns_model_topics_unchanged_with_metadata() {
    let payload = json!({
        "overallAssessment": "Candidate A matches your healthcare priorities.",
        "topicAnalysis": expected_topics(),
    });
    let text = format!("Here is the analysis:\n```json\n{payload}\n```");
    let backend = Arc::new(ScriptedBackend::new(vec![
        Ok(snapshot("resp_test", JobStatus::InProgress)),
        Ok(snapshot("resp_test", JobStatus::InProgress)),
        Ok(completed_with_text("resp_test", &text)),
    ]));
    let sleeper = Arc::new(RecordingSleeper::default());
    let orch = orchestrator(backend.clone(), sleeper.clone());

    let result = orch
        .analyze(&two_candidate_election(), &healthcare_survey())
        .await
        .unwrap();

    let expected: Vec<TopicAnalysis> = serde_json::from_value(expected_topics()).unwrap();
    assert_eq!(result.topic_analysis, expected);
    assert_eq!(result.topic_analysis[0].candidates[0].alignment, Alignment::Strong);
    assert!(!result.metadata.fetched_at.is_empty());
    assert_eq!(result.metadata.response_id.as_deref(), Some("resp_test"));
    assert_eq!(result.metadata.sources[0].url, "https://ballotpedia.org/A");

    // One create plus three polls; waits are the first two progressive intervals.
    assert_eq!(backend_calls(&backend), 4);
    assert_eq!(
        sleeper.recorded(),
        vec![Duration::from_secs(1), Duration::from_secs(1)]
    );
}

#[tokio::test]
async fn preconditions_fail_without_network_calls() {
    let backend = Arc::new(ScriptedBackend::new(Vec::new()));
    let orch = orchestrator(backend.clone(), Arc::new(RecordingSleeper::default()));

    let mut no_candidates = two_candidate_election();
    no_candidates.candidates.clear();
    let err = orch
        .analyze(&no_candidates, &healthcare_survey())
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::NoCandidates));

    let unanswered = SurveyResponseSet::new(vec!["healthcare".to_string()], BTreeMap::new());
    let err = orch
        .analyze(&two_candidate_election(), &unanswered)
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::InsufficientSurveyData));
    assert!(err.is_precondition());

    assert_eq!(backend_calls(&backend), 0);
}

#[tokio::test]
async fn unparseable_answer_degrades_and_can_be_saved() {
    let backend = Arc::new(ScriptedBackend::new(vec![Ok(completed_with_text(
        "resp_test",
        "Sorry, I could not complete this request.",
    ))]));
    let orch = orchestrator(backend, Arc::new(RecordingSleeper::default()));
    let election = two_candidate_election();
    let result = orch.analyze(&election, &healthcare_survey()).await.unwrap();

    assert!(result.is_degraded());
    assert!(result.topic_analysis.is_empty());
    assert!(!result.metadata.fetched_at.is_empty());

    let history = HistoryStore::new(Arc::new(MemoryStore::new()), "session-a");
    let saved = history.save(election.clone(), result).unwrap();
    assert_eq!(history.get(&saved.id).unwrap().election_data, election);
}

#[tokio::test]
async fn polling_times_out_after_attempt_budget() {
    // The create uses the first attempt, leaving 39 polls and 38 waits.
    let polls = (0..39)
        .map(|_| Ok(snapshot("resp_test", JobStatus::InProgress)))
        .collect();
    let backend = Arc::new(ScriptedBackend::new(polls));
    let sleeper = Arc::new(RecordingSleeper::default());
    let orch = orchestrator(backend, sleeper.clone());

    let err = orch
        .analyze(&two_candidate_election(), &healthcare_survey())
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::JobTimedOut { attempts: 40, .. }));

    let waits = sleeper.recorded();
    assert_eq!(waits.len(), 38);
    assert!(waits.windows(2).all(|pair| pair[0] <= pair[1]));
    assert!(waits.iter().sum::<Duration>() <= Duration::from_secs(90));
}

#[tokio::test]
async fn rerun_replaces_analysis_in_place() {
    let first = json!({ "overallAssessment": "first", "topicAnalysis": [] }).to_string();
    let second = json!({ "overallAssessment": "second", "topicAnalysis": expected_topics() })
        .to_string();
    let backend = Arc::new(ScriptedBackend::new(vec![
        Ok(completed_with_text("resp_test", &first)),
        Ok(completed_with_text("resp_test", &second)),
    ]));
    let orch = orchestrator(backend, Arc::new(RecordingSleeper::default()));
    let history = HistoryStore::new(Arc::new(MemoryStore::new()), "session-a");
    let election = two_candidate_election();
    let survey = healthcare_survey();

    let analysis = orch.analyze(&election, &survey).await.unwrap();
    let saved = history.save(election.clone(), analysis).unwrap();
    let rerun = history.rerun(&saved.id, &orch, &survey).await.unwrap();

    assert_eq!(rerun.id, saved.id);
    assert_eq!(rerun.election_data, election);
    assert_eq!(rerun.analysis_data.overall_assessment, "second");
    assert_eq!(history.list().unwrap().len(), 1);
}
