use civiclens_core::catalog::QuestionCatalog;
use civiclens_core::schema::{AnalysisResult, ElectionRecord, RetrievalMetadata};
use civiclens_core::store::{clear_session_data, keys};
use civiclens_core::{HistoryStore, KeyValueStore, SqliteStore, SurveyRepository, session};
use std::sync::Arc;

fn analysis(text: &str) -> AnalysisResult {
    AnalysisResult {
        overall_assessment: text.to_string(),
        topic_analysis: Vec::new(),
        metadata: RetrievalMetadata {
            fetched_at: "2026-10-01T12:00:00Z".to_string(),
            method: "test".to_string(),
            ..RetrievalMetadata::default()
        },
    }
}

fn election(id: &str) -> ElectionRecord {
    ElectionRecord {
        id: id.to_string(),
        ..ElectionRecord::unavailable(2026)
    }
}

#[test]
fn history_survives_reopening_the_database() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("civiclens.db");

    let (session_id, first_id, second_id) = {
        let store: Arc<dyn KeyValueStore> = Arc::new(SqliteStore::open(&path).unwrap());
        let session_id = session::current_session_id(store.as_ref()).unwrap();
        let history = HistoryStore::new(store, session_id.clone());
        let first = history.save(election("first"), analysis("one")).unwrap();
        let second = history.save(election("second"), analysis("two")).unwrap();
        (session_id, first.id, second.id)
    };

    let store: Arc<dyn KeyValueStore> = Arc::new(SqliteStore::open(&path).unwrap());
    assert_eq!(session::current_session_id(store.as_ref()).unwrap(), session_id);

    let history = HistoryStore::new(store.clone(), session_id.clone());
    let listed: Vec<String> = history.list().unwrap().into_iter().map(|e| e.id).collect();
    assert_eq!(listed, vec![second_id.clone(), first_id.clone()]);
    assert_eq!(history.selected().unwrap(), Some(second_id.clone()));

    let updated = history.update(&first_id, analysis("rerun")).unwrap();
    assert_eq!(updated.election_data.id, "first");
    let listed: Vec<String> = history.list().unwrap().into_iter().map(|e| e.id).collect();
    assert_eq!(listed, vec![first_id.clone(), second_id.clone()]);

    assert!(history.delete(&second_id).unwrap());
    assert_eq!(history.selected().unwrap(), Some(first_id.clone()));
    assert!(history.get(&second_id).is_err());
}

#[test]
fn session_data_is_isolated_and_clearable() {
    let dir = tempfile::tempdir().unwrap();
    let store: Arc<dyn KeyValueStore> =
        Arc::new(SqliteStore::open(&dir.path().join("civiclens.db")).unwrap());
    let catalog = QuestionCatalog::builtin();

    let survey = SurveyRepository::new(store.clone(), "s1");
    let topics: Vec<String> = ["healthcare", "education", "climate-environment"]
        .iter()
        .map(|t| t.to_string())
        .collect();
    survey.set_priority_topics(&topics, &catalog).unwrap();
    survey.record_answer("education", 1, 4, &catalog).unwrap();
    HistoryStore::new(store.clone(), "s1")
        .save(election("e1"), analysis("x"))
        .unwrap();
    HistoryStore::new(store.clone(), "s2")
        .save(election("e2"), analysis("y"))
        .unwrap();

    let loaded = survey.load().unwrap();
    assert_eq!(loaded.priority_topics, topics);
    assert_eq!(loaded.answer("education", 1), Some(4));

    assert_eq!(clear_session_data(store.as_ref(), "s1").unwrap(), 3);
    assert!(survey.load().unwrap().priority_topics.is_empty());
    assert!(store.get(&keys::analysis_history("s2")).unwrap().is_some());
}
