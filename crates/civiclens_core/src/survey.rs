use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::warn;

use crate::catalog::{MAX_PRIORITY_TOPICS, MIN_PRIORITY_TOPICS, QUESTIONS_PER_TOPIC, QuestionCatalog};
use crate::error::{CoreError, CoreResult};
use crate::schema::{SurveyResponseSet, question_key};
use crate::store::{KeyValueStore, keys};

/// Onboarding answers for one session.
pub struct SurveyRepository {
    store: Arc<dyn KeyValueStore>,
    session_id: String,
}

impl SurveyRepository {
    pub fn new(store: Arc<dyn KeyValueStore>, session_id: impl Into<String>) -> Self {
        Self {
            store,
            session_id: session_id.into(),
        }
    }

    /// Unreadable stored values are treated as absent.
    pub fn load(&self) -> CoreResult<SurveyResponseSet> {
        let priority_topics = self
            .read_json::<Vec<String>>(&keys::priority_issues(&self.session_id))?
            .unwrap_or_default();
        let survey_responses = self
            .read_json::<BTreeMap<String, u8>>(&keys::survey_responses(&self.session_id))?
            .unwrap_or_default();
        Ok(SurveyResponseSet {
            priority_topics,
            survey_responses,
            session_id: Some(self.session_id.clone()),
        })
    }

    fn read_json<T: serde::de::DeserializeOwned>(&self, key: &str) -> CoreResult<Option<T>> {
        let Some(raw) = self.store.get(key)? else {
            return Ok(None);
        };
        match serde_json::from_str(&raw) {
            Ok(value) => Ok(Some(value)),
            Err(err) => {
                warn!(key, error = %err, "ignoring unreadable survey data");
                Ok(None)
            }
        }
    }

    pub fn set_priority_topics(&self, topics: &[String], catalog: &QuestionCatalog) -> CoreResult<()> {
        if !(MIN_PRIORITY_TOPICS..=MAX_PRIORITY_TOPICS).contains(&topics.len()) {
            return Err(CoreError::validation(format!(
                "Pick between {MIN_PRIORITY_TOPICS} and {MAX_PRIORITY_TOPICS} priority topics, got {}",
                topics.len()
            )));
        }
        let mut seen: Vec<&str> = Vec::new();
        for topic in topics {
            if !catalog.contains(topic) {
                return Err(CoreError::validation(format!("Unknown topic: {topic}")));
            }
            if seen.contains(&topic.as_str()) {
                return Err(CoreError::validation(format!("Duplicate topic: {topic}")));
            }
            seen.push(topic);
        }
        let raw = serde_json::to_string(topics)?;
        self.store.set(&keys::priority_issues(&self.session_id), &raw)
    }

    pub fn record_answer(
        &self,
        topic: &str,
        index: usize,
        value: u8,
        catalog: &QuestionCatalog,
    ) -> CoreResult<()> {
        if !catalog.contains(topic) {
            return Err(CoreError::validation(format!("Unknown topic: {topic}")));
        }
        if index >= QUESTIONS_PER_TOPIC {
            return Err(CoreError::validation(format!(
                "Question index must be below {QUESTIONS_PER_TOPIC}, got {index}"
            )));
        }
        if !(1..=5).contains(&value) {
            return Err(CoreError::validation(format!(
                "Answer must be between 1 and 5, got {value}"
            )));
        }
        let mut survey = self.load()?;
        survey.survey_responses.insert(question_key(topic, index), value);
        let raw = serde_json::to_string(&survey.survey_responses)?;
        self.store.set(&keys::survey_responses(&self.session_id), &raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn repository() -> (Arc<MemoryStore>, SurveyRepository) {
        let store = Arc::new(MemoryStore::new());
        let repo = SurveyRepository::new(store.clone(), "s1");
        (store, repo)
    }

    fn ids(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn test_empty_session_loads_empty_survey() {
        let (_, repo) = repository();
        let survey = repo.load().unwrap();
        assert!(survey.priority_topics.is_empty());
        assert!(survey.survey_responses.is_empty());
        assert_eq!(survey.session_id.as_deref(), Some("s1"));
    }

    #[test]
    fn test_round_trip_uses_storage_keys() {
        let (store, repo) = repository();
        let catalog = QuestionCatalog::builtin();
        repo.set_priority_topics(&ids(&["healthcare", "taxes", "housing"]), &catalog)
            .unwrap();
        repo.record_answer("healthcare", 0, 5, &catalog).unwrap();
        repo.record_answer("taxes", 2, 1, &catalog).unwrap();

        assert_eq!(
            store.get("onboarding_priority_issues_s1").unwrap().as_deref(),
            Some(r#"["healthcare","taxes","housing"]"#)
        );
        assert_eq!(
            store.get("onboarding_survey_responses_s1").unwrap().as_deref(),
            Some(r#"{"healthcare_0":5,"taxes_2":1}"#)
        );
        let survey = repo.load().unwrap();
        assert_eq!(survey.answer("healthcare", 0), Some(5));
    }

    #[test]
    fn test_corrupt_values_read_as_empty() {
        let (store, repo) = repository();
        store.set("onboarding_priority_issues_s1", "not json").unwrap();
        assert!(repo.load().unwrap().priority_topics.is_empty());
    }

    #[test]
    fn test_validation() {
        let (_, repo) = repository();
        let catalog = QuestionCatalog::builtin();
        assert!(repo.set_priority_topics(&ids(&["healthcare"]), &catalog).is_err());
        assert!(
            repo.set_priority_topics(&ids(&["healthcare", "taxes", "astrology"]), &catalog)
                .is_err()
        );
        assert!(
            repo.set_priority_topics(&ids(&["taxes", "taxes", "housing"]), &catalog)
                .is_err()
        );
        assert!(repo.record_answer("healthcare", 3, 5, &catalog).is_err());
        assert!(repo.record_answer("healthcare", 0, 6, &catalog).is_err());
        assert!(repo.record_answer("healthcare", 0, 0, &catalog).is_err());
    }
}
