use crate::catalog::{QUESTIONS_PER_TOPIC, QuestionCatalog};
use crate::schema::{SurveyResponseSet, question_key};
use std::collections::BTreeMap;

pub fn likert_label(value: u8) -> &'static str {
    match value {
        1 => "Strongly Disagree",
        2 => "Disagree",
        3 => "Neutral",
        4 => "Agree",
        5 => "Strongly Agree",
        _ => "Unknown",
    }
}

/// Render survey answers as the preference block embedded in analysis prompts.
///
/// Topics follow `priority_topics` order and questions follow catalog order.
/// Unanswered questions are skipped, and so is a topic with no answers at all.
pub fn build_context(
    priority_topics: &[String],
    survey_responses: &BTreeMap<String, u8>,
    catalog: &QuestionCatalog,
) -> String {
    let mut blocks = Vec::new();

    for topic_id in priority_topics {
        let lines: Vec<String> = catalog
            .questions(topic_id)
            .iter()
            .enumerate()
            .filter_map(|(index, question)| {
                survey_responses
                    .get(&question_key(topic_id, index))
                    .map(|&value| {
                        format!(
                            "- \"{question}\" → User response: {}",
                            likert_label(value)
                        )
                    })
            })
            .collect();

        if lines.is_empty() {
            continue;
        }

        let mut block = format!("{}:\n", catalog.title(topic_id).to_uppercase());
        block.push_str(&lines.join("\n"));
        blocks.push(block);
    }

    blocks.join("\n\n")
}

/// Whether the survey holds enough for an analysis: at least one priority topic,
/// some answers, and an answer to at least one question of a priority topic.
pub fn is_usable_for_analysis(survey: &SurveyResponseSet) -> bool {
    if survey.priority_topics.is_empty() || survey.survey_responses.is_empty() {
        return false;
    }
    survey.priority_topics.iter().any(|topic_id| {
        (0..QUESTIONS_PER_TOPIC).any(|index| survey.answer(topic_id, index).is_some())
    })
}
