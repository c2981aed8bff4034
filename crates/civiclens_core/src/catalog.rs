use crate::error::{CoreError, CoreResult};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

pub const QUESTIONS_PER_TOPIC: usize = 3;
pub const MIN_PRIORITY_TOPICS: usize = 3;
pub const MAX_PRIORITY_TOPICS: usize = 7;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Topic {
    pub id: String,
    pub title: String,
    pub questions: Vec<String>,
}

/// The fixed set of policy topics and their Likert statements.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionCatalog {
    pub topics: Vec<Topic>,
}

const BUILTIN: &[(&str, &str, [&str; QUESTIONS_PER_TOPIC])] = &[
    (
        "healthcare",
        "Healthcare",
        [
            "Government should provide universal healthcare coverage for all citizens.",
            "Private healthcare insurance should be the primary way people get coverage.",
            "Healthcare costs should be regulated by the government to keep them affordable.",
        ],
    ),
    (
        "education",
        "Education",
        [
            "Public schools should receive more funding from the government.",
            "School choice programs should be expanded to give parents more options.",
            "The government should spend more money to help people learn new job skills.",
        ],
    ),
    (
        "economy-jobs",
        "Economy & Jobs",
        [
            "Cutting taxes for businesses is a good way to create more jobs.",
            "The government should regulate large corporations more strictly.",
            "The lowest hourly pay for workers should be raised.",
        ],
    ),
    (
        "taxes",
        "Taxes",
        [
            "Wealthy individuals should pay higher tax rates than they currently do.",
            "Government spending should be reduced rather than raising taxes.",
            "Tax cuts stimulate economic growth better than government spending.",
        ],
    ),
    (
        "climate-environment",
        "Climate & Environment",
        [
            "The government should invest heavily in renewable energy sources.",
            "Environmental regulations should be reduced to help businesses grow.",
            "Climate change is one of the most urgent issues facing our country.",
        ],
    ),
    (
        "immigration",
        "Immigration",
        [
            "Immigration levels should be increased to help fill job shortages.",
            "Border security should be the top priority in immigration policy.",
            "Undocumented immigrants should have a path to legal status.",
        ],
    ),
    (
        "criminal-justice",
        "Criminal Justice",
        [
            "Police departments should receive more funding and resources.",
            "Criminal justice reform should focus more on rehabilitation than punishment.",
            "Community programs are more effective than policing at preventing crime.",
        ],
    ),
    (
        "foreign-policy",
        "Foreign Policy",
        [
            "Military spending should be increased to maintain national security.",
            "The U.S. should reduce its military involvement in other countries.",
            "Defense spending should be redirected to domestic programs.",
        ],
    ),
    (
        "social-security",
        "Social Security",
        [
            "Social Security benefits should be expanded for all retirees.",
            "The retirement age should be raised to ensure Social Security's future.",
            "Social Security should be privatized to give individuals more control.",
        ],
    ),
    (
        "housing",
        "Housing",
        [
            "The government should help make sure people can afford a place to live.",
            "Laws that limit how much landlords can raise rent are good for communities.",
            "We should build more homes and apartments, even if it makes neighborhoods more crowded.",
        ],
    ),
    (
        "infrastructure",
        "Infrastructure",
        [
            "The government should invest more in roads, bridges, and public transportation.",
            "Private companies should take the lead role in infrastructure projects.",
            "Infrastructure spending should focus on green and sustainable projects.",
        ],
    ),
    (
        "civil-rights",
        "Civil Rights",
        [
            "The government should do more to ensure equal rights for all groups.",
            "Anti-discrimination laws should be strengthened and better enforced.",
            "Individual liberty should take priority over government equality programs.",
        ],
    ),
    (
        "gun-policy",
        "Gun Policy",
        [
            "Gun control laws should be stricter to reduce gun violence.",
            "The Second Amendment protects individual rights to own firearms.",
            "Background checks should be required for all gun purchases.",
        ],
    ),
    (
        "technology-privacy",
        "Technology & Privacy",
        [
            "Large tech companies should be regulated more strictly by the government.",
            "Government should invest more in technology education and training.",
            "Privacy regulations should be strengthened for online platforms.",
        ],
    ),
];

impl Default for QuestionCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

impl QuestionCatalog {
    pub fn builtin() -> Self {
        let topics = BUILTIN
            .iter()
            .map(|(id, title, questions)| Topic {
                id: id.to_string(),
                title: title.to_string(),
                questions: questions.iter().map(|q| q.to_string()).collect(),
            })
            .collect();
        Self { topics }
    }

    /// Load a catalog from a `.yaml`/`.yml` or `.toml` file.
    pub fn load_from_path(path: &Path) -> CoreResult<Self> {
        let raw = fs::read_to_string(path)?;
        let catalog: QuestionCatalog = match path.extension().and_then(|ext| ext.to_str()) {
            Some("yaml") | Some("yml") => serde_yaml::from_str(&raw).map_err(|err| {
                CoreError::configuration(format!("{}: {err}", path.display()))
            })?,
            Some("toml") => toml::from_str(&raw).map_err(|err| {
                CoreError::configuration(format!("{}: {err}", path.display()))
            })?,
            _ => {
                return Err(CoreError::configuration(format!(
                    "Unsupported catalog format: {}",
                    path.display()
                )));
            }
        };
        catalog.validate()?;
        Ok(catalog)
    }

    fn validate(&self) -> CoreResult<()> {
        if self.topics.is_empty() {
            return Err(CoreError::configuration("Question catalog has no topics"));
        }
        for topic in &self.topics {
            if topic.questions.len() != QUESTIONS_PER_TOPIC {
                return Err(CoreError::configuration(format!(
                    "Topic {} must have exactly {QUESTIONS_PER_TOPIC} questions, found {}",
                    topic.id,
                    topic.questions.len()
                )));
            }
        }
        let mut ids: Vec<&str> = self.topics.iter().map(|t| t.id.as_str()).collect();
        ids.sort();
        if ids.windows(2).any(|pair| pair[0] == pair[1]) {
            return Err(CoreError::configuration("Duplicate topic id in catalog"));
        }
        Ok(())
    }

    pub fn topic(&self, id: &str) -> Option<&Topic> {
        self.topics.iter().find(|t| t.id == id)
    }

    /// Display title, falling back to the id for topics outside the catalog.
    pub fn title<'a>(&'a self, id: &'a str) -> &'a str {
        self.topic(id).map(|t| t.title.as_str()).unwrap_or(id)
    }

    pub fn questions(&self, id: &str) -> &[String] {
        self.topic(id).map(|t| t.questions.as_slice()).unwrap_or(&[])
    }

    pub fn contains(&self, id: &str) -> bool {
        self.topic(id).is_some()
    }
}
