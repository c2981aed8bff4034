//! Election discovery and candidate alignment analysis over an asynchronous
//! AI job backend.

pub mod backend;
pub mod catalog;
pub mod config;
pub mod error;
pub mod extract;
pub mod history;
pub mod jurisdiction;
pub mod orchestrator;
pub mod poller;
pub mod preferences;
pub mod request;
pub mod schema;
pub mod session;
pub mod store;
pub mod survey;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use backend::{JobSnapshot, JobStatus, OpenAiResponses, ResponsesBackend};
pub use catalog::QuestionCatalog;
pub use config::Settings;
pub use error::{CoreError, CoreResult};
pub use history::HistoryStore;
pub use orchestrator::{Orchestrator, default_election_year};
pub use poller::{JobPoller, RetryPolicy, Sleeper};
pub use schema::{
    AnalysisResult, ElectionBundle, ElectionRecord, HistoryEntry, SurveyResponseSet,
};
pub use store::{KeyValueStore, MemoryStore, SqliteStore};
pub use survey::SurveyRepository;
