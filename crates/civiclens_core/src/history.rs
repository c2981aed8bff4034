//! Per-session analysis history.
//!
//! The whole collection lives under one key as a JSON array. Every mutation
//! reads the array, changes it and writes it back while holding `write_lock`,
//! so two interleaved writers cannot drop each other's entries. Mutations work
//! on the raw array: an element that no longer parses as a [`HistoryEntry`] is
//! written back untouched, and a value that is not an array at all is never
//! overwritten. Order is applied on read (newest first, later-stored first on
//! ties); the stored order carries no other meaning.

use serde_json::Value;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{CoreError, CoreResult};
use crate::orchestrator::Orchestrator;
use crate::schema::{AnalysisResult, ElectionRecord, HistoryEntry, SurveyResponseSet, timestamp_now};
use crate::store::{KeyValueStore, keys};

pub struct HistoryStore {
    store: Arc<dyn KeyValueStore>,
    session_id: String,
    write_lock: Mutex<()>,
    selected: Mutex<Option<String>>,
}

fn guard<T>(mutex: &Mutex<T>) -> CoreResult<MutexGuard<'_, T>> {
    mutex
        .lock()
        .map_err(|_| CoreError::internal("history lock poisoned"))
}

fn newest_first(entries: Vec<HistoryEntry>) -> Vec<HistoryEntry> {
    let mut indexed: Vec<(usize, HistoryEntry)> = entries.into_iter().enumerate().collect();
    indexed.sort_by(|(ia, a), (ib, b)| {
        b.recorded_at()
            .cmp(&a.recorded_at())
            .then_with(|| ib.cmp(ia))
    });
    indexed.into_iter().map(|(_, entry)| entry).collect()
}

fn entry_id(raw: &Value) -> Option<&str> {
    raw.get("id").and_then(Value::as_str)
}

impl HistoryStore {
    pub fn new(store: Arc<dyn KeyValueStore>, session_id: impl Into<String>) -> Self {
        Self {
            store,
            session_id: session_id.into(),
            write_lock: Mutex::new(()),
            selected: Mutex::new(None),
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    fn key(&self) -> String {
        keys::analysis_history(&self.session_id)
    }

    /// The stored array as raw values. Fails when the stored value is not a
    /// JSON array, so no caller writes over data it could not read.
    fn read_raw(&self) -> CoreResult<Vec<Value>> {
        match self.store.get(&self.key())? {
            Some(raw) => Ok(serde_json::from_str(&raw)?),
            None => Ok(Vec::new()),
        }
    }

    fn write_raw(&self, entries: &[Value]) -> CoreResult<()> {
        let raw = serde_json::to_string(entries)?;
        self.store.set(&self.key(), &raw)
    }

    fn parse_entries(&self, raw: Vec<Value>) -> Vec<HistoryEntry> {
        raw.into_iter()
            .filter_map(|value| match serde_json::from_value::<HistoryEntry>(value) {
                Ok(entry) => Some(entry),
                Err(err) => {
                    warn!(session_id = %self.session_id, error = %err, "skipping unreadable history entry");
                    None
                }
            })
            .collect()
    }

    /// Readable entries in stored order; an unreadable collection reads as empty.
    fn read_all(&self) -> CoreResult<Vec<HistoryEntry>> {
        match self.read_raw() {
            Ok(raw) => Ok(self.parse_entries(raw)),
            Err(CoreError::Serialization(err)) => {
                warn!(session_id = %self.session_id, error = %err, "unreadable history, listing nothing");
                Ok(Vec::new())
            }
            Err(err) => Err(err),
        }
    }

    /// Append a new entry and select it.
    pub fn save(&self, election: ElectionRecord, analysis: AnalysisResult) -> CoreResult<HistoryEntry> {
        let entry = HistoryEntry {
            id: Uuid::new_v4().to_string(),
            election_data: election,
            analysis_data: analysis,
            timestamp: timestamp_now(),
        };
        {
            let _write = guard(&self.write_lock)?;
            let mut entries = self.read_raw()?;
            entries.push(serde_json::to_value(&entry)?);
            self.write_raw(&entries)?;
        }
        *guard(&self.selected)? = Some(entry.id.clone());
        info!(entry_id = %entry.id, election_id = %entry.election_data.id, "saved analysis to history");
        Ok(entry)
    }

    /// All readable entries, most recent first. Selects the newest entry when
    /// nothing is selected.
    pub fn list(&self) -> CoreResult<Vec<HistoryEntry>> {
        let entries = newest_first(self.read_all()?);
        let mut selected = guard(&self.selected)?;
        if selected.is_none() {
            *selected = entries.first().map(|entry| entry.id.clone());
        }
        Ok(entries)
    }

    pub fn get(&self, id: &str) -> CoreResult<HistoryEntry> {
        self.read_all()?
            .into_iter()
            .find(|entry| entry.id == id)
            .ok_or_else(|| CoreError::not_found(format!("history entry {id}")))
    }

    pub fn select(&self, id: &str) -> CoreResult<HistoryEntry> {
        let entry = self.get(id)?;
        *guard(&self.selected)? = Some(entry.id.clone());
        Ok(entry)
    }

    pub fn selected(&self) -> CoreResult<Option<String>> {
        Ok(guard(&self.selected)?.clone())
    }

    /// Replace the analysis and timestamp of an entry, keeping its election.
    pub fn update(&self, id: &str, analysis: AnalysisResult) -> CoreResult<HistoryEntry> {
        let _write = guard(&self.write_lock)?;
        let mut entries = self.read_raw()?;
        let slot = entries
            .iter_mut()
            .find(|raw| entry_id(raw) == Some(id))
            .ok_or_else(|| CoreError::not_found(format!("history entry {id}")))?;
        let mut entry: HistoryEntry = serde_json::from_value(slot.clone())?;
        entry.analysis_data = analysis;
        entry.timestamp = timestamp_now();
        *slot = serde_json::to_value(&entry)?;
        self.write_raw(&entries)?;
        info!(entry_id = %id, "updated history entry");
        Ok(entry)
    }

    /// Remove an entry; returns whether it existed. A deleted selection falls
    /// back to the newest remaining entry.
    pub fn delete(&self, id: &str) -> CoreResult<bool> {
        let _write = guard(&self.write_lock)?;
        let mut entries = self.read_raw()?;
        let before = entries.len();
        entries.retain(|raw| entry_id(raw) != Some(id));
        if entries.len() == before {
            return Ok(false);
        }
        self.write_raw(&entries)?;

        let mut selected = guard(&self.selected)?;
        if selected.as_deref() == Some(id) {
            *selected = newest_first(self.parse_entries(entries))
                .first()
                .map(|entry| entry.id.clone());
        }
        info!(entry_id = %id, "deleted history entry");
        Ok(true)
    }

    /// Analyze the stored election again with the current survey and update the entry.
    pub async fn rerun(
        &self,
        id: &str,
        orchestrator: &Orchestrator,
        survey: &SurveyResponseSet,
    ) -> CoreResult<HistoryEntry> {
        let entry = self.get(id)?;
        let analysis = orchestrator.analyze(&entry.election_data, survey).await?;
        self.update(id, analysis)
    }
}
