//! JSONL-backed decision store with an in-memory cache.

use std::collections::HashSet;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use super::traits::{DecisionStore, Filter};
use crate::domain::DecisionRecord;
use crate::error::{Result, UpsellError};

/// Parsed contents of the store file.
#[derive(Debug, Default)]
struct Loaded {
    records: Vec<serde_json::Value>,
    ids: HashSet<String>,
}

impl Loaded {
    fn push(&mut self, record: serde_json::Value) {
        if let Some(id) = record.get("id").and_then(|v| v.as_str()) {
            self.ids.insert(id.to_string());
        }
        self.records.push(record);
    }
}

/// One JSON line per decision record, appended and never rewritten.
///
/// Lines that fail to parse are skipped with a warning so one torn write
/// never blocks later appends.
pub struct JsonlDecisionStore {
    path: PathBuf,
    cache: RwLock<Option<Loaded>>,
}

impl JsonlDecisionStore {
    /// Open (or prepare) the store file at `path`, creating parent dirs.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }
        Ok(Self {
            path,
            cache: RwLock::new(None),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_file(&self) -> Result<Loaded> {
        let mut loaded = Loaded::default();
        if !self.path.exists() {
            return Ok(loaded);
        }

        let reader = BufReader::new(File::open(&self.path)?);
        for (lineno, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<serde_json::Value>(&line) {
                Ok(record) => loaded.push(record),
                Err(e) => log::warn!("Skipping unreadable decision at {}:{}: {}", self.path.display(), lineno + 1, e),
            }
        }

        log::debug!("Loaded {} decision records from {}", loaded.records.len(), self.path.display());
        Ok(loaded)
    }

    /// Load the file into cache if not already loaded.
    fn ensure_loaded(&self) -> Result<()> {
        {
            let cache = self.cache.read().map_err(|e| UpsellError::Storage(e.to_string()))?;
            if cache.is_some() {
                return Ok(());
            }
        }

        let mut cache = self.cache.write().map_err(|e| UpsellError::Storage(e.to_string()))?;
        if cache.is_none() {
            *cache = Some(self.read_file()?);
        }
        Ok(())
    }

    fn append_to_file(&self, record: &serde_json::Value) -> Result<()> {
        let mut file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        writeln!(file, "{}", serde_json::to_string(record)?)?;
        Ok(())
    }

    /// Ids already present, for duplicate detection.
    pub fn ids(&self) -> Result<HashSet<String>> {
        self.ensure_loaded()?;
        let cache = self.cache.read().map_err(|e| UpsellError::Storage(e.to_string()))?;
        Ok(cache.as_ref().map(|loaded| loaded.ids.clone()).unwrap_or_default())
    }
}

impl DecisionStore for JsonlDecisionStore {
    /// Check and write happen under one write lock.
    ///
    /// If the existing file cannot be read at all, the record is still
    /// appended without the duplicate check.
    fn append(&self, record: &DecisionRecord) -> Result<()> {
        let mut cache = self.cache.write().map_err(|e| UpsellError::Storage(e.to_string()))?;
        if cache.is_none() {
            match self.read_file() {
                Ok(loaded) => *cache = Some(loaded),
                Err(e) => log::warn!(
                    "Cannot read {} ({}), appending {} without duplicate check",
                    self.path.display(),
                    e,
                    record.id
                ),
            }
        }

        if let Some(loaded) = cache.as_ref()
            && loaded.ids.contains(&record.id)
        {
            return Err(UpsellError::Storage(format!("Decision {} already recorded", record.id)));
        }

        let value = serde_json::to_value(record)?;

        // File first; it is the source of truth
        self.append_to_file(&value)?;

        if let Some(loaded) = cache.as_mut() {
            loaded.push(value);
        }
        Ok(())
    }

    fn get(&self, id: &str) -> Result<Option<DecisionRecord>> {
        self.ensure_loaded()?;
        let cache = self.cache.read().map_err(|e| UpsellError::Storage(e.to_string()))?;

        for record in cache.iter().flat_map(|loaded| loaded.records.iter()) {
            if record.get("id").and_then(|v| v.as_str()) == Some(id) {
                return Ok(Some(serde_json::from_value(record.clone())?));
            }
        }
        Ok(None)
    }

    fn query(&self, filters: &[Filter]) -> Result<Vec<DecisionRecord>> {
        self.ensure_loaded()?;
        let cache = self.cache.read().map_err(|e| UpsellError::Storage(e.to_string()))?;

        let mut results = Vec::new();
        for record in cache.iter().flat_map(|loaded| loaded.records.iter()) {
            if filters.iter().all(|f| f.matches(record)) {
                results.push(serde_json::from_value(record.clone())?);
            }
        }
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{AttemptRecord, Draft, RejectionCategory, RunOutcome, Verdict};
    use chrono::Utc;
    use tempfile::TempDir;

    fn record(id: &str, outcome: RunOutcome) -> DecisionRecord {
        let attempts = vec![AttemptRecord {
            attempt: 1,
            draft: Draft::new(1, "s", "b"),
            verdict: match outcome {
                RunOutcome::Approved => Verdict::approve(8, "ok"),
                _ => Verdict::reject(RejectionCategory::Brand, 4, "x"),
            },
        }];
        DecisionRecord {
            id: id.to_string(),
            created_at: Utc::now(),
            event_id: None,
            customer_key: "john@example.com".to_string(),
            outcome,
            final_status: outcome.final_status(),
            draft: Some(Draft::new(1, "s", "b")),
            attempt_count: 1,
            attempts,
            agent_id: Some("upsell-generator".to_string()),
            agent_version: Some("1.0.0".to_string()),
            config_source: None,
            feature_context_available: false,
            reason: None,
            rejection_category: None,
            error: None,
            transitions: vec![],
        }
    }

    fn create_test_store() -> (JsonlDecisionStore, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let store = JsonlDecisionStore::open(temp_dir.path().join("decisions.jsonl")).unwrap();
        (store, temp_dir)
    }

    #[test]
    fn test_append_and_get() {
        let (store, _temp) = create_test_store();
        let rec = record("dec-1", RunOutcome::Approved);
        store.append(&rec).unwrap();
        assert_eq!(store.get("dec-1").unwrap(), Some(rec));
        assert_eq!(store.get("nope").unwrap(), None);
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let (store, _temp) = create_test_store();
        store.append(&record("dec-1", RunOutcome::Approved)).unwrap();
        assert!(store.append(&record("dec-1", RunOutcome::Exhausted)).is_err());
        assert_eq!(store.list().unwrap().len(), 1);
    }

    #[test]
    fn test_query_by_outcome() {
        let (store, _temp) = create_test_store();
        store.append(&record("dec-1", RunOutcome::Approved)).unwrap();
        store.append(&record("dec-2", RunOutcome::Exhausted)).unwrap();
        store.append(&record("dec-3", RunOutcome::Approved)).unwrap();

        let approved = store.query(&[Filter::eq("outcome", "approved")]).unwrap();
        assert_eq!(approved.len(), 2);

        let rejected = store.query(&[Filter::eq("final_status", "rejected")]).unwrap();
        assert_eq!(rejected.len(), 1);
        assert_eq!(rejected[0].id, "dec-2");
    }

    #[test]
    fn test_persistence_across_instances() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("decisions.jsonl");

        {
            let store = JsonlDecisionStore::open(&path).unwrap();
            store.append(&record("dec-1", RunOutcome::Approved)).unwrap();
        }

        let store = JsonlDecisionStore::open(&path).unwrap();
        let all = store.list().unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].attempts.len(), 1);
    }

    #[test]
    fn test_missing_file_is_empty() {
        let (store, _temp) = create_test_store();
        assert!(store.list().unwrap().is_empty());
    }

    #[test]
    fn test_torn_line_does_not_block_append() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("decisions.jsonl");
        fs::write(&path, "{\"id\": \"dec-old\", truncated\n").unwrap();
        let store = JsonlDecisionStore::open(&path).unwrap();

        let rec = record("dec-new", RunOutcome::Approved);
        store.append(&rec).unwrap();

        assert_eq!(store.list().unwrap(), vec![rec.clone()]);
        let reopened = JsonlDecisionStore::open(&path).unwrap();
        assert_eq!(reopened.get("dec-new").unwrap(), Some(rec));
        assert_eq!(fs::read_to_string(&path).unwrap().lines().count(), 2);
    }

    #[test]
    fn test_duplicate_detected_on_fresh_instance() {
        let (store, temp) = create_test_store();
        store.append(&record("dec-1", RunOutcome::Approved)).unwrap();

        let again = JsonlDecisionStore::open(temp.path().join("decisions.jsonl")).unwrap();
        assert!(again.append(&record("dec-1", RunOutcome::Approved)).is_err());
        assert!(again.ids().unwrap().contains("dec-1"));
    }

    #[test]
    fn test_concurrent_same_id_appends_once() {
        let (store, temp) = create_test_store();
        let store = std::sync::Arc::new(store);
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = store.clone();
                std::thread::spawn(move || store.append(&record("dec-same", RunOutcome::Approved)).is_ok())
            })
            .collect();
        let written = handles.into_iter().map(|h| h.join().unwrap()).filter(|ok| *ok).count();
        assert_eq!(written, 1);
        assert_eq!(store.list().unwrap().len(), 1);
        let text = fs::read_to_string(temp.path().join("decisions.jsonl")).unwrap();
        assert_eq!(text.lines().count(), 1);
    }
}
