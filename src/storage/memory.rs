//! In-memory decision store, for tests and dry runs.

use std::sync::RwLock;

use super::traits::{DecisionStore, Filter};
use crate::domain::DecisionRecord;
use crate::error::{Result, UpsellError};

#[derive(Debug, Default)]
pub struct MemoryDecisionStore {
    records: RwLock<Vec<DecisionRecord>>,
}

impl MemoryDecisionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.read().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl DecisionStore for MemoryDecisionStore {
    fn append(&self, record: &DecisionRecord) -> Result<()> {
        let mut records = self.records.write().map_err(|e| UpsellError::Storage(e.to_string()))?;
        if records.iter().any(|r| r.id == record.id) {
            return Err(UpsellError::Storage(format!("Decision {} already recorded", record.id)));
        }
        records.push(record.clone());
        Ok(())
    }

    fn get(&self, id: &str) -> Result<Option<DecisionRecord>> {
        let records = self.records.read().map_err(|e| UpsellError::Storage(e.to_string()))?;
        Ok(records.iter().find(|r| r.id == id).cloned())
    }

    fn query(&self, filters: &[Filter]) -> Result<Vec<DecisionRecord>> {
        let records = self.records.read().map_err(|e| UpsellError::Storage(e.to_string()))?;
        let mut results = Vec::new();
        for record in records.iter() {
            let value = serde_json::to_value(record)?;
            if filters.iter().all(|f| f.matches(&value)) {
                results.push(record.clone());
            }
        }
        Ok(results)
    }
}
