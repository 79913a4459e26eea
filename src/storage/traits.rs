//! Decision store trait and record filters.

use serde::Serialize;

use crate::domain::DecisionRecord;
use crate::error::Result;

/// Filter operations for querying records.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterOp {
    /// Field equals value
    Eq,
    /// Field does not equal value
    Ne,
    /// Field contains value (string/array)
    Contains,
}

/// A filter over the JSON form of a decision record.
#[derive(Debug, Clone)]
pub struct Filter {
    pub field: String,
    pub op: FilterOp,
    pub value: serde_json::Value,
}

impl Filter {
    fn new(field: impl Into<String>, op: FilterOp, value: impl Serialize) -> Self {
        Self {
            field: field.into(),
            op,
            value: serde_json::to_value(value).unwrap_or(serde_json::Value::Null),
        }
    }

    pub fn eq(field: impl Into<String>, value: impl Serialize) -> Self {
        Self::new(field, FilterOp::Eq, value)
    }

    pub fn ne(field: impl Into<String>, value: impl Serialize) -> Self {
        Self::new(field, FilterOp::Ne, value)
    }

    pub fn contains(field: impl Into<String>, value: impl Serialize) -> Self {
        Self::new(field, FilterOp::Contains, value)
    }

    /// Check if a record matches this filter.
    pub fn matches(&self, record: &serde_json::Value) -> bool {
        let field_value = record.get(&self.field);

        match &self.op {
            FilterOp::Eq => match field_value {
                Some(v) => *v == self.value,
                None => self.value.is_null(),
            },
            FilterOp::Ne => match field_value {
                Some(v) => *v != self.value,
                None => !self.value.is_null(),
            },
            FilterOp::Contains => match (field_value, &self.value) {
                (Some(serde_json::Value::String(s)), serde_json::Value::String(needle)) => s.contains(needle.as_str()),
                (Some(serde_json::Value::Array(arr)), value) => arr.contains(value),
                _ => false,
            },
        }
    }
}

/// Append-only sink for decision records.
///
/// Records are immutable once appended: there is no update or delete.
pub trait DecisionStore: Send + Sync {
    /// Append one record. Fails if a record with the same id exists.
    fn append(&self, record: &DecisionRecord) -> Result<()>;

    fn get(&self, id: &str) -> Result<Option<DecisionRecord>>;

    /// Records matching every filter, in append order.
    fn query(&self, filters: &[Filter]) -> Result<Vec<DecisionRecord>>;

    fn list(&self) -> Result<Vec<DecisionRecord>> {
        self.query(&[])
    }
}
