//! Feature context lookup and enrichment.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{CustomerEvent, FeatureContext, LifetimeValue, PropertyFeatures};
use crate::domain::features::clamp_satisfaction;
use crate::error::{Result, UpsellError};

/// Neutral average used when no history entry carries a score.
const DEFAULT_SATISFACTION: f64 = 3.5;

/// Best-effort lookup of precomputed features.
///
/// "Not found" is `Ok(None)`. `Err` is reserved for infrastructure failure,
/// which callers treat the same as absent.
#[async_trait]
pub trait FeatureResolver: Send + Sync {
    async fn lookup(&self, customer_key: &str) -> Result<Option<FeatureContext>>;
}

/// Resolver that never has data.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoFeatures;

#[async_trait]
impl FeatureResolver for NoFeatures {
    async fn lookup(&self, _customer_key: &str) -> Result<Option<FeatureContext>> {
        Ok(None)
    }
}

/// Feature store keyed by customer key, optionally backed by a JSON file.
///
/// The file is read on first access, so an unreadable file surfaces as a
/// lookup error rather than a construction error.
#[derive(Debug)]
pub struct FeatureStore {
    path: Option<PathBuf>,
    entries: RwLock<Option<HashMap<String, FeatureContext>>>,
}

impl Default for FeatureStore {
    fn default() -> Self {
        Self::in_memory()
    }
}

fn poisoned(e: impl std::fmt::Display) -> UpsellError {
    UpsellError::Storage(format!("feature store lock poisoned: {}", e))
}

impl FeatureStore {
    pub fn in_memory() -> Self {
        Self {
            path: None,
            entries: RwLock::new(Some(HashMap::new())),
        }
    }

    /// File-backed store at `path`. A missing file is an empty store.
    pub fn open(path: impl AsRef<Path>) -> Self {
        Self {
            path: Some(path.as_ref().to_path_buf()),
            entries: RwLock::new(None),
        }
    }

    fn read_file(path: &Path) -> Result<HashMap<String, FeatureContext>> {
        if !path.exists() {
            return Ok(HashMap::new());
        }
        let content = std::fs::read_to_string(path)
            .map_err(|e| UpsellError::Storage(format!("cannot read feature store {}: {}", path.display(), e)))?;
        if content.trim().is_empty() {
            return Ok(HashMap::new());
        }
        serde_json::from_str(&content)
            .map_err(|e| UpsellError::Storage(format!("corrupt feature store {}: {}", path.display(), e)))
    }

    /// Load the backing file if not already loaded. A failed load is retried
    /// on the next access.
    fn ensure_loaded(&self) -> Result<()> {
        if self.entries.read().map_err(poisoned)?.is_some() {
            return Ok(());
        }
        let mut entries = self.entries.write().map_err(poisoned)?;
        if entries.is_none()
            && let Some(path) = &self.path
        {
            let loaded = Self::read_file(path)?;
            log::debug!("Loaded feature store {} with {} customers", path.display(), loaded.len());
            *entries = Some(loaded);
        }
        Ok(())
    }

    pub fn get(&self, customer_key: &str) -> Result<Option<FeatureContext>> {
        self.ensure_loaded()?;
        let entries = self.entries.read().map_err(poisoned)?;
        Ok(entries.as_ref().and_then(|e| e.get(customer_key)).cloned())
    }

    pub fn insert(&self, customer_key: impl Into<String>, context: FeatureContext) -> Result<()> {
        self.ensure_loaded()?;
        let mut entries = self.entries.write().map_err(poisoned)?;
        entries
            .get_or_insert_with(HashMap::new)
            .insert(customer_key.into(), context);
        Ok(())
    }

    /// Customers currently loaded. Zero if the file has not been read.
    pub fn len(&self) -> usize {
        self.entries
            .read()
            .map(|e| e.as_ref().map(HashMap::len).unwrap_or(0))
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Fold an event into the stored features for its customer and persist.
    pub fn enrich_event(&self, event: &CustomerEvent) -> Result<FeatureContext> {
        let key = event
            .customer_key()
            .ok_or_else(|| UpsellError::InvalidEvent("customer must have an email or id".to_string()))?;
        let existing = self.get(key)?;
        let updated = enrich(event, existing.as_ref(), Utc::now());
        self.insert(key, updated.clone())?;
        self.save()?;
        log::info!(
            "Enriched features for {}: avg={:.2} count={} ltv={}",
            key,
            updated.satisfaction_avg,
            updated.service_count,
            updated.lifetime_value
        );
        Ok(updated)
    }

    /// Write to the backing file. No-op for in-memory stores.
    pub fn save(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let entries = self.entries.read().map_err(poisoned)?;
        let Some(entries) = entries.as_ref() else {
            return Ok(());
        };
        let json = serde_json::to_string_pretty(entries)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

#[async_trait]
impl FeatureResolver for FeatureStore {
    async fn lookup(&self, customer_key: &str) -> Result<Option<FeatureContext>> {
        self.get(customer_key)
    }
}

/// Compute updated features from an event and any previously stored features.
///
/// With prior features the most recent score is folded into the running
/// average and the count advances by one. Without them the whole history
/// seeds the average and count.
pub fn enrich(event: &CustomerEvent, existing: Option<&FeatureContext>, now: DateTime<Utc>) -> FeatureContext {
    let (satisfaction_avg, service_count) = match existing {
        Some(prev) => {
            let count = prev.service_count + 1;
            let avg = match event.most_recent_service().and_then(|s| s.satisfaction_score) {
                Some(score) => {
                    (prev.satisfaction_avg * prev.service_count as f64 + score as f64) / count as f64
                }
                None => prev.satisfaction_avg,
            };
            (avg, count)
        }
        None => {
            let scores: Vec<f64> = event
                .service_history
                .iter()
                .filter_map(|s| s.satisfaction_score)
                .map(f64::from)
                .collect();
            let avg = if scores.is_empty() {
                DEFAULT_SATISFACTION
            } else {
                scores.iter().sum::<f64>() / scores.len() as f64
            };
            (avg, event.service_history.len() as u32)
        }
    };

    let satisfaction_avg = clamp_satisfaction(satisfaction_avg);
    let lifetime_value = event
        .lifetime_value
        .unwrap_or_else(|| classify_lifetime_value(service_count, satisfaction_avg));

    FeatureContext {
        satisfaction_avg,
        service_count,
        lifetime_value,
        property: property_features(event),
        last_updated: Some(now),
    }
}

/// Tier from service volume and satisfaction.
pub fn classify_lifetime_value(service_count: u32, satisfaction_avg: f64) -> LifetimeValue {
    if service_count >= 6 && satisfaction_avg >= 4.0 {
        LifetimeValue::High
    } else if service_count >= 3 || satisfaction_avg >= 3.5 {
        LifetimeValue::Medium
    } else {
        LifetimeValue::Low
    }
}

fn property_features(event: &CustomerEvent) -> PropertyFeatures {
    let address = event.customer.address.as_ref();
    let property = event.property.as_ref();
    let non_empty = |s: &String| if s.trim().is_empty() { None } else { Some(s.clone()) };

    PropertyFeatures {
        city: address.and_then(|a| non_empty(&a.city)),
        state: address.and_then(|a| non_empty(&a.state)),
        zip: address.and_then(|a| non_empty(&a.zip)),
        property_type: property.and_then(|p| p.property_type.clone()),
        square_feet: property.and_then(|p| p.square_feet),
        year_built: property.and_then(|p| p.year_built),
        pest_issues: property.map(|p| p.pest_issues.clone()).unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Address, Customer, PropertyInfo, ServiceEntry};
    use chrono::NaiveDate;
    use tempfile::TempDir;

    fn entry(date: &str, score: Option<u8>) -> ServiceEntry {
        ServiceEntry {
            service_type: "Quarterly Pest Control".to_string(),
            date: NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
            technician: None,
            satisfaction_score: score,
            notes: None,
        }
    }

    fn event(history: Vec<ServiceEntry>) -> CustomerEvent {
        CustomerEvent {
            customer: Customer {
                first_name: "John".to_string(),
                email: Some("john@example.com".to_string()),
                address: Some(Address {
                    city: "Austin".to_string(),
                    state: "TX".to_string(),
                    ..Default::default()
                }),
                ..Default::default()
            },
            service_history: history,
            property: Some(PropertyInfo {
                property_type: Some("single_family".to_string()),
                square_feet: Some(2400),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    #[test]
    fn test_enrich_without_existing_uses_history() {
        let e = event(vec![entry("2024-01-01", Some(5)), entry("2024-04-01", Some(4))]);
        let ctx = enrich(&e, None, Utc::now());
        assert_eq!(ctx.service_count, 2);
        assert_eq!(ctx.satisfaction_avg, 4.5);
        assert_eq!(ctx.lifetime_value, LifetimeValue::Medium);
        assert_eq!(ctx.property.city.as_deref(), Some("Austin"));
        assert_eq!(ctx.property.square_feet, Some(2400));
    }

    #[test]
    fn test_enrich_running_average() {
        let prev = FeatureContext::new(4.0, 3, LifetimeValue::Medium);
        let e = event(vec![entry("2024-01-01", Some(1)), entry("2024-06-01", Some(5))]);
        let ctx = enrich(&e, Some(&prev), Utc::now());
        // (4.0*3 + 5) / 4 = 4.25, most recent entry wins regardless of order
        assert_eq!(ctx.service_count, 4);
        assert_eq!(ctx.satisfaction_avg, 4.25);
    }

    #[test]
    fn test_enrich_without_scores_uses_neutral_default() {
        let e = event(vec![entry("2024-01-01", None)]);
        let ctx = enrich(&e, None, Utc::now());
        assert_eq!(ctx.satisfaction_avg, DEFAULT_SATISFACTION);
    }

    #[test]
    fn test_explicit_lifetime_value_wins() {
        let mut e = event(vec![entry("2024-01-01", Some(2))]);
        e.lifetime_value = Some(LifetimeValue::High);
        let ctx = enrich(&e, None, Utc::now());
        assert_eq!(ctx.lifetime_value, LifetimeValue::High);
    }

    #[test]
    fn test_classify_lifetime_value() {
        assert_eq!(classify_lifetime_value(6, 4.0), LifetimeValue::High);
        assert_eq!(classify_lifetime_value(6, 3.9), LifetimeValue::Medium);
        assert_eq!(classify_lifetime_value(1, 3.5), LifetimeValue::Medium);
        assert_eq!(classify_lifetime_value(2, 3.0), LifetimeValue::Low);
    }

    #[tokio::test]
    async fn test_lookup_not_found_is_none() {
        let store = FeatureStore::in_memory();
        assert!(store.lookup("nobody@example.com").await.unwrap().is_none());
        assert!(NoFeatures.lookup("x").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_enrich_event_persists() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("features.json");

        let store = FeatureStore::open(&path);
        assert!(store.is_empty());
        store
            .enrich_event(&event(vec![entry("2024-01-01", Some(5))]))
            .unwrap();

        let reopened = FeatureStore::open(&path);
        let ctx = reopened.lookup("john@example.com").await.unwrap().unwrap();
        assert_eq!(ctx.service_count, 1);
        assert_eq!(ctx.satisfaction_avg, 5.0);
    }

    #[test]
    fn test_enrich_event_requires_key() {
        let store = FeatureStore::in_memory();
        let mut e = event(vec![entry("2024-01-01", Some(5))]);
        e.customer.email = None;
        assert!(matches!(store.enrich_event(&e), Err(UpsellError::InvalidEvent(_))));
    }

    #[tokio::test]
    async fn test_corrupt_file_fails_lookup_not_open() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("features.json");
        std::fs::write(&path, "{not json").unwrap();

        let store = FeatureStore::open(&path);
        let err = store.lookup("john@example.com").await.unwrap_err();
        assert!(matches!(err, UpsellError::Storage(_)));
        assert!(err.to_string().contains("features.json"));

        std::fs::write(&path, "{}").unwrap();
        assert!(store.lookup("john@example.com").await.unwrap().is_none());
    }
}
