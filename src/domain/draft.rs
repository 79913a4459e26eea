//! Generator output for a single attempt.

use serde::{Deserialize, Serialize};

/// One candidate message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Draft {
    /// 1-based attempt that produced this draft
    pub attempt: u32,
    pub subject: String,
    pub body: String,
    /// Model's self-reported confidence, 0.0-1.0
    pub confidence: f32,
    /// Catalog service the message recommends, when the model named one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recommended_service: Option<String>,
}

impl Draft {
    pub fn new(attempt: u32, subject: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            attempt,
            subject: subject.into(),
            body: body.into(),
            confidence: 0.0,
            recommended_service: None,
        }
    }

    pub fn with_confidence(mut self, confidence: f32) -> Self {
        self.confidence = if confidence.is_nan() { 0.0 } else { confidence.clamp(0.0, 1.0) };
        self
    }

    pub fn with_service(mut self, service: impl Into<String>) -> Self {
        self.recommended_service = Some(service.into());
        self
    }

    pub fn word_count(&self) -> usize {
        self.body.split_whitespace().count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_draft_builder() {
        let draft = Draft::new(2, "Hi John", "Mosquito season is coming.")
            .with_confidence(1.7)
            .with_service("Mosquito Treatment");
        assert_eq!(draft.attempt, 2);
        assert_eq!(draft.confidence, 1.0);
        assert_eq!(draft.recommended_service.as_deref(), Some("Mosquito Treatment"));
        assert_eq!(draft.word_count(), 4);
    }

    #[test]
    fn test_draft_serialization_skips_missing_service() {
        let json = serde_json::to_value(Draft::new(1, "s", "b")).unwrap();
        assert!(json.get("recommended_service").is_none());
    }
}
