//! Brand voice and style rules.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BrandRules {
    pub brand_voice: String,
    pub tone: String,
    pub key_messages: Vec<String>,
    pub formatting: Vec<String>,
    /// Phrases and topics the message must not contain
    pub avoid: Vec<String>,
    pub preferred_language: Vec<String>,
    pub min_words: usize,
    pub max_words: usize,
}

impl Default for BrandRules {
    fn default() -> Self {
        Self {
            brand_voice: "Professional, friendly, and reassuring".to_string(),
            tone: "Helpful expert, never pushy".to_string(),
            key_messages: vec![
                "Family and pet safety".to_string(),
                "Licensed, experienced technicians".to_string(),
                "Satisfaction guaranteed service".to_string(),
            ],
            formatting: vec![
                "Short paragraphs".to_string(),
                "One clear call to action".to_string(),
            ],
            avoid: vec![
                "act now".to_string(),
                "limited time".to_string(),
                "100% pest-free".to_string(),
                "guaranteed to eliminate".to_string(),
            ],
            preferred_language: vec![
                "Use 'you' and 'your home'".to_string(),
                "Say 'protect' rather than 'kill'".to_string(),
            ],
            min_words: 150,
            max_words: 200,
        }
    }
}

impl BrandRules {
    /// Avoided phrases present in `text`, compared case-insensitively.
    pub fn violations<'a>(&'a self, text: &str) -> Vec<&'a str> {
        let lower = text.to_lowercase();
        self.avoid
            .iter()
            .filter(|phrase| !phrase.trim().is_empty() && lower.contains(&phrase.to_lowercase()))
            .map(|s| s.as_str())
            .collect()
    }

    /// Brand block for prompts.
    pub fn prompt_text(&self) -> String {
        let bullets = |items: &[String]| {
            items
                .iter()
                .map(|i| format!("- {}", i))
                .collect::<Vec<_>>()
                .join("\n")
        };

        format!(
            "Brand Voice: {}\nTone: {}\nKey Messages: {}\nFormatting Guidelines: {}\nLength: {}-{} words\n\nDo Not Include:\n{}\n\nPreferred Language:\n{}",
            self.brand_voice,
            self.tone,
            self.key_messages.join(", "),
            self.formatting.join(", "),
            self.min_words,
            self.max_words,
            bullets(&self.avoid),
            bullets(&self.preferred_language),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_violations_case_insensitive() {
        let rules = BrandRules::default();
        let found = rules.violations("ACT NOW to get a 100% Pest-Free home!");
        assert_eq!(found, vec!["act now", "100% pest-free"]);
    }

    #[test]
    fn test_no_violations() {
        let rules = BrandRules::default();
        assert!(rules.violations("We'd love to help protect your home.").is_empty());
    }

    #[test]
    fn test_partial_yaml_like_json_uses_defaults() {
        let rules: BrandRules = serde_json::from_str(r#"{"brand_voice": "Warm"}"#).unwrap();
        assert_eq!(rules.brand_voice, "Warm");
        assert_eq!(rules.max_words, 200);
        assert!(!rules.avoid.is_empty());
    }

    #[test]
    fn test_prompt_text_sections() {
        let text = BrandRules::default().prompt_text();
        assert!(text.contains("Brand Voice: Professional"));
        assert!(text.contains("Do Not Include:\n- act now"));
        assert!(text.contains("150-200 words"));
    }
}
