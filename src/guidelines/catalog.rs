//! Static catalog of offerable services.

use serde::{Deserialize, Serialize};

/// One offerable service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Service {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub benefits: Vec<String>,
    /// Conditions that make this service a good fit
    #[serde(default)]
    pub triggers: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price_hint: Option<String>,
}

impl Service {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            benefits: Vec::new(),
            triggers: Vec::new(),
            price_hint: None,
        }
    }

    pub fn with_benefits(mut self, benefits: &[&str]) -> Self {
        self.benefits = benefits.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn with_triggers(mut self, triggers: &[&str]) -> Self {
        self.triggers = triggers.iter().map(|s| s.to_string()).collect();
        self
    }
}

/// Read-only list of services; lookups are case-insensitive.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct ServiceCatalog {
    services: Vec<Service>,
}

impl ServiceCatalog {
    pub fn new(services: Vec<Service>) -> Self {
        Self { services }
    }

    pub fn services(&self) -> &[Service] {
        &self.services
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }

    pub fn find(&self, name: &str) -> Option<&Service> {
        let needle = name.trim();
        self.services.iter().find(|s| s.name.eq_ignore_ascii_case(needle))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.find(name).is_some()
    }

    /// Services that exist and aren't the customer's current plan.
    pub fn offerable<'a>(&'a self, current_plan: Option<&'a str>) -> impl Iterator<Item = &'a Service> + 'a {
        self.services.iter().filter(move |s| match current_plan {
            Some(plan) => !s.name.eq_ignore_ascii_case(plan.trim()),
            None => true,
        })
    }

    /// Catalog block for prompts.
    pub fn prompt_text(&self) -> String {
        self.services
            .iter()
            .map(|s| {
                let mut text = format!("- {}: {}", s.name, s.description);
                if !s.benefits.is_empty() {
                    text.push_str(&format!("\n  Benefits: {}", s.benefits.join("; ")));
                }
                if !s.triggers.is_empty() {
                    text.push_str(&format!("\n  Good fit when: {}", s.triggers.join("; ")));
                }
                text
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Pest-control catalog shipped with the binary.
    pub fn builtin() -> Self {
        Self::new(vec![
            Service::new("Quarterly Pest Control", "Year-round perimeter treatment every three months")
                .with_benefits(&["Prevents common household pests", "Free re-treatment between visits"])
                .with_triggers(&["Recurring ant, spider, or roach sightings"]),
            Service::new("Mosquito Treatment", "Monthly yard treatment during mosquito season")
                .with_benefits(&["Reclaims outdoor living space", "Targets breeding sites"])
                .with_triggers(&["Mosquitoes reported in the yard", "Standing water or heavy vegetation"]),
            Service::new("Termite Protection", "Annual inspection with a liquid or bait barrier")
                .with_benefits(&["Protects the structure", "Damage repair warranty"])
                .with_triggers(&["Older homes", "Wood-to-soil contact", "Swarmers seen"]),
            Service::new("Rodent Exclusion", "Seal entry points and set monitoring stations")
                .with_benefits(&["Keeps rodents out for good", "Protects wiring and insulation"])
                .with_triggers(&["Droppings or gnaw marks", "Noises in walls or attic"]),
            Service::new("Attic Insulation", "Remove contaminated insulation and install pest-resistant material")
                .with_benefits(&["Lower energy bills", "Deters nesting"])
                .with_triggers(&["Rodent activity in the attic", "Homes over 20 years old"]),
        ])
    }
}
