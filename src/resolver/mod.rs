//! Injected read-only collaborators resolved once per run.

pub mod agents;
pub mod features;

pub use agents::{AgentRegistry, AgentResolver};
pub use features::{FeatureResolver, FeatureStore, NoFeatures, classify_lifetime_value, enrich};
