//! Domain types for Upsellr
//!
//! This module contains all core domain types:
//! - CustomerEvent: the immutable inbound event
//! - FeatureContext: optional precomputed customer features
//! - AgentConfig: versioned generator configuration
//! - Draft / Verdict: one attempt's candidate message and its evaluation
//! - AttemptRecord / DecisionRecord: the audit trail of a run
//! - RunOutcome / RunPhase: terminal states and state-machine phases

pub mod agent;
pub mod decision;
pub mod draft;
pub mod event;
pub mod features;
pub mod outcome;
pub mod verdict;

pub use agent::{AgentConfig, AgentStatus, ConfigSource, FALLBACK_VERSION, GenerationParams, ResolvedAgent};
pub use decision::{AttemptRecord, DecisionRecord, ErrorDetail};
pub use draft::Draft;
pub use event::{Address, Customer, CustomerEvent, PropertyInfo, ServiceEntry, UpcomingService};
pub use features::{FeatureContext, LifetimeValue, PropertyFeatures};
pub use outcome::{FinalStatus, RunOutcome, RunPhase};
pub use verdict::{MAX_SCORE, PriorFeedback, RejectionCategory, Verdict};
