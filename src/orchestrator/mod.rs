//! Generation, evaluation, and retry orchestration.

mod policy;
mod runner;
pub mod scripted;
mod state;

pub use policy::{Decision, RetryPolicy};
pub use runner::{DEFAULT_AGENT_ID, Orchestrator};
pub use state::RunMeta;
