//! Persistence for decision records.
//!
//! Every run emits exactly one record, and the full attempt sequence is kept
//! so retry effectiveness can be analysed later.

mod jsonl;
mod memory;
mod stats;
mod traits;

pub use jsonl::JsonlDecisionStore;
pub use memory::MemoryDecisionStore;
pub use stats::DecisionStats;
pub use traits::{DecisionStore, Filter, FilterOp};
