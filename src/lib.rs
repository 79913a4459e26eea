//! Upsellr - personalized upsell generation with an LLM judge and bounded retries
//!
//! One customer event runs through a generate, judge, decide loop. Rejections
//! that regeneration can fix are retried with the judge's feedback; everything
//! else terminates, and each run leaves exactly one auditable decision record.

pub mod domain;
pub mod error;
pub mod generator;
pub mod guidelines;
pub mod id;
pub mod judge;
pub mod llm;
pub mod orchestrator;
pub mod prompt;
pub mod resolver;
pub mod storage;

pub use error::{Result, UpsellError};
