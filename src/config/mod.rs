//! Configuration for the upsellr binary.

mod global;

pub use self::global::GlobalConfig;
