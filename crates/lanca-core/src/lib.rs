//! # lanca-core
//!
//! Core types, traits, and abstractions for the lanca pipeline.
//!
//! This crate provides the foundational data structures and trait
//! definitions that other lanca crates depend on.

pub mod airesponse;
pub mod defaults;
pub mod error;
pub mod logging;
pub mod models;
pub mod traits;

// Re-export commonly used types at crate root
pub use airesponse::{extract_json_candidate, parse_embedded, RawAiResponse, RawEntry};
pub use error::{Error, Result};
pub use models::*;
pub use traits::*;
