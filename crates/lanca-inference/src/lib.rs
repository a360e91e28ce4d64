//! # lanca-inference
//!
//! Model backend abstraction for lanca.
//!
//! This crate provides the HTTP clients behind the pipeline's model calls:
//! - [`OllamaBackend`] — text generation and embeddings
//! - [`OllamaVisionBackend`] — image understanding
//! - [`WhisperBackend`] — audio transcription (OpenAI-compatible API)
//! - [`mock`] — scripted backends for tests

pub mod mock;
pub mod ollama;
pub mod transcription;
pub mod vision;

pub use ollama::OllamaBackend;
pub use transcription::{TranscriptionBackend, WhisperBackend};
pub use vision::{OllamaVisionBackend, VisionBackend};
