//! Mock inference backends for deterministic testing.
//!
//! Strategy and pipeline tests script these instead of talking to live
//! model servers: responses are fixed or keyed on prompt substrings, calls
//! are logged, and failures can be forced.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use lanca_core::{EmbeddingBackend, Error, GenerationBackend, Result};

use crate::transcription::TranscriptionBackend;
use crate::vision::VisionBackend;

/// Scripted generation backend.
#[derive(Clone)]
pub struct MockGenerationBackend {
    default_response: String,
    /// (prompt substring, response) pairs checked in order.
    mappings: Vec<(String, String)>,
    fail_with: Option<String>,
    calls: Arc<Mutex<Vec<String>>>,
}

impl MockGenerationBackend {
    pub fn new() -> Self {
        Self {
            default_response: "{}".to_string(),
            mappings: Vec::new(),
            fail_with: None,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Set the response returned when no mapping matches.
    pub fn with_response(mut self, response: impl Into<String>) -> Self {
        self.default_response = response.into();
        self
    }

    /// Respond with `output` whenever the prompt contains `needle`.
    pub fn with_mapping(mut self, needle: impl Into<String>, output: impl Into<String>) -> Self {
        self.mappings.push((needle.into(), output.into()));
        self
    }

    /// Make every call fail with an inference error.
    pub fn failing(mut self, message: impl Into<String>) -> Self {
        self.fail_with = Some(message.into());
        self
    }

    /// Prompts seen so far, in call order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

impl Default for MockGenerationBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl GenerationBackend for MockGenerationBackend {
    async fn generate(&self, prompt: &str) -> Result<String> {
        self.calls.lock().unwrap().push(prompt.to_string());
        if let Some(msg) = &self.fail_with {
            return Err(Error::Inference(msg.clone()));
        }
        for (needle, output) in &self.mappings {
            if prompt.contains(needle.as_str()) {
                return Ok(output.clone());
            }
        }
        Ok(self.default_response.clone())
    }

    async fn generate_with_system(&self, _system: &str, prompt: &str) -> Result<String> {
        self.generate(prompt).await
    }

    fn model_name(&self) -> &str {
        "mock-gen"
    }
}

/// Deterministic embedding backend: each vector is derived from the text's
/// bytes, so equal texts embed equally.
pub struct MockEmbeddingBackend {
    dimension: usize,
    fail: bool,
}

impl MockEmbeddingBackend {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            fail: false,
        }
    }

    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }
}

#[async_trait]
impl EmbeddingBackend for MockEmbeddingBackend {
    async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if self.fail {
            return Err(Error::Embedding("mock embedding failure".into()));
        }
        Ok(texts
            .iter()
            .map(|t| {
                let seed = t.bytes().fold(0u32, |acc, b| acc.wrapping_add(b as u32));
                (0..self.dimension)
                    .map(|i| ((seed.wrapping_add(i as u32)) % 997) as f32 / 997.0)
                    .collect()
            })
            .collect())
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        "mock-embed"
    }
}

/// Scripted vision backend.
pub struct MockVisionBackend {
    response: String,
    fail_with: Option<String>,
}

impl MockVisionBackend {
    pub fn new(response: impl Into<String>) -> Self {
        Self {
            response: response.into(),
            fail_with: None,
        }
    }

    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            response: String::new(),
            fail_with: Some(message.into()),
        }
    }
}

#[async_trait]
impl VisionBackend for MockVisionBackend {
    async fn describe_image(&self, _data: &[u8], _mime_type: &str, _prompt: &str) -> Result<String> {
        match &self.fail_with {
            Some(msg) => Err(Error::Inference(msg.clone())),
            None => Ok(self.response.clone()),
        }
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(self.fail_with.is_none())
    }

    fn model_name(&self) -> &str {
        "mock-vision"
    }
}

/// Scripted transcription backend.
pub struct MockTranscriptionBackend {
    transcript: String,
    fail_with: Option<String>,
}

impl MockTranscriptionBackend {
    pub fn new(transcript: impl Into<String>) -> Self {
        Self {
            transcript: transcript.into(),
            fail_with: None,
        }
    }

    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            transcript: String::new(),
            fail_with: Some(message.into()),
        }
    }
}

#[async_trait]
impl TranscriptionBackend for MockTranscriptionBackend {
    async fn transcribe(
        &self,
        _audio_data: &[u8],
        _mime_type: &str,
        _language: Option<&str>,
    ) -> Result<String> {
        match &self.fail_with {
            Some(msg) => Err(Error::Transcription(msg.clone())),
            None => Ok(self.transcript.clone()),
        }
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(self.fail_with.is_none())
    }

    fn model_name(&self) -> &str {
        "mock-whisper"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_generation_default_and_mapping() {
        let backend = MockGenerationBackend::new()
            .with_response("fallback")
            .with_mapping("mercado", "{\"valor\": 40.0}");

        assert_eq!(backend.generate("oi").await.unwrap(), "fallback");
        assert_eq!(
            backend.generate("gastei no mercado").await.unwrap(),
            "{\"valor\": 40.0}"
        );
        assert_eq!(backend.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_mock_generation_failure() {
        let backend = MockGenerationBackend::new().failing("down");
        assert!(backend.generate("x").await.is_err());
    }

    #[tokio::test]
    async fn test_mock_embeddings_are_deterministic() {
        let backend = MockEmbeddingBackend::new(8);
        let a = backend.embed_texts(&["abc".into()]).await.unwrap();
        let b = backend.embed_texts(&["abc".into()]).await.unwrap();
        assert_eq!(a, b);
        assert_eq!(a[0].len(), 8);
    }

    #[tokio::test]
    async fn test_mock_vision_and_transcription() {
        let vision = MockVisionBackend::new("a receipt");
        assert_eq!(
            vision.describe_image(b"img", "image/png", "p").await.unwrap(),
            "a receipt"
        );

        let whisper = MockTranscriptionBackend::new("paguei dez reais");
        assert_eq!(
            whisper.transcribe(b"ogg", "audio/ogg", None).await.unwrap(),
            "paguei dez reais"
        );

        assert!(MockVisionBackend::failing("x")
            .describe_image(b"img", "image/png", "p")
            .await
            .is_err());
    }
}
