//! Vision backend traits and implementations for image understanding.

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use tracing::debug;

use lanca_core::{defaults, Error, Result};

use crate::ollama::{ChatMessage, ChatRequest, ChatResponse};

/// Backend for describing/reading image content with a vision model.
#[async_trait]
pub trait VisionBackend: Send + Sync {
    /// Run `prompt` against the image and return the model's text reply.
    async fn describe_image(&self, data: &[u8], mime_type: &str, prompt: &str) -> Result<String>;

    /// Check if the vision backend is available.
    async fn health_check(&self) -> Result<bool>;

    /// Get the model name being used.
    fn model_name(&self) -> &str;
}

/// Ollama-hosted vision model (LLaVA, qwen3-vl, ...).
pub struct OllamaVisionBackend {
    client: reqwest::Client,
    base_url: String,
    model: String,
    timeout_secs: u64,
}

impl OllamaVisionBackend {
    pub fn new(base_url: String, model: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url,
            model,
            timeout_secs: defaults::GEN_TIMEOUT_SECS,
        }
    }

    /// Create from environment variables.
    ///
    /// Returns `None` when `OLLAMA_VISION_MODEL` is unset: image jobs are
    /// then answered with a "not supported" error instead of a broken call.
    pub fn from_env() -> Option<Self> {
        let model = std::env::var(defaults::ENV_OLLAMA_VISION_MODEL).ok()?;
        let model = if model.is_empty() {
            defaults::DEFAULT_OLLAMA_VISION_MODEL.to_string()
        } else {
            model
        };
        let base_url =
            std::env::var("OLLAMA_BASE").unwrap_or_else(|_| defaults::OLLAMA_URL.to_string());
        Some(Self::new(base_url, model))
    }
}

#[async_trait]
impl VisionBackend for OllamaVisionBackend {
    async fn describe_image(&self, data: &[u8], mime_type: &str, prompt: &str) -> Result<String> {
        if data.is_empty() {
            return Err(Error::InvalidInput("Empty image data".to_string()));
        }

        let encoded = base64::engine::general_purpose::STANDARD.encode(data);
        debug!(
            subsystem = "inference",
            model = %self.model,
            mime_type,
            image_bytes = data.len(),
            "Sending image to vision model"
        );

        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: prompt.to_string(),
                images: Some(vec![encoded]),
            }],
            stream: false,
        };

        let response = self
            .client
            .post(format!("{}/api/chat", self.base_url))
            .timeout(Duration::from_secs(self.timeout_secs))
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::Inference(format!("Vision request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Inference(format!(
                "Vision model returned {}: {}",
                status, body
            )));
        }

        let result: ChatResponse = response
            .json()
            .await
            .map_err(|e| Error::Inference(format!("Failed to parse vision response: {}", e)))?;

        Ok(result.message.content)
    }

    async fn health_check(&self) -> Result<bool> {
        match self
            .client
            .get(format!("{}/api/tags", self.base_url))
            .timeout(Duration::from_secs(5))
            .send()
            .await
        {
            Ok(resp) => Ok(resp.status().is_success()),
            Err(_) => Ok(false),
        }
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_construction() {
        let backend =
            OllamaVisionBackend::new("http://localhost:11434".to_string(), "llava".to_string());
        assert_eq!(backend.model_name(), "llava");
        assert_eq!(backend.timeout_secs, defaults::GEN_TIMEOUT_SECS);
    }

    #[tokio::test]
    async fn test_empty_image_rejected_before_request() {
        let backend =
            OllamaVisionBackend::new("http://localhost:11434".to_string(), "llava".to_string());
        let result = backend.describe_image(&[], "image/png", "describe").await;
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }
}
