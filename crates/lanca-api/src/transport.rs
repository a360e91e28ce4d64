//! Reply transport implementations for the channel adapter's send API.

use async_trait::async_trait;
use serde_json::json;
use tracing::{info, warn};

use lanca_core::{Error, ReplyTransport, Result};

/// Transport posting replies to the channel adapter's webhook send API.
pub struct HttpReplyTransport {
    client: reqwest::Client,
    base_url: String,
}

impl HttpReplyTransport {
    pub fn new(base_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url,
        }
    }

    /// Create from `CHANNEL_SEND_URL`; `None` when unset.
    pub fn from_env() -> Option<Self> {
        let base_url = std::env::var("CHANNEL_SEND_URL").ok()?;
        if base_url.is_empty() {
            return None;
        }
        Some(Self::new(base_url))
    }

    async fn post(&self, path: &str, body: serde_json::Value) -> Result<()> {
        let response = self
            .client
            .post(format!("{}{}", self.base_url, path))
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::Transport(format!("Send request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(Error::Transport(format!(
                "Channel adapter returned {}",
                response.status()
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl ReplyTransport for HttpReplyTransport {
    async fn send_text(&self, chat_id: &str, text: &str) -> Result<()> {
        self.post("/send/text", json!({ "chat_id": chat_id, "text": text }))
            .await
    }

    async fn send_media(
        &self,
        chat_id: &str,
        mimetype: &str,
        data: &str,
        filename: &str,
    ) -> Result<()> {
        self.post(
            "/send/media",
            json!({
                "chat_id": chat_id,
                "mimetype": mimetype,
                "data": data,
                "filename": filename,
            }),
        )
        .await
    }
}

/// Development transport: logs replies instead of delivering them.
pub struct LogReplyTransport;

#[async_trait]
impl ReplyTransport for LogReplyTransport {
    async fn send_text(&self, chat_id: &str, text: &str) -> Result<()> {
        info!(chat_id, text, "Reply (log-only transport)");
        Ok(())
    }

    async fn send_media(
        &self,
        chat_id: &str,
        mimetype: &str,
        _data: &str,
        filename: &str,
    ) -> Result<()> {
        warn!(chat_id, mimetype, filename, "Media reply dropped (log-only transport)");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_log_transport_always_succeeds() {
        let transport = LogReplyTransport;
        assert!(transport.send_text("chat-1", "oi").await.is_ok());
        assert!(transport
            .send_media("chat-1", "application/pdf", "aGk=", "r.pdf")
            .await
            .is_ok());
    }

    #[test]
    fn test_http_transport_construction() {
        let transport = HttpReplyTransport::new("http://localhost:8080".into());
        assert_eq!(transport.base_url, "http://localhost:8080");
    }
}
