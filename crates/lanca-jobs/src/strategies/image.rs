//! Image strategy: receipt/document photos through a vision model.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use lanca_core::{ExtractionStrategy, InboundItem, MediaKind, Result, StrategyResult};
use lanca_inference::VisionBackend;

use crate::prompts::image_prompt;
use crate::strategies::interpret_model_reply;

/// Strategy for photos of receipts, invoices, and payment confirmations.
pub struct ImageStrategy {
    vision: Arc<dyn VisionBackend>,
}

impl ImageStrategy {
    pub fn new(vision: Arc<dyn VisionBackend>) -> Self {
        Self { vision }
    }
}

#[async_trait]
impl ExtractionStrategy for ImageStrategy {
    fn kind(&self) -> MediaKind {
        MediaKind::Image
    }

    async fn extract(&self, item: &InboundItem) -> Result<StrategyResult> {
        if item.data.is_empty() {
            return Ok(StrategyResult::SystemError(
                "Não consegui ler a imagem enviada.".into(),
            ));
        }

        let prompt = image_prompt(item.caption.as_deref());
        let reply = self
            .vision
            .describe_image(&item.data, &item.mime_type, &prompt)
            .await?;

        debug!(
            strategy = "image",
            response_len = reply.len(),
            "Vision model replied"
        );
        Ok(interpret_model_reply(reply))
    }

    async fn health_check(&self) -> Result<bool> {
        self.vision.health_check().await
    }

    fn name(&self) -> &str {
        "image"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lanca_inference::mock::MockVisionBackend;

    #[tokio::test]
    async fn test_receipt_json_becomes_extraction() {
        let vision = Arc::new(MockVisionBackend::new(
            r#"{"transacoes":[{"descricao":"Mercado","valor":45.9}],"confidence_score":0.85}"#,
        ));
        let strategy = ImageStrategy::new(vision);

        let item = InboundItem::new(b"jpegdata".to_vec(), "image/jpeg", "receipt.jpg");
        match strategy.extract(&item).await.unwrap() {
            StrategyResult::DataExtraction(resp) => {
                assert_eq!(resp.transactions.unwrap().len(), 1);
            }
            other => panic!("expected DataExtraction, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_non_financial_photo_becomes_text() {
        let vision = Arc::new(MockVisionBackend::new("Uma foto de um cachorro na praia."));
        let strategy = ImageStrategy::new(vision);

        let item = InboundItem::new(b"jpegdata".to_vec(), "image/jpeg", "dog.jpg");
        assert!(matches!(
            strategy.extract(&item).await.unwrap(),
            StrategyResult::TextCommand(_)
        ));
    }

    #[tokio::test]
    async fn test_empty_image_is_system_error() {
        let vision = Arc::new(MockVisionBackend::new("unused"));
        let strategy = ImageStrategy::new(vision);

        let item = InboundItem::new(Vec::new(), "image/jpeg", "empty.jpg");
        assert!(matches!(
            strategy.extract(&item).await.unwrap(),
            StrategyResult::SystemError(_)
        ));
    }

    #[tokio::test]
    async fn test_vision_outage_propagates() {
        let vision = Arc::new(MockVisionBackend::failing("connection refused"));
        let strategy = ImageStrategy::new(vision);

        let item = InboundItem::new(b"jpegdata".to_vec(), "image/jpeg", "receipt.jpg");
        assert!(strategy.extract(&item).await.is_err());
    }
}
