//! CSV strategy: bank/card exports through the extraction model.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use lanca_core::{
    ExtractionStrategy, GenerationBackend, InboundItem, MediaKind, Result, StrategyResult,
};

use crate::prompts::{extraction_prompt, EXTRACTION_SYSTEM};
use crate::strategies::interpret_model_reply;

/// Largest CSV (in bytes) sent to the model in one call. Bigger exports
/// are truncated from the top, which keeps headers and the newest rows of
/// a chronological export.
const MAX_CSV_BYTES: usize = 64 * 1024;

/// Strategy for CSV exports. Column layouts vary wildly between banks, so
/// interpretation is delegated to the model rather than a hardcoded
/// header mapping.
pub struct CsvStrategy {
    gen: Arc<dyn GenerationBackend>,
}

impl CsvStrategy {
    pub fn new(gen: Arc<dyn GenerationBackend>) -> Self {
        Self { gen }
    }
}

#[async_trait]
impl ExtractionStrategy for CsvStrategy {
    fn kind(&self) -> MediaKind {
        MediaKind::Csv
    }

    async fn extract(&self, item: &InboundItem) -> Result<StrategyResult> {
        let text = String::from_utf8_lossy(&item.data).into_owned();
        if text.trim().is_empty() {
            return Ok(StrategyResult::SystemError(
                "O arquivo CSV enviado está vazio.".into(),
            ));
        }

        let row_count = text.lines().count();
        let truncated = if text.len() > MAX_CSV_BYTES {
            let mut cut = MAX_CSV_BYTES;
            while !text.is_char_boundary(cut) {
                cut -= 1;
            }
            &text[..cut]
        } else {
            text.as_str()
        };

        debug!(
            strategy = "csv",
            row_count,
            truncated = text.len() > MAX_CSV_BYTES,
            "Sending CSV content to model"
        );

        let prompt = extraction_prompt(truncated, item.caption.as_deref());
        let reply = self
            .gen
            .generate_with_system(EXTRACTION_SYSTEM, &prompt)
            .await?;

        Ok(interpret_model_reply(reply))
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }

    fn name(&self) -> &str {
        "csv"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lanca_inference::mock::MockGenerationBackend;

    #[tokio::test]
    async fn test_csv_rows_become_extraction() {
        let gen = Arc::new(MockGenerationBackend::new().with_mapping(
            "data,descricao,valor",
            r#"{"transacoes":[{"descricao":"Padaria","valor":12.5,"data":"2026-08-01"}],"confidence_score":0.95}"#,
        ));
        let strategy = CsvStrategy::new(gen);

        let item = InboundItem::new(
            b"data,descricao,valor\n2026-08-01,Padaria,12.50\n".to_vec(),
            "text/csv",
            "extrato.csv",
        );
        assert!(matches!(
            strategy.extract(&item).await.unwrap(),
            StrategyResult::DataExtraction(_)
        ));
    }

    #[tokio::test]
    async fn test_empty_csv_is_system_error() {
        let strategy = CsvStrategy::new(Arc::new(MockGenerationBackend::new()));
        let item = InboundItem::new(b"\n  \n".to_vec(), "text/csv", "vazio.csv");
        assert!(matches!(
            strategy.extract(&item).await.unwrap(),
            StrategyResult::SystemError(_)
        ));
    }

    #[tokio::test]
    async fn test_oversized_csv_is_truncated_for_the_model() {
        let gen = MockGenerationBackend::new().with_response("sem transações");
        let strategy = CsvStrategy::new(Arc::new(gen.clone()));

        let big = format!("header\n{}", "linha,1.00\n".repeat(20_000));
        assert!(big.len() > MAX_CSV_BYTES);
        let item = InboundItem::new(big.into_bytes(), "text/csv", "grande.csv");
        strategy.extract(&item).await.unwrap();

        let prompt = &gen.calls()[0];
        assert!(prompt.len() < MAX_CSV_BYTES + 1024);
        assert!(prompt.contains("header"));
    }
}
