//! Spreadsheet strategy: xlsx workbooks flattened to text, then the model.

use std::io::Cursor;
use std::sync::Arc;

use async_trait::async_trait;
use calamine::{Reader, Xlsx};
use tracing::debug;

use lanca_core::{
    ExtractionStrategy, GenerationBackend, InboundItem, MediaKind, Result, StrategyResult,
};

use crate::prompts::{extraction_prompt, EXTRACTION_SYSTEM};
use crate::strategies::interpret_model_reply;

/// Strategy for spreadsheet exports.
pub struct XlsxStrategy {
    gen: Arc<dyn GenerationBackend>,
}

impl XlsxStrategy {
    pub fn new(gen: Arc<dyn GenerationBackend>) -> Self {
        Self { gen }
    }

    /// Flatten every sheet to tab-separated text, one line per row.
    fn workbook_to_text(data: &[u8]) -> Option<String> {
        let mut workbook: Xlsx<_> = Xlsx::new(Cursor::new(data.to_vec())).ok()?;
        let mut text = String::new();

        for sheet_name in workbook.sheet_names().to_owned() {
            if let Some(Ok(range)) = workbook.worksheet_range(&sheet_name) {
                text.push_str(&format!("# {sheet_name}\n"));
                for row in range.rows() {
                    let line: Vec<String> = row.iter().map(|cell| cell.to_string()).collect();
                    text.push_str(&line.join("\t"));
                    text.push('\n');
                }
            }
        }

        if text.trim().is_empty() {
            None
        } else {
            Some(text)
        }
    }
}

#[async_trait]
impl ExtractionStrategy for XlsxStrategy {
    fn kind(&self) -> MediaKind {
        MediaKind::Xlsx
    }

    async fn extract(&self, item: &InboundItem) -> Result<StrategyResult> {
        let Some(text) = Self::workbook_to_text(&item.data) else {
            // Corrupt file or one with no cell data; recoverable either way.
            return Ok(StrategyResult::SystemError(
                "Não consegui ler a planilha enviada.".into(),
            ));
        };

        debug!(
            strategy = "xlsx",
            text_len = text.len(),
            "Flattened workbook for the model"
        );

        let prompt = extraction_prompt(&text, item.caption.as_deref());
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
        "xlsx"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lanca_inference::mock::MockGenerationBackend;

    #[tokio::test]
    async fn test_garbage_bytes_are_system_error() {
        let strategy = XlsxStrategy::new(Arc::new(MockGenerationBackend::new()));
        let item = InboundItem::new(
            b"definitely not a zip archive".to_vec(),
            "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
            "planilha.xlsx",
        );
        assert!(matches!(
            strategy.extract(&item).await.unwrap(),
            StrategyResult::SystemError(_)
        ));
    }

    #[test]
    fn test_empty_workbook_yields_none() {
        assert!(XlsxStrategy::workbook_to_text(b"not-xlsx").is_none());
    }
}
