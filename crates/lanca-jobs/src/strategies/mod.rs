//! Extraction strategies, one per supported input kind.

mod audio;
mod csv;
mod image;
mod ofx;
mod pdf;
mod text;
mod xlsx;

pub use audio::AudioStrategy;
pub use csv::CsvStrategy;
pub use image::ImageStrategy;
pub use ofx::OfxStrategy;
pub use pdf::{PdfPasswordEntry, PdfStrategy};
pub use text::TextStrategy;
pub use xlsx::XlsxStrategy;

use lanca_core::{parse_embedded, StrategyResult};

/// Classify a model reply: an embedded JSON object with financial content
/// becomes a `DataExtraction`; anything else is a conversational turn
/// handed back verbatim.
pub(crate) fn interpret_model_reply(reply: String) -> StrategyResult {
    match parse_embedded(&reply) {
        Some(parsed) if parsed.has_financial_content() => StrategyResult::DataExtraction(parsed),
        _ => StrategyResult::TextCommand(reply),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_financial_json_becomes_data_extraction() {
        let reply = r#"{"transacoes":[{"descricao":"Café","valor":8.0}],"confidence_score":0.9}"#;
        match interpret_model_reply(reply.to_string()) {
            StrategyResult::DataExtraction(resp) => {
                assert_eq!(resp.confidence_score, Some(0.9));
            }
            other => panic!("expected DataExtraction, got {:?}", other),
        }
    }

    #[test]
    fn test_prose_becomes_text_command() {
        match interpret_model_reply("Olá! Como posso ajudar?".to_string()) {
            StrategyResult::TextCommand(text) => assert!(text.starts_with("Olá")),
            other => panic!("expected TextCommand, got {:?}", other),
        }
    }

    #[test]
    fn test_non_financial_json_stays_conversational() {
        let reply = r#"{"resposta":"Você gastou R$ 120 este mês."}"#;
        assert!(matches!(
            interpret_model_reply(reply.to_string()),
            StrategyResult::TextCommand(_)
        ));
    }
}
