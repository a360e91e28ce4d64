//! Wire schema for untrusted model output.
//!
//! The extraction model is prompted to answer with a JSON object, but what
//! actually comes back ranges from clean JSON through JSON wrapped in prose
//! to no JSON at all. Everything here is optional: a response with no
//! transaction-bearing field is a valid conversation turn, not an error.
//! Field presence is only ever checked at this boundary; downstream code
//! works with the normalized types.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// One transaction item as the model reports it. The Portuguese keys are
/// the prompt's answer schema, shared with the legacy data the persistence
/// layer already holds.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawEntry {
    #[serde(rename = "descricao", default)]
    pub description: Option<String>,
    /// Kept as a raw JSON value: models emit numbers, numeric strings, or
    /// garbage here. See [`RawEntry::numeric_amount`].
    #[serde(rename = "valor", default)]
    pub amount: Option<JsonValue>,
    #[serde(rename = "categoria", default)]
    pub category: Option<String>,
    #[serde(rename = "tipo", default)]
    pub kind: Option<String>,
    #[serde(rename = "data", default)]
    pub date: Option<String>,
    #[serde(rename = "moeda", default)]
    pub currency: Option<String>,
}

impl RawEntry {
    /// The amount as a number, accepting JSON numbers and numeric strings.
    /// Items without a numeric amount carry no financial meaning and are
    /// dropped by normalization.
    pub fn numeric_amount(&self) -> Option<f64> {
        match self.amount.as_ref()? {
            JsonValue::Number(n) => n.as_f64(),
            JsonValue::String(s) => s.trim().replace(',', ".").parse::<f64>().ok(),
            _ => None,
        }
    }
}

/// The permissive response schema. Unknown fields are ignored; every known
/// field is optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawAiResponse {
    #[serde(rename = "transacoes", default)]
    pub transactions: Option<Vec<RawEntry>>,
    /// Legacy alias list, merged after `transacoes`.
    #[serde(rename = "gastos", default)]
    pub expenses: Option<Vec<RawEntry>>,
    /// Legacy single-amount shape.
    #[serde(rename = "valor", default)]
    pub amount: Option<f64>,
    /// Invoice total; drives the invoice-payment inference when no
    /// transaction list is present.
    #[serde(rename = "total_fatura", default)]
    pub invoice_total: Option<f64>,
    /// Invoice due date, used as the synthesized payment's date.
    #[serde(rename = "vencimento", default)]
    pub due_date: Option<String>,
    #[serde(default)]
    pub confidence_score: Option<f64>,
    /// Conversational, non-transactional fields.
    #[serde(rename = "pergunta", default)]
    pub question: Option<String>,
    #[serde(rename = "resposta", default)]
    pub answer: Option<String>,
}

impl RawAiResponse {
    /// Whether anything in this response can produce a ledger entry.
    pub fn has_financial_content(&self) -> bool {
        self.transactions.as_ref().is_some_and(|t| !t.is_empty())
            || self.expenses.as_ref().is_some_and(|g| !g.is_empty())
            || self.amount.is_some()
            || self.invoice_total.is_some()
    }
}

/// Extract the JSON candidate from model prose: the substring between the
/// first `{` and the last `}` inclusive, or `None` when no such span exists.
pub fn extract_json_candidate(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end < start {
        return None;
    }
    Some(&text[start..=end])
}

/// Try to interpret free text as a JSON-embedded model response. Returns
/// `None` when no candidate is found or the candidate does not parse; the
/// caller treats that as "not a transaction", never as an error.
pub fn parse_embedded(text: &str) -> Option<RawAiResponse> {
    let candidate = extract_json_candidate(text)?;
    serde_json::from_str::<RawAiResponse>(candidate).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_empty_object_is_valid_conversation_turn() {
        let resp: RawAiResponse = serde_json::from_str("{}").unwrap();
        assert!(!resp.has_financial_content());
        assert!(resp.confidence_score.is_none());
    }

    #[test]
    fn test_full_response_parses() {
        let resp: RawAiResponse = serde_json::from_value(json!({
            "transacoes": [
                {"descricao": "Almoço", "valor": 32.5, "categoria": "Food", "tipo": "expense", "data": "2026-01-10"}
            ],
            "gastos": [{"descricao": "Uber", "valor": "18,90"}],
            "confidence_score": 0.92
        }))
        .unwrap();

        assert!(resp.has_financial_content());
        assert_eq!(resp.transactions.as_ref().unwrap().len(), 1);
        assert_eq!(resp.expenses.as_ref().unwrap().len(), 1);
        assert_eq!(resp.confidence_score, Some(0.92));
    }

    #[test]
    fn test_numeric_amount_accepts_numbers_and_strings() {
        let entry: RawEntry = serde_json::from_value(json!({"valor": 10})).unwrap();
        assert_eq!(entry.numeric_amount(), Some(10.0));

        let entry: RawEntry = serde_json::from_value(json!({"valor": "45.90"})).unwrap();
        assert_eq!(entry.numeric_amount(), Some(45.9));

        // Brazilian decimal comma
        let entry: RawEntry = serde_json::from_value(json!({"valor": "45,90"})).unwrap();
        assert_eq!(entry.numeric_amount(), Some(45.9));

        let entry: RawEntry = serde_json::from_value(json!({"valor": true})).unwrap();
        assert_eq!(entry.numeric_amount(), None);

        let entry: RawEntry = serde_json::from_value(json!({"descricao": "x"})).unwrap();
        assert_eq!(entry.numeric_amount(), None);
    }

    #[test]
    fn test_legacy_single_amount_counts_as_financial() {
        let resp: RawAiResponse = serde_json::from_value(json!({"valor": 99.0})).unwrap();
        assert!(resp.has_financial_content());
    }

    #[test]
    fn test_invoice_total_counts_as_financial() {
        let resp: RawAiResponse =
            serde_json::from_value(json!({"total_fatura": 512.3, "vencimento": "2026-02-05"}))
                .unwrap();
        assert!(resp.has_financial_content());
        assert_eq!(resp.due_date.as_deref(), Some("2026-02-05"));
    }

    #[test]
    fn test_conversational_only_is_not_financial() {
        let resp: RawAiResponse = serde_json::from_value(
            json!({"pergunta": "quanto gastei?", "resposta": "Você gastou R$ 120 este mês."}),
        )
        .unwrap();
        assert!(!resp.has_financial_content());
        assert!(resp.answer.is_some());
    }

    #[test]
    fn test_extract_json_candidate() {
        assert_eq!(extract_json_candidate("{\"a\":1}"), Some("{\"a\":1}"));
        assert_eq!(
            extract_json_candidate("Sure! Here you go: {\"a\":1} Hope it helps."),
            Some("{\"a\":1}")
        );
        assert_eq!(extract_json_candidate("no json here"), None);
        assert_eq!(extract_json_candidate("} backwards {"), None);
    }

    #[test]
    fn test_parse_embedded_malformed_returns_none() {
        assert!(parse_embedded("not-json").is_none());
        assert!(parse_embedded("{not valid}").is_none());
    }

    #[test]
    fn test_parse_embedded_inside_prose() {
        let text = "Registrei para você:\n{\"transacoes\":[{\"descricao\":\"Café\",\"valor\":8}]}";
        let resp = parse_embedded(text).unwrap();
        assert!(resp.has_financial_content());
    }

    #[test]
    fn test_unknown_fields_ignored() {
        let resp: RawAiResponse =
            serde_json::from_value(json!({"valor": 5.0, "model_notes": "irrelevant"})).unwrap();
        assert_eq!(resp.amount, Some(5.0));
    }
}
