//! OFX strategy: deterministic parse of bank-export statements.
//!
//! OFX 1.x is SGML with unclosed leaf tags, so this parses the
//! `<STMTTRN>` aggregates with regexes instead of an XML reader. No model
//! call is involved; the result carries `confidence_score` 1.0 and lands
//! as confirmed.

use async_trait::async_trait;
use regex::Regex;
use std::sync::OnceLock;
use tracing::debug;

use lanca_core::defaults::HOME_CURRENCY;
use lanca_core::{
    ExtractionStrategy, InboundItem, MediaKind, RawAiResponse, RawEntry, Result, StrategyResult,
};

/// Strategy for OFX bank exports.
pub struct OfxStrategy;

fn stmttrn_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)<STMTTRN>(.*?)</STMTTRN>").unwrap())
}

fn field_re(tag: &str) -> Regex {
    Regex::new(&format!(r"<{tag}>([^\r\n<]+)")).unwrap()
}

/// One field's value inside a transaction block.
fn field(block: &str, tag: &str) -> Option<String> {
    field_re(tag)
        .captures(block)
        .map(|c| c[1].trim().to_string())
        .filter(|v| !v.is_empty())
}

/// `YYYYMMDD...` → `YYYY-MM-DD`. OFX dates may carry time and timezone
/// suffixes; only the date part matters here.
fn parse_ofx_date(raw: &str) -> Option<String> {
    if raw.len() < 8 || !raw[..8].bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some(format!("{}-{}-{}", &raw[..4], &raw[4..6], &raw[6..8]))
}

impl OfxStrategy {
    fn parse(content: &str) -> Vec<RawEntry> {
        let currency = field(content, "CURDEF")
            .map(|c| c.to_uppercase())
            .filter(|c| c != HOME_CURRENCY);

        stmttrn_re()
            .captures_iter(content)
            .filter_map(|cap| {
                let block = &cap[1];
                let amount: f64 = field(block, "TRNAMT")?.replace(',', ".").parse().ok()?;

                let description = field(block, "MEMO")
                    .or_else(|| field(block, "NAME"))
                    .unwrap_or_else(|| "Transação bancária".to_string());

                // Negative amounts are debits; the sign moves into `tipo`.
                let kind = if amount < 0.0 { "expense" } else { "income" };

                Some(RawEntry {
                    description: Some(description),
                    amount: Some(serde_json::json!(amount.abs())),
                    category: None,
                    kind: Some(kind.to_string()),
                    date: field(block, "DTPOSTED").and_then(|d| parse_ofx_date(&d)),
                    currency: currency.clone(),
                })
            })
            .collect()
    }
}

#[async_trait]
impl ExtractionStrategy for OfxStrategy {
    fn kind(&self) -> MediaKind {
        MediaKind::Ofx
    }

    async fn extract(&self, item: &InboundItem) -> Result<StrategyResult> {
        let content = String::from_utf8_lossy(&item.data);
        let entries = Self::parse(&content);

        if entries.is_empty() {
            return Ok(StrategyResult::SystemError(
                "Não encontrei transações no arquivo OFX.".into(),
            ));
        }

        debug!(
            strategy = "ofx",
            item_count = entries.len(),
            "Parsed OFX statement"
        );

        Ok(StrategyResult::DataExtraction(RawAiResponse {
            transactions: Some(entries),
            confidence_score: Some(1.0),
            ..Default::default()
        }))
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(true) // No external dependencies
    }

    fn name(&self) -> &str {
        "ofx"
    }
}
