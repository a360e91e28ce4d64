//! Normalization of untrusted model output into canonical entries.
//!
//! Pure transformation: never errors, never calls out. Unusable input
//! yields an empty list, which callers treat as "no financial content in
//! this turn" rather than a failure.

use chrono::{NaiveDate, Utc};

use lanca_core::{EntryKind, NormalizedEntry, RawAiResponse, RawEntry};

/// Category assigned when the model omits one.
pub const DEFAULT_CATEGORY: &str = "Other";

/// Description for the synthesized invoice-payment entry.
const INVOICE_DESCRIPTION: &str = "Pagamento de Fatura";

/// Normalize a raw model response into entries ready for enrichment.
///
/// 1. `transacoes` then `gastos`, order preserved, duplicates kept.
/// 2. If empty and a legacy single `valor` exists, synthesize one entry.
/// 3. If still empty and `total_fatura` exists, synthesize one
///    invoice-payment entry dated at `vencimento`.
/// 4. Drop entries without a numeric amount.
/// 5. Resolve dates, falling back to today.
pub fn normalize(raw: &RawAiResponse) -> Vec<NormalizedEntry> {
    normalize_with_today(raw, Utc::now().date_naive())
}

/// [`normalize`] with an explicit "today" for deterministic tests.
pub fn normalize_with_today(raw: &RawAiResponse, today: NaiveDate) -> Vec<NormalizedEntry> {
    let mut merged: Vec<RawEntry> = Vec::new();
    if let Some(transactions) = &raw.transactions {
        merged.extend(transactions.iter().cloned());
    }
    if let Some(expenses) = &raw.expenses {
        merged.extend(expenses.iter().cloned());
    }

    if merged.is_empty() {
        if let Some(amount) = raw.amount {
            merged.push(RawEntry {
                amount: Some(serde_json::json!(amount)),
                ..Default::default()
            });
        }
    }

    if merged.is_empty() {
        if let Some(total) = raw.invoice_total {
            merged.push(RawEntry {
                description: Some(INVOICE_DESCRIPTION.to_string()),
                amount: Some(serde_json::json!(total)),
                category: Some("Bills".to_string()),
                date: raw.due_date.clone(),
                ..Default::default()
            });
        }
    }

    merged
        .into_iter()
        .filter_map(|entry| {
            // Entries with no numeric amount carry no financial meaning.
            let amount = entry.numeric_amount()?;
            Some(NormalizedEntry {
                description: entry
                    .description
                    .clone()
                    .filter(|d| !d.trim().is_empty())
                    .unwrap_or_else(|| "Sem descrição".to_string()),
                amount,
                category: entry
                    .category
                    .clone()
                    .filter(|c| !c.trim().is_empty())
                    .unwrap_or_else(|| DEFAULT_CATEGORY.to_string()),
                kind: EntryKind::from_wire(entry.kind.as_deref()),
                date: resolve_date(entry.date.as_deref(), today),
                currency: entry
                    .currency
                    .clone()
                    .map(|c| c.trim().to_uppercase())
                    .filter(|c| !c.is_empty()),
            })
        })
        .collect()
}

/// Parse a model-reported date, falling back to `today` for anything
/// unparseable or absent. Accepts ISO dates and the Brazilian `dd/mm/yyyy`.
fn resolve_date(raw: Option<&str>, today: NaiveDate) -> NaiveDate {
    let Some(raw) = raw else { return today };
    let raw = raw.trim();

    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(raw, "%d/%m/%Y"))
        .unwrap_or(today)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 8, 5).unwrap()
    }

    fn response(value: serde_json::Value) -> RawAiResponse {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_merge_preserves_order_and_length() {
        let raw = response(json!({
            "transacoes": [
                {"descricao": "A", "valor": 1.0},
                {"descricao": "B", "valor": 2.0}
            ],
            "gastos": [
                {"descricao": "C", "valor": 3.0}
            ]
        }));

        let entries = normalize_with_today(&raw, today());
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].description, "A");
        assert_eq!(entries[1].description, "B");
        assert_eq!(entries[2].description, "C");
    }

    #[test]
    fn test_duplicates_are_kept() {
        let raw = response(json!({
            "transacoes": [{"descricao": "A", "valor": 1.0}],
            "gastos": [{"descricao": "A", "valor": 1.0}]
        }));
        assert_eq!(normalize_with_today(&raw, today()).len(), 2);
    }

    #[test]
    fn test_legacy_single_amount_synthesizes_one_entry() {
        let raw = response(json!({"valor": 99.5}));
        let entries = normalize_with_today(&raw, today());
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].amount, 99.5);
        assert_eq!(entries[0].category, DEFAULT_CATEGORY);
        assert_eq!(entries[0].kind, EntryKind::Expense);
    }

    #[test]
    fn test_legacy_amount_ignored_when_list_present() {
        let raw = response(json!({
            "transacoes": [{"descricao": "A", "valor": 1.0}],
            "valor": 99.5
        }));
        let entries = normalize_with_today(&raw, today());
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].amount, 1.0);
    }

    #[test]
    fn test_invoice_total_synthesizes_payment() {
        let raw = response(json!({"total_fatura": 512.30, "vencimento": "2026-09-10"}));
        let entries = normalize_with_today(&raw, today());
        assert_eq!(entries.len(), 1);
        assert!(entries[0].description.contains("Pagamento de Fatura"));
        assert_eq!(entries[0].amount, 512.30);
        assert_eq!(entries[0].date, NaiveDate::from_ymd_opt(2026, 9, 10).unwrap());
    }

    #[test]
    fn test_invoice_without_due_date_uses_today() {
        let raw = response(json!({"total_fatura": 100.0}));
        let entries = normalize_with_today(&raw, today());
        assert_eq!(entries[0].date, today());
    }

    #[test]
    fn test_items_without_numeric_amount_are_dropped() {
        let raw = response(json!({
            "transacoes": [
                {"valor": 10.0},
                {"descricao": "x"}
            ]
        }));
        let entries = normalize_with_today(&raw, today());
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].amount, 10.0);
    }

    #[test]
    fn test_empty_response_yields_empty_list() {
        let raw = RawAiResponse::default();
        assert!(normalize_with_today(&raw, today()).is_empty());
    }

    #[test]
    fn test_date_fallbacks() {
        let raw = response(json!({
            "transacoes": [
                {"valor": 1.0, "data": "2026-01-15"},
                {"valor": 2.0, "data": "15/01/2026"},
                {"valor": 3.0, "data": "not-a-date"},
                {"valor": 4.0}
            ]
        }));
        let entries = normalize_with_today(&raw, today());
        let expected = NaiveDate::from_ymd_opt(2026, 1, 15).unwrap();
        assert_eq!(entries[0].date, expected);
        assert_eq!(entries[1].date, expected);
        assert_eq!(entries[2].date, today());
        assert_eq!(entries[3].date, today());
    }

    #[test]
    fn test_currency_marker_is_uppercased() {
        let raw = response(json!({
            "transacoes": [
                {"valor": 1.0, "moeda": "usd"},
                {"valor": 2.0, "moeda": "  "},
                {"valor": 3.0}
            ]
        }));
        let entries = normalize_with_today(&raw, today());
        assert_eq!(entries[0].currency.as_deref(), Some("USD"));
        assert_eq!(entries[1].currency, None);
        assert_eq!(entries[2].currency, None);
    }

    #[test]
    fn test_income_marker_parsed() {
        let raw = response(json!({
            "transacoes": [{"descricao": "Salário", "valor": 5000.0, "tipo": "income"}]
        }));
        let entries = normalize_with_today(&raw, today());
        assert_eq!(entries[0].kind, EntryKind::Income);
    }

    #[test]
    fn test_renormalizing_canonical_shape_is_idempotent() {
        // Re-running the pipeline on its own output shape must not change
        // item count or values.
        let raw = response(json!({
            "transacoes": [
                {"descricao": "A", "valor": 10.0, "categoria": "Food", "tipo": "expense", "data": "2026-01-15"},
                {"descricao": "B", "valor": 20.0, "categoria": "Other", "tipo": "income", "data": "2026-02-01"}
            ]
        }));
        let first = normalize_with_today(&raw, today());

        let reconstructed = response(json!({
            "transacoes": first
                .iter()
                .map(|e| json!({
                    "descricao": e.description,
                    "valor": e.amount,
                    "categoria": e.category,
                    "tipo": if e.kind == EntryKind::Income { "income" } else { "expense" },
                    "data": e.date.format("%Y-%m-%d").to_string(),
                }))
                .collect::<Vec<_>>()
        }));
        let second = normalize_with_today(&reconstructed, today());

        assert_eq!(first, second);
    }
}
