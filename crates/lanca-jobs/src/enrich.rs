//! Currency and embedding enrichment of normalized entries.
//!
//! Both enrichments are best-effort: a failed rate lookup keeps the
//! original value unconverted, a failed embedding leaves the vector null.
//! Neither ever blocks persistence of the transaction itself.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};

use lanca_core::defaults::{CURRENCY_TIMEOUT_SECS, HOME_CURRENCY};
use lanca_core::{
    CanonicalTransaction, Conversion, CurrencyConverter, EmbeddingBackend, Error, NormalizedEntry,
    Result, ReviewStatus,
};

/// Services the enrichment step may call. Either can be absent.
pub struct Enrichment<'a> {
    pub converter: Option<&'a dyn CurrencyConverter>,
    pub embedder: Option<&'a dyn EmbeddingBackend>,
}

impl<'a> Enrichment<'a> {
    pub fn none() -> Self {
        Self {
            converter: None,
            embedder: None,
        }
    }
}

/// Turn normalized entries into canonical transactions for `user_id`,
/// resolving foreign-currency values and attaching embeddings where the
/// services are available. Status fields are placeholders until the
/// confidence gate runs.
pub async fn enrich(
    entries: Vec<NormalizedEntry>,
    user_id: &str,
    services: &Enrichment<'_>,
) -> Vec<CanonicalTransaction> {
    let mut items: Vec<CanonicalTransaction> = Vec::with_capacity(entries.len());

    for entry in entries {
        let original_currency = entry
            .currency
            .clone()
            .unwrap_or_else(|| HOME_CURRENCY.to_string());

        let (converted_amount, exchange_rate) = if original_currency != HOME_CURRENCY {
            match services.converter {
                Some(converter) => {
                    match converter
                        .convert(entry.amount, &original_currency, HOME_CURRENCY)
                        .await
                    {
                        Ok(conversion) => {
                            debug!(
                                from = %original_currency,
                                rate = conversion.exchange_rate,
                                "Currency converted"
                            );
                            (Some(conversion.converted_value), Some(conversion.exchange_rate))
                        }
                        Err(e) => {
                            warn!(
                                from = %original_currency,
                                error = %e,
                                "Currency conversion failed, keeping original value"
                            );
                            (None, None)
                        }
                    }
                }
                None => (None, None),
            }
        } else {
            (None, None)
        };

        items.push(CanonicalTransaction {
            description: entry.description,
            amount: entry.amount,
            converted_amount,
            original_currency,
            exchange_rate,
            category: entry.category,
            kind: entry.kind,
            date: entry.date,
            status: ReviewStatus::PendingReview,
            is_validated: false,
            is_human_corrected: false,
            user_id: user_id.to_string(),
            embedding: None,
        });
    }

    if let Some(embedder) = services.embedder {
        let texts: Vec<String> = items.iter().map(|i| i.description.clone()).collect();
        if !texts.is_empty() {
            match embedder.embed_texts(&texts).await {
                Ok(vectors) if vectors.len() == items.len() => {
                    for (item, vector) in items.iter_mut().zip(vectors) {
                        item.embedding = Some(vector);
                    }
                }
                Ok(vectors) => {
                    warn!(
                        expected = items.len(),
                        got = vectors.len(),
                        "Embedding count mismatch, skipping embeddings"
                    );
                }
                Err(e) => {
                    warn!(error = %e, "Embedding failed, storing without vectors");
                }
            }
        }
    }

    items
}

/// Exchange-rate client for a Frankfurter-compatible API.
pub struct HttpCurrencyConverter {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Deserialize)]
struct RatesResponse {
    rates: HashMap<String, f64>,
}

impl HttpCurrencyConverter {
    pub fn new(base_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url,
        }
    }

    /// Create from `EXCHANGE_RATE_URL`; `None` disables conversion.
    pub fn from_env() -> Option<Self> {
        let base_url = std::env::var("EXCHANGE_RATE_URL").ok()?;
        if base_url.is_empty() {
            return None;
        }
        Some(Self::new(base_url))
    }
}

#[async_trait]
impl CurrencyConverter for HttpCurrencyConverter {
    async fn convert(&self, amount: f64, from: &str, to: &str) -> Result<Conversion> {
        let url = format!(
            "{}/latest?amount={}&from={}&to={}",
            self.base_url, amount, from, to
        );

        let response = self
            .client
            .get(&url)
            .timeout(Duration::from_secs(CURRENCY_TIMEOUT_SECS))
            .send()
            .await
            .map_err(|e| Error::Request(format!("Rate lookup failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(Error::Request(format!(
                "Rate service returned {}",
                response.status()
            )));
        }

        let rates: RatesResponse = response
            .json()
            .await
            .map_err(|e| Error::Request(format!("Failed to parse rate response: {}", e)))?;

        let converted_value = rates
            .rates
            .get(to)
            .copied()
            .ok_or_else(|| Error::Request(format!("No rate for {}", to)))?;

        Ok(Conversion {
            converted_value,
            exchange_rate: if amount != 0.0 {
                converted_value / amount
            } else {
                0.0
            },
        })
    }
}

/// Fixed-rate converter for tests.
pub struct FixedRateConverter {
    pub rate: f64,
}

#[async_trait]
impl CurrencyConverter for FixedRateConverter {
    async fn convert(&self, amount: f64, _from: &str, _to: &str) -> Result<Conversion> {
        Ok(Conversion {
            converted_value: amount * self.rate,
            exchange_rate: self.rate,
        })
    }
}

/// Converter that always fails, for exercising the degradation path.
pub struct UnavailableConverter;

#[async_trait]
impl CurrencyConverter for UnavailableConverter {
    async fn convert(&self, _amount: f64, _from: &str, _to: &str) -> Result<Conversion> {
        Err(Error::Request("rate service unavailable".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use lanca_core::EntryKind;
    use lanca_inference::mock::MockEmbeddingBackend;

    fn entry(amount: f64, currency: Option<&str>) -> NormalizedEntry {
        NormalizedEntry {
            description: "Compra".into(),
            amount,
            category: "Other".into(),
            kind: EntryKind::Expense,
            date: NaiveDate::from_ymd_opt(2026, 8, 5).unwrap(),
            currency: currency.map(String::from),
        }
    }

    #[tokio::test]
    async fn test_home_currency_skips_conversion() {
        let converter = FixedRateConverter { rate: 5.0 };
        let services = Enrichment {
            converter: Some(&converter),
            embedder: None,
        };

        let items = enrich(vec![entry(10.0, None)], "u1", &services).await;
        assert_eq!(items[0].original_currency, HOME_CURRENCY);
        assert_eq!(items[0].converted_amount, None);
        assert_eq!(items[0].exchange_rate, None);
    }

    #[tokio::test]
    async fn test_foreign_currency_keeps_original_and_converted() {
        let converter = FixedRateConverter { rate: 5.0 };
        let services = Enrichment {
            converter: Some(&converter),
            embedder: None,
        };

        let items = enrich(vec![entry(10.0, Some("USD"))], "u1", &services).await;
        assert_eq!(items[0].amount, 10.0);
        assert_eq!(items[0].converted_amount, Some(50.0));
        assert_eq!(items[0].exchange_rate, Some(5.0));
        assert_eq!(items[0].original_currency, "USD");
    }

    #[tokio::test]
    async fn test_conversion_failure_keeps_original_value() {
        let converter = UnavailableConverter;
        let services = Enrichment {
            converter: Some(&converter),
            embedder: None,
        };

        let items = enrich(vec![entry(10.0, Some("USD"))], "u1", &services).await;
        assert_eq!(items[0].amount, 10.0);
        assert_eq!(items[0].converted_amount, None);
        assert_eq!(items[0].exchange_rate, None);
    }

    #[tokio::test]
    async fn test_embeddings_attached_per_item() {
        let embedder = MockEmbeddingBackend::new(8);
        let services = Enrichment {
            converter: None,
            embedder: Some(&embedder),
        };

        let items = enrich(vec![entry(1.0, None), entry(2.0, None)], "u1", &services).await;
        assert!(items.iter().all(|i| i.embedding.is_some()));
        assert_eq!(items[0].embedding.as_ref().unwrap().len(), 8);
    }

    #[tokio::test]
    async fn test_embedding_failure_does_not_block() {
        let embedder = MockEmbeddingBackend::new(8).failing();
        let services = Enrichment {
            converter: None,
            embedder: Some(&embedder),
        };

        let items = enrich(vec![entry(1.0, None)], "u1", &services).await;
        assert_eq!(items.len(), 1);
        assert!(items[0].embedding.is_none());
    }

    #[tokio::test]
    async fn test_user_id_stamped_on_every_item() {
        let items = enrich(
            vec![entry(1.0, None), entry(2.0, None)],
            "user-42",
            &Enrichment::none(),
        )
        .await;
        assert!(items.iter().all(|i| i.user_id == "user-42"));
        assert!(items.iter().all(|i| !i.is_human_corrected));
    }
}
