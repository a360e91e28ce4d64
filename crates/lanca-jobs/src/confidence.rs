//! Confidence gate: derives the persistence status for a batch.
//!
//! A single scalar threshold keeps the human review queue bounded and
//! predictable; status is all-or-nothing per batch so a stored batch is
//! never half-confirmed.

use lanca_core::defaults::{CONFIDENCE_DEFAULT, CONFIDENCE_THRESHOLD};
use lanca_core::{CanonicalTransaction, ReviewBatch, ReviewStatus};

/// Resolve the effective score for a batch; an absent score is treated as
/// [`CONFIDENCE_DEFAULT`], which always lands below the threshold.
pub fn effective_score(confidence_score: Option<f64>) -> f64 {
    confidence_score.unwrap_or(CONFIDENCE_DEFAULT)
}

/// Status for a given score. The threshold is inclusive: exactly 0.8
/// confirms.
pub fn status_for(confidence_score: Option<f64>) -> ReviewStatus {
    if effective_score(confidence_score) >= CONFIDENCE_THRESHOLD {
        ReviewStatus::Confirmed
    } else {
        ReviewStatus::PendingReview
    }
}

/// Apply the gate to an enriched batch, stamping status and `is_validated`
/// uniformly across every item.
pub fn gate(mut items: Vec<CanonicalTransaction>, confidence_score: Option<f64>) -> ReviewBatch {
    let status = status_for(confidence_score);
    let validated = status == ReviewStatus::Confirmed;

    for item in &mut items {
        item.status = status;
        item.is_validated = validated;
    }

    ReviewBatch { status, items }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use lanca_core::EntryKind;

    fn item(description: &str) -> CanonicalTransaction {
        CanonicalTransaction {
            description: description.into(),
            amount: 10.0,
            converted_amount: None,
            original_currency: "BRL".into(),
            exchange_rate: None,
            category: "Other".into(),
            kind: EntryKind::Expense,
            date: NaiveDate::from_ymd_opt(2026, 8, 5).unwrap(),
            status: ReviewStatus::PendingReview,
            is_validated: false,
            is_human_corrected: false,
            user_id: "u1".into(),
            embedding: None,
        }
    }

    #[test]
    fn test_high_confidence_confirms() {
        let batch = gate(vec![item("a"), item("b")], Some(0.9));
        assert_eq!(batch.status, ReviewStatus::Confirmed);
        assert!(batch.items.iter().all(|i| i.is_validated));
        assert!(batch
            .items
            .iter()
            .all(|i| i.status == ReviewStatus::Confirmed));
    }

    #[test]
    fn test_low_confidence_needs_review() {
        let batch = gate(vec![item("a")], Some(0.5));
        assert_eq!(batch.status, ReviewStatus::PendingReview);
        assert!(batch.items.iter().all(|i| !i.is_validated));
    }

    #[test]
    fn test_threshold_is_inclusive() {
        assert_eq!(status_for(Some(0.8)), ReviewStatus::Confirmed);
    }

    #[test]
    fn test_just_below_threshold_needs_review() {
        assert_eq!(status_for(Some(0.7999)), ReviewStatus::PendingReview);
    }

    #[test]
    fn test_absent_score_needs_review() {
        assert_eq!(status_for(None), ReviewStatus::PendingReview);
        assert_eq!(effective_score(None), 0.0);
    }

    #[test]
    fn test_empty_batch_keeps_status() {
        let batch = gate(vec![], Some(0.95));
        assert_eq!(batch.status, ReviewStatus::Confirmed);
        assert!(batch.items.is_empty());
    }
}
