//! Canonical transaction persistence.

use async_trait::async_trait;
use chrono::Utc;
use pgvector::Vector;
use sqlx::{Pool, Postgres, Row};
use uuid::Uuid;

use lanca_core::{
    CanonicalTransaction, EntryKind, Error, Result, ReviewStatus, TransactionRepository,
};

/// PostgreSQL implementation of transaction storage.
pub struct PgTransactionRepository {
    pool: Pool<Postgres>,
}

impl PgTransactionRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    fn kind_to_str(kind: EntryKind) -> &'static str {
        match kind {
            EntryKind::Income => "income",
            EntryKind::Expense => "expense",
        }
    }

    fn str_to_kind(s: &str) -> EntryKind {
        match s {
            "income" => EntryKind::Income,
            _ => EntryKind::Expense,
        }
    }

    fn status_to_str(status: ReviewStatus) -> &'static str {
        match status {
            ReviewStatus::Confirmed => "confirmed",
            ReviewStatus::PendingReview => "pending_review",
        }
    }

    fn str_to_status(s: &str) -> ReviewStatus {
        match s {
            "confirmed" => ReviewStatus::Confirmed,
            _ => ReviewStatus::PendingReview,
        }
    }

    fn parse_row(row: sqlx::postgres::PgRow) -> CanonicalTransaction {
        let embedding: Option<Vector> = row.try_get("embedding").ok().flatten();
        CanonicalTransaction {
            description: row.get("descricao"),
            amount: row.get("valor"),
            converted_amount: row.get("valor_convertido"),
            original_currency: row.get("moeda_original"),
            exchange_rate: row.get("taxa_cambio"),
            category: row.get("categoria"),
            kind: Self::str_to_kind(row.get("tipo")),
            date: row.get("data"),
            status: Self::str_to_status(row.get("status")),
            is_validated: row.get("is_validated"),
            is_human_corrected: row.get("is_human_corrected"),
            user_id: row.get("user_id"),
            embedding: embedding.map(|v| v.to_vec()),
        }
    }
}

#[async_trait]
impl TransactionRepository for PgTransactionRepository {
    async fn create_many(&self, items: &[CanonicalTransaction]) -> Result<Vec<Uuid>> {
        if items.is_empty() {
            return Ok(Vec::new());
        }

        let now = Utc::now();
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;
        let mut ids = Vec::with_capacity(items.len());

        for item in items {
            let id = Uuid::now_v7();
            let embedding = item.embedding.clone().map(Vector::from);

            sqlx::query(
                "INSERT INTO transactions
                   (id, user_id, descricao, valor, valor_convertido, moeda_original,
                    taxa_cambio, categoria, tipo, data, status, is_validated,
                    is_human_corrected, embedding, created_at)
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)",
            )
            .bind(id)
            .bind(&item.user_id)
            .bind(&item.description)
            .bind(item.amount)
            .bind(item.converted_amount)
            .bind(&item.original_currency)
            .bind(item.exchange_rate)
            .bind(&item.category)
            .bind(Self::kind_to_str(item.kind))
            .bind(item.date)
            .bind(Self::status_to_str(item.status))
            .bind(item.is_validated)
            .bind(item.is_human_corrected)
            .bind(embedding)
            .bind(now)
            .execute(&mut *tx)
            .await
            .map_err(Error::Database)?;

            ids.push(id);
        }

        tx.commit().await.map_err(Error::Database)?;
        Ok(ids)
    }

    async fn list_for_user(&self, user_id: &str, limit: i64) -> Result<Vec<CanonicalTransaction>> {
        let rows = sqlx::query(
            "SELECT user_id, descricao, valor, valor_convertido, moeda_original, taxa_cambio,
                    categoria, tipo, data, status, is_validated, is_human_corrected, embedding
             FROM transactions
             WHERE user_id = $1
             ORDER BY data DESC, created_at DESC
             LIMIT $2",
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(rows.into_iter().map(Self::parse_row).collect())
    }
}
