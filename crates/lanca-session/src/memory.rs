//! In-memory session store for tests and offline development.
//!
//! Enforces the same TTL contract as the Redis store with explicit expiry
//! timestamps checked on read.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde_json::Value as JsonValue;

use lanca_core::{Result, SessionStore, SessionTurn};

struct Entry {
    value: String,
    expires_at: DateTime<Utc>,
}

/// Session store holding everything in a process-local map.
#[derive(Default)]
pub struct InMemorySessionStore {
    entries: Mutex<HashMap<String, Entry>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn get_live(&self, key: &str) -> Option<String> {
        let mut entries = self.entries.lock().unwrap();
        match entries.get(key) {
            Some(entry) if entry.expires_at > Utc::now() => Some(entry.value.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    fn put(&self, key: String, value: String, ttl_secs: u64) {
        let mut entries = self.entries.lock().unwrap();
        entries.insert(
            key,
            Entry {
                value,
                expires_at: Utc::now() + Duration::seconds(ttl_secs as i64),
            },
        );
    }

    fn remove(&self, key: &str) {
        self.entries.lock().unwrap().remove(key);
    }

    /// Force a key to be already expired (test hook for TTL behavior).
    pub fn expire_now(&self, user_id: &str, suffix: &str) {
        let mut entries = self.entries.lock().unwrap();
        if let Some(entry) = entries.get_mut(&format!("{user_id}:{suffix}")) {
            entry.expires_at = Utc::now() - Duration::seconds(1);
        }
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn get_context(&self, user_id: &str) -> Result<Vec<SessionTurn>> {
        Ok(self
            .get_live(&format!("{user_id}:context"))
            .and_then(|raw| serde_json::from_str(&raw).ok())
            .unwrap_or_default())
    }

    async fn set_context(&self, user_id: &str, turns: &[SessionTurn], ttl_secs: u64) -> Result<()> {
        self.put(
            format!("{user_id}:context"),
            serde_json::to_string(turns)?,
            ttl_secs,
        );
        Ok(())
    }

    async fn clear_context(&self, user_id: &str) -> Result<()> {
        self.remove(&format!("{user_id}:context"));
        Ok(())
    }

    async fn set_pending_pdf(&self, user_id: &str, pdf_base64: &str, ttl_secs: u64) -> Result<()> {
        self.put(
            format!("{user_id}:pending_pdf"),
            pdf_base64.to_string(),
            ttl_secs,
        );
        Ok(())
    }

    async fn get_pending_pdf(&self, user_id: &str) -> Result<Option<String>> {
        Ok(self.get_live(&format!("{user_id}:pending_pdf")))
    }

    async fn clear_pending_pdf(&self, user_id: &str) -> Result<()> {
        self.remove(&format!("{user_id}:pending_pdf"));
        Ok(())
    }

    async fn set_pending_correction(
        &self,
        user_id: &str,
        correction: &JsonValue,
        ttl_secs: u64,
    ) -> Result<()> {
        self.put(
            format!("{user_id}:pending_correction"),
            serde_json::to_string(correction)?,
            ttl_secs,
        );
        Ok(())
    }

    async fn get_pending_correction(&self, user_id: &str) -> Result<Option<JsonValue>> {
        Ok(self
            .get_live(&format!("{user_id}:pending_correction"))
            .and_then(|raw| serde_json::from_str(&raw).ok()))
    }

    async fn clear_pending_correction(&self, user_id: &str) -> Result<()> {
        self.remove(&format!("{user_id}:pending_correction"));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lanca_core::PdfFlow;

    #[tokio::test]
    async fn test_context_round_trip() {
        let store = InMemorySessionStore::new();
        let turns = vec![SessionTurn::user("oi"), SessionTurn::assistant("olá!")];

        store.set_context("u1", &turns, 60).await.unwrap();
        assert_eq!(store.get_context("u1").await.unwrap(), turns);

        store.clear_context("u1").await.unwrap();
        assert!(store.get_context("u1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_expired_context_reads_empty() {
        let store = InMemorySessionStore::new();
        store
            .set_context("u1", &[SessionTurn::user("oi")], 60)
            .await
            .unwrap();

        store.expire_now("u1", "context");
        assert!(store.get_context("u1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_pdf_flow_transitions() {
        let store = InMemorySessionStore::new();
        assert_eq!(store.pdf_flow("u1").await.unwrap(), PdfFlow::Idle);

        store.set_pending_pdf("u1", "YWJj", 300).await.unwrap();
        assert_eq!(
            store.pdf_flow("u1").await.unwrap(),
            PdfFlow::AwaitingPassword {
                pdf_base64: "YWJj".into()
            }
        );

        store.clear_pending_pdf("u1").await.unwrap();
        assert_eq!(store.pdf_flow("u1").await.unwrap(), PdfFlow::Idle);
    }

    #[tokio::test]
    async fn test_pdf_ttl_expiry_returns_to_idle() {
        let store = InMemorySessionStore::new();
        store.set_pending_pdf("u1", "YWJj", 300).await.unwrap();
        store.expire_now("u1", "pending_pdf");
        assert_eq!(store.pdf_flow("u1").await.unwrap(), PdfFlow::Idle);
    }

    #[tokio::test]
    async fn test_users_are_isolated() {
        let store = InMemorySessionStore::new();
        store
            .set_context("u1", &[SessionTurn::user("a")], 60)
            .await
            .unwrap();
        assert!(store.get_context("u2").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_pending_correction_round_trip() {
        let store = InMemorySessionStore::new();
        let correction = serde_json::json!({"target": "tx-1", "valor": 12.5});
        store
            .set_pending_correction("u1", &correction, 60)
            .await
            .unwrap();
        assert_eq!(
            store.get_pending_correction("u1").await.unwrap(),
            Some(correction)
        );
        store.clear_pending_correction("u1").await.unwrap();
        assert!(store.get_pending_correction("u1").await.unwrap().is_none());
    }
}
