//! Redis-backed session store.
//!
//! Per-user conversational state lives in Redis under prefixed keys with
//! server-side TTLs (`SET EX`): the conversation context, a pending
//! password-protected PDF, and a pending correction. All operations are
//! single-key; concurrent jobs for the same user are last-write-wins.
//!
//! ## Configuration
//!
//! Environment variables:
//! - `REDIS_URL`: Redis connection URL (default: redis://localhost:6379)

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use serde_json::Value as JsonValue;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use lanca_core::{Error, Result, SessionStore, SessionTurn};

const KEY_PREFIX: &str = "lanca:session:";

/// Session store backed by Redis.
pub struct RedisSessionStore {
    /// Redis connection manager (None if the connection never came up).
    connection: RwLock<Option<ConnectionManager>>,
}

impl RedisSessionStore {
    /// Create a session store from environment configuration.
    ///
    /// Reads `REDIS_URL` (default: redis://localhost:6379). If Redis is
    /// unreachable the store degrades: reads return empty state, writes are
    /// dropped with a warning. The pipeline keeps working without
    /// multi-turn memory rather than failing every job.
    pub async fn from_env() -> Self {
        let redis_url =
            std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".to_string());

        let connection = match redis::Client::open(redis_url.as_str()) {
            Ok(client) => match ConnectionManager::new(client).await {
                Ok(conn) => {
                    info!(subsystem = "session", "Redis session store connected");
                    Some(conn)
                }
                Err(e) => {
                    warn!(
                        subsystem = "session",
                        error = %e,
                        "Failed to connect to Redis, session state disabled"
                    );
                    None
                }
            },
            Err(e) => {
                warn!(
                    subsystem = "session",
                    error = %e,
                    "Invalid Redis URL, session state disabled"
                );
                None
            }
        };

        Self {
            connection: RwLock::new(connection),
        }
    }

    /// A store with no backing connection (tests, offline development).
    pub fn disconnected() -> Self {
        Self {
            connection: RwLock::new(None),
        }
    }

    pub async fn is_connected(&self) -> bool {
        self.connection.read().await.is_some()
    }

    fn context_key(user_id: &str) -> String {
        format!("{KEY_PREFIX}{user_id}:context")
    }

    fn pdf_key(user_id: &str) -> String {
        format!("{KEY_PREFIX}{user_id}:pending_pdf")
    }

    fn correction_key(user_id: &str) -> String {
        format!("{KEY_PREFIX}{user_id}:pending_correction")
    }

    async fn get_string(&self, key: &str) -> Result<Option<String>> {
        let mut guard = self.connection.write().await;
        let conn = match guard.as_mut() {
            Some(c) => c,
            None => return Ok(None),
        };

        match conn.get::<_, Option<String>>(key).await {
            Ok(v) => Ok(v),
            Err(e) => {
                warn!(subsystem = "session", key, error = %e, "Redis GET failed");
                Err(Error::from(e))
            }
        }
    }

    async fn set_string(&self, key: &str, value: &str, ttl_secs: u64) -> Result<()> {
        let mut guard = self.connection.write().await;
        let conn = match guard.as_mut() {
            Some(c) => c,
            None => {
                debug!(subsystem = "session", key, "No Redis connection, write dropped");
                return Ok(());
            }
        };

        conn.set_ex::<_, _, ()>(key, value, ttl_secs)
            .await
            .map_err(Error::from)?;
        debug!(subsystem = "session", key, ttl_secs, "Session key written");
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut guard = self.connection.write().await;
        let conn = match guard.as_mut() {
            Some(c) => c,
            None => return Ok(()),
        };

        conn.del::<_, ()>(key).await.map_err(Error::from)?;
        Ok(())
    }
}

#[async_trait]
impl SessionStore for RedisSessionStore {
    async fn get_context(&self, user_id: &str) -> Result<Vec<SessionTurn>> {
        match self.get_string(&Self::context_key(user_id)).await? {
            Some(raw) => match serde_json::from_str(&raw) {
                Ok(turns) => Ok(turns),
                Err(e) => {
                    // A corrupt blob is treated as no context, not a hard
                    // failure; it will be overwritten on the next turn.
                    warn!(subsystem = "session", user_id, error = %e, "Corrupt context blob");
                    Ok(Vec::new())
                }
            },
            None => Ok(Vec::new()),
        }
    }

    async fn set_context(&self, user_id: &str, turns: &[SessionTurn], ttl_secs: u64) -> Result<()> {
        let raw = serde_json::to_string(turns)?;
        self.set_string(&Self::context_key(user_id), &raw, ttl_secs)
            .await
    }

    async fn clear_context(&self, user_id: &str) -> Result<()> {
        self.delete(&Self::context_key(user_id)).await
    }

    async fn set_pending_pdf(&self, user_id: &str, pdf_base64: &str, ttl_secs: u64) -> Result<()> {
        self.set_string(&Self::pdf_key(user_id), pdf_base64, ttl_secs)
            .await
    }

    async fn get_pending_pdf(&self, user_id: &str) -> Result<Option<String>> {
        self.get_string(&Self::pdf_key(user_id)).await
    }

    async fn clear_pending_pdf(&self, user_id: &str) -> Result<()> {
        self.delete(&Self::pdf_key(user_id)).await
    }

    async fn set_pending_correction(
        &self,
        user_id: &str,
        correction: &JsonValue,
        ttl_secs: u64,
    ) -> Result<()> {
        let raw = serde_json::to_string(correction)?;
        self.set_string(&Self::correction_key(user_id), &raw, ttl_secs)
            .await
    }

    async fn get_pending_correction(&self, user_id: &str) -> Result<Option<JsonValue>> {
        match self.get_string(&Self::correction_key(user_id)).await? {
            Some(raw) => Ok(serde_json::from_str(&raw).ok()),
            None => Ok(None),
        }
    }

    async fn clear_pending_correction(&self, user_id: &str) -> Result<()> {
        self.delete(&Self::correction_key(user_id)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lanca_core::PdfFlow;

    #[test]
    fn test_key_layout() {
        assert_eq!(
            RedisSessionStore::context_key("u1"),
            "lanca:session:u1:context"
        );
        assert_eq!(
            RedisSessionStore::pdf_key("u1"),
            "lanca:session:u1:pending_pdf"
        );
        assert_eq!(
            RedisSessionStore::correction_key("u1"),
            "lanca:session:u1:pending_correction"
        );
    }

    #[tokio::test]
    async fn test_disconnected_store_degrades_gracefully() {
        let store = RedisSessionStore::disconnected();
        assert!(!store.is_connected().await);

        // Reads are empty, writes are no-ops, nothing errors.
        assert!(store.get_context("u1").await.unwrap().is_empty());
        store
            .set_context("u1", &[SessionTurn::user("hi")], 60)
            .await
            .unwrap();
        assert!(store.get_pending_pdf("u1").await.unwrap().is_none());
        assert_eq!(store.pdf_flow("u1").await.unwrap(), PdfFlow::Idle);
        store.clear_context("u1").await.unwrap();
    }
}
