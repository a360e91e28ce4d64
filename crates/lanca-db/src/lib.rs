//! # lanca-db
//!
//! PostgreSQL layer for lanca.
//!
//! This crate provides:
//! - Connection pool management
//! - The durable inbound job queue (`FOR UPDATE SKIP LOCKED` claims,
//!   exponential retry backoff)
//! - The outbound reply queue
//! - Canonical transaction persistence with pgvector embeddings
//!
//! ## Example
//!
//! ```rust,ignore
//! use lanca_db::{create_pool, PgJobQueue};
//! use lanca_core::{JobQueue, JobKind, NewJob};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let pool = create_pool("postgres://localhost/lanca").await?;
//!     let queue = PgJobQueue::new(pool);
//!
//!     let job_id = queue
//!         .enqueue(NewJob::new(JobKind::Text, "chat-1", "user-1"))
//!         .await?;
//!
//!     println!("Enqueued job: {}", job_id);
//!     Ok(())
//! }
//! ```

pub mod jobs;
pub mod outbound;
pub mod pool;
pub mod transactions;

// Re-export core types
pub use lanca_core::*;

pub use jobs::PgJobQueue;
pub use outbound::PgOutboundQueue;
pub use pool::{create_pool, create_pool_with_config, log_pool_metrics, PoolConfig};
pub use transactions::PgTransactionRepository;

/// Embedded sqlx migrations for the lanca schema.
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");
