//! Shared application state for the intake server.

use std::sync::Arc;

use sqlx::PgPool;

use lanca_core::{JobQueue, OutboundQueue, SessionStore};
use lanca_jobs::StrategyRegistry;

/// State handed to every route handler.
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub jobs: Arc<dyn JobQueue>,
    pub outbound: Arc<dyn OutboundQueue>,
    pub sessions: Arc<dyn SessionStore>,
    pub registry: Arc<StrategyRegistry>,
}
