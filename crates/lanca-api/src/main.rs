//! lanca-api — intake server and worker runtime for lanca.
//!
//! Boots the Postgres pool (running migrations), the Redis session store,
//! the model backends, the strategy registry, the inbound worker pool, and
//! the outbound sender pool, then serves the intake HTTP API until SIGINT.

mod routes;
mod state;
mod transport;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use lanca_core::defaults;
use lanca_core::{EmbeddingBackend, GenerationBackend};
use lanca_db::{PgJobQueue, PgOutboundQueue, PgTransactionRepository};
use lanca_inference::{OllamaBackend, OllamaVisionBackend, WhisperBackend};
use lanca_jobs::{
    AudioStrategy, CsvStrategy, HttpCurrencyConverter, ImageStrategy, OfxStrategy,
    OutboundSender, PdfStrategy, PipelineHandler, SenderConfig, StrategyRegistry, TextStrategy,
    WorkerBuilder, WorkerConfig, XlsxStrategy,
};
use lanca_session::RedisSessionStore;

use state::AppState;
use transport::{HttpReplyTransport, LogReplyTransport};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            "lanca_api=info,lanca_jobs=info,lanca_db=info,lanca_session=info".into()
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // ── Database ───────────────────────────────────────────────────────
    let database_url = std::env::var("DATABASE_URL")
        .unwrap_or_else(|_| "postgres://localhost/lanca".to_string());
    let pool = lanca_db::create_pool(&database_url).await?;
    lanca_db::MIGRATOR.run(&pool).await?;

    let jobs = Arc::new(PgJobQueue::new(pool.clone()));
    let outbound = Arc::new(PgOutboundQueue::new(pool.clone()));
    let transactions = Arc::new(PgTransactionRepository::new(pool.clone()));

    // ── Session store ──────────────────────────────────────────────────
    let sessions = Arc::new(RedisSessionStore::from_env().await);

    // ── Model backends & strategies ────────────────────────────────────
    let ollama = Arc::new(OllamaBackend::from_env());
    let gen: Arc<dyn GenerationBackend> = ollama.clone();
    let embedder: Arc<dyn EmbeddingBackend> = ollama.clone();

    let pdf_strategy = Arc::new(PdfStrategy::new(gen.clone()));

    let mut registry = StrategyRegistry::new();
    registry.register(Arc::new(TextStrategy::new(gen.clone())));
    registry.register(Arc::new(CsvStrategy::new(gen.clone())));
    registry.register(Arc::new(XlsxStrategy::new(gen.clone())));
    registry.register(Arc::new(OfxStrategy));
    registry.register(pdf_strategy.clone());

    match OllamaVisionBackend::from_env() {
        Some(vision) => registry.register(Arc::new(ImageStrategy::new(Arc::new(vision)))),
        None => warn!("OLLAMA_VISION_MODEL unset, image jobs will be answered as unsupported"),
    }
    match WhisperBackend::from_env() {
        Some(whisper) => {
            registry.register(Arc::new(AudioStrategy::new(Arc::new(whisper), gen.clone())))
        }
        None => warn!("WHISPER_BASE_URL unset, audio jobs will be answered as unsupported"),
    }

    let registry = Arc::new(registry);

    // ── Pipeline & workers ─────────────────────────────────────────────
    let mut pipeline = PipelineHandler::new(
        registry.clone(),
        pdf_strategy,
        sessions.clone(),
        transactions,
        outbound.clone(),
    )
    .with_embedder(embedder);

    if let Some(converter) = HttpCurrencyConverter::from_env() {
        pipeline = pipeline.with_converter(Arc::new(converter));
    } else {
        info!("EXCHANGE_RATE_URL unset, foreign-currency values stored unconverted");
    }

    let worker = WorkerBuilder::new(jobs.clone())
        .with_config(WorkerConfig::from_env())
        .with_handler(pipeline)
        .build()
        .await;
    let worker_handle = worker.start();

    let transport: Arc<dyn lanca_core::ReplyTransport> = match HttpReplyTransport::from_env() {
        Some(transport) => Arc::new(transport),
        None => {
            warn!("CHANNEL_SEND_URL unset, replies go to the log only");
            Arc::new(LogReplyTransport)
        }
    };
    let sender = OutboundSender::new(outbound.clone(), transport, SenderConfig::from_env());
    let sender_handle = sender.start();

    // ── HTTP intake ────────────────────────────────────────────────────
    let app_state = AppState {
        pool,
        jobs,
        outbound,
        sessions,
        registry,
    };

    let app = Router::new()
        .route("/health", get(routes::health))
        .route("/v1/inbound", post(routes::inbound))
        .route("/v1/session/:user_id/reset", post(routes::reset_session))
        .route("/v1/queue/stats", get(routes::queue_stats))
        .route("/v1/jobs", get(routes::list_jobs))
        .layer(TraceLayer::new_for_http())
        .with_state(app_state);

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(defaults::SERVER_PORT);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "lanca intake server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown signal received");
        })
        .await?;

    // Drain workers before exit.
    let _ = worker_handle.shutdown().await;
    let _ = sender_handle.shutdown().await;
    Ok(())
}
