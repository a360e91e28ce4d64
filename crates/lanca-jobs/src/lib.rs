//! # lanca-jobs
//!
//! The processing heart of lanca: worker pools over the durable queues,
//! one extraction strategy per input kind, and the orchestrator that wires
//! strategy output through normalization, enrichment, the confidence gate,
//! persistence, and the outbound reply queue.
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use lanca_jobs::{PipelineHandler, StrategyRegistry, WorkerBuilder, WorkerConfig};
//!
//! let worker = WorkerBuilder::new(queue)
//!     .with_config(WorkerConfig::from_env())
//!     .with_handler(pipeline)
//!     .build()
//!     .await;
//!
//! let handle = worker.start();
//! // ...
//! handle.shutdown().await?;
//! ```

pub mod confidence;
pub mod enrich;
pub mod handler;
pub mod normalize;
pub mod outbound;
pub mod pipeline;
pub mod prompts;
pub mod registry;
pub mod strategies;
pub mod worker;

// Re-export core types
pub use lanca_core::*;

pub use confidence::gate;
pub use enrich::{Enrichment, FixedRateConverter, HttpCurrencyConverter};
pub use handler::{JobContext, JobHandler, JobResult, NoOpHandler};
pub use normalize::normalize;
pub use outbound::{OutboundSender, SenderConfig, SenderHandle};
pub use pipeline::PipelineHandler;
pub use registry::StrategyRegistry;
pub use strategies::{
    AudioStrategy, CsvStrategy, ImageStrategy, OfxStrategy, PdfPasswordEntry, PdfStrategy,
    TextStrategy, XlsxStrategy,
};
pub use worker::{JobWorker, WorkerBuilder, WorkerConfig, WorkerEvent, WorkerHandle};
