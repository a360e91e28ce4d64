//! Outbound sender pool: drains the reply queue into the channel transport.
//!
//! Kept separate from the extraction workers so a slow or flapping channel
//! never backs up into extraction. Per-chat ordering is best-effort.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use lanca_core::defaults;
use lanca_core::{OutboundMessage, OutboundPayload, OutboundQueue, ReplyTransport, Result};

/// Configuration for the outbound sender pool.
#[derive(Debug, Clone)]
pub struct SenderConfig {
    /// Polling interval in milliseconds.
    pub poll_interval_ms: u64,
    /// Maximum number of concurrent sends.
    pub max_concurrent_sends: usize,
}

impl Default for SenderConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: defaults::OUTBOUND_POLL_INTERVAL_MS,
            max_concurrent_sends: defaults::OUTBOUND_MAX_CONCURRENT,
        }
    }
}

impl SenderConfig {
    /// Create config from environment variables (with defaults).
    ///
    /// | Variable | Default |
    /// |----------|---------|
    /// | `OUTBOUND_MAX_CONCURRENT` | `5` |
    /// | `OUTBOUND_POLL_INTERVAL_MS` | `250` |
    pub fn from_env() -> Self {
        let max_concurrent_sends = std::env::var("OUTBOUND_MAX_CONCURRENT")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(defaults::OUTBOUND_MAX_CONCURRENT)
            .max(1);

        let poll_interval_ms = std::env::var("OUTBOUND_POLL_INTERVAL_MS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(defaults::OUTBOUND_POLL_INTERVAL_MS);

        Self {
            poll_interval_ms,
            max_concurrent_sends,
        }
    }
}

/// Handle for stopping a running sender pool.
pub struct SenderHandle {
    shutdown_tx: mpsc::Sender<()>,
}

impl SenderHandle {
    /// Signal the sender to shut down gracefully.
    pub async fn shutdown(&self) -> Result<()> {
        self.shutdown_tx
            .send(())
            .await
            .map_err(|_| lanca_core::Error::Internal("Failed to send shutdown signal".into()))?;
        Ok(())
    }
}

/// Worker pool draining the outbound queue through the reply transport.
pub struct OutboundSender {
    queue: Arc<dyn OutboundQueue>,
    transport: Arc<dyn ReplyTransport>,
    config: SenderConfig,
}

impl OutboundSender {
    pub fn new(
        queue: Arc<dyn OutboundQueue>,
        transport: Arc<dyn ReplyTransport>,
        config: SenderConfig,
    ) -> Self {
        Self {
            queue,
            transport,
            config,
        }
    }

    /// Start the sender loop and return a shutdown handle.
    pub fn start(self) -> SenderHandle {
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel(1);
        let sender = Arc::new(self);

        tokio::spawn(async move {
            sender.run(&mut shutdown_rx).await;
        });

        SenderHandle { shutdown_tx }
    }

    async fn run(&self, shutdown_rx: &mut mpsc::Receiver<()>) {
        info!(
            max_concurrent = self.config.max_concurrent_sends,
            "Outbound sender started"
        );

        let poll_interval = Duration::from_millis(self.config.poll_interval_ms);

        loop {
            if shutdown_rx.try_recv().is_ok() {
                info!("Outbound sender received shutdown signal");
                break;
            }

            let mut claimed = 0;
            let mut tasks = tokio::task::JoinSet::new();

            for _ in 0..self.config.max_concurrent_sends {
                match self.queue.claim_next().await {
                    Ok(Some(message)) => {
                        claimed += 1;
                        let queue = self.queue.clone();
                        let transport = self.transport.clone();
                        tasks.spawn(async move {
                            deliver(queue, transport, message).await;
                        });
                    }
                    Ok(None) => break,
                    Err(e) => {
                        error!(error = ?e, "Failed to claim outbound message");
                        break;
                    }
                }
            }

            if claimed == 0 {
                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        info!("Outbound sender received shutdown signal");
                        break;
                    }
                    _ = sleep(poll_interval) => {}
                }
            } else {
                debug!(claimed, "Delivering outbound batch");
                while let Some(result) = tasks.join_next().await {
                    if let Err(e) = result {
                        error!(error = ?e, "Send task panicked");
                    }
                }
            }
        }

        info!("Outbound sender stopped");
    }
}

/// Deliver one reply, acknowledging or re-scheduling it on the queue.
async fn deliver(
    queue: Arc<dyn OutboundQueue>,
    transport: Arc<dyn ReplyTransport>,
    message: OutboundMessage,
) {
    let send_result = match &message.payload {
        OutboundPayload::Text { body } => transport.send_text(&message.chat_id, body).await,
        OutboundPayload::Media {
            mimetype,
            data,
            filename,
        } => {
            transport
                .send_media(&message.chat_id, mimetype, data, filename)
                .await
        }
    };

    match send_result {
        Ok(()) => {
            if let Err(e) = queue.complete(message.id).await {
                error!(error = ?e, message_id = %message.id, "Failed to ack delivered reply");
            } else {
                debug!(message_id = %message.id, chat_id = %message.chat_id, "Reply delivered");
            }
        }
        Err(e) => {
            warn!(
                message_id = %message.id,
                chat_id = %message.chat_id,
                error = %e,
                "Send failed, re-scheduling"
            );
            if let Err(fail_err) = queue.fail(message.id, &e.to_string()).await {
                error!(error = ?fail_err, message_id = %message.id, "Failed to re-schedule reply");
            }
        }
    }
}
