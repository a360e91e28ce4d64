//! Centralized defaults for lanca.
//!
//! Every tunable the pipeline reads from the environment has its fallback
//! here, so operational defaults live in one place instead of being
//! scattered across `from_env()` call sites.

// ─── Job queue ─────────────────────────────────────────────────────────────

/// Maximum retries before a job is parked as failed.
pub const JOB_MAX_RETRIES: i32 = 3;

/// Polling interval when the inbound queue is empty (milliseconds).
pub const JOB_POLL_INTERVAL_MS: u64 = 500;

/// Maximum concurrent inbound jobs per worker.
pub const JOB_MAX_CONCURRENT: usize = 4;

/// Hard per-job execution timeout (seconds).
pub const JOB_TIMEOUT_SECS: u64 = 300;

/// Base delay for exponential retry backoff (seconds).
/// Attempt n is re-scheduled `JOB_RETRY_BASE_SECS * 2^n` seconds out.
pub const JOB_RETRY_BASE_SECS: i64 = 30;

/// Worker event bus capacity.
pub const EVENT_BUS_CAPACITY: usize = 256;

// ─── Outbound reply queue ──────────────────────────────────────────────────

/// Maximum concurrent outbound sends.
pub const OUTBOUND_MAX_CONCURRENT: usize = 5;

/// Polling interval when the outbound queue is empty (milliseconds).
pub const OUTBOUND_POLL_INTERVAL_MS: u64 = 250;

/// Maximum retries for a failed send.
pub const OUTBOUND_MAX_RETRIES: i32 = 5;

// ─── Session store ─────────────────────────────────────────────────────────

/// Conversation context TTL (one day).
pub const SESSION_CONTEXT_TTL_SECS: u64 = 86_400;

/// Maximum conversation turns kept per user; oldest dropped first.
pub const SESSION_CONTEXT_MAX_TURNS: usize = 10;

/// TTL for a password-protected PDF awaiting its password.
pub const SESSION_PDF_TTL_SECS: u64 = 300;

// ─── Confidence gate ───────────────────────────────────────────────────────

/// Batches at or above this model-reported score are stored as confirmed.
pub const CONFIDENCE_THRESHOLD: f64 = 0.8;

/// Score assumed when the model omits one. Below the threshold, so
/// scoreless batches always land in the review queue.
pub const CONFIDENCE_DEFAULT: f64 = 0.0;

// ─── Currency ──────────────────────────────────────────────────────────────

/// Home currency; items in anything else get a conversion lookup.
pub const HOME_CURRENCY: &str = "BRL";

/// Timeout for the exchange-rate lookup (seconds).
pub const CURRENCY_TIMEOUT_SECS: u64 = 10;

// ─── Inference backends ────────────────────────────────────────────────────

/// Default Ollama server URL.
pub const OLLAMA_URL: &str = "http://127.0.0.1:11434";

/// Default generation model.
pub const GEN_MODEL: &str = "qwen3:8b";

/// Generation request timeout (seconds).
pub const GEN_TIMEOUT_SECS: u64 = 120;

/// Default embedding model.
pub const EMBED_MODEL: &str = "nomic-embed-text";

/// Expected embedding dimension.
pub const EMBED_DIMENSION: usize = 768;

/// Embedding request timeout (seconds).
pub const EMBED_TIMEOUT_SECS: u64 = 30;

/// Env var selecting the vision model; vision is disabled when unset.
pub const ENV_OLLAMA_VISION_MODEL: &str = "OLLAMA_VISION_MODEL";

/// Default vision model when the env var is set but empty.
pub const DEFAULT_OLLAMA_VISION_MODEL: &str = "qwen3-vl:8b";

/// Env var for the Whisper-compatible transcription server.
pub const ENV_WHISPER_BASE_URL: &str = "WHISPER_BASE_URL";

/// Env var for the transcription model name.
pub const ENV_WHISPER_MODEL: &str = "WHISPER_MODEL";

/// Default transcription model.
pub const DEFAULT_WHISPER_MODEL: &str = "Systran/faster-whisper-small";

// ─── External commands ─────────────────────────────────────────────────────

/// Timeout for external extraction commands (pdftotext, pdfinfo).
pub const EXTRACTION_CMD_TIMEOUT_SECS: u64 = 60;

// ─── Intake server ─────────────────────────────────────────────────────────

/// Default HTTP port for the intake server.
pub const SERVER_PORT: u16 = 3000;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_confidence_default_below_threshold() {
        // A scoreless batch must never auto-confirm.
        assert!(CONFIDENCE_DEFAULT < CONFIDENCE_THRESHOLD);
    }

    #[test]
    fn test_pdf_ttl_shorter_than_context_ttl() {
        assert!(SESSION_PDF_TTL_SECS < SESSION_CONTEXT_TTL_SECS);
    }

    #[test]
    fn test_retry_backoff_is_positive() {
        assert!(JOB_RETRY_BASE_SECS > 0);
        assert!(JOB_MAX_RETRIES > 0);
    }
}
