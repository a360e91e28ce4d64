//! Job handler contract between the worker pool and the pipeline.

use async_trait::async_trait;
use serde_json::Value as JsonValue;

use lanca_core::{Job, JobKind};

/// Context provided to job handlers.
pub struct JobContext {
    /// The job being processed.
    pub job: Job,
    /// True only on the job's final delivery; handlers use this to decide
    /// whether a failure should notify the user.
    pub final_attempt: bool,
}

impl JobContext {
    pub fn new(job: Job) -> Self {
        let final_attempt = job.retry_count >= job.max_retries;
        Self { job, final_attempt }
    }
}

/// Result of job execution.
#[derive(Debug)]
pub enum JobResult {
    /// Job completed successfully with optional result data.
    Success(Option<JsonValue>),
    /// Job failed; the queue decides between backoff redelivery and parking.
    Failed(String),
}

/// Trait for job handlers.
#[async_trait]
pub trait JobHandler: Send + Sync {
    /// The job kinds this handler processes.
    fn job_kinds(&self) -> Vec<JobKind>;

    /// Execute the job.
    async fn execute(&self, ctx: JobContext) -> JobResult;

    /// Check if this handler can process the given job kind.
    fn can_handle(&self, kind: JobKind) -> bool {
        self.job_kinds().contains(&kind)
    }
}

/// No-op handler for testing.
pub struct NoOpHandler {
    kinds: Vec<JobKind>,
}

impl NoOpHandler {
    pub fn new(kinds: Vec<JobKind>) -> Self {
        Self { kinds }
    }
}

#[async_trait]
impl JobHandler for NoOpHandler {
    fn job_kinds(&self) -> Vec<JobKind> {
        self.kinds.clone()
    }

    async fn execute(&self, _ctx: JobContext) -> JobResult {
        JobResult::Success(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use lanca_core::{InboundPayload, JobStatus};
    use uuid::Uuid;

    fn make_job(retry_count: i32, max_retries: i32) -> Job {
        Job {
            id: Uuid::new_v4(),
            kind: JobKind::Text,
            status: JobStatus::Running,
            chat_id: "chat-1".into(),
            user_id: "user-1".into(),
            priority: 0,
            payload: InboundPayload::default(),
            result: None,
            error_message: None,
            retry_count,
            max_retries,
            run_at: Utc::now(),
            created_at: Utc::now(),
            started_at: Some(Utc::now()),
            completed_at: None,
        }
    }

    #[test]
    fn test_context_flags_final_attempt() {
        assert!(!JobContext::new(make_job(0, 3)).final_attempt);
        assert!(!JobContext::new(make_job(2, 3)).final_attempt);
        assert!(JobContext::new(make_job(3, 3)).final_attempt);
    }

    #[tokio::test]
    async fn test_noop_handler() {
        let handler = NoOpHandler::new(vec![JobKind::Text, JobKind::Csv]);
        assert!(handler.can_handle(JobKind::Text));
        assert!(handler.can_handle(JobKind::Csv));
        assert!(!handler.can_handle(JobKind::Pdf));

        let result = handler.execute(JobContext::new(make_job(0, 3))).await;
        assert!(matches!(result, JobResult::Success(None)));
    }
}
