use async_trait::async_trait;
use uuid::Uuid;

use crate::jobs::models::{NewJob, QueuedJob};
use catsync_common::error::CatsyncResult;

/// Submission side of the job queue plus the bookkeeping a worker needs.
#[async_trait]
pub trait JobQueue: Send + Sync {
    async fn enqueue(&self, job: NewJob) -> CatsyncResult<QueuedJob>;

    async fn get_by_id(&self, id: Uuid) -> CatsyncResult<Option<QueuedJob>>;

    /// Atomically move the oldest due job on `channel` to `started`. Due means
    /// pending with a past or empty `eta`, or started and not updated within
    /// `STARTED_LEASE_SECS`.
    async fn claim_next(&self, channel: &str) -> CatsyncResult<Option<QueuedJob>>;

    async fn mark_done(&self, id: Uuid, result: Option<&str>) -> CatsyncResult<QueuedJob>;

    /// Record a failure. Retryable failures go back to `pending` while attempts
    /// remain, with `eta` pushed out by `retry_delay(attempts)`.
    async fn mark_failed(&self, id: Uuid, error: &str, retryable: bool)
        -> CatsyncResult<QueuedJob>;
}
