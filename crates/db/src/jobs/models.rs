use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Pending,
    Started,
    Done,
    Failed,
}

impl JobState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Started => "started",
            Self::Done => "done",
            Self::Failed => "failed",
        }
    }
}

impl FromStr for JobState {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "pending" => Ok(Self::Pending),
            "started" => Ok(Self::Started),
            "done" => Ok(Self::Done),
            "failed" => Ok(Self::Failed),
            _ => Err(format!("unknown job state: {value}")),
        }
    }
}

/// A unit of deferred work as stored by the queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueuedJob {
    pub id: Uuid,
    pub channel: String,
    /// Name of the job function the worker dispatches on.
    pub name: String,
    pub args: serde_json::Value,
    /// Opaque hook resolving the job back to the local record it touched.
    pub related_action: Option<serde_json::Value>,
    pub state: JobState,
    pub attempts: i32,
    pub max_retries: i32,
    pub eta: Option<DateTime<Utc>>,
    pub result: Option<String>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewJob {
    pub channel: String,
    pub name: String,
    pub args: serde_json::Value,
    pub related_action: Option<serde_json::Value>,
    pub eta: Option<DateTime<Utc>>,
    pub max_retries: i32,
}

/// Delay before the first retry of a failed job; doubles with each attempt.
pub const RETRY_BASE_SECS: i64 = 10;
pub const RETRY_MAX_SECS: i64 = 3600;

/// A `started` job not updated for this long is treated as abandoned and can be
/// claimed again.
pub const STARTED_LEASE_SECS: i64 = 1800;

/// Backoff applied to a re-queued job after its `attempts`-th run failed.
pub fn retry_delay(attempts: i32) -> Duration {
    let exponent = attempts.saturating_sub(1).clamp(0, 20) as u32;
    Duration::seconds((RETRY_BASE_SECS << exponent).min(RETRY_MAX_SECS))
}
