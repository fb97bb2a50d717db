use std::str::FromStr;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use sqlx::{postgres::PgRow, PgPool, Row};
use uuid::Uuid;

use crate::jobs::models::{retry_delay, JobState, NewJob, QueuedJob, STARTED_LEASE_SECS};
use crate::jobs::repositories::JobQueue;
use catsync_common::error::{CatsyncError, CatsyncResult};

const JOB_COLUMNS: &str = "id, channel, name, args, related_action, state, attempts, \
     max_retries, eta, result, error, created_at, updated_at";

#[derive(Clone)]
pub struct PgJobQueue {
    pool: PgPool,
}

impl PgJobQueue {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn map_row(row: PgRow) -> CatsyncResult<QueuedJob> {
        let state_raw: String = row.get("state");
        let state = JobState::from_str(&state_raw).map_err(CatsyncError::Internal)?;

        Ok(QueuedJob {
            id: row.get("id"),
            channel: row.get("channel"),
            name: row.get("name"),
            args: row.get("args"),
            related_action: row.get("related_action"),
            state,
            attempts: row.get("attempts"),
            max_retries: row.get("max_retries"),
            eta: row.get("eta"),
            result: row.get("result"),
            error: row.get("error"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        })
    }
}

#[async_trait]
impl JobQueue for PgJobQueue {
    async fn enqueue(&self, job: NewJob) -> CatsyncResult<QueuedJob> {
        let sql = format!(
            "insert into queue_jobs (id, channel, name, args, related_action, eta, max_retries)
             values ($1, $2, $3, $4, $5, $6, $7)
             returning {JOB_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(Uuid::new_v4())
            .bind(&job.channel)
            .bind(&job.name)
            .bind(&job.args)
            .bind(&job.related_action)
            .bind(job.eta)
            .bind(job.max_retries)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| CatsyncError::Database(e.to_string()))?;

        Self::map_row(row)
    }

    async fn get_by_id(&self, id: Uuid) -> CatsyncResult<Option<QueuedJob>> {
        let sql = format!("select {JOB_COLUMNS} from queue_jobs where id = $1");
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| CatsyncError::Database(e.to_string()))?;

        row.map(Self::map_row).transpose()
    }

    async fn claim_next(&self, channel: &str) -> CatsyncResult<Option<QueuedJob>> {
        let sql = format!(
            "update queue_jobs
             set state = 'started', attempts = attempts + 1, updated_at = $1
             where id = (
               select id from queue_jobs
               where channel = $2
                 and ((state = 'pending' and (eta is null or eta <= $1))
                      or (state = 'started' and updated_at < $3))
               order by created_at
               limit 1
               for update skip locked
             )
             returning {JOB_COLUMNS}"
        );
        let now = Utc::now();
        let row = sqlx::query(&sql)
            .bind(now)
            .bind(channel)
            .bind(now - Duration::seconds(STARTED_LEASE_SECS))
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| CatsyncError::Database(e.to_string()))?;

        row.map(Self::map_row).transpose()
    }

    async fn mark_done(&self, id: Uuid, result: Option<&str>) -> CatsyncResult<QueuedJob> {
        let sql = format!(
            "update queue_jobs
             set state = 'done', result = $1, error = null, updated_at = $2
             where id = $3
             returning {JOB_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(result)
            .bind(Utc::now())
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| CatsyncError::Database(e.to_string()))?
            .ok_or_else(|| CatsyncError::NotFound(format!("job not found: {id}")))?;

        Self::map_row(row)
    }

    async fn mark_failed(
        &self,
        id: Uuid,
        error: &str,
        retryable: bool,
    ) -> CatsyncResult<QueuedJob> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| CatsyncError::Database(e.to_string()))?;

        let attempts: i32 =
            sqlx::query_scalar("select attempts from queue_jobs where id = $1 for update")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await
                .map_err(|e| CatsyncError::Database(e.to_string()))?
                .ok_or_else(|| CatsyncError::NotFound(format!("job not found: {id}")))?;

        let now = Utc::now();
        let sql = format!(
            "update queue_jobs
             set state = case when $1 and attempts < max_retries then 'pending' else 'failed' end,
                 eta = case when $1 and attempts < max_retries then $2 else eta end,
                 error = $3, updated_at = $4
             where id = $5
             returning {JOB_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(retryable)
            .bind(now + retry_delay(attempts))
            .bind(error)
            .bind(now)
            .bind(id)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| CatsyncError::Database(e.to_string()))?;

        tx.commit()
            .await
            .map_err(|e| CatsyncError::Database(e.to_string()))?;

        Self::map_row(row)
    }
}
