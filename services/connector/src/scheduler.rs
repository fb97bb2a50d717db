use chrono::{DateTime, Duration, Utc};

use catsync_common::error::CatsyncResult;
use catsync_db::backend::models::Backend;
use catsync_db::backend::repositories::BackendRepository;
use catsync_db::jobs::repositories::JobQueue;

use crate::jobs::{submit, JobDescriptor};

/// Seconds the next window reaches back before the tick that opened it, so
/// records committed around the tick are caught again.
pub const WATERMARK_OVERLAP_SECS: i64 = 30;

/// `now - 30s`, never moving an existing watermark backwards.
pub fn next_watermark(now: DateTime<Utc>, current: Option<DateTime<Utc>>) -> DateTime<Utc> {
    let candidate = now - Duration::seconds(WATERMARK_OVERLAP_SECS);
    match current {
        Some(current) if current > candidate => current,
        _ => candidate,
    }
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct TickResult {
    pub enqueued: usize,
    pub errors: usize,
}

#[derive(Debug, Clone, Copy)]
enum Watermark {
    ProductExport,
    CategoryImport,
}

/// Periodic fan-out of batch jobs, one per backend, each advancing that
/// backend's watermark once its job is queued.
pub struct BatchScheduler<B, Q> {
    backends: B,
    queue: Q,
}

impl<B, Q> BatchScheduler<B, Q>
where
    B: BackendRepository,
    Q: JobQueue,
{
    pub fn new(backends: B, queue: Q) -> Self {
        Self { backends, queue }
    }

    /// Enqueue product export batches for every auto-export backend.
    pub async fn export_products(&self, now: DateTime<Utc>) -> CatsyncResult<TickResult> {
        let backends = self.backends.list_auto_export().await?;
        let result = self
            .fan_out(&backends, now, Watermark::ProductExport)
            .await;
        tracing::info!(?result, "product export tick completed");
        Ok(result)
    }

    /// Enqueue category import batches for every backend.
    pub async fn import_categories(&self, now: DateTime<Utc>) -> CatsyncResult<TickResult> {
        let backends = self.backends.list_all().await?;
        let result = self
            .fan_out(&backends, now, Watermark::CategoryImport)
            .await;
        tracing::info!(?result, "category import tick completed");
        Ok(result)
    }

    async fn fan_out(&self, backends: &[Backend], now: DateTime<Utc>, kind: Watermark) -> TickResult {
        let mut result = TickResult::default();

        for backend in backends {
            let current = match kind {
                Watermark::ProductExport => backend.export_products_from_date,
                Watermark::CategoryImport => backend.import_categories_from_date,
            };
            let descriptor = match kind {
                Watermark::ProductExport => JobDescriptor::export_product_batch(backend, current),
                Watermark::CategoryImport => {
                    JobDescriptor::import_category_batch(backend, current, Some(now))
                }
            };

            if let Err(e) = submit(&self.queue, descriptor).await {
                tracing::warn!(
                    backend_id = %backend.id,
                    error = %e,
                    "failed to enqueue batch job, watermark left unchanged"
                );
                result.errors += 1;
                continue;
            }

            let watermark = next_watermark(now, current);
            let written = match kind {
                Watermark::ProductExport => {
                    self.backends
                        .set_export_watermark(backend.id, watermark)
                        .await
                }
                Watermark::CategoryImport => {
                    self.backends
                        .set_category_import_watermark(backend.id, watermark)
                        .await
                }
            };
            match written {
                Ok(()) => {
                    tracing::debug!(backend_id = %backend.id, %watermark, "watermark advanced");
                    result.enqueued += 1;
                }
                Err(e) => {
                    tracing::warn!(
                        backend_id = %backend.id,
                        error = %e,
                        "batch job queued but watermark write failed"
                    );
                    result.errors += 1;
                }
            }
        }

        result
    }
}
