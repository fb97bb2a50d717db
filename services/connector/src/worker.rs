use uuid::Uuid;

use catsync_common::error::{CatsyncError, CatsyncResult};
use catsync_db::backend::repositories::BackendRepository;
use catsync_db::binding::repositories::CategoryBindingRepository;
use catsync_db::jobs::models::QueuedJob;
use catsync_db::jobs::repositories::JobQueue;

use crate::batch::CategoryBatchImporter;
use crate::importer::{CategoryImporter, ImportError};
use crate::jobs::{decode, resolve_related_action, CatalogJob};
use crate::magento::error::RemoteError;
use crate::magento::factory::AdapterFactory;

#[derive(Debug, thiserror::Error)]
pub enum JobError {
    #[error("cannot decode job: {0}")]
    Decode(String),

    #[error("backend {0} does not exist")]
    BackendMissing(Uuid),

    #[error("no handler for {0} on this worker")]
    Unhandled(String),

    #[error(transparent)]
    Import(#[from] ImportError),

    #[error(transparent)]
    Remote(#[from] RemoteError),

    #[error(transparent)]
    Storage(#[from] CatsyncError),
}

impl JobError {
    pub fn is_terminal(&self) -> bool {
        match self {
            Self::Decode(_) | Self::BackendMissing(_) | Self::Unhandled(_) => true,
            Self::Import(err) => err.is_terminal(),
            Self::Remote(err) => err.is_terminal(),
            Self::Storage(_) => false,
        }
    }
}

/// Runs queued category import jobs, one at a time.
pub struct JobWorker<B, R, Q, F> {
    backends: B,
    bindings: R,
    queue: Q,
    factory: F,
}

impl<B, R, Q, F> JobWorker<B, R, Q, F>
where
    B: BackendRepository,
    R: CategoryBindingRepository,
    Q: JobQueue,
    F: AdapterFactory,
{
    pub fn new(backends: B, bindings: R, queue: Q, factory: F) -> Self {
        Self {
            backends,
            bindings,
            queue,
            factory,
        }
    }

    /// Claim and run the next due job on `channel`. Returns the job in its final
    /// state, or `None` when nothing was due.
    pub async fn run_once(&self, channel: &str) -> CatsyncResult<Option<QueuedJob>> {
        let job = match self.queue.claim_next(channel).await? {
            Some(job) => job,
            None => return Ok(None),
        };

        tracing::info!(job_id = %job.id, channel, name = %job.name, attempt = job.attempts, "job started");

        let finished = match self.execute(&job).await {
            Ok(summary) => {
                let done = self.queue.mark_done(job.id, Some(&summary)).await?;
                if let Some(category_id) = resolve_related_action(&done, &self.bindings).await? {
                    tracing::info!(job_id = %job.id, %category_id, %summary, "job done");
                } else {
                    tracing::info!(job_id = %job.id, %summary, "job done");
                }
                done
            }
            Err(e) => {
                let retryable = !e.is_terminal();
                let failed = self
                    .queue
                    .mark_failed(job.id, &e.to_string(), retryable)
                    .await?;
                tracing::error!(
                    job_id = %job.id,
                    channel,
                    error = %e,
                    retryable,
                    state = failed.state.as_str(),
                    "job failed"
                );
                failed
            }
        };
        Ok(Some(finished))
    }

    async fn execute(&self, job: &QueuedJob) -> Result<String, JobError> {
        let decoded = decode(job).map_err(JobError::Decode)?;
        let backend_id = decoded.backend_id();
        let backend = self
            .backends
            .get_by_id(backend_id)
            .await?
            .ok_or(JobError::BackendMissing(backend_id))?;

        match decoded {
            CatalogJob::ImportCategory {
                external_id,
                force,
                import_child,
                ..
            } => {
                let adapter = self.factory.adapter_for(&backend)?;
                let outcome = CategoryImporter::new(&backend, adapter, &self.bindings)
                    .run(external_id, force, import_child)
                    .await?;
                Ok(outcome.summary())
            }
            CatalogJob::ImportCategoryBatch {
                from_date, to_date, ..
            } => {
                let adapter = self.factory.adapter_for(&backend)?;
                let enqueued = CategoryBatchImporter::new(&backend, adapter, &self.queue)
                    .run(from_date, to_date)
                    .await?;
                Ok(format!("{enqueued} category imports enqueued"))
            }
            other => Err(JobError::Unhandled(other.function().to_string())),
        }
    }
}
