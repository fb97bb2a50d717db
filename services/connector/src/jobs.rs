use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use catsync_common::error::{CatsyncError, CatsyncResult};
use catsync_db::backend::models::Backend;
use catsync_db::binding::repositories::CategoryBindingRepository;
use catsync_db::jobs::models::{NewJob, QueuedJob};
use catsync_db::jobs::repositories::JobQueue;

use crate::magento::record::RemoteId;

pub const IMPORT_CATEGORY: &str = "import_category";
pub const IMPORT_CATEGORY_BATCH: &str = "import_category_batch";
pub const EXPORT_PRODUCT_BATCH: &str = "export_product_batch";

pub const DEFAULT_MAX_RETRIES: i32 = 5;

/// Arguments of every job function this connector submits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "function", rename_all = "snake_case")]
pub enum CatalogJob {
    ImportCategory {
        backend_id: Uuid,
        external_id: RemoteId,
        force: bool,
        import_child: bool,
    },
    ImportCategoryBatch {
        backend_id: Uuid,
        from_date: Option<DateTime<Utc>>,
        to_date: Option<DateTime<Utc>>,
    },
    /// Consumed by the product exporter, outside this service.
    ExportProductBatch {
        backend_id: Uuid,
        from_date: Option<DateTime<Utc>>,
    },
}

impl CatalogJob {
    pub fn function(&self) -> &'static str {
        match self {
            Self::ImportCategory { .. } => IMPORT_CATEGORY,
            Self::ImportCategoryBatch { .. } => IMPORT_CATEGORY_BATCH,
            Self::ExportProductBatch { .. } => EXPORT_PRODUCT_BATCH,
        }
    }

    pub fn backend_id(&self) -> Uuid {
        match self {
            Self::ImportCategory { backend_id, .. }
            | Self::ImportCategoryBatch { backend_id, .. }
            | Self::ExportProductBatch { backend_id, .. } => *backend_id,
        }
    }
}

/// Hook from a job back to the local record it produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum RelatedAction {
    OpenCategoryBinding { backend_id: Uuid, external_id: String },
}

#[derive(Debug, Clone)]
pub struct JobDescriptor {
    pub function: &'static str,
    pub channel: String,
    pub job: CatalogJob,
    pub related_action: Option<RelatedAction>,
    pub eta: Option<DateTime<Utc>>,
    pub max_retries: i32,
}

impl JobDescriptor {
    fn new(channel: String, job: CatalogJob) -> Self {
        Self {
            function: job.function(),
            channel,
            job,
            related_action: None,
            eta: None,
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }

    pub fn import_category(
        backend: &Backend,
        external_id: RemoteId,
        force: bool,
        import_child: bool,
    ) -> Self {
        let mut descriptor = Self::new(
            backend.job_channel(),
            CatalogJob::ImportCategory {
                backend_id: backend.id,
                external_id,
                force,
                import_child,
            },
        );
        descriptor.related_action = Some(RelatedAction::OpenCategoryBinding {
            backend_id: backend.id,
            external_id: external_id.to_string(),
        });
        descriptor
    }

    pub fn import_category_batch(
        backend: &Backend,
        from_date: Option<DateTime<Utc>>,
        to_date: Option<DateTime<Utc>>,
    ) -> Self {
        Self::new(
            backend.job_channel(),
            CatalogJob::ImportCategoryBatch {
                backend_id: backend.id,
                from_date,
                to_date,
            },
        )
    }

    /// Export batches run on their own `<channel>.export` sub-channel.
    pub fn export_product_batch(backend: &Backend, from_date: Option<DateTime<Utc>>) -> Self {
        Self::new(
            format!("{}.export", backend.job_channel()),
            CatalogJob::ExportProductBatch {
                backend_id: backend.id,
                from_date,
            },
        )
    }

    pub fn into_new_job(self) -> Result<NewJob, serde_json::Error> {
        Ok(NewJob {
            channel: self.channel,
            name: self.function.to_string(),
            args: serde_json::to_value(&self.job)?,
            related_action: self
                .related_action
                .as_ref()
                .map(serde_json::to_value)
                .transpose()?,
            eta: self.eta,
            max_retries: self.max_retries,
        })
    }
}

/// Enqueue without waiting for the job to run.
pub async fn submit<Q>(queue: &Q, descriptor: JobDescriptor) -> CatsyncResult<QueuedJob>
where
    Q: JobQueue + ?Sized,
{
    let channel = descriptor.channel.clone();
    let job = descriptor
        .into_new_job()
        .map_err(|e| CatsyncError::Internal(format!("failed to encode job: {e}")))?;
    let queued = queue.enqueue(job).await?;
    tracing::debug!(job_id = %queued.id, channel = %channel, name = %queued.name, "job enqueued");
    Ok(queued)
}

/// Decode stored arguments, checking they belong to the stored function name.
pub fn decode(job: &QueuedJob) -> Result<CatalogJob, String> {
    let decoded: CatalogJob =
        serde_json::from_value(job.args.clone()).map_err(|e| format!("invalid job args: {e}"))?;
    if decoded.function() != job.name {
        return Err(format!(
            "job named {} carries {} arguments",
            job.name,
            decoded.function()
        ));
    }
    Ok(decoded)
}

/// Local category touched by the job, if its binding exists yet.
pub async fn resolve_related_action<R>(
    job: &QueuedJob,
    bindings: &R,
) -> CatsyncResult<Option<Uuid>>
where
    R: CategoryBindingRepository + ?Sized,
{
    let action = match &job.related_action {
        Some(value) => serde_json::from_value::<RelatedAction>(value.clone())
            .map_err(|e| CatsyncError::Validation(format!("invalid related action: {e}")))?,
        None => return Ok(None),
    };

    match action {
        RelatedAction::OpenCategoryBinding {
            backend_id,
            external_id,
        } => Ok(bindings
            .get_by_external_id(backend_id, &external_id)
            .await?
            .map(|binding| binding.category_id)),
    }
}
