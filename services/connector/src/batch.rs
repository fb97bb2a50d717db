use std::sync::Arc;

use chrono::{DateTime, Utc};

use catsync_db::backend::models::Backend;
use catsync_db::jobs::repositories::JobQueue;

use crate::importer::ImportError;
use crate::jobs::{submit, JobDescriptor};
use crate::magento::adapter::CategoryAdapter;
use crate::magento::filters::SearchFilters;

/// Fans a search window out into one `import_category` job per remote id.
pub struct CategoryBatchImporter<'a, Q> {
    backend: &'a Backend,
    adapter: Arc<dyn CategoryAdapter>,
    queue: &'a Q,
}

impl<'a, Q> CategoryBatchImporter<'a, Q>
where
    Q: JobQueue,
{
    pub fn new(backend: &'a Backend, adapter: Arc<dyn CategoryAdapter>, queue: &'a Q) -> Self {
        Self {
            backend,
            adapter,
            queue,
        }
    }

    /// Returns the number of jobs enqueued.
    pub async fn run(
        &self,
        from_date: Option<DateTime<Utc>>,
        to_date: Option<DateTime<Utc>>,
    ) -> Result<usize, ImportError> {
        let ids = self
            .adapter
            .search(SearchFilters::new(), from_date, to_date)
            .await?;

        tracing::info!(
            backend_id = %self.backend.id,
            count = ids.len(),
            from_date = ?from_date,
            to_date = ?to_date,
            "categories changed in window"
        );

        for id in &ids {
            let descriptor = JobDescriptor::import_category(self.backend, *id, false, false);
            submit(self.queue, descriptor).await?;
        }
        Ok(ids.len())
    }
}
