use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::backend::models::Backend;
use catsync_common::error::CatsyncResult;

#[async_trait]
pub trait BackendRepository: Send + Sync {
    async fn get_by_id(&self, id: Uuid) -> CatsyncResult<Option<Backend>>;

    async fn list_all(&self) -> CatsyncResult<Vec<Backend>>;

    /// Backends configured for scheduled product export (`auto_bind_product`).
    async fn list_auto_export(&self) -> CatsyncResult<Vec<Backend>>;

    /// Only the batch scheduler writes watermarks.
    async fn set_export_watermark(&self, id: Uuid, from_date: DateTime<Utc>) -> CatsyncResult<()>;

    async fn set_category_import_watermark(
        &self,
        id: Uuid,
        from_date: DateTime<Utc>,
    ) -> CatsyncResult<()>;
}
