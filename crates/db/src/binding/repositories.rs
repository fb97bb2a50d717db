use async_trait::async_trait;
use uuid::Uuid;

use crate::binding::models::{CategoryBinding, CategoryBindingUpsert};
use catsync_common::error::CatsyncResult;

#[async_trait]
pub trait CategoryBindingRepository: Send + Sync {
    async fn get_by_id(&self, id: Uuid) -> CatsyncResult<Option<CategoryBinding>>;

    async fn get_by_external_id(
        &self,
        backend_id: Uuid,
        external_id: &str,
    ) -> CatsyncResult<Option<CategoryBinding>>;

    /// Insert or update the binding keyed by (backend_id, external_id), creating
    /// or renaming the local category it points at.
    ///
    /// Fails with `Validation` when the parent binding is unknown, lives on
    /// another backend, or would close a cycle.
    async fn upsert_by_external_id(
        &self,
        binding: CategoryBindingUpsert,
    ) -> CatsyncResult<CategoryBinding>;

    async fn list_children(&self, parent_id: Uuid) -> CatsyncResult<Vec<CategoryBinding>>;
}
