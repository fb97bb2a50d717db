use std::str::FromStr;

use async_trait::async_trait;
use sqlx::{postgres::PgRow, PgPool, Postgres, Row, Transaction};
use uuid::Uuid;

use crate::backend::models::ProtocolVersion;
use crate::binding::models::{CategoryBinding, CategoryBindingUpsert};
use crate::binding::repositories::CategoryBindingRepository;
use catsync_common::error::{CatsyncError, CatsyncResult};

const BINDING_COLUMNS: &str = "id, backend_id, category_id, external_id, parent_id, name, \
     description, protocol_version, sync_date, raw_ref, created_at, updated_at";

#[derive(Clone)]
pub struct PgCategoryBindingRepository {
    pool: PgPool,
}

impl PgCategoryBindingRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn map_row(row: PgRow) -> CatsyncResult<CategoryBinding> {
        let version_raw: String = row.get("protocol_version");
        let protocol_version =
            ProtocolVersion::from_str(&version_raw).map_err(CatsyncError::Internal)?;

        Ok(CategoryBinding {
            id: row.get("id"),
            backend_id: row.get("backend_id"),
            category_id: row.get("category_id"),
            external_id: row.get("external_id"),
            parent_id: row.get("parent_id"),
            name: row.get("name"),
            description: row.get("description"),
            protocol_version,
            sync_date: row.get("sync_date"),
            raw_ref: row.get("raw_ref"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        })
    }

    /// Local category of the parent binding, after checking it shares the backend.
    async fn parent_category(
        tx: &mut Transaction<'_, Postgres>,
        binding: &CategoryBindingUpsert,
    ) -> CatsyncResult<Option<Uuid>> {
        let parent_id = match binding.parent_id {
            Some(id) => id,
            None => return Ok(None),
        };

        let row = sqlx::query("select backend_id, category_id from category_bindings where id = $1")
            .bind(parent_id)
            .fetch_optional(&mut **tx)
            .await
            .map_err(|e| CatsyncError::Database(e.to_string()))?
            .ok_or_else(|| {
                CatsyncError::Validation(format!("parent binding not found: {parent_id}"))
            })?;

        let parent_backend: Uuid = row.get("backend_id");
        if parent_backend != binding.backend_id {
            return Err(CatsyncError::Validation(format!(
                "parent binding {parent_id} belongs to another backend"
            )));
        }
        Ok(Some(row.get("category_id")))
    }

    /// True when `binding_id` already appears on the parent chain starting at `parent_id`.
    async fn closes_cycle(
        tx: &mut Transaction<'_, Postgres>,
        binding_id: Uuid,
        parent_id: Uuid,
    ) -> CatsyncResult<bool> {
        let row = sqlx::query(
            "with recursive chain(id, parent_id) as (
               select id, parent_id from category_bindings where id = $1
               union all
               select b.id, b.parent_id from category_bindings b join chain c on b.id = c.parent_id
             )
             select exists(select 1 from chain where id = $2) as found",
        )
        .bind(parent_id)
        .bind(binding_id)
        .fetch_one(&mut **tx)
        .await
        .map_err(|e| CatsyncError::Database(e.to_string()))?;

        Ok(row.get::<bool, _>("found"))
    }

    async fn update_local_category(
        tx: &mut Transaction<'_, Postgres>,
        category_id: Uuid,
        name: &str,
        parent_category: Option<Uuid>,
    ) -> CatsyncResult<()> {
        sqlx::query(
            "update product_categories set name = $1, parent_id = $2, updated_at = now()
             where id = $3",
        )
        .bind(name)
        .bind(parent_category)
        .bind(category_id)
        .execute(&mut **tx)
        .await
        .map_err(|e| CatsyncError::Database(e.to_string()))?;
        Ok(())
    }
}

#[async_trait]
impl CategoryBindingRepository for PgCategoryBindingRepository {
    async fn get_by_id(&self, id: Uuid) -> CatsyncResult<Option<CategoryBinding>> {
        let sql = format!("select {BINDING_COLUMNS} from category_bindings where id = $1");
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| CatsyncError::Database(e.to_string()))?;

        row.map(Self::map_row).transpose()
    }

    async fn get_by_external_id(
        &self,
        backend_id: Uuid,
        external_id: &str,
    ) -> CatsyncResult<Option<CategoryBinding>> {
        let sql = format!(
            "select {BINDING_COLUMNS} from category_bindings
             where backend_id = $1 and external_id = $2"
        );
        let row = sqlx::query(&sql)
            .bind(backend_id)
            .bind(external_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| CatsyncError::Database(e.to_string()))?;

        row.map(Self::map_row).transpose()
    }

    async fn upsert_by_external_id(
        &self,
        binding: CategoryBindingUpsert,
    ) -> CatsyncResult<CategoryBinding> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| CatsyncError::Database(e.to_string()))?;

        let parent_category = Self::parent_category(&mut tx, &binding).await?;

        let existing = sqlx::query(
            "select id, category_id from category_bindings
             where backend_id = $1 and external_id = $2
             for update",
        )
        .bind(binding.backend_id)
        .bind(&binding.external_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| CatsyncError::Database(e.to_string()))?;

        if let (Some(row), Some(parent_id)) = (&existing, binding.parent_id) {
            let existing_id: Uuid = row.get("id");
            if Self::closes_cycle(&mut tx, existing_id, parent_id).await? {
                return Err(CatsyncError::Validation(format!(
                    "binding {} cannot be its own ancestor",
                    binding.external_id
                )));
            }
        }

        let fresh_category = match &existing {
            Some(row) => {
                let category_id: Uuid = row.get("category_id");
                Self::update_local_category(&mut tx, category_id, &binding.name, parent_category)
                    .await?;
                None
            }
            None => {
                let category_id = Uuid::new_v4();
                sqlx::query(
                    "insert into product_categories (id, name, parent_id) values ($1, $2, $3)",
                )
                .bind(category_id)
                .bind(&binding.name)
                .bind(parent_category)
                .execute(&mut *tx)
                .await
                .map_err(|e| CatsyncError::Database(e.to_string()))?;
                Some(category_id)
            }
        };

        // A concurrent import may win the insert; on conflict we update its row instead.
        let sql = format!(
            "insert into category_bindings
             (id, backend_id, category_id, external_id, parent_id, name, description,
              protocol_version, sync_date, raw_ref)
             values ($1, $2, coalesce($3, (select category_id from category_bindings
                                            where backend_id = $2 and external_id = $4)),
                     $4, $5, $6, $7, $8, $9, $10)
             on conflict (backend_id, external_id) do update set
               parent_id = excluded.parent_id,
               name = excluded.name,
               description = excluded.description,
               protocol_version = excluded.protocol_version,
               sync_date = excluded.sync_date,
               raw_ref = excluded.raw_ref,
               updated_at = now()
             returning {BINDING_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(Uuid::new_v4())
            .bind(binding.backend_id)
            .bind(fresh_category)
            .bind(&binding.external_id)
            .bind(binding.parent_id)
            .bind(&binding.name)
            .bind(&binding.description)
            .bind(binding.protocol_version.as_str())
            .bind(binding.sync_date)
            .bind(&binding.raw_ref)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| CatsyncError::Database(e.to_string()))?;

        let stored = Self::map_row(row)?;

        if let Some(orphan) = fresh_category.filter(|id| *id != stored.category_id) {
            sqlx::query("delete from product_categories where id = $1")
                .bind(orphan)
                .execute(&mut *tx)
                .await
                .map_err(|e| CatsyncError::Database(e.to_string()))?;
            Self::update_local_category(&mut tx, stored.category_id, &binding.name, parent_category)
                .await?;
        }

        tx.commit()
            .await
            .map_err(|e| CatsyncError::Database(e.to_string()))?;

        Ok(stored)
    }

    async fn list_children(&self, parent_id: Uuid) -> CatsyncResult<Vec<CategoryBinding>> {
        let sql = format!(
            "select {BINDING_COLUMNS} from category_bindings
             where parent_id = $1 order by external_id"
        );
        let rows = sqlx::query(&sql)
            .bind(parent_id)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| CatsyncError::Database(e.to_string()))?;

        rows.into_iter().map(Self::map_row).collect()
    }
}
