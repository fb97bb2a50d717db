use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{postgres::PgRow, PgPool, Row};
use uuid::Uuid;

use crate::backend::models::{Backend, ProtocolVersion};
use crate::backend::repositories::BackendRepository;
use catsync_common::error::{CatsyncError, CatsyncResult};

const BACKEND_COLUMNS: &str = "id, name, kind, version, location, username, password, token, \
     default_storeview, auto_bind_product, default_tax_id, export_products_from_date, \
     import_categories_from_date, created_at, updated_at";

#[derive(Clone)]
pub struct PgBackendRepository {
    pool: PgPool,
}

impl PgBackendRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn map_row(row: PgRow) -> CatsyncResult<Backend> {
        let version_raw: String = row.get("version");
        let version = ProtocolVersion::from_str(&version_raw).map_err(CatsyncError::Internal)?;

        Ok(Backend {
            id: row.get("id"),
            name: row.get("name"),
            kind: row.get("kind"),
            version,
            location: row.get("location"),
            username: row.get("username"),
            password: row.get("password"),
            token: row.get("token"),
            default_storeview: row.get("default_storeview"),
            auto_bind_product: row.get("auto_bind_product"),
            default_tax_id: row.get("default_tax_id"),
            export_products_from_date: row.get("export_products_from_date"),
            import_categories_from_date: row.get("import_categories_from_date"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        })
    }

    async fn set_watermark(
        &self,
        column: &'static str,
        id: Uuid,
        from_date: DateTime<Utc>,
    ) -> CatsyncResult<()> {
        let sql = format!("update backends set {column} = $1, updated_at = now() where id = $2");
        let result = sqlx::query(&sql)
            .bind(from_date)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| CatsyncError::Database(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(CatsyncError::NotFound(format!("backend not found: {id}")));
        }
        Ok(())
    }
}

#[async_trait]
impl BackendRepository for PgBackendRepository {
    async fn get_by_id(&self, id: Uuid) -> CatsyncResult<Option<Backend>> {
        let sql = format!("select {BACKEND_COLUMNS} from backends where id = $1");
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| CatsyncError::Database(e.to_string()))?;

        row.map(Self::map_row).transpose()
    }

    async fn list_all(&self) -> CatsyncResult<Vec<Backend>> {
        let sql = format!("select {BACKEND_COLUMNS} from backends order by name");
        let rows = sqlx::query(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| CatsyncError::Database(e.to_string()))?;

        rows.into_iter().map(Self::map_row).collect()
    }

    async fn list_auto_export(&self) -> CatsyncResult<Vec<Backend>> {
        let sql = format!(
            "select {BACKEND_COLUMNS} from backends where auto_bind_product order by name"
        );
        let rows = sqlx::query(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| CatsyncError::Database(e.to_string()))?;

        rows.into_iter().map(Self::map_row).collect()
    }

    async fn set_export_watermark(&self, id: Uuid, from_date: DateTime<Utc>) -> CatsyncResult<()> {
        self.set_watermark("export_products_from_date", id, from_date)
            .await
    }

    async fn set_category_import_watermark(
        &self,
        id: Uuid,
        from_date: DateTime<Utc>,
    ) -> CatsyncResult<()> {
        self.set_watermark("import_categories_from_date", id, from_date)
            .await
    }
}
