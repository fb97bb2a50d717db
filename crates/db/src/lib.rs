pub mod backend;
pub mod binding;
pub mod jobs;

use catsync_common::error::{CatsyncError, CatsyncResult};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

/// Schema for backends, local categories, category bindings and the job queue.
pub const SCHEMA: &str = include_str!("../../../migrations/0001_catalog_sync.sql");

/// Create a Postgres connection pool from a database URL.
pub async fn create_pool(database_url: &str) -> CatsyncResult<PgPool> {
    tracing::info!("connecting to database");
    PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await
        .map_err(|e| CatsyncError::Database(e.to_string()))
}

/// Apply [`SCHEMA`] statement by statement. Every statement is idempotent.
pub async fn ensure_schema(pool: &PgPool) -> CatsyncResult<()> {
    for statement in SCHEMA.split(';').map(str::trim).filter(|s| !s.is_empty()) {
        sqlx::query(statement)
            .execute(pool)
            .await
            .map_err(|e| CatsyncError::Database(e.to_string()))?;
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod test_support {
    use sqlx::PgPool;
    use uuid::Uuid;

    /// Pool against `TEST_DATABASE_URL`, or `None` so database tests become no-ops.
    pub async fn test_pool() -> Option<PgPool> {
        let url = std::env::var("TEST_DATABASE_URL").ok()?;
        let pool = crate::create_pool(&url).await.expect("db should connect");
        crate::ensure_schema(&pool).await.ok()?;
        Some(pool)
    }

    pub async fn insert_backend(pool: &PgPool, version: &str, auto_bind_product: bool) -> Uuid {
        let id = Uuid::new_v4();
        sqlx::query(
            "insert into backends (id, name, kind, version, location, auto_bind_product)
             values ($1, $2, 'magento', $3, 'http://shop.test', $4)",
        )
        .bind(id)
        .bind(format!("backend-{id}"))
        .bind(version)
        .bind(auto_bind_product)
        .execute(pool)
        .await
        .expect("insert backend");
        id
    }
}
