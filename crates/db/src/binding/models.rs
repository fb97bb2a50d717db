use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::backend::models::ProtocolVersion;

/// Link between a local product category and its id on one remote backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryBinding {
    pub id: Uuid,
    pub backend_id: Uuid,
    /// Local `product_categories` row this binding points at.
    pub category_id: Uuid,
    pub external_id: String,
    /// Binding of the remote parent, always on the same backend.
    pub parent_id: Option<Uuid>,
    pub name: String,
    pub description: Option<String>,
    pub protocol_version: ProtocolVersion,
    pub sync_date: DateTime<Utc>,
    pub raw_ref: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Values written by an import. Keyed by `(backend_id, external_id)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryBindingUpsert {
    pub backend_id: Uuid,
    pub external_id: String,
    pub parent_id: Option<Uuid>,
    pub name: String,
    pub description: Option<String>,
    pub protocol_version: ProtocolVersion,
    pub sync_date: DateTime<Utc>,
    pub raw_ref: Option<serde_json::Value>,
}
