use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{json, Value};

use catsync_db::backend::models::ProtocolVersion;

use super::adapter::{CategoryAdapter, RpcTransport};
use super::error::RemoteError;
use super::filters::SearchFilters;
use super::record::{as_ack, id_list, AssignedProduct, CategoryRecord, RemoteId};
use super::tree::CategoryTree;

const MODEL: &str = "catalog_category";
const SEARCH_METHOD: &str = "oerp_catalog_category.search";

/// Fault code the remote API documents for "category not exists".
pub const CATEGORY_MISSING_FAULT: i32 = 102;

/// Product assignment calls identify products by id, not SKU.
const PRODUCT_IDENTIFIER_TYPE: &str = "id";

/// Categories over the `1.7` positional RPC protocol.
pub struct LegacyCategoryAdapter<T> {
    transport: T,
}

impl<T: RpcTransport> LegacyCategoryAdapter<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    async fn call(&self, method: &str, args: Vec<Value>) -> Result<Value, RemoteError> {
        let method = if method.contains('.') {
            method.to_string()
        } else {
            format!("{MODEL}.{method}")
        };
        self.transport
            .call(&method, args)
            .await
            .map_err(|err| match err {
                RemoteError::Fault { code, message } if code == CATEGORY_MISSING_FAULT => {
                    RemoteError::RecordMissing(message)
                }
                other => other,
            })
    }
}

fn opt<V: Into<Value>>(value: Option<V>) -> Value {
    value.map(Into::into).unwrap_or(Value::Null)
}

#[async_trait]
impl<T: RpcTransport> CategoryAdapter for LegacyCategoryAdapter<T> {
    fn protocol(&self) -> ProtocolVersion {
        ProtocolVersion::Legacy
    }

    async fn search(
        &self,
        filters: SearchFilters,
        from_date: Option<DateTime<Utc>>,
        to_date: Option<DateTime<Utc>>,
    ) -> Result<Vec<RemoteId>, RemoteError> {
        let filters = filters.updated_between(from_date, to_date);
        let ids = self
            .call(SEARCH_METHOD, vec![filters.to_legacy_value()])
            .await?;
        id_list(&ids)
    }

    async fn read(
        &self,
        id: RemoteId,
        storeview: Option<&str>,
        attributes: Option<&[String]>,
    ) -> Result<CategoryRecord, RemoteError> {
        let payload = self
            .call(
                "info",
                vec![json!(id), opt(storeview), opt(attributes.map(|a| a.to_vec()))],
            )
            .await?;
        CategoryRecord::from_legacy(payload)
    }

    /// The legacy tree call always returns the full subtree; `depth` is ignored.
    async fn fetch_tree(
        &self,
        parent_id: Option<RemoteId>,
        storeview: Option<&str>,
        _depth: Option<u32>,
    ) -> Result<CategoryTree, RemoteError> {
        let payload = self
            .call("tree", vec![opt(parent_id), opt(storeview)])
            .await?;
        CategoryTree::from_legacy(&payload)
    }

    async fn list_children(
        &self,
        _parent_id: RemoteId,
        _storeview: Option<&str>,
        _depth: Option<u32>,
    ) -> Result<Vec<RemoteId>, RemoteError> {
        Err(RemoteError::not_supported("list_children", self.protocol()))
    }

    async fn move_category(
        &self,
        id: RemoteId,
        parent_id: RemoteId,
        after_id: Option<RemoteId>,
    ) -> Result<bool, RemoteError> {
        let ack = self
            .call("move", vec![json!(id), json!(parent_id), opt(after_id)])
            .await?;
        Ok(as_ack(&ack))
    }

    async fn assigned_products(&self, id: RemoteId) -> Result<Vec<AssignedProduct>, RemoteError> {
        let payload = self.call("assignedProducts", vec![json!(id)]).await?;
        payload
            .as_array()
            .ok_or_else(|| RemoteError::Decode(format!("expected product list, got {payload}")))?
            .iter()
            .map(AssignedProduct::from_legacy)
            .collect()
    }

    async fn assign_product(
        &self,
        id: RemoteId,
        product_id: RemoteId,
        position: i64,
    ) -> Result<bool, RemoteError> {
        let ack = self
            .call(
                "assignProduct",
                vec![
                    json!(id),
                    json!(product_id),
                    json!(position),
                    json!(PRODUCT_IDENTIFIER_TYPE),
                ],
            )
            .await?;
        Ok(as_ack(&ack))
    }

    async fn update_product_position(
        &self,
        id: RemoteId,
        product_id: RemoteId,
        position: i64,
    ) -> Result<bool, RemoteError> {
        let ack = self
            .call(
                "updateProduct",
                vec![
                    json!(id),
                    json!(product_id),
                    json!(position),
                    json!(PRODUCT_IDENTIFIER_TYPE),
                ],
            )
            .await?;
        Ok(as_ack(&ack))
    }

    async fn remove_product(
        &self,
        id: RemoteId,
        product_id: RemoteId,
    ) -> Result<bool, RemoteError> {
        let ack = self
            .call(
                "removeProduct",
                vec![json!(id), json!(product_id), json!(PRODUCT_IDENTIFIER_TYPE)],
            )
            .await?;
        Ok(as_ack(&ack))
    }
}
