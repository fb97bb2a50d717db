use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use serde_json::{json, Value};

use catsync_db::backend::models::ProtocolVersion;

use super::adapter::{CategoryAdapter, RestRequest, RestTransport};
use super::error::RemoteError;
use super::filters::SearchFilters;
use super::record::{as_ack, as_remote_id, AssignedProduct, CategoryRecord, RemoteId};
use super::tree::CategoryTree;

const RESOURCE: &str = "categories";
const SEARCH_PATH: &str = "categories/list";
const TREE_FIELDS: &str = "id,children_data[id]";

/// Categories over the `2.0` REST protocol.
pub struct RestCategoryAdapter<T> {
    transport: T,
}

impl<T: RestTransport> RestCategoryAdapter<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    async fn send(&self, request: RestRequest) -> Result<Value, RemoteError> {
        let path = request.path.clone();
        self.transport
            .send(request)
            .await
            .map_err(|err| match err {
                RemoteError::HttpError { status, body } if status == StatusCode::NOT_FOUND => {
                    RemoteError::RecordMissing(format!("{path}: {body}"))
                }
                other => other,
            })
    }

    fn tree_request(
        parent_id: Option<RemoteId>,
        storeview: Option<&str>,
        depth: u32,
    ) -> RestRequest {
        let request = RestRequest::get(RESOURCE)
            .query("fields", TREE_FIELDS)
            .query("depth", depth)
            .storeview(storeview);
        match parent_id {
            Some(parent) => request.query("rootCategoryId", parent),
            None => request,
        }
    }
}

#[async_trait]
impl<T: RestTransport> CategoryAdapter for RestCategoryAdapter<T> {
    fn protocol(&self) -> ProtocolVersion {
        ProtocolVersion::Rest
    }

    async fn search(
        &self,
        filters: SearchFilters,
        from_date: Option<DateTime<Utc>>,
        to_date: Option<DateTime<Utc>>,
    ) -> Result<Vec<RemoteId>, RemoteError> {
        let filters = filters.updated_between(from_date, to_date);
        let mut request = RestRequest::get(SEARCH_PATH);
        request.query = filters.to_search_criteria();
        if request.query.is_empty() {
            // The endpoint insists on a searchCriteria parameter.
            request = request.query("searchCriteria", "");
        }

        let page = self.send(request).await?;
        let items: &[Value] = match page.get("items") {
            Some(Value::Array(items)) => items.as_slice(),
            Some(Value::Null) | None => &[],
            Some(other) => {
                return Err(RemoteError::Decode(format!("`items` is not a list: {other}")))
            }
        };
        items
            .iter()
            .map(|item| {
                item.get("id")
                    .and_then(as_remote_id)
                    .ok_or_else(|| RemoteError::Decode(format!("search item without id: {item}")))
            })
            .collect()
    }

    async fn read(
        &self,
        id: RemoteId,
        storeview: Option<&str>,
        attributes: Option<&[String]>,
    ) -> Result<CategoryRecord, RemoteError> {
        let mut request = RestRequest::get(format!("{RESOURCE}/{id}")).storeview(storeview);
        if let Some(attributes) = attributes.filter(|a| !a.is_empty()) {
            request = request.query("fields", attributes.join(","));
        }
        let payload = self.send(request).await?;
        CategoryRecord::from_rest(payload)
    }

    /// Fetching the whole tree without a depth was never supported by this
    /// protocol; callers must pass a non-zero depth.
    async fn fetch_tree(
        &self,
        parent_id: Option<RemoteId>,
        storeview: Option<&str>,
        depth: Option<u32>,
    ) -> Result<CategoryTree, RemoteError> {
        let depth = match depth {
            Some(depth) if depth > 0 => depth,
            _ => {
                return Err(RemoteError::not_supported(
                    "fetch_tree without depth",
                    self.protocol(),
                ))
            }
        };
        let payload = self
            .send(Self::tree_request(parent_id, storeview, depth))
            .await?;
        CategoryTree::from_rest(&payload)
    }

    async fn list_children(
        &self,
        parent_id: RemoteId,
        storeview: Option<&str>,
        depth: Option<u32>,
    ) -> Result<Vec<RemoteId>, RemoteError> {
        let depth = depth.unwrap_or(1);
        let payload = self
            .send(Self::tree_request(Some(parent_id), storeview, depth))
            .await?;

        match payload.get("children_data") {
            Some(Value::Array(children)) => children
                .iter()
                .map(|child| {
                    child.get("id").and_then(as_remote_id).ok_or_else(|| {
                        RemoteError::Decode(format!("child without id: {child}"))
                    })
                })
                .collect(),
            _ => Ok(Vec::new()),
        }
    }

    async fn move_category(
        &self,
        id: RemoteId,
        parent_id: RemoteId,
        after_id: Option<RemoteId>,
    ) -> Result<bool, RemoteError> {
        let request = RestRequest::put(
            format!("{RESOURCE}/{id}/move"),
            json!({ "parent_id": parent_id, "after_id": after_id }),
        );
        let ack = self.send(request).await?;
        Ok(as_ack(&ack))
    }

    async fn assigned_products(&self, _id: RemoteId) -> Result<Vec<AssignedProduct>, RemoteError> {
        Err(RemoteError::not_supported("assigned_products", self.protocol()))
    }

    async fn assign_product(
        &self,
        _id: RemoteId,
        _product_id: RemoteId,
        _position: i64,
    ) -> Result<bool, RemoteError> {
        Err(RemoteError::not_supported("assign_product", self.protocol()))
    }

    async fn update_product_position(
        &self,
        _id: RemoteId,
        _product_id: RemoteId,
        _position: i64,
    ) -> Result<bool, RemoteError> {
        Err(RemoteError::not_supported(
            "update_product_position",
            self.protocol(),
        ))
    }

    async fn remove_product(
        &self,
        _id: RemoteId,
        _product_id: RemoteId,
    ) -> Result<bool, RemoteError> {
        Err(RemoteError::not_supported("remove_product", self.protocol()))
    }
}
