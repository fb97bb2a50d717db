use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Method;
use serde_json::Value;

use catsync_db::backend::models::ProtocolVersion;

use super::error::RemoteError;
use super::filters::SearchFilters;
use super::record::{AssignedProduct, CategoryRecord, RemoteId};
use super::tree::CategoryTree;

/// Category operations, independent of the protocol generation behind them.
#[async_trait]
pub trait CategoryAdapter: Send + Sync {
    fn protocol(&self) -> ProtocolVersion;

    /// Ids of categories matching `filters`, optionally bounded on `updated_at`
    /// (both bounds inclusive).
    async fn search(
        &self,
        filters: SearchFilters,
        from_date: Option<DateTime<Utc>>,
        to_date: Option<DateTime<Utc>>,
    ) -> Result<Vec<RemoteId>, RemoteError>;

    async fn read(
        &self,
        id: RemoteId,
        storeview: Option<&str>,
        attributes: Option<&[String]>,
    ) -> Result<CategoryRecord, RemoteError>;

    async fn fetch_tree(
        &self,
        parent_id: Option<RemoteId>,
        storeview: Option<&str>,
        depth: Option<u32>,
    ) -> Result<CategoryTree, RemoteError>;

    /// Immediate children of `parent_id`; `depth` defaults to 1.
    async fn list_children(
        &self,
        parent_id: RemoteId,
        storeview: Option<&str>,
        depth: Option<u32>,
    ) -> Result<Vec<RemoteId>, RemoteError>;

    async fn move_category(
        &self,
        id: RemoteId,
        parent_id: RemoteId,
        after_id: Option<RemoteId>,
    ) -> Result<bool, RemoteError>;

    async fn assigned_products(&self, id: RemoteId) -> Result<Vec<AssignedProduct>, RemoteError>;

    async fn assign_product(
        &self,
        id: RemoteId,
        product_id: RemoteId,
        position: i64,
    ) -> Result<bool, RemoteError>;

    async fn update_product_position(
        &self,
        id: RemoteId,
        product_id: RemoteId,
        position: i64,
    ) -> Result<bool, RemoteError>;

    async fn remove_product(&self, id: RemoteId, product_id: RemoteId)
        -> Result<bool, RemoteError>;
}

/// Positional-argument RPC, e.g. `catalog_category.move` with `[5, 2, 7]`.
#[async_trait]
pub trait RpcTransport: Send + Sync {
    async fn call(&self, method: &str, args: Vec<Value>) -> Result<Value, RemoteError>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct RestRequest {
    pub method: Method,
    /// Path below `V1/`, e.g. `categories/5/move`.
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
    /// Store code scoping the request, if any.
    pub storeview: Option<String>,
}

impl RestRequest {
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: Method::GET,
            path: path.into(),
            query: Vec::new(),
            body: None,
            storeview: None,
        }
    }

    pub fn put(path: impl Into<String>, body: Value) -> Self {
        Self {
            method: Method::PUT,
            path: path.into(),
            query: Vec::new(),
            body: Some(body),
            storeview: None,
        }
    }

    pub fn query(mut self, key: &str, value: impl ToString) -> Self {
        self.query.push((key.to_string(), value.to_string()));
        self
    }

    pub fn storeview(mut self, storeview: Option<&str>) -> Self {
        self.storeview = storeview.map(str::to_string);
        self
    }
}

/// Named-field REST calls returning the decoded JSON body.
#[async_trait]
pub trait RestTransport: Send + Sync {
    async fn send(&self, request: RestRequest) -> Result<Value, RemoteError>;
}
