use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use super::error::RemoteError;

/// Category ids are integers on both protocol generations.
pub type RemoteId = i64;

/// Timestamp format of `created_at` / `updated_at` in remote payloads.
const RECORD_DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// A category as read from either protocol.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryRecord {
    pub id: RemoteId,
    /// `None` for roots; the remote reports roots with parent `0`.
    pub parent_id: Option<RemoteId>,
    pub name: String,
    pub description: Option<String>,
    pub is_active: bool,
    pub position: Option<i64>,
    pub updated_at: Option<DateTime<Utc>>,
    pub raw: Value,
}

impl CategoryRecord {
    pub fn from_legacy(payload: Value) -> Result<Self, RemoteError> {
        Self::decode(payload, "category_id", |p| str_field(p, "description"))
    }

    /// REST keeps the description among `custom_attributes`.
    pub fn from_rest(payload: Value) -> Result<Self, RemoteError> {
        Self::decode(payload, "id", |p| {
            str_field(p, "description").or_else(|| custom_attribute(p, "description"))
        })
    }

    fn decode(
        payload: Value,
        id_key: &str,
        description: impl Fn(&Value) -> Option<String>,
    ) -> Result<Self, RemoteError> {
        let id = id_field(&payload, id_key)?
            .ok_or_else(|| RemoteError::Decode(format!("category without `{id_key}`")))?;

        Ok(Self {
            id,
            parent_id: id_field(&payload, "parent_id")?.filter(|parent| *parent != 0),
            name: str_field(&payload, "name").unwrap_or_default(),
            description: description(&payload),
            is_active: bool_field(&payload, "is_active"),
            position: id_field(&payload, "position")?,
            updated_at: str_field(&payload, "updated_at").and_then(|v| parse_datetime(&v)),
            raw: payload,
        })
    }
}

/// A product assigned to a category (legacy protocol only).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssignedProduct {
    pub product_id: RemoteId,
    pub sku: Option<String>,
    pub position: i64,
}

impl AssignedProduct {
    pub fn from_legacy(payload: &Value) -> Result<Self, RemoteError> {
        let product_id = id_field(payload, "product_id")?
            .ok_or_else(|| RemoteError::Decode("assigned product without `product_id`".into()))?;
        Ok(Self {
            product_id,
            sku: str_field(payload, "sku"),
            position: id_field(payload, "position")?.unwrap_or(0),
        })
    }
}

/// Read an integer that may arrive as a JSON number or a numeric string.
pub fn id_field(payload: &Value, key: &str) -> Result<Option<RemoteId>, RemoteError> {
    match payload.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => as_remote_id(value)
            .map(Some)
            .ok_or_else(|| RemoteError::Decode(format!("`{key}` is not an integer: {value}"))),
    }
}

pub fn as_remote_id(value: &Value) -> Option<RemoteId> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Decode a list of ids, as returned by search calls.
pub fn id_list(payload: &Value) -> Result<Vec<RemoteId>, RemoteError> {
    let items = payload
        .as_array()
        .ok_or_else(|| RemoteError::Decode(format!("expected a list of ids, got {payload}")))?;
    items
        .iter()
        .map(|v| as_remote_id(v).ok_or_else(|| RemoteError::Decode(format!("bad id: {v}"))))
        .collect()
}

/// Remote acknowledgements come back as `true`, `1` or `"1"`.
pub fn as_ack(payload: &Value) -> bool {
    match payload {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_i64() == Some(1),
        Value::String(s) => s == "1" || s.eq_ignore_ascii_case("true"),
        _ => false,
    }
}

fn str_field(payload: &Value, key: &str) -> Option<String> {
    match payload.get(key) {
        Some(Value::String(s)) => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    }
}

fn bool_field(payload: &Value, key: &str) -> bool {
    payload.get(key).map(as_ack).unwrap_or(false)
}

fn custom_attribute(payload: &Value, code: &str) -> Option<String> {
    payload
        .get("custom_attributes")?
        .as_array()?
        .iter()
        .find(|attr| attr.get("attribute_code").and_then(Value::as_str) == Some(code))
        .and_then(|attr| str_field(attr, "value"))
}

fn parse_datetime(value: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(value, RECORD_DATETIME_FORMAT)
        .ok()
        .map(|naive| naive.and_utc())
}
