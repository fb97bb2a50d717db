use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Wire protocol generation spoken by a remote backend.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ProtocolVersion {
    /// Positional-argument XML-RPC (`1.7`).
    #[serde(rename = "1.7")]
    Legacy,
    /// REST with named fields (`2.0`).
    #[serde(rename = "2.0")]
    Rest,
}

impl ProtocolVersion {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Legacy => "1.7",
            Self::Rest => "2.0",
        }
    }
}

impl FromStr for ProtocolVersion {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "1.7" => Ok(Self::Legacy),
            "2.0" => Ok(Self::Rest),
            _ => Err(format!("unsupported protocol version: {value}")),
        }
    }
}

impl fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Backend {
    pub id: Uuid,
    pub name: String,
    pub kind: String,
    pub version: ProtocolVersion,
    pub location: String,
    pub username: Option<String>,
    #[serde(skip_serializing)]
    pub password: Option<String>,
    #[serde(skip_serializing)]
    pub token: Option<String>,
    pub default_storeview: Option<String>,
    pub auto_bind_product: bool,
    pub default_tax_id: Option<Uuid>,
    pub export_products_from_date: Option<DateTime<Utc>>,
    pub import_categories_from_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Backend {
    /// Job channel for work on this backend, e.g. `root.magento`.
    pub fn job_channel(&self) -> String {
        format!("root.{}", self.kind)
    }
}
