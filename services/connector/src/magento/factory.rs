use std::sync::Arc;

use catsync_db::backend::models::{Backend, ProtocolVersion};

use super::adapter::CategoryAdapter;
use super::error::RemoteError;
use super::http_transport::{HttpRestConfig, HttpRestTransport};
use super::legacy::LegacyCategoryAdapter;
use super::rest::RestCategoryAdapter;
use super::xmlrpc_transport::{XmlRpcConfig, XmlRpcTransport};

/// Builds the category adapter matching a backend's protocol generation.
pub trait AdapterFactory: Send + Sync {
    fn adapter_for(&self, backend: &Backend) -> Result<Arc<dyn CategoryAdapter>, RemoteError>;
}

#[derive(Debug, Clone, Copy)]
pub struct RemoteSettings {
    pub timeout_secs: u64,
    pub max_retries: u32,
}

pub struct RemoteAdapterFactory {
    settings: RemoteSettings,
}

impl RemoteAdapterFactory {
    pub fn new(settings: RemoteSettings) -> Self {
        Self { settings }
    }
}

fn credential(value: &Option<String>, name: &str, backend: &Backend) -> Result<String, RemoteError> {
    value
        .clone()
        .filter(|v| !v.is_empty())
        .ok_or_else(|| {
            RemoteError::Transport(format!(
                "backend {} ({}) has no {name} configured",
                backend.name, backend.id
            ))
        })
}

impl AdapterFactory for RemoteAdapterFactory {
    fn adapter_for(&self, backend: &Backend) -> Result<Arc<dyn CategoryAdapter>, RemoteError> {
        match backend.version {
            ProtocolVersion::Legacy => {
                let transport = XmlRpcTransport::new(XmlRpcConfig {
                    base_url: backend.location.clone(),
                    username: credential(&backend.username, "username", backend)?,
                    api_key: credential(&backend.password, "api key", backend)?,
                });
                Ok(Arc::new(LegacyCategoryAdapter::new(transport)))
            }
            ProtocolVersion::Rest => {
                let transport = HttpRestTransport::new(HttpRestConfig {
                    base_url: backend.location.clone(),
                    token: credential(&backend.token, "token", backend)?,
                    max_retries: self.settings.max_retries,
                    timeout_secs: self.settings.timeout_secs,
                })?;
                Ok(Arc::new(RestCategoryAdapter::new(transport)))
            }
        }
    }
}
