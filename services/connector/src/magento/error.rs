use reqwest::StatusCode;

use catsync_db::backend::models::ProtocolVersion;

#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    #[error("record does not exist on the remote backend: {0}")]
    RecordMissing(String),

    #[error("{operation} is not supported by protocol {protocol}")]
    NotSupported {
        operation: &'static str,
        protocol: ProtocolVersion,
    },

    #[error("remote fault {code}: {message}")]
    Fault { code: i32, message: String },

    #[error("HTTP {status}: {body}")]
    HttpError { status: StatusCode, body: String },

    #[error("request failed: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("max retries exceeded after {attempts} attempts: {last_error}")]
    MaxRetriesExceeded { attempts: u32, last_error: String },

    #[error("unexpected remote response: {0}")]
    Decode(String),
}

impl RemoteError {
    pub fn not_supported(operation: &'static str, protocol: ProtocolVersion) -> Self {
        Self::NotSupported {
            operation,
            protocol,
        }
    }

    /// Terminal errors describe a record or capability that does not exist;
    /// retrying cannot change the outcome.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::RecordMissing(_) | Self::NotSupported { .. })
    }
}
