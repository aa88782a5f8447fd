use std::time::Duration;
use thiserror::Error;
use tokio_tungstenite::tungstenite;

/// Errors raised while normalising a protected domain.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("domain is empty")]
    Empty,

    #[error("domain {0:?} has an empty left-most label")]
    EmptyLabel(String),

    #[error("domain {0:?} contains a path separator or whitespace")]
    InvalidCharacter(String),
}

/// Recoverable faults reported by the certstream client. None of these stop
/// the client; they are surfaced for observability only.
#[derive(Debug, Error)]
pub enum StreamError {
    #[error("failed to connect to certstream at {endpoint}: {source}")]
    Connect {
        endpoint: String,
        #[source]
        source: tungstenite::Error,
    },

    #[error("timed out after {0:?} connecting to certstream")]
    ConnectTimeout(Duration),

    #[error("failed to read websocket frame: {0}")]
    Read(#[source] tungstenite::Error),

    #[error("no message received within {0:?}")]
    ReadTimeout(Duration),

    #[error("certstream closed the connection")]
    Closed,

    #[error("failed to decode certstream message: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("failed to write websocket ping: {0}")]
    Ping(#[source] tungstenite::Error),
}

impl StreamError {
    /// Transport faults are the ones caused by the connection itself, as
    /// opposed to payload decoding or ping writes.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            StreamError::Connect { .. }
                | StreamError::ConnectTimeout(_)
                | StreamError::Read(_)
                | StreamError::ReadTimeout(_)
                | StreamError::Closed
        )
    }
}

/// Startup configuration failures. These are fatal.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("invalid certstream endpoint {endpoint:?}: {reason}")]
    Endpoint { endpoint: String, reason: String },

    #[error("invalid webhook url {url:?}: {reason}")]
    Webhook { url: String, reason: String },

    #[error("invalid protected domain: {0}")]
    Domain(#[from] DomainError),

    #[error("{0} must be greater than zero")]
    ZeroDuration(&'static str),
}
