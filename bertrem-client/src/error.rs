//! Client error types.

use crate::config::ConfigError;
use bertrem_protocol::{FaultKind, InvalidOption, ServerFault};
use thiserror::Error;

/// Client errors.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("protocol error: {0}")]
    Protocol(#[from] bertrem_protocol::ProtocolError),

    #[error(transparent)]
    InvalidOption(#[from] InvalidOption),

    #[error("connection to server lost")]
    ConnectionLost,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("connect timeout")]
    Timeout,

    #[error("not connected")]
    NotConnected,

    #[error("session closed")]
    SessionClosed,

    #[error("response received with no pending request")]
    UnexpectedResponse,

    #[error("{kind} error {code} ({class}): {detail}")]
    Server {
        kind: FaultKind,
        code: i64,
        class: String,
        detail: String,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl From<ServerFault> for ClientError {
    fn from(fault: ServerFault) -> Self {
        ClientError::Server {
            kind: fault.kind,
            code: fault.code,
            class: fault.class,
            detail: fault.detail,
        }
    }
}

impl ClientError {
    /// Returns whether this error is retryable.
    pub fn is_retryable(&self) -> bool {
        match self {
            ClientError::Io(_) => true,
            ClientError::Timeout => true,
            ClientError::ConnectionLost => true,
            ClientError::Connection(_) => true,
            ClientError::Server { kind, .. } => *kind == FaultKind::Proxy,
            _ => false,
        }
    }
}
