//! Protocol error types.

use thiserror::Error;

/// Protocol-level errors that can occur during framing or payload handling.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("no header: {buffered} bytes left, need 4 for the length prefix")]
    NoHeader { buffered: usize },

    #[error("no data: frame announces {expected} bytes, {available} available")]
    NoData { expected: u32, available: usize },

    #[error("frame too large: {size} bytes (max {max})")]
    FrameTooLarge { size: u32, max: u32 },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("malformed reply: {0}")]
    MalformedReply(String),
}

/// Raised when request options do not have the shape the protocol accepts.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid option: {0}")]
pub struct InvalidOption(pub &'static str);

impl InvalidOption {
    /// Options were given but carry no `cache` key.
    pub const UNKNOWN_KEY: InvalidOption = InvalidOption("Valid options are :cache");

    /// The `cache` value is not a `[validation, String]` pair.
    pub const BAD_CACHE_ARGS: InvalidOption =
        InvalidOption("Valid :cache args are [:validation, String]");
}
