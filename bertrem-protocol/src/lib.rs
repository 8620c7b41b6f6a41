//! # bertrem-protocol
//!
//! Wire protocol implementation for bertrem, a BERT-RPC client.
//!
//! This crate provides:
//! - Binary framing with a 4-byte big-endian length prefix
//! - A receive buffer that reassembles frames split across reads
//! - Request descriptors and `cache` option validation
//! - The payload codec seam and a JSON stand-in codec

pub mod codec;
pub mod error;
pub mod frame;
pub mod message;

pub use codec::{Decoder, Encoder, JsonCodec, PayloadCodec};
pub use error::{InvalidOption, ProtocolError};
pub use frame::{Frame, FRAME_HEADER_SIZE, MIN_FRAME_SIZE};
pub use message::{
    verify_options, CacheOption, FaultKind, Reply, Request, RequestBuilder, RequestKind,
    RequestOptions, ServerFault,
};

/// Default port of a BERT-RPC server.
pub const DEFAULT_PORT: u16 = 8000;

/// Maximum frame payload size (16 MiB).
pub const MAX_PAYLOAD_SIZE: u32 = 16 * 1024 * 1024;
