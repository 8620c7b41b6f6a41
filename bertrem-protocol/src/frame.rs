//! Binary frame format for BERT-RPC.
//!
//! Frame layout (4 bytes header + payload):
//!
//! ```text
//! +-------------+-----------------------+
//! | payload_len | payload               |
//! |   4 bytes   | payload_len bytes     |
//! +-------------+-----------------------+
//! ```
//!
//! The length is an unsigned 32-bit big-endian integer. There is no magic,
//! version or checksum; the payload is an opaque encoded term.

use crate::error::ProtocolError;
use crate::MAX_PAYLOAD_SIZE;
use bytes::{Buf, BufMut, Bytes, BytesMut};

/// Size of the length prefix in bytes.
pub const FRAME_HEADER_SIZE: usize = 4;

/// Smallest buffer that can hold a complete frame: a header plus one payload byte.
pub const MIN_FRAME_SIZE: usize = FRAME_HEADER_SIZE + 1;

/// A length-prefixed frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Encoded term carried by the frame.
    pub payload: Bytes,
}

impl Frame {
    /// Creates a new frame with the given payload.
    pub fn new(payload: impl Into<Bytes>) -> Self {
        Self {
            payload: payload.into(),
        }
    }

    /// Encodes the frame into bytes.
    pub fn encode(&self) -> Result<BytesMut, ProtocolError> {
        self.encode_with_limit(MAX_PAYLOAD_SIZE)
    }

    /// Encodes the frame, rejecting payloads larger than `max_payload`.
    pub fn encode_with_limit(&self, max_payload: u32) -> Result<BytesMut, ProtocolError> {
        let payload_len = u32::try_from(self.payload.len()).unwrap_or(u32::MAX);
        if payload_len > max_payload || self.payload.len() > u32::MAX as usize {
            return Err(ProtocolError::FrameTooLarge {
                size: payload_len,
                max: max_payload,
            });
        }

        let mut buf = BytesMut::with_capacity(FRAME_HEADER_SIZE + self.payload.len());
        buf.put_u32(payload_len);
        buf.put_slice(&self.payload);
        Ok(buf)
    }

    /// Decodes a frame from bytes.
    ///
    /// Returns `Ok(Some(frame))` if a complete frame was decoded,
    /// `Ok(None)` if more data is needed, or `Err` on protocol errors.
    pub fn decode(buf: &mut BytesMut) -> Result<Option<Self>, ProtocolError> {
        Self::decode_with_limit(buf, MAX_PAYLOAD_SIZE)
    }

    /// Decodes a frame, rejecting announced lengths above `max_payload`.
    ///
    /// Nothing is consumed until the whole frame is buffered, so a frame
    /// split across several reads decodes the same as one delivered whole.
    pub fn decode_with_limit(
        buf: &mut BytesMut,
        max_payload: u32,
    ) -> Result<Option<Self>, ProtocolError> {
        if buf.len() < MIN_FRAME_SIZE {
            return Ok(None);
        }

        let payload_len = u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]);

        if payload_len > max_payload {
            return Err(ProtocolError::FrameTooLarge {
                size: payload_len,
                max: max_payload,
            });
        }

        let total_len = FRAME_HEADER_SIZE + payload_len as usize;
        if buf.len() < total_len {
            return Ok(None);
        }

        buf.advance(FRAME_HEADER_SIZE);
        let payload = buf.split_to(payload_len as usize).freeze();

        Ok(Some(Self { payload }))
    }

    /// Classifies bytes left over when the stream ends.
    ///
    /// Returns `None` when nothing is left, `NoHeader` when the length prefix
    /// itself is incomplete, and `NoData` when the body is short.
    pub fn truncation(buf: &[u8]) -> Option<ProtocolError> {
        if buf.is_empty() {
            return None;
        }
        if buf.len() < FRAME_HEADER_SIZE {
            return Some(ProtocolError::NoHeader {
                buffered: buf.len(),
            });
        }
        let expected = u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]);
        Some(ProtocolError::NoData {
            expected,
            available: buf.len() - FRAME_HEADER_SIZE,
        })
    }
}
