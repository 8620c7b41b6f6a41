//! Encoder and decoder for BERT-RPC frames.
//!
//! Turning requests into terms and terms into replies is delegated to a
//! [`PayloadCodec`]. [`JsonCodec`] is a stand-in that maps the same shapes
//! onto JSON documents, which is what the CLI and the tests speak.

use crate::error::ProtocolError;
use crate::frame::Frame;
use crate::message::{Reply, Request};
use crate::MAX_PAYLOAD_SIZE;
use bytes::{Bytes, BytesMut};

/// Converts requests to payload bytes and payload bytes to replies.
pub trait PayloadCodec: Send + 'static {
    fn encode_request(&self, request: &Request) -> Result<Bytes, ProtocolError>;

    fn decode_reply(&self, payload: &[u8]) -> Result<Reply, ProtocolError>;
}

/// JSON payload codec.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl PayloadCodec for JsonCodec {
    fn encode_request(&self, request: &Request) -> Result<Bytes, ProtocolError> {
        Ok(Bytes::from(serde_json::to_vec(request)?))
    }

    fn decode_reply(&self, payload: &[u8]) -> Result<Reply, ProtocolError> {
        let value: serde_json::Value = serde_json::from_slice(payload)?;
        serde_json::from_value(value).map_err(|e| ProtocolError::MalformedReply(e.to_string()))
    }
}

/// Encodes requests into frames.
pub struct Encoder;

impl Encoder {
    /// Encodes a request into a frame.
    pub fn encode_request<C: PayloadCodec + ?Sized>(
        codec: &C,
        request: &Request,
    ) -> Result<BytesMut, ProtocolError> {
        Self::encode_request_with_limit(codec, request, MAX_PAYLOAD_SIZE)
    }

    /// Encodes a request, rejecting payloads above `max_payload`.
    pub fn encode_request_with_limit<C: PayloadCodec + ?Sized>(
        codec: &C,
        request: &Request,
        max_payload: u32,
    ) -> Result<BytesMut, ProtocolError> {
        Frame::new(codec.encode_request(request)?).encode_with_limit(max_payload)
    }
}

/// Receive buffer that yields complete frames.
pub struct Decoder {
    buffer: BytesMut,
    max_payload: u32,
}

impl Decoder {
    pub fn new() -> Self {
        Self::with_max_payload(MAX_PAYLOAD_SIZE)
    }

    pub fn with_max_payload(max_payload: u32) -> Self {
        Self {
            buffer: BytesMut::with_capacity(8192),
            max_payload,
        }
    }

    /// Appends data to the internal buffer.
    pub fn extend(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Attempts to decode the next frame from the buffer.
    pub fn decode_frame(&mut self) -> Result<Option<Frame>, ProtocolError> {
        Frame::decode_with_limit(&mut self.buffer, self.max_payload)
    }

    /// Returns the number of bytes currently buffered.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Clears the internal buffer.
    pub fn clear(&mut self) {
        self.buffer.clear();
    }

    /// Empties the buffer at end of stream, reporting a truncated frame.
    pub fn finish(&mut self) -> Result<(), ProtocolError> {
        let truncated = Frame::truncation(&self.buffer);
        self.buffer.clear();
        match truncated {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

impl Default for Decoder {
    fn default() -> Self {
        Self::new()
    }
}
