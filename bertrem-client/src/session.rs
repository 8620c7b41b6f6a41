//! Connection session state machine.
//!
//! A session performs no I/O. The transport reports lifecycle events
//! (`on_connected`, `on_bytes_arrived`, `on_disconnected`) and drains the
//! [`Command`]s the session queues in response: bytes to send and the
//! request to close.

use crate::config::{CastPolicy, ClientConfig};
use crate::error::ClientError;
use crate::queue::{Correlator, FifoQueue, PendingRequest};
use crate::request::{Dispatch, Invocation, ResponseHandle};
use bertrem_protocol::{Decoder, Encoder, PayloadCodec, Request, RequestBuilder, RequestKind};
use bytes::Bytes;
use serde_json::Value;
use std::collections::VecDeque;
use uuid::Uuid;

/// Session lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Transport establishment in progress.
    Connecting,
    /// Transport established, requests may flow.
    Open,
    /// Transport gone. Terminal.
    Closed,
}

/// Instruction for the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Write these bytes.
    Send(Bytes),
    /// Close the connection.
    Close,
}

/// Protocol engine for one connection.
pub struct Session<C, Q = FifoQueue> {
    /// Unique session ID (for logs).
    id: String,
    state: SessionState,
    persistent: bool,
    cast_policy: CastPolicy,
    max_frame_size: u32,
    codec: C,
    decoder: Decoder,
    queue: Q,
    commands: VecDeque<Command>,
    /// Close has been requested; the transport has not yet reported it.
    closing: bool,
    replies: u64,
}

impl<C: PayloadCodec> Session<C, FifoQueue> {
    /// Creates a session in the `Connecting` state.
    pub fn new(config: &ClientConfig, codec: C) -> Self {
        Self::with_correlator(config, codec, FifoQueue::new())
    }
}

impl<C: PayloadCodec, Q: Correlator> Session<C, Q> {
    /// Creates a session that correlates replies with `queue`.
    pub fn with_correlator(config: &ClientConfig, codec: C, queue: Q) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            state: SessionState::Connecting,
            persistent: config.persistent,
            cast_policy: config.cast_policy,
            max_frame_size: config.max_frame_size,
            codec,
            decoder: Decoder::with_max_payload(config.max_frame_size),
            queue,
            commands: VecDeque::new(),
            closing: false,
            replies: 0,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_persistent(&self) -> bool {
        self.persistent
    }

    /// Returns whether close has been requested.
    pub fn is_closing(&self) -> bool {
        self.closing
    }

    /// Returns the number of requests awaiting a reply.
    pub fn pending_count(&self) -> usize {
        self.queue.len()
    }

    /// Returns the number of bytes held for an incomplete frame.
    pub fn buffered(&self) -> usize {
        self.decoder.buffered()
    }

    /// Returns the number of frames processed so far.
    pub fn replies_received(&self) -> u64 {
        self.replies
    }

    /// Next instruction for the transport, if any.
    pub fn poll_command(&mut self) -> Option<Command> {
        self.commands.pop_front()
    }

    /// Transport established.
    pub fn on_connected(&mut self) {
        if self.state != SessionState::Connecting {
            tracing::warn!(session = %self.id, state = ?self.state, "unexpected connect signal");
            return;
        }
        self.decoder.clear();
        self.state = SessionState::Open;
        tracing::debug!(session = %self.id, persistent = self.persistent, "session open");
    }

    /// Validates `options` and prepares a call on this session.
    pub fn call(&mut self, options: Option<&Value>) -> Result<Invocation<&mut Self>, ClientError> {
        Ok(Invocation::new(self, RequestBuilder::call(options)?))
    }

    /// Validates `options` and prepares a cast on this session.
    pub fn cast(&mut self, options: Option<&Value>) -> Result<Invocation<&mut Self>, ClientError> {
        Ok(Invocation::new(self, RequestBuilder::cast(options)?))
    }

    /// Encodes `request`, records it as pending and queues its bytes.
    ///
    /// The request is enqueued before its bytes are handed to the transport,
    /// so no reply can arrive for it ahead of its queue entry.
    pub fn submit(&mut self, request: Request, pending: PendingRequest) {
        match self.state {
            SessionState::Connecting => {
                pending.fail(ClientError::NotConnected);
                return;
            }
            SessionState::Closed => {
                pending.fail(ClientError::SessionClosed);
                return;
            }
            SessionState::Open if self.closing => {
                pending.fail(ClientError::SessionClosed);
                return;
            }
            SessionState::Open => {}
        }

        let frame = match Encoder::encode_request_with_limit(
            &self.codec,
            &request,
            self.max_frame_size,
        ) {
            Ok(frame) => frame.freeze(),
            Err(err) => {
                tracing::warn!(session = %self.id, error = %err, "failed to encode request");
                pending.fail(err.into());
                return;
            }
        };

        tracing::debug!(
            session = %self.id,
            kind = %request.kind,
            module = %request.module,
            function = %request.function,
            bytes = frame.len(),
            "sending request"
        );

        if request.kind == RequestKind::Cast && self.cast_policy == CastPolicy::FireAndForget {
            self.commands.push_back(Command::Send(frame));
            pending.complete(Ok(Value::Null));
        } else {
            self.queue.enqueue(pending);
            self.commands.push_back(Command::Send(frame));
        }
    }

    /// Bytes arrived from the transport.
    ///
    /// Extracts complete frames and resolves the oldest pending request with
    /// each. A transient session stops after the first frame and requests
    /// close. A framing fault or a reply nobody is waiting for is fatal: close
    /// is requested and the error returned.
    pub fn on_bytes_arrived(&mut self, data: &[u8]) -> Result<(), ClientError> {
        if self.state != SessionState::Open || self.closing {
            tracing::debug!(session = %self.id, bytes = data.len(), "ignoring bytes after close");
            return Ok(());
        }

        self.decoder.extend(data);

        loop {
            let frame = match self.decoder.decode_frame() {
                Ok(Some(frame)) => frame,
                Ok(None) => break,
                Err(err) => {
                    tracing::warn!(session = %self.id, error = %err, "bad BERT frame, closing session");
                    self.request_close();
                    return Err(err.into());
                }
            };

            self.replies += 1;
            let outcome = self
                .codec
                .decode_reply(&frame.payload)
                .map_err(ClientError::from)
                .and_then(|reply| reply.into_result().map_err(ClientError::from));

            match self.queue.resolve_next(outcome) {
                Ok(kind) => {
                    tracing::debug!(
                        session = %self.id,
                        kind = %kind,
                        bytes = frame.payload.len(),
                        pending = self.queue.len(),
                        "reply delivered"
                    );
                }
                Err(err) => {
                    tracing::error!(session = %self.id, "reply with no pending request, closing session");
                    self.request_close();
                    return Err(err);
                }
            }

            if !self.persistent {
                self.request_close();
                break;
            }
        }

        Ok(())
    }

    /// Requests an orderly close.
    pub fn close(&mut self) {
        if self.state != SessionState::Closed {
            self.request_close();
        }
    }

    /// Transport gone.
    ///
    /// Fails every pending request with [`ClientError::ConnectionLost`]. When
    /// the transport reports an error the loss is abnormal and is returned
    /// as [`ClientError::Connection`].
    pub fn on_disconnected(&mut self, error: Option<std::io::Error>) -> Result<(), ClientError> {
        if self.state == SessionState::Closed {
            return Ok(());
        }

        if let Err(err) = self.decoder.finish() {
            tracing::warn!(session = %self.id, error = %err, "connection closed mid-frame");
        }

        self.state = SessionState::Closed;
        self.commands.clear();
        let failed = self.queue.fail_all(&|| ClientError::ConnectionLost);
        tracing::debug!(
            session = %self.id,
            failed,
            replies = self.replies,
            "session closed"
        );

        match error {
            Some(err) => {
                tracing::error!(session = %self.id, error = %err, "connection to server lost");
                Err(ClientError::Connection(err.to_string()))
            }
            None => Ok(()),
        }
    }

    fn request_close(&mut self) {
        if !self.closing {
            self.closing = true;
            self.commands.push_back(Command::Close);
        }
    }
}

impl<C: PayloadCodec, Q: Correlator> Dispatch for &mut Session<C, Q> {
    fn dispatch(self, request: Request) -> ResponseHandle {
        let (pending, handle) = ResponseHandle::channel(request.kind);
        self.submit(request, pending);
        handle
    }
}
