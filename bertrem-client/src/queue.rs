//! Pending-request bookkeeping.
//!
//! BERT-RPC carries no request IDs: the server answers in the order it was
//! asked, so the oldest outstanding request always owns the next reply.
//! [`Correlator`] isolates that rule from the session so an ID-tagged
//! variant can be plugged in without touching framing.

use crate::error::ClientError;
use bertrem_protocol::RequestKind;
use serde_json::Value;
use std::collections::VecDeque;
use tokio::sync::oneshot;

/// Result delivered to a request handle.
pub type RequestResult = Result<Value, ClientError>;

/// The sending side of one request's outcome.
#[derive(Debug)]
pub struct PendingRequest {
    kind: RequestKind,
    completion: oneshot::Sender<RequestResult>,
}

impl PendingRequest {
    pub(crate) fn new(kind: RequestKind, completion: oneshot::Sender<RequestResult>) -> Self {
        Self { kind, completion }
    }

    pub fn kind(&self) -> RequestKind {
        self.kind
    }

    /// Delivers the outcome. Returns `false` if the handle was dropped.
    pub fn complete(self, outcome: RequestResult) -> bool {
        self.completion.send(outcome).is_ok()
    }

    /// Delivers a failure.
    pub fn fail(self, error: ClientError) -> bool {
        self.complete(Err(error))
    }
}

/// Matches incoming replies to outstanding requests.
pub trait Correlator: Send {
    /// Records a request at the moment it is transmitted.
    fn enqueue(&mut self, request: PendingRequest);

    /// Hands `outcome` to the request that owns the next reply.
    ///
    /// Fails with [`ClientError::UnexpectedResponse`] when no request is
    /// outstanding.
    fn resolve_next(&mut self, outcome: RequestResult) -> Result<RequestKind, ClientError>;

    /// Fails every outstanding request in order and empties the queue.
    /// Returns how many requests were failed.
    fn fail_all(&mut self, error: &dyn Fn() -> ClientError) -> usize;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// First-in, first-out correlation.
#[derive(Debug, Default)]
pub struct FifoQueue {
    entries: VecDeque<PendingRequest>,
}

impl FifoQueue {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Correlator for FifoQueue {
    fn enqueue(&mut self, request: PendingRequest) {
        self.entries.push_back(request);
    }

    fn resolve_next(&mut self, outcome: RequestResult) -> Result<RequestKind, ClientError> {
        let head = self
            .entries
            .pop_front()
            .ok_or(ClientError::UnexpectedResponse)?;
        let kind = head.kind();
        if !head.complete(outcome) {
            tracing::debug!("reply for dropped {} handle discarded", kind);
        }
        Ok(kind)
    }

    fn fail_all(&mut self, error: &dyn Fn() -> ClientError) -> usize {
        let count = self.entries.len();
        for pending in self.entries.drain(..) {
            pending.fail(error());
        }
        count
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}
