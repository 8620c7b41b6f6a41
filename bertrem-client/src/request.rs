//! Request handles and invocation.

use crate::error::ClientError;
use crate::queue::{PendingRequest, RequestResult};
use bertrem_protocol::{Request, RequestBuilder, RequestKind};
use serde_json::Value;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::oneshot;
use tokio::sync::oneshot::error::TryRecvError;

/// Observed state of a request.
#[derive(Debug)]
pub enum Outcome {
    Pending,
    Resolved(Value),
    Failed(ClientError),
}

/// Caller-side view of one request. Resolves exactly once.
///
/// Await it for the result, or poll it without blocking via
/// [`ResponseHandle::try_outcome`].
#[derive(Debug)]
pub struct ResponseHandle {
    kind: RequestKind,
    rx: oneshot::Receiver<RequestResult>,
}

impl ResponseHandle {
    /// Creates a linked pending request and handle.
    pub fn channel(kind: RequestKind) -> (PendingRequest, ResponseHandle) {
        let (tx, rx) = oneshot::channel();
        (PendingRequest::new(kind, tx), ResponseHandle { kind, rx })
    }

    /// A handle that has already failed.
    pub fn failed(kind: RequestKind, error: ClientError) -> Self {
        let (pending, handle) = Self::channel(kind);
        pending.fail(error);
        handle
    }

    pub fn kind(&self) -> RequestKind {
        self.kind
    }

    /// Checks for an outcome without waiting.
    ///
    /// A terminal outcome is handed over once; the handle is spent after that.
    pub fn try_outcome(&mut self) -> Outcome {
        match self.rx.try_recv() {
            Ok(Ok(value)) => Outcome::Resolved(value),
            Ok(Err(err)) => Outcome::Failed(err),
            Err(TryRecvError::Empty) => Outcome::Pending,
            Err(TryRecvError::Closed) => Outcome::Failed(ClientError::ConnectionLost),
        }
    }
}

impl Future for ResponseHandle {
    type Output = RequestResult;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|received| received.unwrap_or(Err(ClientError::ConnectionLost)))
    }
}

/// Something that can transmit a request and hand back its handle.
pub trait Dispatch {
    fn dispatch(self, request: Request) -> ResponseHandle;
}

/// A validated call or cast bound to the session or client that will send it.
pub struct Invocation<D> {
    target: D,
    builder: RequestBuilder,
}

impl<D: Dispatch> Invocation<D> {
    pub fn new(target: D, builder: RequestBuilder) -> Self {
        Self { target, builder }
    }

    pub fn kind(&self) -> RequestKind {
        self.builder.kind()
    }

    /// Sends `module:function(args)`.
    pub fn invoke(
        self,
        module: impl Into<String>,
        function: impl Into<String>,
        args: Vec<Value>,
    ) -> ResponseHandle {
        let request = self.builder.invoke(module, function, args);
        self.target.dispatch(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_handle_resolves() {
        let (pending, handle) = ResponseHandle::channel(RequestKind::Call);
        assert!(pending.complete(Ok(json!({"ok": true}))));
        assert_eq!(handle.await.unwrap(), json!({"ok": true}));
    }

    #[tokio::test]
    async fn test_handle_sender_dropped() {
        let (pending, handle) = ResponseHandle::channel(RequestKind::Call);
        drop(pending);
        assert!(matches!(handle.await, Err(ClientError::ConnectionLost)));
    }

    #[test]
    fn test_handle_pending_until_completed() {
        let (pending, handle) = ResponseHandle::channel(RequestKind::Call);
        let mut task = tokio_test::task::spawn(handle);
        tokio_test::assert_pending!(task.poll());

        pending.complete(Ok(json!(7)));
        assert!(task.is_woken());
        let value = tokio_test::assert_ready_ok!(task.poll());
        assert_eq!(value, json!(7));
    }

    #[test]
    fn test_try_outcome() {
        let (pending, mut handle) = ResponseHandle::channel(RequestKind::Cast);
        assert_eq!(handle.kind(), RequestKind::Cast);
        assert!(matches!(handle.try_outcome(), Outcome::Pending));

        pending.complete(Ok(Value::Null));
        assert!(matches!(handle.try_outcome(), Outcome::Resolved(Value::Null)));
    }

    #[test]
    fn test_failed_handle() {
        let mut handle = ResponseHandle::failed(RequestKind::Call, ClientError::NotConnected);
        assert!(matches!(
            handle.try_outcome(),
            Outcome::Failed(ClientError::NotConnected)
        ));
    }

    struct Recorder<'a>(&'a mut Vec<Request>);

    impl Dispatch for Recorder<'_> {
        fn dispatch(self, request: Request) -> ResponseHandle {
            let kind = request.kind;
            self.0.push(request);
            let (pending, handle) = ResponseHandle::channel(kind);
            pending.complete(Ok(Value::Null));
            handle
        }
    }

    #[test]
    fn test_invocation_dispatches_request() {
        let mut sent = Vec::new();
        let builder = RequestBuilder::cast(None).unwrap();
        let invocation = Invocation::new(Recorder(&mut sent), builder);
        assert_eq!(invocation.kind(), RequestKind::Cast);

        let mut handle = invocation.invoke("log", "info", vec![json!("started")]);
        assert!(matches!(handle.try_outcome(), Outcome::Resolved(_)));
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].module, "log");
        assert_eq!(sent[0].function, "info");
    }
}
