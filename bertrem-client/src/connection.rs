//! Connection management.
//!
//! A [`Connection`] owns one TCP socket through a background task. The task
//! is the only owner of the [`Session`]: requests reach it over a channel and
//! are enqueued and written in the same step, so queue order always equals
//! wire order.

use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::queue::{Correlator, PendingRequest};
use crate::request::ResponseHandle;
use crate::session::{Command, Session};
use bertrem_protocol::{PayloadCodec, Request};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;

/// Messages from handles to the connection task.
enum Submission {
    Request(Request, PendingRequest),
    Close,
}

/// A connection to a BERT-RPC server.
pub struct Connection {
    /// Session ID (for logs).
    id: String,
    submissions: mpsc::UnboundedSender<Submission>,
    /// Background task; yields how the session ended.
    task: Mutex<Option<JoinHandle<Result<(), ClientError>>>>,
}

impl Connection {
    /// Connects to the server and starts the connection task.
    pub async fn connect<C: PayloadCodec>(
        config: &ClientConfig,
        codec: C,
    ) -> Result<Self, ClientError> {
        let session = Session::new(config, codec);
        Self::connect_session(config, session).await
    }

    /// Connects using a prepared session, which must still be `Connecting`.
    pub async fn connect_session<C: PayloadCodec, Q: Correlator + 'static>(
        config: &ClientConfig,
        mut session: Session<C, Q>,
    ) -> Result<Self, ClientError> {
        tracing::debug!(session = %session.id(), "Connecting to {}...", config.addr);

        let connect = TcpStream::connect(config.addr.as_str());
        let stream = match config.connect_timeout() {
            Some(timeout) => tokio::time::timeout(timeout, connect).await.map_err(|_| {
                tracing::debug!("Connection timeout");
                ClientError::Timeout
            })?,
            None => connect.await,
        }
        .map_err(|e| {
            tracing::debug!("Connection failed: {}", e);
            ClientError::Io(e)
        })?;

        stream.set_nodelay(true).ok();
        session.on_connected();

        let id = session.id().to_string();
        let (submissions, rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(drive(stream, session, rx, config.read_buffer_size));

        Ok(Self {
            id,
            submissions,
            task: Mutex::new(Some(task)),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Hands a request to the connection task.
    pub fn submit(&self, request: Request) -> ResponseHandle {
        let (pending, handle) = ResponseHandle::channel(request.kind);
        if let Err(mpsc::error::SendError(submission)) =
            self.submissions.send(Submission::Request(request, pending))
        {
            if let Submission::Request(_, pending) = submission {
                pending.fail(ClientError::SessionClosed);
            }
        }
        handle
    }

    /// Returns whether the connection task has stopped.
    pub fn is_closed(&self) -> bool {
        self.submissions.is_closed()
    }

    /// Requests an orderly close. Pending requests fail with `ConnectionLost`.
    pub fn close(&self) {
        let _ = self.submissions.send(Submission::Close);
    }

    /// Waits for the connection to end.
    ///
    /// Returns `Ok(())` for a clean close, [`ClientError::Connection`] when
    /// the connection was lost abnormally and [`ClientError::Protocol`] when
    /// the server sent a bad frame. Subsequent calls return `Ok(())`.
    pub async fn closed(&self) -> Result<(), ClientError> {
        let task = self.task.lock().await.take();
        match task {
            Some(task) => task
                .await
                .map_err(|e| ClientError::Connection(e.to_string()))?,
            None => Ok(()),
        }
    }
}

/// Runs one session against its socket until the session is closed.
async fn drive<C: PayloadCodec, Q: Correlator>(
    stream: TcpStream,
    mut session: Session<C, Q>,
    mut submissions: mpsc::UnboundedReceiver<Submission>,
    read_buffer_size: usize,
) -> Result<(), ClientError> {
    let (mut reader, mut writer) = stream.into_split();
    let mut buf = vec![0u8; read_buffer_size];
    let mut accepting = true;
    // Set when the server broke the protocol; reported once pending requests are failed.
    let mut fault: Option<ClientError> = None;

    loop {
        match flush(&mut session, &mut writer).await {
            Ok(false) => {}
            Ok(true) => {
                tracing::debug!(session = %session.id(), "closing connection");
                let _ = writer.shutdown().await;
                let result = session.on_disconnected(None);
                return match fault {
                    Some(err) => Err(err),
                    None => result,
                };
            }
            Err(e) => return session.on_disconnected(Some(e)),
        }

        // Every handle is gone: finish outstanding work, then close.
        if !accepting && session.pending_count() == 0 {
            session.close();
            continue;
        }

        tokio::select! {
            read = reader.read(&mut buf) => match read {
                Ok(0) => {
                    tracing::debug!(session = %session.id(), "connection closed by server");
                    return session.on_disconnected(None);
                }
                Ok(n) => {
                    tracing::trace!(session = %session.id(), "received {} bytes", n);
                    // Faults already queued a close; it is flushed next pass.
                    if let Err(err) = session.on_bytes_arrived(&buf[..n]) {
                        fault.get_or_insert(err);
                    }
                }
                Err(e) => return session.on_disconnected(Some(e)),
            },
            submission = submissions.recv(), if accepting => match submission {
                Some(Submission::Request(request, pending)) => session.submit(request, pending),
                Some(Submission::Close) => session.close(),
                None => accepting = false,
            },
        }
    }
}

/// Writes queued bytes. Returns `true` when the session asked to close.
async fn flush<C: PayloadCodec, Q: Correlator>(
    session: &mut Session<C, Q>,
    writer: &mut OwnedWriteHalf,
) -> std::io::Result<bool> {
    while let Some(command) = session.poll_command() {
        match command {
            Command::Send(bytes) => writer.write_all(&bytes).await?,
            Command::Close => return Ok(true),
        }
    }
    Ok(false)
}
