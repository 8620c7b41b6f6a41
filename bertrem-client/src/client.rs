//! High-level client API.

use crate::config::ClientConfig;
use crate::connection::Connection;
use crate::error::ClientError;
use crate::request::{Dispatch, Invocation, ResponseHandle};
use bertrem_protocol::{JsonCodec, PayloadCodec, Request, RequestBuilder};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

/// High-level client for a BERT-RPC service.
///
/// ```ignore
/// let client = Client::service("127.0.0.1", 8000, false, None).await?;
/// let sum = client.call(None)?.invoke("calc", "add", vec![1.into(), 2.into()]).await?;
/// ```
#[derive(Clone)]
pub struct Client {
    conn: Arc<Connection>,
}

impl Client {
    /// Connects using the JSON payload codec.
    pub async fn connect(config: &ClientConfig) -> Result<Self, ClientError> {
        Self::connect_with_codec(config, JsonCodec).await
    }

    /// Connects using `codec` for request and reply payloads.
    pub async fn connect_with_codec<C: PayloadCodec>(
        config: &ClientConfig,
        codec: C,
    ) -> Result<Self, ClientError> {
        let conn = Connection::connect(config, codec).await?;
        Ok(Self {
            conn: Arc::new(conn),
        })
    }

    /// Connects to `host:port`.
    ///
    /// Servers such as ernie close the connection after every reply, so
    /// `persistent` should stay false unless the server keeps it open.
    pub async fn service(
        host: &str,
        port: u16,
        persistent: bool,
        connect_timeout: Option<Duration>,
    ) -> Result<Self, ClientError> {
        let mut config = ClientConfig::service(host, port).with_persistent(persistent);
        if let Some(timeout) = connect_timeout {
            config = config.with_connect_timeout(timeout);
        }
        Self::connect(&config).await
    }

    /// Validates `options` and prepares a call.
    pub fn call(&self, options: Option<&Value>) -> Result<Invocation<&Client>, ClientError> {
        Ok(Invocation::new(self, RequestBuilder::call(options)?))
    }

    /// Validates `options` and prepares a cast.
    pub fn cast(&self, options: Option<&Value>) -> Result<Invocation<&Client>, ClientError> {
        Ok(Invocation::new(self, RequestBuilder::cast(options)?))
    }

    /// Sends a fully built request.
    pub fn send(&self, request: Request) -> ResponseHandle {
        self.conn.submit(request)
    }

    /// Returns whether the connection has ended.
    pub fn is_closed(&self) -> bool {
        self.conn.is_closed()
    }

    /// Requests an orderly close.
    pub fn close(&self) {
        self.conn.close()
    }

    /// Waits for the connection to end; see [`Connection::closed`].
    pub async fn closed(&self) -> Result<(), ClientError> {
        self.conn.closed().await
    }

    /// Returns the underlying connection.
    pub fn connection(&self) -> Arc<Connection> {
        self.conn.clone()
    }
}

impl Dispatch for &Client {
    fn dispatch(self, request: Request) -> ResponseHandle {
        self.send(request)
    }
}
