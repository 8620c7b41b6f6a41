//! bertrem - BERT-RPC client
//!
//! Re-exports the client API and the wire protocol crate.
//!
//! ```ignore
//! use bertrem::{Client, ClientConfig};
//!
//! let config = ClientConfig::service("127.0.0.1", 8000).with_persistent(true);
//! let client = Client::connect(&config).await?;
//! let sum = client.call(None)?.invoke("calc", "add", vec![1.into(), 2.into()]).await?;
//! ```

pub use bertrem_client::*;
pub use bertrem_protocol as protocol;
