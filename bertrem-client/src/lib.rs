//! # bertrem-client
//!
//! Client library for BERT-RPC servers.
//!
//! This crate provides:
//! - A sans-IO session that frames requests and correlates replies in FIFO order
//! - Persistent (pipelined) and transient (one reply, then close) connections
//! - An async TCP driver with an optional connect timeout
//! - Configuration from YAML files and environment variables

pub mod client;
pub mod config;
pub mod connection;
pub mod error;
pub mod queue;
pub mod request;
pub mod session;

pub use client::Client;
pub use config::{CastPolicy, ClientConfig, ConfigError};
pub use connection::Connection;
pub use error::ClientError;
pub use queue::{Correlator, FifoQueue, PendingRequest};
pub use request::{Dispatch, Invocation, Outcome, ResponseHandle};
pub use session::{Command, Session, SessionState};
