//! Network layer for httpsink
//!
//! One tokio task per inbound connection, all sharing a single capture store.

mod http;
mod server;

pub use http::{ErrorDetail, ErrorResponse, HttpHandler, SinkResponse};
pub use server::{ShutdownHandle, SinkServer};

/// Graceful shutdown timeout
pub const SHUTDOWN_TIMEOUT_MS: u64 = 5000;
