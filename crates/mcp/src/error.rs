//! Session and transport error types.

use crate::protocol::JsonRpcError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("unsupported target: {0}")]
    Target(String),

    #[error("failed to spawn tool process: {0}")]
    Spawn(std::io::Error),

    #[error("failed to connect to {endpoint}: {reason}")]
    Connect { endpoint: String, reason: String },

    #[error("handshake failed: {0}")]
    Handshake(String),

    #[error("session is closed")]
    Closed,

    #[error("tool process exited unexpectedly")]
    ServerExited,

    #[error("timeout waiting for response")]
    Timeout,

    #[error("transport I/O: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to serialize message: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("message too large: {size} bytes (max {max})")]
    MessageTooLarge { size: usize, max: usize },

    #[error("JSON-RPC error: {0}")]
    JsonRpc(#[from] JsonRpcError),
}

pub type Result<T> = std::result::Result<T, Error>;
