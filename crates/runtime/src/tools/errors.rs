use thiserror::Error;

/// Errors at the tool-execution boundary.
#[derive(Debug, Error)]
pub enum ToolError {
    /// The underlying tool session failed (transport, handshake, protocol).
    #[error(transparent)]
    Session(#[from] mcp::Error),

    /// Tool execution failed outside the session layer.
    #[error("execution failed: {0}")]
    Execution(String),
}
