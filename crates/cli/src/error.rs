//! CLI error types.

use thiserror::Error;

/// CLI errors.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new variants
/// in future versions without breaking downstream code.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Configuration is invalid or missing required values.
    #[error(transparent)]
    Config(#[from] crate::config::ConfigError),

    /// Target parsing or tool-session setup failed.
    #[error(transparent)]
    Mcp(#[from] mcp::Error),

    /// Tool host setup failed.
    #[error(transparent)]
    Tool(#[from] runtime::ToolError),

    /// The gateway could not be constructed.
    #[error(transparent)]
    Gateway(#[from] runtime::GatewayError),

    /// An error occurred in the runtime layer.
    #[error(transparent)]
    Runtime(#[from] runtime::Error),

    /// An I/O error occurred.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
