//! Tool execution boundary.
//!
//! This is the seam between the conversation loop and side effects: list
//! what can be called, call it, release the underlying connection.

mod errors;
mod mcp_host;

pub use errors::ToolError;
pub use mcp_host::McpToolHost;

use crate::model::ToolDeclaration;
use serde_json::Value;
use std::future::Future;

/// Result payload of one tool invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolOutput {
    pub content: String,
    pub is_error: bool,
}

impl ToolOutput {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            is_error: false,
        }
    }

    pub fn error(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            is_error: true,
        }
    }
}

/// Trait for tool execution hosts.
///
/// Methods take `&mut self`: a host belongs to exactly one session and is
/// driven strictly sequentially.
pub trait ToolHost: Send {
    /// Fetch the current tool catalog. Always re-queries the source of
    /// truth; no staleness guarantee is assumed.
    fn list_tools(&mut self) -> impl Future<Output = Result<Vec<ToolDeclaration>, ToolError>> + Send;

    /// Execute a named tool. Remote-side failures come back as an
    /// error-flagged [`ToolOutput`], not `Err`; `Err` means the host
    /// itself broke (transport gone, timeout).
    fn call(
        &mut self,
        name: &str,
        arguments: Value,
    ) -> impl Future<Output = Result<ToolOutput, ToolError>> + Send;

    /// Release the underlying connection. Must be safe to call repeatedly.
    fn close(&mut self) -> impl Future<Output = ()> + Send;
}
