//! MCP (Model Context Protocol) client library.
//!
//! This crate connects to tool servers over two transports — a spawned
//! child process speaking line-delimited JSON on stdio, or a remote SSE
//! endpoint — and drives the initialize / list / call lifecycle over
//! either one through the same [`ToolSession`] surface.
//!
//! # Example
//!
//! ```no_run
//! use mcp::{Target, ToolSession};
//!
//! # async fn example() -> mcp::Result<()> {
//! let target = Target::parse("http://127.0.0.1:8000")?;
//! let mut session = ToolSession::connect(&target).await?;
//! session.initialize().await?;
//!
//! for tool in session.list_tools().await? {
//!     println!("tool: {}", tool.name);
//! }
//!
//! let result = session
//!     .call_tool("query_adcode", Some(serde_json::json!({ "region_name": "Haidian" })))
//!     .await?;
//! println!("{}", result.joined_text());
//!
//! session.close().await;
//! # Ok(())
//! # }
//! ```

mod error;
mod protocol;
mod session;
mod transport;

pub use error::{Error, Result};
pub use protocol::{
    CallToolParams, CallToolResult, ClientCapabilities, ClientInfo, InitializeParams,
    InitializeResult, JsonRpcError, JsonRpcRequest, JsonRpcResponse, ListToolsResult,
    PROTOCOL_VERSION, RequestId, ServerCapabilities, ServerInfo, Tool, ToolContent,
    ToolsCapability, error_codes,
};
pub use session::{DEFAULT_TIMEOUT, ToolSession};
pub use transport::{MAX_MESSAGE_SIZE, SseTransport, StdioTransport, Target, Transport};
