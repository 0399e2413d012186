//! Skipper runtime — conversation orchestration over a model gateway and a
//! tool session.
//!
//! # Overview
//!
//! The runtime is organized around these concepts:
//!
//! - **Session**: owns the conversation history and the tool host, and runs
//!   the orchestration loop: gateway call, tool execution, repeat until the
//!   model answers directly.
//! - **Gateway**: a trait abstracting chat-completion endpoints; the
//!   production implementation speaks the OpenAI-compatible
//!   function-calling dialect.
//! - **ToolHost**: a trait abstracting tool execution; the production
//!   implementation drives an MCP tool session.
//!
//! # Example
//!
//! ```ignore
//! use mcp::Target;
//! use runtime::{McpToolHost, OpenAiGateway, Session};
//!
//! # async fn example() -> runtime::Result<()> {
//! let gateway = OpenAiGateway::new("https://api.example.com/v4", "key", "some-model")?;
//! let target = Target::parse("http://127.0.0.1:8000")?;
//! let tools = McpToolHost::connect(&target).await?;
//!
//! let mut session = Session::new(gateway, tools);
//! let answer = session.submit("weather in Huaiyin?").await?;
//! println!("{answer}");
//! session.shutdown().await;
//! # Ok(())
//! # }
//! ```

mod error;
pub mod model;
mod session;
pub mod tools;

pub use error::{Error, Result};
pub use model::{
    Gateway, GatewayError, GatewayReply, GatewayRequest, Message, OpenAiGateway, ToolArguments,
    ToolCallRequest, ToolDeclaration,
};
pub use session::{Session, SessionId, SessionOptions};
pub use tools::{McpToolHost, ToolError, ToolHost, ToolOutput};
