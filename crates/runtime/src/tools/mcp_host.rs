//! Tool host backed by an MCP tool session.

use super::{ToolError, ToolHost, ToolOutput};
use crate::model::ToolDeclaration;
use mcp::{Target, Tool, ToolSession};
use serde_json::Value;

/// Tool host over one MCP session.
pub struct McpToolHost {
    session: ToolSession,
}

impl McpToolHost {
    /// Connect to the target and run the handshake.
    ///
    /// On a failed handshake the transport is released before the error is
    /// returned; nothing leaks from a half-set-up session.
    pub async fn connect(target: &Target) -> Result<Self, ToolError> {
        let mut session = ToolSession::connect(target).await?;
        if let Err(e) = session.initialize().await {
            session.close().await;
            return Err(e.into());
        }
        Ok(Self { session })
    }

    /// Server identity from the handshake.
    pub fn server_name(&self) -> Option<&str> {
        self.session
            .server_info()
            .map(|info| info.server_info.name.as_str())
    }
}

impl ToolHost for McpToolHost {
    async fn list_tools(&mut self) -> Result<Vec<ToolDeclaration>, ToolError> {
        let tools = self.session.list_tools().await?;
        Ok(tools.into_iter().map(ToolDeclaration::from).collect())
    }

    async fn call(&mut self, name: &str, arguments: Value) -> Result<ToolOutput, ToolError> {
        // An empty argument object is elided on the wire.
        let arguments = match &arguments {
            Value::Object(map) if map.is_empty() => None,
            _ => Some(arguments),
        };
        let result = self.session.call_tool(name, arguments).await?;
        Ok(ToolOutput {
            content: result.joined_text(),
            is_error: result.is_error,
        })
    }

    async fn close(&mut self) {
        self.session.close().await;
    }
}

impl From<Tool> for ToolDeclaration {
    fn from(tool: Tool) -> Self {
        Self {
            name: tool.name,
            description: tool.description.unwrap_or_default(),
            input_schema: tool.input_schema,
        }
    }
}
