//! Tool session: one logical connection to a tool server.

use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::time::timeout;

use crate::error::{Error, Result};
use crate::protocol::{
    CallToolParams, CallToolResult, InitializeParams, InitializeResult, JsonRpcRequest,
    JsonRpcResponse, ListToolsResult, RequestId, Tool,
};
use crate::transport::{Target, Transport};

/// Default bound on waiting for any single response.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

/// A session over one transport connection.
///
/// The transport is owned exclusively and never outlives the session:
/// [`ToolSession::close`] releases it on every exit path, including when
/// setup fails partway through, and is safe to call more than once.
pub struct ToolSession {
    transport: Option<Transport>,
    next_id: i64,
    timeout: Duration,
    server_info: Option<InitializeResult>,
    tools: Vec<Tool>,
}

impl ToolSession {
    /// Open a transport to the target. The session is not usable until
    /// [`ToolSession::initialize`] has completed the handshake.
    pub async fn connect(target: &Target) -> Result<Self> {
        let transport = Transport::connect(target).await?;
        Ok(Self {
            transport: Some(transport),
            next_id: 1,
            timeout: DEFAULT_TIMEOUT,
            server_info: None,
            tools: Vec::new(),
        })
    }

    /// Override the per-response timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Perform the initialize handshake.
    ///
    /// A server that does not acknowledge within the timeout, or answers
    /// with garbage, fails the whole session setup.
    pub async fn initialize(&mut self) -> Result<&InitializeResult> {
        let params = InitializeParams::default();
        let result: InitializeResult = self
            .request("initialize", Some(params))
            .await
            .map_err(|e| match e {
                Error::Timeout => Error::Handshake("no acknowledgement within timeout".to_string()),
                e => Error::Handshake(e.to_string()),
            })?;

        self.notify("notifications/initialized", None::<()>)
            .await
            .map_err(|e| Error::Handshake(e.to_string()))?;

        tracing::debug!(server = %result.server_info.name, "session initialized");
        Ok(self.server_info.insert(result))
    }

    /// Server identity, once initialized.
    pub fn server_info(&self) -> Option<&InitializeResult> {
        self.server_info.as_ref()
    }

    /// Fetch the tool catalog.
    ///
    /// Always re-queries the server; the remote is the only source of
    /// truth. The returned catalog is also cached for [`ToolSession::tools`].
    pub async fn list_tools(&mut self) -> Result<Vec<Tool>> {
        let result: ListToolsResult = self.request("tools/list", None::<()>).await?;
        self.tools = result.tools.clone();
        Ok(result.tools)
    }

    /// Last-known tool catalog.
    pub fn tools(&self) -> &[Tool] {
        &self.tools
    }

    /// Invoke a tool and wait for its result.
    ///
    /// The name is forwarded even if it is missing from the last-known
    /// catalog; the remote is authoritative. A remote error on this method
    /// comes back as an error-flagged result rather than `Err`, so callers
    /// can feed the failure back into a conversation as context.
    pub async fn call_tool(
        &mut self,
        name: &str,
        arguments: Option<serde_json::Value>,
    ) -> Result<CallToolResult> {
        let params = CallToolParams {
            name: name.to_string(),
            arguments,
        };
        match self.request("tools/call", Some(params)).await {
            Ok(result) => Ok(result),
            Err(Error::JsonRpc(err)) => Ok(CallToolResult::error_text(err.to_string())),
            Err(e) => Err(e),
        }
    }

    /// Release the transport. Idempotent; later requests fail with
    /// [`Error::Closed`].
    pub async fn close(&mut self) {
        if let Some(mut transport) = self.transport.take() {
            transport.close().await;
        }
    }

    // --- Internal methods ---

    async fn request<P, R>(&mut self, method: &str, params: Option<P>) -> Result<R>
    where
        P: Serialize,
        R: DeserializeOwned,
    {
        let id = RequestId::Number(self.next_id);
        self.next_id += 1;

        let mut request = JsonRpcRequest::new(id.clone(), method);
        if let Some(p) = params {
            request = request.with_params(p);
        }
        let payload = serde_json::to_string(&request)?;

        let io_timeout = self.timeout;
        let transport = self.transport.as_mut().ok_or(Error::Closed)?;
        transport.send(&payload).await?;

        let response = loop {
            let line = timeout(io_timeout, transport.recv())
                .await
                .map_err(|_| Error::Timeout)??;
            // Anything that does not parse as a response (e.g. a
            // server-initiated notification) is not ours to handle.
            let Ok(response) = serde_json::from_str::<JsonRpcResponse>(&line) else {
                continue;
            };
            break response;
        };

        if response.id != id {
            return Err(Error::InvalidResponse(format!(
                "response ID mismatch: expected {id:?}, got {:?}",
                response.id
            )));
        }

        let result = response.into_result()?;
        Ok(serde_json::from_value(result)?)
    }

    async fn notify<P>(&mut self, method: &str, params: Option<P>) -> Result<()>
    where
        P: Serialize,
    {
        // Notifications have no ID and expect no response.
        let notification = serde_json::json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params.and_then(|p| serde_json::to_value(p).ok()),
        });
        let payload = serde_json::to_string(&notification)?;
        self.transport.as_mut().ok_or(Error::Closed)?.send(&payload).await
    }
}
