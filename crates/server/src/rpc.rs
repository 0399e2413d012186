//! JSON-RPC dispatch, shared by both transports.

use mcp::{
    InitializeResult, JsonRpcError, JsonRpcResponse, ListToolsResult, PROTOCOL_VERSION, RequestId,
    ServerCapabilities, ServerInfo, ToolsCapability,
};
use serde_json::{Map, Value, json};

use crate::tools::ToolSet;

/// Handle one raw message. Returns `None` for notifications — nothing goes
/// back on the wire for those.
pub async fn handle_message(tools: &ToolSet, raw: &str) -> Option<String> {
    let message: Value = match serde_json::from_str(raw) {
        Ok(value) => value,
        Err(e) => {
            let response = JsonRpcResponse::failure(
                RequestId::Number(0),
                JsonRpcError::parse_error(e.to_string()),
            );
            return serde_json::to_string(&response).ok();
        }
    };

    let id = match message.get("id") {
        Some(id) => serde_json::from_value::<RequestId>(id.clone()).ok()?,
        None => {
            tracing::debug!(
                method = message["method"].as_str().unwrap_or("?"),
                "notification"
            );
            return None;
        }
    };

    let method = message["method"].as_str().unwrap_or_default();
    let params = message.get("params").cloned().unwrap_or(Value::Null);
    let response = dispatch(tools, id, method, params).await;
    serde_json::to_string(&response).ok()
}

async fn dispatch(tools: &ToolSet, id: RequestId, method: &str, params: Value) -> JsonRpcResponse {
    match method {
        "initialize" => JsonRpcResponse::success(id, initialize_result()),
        "tools/list" => {
            let result = ListToolsResult {
                tools: ToolSet::catalog(),
            };
            JsonRpcResponse::success(id, serde_json::to_value(result).unwrap_or(Value::Null))
        }
        "tools/call" => call_tool(tools, id, &params).await,
        "ping" => JsonRpcResponse::success(id, json!({})),
        other => JsonRpcResponse::failure(id, JsonRpcError::method_not_found(other)),
    }
}

async fn call_tool(tools: &ToolSet, id: RequestId, params: &Value) -> JsonRpcResponse {
    let Some(name) = params["name"].as_str().filter(|n| !n.is_empty()) else {
        return JsonRpcResponse::failure(id, JsonRpcError::invalid_params("missing tool name"));
    };
    let arguments = match params.get("arguments") {
        None | Some(Value::Null) => Map::new(),
        Some(Value::Object(map)) => map.clone(),
        Some(_) => {
            return JsonRpcResponse::failure(
                id,
                JsonRpcError::invalid_params("arguments must be an object"),
            );
        }
    };

    let result = tools.call(name, &arguments).await;
    tracing::debug!(tool = name, is_error = result.is_error, "tool call served");
    JsonRpcResponse::success(id, serde_json::to_value(result).unwrap_or(Value::Null))
}

fn initialize_result() -> Value {
    let result = InitializeResult {
        protocol_version: PROTOCOL_VERSION.to_string(),
        capabilities: ServerCapabilities {
            tools: Some(ToolsCapability {
                list_changed: false,
            }),
        },
        server_info: ServerInfo {
            name: "skipper-server".to_string(),
            version: Some(env!("CARGO_PKG_VERSION").to_string()),
        },
    };
    serde_json::to_value(result).unwrap_or(Value::Null)
}
