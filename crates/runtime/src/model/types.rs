//! Conversation and gateway types (endpoint-agnostic).
//!
//! These types model what the loop needs to know; wire formats belong in
//! the gateway implementations.

use super::errors::GatewayError;
use serde::Serialize;
use serde_json::{Map, Value};
use std::future::Future;

/// A message in the conversation, tagged by role.
///
/// The sequence is append-only: the session host inserts user messages,
/// the loop appends everything else, and order defines the context the
/// model sees.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum Message {
    User {
        content: String,
    },
    /// Assistant turn. `content` is absent when the model only requested
    /// tool calls; an explicitly empty answer is kept as `Some("")`.
    Assistant {
        content: Option<String>,
        #[serde(skip_serializing_if = "Vec::is_empty")]
        tool_calls: Vec<ToolCallRequest>,
    },
    /// Result of one tool call, correlated by the id the model assigned.
    Tool {
        tool_call_id: String,
        content: String,
    },
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self::User {
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::Assistant {
            content: Some(content.into()),
            tool_calls: Vec::new(),
        }
    }

    pub fn tool_calls(content: Option<String>, calls: Vec<ToolCallRequest>) -> Self {
        Self::Assistant {
            content,
            tool_calls: calls,
        }
    }

    pub fn tool_result(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self::Tool {
            tool_call_id: tool_call_id.into(),
            content: content.into(),
        }
    }

    pub fn role(&self) -> &'static str {
        match self {
            Self::User { .. } => "user",
            Self::Assistant { .. } => "assistant",
            Self::Tool { .. } => "tool",
        }
    }
}

/// A tool invocation requested by the model.
#[derive(Debug, Clone, Serialize)]
pub struct ToolCallRequest {
    /// Correlation id linking this call to its result.
    pub id: String,
    pub name: String,
    pub arguments: ToolArguments,
}

/// Argument payload of a tool call.
///
/// Gateways hand arguments over as text. Anything that does not parse as a
/// JSON object is kept verbatim, so the failure can be reported back into
/// the conversation instead of aborting the turn or invoking a tool with
/// garbage.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum ToolArguments {
    Object(Map<String, Value>),
    Malformed { raw: String, error: String },
}

impl ToolArguments {
    /// Parse a raw argument payload. An empty payload means "no arguments".
    pub fn parse(raw: &str) -> Self {
        if raw.trim().is_empty() {
            return Self::Object(Map::new());
        }
        match serde_json::from_str::<Value>(raw) {
            Ok(Value::Object(map)) => Self::Object(map),
            Ok(other) => Self::Malformed {
                raw: raw.to_string(),
                error: format!("expected a JSON object, got {}", value_kind(&other)),
            },
            Err(e) => Self::Malformed {
                raw: raw.to_string(),
                error: e.to_string(),
            },
        }
    }

    pub fn object(map: Map<String, Value>) -> Self {
        Self::Object(map)
    }

    pub fn as_object(&self) -> Option<&Map<String, Value>> {
        match self {
            Self::Object(map) => Some(map),
            Self::Malformed { .. } => None,
        }
    }

    /// Re-serialize for a wire format that carries arguments as a string.
    /// Malformed payloads go back out exactly as they came in.
    pub fn to_wire_string(&self) -> String {
        match self {
            Self::Object(map) => {
                serde_json::to_string(&Value::Object(map.clone())).unwrap_or_else(|_| "{}".into())
            }
            Self::Malformed { raw, .. } => raw.clone(),
        }
    }
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// A tool declaration forwarded verbatim to the model.
#[derive(Debug, Clone, Serialize)]
pub struct ToolDeclaration {
    pub name: String,
    pub description: String,
    /// JSON Schema for input parameters; opaque pass-through data.
    pub input_schema: Value,
}

/// Everything needed for one gateway call.
#[derive(Debug, Clone)]
pub struct GatewayRequest<'a> {
    pub messages: &'a [Message],
    pub tools: &'a [ToolDeclaration],
}

/// What the model decided to do next.
#[derive(Debug, Clone)]
pub enum GatewayReply {
    /// The model answered directly. Empty content is a valid answer.
    Final { content: String },
    /// The model wants tool results before answering. `content` carries
    /// any assistant text that accompanied the calls.
    ToolCalls {
        content: Option<String>,
        calls: Vec<ToolCallRequest>,
    },
}

/// Trait for chat-completion gateways.
///
/// Stateless: history and tool declarations travel with every request.
pub trait Gateway: Send + Sync {
    fn complete(
        &self,
        request: GatewayRequest<'_>,
    ) -> impl Future<Output = Result<GatewayReply, GatewayError>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arguments_parse_object() {
        let args = ToolArguments::parse(r#"{"region_name": "Haidian"}"#);
        let map = args.as_object().unwrap();
        assert_eq!(map["region_name"], "Haidian");
    }

    #[test]
    fn arguments_parse_empty_is_empty_object() {
        let args = ToolArguments::parse("  ");
        assert!(args.as_object().unwrap().is_empty());
    }

    #[test]
    fn arguments_parse_non_object_is_malformed() {
        let args = ToolArguments::parse(r#"[1, 2]"#);
        match args {
            ToolArguments::Malformed { raw, error } => {
                assert_eq!(raw, "[1, 2]");
                assert!(error.contains("array"));
            }
            other => panic!("expected malformed, got {other:?}"),
        }
    }

    #[test]
    fn arguments_parse_garbage_is_malformed() {
        let args = ToolArguments::parse(r#"{"adcode": "#);
        assert!(args.as_object().is_none());
    }

    #[test]
    fn arguments_wire_round_trip() {
        let args = ToolArguments::parse(r#"{"adcode":"370104"}"#);
        assert_eq!(args.to_wire_string(), r#"{"adcode":"370104"}"#);

        let bad = ToolArguments::parse("not json");
        assert_eq!(bad.to_wire_string(), "not json");
    }

    #[test]
    fn message_roles() {
        assert_eq!(Message::user("hi").role(), "user");
        assert_eq!(Message::assistant("ok").role(), "assistant");
        assert_eq!(Message::tool_result("id", "out").role(), "tool");
    }

    #[test]
    fn assistant_tool_call_message_has_no_content() {
        let call = ToolCallRequest {
            id: "call_1".to_string(),
            name: "query_weather".to_string(),
            arguments: ToolArguments::parse("{}"),
        };
        let msg = Message::tool_calls(None, vec![call]);
        match msg {
            Message::Assistant {
                content,
                tool_calls,
            } => {
                assert!(content.is_none());
                assert_eq!(tool_calls.len(), 1);
            }
            other => panic!("expected assistant, got {other:?}"),
        }
    }
}
