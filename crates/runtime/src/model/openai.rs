//! OpenAI-compatible chat-completion gateway.
//!
//! Speaks the `/chat/completions` function-calling dialect, which is what
//! the hosted endpoints this agent targets expose. The gateway is
//! stateless: history and tool declarations travel with every request.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::errors::GatewayError;
use super::types::{
    Gateway, GatewayReply, GatewayRequest, Message, ToolArguments, ToolCallRequest,
    ToolDeclaration,
};

/// TCP connection timeout.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Total request timeout. Generous: a turn over a large context can take a
/// while to first byte.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

// --- API wire types ---

#[derive(Debug, Serialize)]
struct ApiRequest {
    model: String,
    messages: Vec<ApiMessage>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<ApiTool>,
}

#[derive(Debug, Serialize)]
struct ApiMessage {
    role: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tool_calls: Vec<ApiToolCall>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiToolCall {
    #[serde(default)]
    id: String,
    #[serde(rename = "type")]
    kind: String,
    function: ApiFunctionCall,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiFunctionCall {
    name: String,
    /// Arguments as a JSON-encoded string, per the function-calling dialect.
    #[serde(default)]
    arguments: String,
}

#[derive(Debug, Serialize)]
struct ApiTool {
    #[serde(rename = "type")]
    kind: &'static str,
    function: ApiFunction,
}

#[derive(Debug, Serialize)]
struct ApiFunction {
    name: String,
    description: String,
    parameters: Value,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    choices: Vec<ApiChoice>,
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    message: ApiChoiceMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiChoiceMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Vec<ApiToolCall>,
}

// --- Gateway implementation ---

/// Client for an OpenAI-compatible chat-completion endpoint.
pub struct OpenAiGateway {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl OpenAiGateway {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Result<Self, GatewayError> {
        let http = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| GatewayError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: model.into(),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn message_to_api(message: &Message) -> ApiMessage {
        match message {
            Message::User { content } => ApiMessage {
                role: "user",
                content: Some(content.clone()),
                tool_call_id: None,
                tool_calls: Vec::new(),
            },
            Message::Assistant {
                content,
                tool_calls,
            } => ApiMessage {
                role: "assistant",
                content: content.clone(),
                tool_call_id: None,
                tool_calls: tool_calls.iter().map(Self::call_to_api).collect(),
            },
            Message::Tool {
                tool_call_id,
                content,
            } => ApiMessage {
                role: "tool",
                content: Some(content.clone()),
                tool_call_id: Some(tool_call_id.clone()),
                tool_calls: Vec::new(),
            },
        }
    }

    fn call_to_api(call: &ToolCallRequest) -> ApiToolCall {
        ApiToolCall {
            id: call.id.clone(),
            kind: "function".to_string(),
            function: ApiFunctionCall {
                name: call.name.clone(),
                arguments: call.arguments.to_wire_string(),
            },
        }
    }

    fn tool_to_api(decl: &ToolDeclaration) -> ApiTool {
        ApiTool {
            kind: "function",
            function: ApiFunction {
                name: decl.name.clone(),
                description: decl.description.clone(),
                parameters: decl.input_schema.clone(),
            },
        }
    }

    fn call_from_api(call: ApiToolCall) -> ToolCallRequest {
        // Some endpoints omit the correlation id; synthesize one so the
        // result can still be paired.
        let id = if call.id.is_empty() {
            format!("call_{}", Uuid::new_v4())
        } else {
            call.id
        };
        ToolCallRequest {
            id,
            name: call.function.name,
            arguments: ToolArguments::parse(&call.function.arguments),
        }
    }

    fn reply_from_choice(choice: ApiChoice) -> GatewayReply {
        let wants_tools = choice.finish_reason.as_deref() == Some("tool_calls")
            || !choice.message.tool_calls.is_empty();

        if wants_tools && !choice.message.tool_calls.is_empty() {
            GatewayReply::ToolCalls {
                content: choice.message.content,
                calls: choice
                    .message
                    .tool_calls
                    .into_iter()
                    .map(Self::call_from_api)
                    .collect(),
            }
        } else {
            // Empty content from the endpoint is a valid (empty) answer.
            GatewayReply::Final {
                content: choice.message.content.unwrap_or_default(),
            }
        }
    }
}

impl Gateway for OpenAiGateway {
    async fn complete(&self, request: GatewayRequest<'_>) -> Result<GatewayReply, GatewayError> {
        let api_request = ApiRequest {
            model: self.model.clone(),
            messages: request.messages.iter().map(Self::message_to_api).collect(),
            tools: request.tools.iter().map(Self::tool_to_api).collect(),
        };

        let url = format!("{}/chat/completions", self.base_url);
        tracing::debug!(
            url = %url,
            model = %api_request.model,
            message_count = api_request.messages.len(),
            tool_count = api_request.tools.len(),
            "gateway request"
        );

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&api_request)
            .send()
            .await
            .map_err(|e| GatewayError::Network(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(GatewayError::Api(format!("{status}: {body}")));
        }

        let api_response: ApiResponse = response
            .json()
            .await
            .map_err(|e| GatewayError::InvalidResponse(e.to_string()))?;

        let choice = api_response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| GatewayError::InvalidResponse("response contained no choices".into()))?;

        Ok(Self::reply_from_choice(choice))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn choice(json: &str) -> ApiChoice {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn final_reply_from_text_choice() {
        let reply = OpenAiGateway::reply_from_choice(choice(
            r#"{"message": {"content": "It is sunny."}, "finish_reason": "stop"}"#,
        ));
        match reply {
            GatewayReply::Final { content } => assert_eq!(content, "It is sunny."),
            other => panic!("expected final, got {other:?}"),
        }
    }

    #[test]
    fn empty_content_is_a_valid_answer() {
        let reply = OpenAiGateway::reply_from_choice(choice(
            r#"{"message": {"content": null}, "finish_reason": "stop"}"#,
        ));
        match reply {
            GatewayReply::Final { content } => assert_eq!(content, ""),
            other => panic!("expected final, got {other:?}"),
        }
    }

    #[test]
    fn tool_call_reply_parses_arguments() {
        let reply = OpenAiGateway::reply_from_choice(choice(
            r#"{
                "message": {
                    "content": null,
                    "tool_calls": [{
                        "id": "call_1",
                        "type": "function",
                        "function": {"name": "query_adcode", "arguments": "{\"region_name\": \"Huaiyin\"}"}
                    }]
                },
                "finish_reason": "tool_calls"
            }"#,
        ));
        match reply {
            GatewayReply::ToolCalls { calls, .. } => {
                assert_eq!(calls.len(), 1);
                assert_eq!(calls[0].id, "call_1");
                assert_eq!(calls[0].name, "query_adcode");
                let map = calls[0].arguments.as_object().unwrap();
                assert_eq!(map["region_name"], "Huaiyin");
            }
            other => panic!("expected tool calls, got {other:?}"),
        }
    }

    #[test]
    fn malformed_arguments_are_preserved() {
        let reply = OpenAiGateway::reply_from_choice(choice(
            r#"{
                "message": {
                    "tool_calls": [{
                        "id": "call_2",
                        "type": "function",
                        "function": {"name": "query_weather", "arguments": "{\"adcode\": "}
                    }]
                },
                "finish_reason": "tool_calls"
            }"#,
        ));
        match reply {
            GatewayReply::ToolCalls { calls, .. } => {
                assert!(calls[0].arguments.as_object().is_none());
            }
            other => panic!("expected tool calls, got {other:?}"),
        }
    }

    #[test]
    fn missing_call_id_is_synthesized() {
        let reply = OpenAiGateway::reply_from_choice(choice(
            r#"{
                "message": {
                    "tool_calls": [{
                        "type": "function",
                        "function": {"name": "web_search", "arguments": "{}"}
                    }]
                },
                "finish_reason": "tool_calls"
            }"#,
        ));
        match reply {
            GatewayReply::ToolCalls { calls, .. } => {
                assert!(calls[0].id.starts_with("call_"));
            }
            other => panic!("expected tool calls, got {other:?}"),
        }
    }

    #[test]
    fn history_serializes_to_wire_shape() {
        let call = ToolCallRequest {
            id: "call_9".to_string(),
            name: "query_weather".to_string(),
            arguments: ToolArguments::parse(r#"{"adcode":"370104"}"#),
        };
        let api = OpenAiGateway::message_to_api(&Message::tool_calls(None, vec![call]));
        let json = serde_json::to_value(&api).unwrap();
        assert_eq!(json["role"], "assistant");
        assert!(json.get("content").is_none());
        assert_eq!(json["tool_calls"][0]["function"]["name"], "query_weather");
        assert_eq!(
            json["tool_calls"][0]["function"]["arguments"],
            r#"{"adcode":"370104"}"#
        );
    }
}
