//! Conversation session: history, orchestration loop, tool-session lifetime.

use serde_json::Value;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::model::{Gateway, GatewayReply, GatewayRequest, Message, ToolArguments, ToolCallRequest};
use crate::tools::{ToolHost, ToolOutput};

/// Unique identifier for one conversation session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Limits applied to each submitted query.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Maximum gateway round-trips per query. A model that keeps asking
    /// for tools past this bound fails that query with
    /// [`Error::LoopBound`] instead of running forever.
    pub max_rounds: usize,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self { max_rounds: 24 }
    }
}

/// A conversation session.
///
/// Owns the ordered message history and the tool host (and through it the
/// transport connection); both live exactly as long as the session. One
/// session processes one query at a time — history has a single writer.
pub struct Session<G, T> {
    pub id: SessionId,
    gateway: G,
    tools: T,
    messages: Vec<Message>,
    options: SessionOptions,
}

impl<G: Gateway, T: ToolHost> Session<G, T> {
    pub fn new(gateway: G, tools: T) -> Self {
        Self::with_options(gateway, tools, SessionOptions::default())
    }

    pub fn with_options(gateway: G, tools: T, options: SessionOptions) -> Self {
        Self {
            id: SessionId::new(),
            gateway,
            tools,
            messages: Vec::new(),
            options,
        }
    }

    /// The accumulated conversation history.
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Run one full orchestration loop for a user query.
    ///
    /// Appends the query, then alternates gateway calls and tool
    /// executions until the model answers directly. Every requested call
    /// is answered with a tool message before the next gateway call —
    /// history never contains a dangling call. Tool failures come back as
    /// error-flagged results in the conversation instead of aborting the
    /// turn; only gateway failures and the round bound end a query early.
    pub async fn submit(&mut self, query: &str) -> Result<String> {
        self.messages.push(Message::user(query));

        // Current truth from the server, re-fetched per query.
        let declarations = self.tools.list_tools().await?;

        for round in 0..self.options.max_rounds {
            let reply = self
                .gateway
                .complete(GatewayRequest {
                    messages: &self.messages,
                    tools: &declarations,
                })
                .await?;

            let (content, calls) = match reply {
                GatewayReply::Final { content } => {
                    self.messages.push(Message::assistant(content.clone()));
                    tracing::debug!(session = %self.id, rounds = round + 1, "query answered");
                    return Ok(content);
                }
                GatewayReply::ToolCalls { content, calls } => (content, calls),
            };

            // Every call in the response is answered before the next
            // gateway round; the history the model sees next must not
            // contain a dangling call.
            self.messages.push(Message::tool_calls(content, calls.clone()));
            for call in &calls {
                let output = self.execute(call).await;
                tracing::debug!(
                    session = %self.id,
                    tool = %call.name,
                    is_error = output.is_error,
                    "tool call finished"
                );
                self.messages.push(Message::tool_result(call.id.clone(), output.content));
            }
        }

        Err(Error::LoopBound {
            rounds: self.options.max_rounds,
        })
    }

    /// Execute one requested call, mapping every failure into an
    /// error-flagged output the model sees as context.
    async fn execute(&mut self, call: &ToolCallRequest) -> ToolOutput {
        let arguments = match &call.arguments {
            ToolArguments::Object(map) => Value::Object(map.clone()),
            ToolArguments::Malformed { raw, error } => {
                return ToolOutput::error(format!(
                    "invalid arguments for {}: {error} (raw: {raw})",
                    call.name
                ));
            }
        };
        match self.tools.call(&call.name, arguments).await {
            Ok(output) => output,
            Err(e) => ToolOutput::error(format!("tool {} failed: {e}", call.name)),
        }
    }

    /// End the session, releasing the tool host and its transport.
    pub async fn shutdown(mut self) {
        self.tools.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{GatewayError, ToolDeclaration};
    use crate::tools::ToolError;
    use std::collections::{HashMap, VecDeque};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    fn call(id: &str, name: &str, args: &str) -> ToolCallRequest {
        ToolCallRequest {
            id: id.to_string(),
            name: name.to_string(),
            arguments: ToolArguments::parse(args),
        }
    }

    fn tool_calls(calls: Vec<ToolCallRequest>) -> GatewayReply {
        GatewayReply::ToolCalls {
            content: None,
            calls,
        }
    }

    fn final_reply(text: &str) -> GatewayReply {
        GatewayReply::Final {
            content: text.to_string(),
        }
    }

    /// Gateway that replays a fixed script of replies.
    struct ScriptedGateway {
        script: Mutex<VecDeque<GatewayReply>>,
        calls: AtomicUsize,
    }

    impl ScriptedGateway {
        fn new(script: Vec<GatewayReply>) -> Self {
            Self {
                script: Mutex::new(script.into_iter().collect()),
                calls: AtomicUsize::new(0),
            }
        }

        fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl Gateway for ScriptedGateway {
        async fn complete(
            &self,
            _request: GatewayRequest<'_>,
        ) -> std::result::Result<GatewayReply, GatewayError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .ok_or_else(|| GatewayError::Api("script exhausted".to_string()))
        }
    }

    /// Gateway that never stops asking for the same tool.
    struct LoopingGateway;

    impl Gateway for LoopingGateway {
        async fn complete(
            &self,
            _request: GatewayRequest<'_>,
        ) -> std::result::Result<GatewayReply, GatewayError> {
            Ok(tool_calls(vec![call("call_loop", "web_search", "{}")]))
        }
    }

    /// Tool host with canned outputs per tool name, recording invocations.
    struct RecordingTools {
        outputs: HashMap<String, ToolOutput>,
        invocations: Vec<(String, Value)>,
        closed: Arc<AtomicUsize>,
    }

    impl RecordingTools {
        fn new() -> Self {
            Self {
                outputs: HashMap::new(),
                invocations: Vec::new(),
                closed: Arc::new(AtomicUsize::new(0)),
            }
        }

        fn with_output(mut self, name: &str, output: ToolOutput) -> Self {
            self.outputs.insert(name.to_string(), output);
            self
        }

        fn with_close_counter(mut self, counter: Arc<AtomicUsize>) -> Self {
            self.closed = counter;
            self
        }
    }

    impl ToolHost for RecordingTools {
        async fn list_tools(&mut self) -> std::result::Result<Vec<ToolDeclaration>, ToolError> {
            Ok(self
                .outputs
                .keys()
                .map(|name| ToolDeclaration {
                    name: name.clone(),
                    description: String::new(),
                    input_schema: serde_json::json!({"type": "object"}),
                })
                .collect())
        }

        async fn call(
            &mut self,
            name: &str,
            arguments: Value,
        ) -> std::result::Result<ToolOutput, ToolError> {
            self.invocations.push((name.to_string(), arguments));
            match self.outputs.get(name) {
                Some(output) => Ok(output.clone()),
                None => Ok(ToolOutput::error(format!("unknown tool: {name}"))),
            }
        }

        async fn close(&mut self) {
            self.closed.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn tool_messages(session: &Session<impl Gateway, impl ToolHost>) -> Vec<(&str, &str)> {
        session
            .messages()
            .iter()
            .filter_map(|m| match m {
                Message::Tool {
                    tool_call_id,
                    content,
                } => Some((tool_call_id.as_str(), content.as_str())),
                _ => None,
            })
            .collect()
    }

    /// Every tool message must immediately follow the assistant message
    /// that requested it, in request order.
    fn assert_results_follow_requests(messages: &[Message]) {
        let mut i = 0;
        while i < messages.len() {
            if let Message::Assistant { tool_calls, .. } = &messages[i] {
                for (offset, requested) in tool_calls.iter().enumerate() {
                    match &messages[i + 1 + offset] {
                        Message::Tool { tool_call_id, .. } => {
                            assert_eq!(tool_call_id, &requested.id)
                        }
                        other => panic!("expected tool message after request, got {other:?}"),
                    }
                }
                i += 1 + tool_calls.len();
            } else {
                i += 1;
            }
        }
    }

    #[tokio::test]
    async fn final_answer_means_one_gateway_call() {
        let gateway = ScriptedGateway::new(vec![final_reply("hello")]);
        let mut session = Session::new(gateway, RecordingTools::new());

        let answer = session.submit("hi").await.unwrap();
        assert_eq!(answer, "hello");
        assert_eq!(session.gateway.call_count(), 1);
        assert!(session.tools.invocations.is_empty());
    }

    #[tokio::test]
    async fn n_rounds_mean_n_invocations_and_n_plus_one_gateway_calls() {
        let gateway = ScriptedGateway::new(vec![
            tool_calls(vec![call("c1", "web_search", r#"{"search_query":"a"}"#)]),
            tool_calls(vec![call("c2", "web_search", r#"{"search_query":"b"}"#)]),
            tool_calls(vec![call("c3", "web_search", r#"{"search_query":"c"}"#)]),
            final_reply("done"),
        ]);
        let tools = RecordingTools::new().with_output("web_search", ToolOutput::text("results"));
        let mut session = Session::new(gateway, tools);

        let answer = session.submit("search things").await.unwrap();
        assert_eq!(answer, "done");
        assert_eq!(session.gateway.call_count(), 4);
        assert_eq!(session.tools.invocations.len(), 3);
        assert_eq!(tool_messages(&session).len(), 3);
        assert_results_follow_requests(session.messages());
    }

    #[tokio::test]
    async fn all_calls_in_one_round_are_executed() {
        let gateway = ScriptedGateway::new(vec![
            tool_calls(vec![
                call("c1", "query_adcode", r#"{"region_name":"A"}"#),
                call("c2", "query_adcode", r#"{"region_name":"B"}"#),
            ]),
            final_reply("both looked up"),
        ]);
        let tools =
            RecordingTools::new().with_output("query_adcode", ToolOutput::text("370100"));
        let mut session = Session::new(gateway, tools);

        session.submit("two regions").await.unwrap();
        // Both calls answered before the second gateway call.
        assert_eq!(session.gateway.call_count(), 2);
        assert_eq!(session.tools.invocations.len(), 2);
        assert_results_follow_requests(session.messages());
    }

    #[tokio::test]
    async fn weather_scenario() {
        let gateway = ScriptedGateway::new(vec![
            tool_calls(vec![call("c1", "query_adcode", r#"{"region_name":"X"}"#)]),
            tool_calls(vec![call("c2", "query_weather", r#"{"adcode":"370104"}"#)]),
            final_reply("It is sunny..."),
        ]);
        let tools = RecordingTools::new()
            .with_output("query_adcode", ToolOutput::text(r#"{"adcode": "370104"}"#))
            .with_output("query_weather", ToolOutput::text("sunny, 25C"));
        let mut session = Session::new(gateway, tools);

        let answer = session.submit("weather in district X").await.unwrap();
        assert_eq!(answer, "It is sunny...");

        // Exactly two tool invocations, in dependency order.
        assert_eq!(session.tools.invocations.len(), 2);
        assert_eq!(session.tools.invocations[0].0, "query_adcode");
        assert_eq!(session.tools.invocations[0].1["region_name"], "X");
        assert_eq!(session.tools.invocations[1].0, "query_weather");
        assert_eq!(session.tools.invocations[1].1["adcode"], "370104");

        // History: exactly 2 tool messages and 1 final assistant message.
        assert_eq!(tool_messages(&session).len(), 2);
        let finals = session
            .messages()
            .iter()
            .filter(|m| {
                matches!(
                    m,
                    Message::Assistant { content: Some(_), tool_calls } if tool_calls.is_empty()
                )
            })
            .count();
        assert_eq!(finals, 1);
        assert_results_follow_requests(session.messages());
    }

    #[tokio::test]
    async fn submit_is_deterministic_against_stateless_mocks() {
        let script = || {
            ScriptedGateway::new(vec![
                tool_calls(vec![call("c1", "query_adcode", r#"{"region_name":"X"}"#)]),
                final_reply("ok"),
            ])
        };
        let tools =
            || RecordingTools::new().with_output("query_adcode", ToolOutput::text("370104"));

        let mut first = Session::new(script(), tools());
        let mut second = Session::new(script(), tools());
        first.submit("q").await.unwrap();
        second.submit("q").await.unwrap();

        assert_eq!(first.tools.invocations, second.tools.invocations);
    }

    #[tokio::test]
    async fn error_flagged_result_is_appended_and_loop_continues() {
        let gateway = ScriptedGateway::new(vec![
            tool_calls(vec![call("c1", "no_such_tool", "{}")]),
            final_reply("recovered"),
        ]);
        let mut session = Session::new(gateway, RecordingTools::new());

        let answer = session.submit("try something").await.unwrap();
        assert_eq!(answer, "recovered");

        let tools = tool_messages(&session);
        assert_eq!(tools.len(), 1);
        assert_eq!(tools[0].0, "c1");
        assert!(tools[0].1.contains("unknown tool"));
    }

    #[tokio::test]
    async fn malformed_arguments_do_not_reach_the_tool() {
        let gateway = ScriptedGateway::new(vec![
            tool_calls(vec![call("c1", "query_weather", r#"{"adcode": "#)]),
            final_reply("sorry"),
        ]);
        let tools = RecordingTools::new().with_output("query_weather", ToolOutput::text("sunny"));
        let mut session = Session::new(gateway, tools);

        session.submit("weather").await.unwrap();

        // The call was never forwarded; the parse failure came back as an
        // error-flagged tool message instead.
        assert!(session.tools.invocations.is_empty());
        let tools = tool_messages(&session);
        assert_eq!(tools.len(), 1);
        assert!(tools[0].1.contains("invalid arguments"));
    }

    #[tokio::test]
    async fn runaway_model_hits_the_round_bound() {
        let tools = RecordingTools::new().with_output("web_search", ToolOutput::text("more"));
        let mut session = Session::with_options(
            LoopingGateway,
            tools,
            SessionOptions { max_rounds: 5 },
        );

        let err = session.submit("loop forever").await.unwrap_err();
        assert!(matches!(err, Error::LoopBound { rounds: 5 }));
        // Every round still paired its call with a result.
        assert_eq!(session.tools.invocations.len(), 5);
        assert_results_follow_requests(session.messages());
    }

    #[tokio::test]
    async fn failed_turn_does_not_corrupt_history() {
        let gateway = ScriptedGateway::new(vec![
            tool_calls(vec![call("c1", "query_adcode", r#"{"region_name":"X"}"#)]),
            // Script exhausted on the second gateway call -> turn fails.
        ]);
        let tools =
            RecordingTools::new().with_output("query_adcode", ToolOutput::text("370104"));
        let mut session = Session::new(gateway, tools);

        assert!(session.submit("q").await.is_err());
        // The failed turn left no dangling calls behind.
        assert_results_follow_requests(session.messages());
    }

    #[tokio::test]
    async fn shutdown_closes_the_tool_host() {
        let closed = Arc::new(AtomicUsize::new(0));
        let gateway = ScriptedGateway::new(vec![final_reply("bye")]);
        let tools = RecordingTools::new().with_close_counter(closed.clone());
        let mut session = Session::new(gateway, tools);

        session.submit("hi").await.unwrap();
        session.shutdown().await;
        assert_eq!(closed.load(Ordering::SeqCst), 1);
    }
}
