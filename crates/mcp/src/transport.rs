//! Message transports for tool servers.
//!
//! A tool server is reached one of two ways: spawn it locally and speak
//! line-delimited JSON over stdio, or attach to a remote endpoint where the
//! server pushes messages over an SSE stream and the client posts its own
//! over HTTP. Both expose the same `send`/`recv`/`close` surface, so the
//! session layer never knows which one it is driving.

use std::process::Stdio;
use std::time::Duration;

use futures::StreamExt;
use futures::stream::BoxStream;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::time::timeout;
use url::Url;

use crate::error::{Error, Result};

/// Connect timeout for the SSE stream, and the bound on waiting for the
/// server to announce its message endpoint.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Maximum size of a single protocol message (1MB).
/// Sized for large tool outputs (search results, forecasts).
pub const MAX_MESSAGE_SIZE: usize = 1024 * 1024;

/// Where to find the tool server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// Spawn a local process and talk over its stdio.
    Command { program: String, args: Vec<String> },
    /// Attach to a remote endpoint over SSE.
    Endpoint(String),
}

impl Target {
    /// Classify a target string as a process to spawn or an endpoint URL.
    ///
    /// `.py` and `.js` paths run under their interpreter; any other path is
    /// executed directly. Spawned servers are asked for stdio transport via
    /// `--transport stdio`.
    pub fn parse(raw: &str) -> Result<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(Error::Target("empty target".to_string()));
        }
        if raw.starts_with("http://") || raw.starts_with("https://") {
            return Ok(Self::Endpoint(raw.trim_end_matches('/').to_string()));
        }

        let (program, mut args) = if raw.ends_with(".py") {
            ("python".to_string(), vec![raw.to_string()])
        } else if raw.ends_with(".js") {
            ("node".to_string(), vec![raw.to_string()])
        } else {
            (raw.to_string(), Vec::new())
        };
        args.push("--transport".to_string());
        args.push("stdio".to_string());

        Ok(Self::Command { program, args })
    }
}

impl std::fmt::Display for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Command { program, args } => write!(f, "{program} {}", args.join(" ")),
            Self::Endpoint(url) => write!(f, "{url}"),
        }
    }
}

/// A connected bidirectional message channel to a tool server.
pub enum Transport {
    Stdio(StdioTransport),
    Sse(SseTransport),
}

impl Transport {
    /// Open a connection to the target.
    ///
    /// Spawn failure or connection refusal is fatal to this call; there is
    /// no automatic retry.
    pub async fn connect(target: &Target) -> Result<Self> {
        match target {
            Target::Command { program, args } => {
                Ok(Self::Stdio(StdioTransport::spawn(program, args)?))
            }
            Target::Endpoint(url) => Ok(Self::Sse(SseTransport::connect(url).await?)),
        }
    }

    /// Send one protocol message.
    pub async fn send(&mut self, message: &str) -> Result<()> {
        match self {
            Self::Stdio(t) => t.send(message).await,
            Self::Sse(t) => t.send(message).await,
        }
    }

    /// Receive the next protocol message.
    pub async fn recv(&mut self) -> Result<String> {
        match self {
            Self::Stdio(t) => t.recv().await,
            Self::Sse(t) => t.recv().await,
        }
    }

    /// Release the connection. For a spawned process this terminates the
    /// child; for a stream it lets the connection drop.
    pub async fn close(&mut self) {
        match self {
            Self::Stdio(t) => t.close().await,
            Self::Sse(_) => {}
        }
    }
}

// --- Process transport ---

/// Line-delimited JSON over a child process's stdio.
pub struct StdioTransport {
    child: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
}

impl StdioTransport {
    fn spawn(program: &str, args: &[String]) -> Result<Self> {
        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(Error::Spawn)?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| Error::Spawn(std::io::Error::other("failed to capture stdin")))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::Spawn(std::io::Error::other("failed to capture stdout")))?;

        Ok(Self {
            child,
            stdin,
            stdout: BufReader::new(stdout),
        })
    }

    async fn send(&mut self, message: &str) -> Result<()> {
        self.stdin.write_all(message.as_bytes()).await?;
        self.stdin.write_all(b"\n").await?;
        self.stdin.flush().await?;
        Ok(())
    }

    async fn recv(&mut self) -> Result<String> {
        let mut line = String::new();
        loop {
            line.clear();
            if self.stdout.read_line(&mut line).await? == 0 {
                return Err(Error::ServerExited);
            }
            if line.len() > MAX_MESSAGE_SIZE {
                return Err(Error::MessageTooLarge {
                    size: line.len(),
                    max: MAX_MESSAGE_SIZE,
                });
            }
            let trimmed = line.trim();
            // Servers sometimes write diagnostics to stdout; only JSON
            // objects are protocol traffic.
            if trimmed.is_empty() || !trimmed.starts_with('{') {
                continue;
            }
            return Ok(trimmed.to_string());
        }
    }

    async fn close(&mut self) {
        let _ = self.child.kill().await;
    }
}

// --- Stream transport ---

/// SSE stream inbound, HTTP POST outbound.
///
/// On connect the server's first `endpoint` event names the URL that
/// accepts this session's outbound messages; every later `message` event
/// carries one inbound protocol message.
pub struct SseTransport {
    http: reqwest::Client,
    post_url: Url,
    stream: BoxStream<'static, reqwest::Result<bytes::Bytes>>,
    parser: SseEventParser,
}

impl SseTransport {
    async fn connect(base_url: &str) -> Result<Self> {
        let connect_err = |reason: String| Error::Connect {
            endpoint: base_url.to_string(),
            reason,
        };

        let base = Url::parse(base_url).map_err(|e| connect_err(e.to_string()))?;
        let stream_url = base
            .join(&format!("{}/sse", base.path().trim_end_matches('/')))
            .map_err(|e| connect_err(e.to_string()))?;

        let http = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| connect_err(e.to_string()))?;

        let response = http
            .get(stream_url.clone())
            .header("Accept", "text/event-stream")
            .send()
            .await
            .map_err(|e| connect_err(e.to_string()))?;
        if !response.status().is_success() {
            return Err(connect_err(format!("HTTP {}", response.status())));
        }

        let mut transport = Self {
            http,
            post_url: base.clone(),
            stream: response.bytes_stream().boxed(),
            parser: SseEventParser::default(),
        };

        // The first event on the stream must name the message endpoint.
        let event = timeout(CONNECT_TIMEOUT, transport.next_event())
            .await
            .map_err(|_| connect_err("no endpoint event from server".to_string()))??;
        if event.name != "endpoint" {
            return Err(connect_err(format!(
                "expected endpoint event, got '{}'",
                event.name
            )));
        }
        transport.post_url = base
            .join(event.data.trim())
            .map_err(|e| connect_err(format!("bad endpoint '{}': {e}", event.data)))?;

        tracing::debug!(endpoint = %transport.post_url, "sse transport connected");
        Ok(transport)
    }

    async fn send(&mut self, message: &str) -> Result<()> {
        let response = self
            .http
            .post(self.post_url.clone())
            .header("Content-Type", "application/json")
            .body(message.to_string())
            .send()
            .await
            .map_err(|e| Error::Connect {
                endpoint: self.post_url.to_string(),
                reason: e.to_string(),
            })?;
        if !response.status().is_success() {
            return Err(Error::InvalidResponse(format!(
                "message endpoint returned HTTP {}",
                response.status()
            )));
        }
        Ok(())
    }

    async fn recv(&mut self) -> Result<String> {
        loop {
            let event = self.next_event().await?;
            if event.name == "message" {
                return Ok(event.data);
            }
            // Pings and unknown event kinds are dropped.
        }
    }

    async fn next_event(&mut self) -> Result<SseEvent> {
        loop {
            if let Some(event) = self.parser.next_event() {
                return Ok(event);
            }
            if self.parser.buffered() > MAX_MESSAGE_SIZE {
                return Err(Error::MessageTooLarge {
                    size: self.parser.buffered(),
                    max: MAX_MESSAGE_SIZE,
                });
            }
            match self.stream.next().await {
                Some(Ok(bytes)) => self.parser.push(&String::from_utf8_lossy(&bytes)),
                Some(Err(e)) => {
                    return Err(Error::InvalidResponse(format!("stream read error: {e}")));
                }
                None => return Err(Error::ServerExited),
            }
        }
    }
}

// --- SSE event parsing ---

/// One server-sent event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SseEvent {
    /// Event name; the SSE default is "message".
    pub name: String,
    pub data: String,
}

/// Incremental parser for an SSE byte stream.
///
/// Events are separated by blank lines; chunks may split an event at any
/// byte. Pure state machine, no I/O.
#[derive(Debug, Default)]
pub(crate) struct SseEventParser {
    buffer: String,
}

impl SseEventParser {
    pub fn push(&mut self, chunk: &str) {
        self.buffer.push_str(chunk);
        // Normalize CRLF so the blank-line separator is always "\n\n".
        // Re-scanning the whole buffer also catches a pair split across
        // chunk boundaries.
        if self.buffer.contains('\r') {
            self.buffer = self.buffer.replace("\r\n", "\n");
        }
    }

    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Pop the next complete event, if one is buffered.
    pub fn next_event(&mut self) -> Option<SseEvent> {
        loop {
            let end = self.buffer.find("\n\n")?;
            let block: String = self.buffer.drain(..end + 2).collect();
            if let Some(event) = Self::parse_block(&block) {
                return Some(event);
            }
            // Comment-only or empty block; keep scanning.
        }
    }

    fn parse_block(block: &str) -> Option<SseEvent> {
        let mut name = String::from("message");
        let mut data: Vec<&str> = Vec::new();

        for line in block.lines() {
            if line.starts_with(':') {
                continue;
            }
            if let Some(value) = field_value(line, "event") {
                name = value.to_string();
            } else if let Some(value) = field_value(line, "data") {
                data.push(value);
            }
        }

        if data.is_empty() {
            return None;
        }
        Some(SseEvent {
            name,
            data: data.join("\n"),
        })
    }
}

/// Value of `field: value` lines; the space after the colon is optional.
fn field_value<'a>(line: &'a str, field: &str) -> Option<&'a str> {
    let rest = line.strip_prefix(field)?;
    let rest = rest.strip_prefix(':')?;
    Some(rest.strip_prefix(' ').unwrap_or(rest))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_endpoint_target() {
        let target = Target::parse("http://127.0.0.1:8000/").unwrap();
        assert_eq!(target, Target::Endpoint("http://127.0.0.1:8000".to_string()));
    }

    #[test]
    fn parse_python_target() {
        let target = Target::parse("server.py").unwrap();
        assert_eq!(
            target,
            Target::Command {
                program: "python".to_string(),
                args: vec![
                    "server.py".to_string(),
                    "--transport".to_string(),
                    "stdio".to_string()
                ],
            }
        );
    }

    #[test]
    fn parse_node_target() {
        let target = Target::parse("tools/server.js").unwrap();
        match target {
            Target::Command { program, args } => {
                assert_eq!(program, "node");
                assert_eq!(args[0], "tools/server.js");
            }
            other => panic!("expected command target, got {other:?}"),
        }
    }

    #[test]
    fn parse_executable_target() {
        let target = Target::parse("./skipper-server").unwrap();
        assert_eq!(
            target,
            Target::Command {
                program: "./skipper-server".to_string(),
                args: vec!["--transport".to_string(), "stdio".to_string()],
            }
        );
    }

    #[test]
    fn parse_empty_target_is_rejected() {
        assert!(Target::parse("  ").is_err());
    }

    #[test]
    fn sse_parser_single_event() {
        let mut parser = SseEventParser::default();
        parser.push("event: endpoint\ndata: /messages?session_id=1\n\n");
        let event = parser.next_event().unwrap();
        assert_eq!(event.name, "endpoint");
        assert_eq!(event.data, "/messages?session_id=1");
        assert!(parser.next_event().is_none());
    }

    #[test]
    fn sse_parser_split_across_chunks() {
        let mut parser = SseEventParser::default();
        parser.push("event: mess");
        assert!(parser.next_event().is_none());
        parser.push("age\ndata: {\"jsonrpc\"");
        assert!(parser.next_event().is_none());
        parser.push(":\"2.0\"}\n\n");
        let event = parser.next_event().unwrap();
        assert_eq!(event.name, "message");
        assert_eq!(event.data, "{\"jsonrpc\":\"2.0\"}");
    }

    #[test]
    fn sse_parser_multiline_data() {
        let mut parser = SseEventParser::default();
        parser.push("data: line one\ndata: line two\n\n");
        let event = parser.next_event().unwrap();
        assert_eq!(event.data, "line one\nline two");
    }

    #[test]
    fn sse_parser_skips_comments_and_default_name() {
        let mut parser = SseEventParser::default();
        parser.push(": keep-alive\n\ndata: hello\n\n");
        let event = parser.next_event().unwrap();
        assert_eq!(event.name, "message");
        assert_eq!(event.data, "hello");
    }

    #[test]
    fn sse_parser_handles_crlf() {
        let mut parser = SseEventParser::default();
        parser.push("event: message\r\ndata: ok\r");
        assert!(parser.next_event().is_none());
        parser.push("\n\r\n");
        let event = parser.next_event().unwrap();
        assert_eq!(event.data, "ok");
    }

    #[test]
    fn sse_parser_queues_multiple_events() {
        let mut parser = SseEventParser::default();
        parser.push("data: a\n\ndata: b\n\n");
        assert_eq!(parser.next_event().unwrap().data, "a");
        assert_eq!(parser.next_event().unwrap().data, "b");
        assert!(parser.next_event().is_none());
    }
}
