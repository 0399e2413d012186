//! Tool implementations: district-code lookup, weather, web search.
//!
//! Upstream API payloads are treated as opaque JSON: the formatters only
//! look at the envelope (`status`/`message`/`result`) and re-emit the rest
//! verbatim. Upstream failures become ordinary text results — the model is
//! expected to read them and adjust — while bad invocations (unknown tool,
//! missing argument) are error-flagged.

use std::time::Duration;

use mcp::{CallToolResult, Tool};
use serde_json::{Map, Value, json};

use crate::error::{Error, Result};

/// Timeout applied to every outbound lookup, independent of the client's
/// own timeouts.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

const DEFAULT_SEARCH_URL: &str = "https://open.bigmodel.cn/api/paas/v4/web_search";

const NO_DISTRICT_HINT: &str = "no district code found; if the area has no code of its own, \
     query its parent division instead (for example the city rather than a development zone)";

/// The tool implementations and their upstream credentials.
pub struct ToolSet {
    http: reqwest::Client,
    map_api_base: String,
    map_api_key: String,
    search_url: String,
    search_api_key: String,
}

impl ToolSet {
    /// Build from the environment. Every credential must be present before
    /// the server accepts a single request.
    pub fn from_env() -> Result<Self> {
        let map_api_base = require_env("TENCENT_MAP_API_BASE")?;
        let map_api_key = require_env("TENCENT_MAP_API_KEY")?;
        let search_api_key = require_env("SKIPPER_API_KEY")?;
        let search_url = std::env::var("SKIPPER_SEARCH_URL")
            .ok()
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| DEFAULT_SEARCH_URL.to_string());
        Self::new(map_api_base, map_api_key, search_url, search_api_key)
    }

    fn new(
        map_api_base: String,
        map_api_key: String,
        search_url: String,
        search_api_key: String,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            http,
            map_api_base: map_api_base.trim_end_matches('/').to_string(),
            map_api_key,
            search_url,
            search_api_key,
        })
    }

    /// The static tool catalog this server exposes.
    pub fn catalog() -> Vec<Tool> {
        vec![
            Tool {
                name: "query_adcode".to_string(),
                description: Some(
                    "Look up the administrative district code for a Chinese region. \
                     Works at city and district/county level; pass only the last \
                     division name (for Jinan Huaiyin, pass \"Huaiyin\"). Call this \
                     before query_weather."
                        .to_string(),
                ),
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "region_name": {
                            "type": "string",
                            "description": "Name of the division to resolve"
                        }
                    },
                    "required": ["region_name"]
                }),
            },
            Tool {
                name: "query_weather".to_string(),
                description: Some(
                    "Get weather for a Chinese city or district by its administrative \
                     district code (resolve the code with query_adcode first). \
                     search_type \"now\" returns current conditions, \"future\" the \
                     forecast for today and the next three days."
                        .to_string(),
                ),
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "adcode": {
                            "type": "string",
                            "description": "Administrative district code"
                        },
                        "search_type": {
                            "type": "string",
                            "enum": ["now", "future"],
                            "default": "now"
                        }
                    },
                    "required": ["adcode"]
                }),
            },
            Tool {
                name: "web_search".to_string(),
                description: Some(
                    "Search the web and return matching titles, links and content."
                        .to_string(),
                ),
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "search_query": {
                            "type": "string",
                            "description": "Query to search for"
                        },
                        "search_engine": {
                            "type": "string",
                            "default": "search_std"
                        }
                    },
                    "required": ["search_query"]
                }),
            },
        ]
    }

    /// Execute a named tool against its upstream API.
    pub async fn call(&self, name: &str, arguments: &Map<String, Value>) -> CallToolResult {
        match name {
            "query_adcode" => match required_str(arguments, "region_name") {
                Ok(region_name) => CallToolResult::text(self.query_adcode(region_name).await),
                Err(message) => CallToolResult::error_text(message),
            },
            "query_weather" => match required_str(arguments, "adcode") {
                Ok(adcode) => {
                    let search_type = optional_str(arguments, "search_type", "now");
                    CallToolResult::text(self.query_weather(adcode, search_type).await)
                }
                Err(message) => CallToolResult::error_text(message),
            },
            "web_search" => match required_str(arguments, "search_query") {
                Ok(query) => {
                    let engine = optional_str(arguments, "search_engine", "search_std");
                    CallToolResult::text(self.web_search(query, engine).await)
                }
                Err(message) => CallToolResult::error_text(message),
            },
            other => CallToolResult::error_text(format!("unknown tool: {other}")),
        }
    }

    async fn query_adcode(&self, region_name: &str) -> String {
        let url = format!("{}/district/v1/search", self.map_api_base);
        match self.fetch_json(&url, &[("keyword", region_name)]).await {
            Ok(data) => format_adcode(&data),
            Err(e) => format!("request failed: {e}"),
        }
    }

    async fn query_weather(&self, adcode: &str, search_type: &str) -> String {
        let url = format!("{}/weather/v1/", self.map_api_base);
        match self
            .fetch_json(&url, &[("adcode", adcode), ("type", search_type)])
            .await
        {
            Ok(data) => format_weather(&data),
            Err(e) => format!("request failed: {e}"),
        }
    }

    async fn web_search(&self, query: &str, engine: &str) -> String {
        let body = json!({
            "search_engine": engine,
            "search_query": query,
        });
        let response = self
            .http
            .post(&self.search_url)
            .bearer_auth(&self.search_api_key)
            .json(&body)
            .send()
            .await;
        match response {
            Ok(response) => match response.error_for_status() {
                Ok(response) => match response.json::<Value>().await {
                    Ok(data) => format_search_results(&data),
                    Err(e) => format!("search failed: {e}"),
                },
                Err(e) => format!("search failed: {e}"),
            },
            Err(e) => format!("search failed: {e}"),
        }
    }

    async fn fetch_json(&self, url: &str, params: &[(&str, &str)]) -> reqwest::Result<Value> {
        self.http
            .get(url)
            .query(&[("key", self.map_api_key.as_str())])
            .query(params)
            .header("User-Agent", concat!("skipper-server/", env!("CARGO_PKG_VERSION")))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await
    }
}

/// Shape a district search envelope into `[{adcode, address}]`.
pub fn format_adcode(data: &Value) -> String {
    if data["status"].as_i64() != Some(0) {
        return format!(
            "district lookup failed: {}",
            data["message"].as_str().unwrap_or("unknown error")
        );
    }

    // The upstream groups matches: each entry of `result` is an array
    // whose first element is the best match.
    let rows: Vec<Value> = data["result"]
        .as_array()
        .map(|groups| {
            groups
                .iter()
                .filter_map(|group| group.as_array().and_then(|g| g.first()))
                .map(|item| json!({"adcode": item["id"], "address": item["address"]}))
                .collect()
        })
        .unwrap_or_default();

    if rows.is_empty() {
        return NO_DISTRICT_HINT.to_string();
    }
    serde_json::to_string(&rows).unwrap_or_default()
}

/// Shape a weather envelope: errors become text, the payload passes
/// through untouched.
pub fn format_weather(data: &Value) -> String {
    if data["status"].as_i64() != Some(0) {
        return format!(
            "weather lookup failed: {}",
            data["message"].as_str().unwrap_or("unknown error")
        );
    }
    serde_json::to_string(&data["result"]).unwrap_or_default()
}

/// Shape search results into `[{title, link, content}]`.
pub fn format_search_results(data: &Value) -> String {
    let rows: Vec<Value> = data["search_result"]
        .as_array()
        .map(|results| {
            results
                .iter()
                .map(|r| {
                    let link = match &r["link"] {
                        Value::Null => Value::String("no link".to_string()),
                        other => other.clone(),
                    };
                    json!({"title": r["title"], "link": link, "content": r["content"]})
                })
                .collect()
        })
        .unwrap_or_default();
    serde_json::to_string_pretty(&rows).unwrap_or_default()
}

fn require_env(name: &'static str) -> Result<String> {
    std::env::var(name)
        .ok()
        .filter(|v| !v.is_empty())
        .ok_or(Error::MissingEnv(name))
}

fn required_str<'a>(
    arguments: &'a Map<String, Value>,
    key: &str,
) -> std::result::Result<&'a str, String> {
    arguments
        .get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| format!("missing required argument: {key}"))
}

fn optional_str<'a>(arguments: &'a Map<String, Value>, key: &str, default: &'a str) -> &'a str {
    arguments.get(key).and_then(Value::as_str).unwrap_or(default)
}
