//! Posting tools over the Model Context Protocol (line-delimited JSON-RPC on stdio).

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, info, warn};
use x_client::{PostingError, PublishedPost, Publisher};

pub const PROTOCOL_VERSION: &str = "2024-11-05";
const SERVER_NAME: &str = "twitter-mcp-server";

/// JSON-RPC request structure
#[derive(Debug, Deserialize)]
pub struct JsonRpcRequest {
    #[allow(dead_code)]
    #[serde(default)]
    jsonrpc: String,
    pub id: Option<Value>,
    pub method: String,
    pub params: Option<Value>,
}

/// JSON-RPC response structure
#[derive(Debug, Serialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    pub id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

/// JSON-RPC error structure
#[derive(Debug, Serialize)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
}

impl JsonRpcResponse {
    fn success(id: Value, result: Value) -> Self {
        Self { jsonrpc: "2.0".to_string(), id, result: Some(result), error: None }
    }

    fn failure(id: Value, code: i32, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: None,
            error: Some(JsonRpcError { code, message: message.into() }),
        }
    }
}

#[derive(Debug, Error)]
enum ToolError {
    #[error("Invalid or missing '{0}' parameter")]
    InvalidParam(&'static str),

    #[error("Tweet text cannot be empty")]
    EmptyText,

    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error(transparent)]
    Posting(#[from] PostingError),
}

pub struct McpServer {
    publisher: Arc<dyn Publisher>,
}

impl McpServer {
    pub fn new(publisher: Arc<dyn Publisher>) -> Self {
        Self { publisher }
    }

    /// Answer one request; notifications (no id) get no response.
    pub async fn handle_request(&self, request: &JsonRpcRequest) -> Option<JsonRpcResponse> {
        let Some(id) = request.id.clone() else {
            debug!(method = %request.method, "Notification received");
            return None;
        };

        let response = match request.method.as_str() {
            "initialize" => JsonRpcResponse::success(
                id,
                json!({
                    "protocolVersion": PROTOCOL_VERSION,
                    "capabilities": { "tools": {} },
                    "serverInfo": {
                        "name": SERVER_NAME,
                        "version": env!("CARGO_PKG_VERSION")
                    }
                }),
            ),
            "ping" => JsonRpcResponse::success(id, json!({})),
            "tools/list" => JsonRpcResponse::success(id, json!({ "tools": tool_definitions() })),
            "tools/call" => {
                let params = request.params.as_ref();
                let Some(name) = params.and_then(|p| p.get("name")).and_then(Value::as_str) else {
                    return Some(JsonRpcResponse::failure(id, -32602, "Missing tool name"));
                };
                let args = params
                    .and_then(|p| p.get("arguments"))
                    .cloned()
                    .unwrap_or_else(|| json!({}));
                JsonRpcResponse::success(id, self.call_tool(name, &args).await)
            }
            other => {
                warn!(method = %other, "Unsupported MCP method");
                JsonRpcResponse::failure(id, -32601, "Method not found")
            }
        };
        Some(response)
    }

    /// Handle one raw line; malformed JSON yields a parse error response.
    pub async fn handle_line(&self, line: &str) -> Option<String> {
        let response = match serde_json::from_str::<JsonRpcRequest>(line) {
            Ok(request) => self.handle_request(&request).await?,
            Err(e) => JsonRpcResponse::failure(Value::Null, -32700, format!("Parse error: {e}")),
        };
        match serde_json::to_string(&response) {
            Ok(json) => Some(json),
            Err(e) => {
                warn!(error = %e, "Failed to serialize MCP response");
                None
            }
        }
    }

    /// Serve until the reader reaches EOF.
    pub async fn serve<R, W>(&self, reader: R, mut writer: W) -> std::io::Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        info!("Twitter MCP Server running on stdio");
        let mut lines = reader.lines();
        while let Some(line) = lines.next_line().await? {
            if line.trim().is_empty() {
                continue;
            }
            if let Some(response) = self.handle_line(&line).await {
                writer.write_all(response.as_bytes()).await?;
                writer.write_all(b"\n").await?;
                writer.flush().await?;
            }
        }
        Ok(())
    }

    async fn call_tool(&self, name: &str, args: &Value) -> Value {
        let result = match name {
            "post_tweet" => self.post_tweet(args).await,
            "post_tweet_with_reply" => self.post_reply(args).await,
            other => Err(ToolError::UnknownTool(other.to_string())),
        };

        match result {
            Ok(payload) => text_content(&payload, false),
            Err(e) => {
                warn!(tool = %name, error = %e, "Tool call failed");
                text_content(&error_payload(&e), true)
            }
        }
    }

    async fn post_tweet(&self, args: &Value) -> Result<Value, ToolError> {
        let text = tweet_text(args)?;
        let post = self.publisher.post(text, None).await?;
        Ok(success_payload("Tweet posted successfully!", &post, None))
    }

    async fn post_reply(&self, args: &Value) -> Result<Value, ToolError> {
        let text = tweet_text(args)?;
        let reply_to = string_arg(args, "reply_to_id")?;
        let post = self.publisher.post(text, Some(reply_to)).await?;
        Ok(success_payload("Reply posted successfully!", &post, Some(reply_to)))
    }
}

fn string_arg<'a>(args: &'a Value, name: &'static str) -> Result<&'a str, ToolError> {
    args.get(name)
        .and_then(Value::as_str)
        .ok_or(ToolError::InvalidParam(name))
}

fn tweet_text(args: &Value) -> Result<&str, ToolError> {
    let text = string_arg(args, "text")?;
    if text.trim().is_empty() {
        return Err(ToolError::EmptyText);
    }
    Ok(text)
}

fn success_payload(message: &str, post: &PublishedPost, reply_to: Option<&str>) -> Value {
    let mut payload = json!({
        "success": true,
        "message": message,
        "tweet_id": post.id,
        "text": post.text,
        "url": post.url(),
    });
    if let Some(reply_to) = reply_to {
        payload["reply_to"] = json!(reply_to);
    }
    payload
}

fn error_payload(err: &ToolError) -> Value {
    match err {
        ToolError::Posting(e @ PostingError::Auth { .. }) => json!({
            "success": false,
            "error": "Authentication failed. Please check your Twitter API credentials.",
            "details": e.details().map(str::to_string).unwrap_or_else(|| e.to_string()),
        }),
        ToolError::Posting(e) => json!({
            "success": false,
            "error": e.to_string(),
            "details": e.details().map(str::to_string).unwrap_or_else(|| format!("{e:?}")),
        }),
        other => json!({
            "success": false,
            "error": other.to_string(),
            "details": format!("{other:?}"),
        }),
    }
}

fn text_content(payload: &Value, is_error: bool) -> Value {
    let text = serde_json::to_string_pretty(payload).unwrap_or_else(|_| payload.to_string());
    let mut result = json!({ "content": [{ "type": "text", "text": text }] });
    if is_error {
        result["isError"] = json!(true);
    }
    result
}

fn tool_definitions() -> Value {
    json!([
        {
            "name": "post_tweet",
            "description": "Post a tweet to X (Twitter). The tweet can be up to 280 characters (or more if you have X Premium). You can include text content for your tweet.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "text": {
                        "type": "string",
                        "description": "The content of the tweet to post"
                    }
                },
                "required": ["text"]
            }
        },
        {
            "name": "post_tweet_with_reply",
            "description": "Post a tweet as a reply to another tweet. Useful for threading or responding to existing tweets.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "text": {
                        "type": "string",
                        "description": "The content of the tweet to post"
                    },
                    "reply_to_id": {
                        "type": "string",
                        "description": "The ID of the tweet to reply to"
                    }
                },
                "required": ["text", "reply_to_id"]
            }
        }
    ])
}
