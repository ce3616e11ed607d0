mod common;

use std::sync::Arc;

use common::RecordingPublisher;
use serde_json::{json, Value};
use tweet_agent::mcp::{JsonRpcRequest, McpServer, PROTOCOL_VERSION};

fn request(value: Value) -> JsonRpcRequest {
    serde_json::from_value(value).unwrap()
}

fn call(id: u64, tool: &str, arguments: Value) -> JsonRpcRequest {
    request(json!({
        "jsonrpc": "2.0",
        "id": id,
        "method": "tools/call",
        "params": { "name": tool, "arguments": arguments }
    }))
}

/// The JSON payload carried in the first text content block.
fn tool_payload(result: &Value) -> Value {
    let text = result["content"][0]["text"].as_str().unwrap();
    serde_json::from_str(text).unwrap()
}

#[tokio::test]
async fn test_initialize_and_list_tools() {
    let server = McpServer::new(Arc::new(RecordingPublisher::default()));

    let init = server
        .handle_request(&request(json!({"jsonrpc": "2.0", "id": 1, "method": "initialize", "params": {}})))
        .await
        .unwrap();
    let result = init.result.unwrap();
    assert_eq!(result["protocolVersion"], PROTOCOL_VERSION);
    assert_eq!(result["serverInfo"]["name"], "twitter-mcp-server");

    let list = server
        .handle_request(&request(json!({"jsonrpc": "2.0", "id": 2, "method": "tools/list"})))
        .await
        .unwrap();
    let tools = list.result.unwrap()["tools"].clone();
    let names: Vec<&str> = tools
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["post_tweet", "post_tweet_with_reply"]);
}

#[tokio::test]
async fn test_post_tweet() {
    let publisher = Arc::new(RecordingPublisher::default());
    let server = McpServer::new(publisher.clone());

    let response = server
        .handle_request(&call(3, "post_tweet", json!({"text": "hello from mcp"})))
        .await
        .unwrap();
    let result = response.result.unwrap();
    assert!(result.get("isError").is_none());

    let payload = tool_payload(&result);
    assert_eq!(payload["success"], true);
    assert_eq!(payload["message"], "Tweet posted successfully!");
    assert_eq!(payload["tweet_id"], "1001");
    assert_eq!(payload["url"], "https://twitter.com/user/status/1001");
    assert_eq!(publisher.posted(), vec![("hello from mcp".to_string(), None)]);
}

#[tokio::test]
async fn test_post_reply() {
    let publisher = Arc::new(RecordingPublisher::default());
    let server = McpServer::new(publisher.clone());

    let response = server
        .handle_request(&call(4, "post_tweet_with_reply", json!({"text": "agreed", "reply_to_id": "42"})))
        .await
        .unwrap();
    let payload = tool_payload(&response.result.unwrap());

    assert_eq!(payload["reply_to"], "42");
    assert_eq!(payload["message"], "Reply posted successfully!");
    assert_eq!(publisher.posted(), vec![("agreed".to_string(), Some("42".to_string()))]);
}

#[tokio::test]
async fn test_tool_errors_are_flagged() {
    let publisher = Arc::new(RecordingPublisher::default());
    let server = McpServer::new(publisher.clone());

    let empty = server
        .handle_request(&call(5, "post_tweet", json!({"text": "   "})))
        .await
        .unwrap()
        .result
        .unwrap();
    assert_eq!(empty["isError"], true);
    assert_eq!(tool_payload(&empty)["error"], "Tweet text cannot be empty");

    let missing = server
        .handle_request(&call(6, "post_tweet_with_reply", json!({"text": "hi"})))
        .await
        .unwrap()
        .result
        .unwrap();
    assert_eq!(missing["isError"], true);

    let unknown = server
        .handle_request(&call(7, "delete_tweet", json!({})))
        .await
        .unwrap()
        .result
        .unwrap();
    assert_eq!(tool_payload(&unknown)["error"], "Unknown tool: delete_tweet");

    assert!(publisher.posted().is_empty());
}

#[tokio::test]
async fn test_auth_failure_carries_hint() {
    let server = McpServer::new(Arc::new(RecordingPublisher::failing_auth()));

    let result = server
        .handle_request(&call(8, "post_tweet", json!({"text": "hello"})))
        .await
        .unwrap()
        .result
        .unwrap();
    let payload = tool_payload(&result);

    assert_eq!(result["isError"], true);
    assert_eq!(payload["success"], false);
    assert_eq!(
        payload["error"],
        "Authentication failed. Please check your Twitter API credentials."
    );
    assert_eq!(payload["details"], r#"{"title":"Unauthorized"}"#);
}

#[tokio::test]
async fn test_protocol_errors() {
    let server = McpServer::new(Arc::new(RecordingPublisher::default()));

    let notification = request(json!({"jsonrpc": "2.0", "method": "notifications/initialized"}));
    assert!(server.handle_request(&notification).await.is_none());

    let unknown = server
        .handle_request(&request(json!({"jsonrpc": "2.0", "id": 9, "method": "resources/list"})))
        .await
        .unwrap();
    assert_eq!(unknown.error.unwrap().code, -32601);

    let line = server.handle_line("{not json").await.unwrap();
    let parsed: Value = serde_json::from_str(&line).unwrap();
    assert_eq!(parsed["error"]["code"], -32700);
    assert_eq!(parsed["id"], Value::Null);
}

#[tokio::test]
async fn test_serve_answers_each_line() {
    let server = McpServer::new(Arc::new(RecordingPublisher::default()));
    let input = concat!(
        r#"{"jsonrpc":"2.0","id":1,"method":"ping"}"#,
        "\n\n",
        r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#,
        "\n",
        r#"{"jsonrpc":"2.0","id":2,"method":"tools/list"}"#,
        "\n"
    );

    let mut output = Vec::new();
    server.serve(input.as_bytes(), &mut output).await.unwrap();

    let lines: Vec<Value> = String::from_utf8(output)
        .unwrap()
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0]["id"], 1);
    assert_eq!(lines[1]["id"], 2);
}
