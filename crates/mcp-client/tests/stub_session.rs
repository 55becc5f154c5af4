//! Integration tests: drive a [`ToolInvoker`] against an in-memory MCP
//! server and check the whole start → handshake → call → stop cycle,
//! including every failure path that does not need a real process.

use std::time::Duration;

use mb_mcp_client::{
    render_legacy, AgentRegistration, ErrorKind, McpError, MemoryHandle, MemoryTransport,
    Session, SessionOptions, SessionState, ToolInvoker,
};
use serde_json::{json, Value};
use tokio::time::Instant;

// ── Helpers ─────────────────────────────────────────────────────────────

fn invoker(transport: MemoryTransport) -> ToolInvoker {
    let options = SessionOptions {
        request_timeout: Duration::from_millis(5000),
        ..SessionOptions::default()
    };
    ToolInvoker::new(Session::with_transport(Box::new(transport), options))
}

fn tool_calls(handle: &MemoryHandle) -> Vec<Value> {
    handle
        .written_json()
        .into_iter()
        .filter(|m| m["method"] == "tools/call")
        .collect()
}

/// Answers `initialize`; answers `tools/call` only when the arguments carry
/// `"fast": true`.
fn selective_server() -> (MemoryTransport, MemoryHandle) {
    MemoryTransport::new(|line| {
        let msg: Value = serde_json::from_str(line).unwrap();
        match msg["method"].as_str() {
            Some("initialize") => vec![json!({ "jsonrpc": "2.0", "id": msg["id"], "result": {} }).to_string()],
            Some("tools/call") if msg["params"]["arguments"]["fast"] == true => vec![json!({
                "jsonrpc": "2.0",
                "id": msg["id"],
                "result": { "content": [{ "type": "text", "text": format!("answer to {}", msg["id"]) }] }
            })
            .to_string()],
            _ => Vec::new(),
        }
    })
}

// ── Happy paths ─────────────────────────────────────────────────────────

#[tokio::test]
async fn canned_text_is_returned_unchanged() {
    let canned = "Agents:\n  - summarizer (Preprod)\n  - translator ✓";
    let (transport, _handle) = MemoryTransport::mcp_server(move |_, _| Ok(canned.to_string()));
    let mut invoker = invoker(transport);

    assert_eq!(invoker.state(), SessionState::NotStarted);
    assert_eq!(invoker.list_agents().await.unwrap(), canned);
    assert_eq!(invoker.state(), SessionState::Ready);
    invoker.stop().await;
}

#[tokio::test]
async fn query_registry_scenario() {
    let (transport, handle) = MemoryTransport::new(|line| {
        let msg: Value = serde_json::from_str(line).unwrap();
        match msg["method"].as_str() {
            Some("initialize") => vec![r#"{"jsonrpc":"2.0","id":1,"result":{"protocolVersion":"2024-11-05","capabilities":{},"serverInfo":{"name":"masumi","version":"1.0"}}}"#.into()],
            Some("tools/call") => vec![r#"{"jsonrpc":"2.0","id":2,"result":{"content":[{"type":"text","text":"{\"agents\":[]}"}]}}"#.into()],
            _ => Vec::new(),
        }
    });
    let mut invoker = invoker(transport);

    let text = invoker.query_registry("Preprod").await.unwrap();
    assert_eq!(text, r#"{"agents":[]}"#);

    let calls = tool_calls(&handle);
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0]["id"], 2);
    assert_eq!(calls[0]["params"]["name"], "query_registry");
    assert_eq!(calls[0]["params"]["arguments"], json!({ "network": "Preprod" }));
    invoker.stop().await;
}

#[tokio::test]
async fn register_agent_arguments_round_trip() {
    let (transport, handle) = MemoryTransport::mcp_server(|name, args| {
        assert_eq!(name, "register_agent");
        Ok(args.to_string())
    });
    let mut invoker = invoker(transport);

    let registration = AgentRegistration {
        network: "Preprod".into(),
        name: "summarizer".into(),
        api_base_url: "https://agent.example/api".into(),
        selling_wallet_vkey: "vkey_test1".into(),
        capability_name: "summarize".into(),
        capability_version: "1.0.0".into(),
        base_price: json!([{ "unit": "lovelace", "amount": "5000000" }]),
        tags: Some(vec!["nlp".into(), "text".into()]),
        description: Some("Summarizes text".into()),
        ..Default::default()
    };

    let echoed: Value = serde_json::from_str(&invoker.register_agent(&registration).await.unwrap()).unwrap();
    assert_eq!(echoed["name"], "summarizer");
    assert_eq!(echoed["network"], "Preprod");
    assert_eq!(echoed["base_price"][0]["amount"], "5000000");
    assert_eq!(echoed["tags"], json!(["nlp", "text"]));

    let sent = &tool_calls(&handle)[0]["params"]["arguments"];
    assert_eq!(sent["selling_wallet_vkey"], "vkey_test1");
    assert!(sent.get("author").is_none());
    invoker.stop().await;
}

#[tokio::test]
async fn wrappers_use_fixed_argument_keys() {
    let (transport, handle) = MemoryTransport::mcp_server(|_, _| Ok("ok".into()));
    let mut invoker = invoker(transport);

    invoker.get_agent_input_schema("agent-1", "https://a").await.unwrap();
    invoker.hire_agent("agent-1", "https://a", json!({ "text": "hi" })).await.unwrap();
    invoker.check_job_status("agent-1", "https://a", "job-9").await.unwrap();
    invoker.get_job_full_result("agent-1", "https://a", "job-9").await.unwrap();
    invoker.query_payments("Mainnet", 25).await.unwrap();

    let calls = tool_calls(&handle);
    let names: Vec<&str> = calls.iter().map(|c| c["params"]["name"].as_str().unwrap()).collect();
    assert_eq!(
        names,
        vec![
            "get_agent_input_schema",
            "hire_agent",
            "check_job_status",
            "get_job_full_result",
            "query_payments"
        ]
    );
    assert_eq!(calls[1]["params"]["arguments"]["input_data"], json!({ "text": "hi" }));
    assert_eq!(calls[2]["params"]["arguments"]["job_id"], "job-9");
    assert_eq!(
        calls[4]["params"]["arguments"],
        json!({ "network": "Mainnet", "limit": 25 })
    );
    invoker.stop().await;
}

#[tokio::test(start_paused = true)]
async fn handshake_does_not_wait_on_initialized_notification() {
    let (transport, handle) = MemoryTransport::mcp_server(|_, _| Ok(String::new()));
    let mut invoker = invoker(transport);

    let before = Instant::now();
    invoker.start().await.unwrap();
    assert_eq!(Instant::now(), before);

    let written = handle.written_json();
    assert_eq!(written.len(), 2);
    assert_eq!(written[1]["method"], "notifications/initialized");
    assert!(written[1].get("id").is_none());
    invoker.stop().await;
}

#[tokio::test]
async fn request_ids_strictly_increase() {
    let (transport, handle) = MemoryTransport::mcp_server(|_, _| Ok(String::new()));
    let mut invoker = invoker(transport);
    for _ in 0..3 {
        invoker.list_agents().await.unwrap();
    }
    let ids: Vec<u64> = handle
        .written_json()
        .iter()
        .filter_map(|m| m["id"].as_u64())
        .collect();
    assert_eq!(ids, vec![1, 2, 3, 4]);
    invoker.stop().await;
}

// ── Failure paths ───────────────────────────────────────────────────────

#[tokio::test]
async fn server_error_is_a_tool_error() {
    let (transport, _handle) =
        MemoryTransport::mcp_server(|_, _| Err(json!({ "code": -32000, "message": "Agent not found" })));
    let mut invoker = invoker(transport);

    let result = invoker.get_agent_input_schema("missing", "https://a").await;
    let err = result.as_ref().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Tool);
    assert_eq!(
        render_legacy(&result),
        r#"❌ Error: {"code":-32000,"message":"Agent not found"}"#
    );
    // A tool error does not end the Session.
    assert_eq!(invoker.state(), SessionState::Ready);
    invoker.stop().await;
}

#[tokio::test(start_paused = true)]
async fn timeout_keeps_session_ready_and_discards_stale_reply() {
    let (transport, handle) = selective_server();
    let mut invoker = invoker(transport);

    let result = invoker.call_tool("slow_tool", json!({ "fast": false })).await;
    assert!(matches!(
        result,
        Err(McpError::Timeout { timeout_ms: 5000, .. })
    ));
    assert_eq!(render_legacy(&result), "❌ Error: Request timeout");
    assert_eq!(invoker.state(), SessionState::Ready);
    assert!(!handle.is_terminated());

    // The slow answer to request 2 arrives late; request 3 must not see it.
    handle.push_line(r#"{"jsonrpc":"2.0","id":2,"result":{"content":[{"type":"text","text":"stale"}]}}"#);
    let text = invoker.call_tool("fast_tool", json!({ "fast": true })).await.unwrap();
    assert_eq!(text, "answer to 3");
    invoker.stop().await;
}

#[tokio::test]
async fn dead_process_is_reported_without_writing() {
    let (transport, handle) = MemoryTransport::mcp_server(|_, _| Ok(String::new()));
    let mut invoker = invoker(transport);
    invoker.start().await.unwrap();

    let traceback = format!("Traceback (most recent call last):\n{}", "x".repeat(400));
    handle.exit(1, &traceback);

    let result = invoker.list_agents().await;
    match &result {
        Err(McpError::ProcessDied { exit_code, stderr }) => {
            assert_eq!(*exit_code, 1);
            assert_eq!(stderr.chars().count(), 200);
            assert!(stderr.starts_with("Traceback"));
        }
        other => panic!("expected ProcessDied, got {other:?}"),
    }
    assert!(render_legacy(&result).starts_with("❌ MCP server process died. Exit code: 1."));
    assert!(tool_calls(&handle).is_empty());
    invoker.stop().await;
}

#[tokio::test]
async fn closed_output_is_server_unresponsive() {
    let (transport, handle) = MemoryTransport::new(|line| {
        let msg: Value = serde_json::from_str(line).unwrap();
        match msg["method"].as_str() {
            Some("initialize") => vec![json!({ "id": msg["id"], "result": {} }).to_string()],
            _ => Vec::new(),
        }
    });
    let mut invoker = invoker(transport);
    invoker.start().await.unwrap();
    handle.close_stdout();

    let result = invoker.list_agents().await;
    assert!(matches!(result, Err(McpError::ServerUnresponsive)));
    assert_eq!(render_legacy(&result), "❌ No response from server");
    invoker.stop().await;
}

#[tokio::test]
async fn unexpected_result_shape_is_malformed() {
    let (transport, _handle) = MemoryTransport::new(|line| {
        let msg: Value = serde_json::from_str(line).unwrap();
        match msg["method"].as_str() {
            Some("initialize") => vec![json!({ "id": msg["id"], "result": {} }).to_string()],
            Some("tools/call") => vec![json!({ "id": msg["id"], "result": { "agents": [] } }).to_string()],
            _ => Vec::new(),
        }
    });
    let mut invoker = invoker(transport);

    let result = invoker.list_agents().await;
    assert_eq!(result.as_ref().unwrap_err().kind(), ErrorKind::MalformedResponse);
    assert_eq!(render_legacy(&result), "❌ Unexpected response format");
    invoker.stop().await;
}

#[tokio::test(start_paused = true)]
async fn failed_handshake_stops_session_for_good() {
    let (transport, handle) = MemoryTransport::silent();
    let mut invoker = invoker(transport);

    let first = invoker.list_agents().await;
    assert_eq!(first.as_ref().unwrap_err().kind(), ErrorKind::Handshake);
    assert!(render_legacy(&first).starts_with("❌ Connection error: "));
    assert_eq!(invoker.state(), SessionState::Stopped);
    assert!(handle.is_terminated());

    let second = invoker.list_agents().await;
    assert!(matches!(second, Err(McpError::SessionStopped)));
    // Only the initialize request was ever written.
    assert_eq!(handle.written().len(), 1);
}

#[tokio::test]
async fn stop_is_idempotent_and_safe_before_start() {
    let (transport, handle) = MemoryTransport::mcp_server(|_, _| Ok(String::new()));
    let mut invoker = invoker(transport);

    invoker.stop().await;
    invoker.stop().await;
    assert_eq!(invoker.state(), SessionState::Stopped);
    assert!(handle.is_terminated());
    assert!(handle.written().is_empty());
}
