// ABOUTME: Integration tests for the gateway client against a mock invoke endpoint
// ABOUTME: Covers connection probing, envelope unwrapping, history polling, and sending

use gatelink_core::{
    ChatMessage, ClientEvent, ConnectionConfig, ConnectionState, GatewayClient, GatewayError,
    InvokeSend, Invoker, Outbound, Role,
};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client_for(url: &str, token: &str) -> GatewayClient {
    let config = ConnectionConfig::new(url, token, "main:main");
    let invoker = Invoker::new(5).unwrap();
    let sender = Arc::new(InvokeSend::new(invoker.clone(), 0));
    GatewayClient::new(config, invoker, sender)
}

async fn mount_tool(server: &MockServer, tool: &str, body: Value) {
    Mock::given(method("POST"))
        .and(path("/tools/invoke"))
        .and(body_partial_json(json!({"tool": tool})))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

fn record_events(client: &GatewayClient) -> (Arc<Mutex<Vec<ClientEvent>>>, gatelink_core::Subscription) {
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = events.clone();
    let sub = client.subscribe(move |event| sink.lock().unwrap().push(event.clone()));
    (events, sub)
}

// ============================================================================
// Connection probe
// ============================================================================

#[tokio::test]
async fn test_connection_ok_marks_connected() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/tools/invoke"))
        .and(header("authorization", "Bearer t"))
        .and(body_partial_json(json!({
            "tool": "sessions_list",
            "args": {"limit": 1},
            "sessionKey": "agent:main:main"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true, "result": {"sessions": []}})))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&format!("{}/", server.uri()), "t");
    assert_eq!(client.config().session_key, "agent:main:main");
    assert_eq!(client.state(), ConnectionState::Disconnected);

    assert_eq!(client.test_connection().await, Ok(()));
    assert_eq!(client.state(), ConnectionState::Connected);
}

#[tokio::test]
async fn test_connection_unreachable_is_friendly() {
    // Port 9 (discard) on loopback is never an HTTP gateway in CI.
    let client = client_for("http://127.0.0.1:9", "t");
    let result = client.test_connection().await;
    match result {
        Err(GatewayError::Unreachable { url }) => assert_eq!(url, "http://127.0.0.1:9"),
        other => panic!("expected Unreachable, got {:?}", other),
    }
    assert_eq!(client.state(), ConnectionState::Disconnected);
}

#[tokio::test]
async fn test_connection_remote_error_passes_through() {
    let server = MockServer::start().await;
    mount_tool(&server, "sessions_list", json!({"ok": false, "error": "invalid token"})).await;

    let client = client_for(&server.uri(), "t");
    assert_eq!(
        client.test_connection().await,
        Err(GatewayError::Remote("invalid token".into()))
    );
    assert_eq!(client.state(), ConnectionState::Disconnected);
}

#[tokio::test]
async fn test_unconfigured_never_sends_request() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .expect(0)
        .mount(&server)
        .await;

    let client = client_for(&server.uri(), "");
    assert!(!client.is_configured());
    assert_eq!(client.state(), ConnectionState::Unconfigured);
    assert_eq!(client.test_connection().await, Err(GatewayError::NotConfigured));
    assert!(client.fetch_history().await.is_empty());
    assert_eq!(
        client.send_message(&Outbound::new("hi")).await,
        Err(GatewayError::NotConfigured)
    );
}

#[tokio::test]
async fn test_non_json_response_is_protocol_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/tools/invoke"))
        .respond_with(ResponseTemplate::new(502).set_body_string("Bad Gateway"))
        .mount(&server)
        .await;

    let client = client_for(&server.uri(), "t");
    let result = client.invoke("sessions_list", json!({})).await;
    assert!(matches!(result, Err(GatewayError::Protocol { status: 502, .. })));
    assert_eq!(client.state(), ConnectionState::Disconnected);
}

// ============================================================================
// History
// ============================================================================

#[tokio::test]
async fn test_fetch_history_flattens_blocks() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/tools/invoke"))
        .and(body_partial_json(json!({
            "tool": "sessions_history",
            "args": {"sessionKey": "agent:main:main", "limit": 50, "includeTools": false}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ok": true,
            "result": {"messages": [{"role": "assistant", "content": [{"type": "text", "text": "hi"}]}]}
        })))
        .mount(&server)
        .await;

    let client = client_for(&server.uri(), "t");
    let history = client.fetch_history().await;
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].role, Role::Assistant);
    assert_eq!(history[0].content, "hi");
}

#[tokio::test]
async fn test_fetch_history_double_encoded_array() {
    let server = MockServer::start().await;
    let inner = json!([
        {"role": "user", "content": "question"},
        {"role": "assistant", "content": [
            {"type": "thinking", "thinking": "..."},
            {"type": "text", "text": "part one"},
            {"type": "text", "text": "part two"}
        ]}
    ]);
    mount_tool(
        &server,
        "sessions_history",
        json!({"ok": true, "result": {"content": [{"type": "text", "text": inner.to_string()}]}}),
    )
    .await;

    let client = client_for(&server.uri(), "t");
    let history = client.fetch_history().await;
    assert_eq!(history.len(), 2);
    assert_eq!(history[1].content, "part one\n\npart two");
}

#[tokio::test]
async fn test_fetch_history_failure_is_empty() {
    let server = MockServer::start().await;
    mount_tool(&server, "sessions_history", json!({"ok": false, "error": "boom"})).await;

    let client = client_for(&server.uri(), "t");
    assert!(client.fetch_history().await.is_empty());
}

#[tokio::test]
async fn test_fetch_history_malformed_shape_is_empty() {
    let server = MockServer::start().await;
    mount_tool(&server, "sessions_history", json!({"ok": true, "result": {"count": 3}})).await;

    let client = client_for(&server.uri(), "t");
    assert!(client.fetch_history().await.is_empty());
}

// ============================================================================
// Sending
// ============================================================================

#[tokio::test]
async fn test_send_message_echoes_original_text() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/tools/invoke"))
        .and(body_partial_json(json!({
            "tool": "sessions_send",
            "args": {
                "sessionKey": "agent:main:main",
                "message": "[Working on file: src/main.rs]\n\nwhat does this do?",
                "timeoutSeconds": 0
            }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true, "result": {"status": "accepted"}})))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server.uri(), "t");
    let (events, _sub) = record_events(&client);

    let outbound = Outbound::new("what does this do?").with_file_context(Some("src/main.rs".into()));
    assert_eq!(client.send_message(&outbound).await, Ok(()));
    assert_eq!(client.state(), ConnectionState::Connected);

    let events = events.lock().unwrap();
    let echoed: Vec<&ChatMessage> = events
        .iter()
        .filter_map(|e| match e {
            ClientEvent::Message(m) => Some(m),
            _ => None,
        })
        .collect();
    assert_eq!(echoed.len(), 1);
    assert_eq!(echoed[0].role, Role::User);
    assert_eq!(echoed[0].content, "what does this do?");
    assert!(events.contains(&ClientEvent::Connection(ConnectionState::Connected)));
}

#[tokio::test]
async fn test_send_failure_marks_disconnected() {
    let server = MockServer::start().await;
    mount_tool(&server, "sessions_list", json!({"ok": true, "result": {}})).await;
    mount_tool(&server, "sessions_send", json!({"ok": false, "error": "session busy"})).await;

    let client = client_for(&server.uri(), "t");
    client.test_connection().await.unwrap();
    let (events, _sub) = record_events(&client);

    let result = client.send_message(&Outbound::new("hello")).await;
    assert_eq!(result, Err(GatewayError::Remote("session busy".into())));
    assert_eq!(client.state(), ConnectionState::Disconnected);

    let events = events.lock().unwrap();
    assert!(!events.iter().any(|e| matches!(e, ClientEvent::Message(_))));
    assert!(events.contains(&ClientEvent::Connection(ConnectionState::Disconnected)));
}

// ============================================================================
// Reload
// ============================================================================

#[tokio::test]
async fn test_reload_resets_state() {
    let server = MockServer::start().await;
    mount_tool(&server, "sessions_list", json!({"ok": true, "result": {}})).await;

    let client = client_for(&server.uri(), "t");
    client.test_connection().await.unwrap();
    assert_eq!(client.state(), ConnectionState::Connected);

    client.reload(ConnectionConfig::new(&server.uri(), "t2", "ops:review"));
    assert_eq!(client.state(), ConnectionState::Disconnected);
    assert_eq!(client.config().session_key, "agent:ops:review");

    client.reload(ConnectionConfig::default());
    assert_eq!(client.state(), ConnectionState::Unconfigured);
}

#[cfg(unix)]
#[tokio::test]
async fn test_cli_send_failure_marks_disconnected() {
    use gatelink_core::{CliSend, CliSendConfig};

    let server = MockServer::start().await;
    mount_tool(&server, "sessions_list", json!({"ok": true, "result": {}})).await;

    let client = GatewayClient::new(
        ConnectionConfig::new(&server.uri(), "t", "main"),
        Invoker::new(5).unwrap(),
        Arc::new(CliSend::new(CliSendConfig {
            binary: "false".into(),
            timeout_secs: 5,
        })),
    );
    assert_eq!(client.send_strategy(), "cli");
    client.test_connection().await.unwrap();
    assert_eq!(client.state(), ConnectionState::Connected);

    let result = client.send_message(&Outbound::new("hello")).await;
    assert!(matches!(result, Err(GatewayError::Process { .. })));
    assert_eq!(client.state(), ConnectionState::Disconnected);
}
