//! End-to-end HTTP tests: a real OpenBridge server bound to an ephemeral port,
//! talking to a tiny mock upstream (also a real bound server) that serves
//! canned chat-completions responses, driven over a real HTTP client rather
//! than reaching into the router directly.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};
use config::{Settings, StateBackend};
use serde_json::{json, Value};
use tokio::net::TcpListener;

/// One canned upstream reply: either a buffered JSON chat-completion
/// response, or a sequence of SSE chat-completion-chunk payloads.
enum Canned {
    Buffered(u16, Value),
    Stream(Vec<Value>),
}

struct MockUpstream {
    queue: Mutex<VecDeque<Canned>>,
}

async fn mock_chat_completions(State(state): State<Arc<MockUpstream>>) -> axum::response::Response {
    let next = state
        .queue
        .lock()
        .unwrap()
        .pop_front()
        .expect("mock upstream queue exhausted");
    match next {
        Canned::Buffered(status, body) => {
            (axum::http::StatusCode::from_u16(status).unwrap(), Json(body)).into_response()
        }
        Canned::Stream(chunks) => {
            let events = chunks
                .into_iter()
                .map(|c| Event::default().data(c.to_string()))
                .chain(std::iter::once(Event::default().data("[DONE]")))
                .map(Ok::<_, std::convert::Infallible>);
            Sse::new(futures::stream::iter(events))
                .keep_alive(KeepAlive::default())
                .into_response()
        }
    }
}

/// Spawns a mock upstream serving `responses` in order, one per request it
/// receives, and returns its base URL (`http://host:port`, no trailing `/v1`
/// since `Settings::upstream_base_url` appends `/chat/completions` itself).
async fn spawn_mock_upstream(responses: Vec<Canned>) -> String {
    let state = Arc::new(MockUpstream {
        queue: Mutex::new(responses.into_iter().collect()),
    });
    let app = Router::new()
        .route("/chat/completions", post(mock_chat_completions))
        .with_state(state);
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.ok();
    });
    format!("http://{addr}")
}

fn base_settings(upstream_base_url: String) -> Settings {
    Settings {
        upstream_api_key: "sk-test".to_string(),
        upstream_base_url,
        host: "127.0.0.1".to_string(),
        port: 0,
        log_level: "info".to_string(),
        tls_certfile: None,
        tls_keyfile: None,
        tls_keyfile_password: None,
        state_backend: StateBackend::Memory,
        remote_state_url: None,
        state_key_prefix: "openbridge".to_string(),
        client_api_key: None,
        request_timeout_s: 30,
        retry_max_attempts: 1,
        retry_max_seconds: 1,
        retry_backoff: 0.01,
        degrade_fields: Vec::new(),
        max_tokens_buffer: 0,
        memory_ttl_seconds: 60,
        memory_max_entries: None,
        model_map_path: None,
    }
}

/// Spawns an OpenBridge server on an ephemeral port and returns its base URL.
async fn spawn_openbridge(settings: Settings) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let state = serve::build_state(settings).await.unwrap();
    tokio::spawn(serve::run_on_listener(listener, state));
    format!("http://{addr}")
}

fn assistant_message(text: &str) -> Value {
    json!({
        "id": "chatcmpl-1",
        "object": "chat.completion",
        "created": 0,
        "model": "openai/m1",
        "choices": [{
            "index": 0,
            "message": { "role": "assistant", "content": text },
            "finish_reason": "stop",
        }],
    })
}

/// Parses a raw SSE response body into `(event name, data json)` pairs.
fn parse_sse(body: &str) -> Vec<(String, Value)> {
    body.split("\n\n")
        .filter(|frame| !frame.trim().is_empty())
        .map(|frame| {
            let mut name = String::new();
            let mut data = String::new();
            for line in frame.lines() {
                if let Some(rest) = line.strip_prefix("event:") {
                    name = rest.trim().to_string();
                } else if let Some(rest) = line.strip_prefix("data:") {
                    data.push_str(rest.trim());
                }
            }
            let value = if data == "[DONE]" {
                json!("[DONE]")
            } else {
                serde_json::from_str(&data).unwrap_or(Value::Null)
            };
            (name, value)
        })
        .collect()
}

#[tokio::test]
async fn basic_text_non_stream_returns_single_message_output() {
    let upstream = spawn_mock_upstream(vec![Canned::Buffered(200, assistant_message("PONG"))]).await;
    let server = spawn_openbridge(base_settings(upstream)).await;

    let client = reqwest::Client::new();
    let resp = client
        .post(format!("{server}/v1/responses"))
        .json(&json!({
            "model": "m1",
            "instructions": "Reply with exactly 'PONG'.",
            "input": "ping",
            "max_output_tokens": 32,
            "stream": false,
            "store": true,
        }))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["object"], "response");
    assert!(body["model"].as_str().unwrap().contains('/'));
    let output = body["output"].as_array().unwrap();
    assert_eq!(output.len(), 1);
    assert_eq!(output[0]["type"], "message");
    assert_eq!(output[0]["content"][0]["text"], "PONG");
}

#[tokio::test]
async fn builtin_tool_loop_stateful_continuation() {
    let upstream = spawn_mock_upstream(vec![
        Canned::Buffered(
            200,
            json!({
                "id": "chatcmpl-1",
                "choices": [{
                    "index": 0,
                    "message": {
                        "role": "assistant",
                        "content": "",
                        "tool_calls": [{
                            "id": "call_1",
                            "type": "function",
                            "function": { "name": "ob_apply_patch", "arguments": "{\"patch\":\"x\"}" },
                        }],
                    },
                    "finish_reason": "tool_calls",
                }],
            }),
        ),
        Canned::Buffered(200, assistant_message("Applied the patch.")),
    ])
    .await;
    let server = spawn_openbridge(base_settings(upstream)).await;
    let client = reqwest::Client::new();

    let first = client
        .post(format!("{server}/v1/responses"))
        .json(&json!({
            "model": "m1",
            "instructions": "Call the only tool once.",
            "input": "please patch the file",
            "tools": [{"type": "apply_patch"}],
            "tool_choice": "required",
            "stream": false,
            "store": true,
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(first.status(), 200);
    let first_body: Value = first.json().await.unwrap();
    let output = first_body["output"].as_array().unwrap();
    assert_eq!(output.len(), 1);
    assert_eq!(output[0]["type"], "apply_patch_call");
    let call_id = output[0]["call_id"].as_str().unwrap().to_string();
    assert!(!call_id.is_empty());
    let response_id = first_body["id"].as_str().unwrap().to_string();

    let second = client
        .post(format!("{server}/v1/responses"))
        .json(&json!({
            "model": "m1",
            "previous_response_id": response_id,
            "input": [
                {"type": "apply_patch_call_output", "call_id": call_id, "output": {"ok": true}},
                {"role": "user", "content": "Continue."},
            ],
            "stream": false,
            "store": true,
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(second.status(), 200);
    let second_body: Value = second.json().await.unwrap();
    let second_output = second_body["output"].as_array().unwrap();
    assert!(second_output.iter().any(|item| {
        item["type"] == "message" && !item["content"][0]["text"].as_str().unwrap().is_empty()
    }));
}

#[tokio::test]
async fn streaming_text_emits_ordered_events_ending_in_completed() {
    let upstream = spawn_mock_upstream(vec![Canned::Stream(vec![
        json!({"id": "c1", "choices": [{"index": 0, "delta": {"role": "assistant"}}]}),
        json!({"id": "c1", "choices": [{"index": 0, "delta": {"content": "STREAM_"}}]}),
        json!({"id": "c1", "choices": [{"index": 0, "delta": {"content": "OK"}}]}),
        json!({"id": "c1", "choices": [{"index": 0, "delta": {}, "finish_reason": "stop"}]}),
    ])])
    .await;
    let server = spawn_openbridge(base_settings(upstream)).await;

    let client = reqwest::Client::new();
    let resp = client
        .post(format!("{server}/v1/responses"))
        .json(&json!({
            "model": "m1",
            "instructions": "Say STREAM_OK.",
            "input": "go",
            "stream": true,
            "store": true,
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body = resp.text().await.unwrap();
    let events = parse_sse(&body);
    let names: Vec<&str> = events.iter().map(|(n, _)| n.as_str()).collect();

    assert_eq!(names.first(), Some(&"response.created"));
    assert_eq!(names.last(), Some(&"response.completed"));
    assert!(names.iter().filter(|n| **n == "response.output_text.delta").count() >= 1);
    assert_eq!(names.iter().filter(|n| **n == "response.output_text.done").count(), 1);
    assert_eq!(names.iter().filter(|n| **n == "response.output_item.done").count(), 1);

    let done_event = events
        .iter()
        .find(|(n, _)| n == "response.output_text.done")
        .unwrap();
    assert_eq!(done_event.1["text"], "STREAM_OK");
}

#[tokio::test]
async fn allowed_tools_filter_registers_only_the_allowed_builtin() {
    let upstream = spawn_mock_upstream(vec![Canned::Buffered(
        200,
        json!({
            "id": "chatcmpl-1",
            "choices": [{
                "index": 0,
                "message": {
                    "role": "assistant",
                    "content": "",
                    "tool_calls": [{
                        "id": "call_1",
                        "type": "function",
                        "function": { "name": "ob_shell", "arguments": "{\"command\":\"ls\"}" },
                    }],
                },
                "finish_reason": "tool_calls",
            }],
        }),
    )])
    .await;
    let server = spawn_openbridge(base_settings(upstream)).await;

    let client = reqwest::Client::new();
    let resp = client
        .post(format!("{server}/v1/responses"))
        .json(&json!({
            "model": "m1",
            "input": "list files",
            "tools": [{"type": "apply_patch"}, {"type": "shell"}],
            "tool_choice": {"type": "allowed_tools", "mode": "required", "tools": [{"type": "shell"}]},
            "stream": false,
            "store": false,
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    let output = body["output"].as_array().unwrap();
    assert_eq!(output.len(), 1);
    assert_eq!(output[0]["type"], "shell_call");
}

#[tokio::test]
async fn name_collision_is_rejected_before_any_upstream_call() {
    // No canned response queued: if the orchestrator ever reached the
    // upstream, the mock would panic on an empty queue and the test would
    // fail with that panic surfacing as a 500 rather than the expected 400.
    let upstream = spawn_mock_upstream(vec![]).await;
    let server = spawn_openbridge(base_settings(upstream)).await;

    let client = reqwest::Client::new();
    let resp = client
        .post(format!("{server}/v1/responses"))
        .json(&json!({
            "model": "m1",
            "input": "go",
            "tools": [
                {"type": "apply_patch"},
                {"type": "apply_patch"},
            ],
            "stream": false,
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert!(body["error"]["type"] == "invalid_request_error");
    assert!(body["error"]["message"].as_str().unwrap().contains("duplicate tool name"));
}

#[tokio::test]
async fn store_false_response_is_not_retrievable() {
    let upstream = spawn_mock_upstream(vec![Canned::Buffered(200, assistant_message("ok"))]).await;
    let server = spawn_openbridge(base_settings(upstream)).await;

    let client = reqwest::Client::new();
    let resp = client
        .post(format!("{server}/v1/responses"))
        .json(&json!({ "model": "m1", "input": "hi", "stream": false, "store": false }))
        .send()
        .await
        .unwrap();
    let body: Value = resp.json().await.unwrap();
    let id = body["id"].as_str().unwrap();

    let get = client.get(format!("{server}/v1/responses/{id}")).send().await.unwrap();
    assert_eq!(get.status(), 404);
}

#[tokio::test]
async fn bearer_auth_is_enforced_when_client_api_key_is_configured() {
    let upstream = spawn_mock_upstream(vec![]).await;
    let mut settings = base_settings(upstream);
    settings.client_api_key = Some("secret-key".to_string());
    let server = spawn_openbridge(settings).await;

    let client = reqwest::Client::new();
    let resp = client
        .post(format!("{server}/v1/responses"))
        .json(&json!({ "model": "m1", "input": "hi", "stream": false }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);

    let resp = client
        .get(format!("{server}/healthz"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200, "healthz is unauthenticated");
}
