//! The request orchestrator: ties together
//! previous-response lookup, request translation, the upstream call (with its
//! retry/degrade/empty-output-retry policy), response translation, and
//! transcript persistence for both the non-streaming and streaming paths.

use std::sync::Arc;

use axum::response::sse::Event;
use futures::StreamExt;
use openbridge_core::models::{
    ChatCompletionResponse, ChatMessage, ResponsesCreateRequest, ResponsesCreateResponse,
};
use openbridge_core::state::StoredResponse;
use openbridge_core::translate::{chat_response_to_responses, translate_request, TranslationOutcome};
use openbridge_core::upstream::{
    apply_degrade_fields, buffer_streaming_response, call_with_retry, decode_chat_stream,
    extract_error_message, ChatStreamFrame,
};
use openbridge_core::{new_id, now_ts, ResponsesStreamTranslator};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use crate::error::ApiError;
use crate::state::AppState;

/// Event queue depth for a single in-flight streaming response: generous
/// enough that ordinary client read latency never drains it, small enough
/// that a truly stalled client is noticed quickly.
const EVENT_QUEUE_CAPACITY: usize = 128;

async fn load_prior_transcript(
    state: &AppState,
    req: &ResponsesCreateRequest,
) -> Result<Option<Vec<ChatMessage>>, ApiError> {
    let Some(prev_id) = &req.previous_response_id else {
        return Ok(None);
    };
    let store = state.state_store.as_ref().ok_or(ApiError::StateDisabled)?;
    let stored = store
        .get(prev_id)
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?
        .ok_or(ApiError::NotFound)?;
    Ok(Some(stored.messages))
}

async fn translate(
    state: &AppState,
    req: &ResponsesCreateRequest,
) -> Result<TranslationOutcome, ApiError> {
    let prior = load_prior_transcript(state, req).await?;
    translate_request(
        req,
        &state.registry,
        &state.model_resolver,
        prior.as_deref(),
        state.settings.max_tokens_buffer,
    )
    .map_err(|e| ApiError::BadRequest(e.to_string()))
}

fn wants_nonzero_budget(req: &ResponsesCreateRequest) -> bool {
    req.max_output_tokens.map_or(true, |budget| budget > 0)
}

fn message_is_empty(message: Option<&ChatMessage>) -> bool {
    match message {
        None => true,
        Some(m) => {
            m.content_as_text().is_empty()
                && m.tool_calls.as_ref().map_or(true, |calls| calls.is_empty())
        }
    }
}

pub async fn handle_non_streaming(
    state: &AppState,
    req: ResponsesCreateRequest,
) -> Result<ResponsesCreateResponse, ApiError> {
    let outcome = translate(state, &req).await?;
    let response_id = new_id("resp");
    let created_at = now_ts();
    let mut payload =
        serde_json::to_value(&outcome.request).map_err(|e| ApiError::Internal(e.to_string()))?;
    let policy = state.retry_policy();

    let mut degraded = false;
    let mut empty_retried = false;
    let chat_response: ChatCompletionResponse = loop {
        let buffered = call_with_retry(state.transport.as_ref(), &payload, &policy)
            .await
            .map_err(|e| ApiError::Internal(e.to_string()))?;

        if buffered.is_error() {
            let message = extract_error_message(&buffered.body);
            if !degraded && apply_degrade_fields(&mut payload, &state.settings.degrade_fields, &message) {
                degraded = true;
                continue;
            }
            return Err(ApiError::Upstream { status: buffered.status, message });
        }

        let parsed: ChatCompletionResponse =
            serde_json::from_slice(&buffered.body).map_err(|e| ApiError::Internal(e.to_string()))?;
        let empty = message_is_empty(parsed.choices.first().and_then(|c| c.message.as_ref()));

        if empty && !empty_retried && wants_nonzero_budget(&req) {
            empty_retried = true;
            tracing::warn!(response_id = %response_id, "empty completion from upstream, retrying once");
            continue;
        }
        if empty && empty_retried {
            return Err(ApiError::BadGateway("upstream returned empty output twice".into()));
        }
        break parsed;
    };

    let response = chat_response_to_responses(
        &chat_response,
        &outcome.request.model,
        &outcome.tools,
        response_id.clone(),
        created_at,
    );

    if req.wants_store() {
        if let Some(store) = &state.state_store {
            let mut messages = outcome.messages_used_for_state.clone();
            if let Some(assistant) = chat_response.choices.first().and_then(|c| c.message.clone()) {
                messages.push(assistant);
            }
            let record = StoredResponse {
                response: response.clone(),
                messages,
                tool_function_map: outcome.tools.function_name_map.clone(),
                model: outcome.request.model.clone(),
            };
            store
                .set(&response_id, record, state.settings.memory_ttl_seconds)
                .await
                .map_err(|e| ApiError::Internal(e.to_string()))?;
        }
    }

    Ok(response)
}

enum SendOutcome {
    Sent,
    Dropped,
    ClientGone,
}

fn try_emit(tx: &mpsc::Sender<Event>, ev: &openbridge_core::models::ResponseStreamEvent) -> SendOutcome {
    use tokio::sync::mpsc::error::TrySendError;
    let event = Event::default().event(ev.name()).data(ev.data_json());
    match tx.try_send(event) {
        Ok(()) => SendOutcome::Sent,
        Err(TrySendError::Full(_)) => SendOutcome::Dropped,
        Err(TrySendError::Closed(_)) => SendOutcome::ClientGone,
    }
}

/// Blocking send for events that must never be dropped (the opening
/// `response.created`, and the closing `response.completed`/`response.failed`).
async fn emit_blocking(tx: &mpsc::Sender<Event>, ev: &openbridge_core::models::ResponseStreamEvent) -> bool {
    let event = Event::default().event(ev.name()).data(ev.data_json());
    tx.send(event).await.is_ok()
}

/// Opens the upstream stream, retrying transient failures and applying at
/// most one field-degrade retry, exactly as the non-streaming path does. Only
/// legal before any client-visible event has been sent.
async fn open_upstream_stream(
    state: &AppState,
    payload: &mut serde_json::Value,
) -> Result<openbridge_core::upstream::StreamingResponse, ApiError> {
    let policy = state.retry_policy();
    let mut degraded = false;
    let mut attempt = 1;
    loop {
        let resp = state
            .transport
            .call_streaming(payload)
            .await
            .map_err(|e| ApiError::Internal(e.to_string()))?;
        if resp.status < 400 {
            return Ok(resp);
        }
        let buffered = buffer_streaming_response(resp)
            .await
            .map_err(|e| ApiError::Internal(e.to_string()))?;
        let message = extract_error_message(&buffered.body);
        if buffered.is_retryable() && attempt < policy.max_attempts {
            tokio::time::sleep(policy.backoff_for_attempt(attempt)).await;
            attempt += 1;
            continue;
        }
        if !degraded && apply_degrade_fields(payload, &state.settings.degrade_fields, &message) {
            degraded = true;
            attempt = 1;
            continue;
        }
        return Err(ApiError::Upstream { status: buffered.status, message });
    }
}

pub async fn handle_streaming(
    state: Arc<AppState>,
    req: ResponsesCreateRequest,
) -> Result<ReceiverStream<Event>, ApiError> {
    let outcome = translate(&state, &req).await?;
    let response_id = new_id("resp");
    let created_at = now_ts();
    let model = outcome.request.model.clone();
    let mut payload =
        serde_json::to_value(&outcome.request).map_err(|e| ApiError::Internal(e.to_string()))?;

    let streaming_resp = open_upstream_stream(&state, &mut payload).await?;

    let (tx, rx) = mpsc::channel::<Event>(EVENT_QUEUE_CAPACITY);
    let wants_store = req.wants_store();
    let ttl = state.settings.memory_ttl_seconds;
    let base_messages = outcome.messages_used_for_state.clone();
    let function_map = outcome.tools.function_name_map.clone();
    let store = state.state_store.clone();

    tokio::spawn(async move {
        let mut translator =
            ResponsesStreamTranslator::new(response_id.clone(), model.clone(), created_at, outcome.tools);

        for ev in translator.start_events() {
            if !emit_blocking(&tx, &ev).await {
                return;
            }
        }

        let mut frames = decode_chat_stream(streaming_resp.body);
        loop {
            match frames.next().await {
                Some(Ok(ChatStreamFrame::Chunk(chunk))) => {
                    let mut dropped = false;
                    for ev in translator.process_chunk(&chunk) {
                        match try_emit(&tx, &ev) {
                            SendOutcome::Sent => {}
                            SendOutcome::ClientGone => return,
                            SendOutcome::Dropped => {
                                tracing::warn!(
                                    response_id = %response_id,
                                    "client too slow to keep up with stream, dropping event"
                                );
                                dropped = true;
                                break;
                            }
                        }
                    }
                    if dropped {
                        let failure = translator.failure_event(serde_json::json!({
                            "message": "client fell behind the event stream and one or more events were dropped",
                        }));
                        let _ = emit_blocking(&tx, &failure).await;
                        return;
                    }
                }
                Some(Ok(ChatStreamFrame::Done)) => break,
                Some(Err(e)) => {
                    let failure = translator.failure_event(serde_json::json!({ "message": e.to_string() }));
                    let _ = emit_blocking(&tx, &failure).await;
                    return;
                }
                None => break,
            }
        }

        for ev in translator.finish_events() {
            if !emit_blocking(&tx, &ev).await {
                return;
            }
        }

        if wants_store {
            if let Some(store) = store {
                let mut messages = base_messages;
                if let Some(assistant) = translator.assistant_message() {
                    messages.push(assistant);
                }
                let record = StoredResponse {
                    response: translator.final_response(),
                    messages,
                    tool_function_map: function_map,
                    model,
                };
                if let Err(e) = store.set(&response_id, record, ttl).await {
                    tracing::warn!(error = %e, "failed to persist streamed response");
                }
            }
        }
    });

    Ok(ReceiverStream::new(rx))
}
