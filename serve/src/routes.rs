//! The HTTP surface: health/version/metrics plus the `/v1/responses`
//! resource. Request-id handling and authentication live here, ahead of the
//! orchestrator, so every handler body only ever deals with a validated
//! request.

use std::sync::Arc;
use std::time::Instant;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use openbridge_core::models::ResponsesCreateRequest;
use serde_json::json;
use tokio_stream::wrappers::ReceiverStream;
use uuid::Uuid;

use crate::error::ApiError;
use crate::state::AppState;
use crate::{auth, orchestrator};

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/version", get(version))
        .route("/metrics", get(metrics))
        .route("/v1/responses", post(create_response))
        .route("/v1/responses/:id", get(get_response))
        .route("/v1/responses/:id", delete(delete_response))
        .with_state(state)
}

fn request_id(headers: &HeaderMap) -> String {
    headers
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string())
}

async fn healthz() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

async fn version() -> impl IntoResponse {
    Json(json!({ "version": env!("CARGO_PKG_VERSION") }))
}

async fn metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    (
        [(axum::http::header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

async fn create_response(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<ResponsesCreateRequest>,
) -> Response {
    let rid = request_id(&headers);
    let start = Instant::now();
    let method = "POST";
    let path = "/v1/responses";

    if let Err(e) = auth::check(state.settings.client_api_key.as_deref(), &headers) {
        state.metrics.record(method, path, 401, start.elapsed().as_secs_f64());
        return annotate(e.into_response(), &rid);
    }

    if req.stream {
        match orchestrator::handle_streaming(state.clone(), req).await {
            Ok(stream) => {
                state.metrics.record(method, path, 200, start.elapsed().as_secs_f64());
                let sse = Sse::new(to_sse_stream(stream)).keep_alive(KeepAlive::default());
                annotate(sse.into_response(), &rid)
            }
            Err(e) => {
                let status = status_code(&e);
                state.metrics.record(method, path, status, start.elapsed().as_secs_f64());
                annotate(e.into_response(), &rid)
            }
        }
    } else {
        match orchestrator::handle_non_streaming(&state, req).await {
            Ok(response) => {
                state.metrics.record(method, path, 200, start.elapsed().as_secs_f64());
                annotate((StatusCode::OK, Json(response)).into_response(), &rid)
            }
            Err(e) => {
                let status = status_code(&e);
                state.metrics.record(method, path, status, start.elapsed().as_secs_f64());
                annotate(e.into_response(), &rid)
            }
        }
    }
}

fn to_sse_stream(
    stream: ReceiverStream<Event>,
) -> impl futures::Stream<Item = Result<Event, std::convert::Infallible>> {
    use futures::StreamExt;
    stream.map(Ok)
}

async fn get_response(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Response {
    let rid = request_id(&headers);
    if let Err(e) = auth::check(state.settings.client_api_key.as_deref(), &headers) {
        return annotate(e.into_response(), &rid);
    }
    let Some(store) = &state.state_store else {
        return annotate(ApiError::StateDisabled.into_response(), &rid);
    };
    let result = match store.get(&id).await {
        Ok(Some(stored)) => (StatusCode::OK, Json(stored.response)).into_response(),
        Ok(None) => ApiError::NotFound.into_response(),
        Err(e) => ApiError::Internal(e.to_string()).into_response(),
    };
    annotate(result, &rid)
}

async fn delete_response(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Response {
    let rid = request_id(&headers);
    if let Err(e) = auth::check(state.settings.client_api_key.as_deref(), &headers) {
        return annotate(e.into_response(), &rid);
    }
    let Some(store) = &state.state_store else {
        return annotate(ApiError::StateDisabled.into_response(), &rid);
    };
    let result = match store.delete(&id).await {
        Ok(()) => Json(json!({ "id": id, "object": "response", "deleted": true })).into_response(),
        Err(e) => ApiError::Internal(e.to_string()).into_response(),
    };
    annotate(result, &rid)
}

fn status_code(e: &ApiError) -> u16 {
    e.status().as_u16()
}

fn annotate(mut response: Response, request_id: &str) -> Response {
    if let Ok(value) = request_id.parse() {
        response.headers_mut().insert("x-request-id", value);
    }
    response
}
