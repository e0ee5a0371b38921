//! # openbridge-core
//!
//! The translation core of OpenBridge: a protocol-translation reverse proxy
//! that accepts requests in the shape of a "Responses" conversational API and
//! serves them by calling an upstream "Chat Completions" API.
//!
//! This crate is transport-agnostic — it has no HTTP server, no upstream HTTP
//! client policy beyond [`upstream::UpstreamTransport`], and no process
//! configuration. The `serve` crate wires this crate's pieces (translation,
//! streaming, tool registry, state store) into an `axum` server; `config`
//! supplies the `Settings` that drive it.
//!
//! ## Main modules
//!
//! - [`models`]: wire DTOs for both the Responses shape and the Chat
//!   Completions shape, plus SSE event types and the error envelope.
//! - [`ids`]: opaque id generation (`resp_*`, `item_*`, `call_*`) and
//!   monotonic wall-clock seconds.
//! - [`tools`]: the built-in tool registry and virtualization — rewriting a
//!   built-in tool reference into a function tool for the upstream, and back.
//! - [`translate`]: bidirectional Responses <-> Chat Completions translation,
//!   plus the client-model -> upstream-model routing cache.
//! - [`streaming`]: [`streaming::ResponsesStreamTranslator`], the stateful
//!   bridge from upstream SSE chat chunks to ordered Responses stream events.
//! - [`upstream`]: the narrow upstream HTTP transport trait plus the retry /
//!   degrade / error-extraction policy that the orchestrator composes.
//! - [`state`]: the `StateStore` trait behind `previous_response_id`
//!   continuation, with in-process and Redis-backed implementations.
//! - [`error`]: [`error::CoreError`], the translation-time error taxonomy.

pub mod error;
pub mod ids;
pub mod models;
pub mod state;
pub mod streaming;
pub mod tools;
pub mod translate;
pub mod upstream;

pub use error::CoreError;
pub use ids::{new_id, now_ts};
pub use state::{StateError, StateStore, StoredResponse};
pub use streaming::ResponsesStreamTranslator;
pub use tools::{ToolRegistry, ToolVirtualization};
pub use translate::{chat_response_to_responses, translate_request, ModelMapResolver, TranslationOutcome};
