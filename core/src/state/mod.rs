//! Persisted response state: the narrow key -> record store behind
//! `previous_response_id` continuation.

pub mod memory;
pub mod remote;

use std::collections::HashMap;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{ChatMessage, ResponsesCreateResponse};

pub use memory::MemoryStateStore;
pub use remote::RemoteStateStore;

/// Everything needed to answer a follow-up request against a prior response:
/// the response itself, the reconstructed transcript (including the
/// assistant turn), and the tool/model context used to produce it.
#[derive(Debug, Clone)]
pub struct StoredResponse {
    pub response: ResponsesCreateResponse,
    pub messages: Vec<ChatMessage>,
    pub tool_function_map: HashMap<String, String>,
    pub model: String,
}

#[derive(Debug, Error)]
pub enum StateError {
    #[error("state backend error: {0}")]
    Backend(String),
}

/// A key -> record store with TTL semantics. `ttl_seconds == 0` means no
/// expiry. Implementations must be safe to share behind `Arc<dyn StateStore>`.
#[async_trait]
pub trait StateStore: Send + Sync {
    async fn get(&self, response_id: &str) -> Result<Option<StoredResponse>, StateError>;
    async fn set(
        &self,
        response_id: &str,
        record: StoredResponse,
        ttl_seconds: u64,
    ) -> Result<(), StateError>;
    async fn delete(&self, response_id: &str) -> Result<(), StateError>;

    /// Releases any held resources (connections, background tasks). Most
    /// backends have nothing to do here and can rely on `Drop`; the default
    /// is a no-op so implementors only override it when they actually hold
    /// something that needs an orderly shutdown.
    async fn close(&self) -> Result<(), StateError> {
        Ok(())
    }
}
