//! Redis-backed `StateStore` for multi-node deployments.
//!
//! Keys are namespaced under a configurable prefix (`<prefix>:<response_id>`).
//! `get` falls back to the un-prefixed key when the prefixed key is absent, to
//! ease migration from a deployment that predates the prefix.

use async_trait::async_trait;
use redis::AsyncCommands;

use super::{StateError, StateStore, StoredResponse};

/// On-wire representation of a [`StoredResponse`]; stored as a single JSON
/// document.
#[derive(Debug, serde::Serialize, serde::Deserialize)]
struct StoredResponseDoc {
    response: crate::models::ResponsesCreateResponse,
    messages: Vec<crate::models::ChatMessage>,
    tool_function_map: std::collections::HashMap<String, String>,
    model: String,
}

impl From<StoredResponse> for StoredResponseDoc {
    fn from(r: StoredResponse) -> Self {
        Self {
            response: r.response,
            messages: r.messages,
            tool_function_map: r.tool_function_map,
            model: r.model,
        }
    }
}

impl From<StoredResponseDoc> for StoredResponse {
    fn from(d: StoredResponseDoc) -> Self {
        Self {
            response: d.response,
            messages: d.messages,
            tool_function_map: d.tool_function_map,
            model: d.model,
        }
    }
}

/// `StateStore` backed by a remote Redis-compatible server, for deployments
/// with more than one OpenBridge process sharing response continuation.
pub struct RemoteStateStore {
    manager: redis::aio::ConnectionManager,
    key_prefix: String,
}

impl RemoteStateStore {
    pub async fn connect(url: &str, key_prefix: impl Into<String>) -> Result<Self, StateError> {
        let client = redis::Client::open(url).map_err(|e| StateError::Backend(e.to_string()))?;
        let manager = client
            .get_connection_manager()
            .await
            .map_err(|e| StateError::Backend(e.to_string()))?;
        Ok(Self {
            manager,
            key_prefix: key_prefix.into(),
        })
    }

    fn prefixed_key(&self, response_id: &str) -> String {
        if self.key_prefix.is_empty() {
            response_id.to_string()
        } else {
            format!("{}:{}", self.key_prefix, response_id)
        }
    }

    async fn read_key(&self, key: &str) -> Result<Option<StoredResponse>, StateError> {
        let mut conn = self.manager.clone();
        let raw: Option<String> = conn
            .get(key)
            .await
            .map_err(|e| StateError::Backend(e.to_string()))?;
        let Some(raw) = raw else { return Ok(None) };
        let doc: StoredResponseDoc =
            serde_json::from_str(&raw).map_err(|e| StateError::Backend(e.to_string()))?;
        Ok(Some(doc.into()))
    }
}

#[async_trait]
impl StateStore for RemoteStateStore {
    async fn get(&self, response_id: &str) -> Result<Option<StoredResponse>, StateError> {
        let prefixed = self.prefixed_key(response_id);
        if let Some(found) = self.read_key(&prefixed).await? {
            return Ok(Some(found));
        }
        // Transitional fallback for records written before the prefix existed.
        if prefixed != response_id {
            return self.read_key(response_id).await;
        }
        Ok(None)
    }

    async fn set(
        &self,
        response_id: &str,
        record: StoredResponse,
        ttl_seconds: u64,
    ) -> Result<(), StateError> {
        let key = self.prefixed_key(response_id);
        let doc: StoredResponseDoc = record.into();
        let raw = serde_json::to_string(&doc).map_err(|e| StateError::Backend(e.to_string()))?;
        let mut conn = self.manager.clone();
        if ttl_seconds > 0 {
            conn.set_ex::<_, _, ()>(key, raw, ttl_seconds)
                .await
                .map_err(|e| StateError::Backend(e.to_string()))?;
        } else {
            conn.set::<_, _, ()>(key, raw)
                .await
                .map_err(|e| StateError::Backend(e.to_string()))?;
        }
        Ok(())
    }

    async fn delete(&self, response_id: &str) -> Result<(), StateError> {
        let key = self.prefixed_key(response_id);
        let mut conn = self.manager.clone();
        conn.del::<_, ()>(key)
            .await
            .map_err(|e| StateError::Backend(e.to_string()))?;
        Ok(())
    }
}
