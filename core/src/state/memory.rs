//! In-process state store: lazy TTL expiration plus an optional size bound
//! with oldest-first eviction. The size bound has no counterpart in the
//! reference implementation this system was distilled from; it is a fresh
//! addition so a long-running single-node deployment with no external store
//! does not grow without limit.

use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::{StateError, StateStore, StoredResponse};

struct Entry {
    expires_at: Option<Instant>,
    record: StoredResponse,
}

struct Inner {
    entries: HashMap<String, Entry>,
    /// Insertion order, oldest first; used only for size-bound eviction.
    order: VecDeque<String>,
}

/// In-memory `StateStore`. Suitable for a single-node deployment and for
/// tests. Entries past their TTL are dropped lazily on the next `get`.
pub struct MemoryStateStore {
    inner: Mutex<Inner>,
    max_entries: Option<usize>,
}

impl MemoryStateStore {
    pub fn new(max_entries: Option<usize>) -> Self {
        Self {
            inner: Mutex::new(Inner {
                entries: HashMap::new(),
                order: VecDeque::new(),
            }),
            max_entries,
        }
    }
}

impl Default for MemoryStateStore {
    fn default() -> Self {
        Self::new(None)
    }
}

#[async_trait]
impl StateStore for MemoryStateStore {
    async fn get(&self, response_id: &str) -> Result<Option<StoredResponse>, StateError> {
        let mut inner = self.inner.lock().await;
        let expired = match inner.entries.get(response_id) {
            Some(entry) => matches!(entry.expires_at, Some(t) if t <= Instant::now()),
            None => return Ok(None),
        };
        if expired {
            inner.entries.remove(response_id);
            return Ok(None);
        }
        Ok(inner.entries.get(response_id).map(|e| e.record.clone()))
    }

    async fn set(
        &self,
        response_id: &str,
        record: StoredResponse,
        ttl_seconds: u64,
    ) -> Result<(), StateError> {
        let mut inner = self.inner.lock().await;
        let expires_at = if ttl_seconds > 0 {
            Some(Instant::now() + Duration::from_secs(ttl_seconds))
        } else {
            None
        };
        if inner.entries.insert(response_id.to_string(), Entry { expires_at, record }).is_none() {
            inner.order.push_back(response_id.to_string());
        }
        if let Some(max) = self.max_entries {
            while inner.entries.len() > max {
                let Some(oldest) = inner.order.pop_front() else {
                    break;
                };
                inner.entries.remove(&oldest);
            }
        }
        Ok(())
    }

    async fn delete(&self, response_id: &str) -> Result<(), StateError> {
        let mut inner = self.inner.lock().await;
        inner.entries.remove(response_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ResponsesCreateResponse;

    fn stored(id: &str) -> StoredResponse {
        StoredResponse {
            response: ResponsesCreateResponse::empty(id.to_string(), 0, "m".to_string()),
            messages: Vec::new(),
            tool_function_map: Default::default(),
            model: "m".to_string(),
        }
    }

    #[tokio::test]
    async fn set_then_get_round_trips() {
        let store = MemoryStateStore::default();
        store.set("r1", stored("r1"), 0).await.unwrap();
        let got = store.get("r1").await.unwrap();
        assert!(got.is_some());
    }

    #[tokio::test]
    async fn expired_entry_is_not_returned() {
        let store = MemoryStateStore::default();
        store.set("r1", stored("r1"), 1).await.unwrap();
        tokio::time::pause();
        tokio::time::advance(Duration::from_secs(2)).await;
        assert!(store.get("r1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn delete_removes_entry() {
        let store = MemoryStateStore::default();
        store.set("r1", stored("r1"), 0).await.unwrap();
        store.delete("r1").await.unwrap();
        assert!(store.get("r1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn size_bound_evicts_oldest_first() {
        let store = MemoryStateStore::new(Some(2));
        store.set("r1", stored("r1"), 0).await.unwrap();
        store.set("r2", stored("r2"), 0).await.unwrap();
        store.set("r3", stored("r3"), 0).await.unwrap();
        assert!(store.get("r1").await.unwrap().is_none());
        assert!(store.get("r2").await.unwrap().is_some());
        assert!(store.get("r3").await.unwrap().is_some());
    }
}
