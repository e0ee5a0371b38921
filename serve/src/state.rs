//! Shared, process-wide state handed to every axum handler.

use std::sync::Arc;
use std::time::Duration;

use config::Settings;
use openbridge_core::state::StateStore;
use openbridge_core::tools::ToolRegistry;
use openbridge_core::translate::ModelMapResolver;
use openbridge_core::upstream::{RetryPolicy, UpstreamTransport};

use crate::metrics::Metrics;

/// Everything a request handler needs, constructed once at process start.
///
/// The upstream client and the state store are the only pieces of shared
/// mutable state across in-flight requests; both are internally safe for
/// concurrent use.
pub struct AppState {
    pub settings: Settings,
    pub registry: ToolRegistry,
    pub model_resolver: ModelMapResolver,
    pub transport: Arc<dyn UpstreamTransport>,
    pub state_store: Option<Arc<dyn StateStore>>,
    pub metrics: Metrics,
}

impl AppState {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.settings.retry_max_attempts.max(1),
            initial_backoff: Duration::from_secs_f64(self.settings.retry_backoff.max(0.0)),
            max_backoff: Duration::from_secs(self.settings.retry_max_seconds),
        }
    }
}
