//! HTTP server for OpenBridge: the axum REST + SSE surface over
//! `openbridge-core`'s translation, streaming and state primitives.
//!
//! **Public API**: [`build_state`], [`run`], [`run_on_listener`].

mod auth;
mod error;
mod metrics;
mod orchestrator;
mod routes;
mod state;

use std::sync::Arc;
use std::time::Duration;

use config::{Settings, StateBackend};
use openbridge_core::state::{MemoryStateStore, RemoteStateStore, StateStore};
use openbridge_core::tools::ToolRegistry;
use openbridge_core::translate::ModelMapResolver;
use openbridge_core::upstream::{ReqwestUpstreamClient, UpstreamTransport};
use tokio::net::TcpListener;
use tracing::info;

pub use error::ApiError;
pub use state::AppState;

/// Builds the process-wide [`AppState`] from [`Settings`], connecting to the
/// remote state backend if configured.
pub async fn build_state(settings: Settings) -> Result<Arc<AppState>, Box<dyn std::error::Error + Send + Sync>> {
    let transport: Arc<dyn UpstreamTransport> = Arc::new(ReqwestUpstreamClient::new(
        settings.upstream_base_url.clone(),
        settings.upstream_api_key.clone(),
        Duration::from_secs(settings.request_timeout_s),
    ));

    let state_store: Option<Arc<dyn StateStore>> = match settings.state_backend {
        StateBackend::Disabled => None,
        StateBackend::Memory => Some(Arc::new(MemoryStateStore::new(settings.memory_max_entries))),
        StateBackend::Remote => {
            let url = settings
                .remote_state_url
                .clone()
                .ok_or("REMOTE_STATE_URL is required when STATE_BACKEND=remote")?;
            let store = RemoteStateStore::connect(&url, settings.state_key_prefix.clone()).await?;
            Some(Arc::new(store))
        }
    };

    let model_resolver = ModelMapResolver::new(settings.model_map_path.clone().map(Into::into));

    Ok(Arc::new(AppState {
        registry: ToolRegistry::default_registry(),
        model_resolver,
        transport,
        state_store,
        metrics: metrics::Metrics::new(),
        settings,
    }))
}

/// Runs the server on an already-bound listener; used directly by tests that
/// bind to `127.0.0.1:0` to get an ephemeral port.
pub async fn run_on_listener(
    listener: TcpListener,
    state: Arc<AppState>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let addr = listener.local_addr()?;
    let tls = state.settings.tls_certfile.clone().zip(state.settings.tls_keyfile.clone());
    let app = routes::router(state);

    match tls {
        None => {
            info!("OpenBridge listening on http://{}", addr);
            axum::serve(listener, app).await?;
        }
        Some((cert, key)) => {
            info!("OpenBridge listening on https://{}", addr);
            let config = axum_server::tls_rustls::RustlsConfig::from_pem_file(cert, key).await?;
            let std_listener = listener.into_std()?;
            std_listener.set_nonblocking(true)?;
            axum_server::from_tcp_rustls(std_listener, config)
                .serve(app.into_make_service())
                .await?;
        }
    }
    Ok(())
}

/// Builds state from `settings` and runs the server on `addr` (default
/// `settings.host:settings.port`).
pub async fn run(settings: Settings) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let addr = format!("{}:{}", settings.host, settings.port);
    let state = build_state(settings).await?;
    let listener = TcpListener::bind(&addr).await?;
    run_on_listener(listener, state).await
}
