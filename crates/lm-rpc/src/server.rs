//! HTTP server implementation using Axum.

use crate::handlers::{handle_face_resource, handle_health, handle_rpc};
use axum::{
    routing::{get, post},
    Router,
};
use learning_machine::{MachineContext, MachineError};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

/// Application state shared across handlers.
pub struct AppState {
    /// Sampler and learning machine. Every core call holds this lock.
    context: Mutex<MachineContext>,
}

impl AppState {
    pub fn new(context: MachineContext) -> Arc<Self> {
        Arc::new(Self {
            context: Mutex::new(context),
        })
    }

    /// Run `f` against the context on the blocking thread pool.
    ///
    /// Core operations are synchronous and may read files, download weights
    /// or train, so they never run on the async workers.
    pub async fn with_context<T, F>(self: &Arc<Self>, f: F) -> learning_machine::Result<T>
    where
        F: FnOnce(&mut MachineContext) -> learning_machine::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let state = Arc::clone(self);
        tokio::task::spawn_blocking(move || {
            let mut context = state
                .context
                .lock()
                .map_err(|_| MachineError::Other("machine context lock poisoned".to_string()))?;
            f(&mut *context)
        })
        .await
        .map_err(|e| MachineError::Other(format!("worker task failed: {}", e)))?
    }
}

/// Start the JSON-RPC HTTP server.
///
/// Returns the actual address the server is bound to (useful when port=0).
pub async fn start_server(state: Arc<AppState>, host: &str, port: u16) -> anyhow::Result<SocketAddr> {
    // Configure CORS for the browser frontend
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/health", get(handle_health))
        .route("/rpc", post(handle_rpc))
        .route("/faces/:image_id", get(handle_face_resource))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state);

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    let actual_addr = listener.local_addr()?;

    info!("Server listening on {}", actual_addr);

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            error!("Server error: {}", e);
        }
    });

    Ok(actual_addr)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_server_starts() {
        let temp_dir = TempDir::new().unwrap();
        let context = MachineContext::builder(temp_dir.path()).build().unwrap();
        let addr = start_server(AppState::new(context), "127.0.0.1", 0)
            .await
            .unwrap();
        assert!(addr.port() > 0);
    }

    #[tokio::test]
    async fn test_with_context_runs_off_runtime() {
        let temp_dir = TempDir::new().unwrap();
        let context = MachineContext::builder(temp_dir.path()).build().unwrap();
        let state = AppState::new(context);
        let classes = state
            .with_context(|ctx| Ok(ctx.sampler().classes().len()))
            .await
            .unwrap();
        assert_eq!(classes, 7);
    }
}
