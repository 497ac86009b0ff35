//! HTTP server lifecycle.
//!
//! Binds the configured address, mounts `api_router()`, and runs axum
//! with graceful shutdown on a oneshot channel. The returned handle owns
//! the shutdown sender.

use std::net::SocketAddr;

use tokio::sync::oneshot;

use crate::api::router::api_router;
use crate::api::types::ApiContext;

/// Handle to a running API server.
pub struct ApiServer {
    pub addr: SocketAddr,
    shutdown_tx: Option<oneshot::Sender<()>>,
    handle: tokio::task::JoinHandle<()>,
}

impl ApiServer {
    /// Signal the server to stop accepting connections.
    pub fn shutdown(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
            tracing::info!("API server shutdown signal sent");
        }
    }

    /// Wait for the server task to finish.
    pub async fn join(self) {
        let _ = self.handle.await;
    }
}

/// Bind and start serving in a background task.
pub async fn start_server(ctx: ApiContext) -> Result<ApiServer, String> {
    let listener = tokio::net::TcpListener::bind(ctx.config.bind_addr)
        .await
        .map_err(|e| format!("Failed to bind API server: {e}"))?;
    let addr = listener
        .local_addr()
        .map_err(|e| format!("Failed to get server address: {e}"))?;

    let app = api_router(ctx);
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

    let handle = tokio::spawn(async move {
        let shutdown_signal = async move {
            let _ = shutdown_rx.await;
            tracing::info!("API server received shutdown signal");
        };

        tracing::info!(%addr, "API server started");

        if let Err(e) = axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown_signal)
        .await
        {
            tracing::error!("API server error: {e}");
        }

        tracing::info!("API server stopped");
    });

    Ok(ApiServer {
        addr,
        shutdown_tx: Some(shutdown_tx),
        handle,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::router::tests::test_context;

    #[tokio::test]
    async fn start_and_stop_server() {
        let (ctx, _dir) = test_context();
        let mut server = start_server(ctx).await.expect("server should start");
        assert!(server.addr.port() > 0);

        let url = format!("http://{}/health", server.addr);
        let resp = reqwest::get(&url).await.unwrap();
        assert!(resp.status().is_success());
        let json: serde_json::Value = resp.json().await.unwrap();
        assert_eq!(json["status"], "healthy");

        server.shutdown();
    }

    #[tokio::test]
    async fn unknown_route_is_404_over_http() {
        let (ctx, _dir) = test_context();
        let mut server = start_server(ctx).await.expect("server should start");

        let url = format!("http://{}/nonexistent", server.addr);
        let resp = reqwest::get(&url).await.unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::NOT_FOUND);

        server.shutdown();
    }

    #[tokio::test]
    async fn shutdown_is_idempotent() {
        let (ctx, _dir) = test_context();
        let mut server = start_server(ctx).await.expect("server should start");
        server.shutdown();
        server.shutdown();
    }
}
