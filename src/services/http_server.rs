//! HTTP server wrapping the API routes.
//!
//! Binds a TCP listener, serves the router on a background task and shuts
//! down gracefully when the handle is stopped.

use std::net::SocketAddr;
use std::time::Duration;

use axum::http::StatusCode;
use axum::middleware;
use axum::response::Response;
use axum::Router;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;

use crate::error::AppError;
use crate::services::http_api::{api_routes, request_timeout_response, ApiState};

/// Handle to control the running HTTP server.
pub struct HttpServerHandle {
    cancel_token: CancellationToken,
    local_addr: SocketAddr,
    task: JoinHandle<()>,
}

impl HttpServerHandle {
    /// Address the server is actually bound to (useful with port 0).
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stop accepting connections and wait for in-flight requests.
    pub async fn stop(self) {
        log::info!("[server] Stopping server on {}", self.local_addr);
        self.cancel_token.cancel();
        if let Err(e) = self.task.await {
            log::error!("[server] Server task failed: {}", e);
        }
    }
}

/// Full application router with timeout and CORS layers.
pub fn build_router(state: ApiState, request_timeout: Duration) -> Router {
    with_service_layers(api_routes().with_state(state), request_timeout)
}

/// Wrap `router` in the CORS and timeout layers.
///
/// A request that runs past `request_timeout` is dropped and answered with
/// the usual JSON error body and status 408.
fn with_service_layers(router: Router, request_timeout: Duration) -> Router {
    router.layer(
        ServiceBuilder::new()
            .layer(CorsLayer::permissive())
            // Outside the timeout so it sees the bare 408 it produces
            .layer(middleware::map_response(timeout_envelope))
            .layer(TimeoutLayer::with_status_code(
                StatusCode::REQUEST_TIMEOUT,
                request_timeout,
            )),
    )
}

async fn timeout_envelope(response: Response) -> Response {
    if response.status() == StatusCode::REQUEST_TIMEOUT {
        log::warn!("[server] Request timed out");
        return request_timeout_response();
    }
    response
}

/// Bind `addr` and serve `app` on a background task.
pub async fn start_server(addr: SocketAddr, app: Router) -> Result<HttpServerHandle, AppError> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| AppError::internal(format!("Failed to bind to {}: {}", addr, e)))?;
    let local_addr = listener
        .local_addr()
        .map_err(|e| AppError::internal(format!("Failed to read local address: {}", e)))?;

    let cancel_token = CancellationToken::new();
    let cancel_clone = cancel_token.clone();

    log::info!("[server] Listening on http://{}", local_addr);

    let task = tokio::spawn(async move {
        let server = axum::serve(listener, app).with_graceful_shutdown(async move {
            cancel_clone.cancelled().await;
        });

        if let Err(e) = server.await {
            log::error!("[server] Server error: {}", e);
        }

        log::info!("[server] Server stopped");
    });

    Ok(HttpServerHandle {
        cancel_token,
        local_addr,
        task,
    })
}
