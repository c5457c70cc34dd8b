//! Health Check and Metrics Endpoint
//!
//! HTTP endpoint for health checks, supervisor status reporting, and Prometheus metrics.
//! Used by container orchestrators, load balancers, and monitoring systems.
//!
//! # Endpoints
//!
//! - `GET /health` - Returns JSON health status
//! - `GET /healthz` - Kubernetes liveness probe (simple OK)
//! - `GET /readyz` - Kubernetes readiness probe (ready while streaming)
//! - `GET /metrics` - Prometheus metrics in text format

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::{Json, Router, extract::State, http::StatusCode, response::IntoResponse, routing::get};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::application::services::SupervisorStatus;
use crate::domain::supervisor::SupervisorState;
use crate::infrastructure::metrics::get_metrics_handle;

// =============================================================================
// Health Response Types
// =============================================================================

/// Health check response.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Overall status: "healthy", "degraded", or "unhealthy".
    pub status: HealthStatus,
    /// Producer version.
    pub version: String,
    /// Server uptime in seconds.
    pub uptime_secs: u64,
    /// Current time.
    pub current_time: DateTime<Utc>,
    /// Feed and supervisor status.
    pub feed: FeedInfo,
    /// Pipeline counters.
    pub counters: CounterInfo,
}

/// Overall health status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// Trades are flowing.
    Healthy,
    /// Reconnecting; the process is expected to recover.
    Degraded,
    /// Stopping or stopped.
    Unhealthy,
}

impl From<SupervisorState> for HealthStatus {
    fn from(state: SupervisorState) -> Self {
        match state {
            SupervisorState::Streaming => Self::Healthy,
            SupervisorState::Disconnected | SupervisorState::Connecting => Self::Degraded,
            SupervisorState::ShuttingDown | SupervisorState::Stopped => Self::Unhealthy,
        }
    }
}

/// Feed connection status.
#[derive(Debug, Clone, Serialize)]
pub struct FeedInfo {
    /// Supervisor state.
    pub state: String,
    /// Whether the feed is streaming.
    pub connected: bool,
    /// Subscribed symbols.
    pub symbols: Vec<String>,
    /// When the feed last started streaming.
    pub last_connected_at: Option<DateTime<Utc>>,
    /// Reason the last session ended.
    pub last_termination: Option<String>,
}

/// Pipeline counters.
#[derive(Debug, Clone, Serialize)]
pub struct CounterInfo {
    /// Raw messages received.
    pub messages_received: u64,
    /// Trades acknowledged by the bus.
    pub trades_published: u64,
    /// Trades dropped after publish failures.
    pub publish_failures: u64,
    /// Messages dropped by the decoder.
    pub decode_errors: u64,
    /// Feed reconnect cycles.
    pub feed_reconnects: u64,
}

// =============================================================================
// Health Server State
// =============================================================================

/// Shared state for the health server.
pub struct HealthServerState {
    version: String,
    started_at: Instant,
    status: Arc<SupervisorStatus>,
}

impl HealthServerState {
    /// Create new health server state.
    #[must_use]
    pub fn new(version: String, status: Arc<SupervisorStatus>) -> Self {
        Self {
            version,
            started_at: Instant::now(),
            status,
        }
    }
}

// =============================================================================
// Health Server
// =============================================================================

/// Health check HTTP server.
pub struct HealthServer {
    port: u16,
    state: Arc<HealthServerState>,
    cancel: CancellationToken,
}

impl HealthServer {
    /// Create a new health server.
    #[must_use]
    pub const fn new(port: u16, state: Arc<HealthServerState>, cancel: CancellationToken) -> Self {
        Self {
            port,
            state,
            cancel,
        }
    }

    /// Run the health server until cancelled.
    ///
    /// # Errors
    ///
    /// Returns `HealthServerError` if binding fails or the HTTP server
    /// encounters a fatal error while running.
    pub async fn run(self) -> Result<(), HealthServerError> {
        let app = router(self.state);

        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| HealthServerError::BindFailed(self.port, e.to_string()))?;

        tracing::info!(port = self.port, "Health server listening");

        axum::serve(listener, app)
            .with_graceful_shutdown(self.cancel.cancelled_owned())
            .await
            .map_err(|e| HealthServerError::ServerFailed(e.to_string()))?;

        tracing::info!("Health server stopped");
        Ok(())
    }
}

fn router(state: Arc<HealthServerState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/healthz", get(liveness_handler))
        .route("/readyz", get(readiness_handler))
        .route("/metrics", get(metrics_handler))
        .with_state(state)
}

// =============================================================================
// HTTP Handlers
// =============================================================================

async fn health_handler(State(state): State<Arc<HealthServerState>>) -> impl IntoResponse {
    let response = build_health_response(&state);
    let status_code = match response.status {
        HealthStatus::Healthy | HealthStatus::Degraded => StatusCode::OK,
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };
    (status_code, Json(response))
}

async fn liveness_handler() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

async fn readiness_handler(State(state): State<Arc<HealthServerState>>) -> impl IntoResponse {
    if state.status.state() == SupervisorState::Streaming {
        (StatusCode::OK, "READY")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "NOT READY")
    }
}

async fn metrics_handler() -> impl IntoResponse {
    get_metrics_handle().map_or_else(
        || {
            (
                StatusCode::SERVICE_UNAVAILABLE,
                [("content-type", "text/plain")],
                "Metrics not initialized".to_string(),
            )
        },
        |handle| {
            let body = handle.render();
            (
                StatusCode::OK,
                [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
                body,
            )
        },
    )
}

fn build_health_response(state: &HealthServerState) -> HealthResponse {
    let supervisor_state = state.status.state();
    let report = state.status.report();

    HealthResponse {
        status: HealthStatus::from(supervisor_state),
        version: state.version.clone(),
        uptime_secs: state.started_at.elapsed().as_secs(),
        current_time: Utc::now(),
        feed: FeedInfo {
            state: supervisor_state.as_str().to_string(),
            connected: supervisor_state == SupervisorState::Streaming,
            symbols: state.status.symbols().to_vec(),
            last_connected_at: state.status.last_connected_at(),
            last_termination: state.status.last_termination(),
        },
        counters: CounterInfo {
            messages_received: report.messages_received,
            trades_published: report.trades_published,
            publish_failures: report.publish_failures,
            decode_errors: report.decode_errors,
            feed_reconnects: report.feed_reconnects,
        },
    }
}

// =============================================================================
// Errors
// =============================================================================

/// Health server errors.
#[derive(Debug, thiserror::Error)]
pub enum HealthServerError {
    /// Failed to bind to port.
    #[error("failed to bind to port {0}: {1}")]
    BindFailed(u16, String),

    /// Server error.
    #[error("server error: {0}")]
    ServerFailed(String),
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn health_status_serialization() {
        assert_eq!(
            serde_json::to_string(&HealthStatus::Healthy).unwrap(),
            "\"healthy\""
        );
        assert_eq!(
            serde_json::to_string(&HealthStatus::Degraded).unwrap(),
            "\"degraded\""
        );
        assert_eq!(
            serde_json::to_string(&HealthStatus::Unhealthy).unwrap(),
            "\"unhealthy\""
        );
    }

    #[test]
    fn status_follows_supervisor_state() {
        assert_eq!(
            HealthStatus::from(SupervisorState::Streaming),
            HealthStatus::Healthy
        );
        assert_eq!(
            HealthStatus::from(SupervisorState::Connecting),
            HealthStatus::Degraded
        );
        assert_eq!(
            HealthStatus::from(SupervisorState::Disconnected),
            HealthStatus::Degraded
        );
        assert_eq!(
            HealthStatus::from(SupervisorState::Stopped),
            HealthStatus::Unhealthy
        );
    }

    #[test]
    fn fresh_status_reports_degraded() {
        let status = Arc::new(SupervisorStatus::new(vec!["BTCUSDT".to_string()]));
        let state = HealthServerState::new("0.1.0".to_string(), status);

        let response = build_health_response(&state);
        assert_eq!(response.status, HealthStatus::Degraded);
        assert_eq!(response.feed.state, "disconnected");
        assert!(!response.feed.connected);
        assert_eq!(response.feed.symbols, vec!["BTCUSDT"]);
        assert_eq!(response.counters.trades_published, 0);
    }
}
