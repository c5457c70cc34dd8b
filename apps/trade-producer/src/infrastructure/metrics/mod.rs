//! Prometheus Metrics Module
//!
//! Exposes producer metrics via Prometheus format for monitoring.
//!
//! # Metrics Categories
//!
//! - **Feed**: messages received, ignored, and rejected by the decoder
//! - **Bus**: trades published, publish failures, delivery latency
//! - **Lifecycle**: supervisor state, feed reconnects, bus connect attempts
//!
//! # Integration
//!
//! Metrics are exposed at `/metrics` on the health server port. Without an
//! installed recorder every `record_*` call is a no-op, so services and tests
//! can call them unconditionally.

use std::sync::OnceLock;
use std::time::Duration;

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use crate::domain::supervisor::SupervisorState;

// =============================================================================
// Global Metrics Handle
// =============================================================================

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Initialize the Prometheus metrics recorder.
///
/// # Panics
///
/// Panics if the recorder cannot be installed.
#[allow(clippy::expect_used)]
pub fn init_metrics() -> PrometheusHandle {
    PROMETHEUS_HANDLE
        .get_or_init(|| {
            let handle = PrometheusBuilder::new()
                .install_recorder()
                .expect("failed to install Prometheus recorder");

            register_metrics();
            handle
        })
        .clone()
}

/// Get the Prometheus handle for rendering metrics.
///
/// Returns `None` if metrics have not been initialized.
#[must_use]
pub fn get_metrics_handle() -> Option<PrometheusHandle> {
    PROMETHEUS_HANDLE.get().cloned()
}

// =============================================================================
// Metric Registration
// =============================================================================

fn register_metrics() {
    describe_counter!(
        "trade_producer_messages_received_total",
        "Raw messages received from the trade feed"
    );
    describe_counter!(
        "trade_producer_messages_ignored_total",
        "Well-formed feed messages that are not trade events"
    );
    describe_counter!(
        "trade_producer_decode_errors_total",
        "Feed messages dropped because they could not be decoded"
    );
    describe_counter!(
        "trade_producer_trades_published_total",
        "Trades acknowledged by the message bus"
    );
    describe_counter!(
        "trade_producer_publish_failures_total",
        "Trades dropped after a failed publish"
    );
    describe_counter!(
        "trade_producer_feed_reconnects_total",
        "Feed reconnection cycles"
    );
    describe_counter!(
        "trade_producer_bus_connect_attempts_total",
        "Message bus connection attempts"
    );
    describe_gauge!(
        "trade_producer_supervisor_state",
        "Supervisor state (0=disconnected 1=connecting 2=streaming 3=shutting_down 4=stopped)"
    );
    describe_histogram!(
        "trade_producer_publish_latency_seconds",
        "Time from send to bus acknowledgment"
    );
}

// =============================================================================
// Metric Recording Functions
// =============================================================================

/// Record a raw message received from the feed.
pub fn record_message_received() {
    counter!("trade_producer_messages_received_total").increment(1);
}

/// Record a feed message that is not a trade.
pub fn record_message_ignored() {
    counter!("trade_producer_messages_ignored_total").increment(1);
}

/// Record a decode failure.
pub fn record_decode_error(reason: &'static str) {
    counter!("trade_producer_decode_errors_total", "reason" => reason).increment(1);
}

/// Record an acknowledged publish and its latency.
pub fn record_published(latency: Duration) {
    counter!("trade_producer_trades_published_total").increment(1);
    histogram!("trade_producer_publish_latency_seconds").record(latency.as_secs_f64());
}

/// Record a failed publish.
pub fn record_publish_failure(reason: &'static str) {
    counter!("trade_producer_publish_failures_total", "reason" => reason).increment(1);
}

/// Record a feed reconnection cycle.
pub fn record_feed_reconnect() {
    counter!("trade_producer_feed_reconnects_total").increment(1);
}

/// Record a bus connection attempt.
pub fn record_bus_connect_attempt(success: bool) {
    let outcome = if success { "success" } else { "failure" };
    counter!("trade_producer_bus_connect_attempts_total", "outcome" => outcome).increment(1);
}

/// Update the supervisor state gauge.
pub fn set_supervisor_state(state: SupervisorState) {
    gauge!("trade_producer_supervisor_state").set(f64::from(state.code()));
}

// =============================================================================
// Tests
// =============================================================================
