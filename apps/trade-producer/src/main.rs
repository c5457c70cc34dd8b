//! Trade Producer Binary
//!
//! Streams Binance aggregate trades into Kafka.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin trade-producer
//! ```
//!
//! # Environment Variables
//!
//! All optional:
//! - `KAFKA_BOOTSTRAP_SERVERS`: Broker list (default: kafka:9092)
//! - `KAFKA_TOPIC`: Destination topic (default: crypto-trades)
//! - `SYMBOLS`: Comma-separated symbols (default: BTCUSDT,ETHUSDT,USDTUSDT)
//! - `BATCH_SIZE`: Messages per produce batch (default: 1)
//! - `REPLAY_SPEED`: Values below 1 pause after every trade (default: 1.0)
//! - `RECONNECT_DELAY_SECS`: Feed reconnect delay (default: 5)
//! - `KAFKA_CONNECT_RETRIES`: Bus connect attempts (default: 10)
//! - `KAFKA_CONNECT_RETRY_DELAY_SECS`: Delay between bus attempts (default: 5)
//! - `PRODUCER_HEALTH_PORT`: Health check HTTP port (default: 8083)
//! - `OTEL_ENABLED`: Enable OpenTelemetry export (default: true)
//! - `RUST_LOG`: Log level (default: info)

use std::sync::Arc;

use anyhow::Context;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use trade_producer::infrastructure::health::{HealthServer, HealthServerState};
use trade_producer::infrastructure::telemetry;
use trade_producer::{
    AggTradeDecoder, BinanceFeedConnector, ConnectionSupervisor, KafkaBusConnector,
    ProducerConfig, init_metrics,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("failed to install rustls crypto provider"))?;

    load_dotenv();

    let _telemetry_guard = telemetry::init();

    tracing::info!("Starting trade producer");

    let _metrics_handle = init_metrics();

    let config = ProducerConfig::from_env().context("invalid configuration")?;
    log_config(&config);

    let shutdown_token = CancellationToken::new();

    let supervisor = ConnectionSupervisor::new(
        BinanceFeedConnector::new(config.binance_client_config()),
        KafkaBusConnector::new(config.kafka_bus_config()),
        AggTradeDecoder::new(),
        config.supervisor_config(),
    );

    let health_state = Arc::new(HealthServerState::new(
        env!("CARGO_PKG_VERSION").to_string(),
        supervisor.status(),
    ));
    let health_server = HealthServer::new(
        config.server.health_port,
        health_state,
        shutdown_token.clone(),
    );
    let health_handle = tokio::spawn(async move {
        if let Err(e) = health_server.run().await {
            tracing::error!(error = %e, "Health server error");
        }
    });

    let signal_token = shutdown_token.clone();
    tokio::spawn(async move {
        await_shutdown(signal_token).await;
    });

    let result = supervisor.run(shutdown_token.clone()).await;

    // Stop the health server whether the supervisor stopped on its own or not.
    shutdown_token.cancel();
    let _ = health_handle.await;

    let report = result.context("trade producer stopped")?;
    tracing::info!(
        received = report.messages_received,
        published = report.trades_published,
        publish_failures = report.publish_failures,
        decode_errors = report.decode_errors,
        reconnects = report.feed_reconnects,
        "Trade producer stopped"
    );
    Ok(())
}

/// Load .env file from current or ancestor directories.
fn load_dotenv() {
    if dotenvy::dotenv().is_ok() {
        return;
    }

    if let Ok(cwd) = std::env::current_dir() {
        let mut dir = cwd.as_path();
        while let Some(parent) = dir.parent() {
            let env_path = parent.join(".env");
            if env_path.exists() {
                let _ = dotenvy::from_path(&env_path);
                return;
            }
            dir = parent;
        }
    }
}

/// Log the parsed configuration.
fn log_config(config: &ProducerConfig) {
    tracing::info!(
        symbols = ?config.feed.symbols,
        topic = %config.kafka.topic,
        bootstrap_servers = %config.kafka.bootstrap_servers,
        batch_size = config.kafka.batch_size,
        replay_speed = config.feed.replay_speed,
        health_port = config.server.health_port,
        "Configuration loaded"
    );
    tracing::debug!(
        base_url = %config.feed.base_url,
        reconnect_delay_secs = config.feed.reconnect_delay.as_secs(),
        connect_retries = config.kafka.connect_retries,
        connect_retry_delay_secs = config.kafka.connect_retry_delay.as_secs(),
        ack_timeout_secs = config.kafka.ack_timeout.as_secs(),
        compression = %config.kafka.compression,
        "Pipeline settings"
    );
}

/// Wait for shutdown signal (SIGTERM or SIGINT).
#[allow(clippy::expect_used)]
async fn await_shutdown(shutdown_token: CancellationToken) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("signal handler installation is critical for graceful shutdown");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("SIGTERM handler installation is critical for graceful shutdown")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, initiating shutdown");
        }
        () = shutdown_token.cancelled() => return,
    }

    shutdown_token.cancel();
}
