//! Producer Configuration Settings
//!
//! Configuration types for the trade producer, loaded from environment
//! variables. Every variable has a default; a value that fails to parse
//! falls back to the default as well.

use std::str::FromStr;
use std::time::Duration;

use crate::application::services::{DEFAULT_THROUGHPUT_INTERVAL, SupervisorConfig};
use crate::domain::supervisor::BackoffPolicy;
use crate::infrastructure::binance::{BinanceClientConfig, DEFAULT_BASE_URL};
use crate::infrastructure::kafka::KafkaBusConfig;

/// Default symbol list.
pub const DEFAULT_SYMBOLS: &str = "BTCUSDT,ETHUSDT,USDTUSDT";

/// Message bus settings.
#[derive(Debug, Clone)]
pub struct KafkaSettings {
    /// Comma-separated broker list.
    pub bootstrap_servers: String,
    /// Destination topic.
    pub topic: String,
    /// Maximum messages per produce batch.
    pub batch_size: usize,
    /// Connection attempts before giving up.
    pub connect_retries: u32,
    /// Delay between connection attempts.
    pub connect_retry_delay: Duration,
    /// Bound on one delivery acknowledgment.
    pub ack_timeout: Duration,
    /// Internal send retries.
    pub send_retries: u32,
    /// Compression codec.
    pub compression: String,
}

impl Default for KafkaSettings {
    fn default() -> Self {
        Self {
            bootstrap_servers: "kafka:9092".to_string(),
            topic: "crypto-trades".to_string(),
            batch_size: 1,
            connect_retries: 10,
            connect_retry_delay: Duration::from_secs(5),
            ack_timeout: Duration::from_secs(10),
            send_retries: 3,
            compression: "gzip".to_string(),
        }
    }
}

/// Upstream feed settings.
#[derive(Debug, Clone)]
pub struct FeedSettings {
    /// Upper-case, de-duplicated symbols.
    pub symbols: Vec<String>,
    /// WebSocket base URL.
    pub base_url: String,
    /// Replay speed factor.
    pub replay_speed: f64,
    /// Delay before reconnecting the feed.
    pub reconnect_delay: Duration,
    /// Publishes between throughput log lines.
    pub throughput_log_interval: u64,
}

impl Default for FeedSettings {
    fn default() -> Self {
        Self {
            symbols: parse_symbols(DEFAULT_SYMBOLS),
            base_url: DEFAULT_BASE_URL.to_string(),
            replay_speed: 1.0,
            reconnect_delay: Duration::from_secs(5),
            throughput_log_interval: DEFAULT_THROUGHPUT_INTERVAL,
        }
    }
}

/// HTTP server settings.
#[derive(Debug, Clone)]
pub struct ServerSettings {
    /// Port for the health and metrics endpoints.
    pub health_port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self { health_port: 8083 }
    }
}

/// Complete producer configuration.
#[derive(Debug, Clone)]
pub struct ProducerConfig {
    /// Message bus settings.
    pub kafka: KafkaSettings,
    /// Upstream feed settings.
    pub feed: FeedSettings,
    /// HTTP server settings.
    pub server: ServerSettings,
    /// Bound on the bus flush during shutdown.
    pub shutdown_flush_timeout: Duration,
}

impl Default for ProducerConfig {
    fn default() -> Self {
        Self {
            kafka: KafkaSettings::default(),
            feed: FeedSettings::default(),
            server: ServerSettings::default(),
            shutdown_flush_timeout: Duration::from_secs(10),
        }
    }
}

impl ProducerConfig {
    /// Create configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if `SYMBOLS` is set but names no symbol.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create configuration from an arbitrary variable source.
    ///
    /// # Errors
    ///
    /// Returns an error if `SYMBOLS` is set but names no symbol.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let symbols = lookup("SYMBOLS").map_or_else(
            || defaults.feed.symbols.clone(),
            |raw| parse_symbols(&raw),
        );
        if symbols.is_empty() {
            return Err(ConfigError::EmptyValue("SYMBOLS".to_string()));
        }

        let kafka = KafkaSettings {
            bootstrap_servers: lookup("KAFKA_BOOTSTRAP_SERVERS")
                .filter(|v| !v.trim().is_empty())
                .unwrap_or(defaults.kafka.bootstrap_servers),
            topic: lookup("KAFKA_TOPIC")
                .filter(|v| !v.trim().is_empty())
                .unwrap_or(defaults.kafka.topic),
            batch_size: parse_var(&lookup, "BATCH_SIZE", defaults.kafka.batch_size),
            connect_retries: parse_var(
                &lookup,
                "KAFKA_CONNECT_RETRIES",
                defaults.kafka.connect_retries,
            ),
            connect_retry_delay: parse_duration_secs(
                &lookup,
                "KAFKA_CONNECT_RETRY_DELAY_SECS",
                defaults.kafka.connect_retry_delay,
            ),
            ack_timeout: parse_nonzero_duration_secs(
                &lookup,
                "KAFKA_ACK_TIMEOUT_SECS",
                defaults.kafka.ack_timeout,
            ),
            send_retries: parse_var(&lookup, "KAFKA_SEND_RETRIES", defaults.kafka.send_retries),
            compression: lookup("KAFKA_COMPRESSION")
                .map(|v| v.trim().to_lowercase())
                .filter(|v| !v.is_empty())
                .unwrap_or(defaults.kafka.compression),
        };

        let feed = FeedSettings {
            symbols,
            base_url: lookup("BINANCE_STREAM_BASE_URL")
                .filter(|v| !v.trim().is_empty())
                .unwrap_or(defaults.feed.base_url),
            replay_speed: parse_var(&lookup, "REPLAY_SPEED", defaults.feed.replay_speed),
            reconnect_delay: parse_duration_secs(
                &lookup,
                "RECONNECT_DELAY_SECS",
                defaults.feed.reconnect_delay,
            ),
            throughput_log_interval: parse_var(
                &lookup,
                "THROUGHPUT_LOG_INTERVAL",
                defaults.feed.throughput_log_interval,
            ),
        };

        let server = ServerSettings {
            health_port: parse_var(&lookup, "PRODUCER_HEALTH_PORT", defaults.server.health_port),
        };

        Ok(Self {
            kafka,
            feed,
            server,
            shutdown_flush_timeout: parse_duration_secs(
                &lookup,
                "SHUTDOWN_FLUSH_TIMEOUT_SECS",
                defaults.shutdown_flush_timeout,
            ),
        })
    }

    /// Kafka producer settings.
    #[must_use]
    pub fn kafka_bus_config(&self) -> KafkaBusConfig {
        KafkaBusConfig {
            bootstrap_servers: self.kafka.bootstrap_servers.clone(),
            topic: self.kafka.topic.clone(),
            send_retries: self.kafka.send_retries,
            compression: self.kafka.compression.clone(),
            ack_timeout: self.kafka.ack_timeout,
            batch_size: self.kafka.batch_size,
            ..KafkaBusConfig::default()
        }
    }

    /// Binance client settings.
    #[must_use]
    pub fn binance_client_config(&self) -> BinanceClientConfig {
        BinanceClientConfig {
            base_url: self.feed.base_url.clone(),
            ..BinanceClientConfig::default()
        }
    }

    /// Supervisor settings.
    #[must_use]
    pub fn supervisor_config(&self) -> SupervisorConfig {
        SupervisorConfig {
            symbols: self.feed.symbols.clone(),
            reconnect_backoff: BackoffPolicy::fixed(self.feed.reconnect_delay, 0),
            bus_connect_backoff: BackoffPolicy::fixed(
                self.kafka.connect_retry_delay,
                self.kafka.connect_retries.max(1),
            ),
            replay_speed: self.feed.replay_speed,
            flush_timeout: self.shutdown_flush_timeout,
            throughput_interval: self.feed.throughput_log_interval,
        }
    }
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Environment variable has empty value.
    #[error("environment variable {0} cannot be empty")]
    EmptyValue(String),
}

/// Split, trim, upper-case, and de-duplicate a comma-separated symbol list.
#[must_use]
pub fn parse_symbols(raw: &str) -> Vec<String> {
    let mut symbols: Vec<String> = Vec::new();
    for symbol in raw.split(',').map(|s| s.trim().to_uppercase()) {
        if !symbol.is_empty() && !symbols.contains(&symbol) {
            symbols.push(symbol);
        }
    }
    symbols
}

fn parse_var<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    lookup(key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn parse_duration_secs<F>(lookup: &F, key: &str, default: Duration) -> Duration
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map_or(default, Duration::from_secs)
}

/// Like [`parse_duration_secs`], but zero also falls back to `default`.
fn parse_nonzero_duration_secs<F>(lookup: &F, key: &str, default: Duration) -> Duration
where
    F: Fn(&str) -> Option<String>,
{
    Some(parse_duration_secs(lookup, key, default))
        .filter(|d| !d.is_zero())
        .unwrap_or(default)
}
