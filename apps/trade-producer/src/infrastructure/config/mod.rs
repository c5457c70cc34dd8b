//! Configuration Module
//!
//! Environment-driven configuration for the trade producer.

mod settings;

pub use settings::{
    ConfigError, DEFAULT_SYMBOLS, FeedSettings, KafkaSettings, ProducerConfig, ServerSettings,
    parse_symbols,
};
