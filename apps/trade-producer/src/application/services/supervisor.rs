//! Connection Supervisor
//!
//! Drives the feed lifecycle. The bus is connected once with a bounded
//! number of attempts; the feed is then connected, streamed, and reconnected
//! forever until the cancellation token fires. Every state change goes
//! through [`SupervisorState::on`].
//!
//! # Cancellation
//!
//! The token is checked before every connect attempt and before every retry
//! sleep, and all sleeps race against it, so shutdown latency is bounded by
//! the connect timeout of the current attempt rather than the retry budget.
//! A message that has been read from the feed is always processed to
//! completion (decode, publish, throttle) before the token is looked at again.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::publisher::{DEFAULT_THROUGHPUT_INTERVAL, Publisher};
use crate::application::ports::{
    BusConnector, BusError, Decoded, FeedConnector, FeedFrame, FeedSession, TradeDecoder,
};
use crate::domain::supervisor::{
    BackoffPolicy, InvalidTransition, SupervisorEvent, SupervisorState, Termination,
};
use crate::infrastructure::metrics;

// =============================================================================
// Configuration
// =============================================================================

/// Supervisor settings.
#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    /// Symbols to subscribe to, upper-case.
    pub symbols: Vec<String>,
    /// Delay between feed reconnects. Should be unbounded.
    pub reconnect_backoff: BackoffPolicy,
    /// Bus connection attempts and the delay between them.
    pub bus_connect_backoff: BackoffPolicy,
    /// Replay speed factor; values below `1.0` pause after every trade.
    pub replay_speed: f64,
    /// Bound on the final bus flush.
    pub flush_timeout: Duration,
    /// Publishes between throughput log lines.
    pub throughput_interval: u64,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            symbols: vec!["BTCUSDT".into(), "ETHUSDT".into()],
            reconnect_backoff: BackoffPolicy::fixed(Duration::from_secs(5), 0),
            bus_connect_backoff: BackoffPolicy::fixed(Duration::from_secs(5), 10),
            replay_speed: 1.0,
            flush_timeout: Duration::from_secs(10),
            throughput_interval: DEFAULT_THROUGHPUT_INTERVAL,
        }
    }
}

impl SupervisorConfig {
    /// Pause inserted after each forwarded trade, if any.
    ///
    /// A replay speed of `0.5` waits two seconds per trade.
    #[must_use]
    pub fn throttle_delay(&self) -> Option<Duration> {
        if self.replay_speed > 0.0 && self.replay_speed < 1.0 {
            Duration::try_from_secs_f64(1.0 / self.replay_speed).ok()
        } else {
            None
        }
    }
}

// =============================================================================
// Errors and Report
// =============================================================================

/// Fatal supervisor errors.
#[derive(Debug, thiserror::Error)]
pub enum SupervisorError {
    /// The bus was unreachable on every allowed attempt.
    #[error("message bus unavailable after {attempts} attempts: {last_error}")]
    BusUnavailable {
        /// Attempts made.
        attempts: u32,
        /// Error from the final attempt.
        last_error: BusError,
    },

    /// Nothing to subscribe to.
    #[error("no symbols configured")]
    NoSymbols,

    /// The supervisor applied an event its state does not accept.
    #[error(transparent)]
    InvalidTransition(#[from] InvalidTransition),
}

/// Counters at the time the supervisor stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SupervisorReport {
    /// Raw messages read from the feed.
    pub messages_received: u64,
    /// Trades acknowledged by the bus.
    pub trades_published: u64,
    /// Trades dropped after a publish failure.
    pub publish_failures: u64,
    /// Messages dropped by the decoder.
    pub decode_errors: u64,
    /// Non-trade messages skipped.
    pub messages_ignored: u64,
    /// Feed reconnect cycles.
    pub feed_reconnects: u64,
}

// =============================================================================
// Shared Status
// =============================================================================

/// Live supervisor status, shared with the health server.
#[derive(Debug)]
pub struct SupervisorStatus {
    state: parking_lot::RwLock<SupervisorState>,
    symbols: Vec<String>,
    last_connected_at: parking_lot::RwLock<Option<DateTime<Utc>>>,
    last_termination: parking_lot::RwLock<Option<String>>,
    messages_received: AtomicU64,
    trades_published: AtomicU64,
    publish_failures: AtomicU64,
    decode_errors: AtomicU64,
    messages_ignored: AtomicU64,
    feed_reconnects: AtomicU64,
}

impl SupervisorStatus {
    /// New status in [`SupervisorState::Disconnected`].
    #[must_use]
    pub const fn new(symbols: Vec<String>) -> Self {
        Self {
            state: parking_lot::RwLock::new(SupervisorState::Disconnected),
            symbols,
            last_connected_at: parking_lot::RwLock::new(None),
            last_termination: parking_lot::RwLock::new(None),
            messages_received: AtomicU64::new(0),
            trades_published: AtomicU64::new(0),
            publish_failures: AtomicU64::new(0),
            decode_errors: AtomicU64::new(0),
            messages_ignored: AtomicU64::new(0),
            feed_reconnects: AtomicU64::new(0),
        }
    }

    fn set_state(&self, state: SupervisorState) {
        *self.state.write() = state;
        if state == SupervisorState::Streaming {
            *self.last_connected_at.write() = Some(Utc::now());
        }
    }

    fn record_termination(&self, termination: &Termination) {
        *self.last_termination.write() = Some(termination.to_string());
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> SupervisorState {
        *self.state.read()
    }

    /// Subscribed symbols.
    #[must_use]
    pub fn symbols(&self) -> &[String] {
        &self.symbols
    }

    /// When the feed last reached `Streaming`.
    #[must_use]
    pub fn last_connected_at(&self) -> Option<DateTime<Utc>> {
        *self.last_connected_at.read()
    }

    /// Description of the last feed termination.
    #[must_use]
    pub fn last_termination(&self) -> Option<String> {
        self.last_termination.read().clone()
    }

    /// Counter snapshot.
    #[must_use]
    pub fn report(&self) -> SupervisorReport {
        SupervisorReport {
            messages_received: self.messages_received.load(Ordering::Relaxed),
            trades_published: self.trades_published.load(Ordering::Relaxed),
            publish_failures: self.publish_failures.load(Ordering::Relaxed),
            decode_errors: self.decode_errors.load(Ordering::Relaxed),
            messages_ignored: self.messages_ignored.load(Ordering::Relaxed),
            feed_reconnects: self.feed_reconnects.load(Ordering::Relaxed),
        }
    }
}

// =============================================================================
// Supervisor
// =============================================================================

/// Owns the feed connector, the bus connector, and the decoder.
pub struct ConnectionSupervisor<C, K, D> {
    feed: C,
    bus: K,
    decoder: D,
    config: SupervisorConfig,
    status: Arc<SupervisorStatus>,
}

impl<C, K, D> ConnectionSupervisor<C, K, D>
where
    C: FeedConnector,
    K: BusConnector,
    D: TradeDecoder,
{
    /// Create a supervisor. Nothing connects until [`run`](Self::run).
    pub fn new(feed: C, bus: K, decoder: D, config: SupervisorConfig) -> Self {
        let status = Arc::new(SupervisorStatus::new(config.symbols.clone()));
        Self {
            feed,
            bus,
            decoder,
            config,
            status,
        }
    }

    /// Shared status handle.
    #[must_use]
    pub fn status(&self) -> Arc<SupervisorStatus> {
        Arc::clone(&self.status)
    }

    /// Run until `cancel` fires or the bus cannot be reached.
    ///
    /// # Errors
    ///
    /// Returns [`SupervisorError::BusUnavailable`] once the bus connect budget
    /// is spent, or [`SupervisorError::NoSymbols`] if there is nothing to
    /// subscribe to. Feed failures are never fatal.
    pub async fn run(self, cancel: CancellationToken) -> Result<SupervisorReport, SupervisorError> {
        if self.config.symbols.is_empty() {
            return Err(SupervisorError::NoSymbols);
        }

        let mut state = SupervisorState::Disconnected;
        self.transition(&mut state, SupervisorEvent::Start)?;

        let bus = match self.connect_bus(&cancel).await {
            Ok(Some(bus)) => bus,
            Ok(None) => return self.shut_down(&mut state, None).await,
            Err(e) => {
                error!(error = %e, "Giving up on message bus");
                self.transition(&mut state, SupervisorEvent::BusExhausted)?;
                return Err(e);
            }
        };
        let publisher = Publisher::new(bus, self.config.throughput_interval);

        let mut attempt: u32 = 0;
        loop {
            if cancel.is_cancelled() {
                break;
            }
            attempt = attempt.saturating_add(1);

            let connected = tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                result = self.feed.connect(&self.config.symbols) => result,
            };

            match connected {
                Ok(session) => {
                    attempt = 0;
                    self.transition(&mut state, SupervisorEvent::FeedConnected)?;
                    info!(symbols = ?self.config.symbols, "Streaming trades");

                    let Some(termination) = self.stream(session, &publisher, &cancel).await else {
                        break;
                    };
                    warn!(reason = %termination, "Feed session ended");
                    self.status.record_termination(&termination);
                    self.transition(&mut state, SupervisorEvent::FeedTerminated(termination))?;
                }
                Err(e) => {
                    warn!(attempt, error = %e, "Feed connection failed");
                    self.transition(&mut state, SupervisorEvent::FeedConnectFailed)?;
                }
            }

            self.status.feed_reconnects.fetch_add(1, Ordering::Relaxed);
            metrics::record_feed_reconnect();

            if cancel.is_cancelled() {
                break;
            }
            let policy = &self.config.reconnect_backoff;
            let delay = policy
                .delay_for_attempt(attempt.max(1))
                .unwrap_or(policy.delay);
            info!(delay_ms = delay.as_millis(), "Reconnecting to feed");
            if !sleep_or_cancel(delay, &cancel).await {
                break;
            }
            self.transition(&mut state, SupervisorEvent::RetryElapsed)?;
        }

        self.shut_down(&mut state, Some(publisher)).await
    }

    /// Connect the bus, retrying per the bus backoff policy.
    ///
    /// `Ok(None)` means cancellation was observed first.
    async fn connect_bus(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Option<K::Bus>, SupervisorError> {
        let policy = &self.config.bus_connect_backoff;
        let mut attempt: u32 = 0;

        loop {
            if cancel.is_cancelled() {
                return Ok(None);
            }
            attempt = attempt.saturating_add(1);

            let result = tokio::select! {
                biased;
                () = cancel.cancelled() => return Ok(None),
                result = self.bus.connect() => result,
            };

            match result {
                Ok(bus) => {
                    metrics::record_bus_connect_attempt(true);
                    info!(attempt, "Connected to message bus");
                    return Ok(Some(bus));
                }
                Err(e) => {
                    metrics::record_bus_connect_attempt(false);
                    warn!(
                        attempt,
                        max_attempts = policy.max_attempts,
                        error = %e,
                        "Message bus connection failed"
                    );
                    let Some(delay) = policy.delay_for_attempt(attempt) else {
                        return Err(SupervisorError::BusUnavailable {
                            attempts: attempt,
                            last_error: e,
                        });
                    };
                    if !sleep_or_cancel(delay, cancel).await {
                        return Ok(None);
                    }
                }
            }
        }
    }

    /// Pump one feed session.
    ///
    /// Returns the termination reason, or `None` if cancelled.
    async fn stream(
        &self,
        mut session: Box<dyn FeedSession>,
        publisher: &Publisher<K::Bus>,
        cancel: &CancellationToken,
    ) -> Option<Termination> {
        loop {
            let frame = tokio::select! {
                biased;
                () = cancel.cancelled() => return None,
                frame = session.next_frame() => frame,
            };

            match frame {
                FeedFrame::Message(raw) => self.handle_message(&raw, publisher, cancel).await,
                FeedFrame::Terminated(termination) => return Some(termination),
            }
        }
    }

    async fn handle_message(
        &self,
        raw: &str,
        publisher: &Publisher<K::Bus>,
        cancel: &CancellationToken,
    ) {
        self.status.messages_received.fetch_add(1, Ordering::Relaxed);
        metrics::record_message_received();

        let event = match self.decoder.decode(raw) {
            Ok(Decoded::Trade(event)) => event,
            Ok(Decoded::Ignored { kind }) => {
                debug!(kind = %kind, "Ignoring non-trade message");
                self.status.messages_ignored.fetch_add(1, Ordering::Relaxed);
                metrics::record_message_ignored();
                return;
            }
            Err(e) => {
                warn!(error = %e, "Dropping undecodable message");
                self.status.decode_errors.fetch_add(1, Ordering::Relaxed);
                metrics::record_decode_error(e.reason());
                return;
            }
        };

        match publisher.publish(&event).await {
            Ok(_) => {
                self.status.trades_published.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => {
                warn!(
                    symbol = %event.symbol(),
                    trade_id = event.trade_id(),
                    error = %e,
                    "Dropping trade after publish failure"
                );
                self.status.publish_failures.fetch_add(1, Ordering::Relaxed);
            }
        }

        if let Some(delay) = self.config.throttle_delay() {
            sleep_or_cancel(delay, cancel).await;
        }
    }

    async fn shut_down(
        &self,
        state: &mut SupervisorState,
        publisher: Option<Publisher<K::Bus>>,
    ) -> Result<SupervisorReport, SupervisorError> {
        self.transition(state, SupervisorEvent::ShutdownRequested)?;
        info!("Shutting down supervisor");

        if let Some(publisher) = publisher {
            match publisher.flush(self.config.flush_timeout).await {
                Ok(()) => info!("Message bus flushed"),
                Err(e) => warn!(error = %e, "Message bus flush incomplete"),
            }
            let stats = publisher.stats();
            info!(
                published = stats.published,
                failed = stats.failed,
                rate_per_sec = stats.rate(),
                "Publisher closed"
            );
        }

        self.transition(state, SupervisorEvent::Drained)?;
        Ok(self.status.report())
    }

    fn transition(
        &self,
        state: &mut SupervisorState,
        event: SupervisorEvent,
    ) -> Result<(), InvalidTransition> {
        let next = state.on(event)?;
        debug!(from = %state, to = %next, "Supervisor transition");
        *state = next;
        self.status.set_state(next);
        metrics::set_supervisor_state(next);
        Ok(())
    }
}

/// Sleep unless cancelled first. Returns `false` on cancellation.
async fn sleep_or_cancel(delay: Duration, cancel: &CancellationToken) -> bool {
    tokio::select! {
        biased;
        () = cancel.cancelled() => false,
        () = tokio::time::sleep(delay) => true,
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_matches_producer_defaults() {
        let config = SupervisorConfig::default();
        assert_eq!(config.bus_connect_backoff.max_attempts, 10);
        assert!(config.reconnect_backoff.is_unbounded());
        assert_eq!(
            config.reconnect_backoff.delay_for_attempt(1),
            Some(Duration::from_secs(5))
        );
        assert_eq!(config.flush_timeout, Duration::from_secs(10));
    }

    #[test]
    fn throttle_only_below_real_time() {
        let mut config = SupervisorConfig::default();
        assert_eq!(config.throttle_delay(), None);

        config.replay_speed = 0.5;
        assert_eq!(config.throttle_delay(), Some(Duration::from_secs(2)));

        config.replay_speed = 4.0;
        assert_eq!(config.throttle_delay(), None);

        config.replay_speed = 0.0;
        assert_eq!(config.throttle_delay(), None);
    }

    #[test]
    fn status_tracks_streaming_time() {
        let status = SupervisorStatus::new(vec!["BTCUSDT".into()]);
        assert_eq!(status.state(), SupervisorState::Disconnected);
        assert!(status.last_connected_at().is_none());

        status.set_state(SupervisorState::Streaming);
        assert!(status.last_connected_at().is_some());

        status.record_termination(&Termination::Closed { code: Some(1001) });
        assert_eq!(status.last_termination().as_deref(), Some("closed (code 1001)"));
    }

    #[test]
    fn error_message_names_attempts() {
        let err = SupervisorError::BusUnavailable {
            attempts: 10,
            last_error: BusError::ConnectionFailed("no brokers".into()),
        };
        assert_eq!(
            err.to_string(),
            "message bus unavailable after 10 attempts: bus connection failed: no brokers"
        );
    }
}
