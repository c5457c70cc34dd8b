//! Connection Supervisor State Machine
//!
//! The lifecycle of the feed connection as an explicit, pure transition
//! function. Callback-style connection events (open, message, error, close)
//! are turned into [`SupervisorEvent`]s and applied with
//! [`SupervisorState::on`]; the async supervisor only drives I/O and records
//! the resulting state.
//!
//! ```text
//!              Start / RetryElapsed          FeedConnected
//! Disconnected ────────────────────► Connecting ─────────────► Streaming
//!      ▲                                 │                         │
//!      │        FeedConnectFailed        │                         │
//!      ├─────────────────────────────────┘                         │
//!      │                      FeedTerminated                       │
//!      └───────────────────────────────────────────────────────────┘
//!
//!  any non-terminal ── ShutdownRequested ──► ShuttingDown ── Drained ──► Stopped
//!  Connecting ── BusExhausted ──► Stopped
//! ```

mod backoff;

pub use backoff::BackoffPolicy;

use std::fmt;

// =============================================================================
// Termination Reasons
// =============================================================================

/// Why a feed session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Termination {
    /// The peer closed the connection (close frame or end of stream).
    Closed {
        /// WebSocket close code, when the peer sent one.
        code: Option<u16>,
    },
    /// The connection failed.
    Error {
        /// Error description.
        cause: String,
    },
}

impl fmt::Display for Termination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Closed { code: Some(code) } => write!(f, "closed (code {code})"),
            Self::Closed { code: None } => write!(f, "closed"),
            Self::Error { cause } => write!(f, "error: {cause}"),
        }
    }
}

// =============================================================================
// States and Events
// =============================================================================

/// Supervisor lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SupervisorState {
    /// Not connected; about to (re)connect.
    Disconnected,
    /// Establishing the bus and/or feed connection.
    Connecting,
    /// Feed session active; trades flowing.
    Streaming,
    /// Shutdown requested; draining and flushing.
    ShuttingDown,
    /// Terminal.
    Stopped,
}

/// Inputs to the state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SupervisorEvent {
    /// Supervisor started.
    Start,
    /// Reconnect delay elapsed.
    RetryElapsed,
    /// Feed connection established.
    FeedConnected,
    /// Feed connection attempt failed.
    FeedConnectFailed,
    /// Active feed session ended.
    FeedTerminated(Termination),
    /// Bus connect attempts exhausted.
    BusExhausted,
    /// External cancellation observed.
    ShutdownRequested,
    /// Bus flushed and closed.
    Drained,
}

/// An event that is not valid in the current state.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid transition from {from:?} on {event:?}")]
pub struct InvalidTransition {
    /// State the event was applied to.
    pub from: SupervisorState,
    /// Rejected event.
    pub event: SupervisorEvent,
}

impl SupervisorState {
    /// Apply an event, returning the next state.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidTransition`] if the event is not accepted in this state.
    pub fn on(self, event: SupervisorEvent) -> Result<Self, InvalidTransition> {
        use SupervisorEvent as E;

        let next = match (self, &event) {
            (Self::ShuttingDown | Self::Stopped, E::ShutdownRequested) => Some(self),
            (_, E::ShutdownRequested) => Some(Self::ShuttingDown),
            (Self::Disconnected, E::Start | E::RetryElapsed) => Some(Self::Connecting),
            (Self::Connecting, E::FeedConnected) => Some(Self::Streaming),
            (Self::Connecting, E::FeedConnectFailed) | (Self::Streaming, E::FeedTerminated(_)) => {
                Some(Self::Disconnected)
            }
            (Self::Connecting, E::BusExhausted) | (Self::ShuttingDown, E::Drained) => {
                Some(Self::Stopped)
            }
            _ => None,
        };
        next.ok_or(InvalidTransition { from: self, event })
    }

    /// Whether no further transitions are possible.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Stopped)
    }

    /// Lower-case name for logs and health output.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Streaming => "streaming",
            Self::ShuttingDown => "shutting_down",
            Self::Stopped => "stopped",
        }
    }

    /// Numeric code for the state gauge.
    #[must_use]
    pub const fn code(self) -> u8 {
        match self {
            Self::Disconnected => 0,
            Self::Connecting => 1,
            Self::Streaming => 2,
            Self::ShuttingDown => 3,
            Self::Stopped => 4,
        }
    }
}

impl fmt::Display for SupervisorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    use SupervisorEvent as E;
    use SupervisorState as S;

    #[test]
    fn happy_path() {
        let state = S::Disconnected
            .on(E::Start)
            .and_then(|s| s.on(E::FeedConnected))
            .unwrap();
        assert_eq!(state, S::Streaming);
    }

    #[test_case(Termination::Closed { code: Some(1000) } ; "graceful close")]
    #[test_case(Termination::Closed { code: None } ; "stream ended")]
    #[test_case(Termination::Error { cause: "reset by peer".into() } ; "io error")]
    fn any_termination_leads_back_to_connecting(reason: Termination) {
        let state = S::Streaming.on(E::FeedTerminated(reason)).unwrap();
        assert_eq!(state, S::Disconnected);
        assert_eq!(state.on(E::RetryElapsed).unwrap(), S::Connecting);
    }

    #[test]
    fn feed_retry_cycle_never_terminates() {
        let mut state = S::Disconnected.on(E::Start).unwrap();
        for _ in 0..1_000 {
            state = state
                .on(E::FeedConnectFailed)
                .and_then(|s| s.on(E::RetryElapsed))
                .unwrap();
            assert_eq!(state, S::Connecting);
        }
    }

    #[test_case(S::Disconnected)]
    #[test_case(S::Connecting)]
    #[test_case(S::Streaming)]
    fn shutdown_from_any_live_state(from: SupervisorState) {
        let state = from.on(E::ShutdownRequested).unwrap();
        assert_eq!(state, S::ShuttingDown);
        assert_eq!(state.on(E::Drained).unwrap(), S::Stopped);
    }

    #[test]
    fn shutdown_is_idempotent() {
        assert_eq!(S::ShuttingDown.on(E::ShutdownRequested).unwrap(), S::ShuttingDown);
        assert_eq!(S::Stopped.on(E::ShutdownRequested).unwrap(), S::Stopped);
    }

    #[test]
    fn bus_exhaustion_is_terminal() {
        let state = S::Connecting.on(E::BusExhausted).unwrap();
        assert!(state.is_terminal());
    }

    #[test]
    fn stopped_rejects_reconnects() {
        let err = S::Stopped.on(E::RetryElapsed).unwrap_err();
        assert_eq!(err.from, S::Stopped);
        assert!(S::Stopped.on(E::Start).is_err());
    }

    #[test]
    fn streaming_rejects_connect_failure() {
        assert!(S::Streaming.on(E::FeedConnectFailed).is_err());
    }

    #[test]
    fn termination_display() {
        assert_eq!(
            Termination::Closed { code: Some(1006) }.to_string(),
            "closed (code 1006)"
        );
        assert_eq!(
            Termination::Error {
                cause: "timeout".into()
            }
            .to_string(),
            "error: timeout"
        );
    }
}
