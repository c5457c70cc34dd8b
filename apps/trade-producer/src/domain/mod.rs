//! Domain Layer - Trade events and the connection lifecycle model.
//!
//! Pure types with no I/O. Everything here is deterministic and can be
//! exercised without a network, a broker, or a runtime.

/// Normalized trade events and the keyed messages built from them.
pub mod trade;

/// Connection supervisor state machine and backoff policy.
pub mod supervisor;
