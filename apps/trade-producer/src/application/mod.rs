//! Application Layer - Use cases and port definitions.
//!
//! This layer contains the publishing and supervision services and the
//! port interfaces they drive.

/// Port interfaces for the feed and the message bus.
pub mod ports;

/// Publisher and connection supervisor services.
pub mod services;
