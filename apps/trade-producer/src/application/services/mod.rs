//! Application Services
//!
//! - `Publisher`: keyed, acknowledged sends with throughput tracking
//! - `ConnectionSupervisor`: feed lifecycle, reconnects, and shutdown

mod publisher;
mod supervisor;

pub use publisher::{DEFAULT_THROUGHPUT_INTERVAL, PublishError, Publisher, PublisherStats};
pub use supervisor::{
    ConnectionSupervisor, SupervisorConfig, SupervisorError, SupervisorReport, SupervisorStatus,
};
