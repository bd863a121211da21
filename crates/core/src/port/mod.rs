// Port Layer - Interfaces for external dependencies

pub mod command_executor;
pub mod id_provider; // For deterministic testing
pub mod modem_transport;
pub mod reachability;
pub mod time_provider;

// Re-exports
pub use command_executor::{
    CommandExecutor, ExecutionErrorKind, ExecutionRequest, ExecutionResult,
};
pub use id_provider::IdProvider;
pub use modem_transport::{ModemTransport, TransportError};
pub use reachability::ReachabilityProber;
pub use time_provider::TimeProvider;
