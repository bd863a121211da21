// Application Layer - Use Cases and Business Logic

pub mod constants;
pub mod modem;
pub mod monitor;
pub mod registry;
pub mod shutdown;

// Re-exports
pub use modem::{FaultStage, ModemSession, ProtocolFault};
pub use monitor::ConnectivityMonitor;
pub use registry::CommandRegistry;
pub use shutdown::{shutdown_channel, ShutdownSender, ShutdownToken};
