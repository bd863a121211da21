// SMS Gateway Infrastructure - System Adapters
// Implements: CommandExecutor, ReachabilityProber, ModemTransport; settings and logging setup

pub mod logging;
pub mod ping_prober;
pub mod sandboxed_executor;
pub mod serial_transport;
pub mod settings_loader;

pub use logging::init_logging;
pub use ping_prober::PingProber;
pub use sandboxed_executor::SandboxedExecutor;
pub use serial_transport::SerialTransport;
pub use settings_loader::{load_gateway_settings, load_sms_settings};
