// SMS Gateway Core - Domain Logic & Ports
// NO infrastructure dependencies (Hexagonal Architecture)

pub mod application;
pub mod domain;
pub mod error;
pub mod port;
pub mod settings;

pub use error::{ConfigError, ValidationError};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
