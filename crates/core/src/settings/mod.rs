//! Startup settings
//!
//! One immutable settings object is built per binary at startup (see
//! `smsgw_infra_system::settings_loader`) and passed explicitly to each
//! component. Every key has a documented default; `validate()` rejects values
//! the components cannot run with.

pub mod gateway;
pub mod sms;

pub use gateway::{
    ActionCommands, CommandSpec, ExecutorSettings, GatewaySettings, MonitorSettings,
    RecoveryConfirmation,
};
pub use sms::{ModemSettings, ModemTimings, Recipients, SmsSenderSettings, SmsSettings};

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Development: pretty formatting with colors
    #[default]
    Pretty,
    /// Production: JSON structured logging
    Json,
}

/// `[logging]` section shared by every binary
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// EnvFilter directive used when RUST_LOG is unset
    pub level: String,
    pub format: LogFormat,
    /// Optional log file; rotated daily next to the given path
    pub file: Option<PathBuf>,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
            file: None,
        }
    }
}
