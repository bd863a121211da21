// Central Error Types for the Gateway

use thiserror::Error;

/// Startup configuration errors.
///
/// Always fatal: the binary refuses to start rather than run degraded.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(String),

    #[error("Missing required key: {0}")]
    MissingKey(String),

    #[error("Invalid value for {key}: {reason}")]
    InvalidValue { key: String, reason: String },

    #[error("Executable for command '{command}' not found: {path}")]
    MissingExecutable { command: String, path: String },

    #[error("Duplicate command name in whitelist: {0}")]
    DuplicateCommand(String),

    #[error("Monitor action '{action}' refers to unknown command '{command}'")]
    UnknownAction { action: String, command: String },
}

impl ConfigError {
    pub fn invalid(key: impl Into<String>, reason: impl Into<String>) -> Self {
        ConfigError::InvalidValue {
            key: key.into(),
            reason: reason.into(),
        }
    }
}

/// Pre-execution validation failures (no process is ever spawned)
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Command '{0}' not found in registry")]
    UnknownCommand(String),

    #[error("Invalid arguments for command '{command}': {reason}")]
    InvalidArguments { command: String, reason: String },
}
