// Gateway settings: monitor loop, executor and command whitelist

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

use super::LoggingSettings;
use crate::application::constants::*;
use crate::domain::{ArgType, NotificationAction};
use crate::error::ConfigError;

/// How an active outage is confirmed over
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryConfirmation {
    /// A reachable primary target clears any outage
    #[default]
    PrimaryOnly,
    /// The secondary target must answer too before clearing
    SecondaryToo,
}

/// Whitelisted command name dispatched for each notification action
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ActionCommands {
    pub alert_power: String,
    pub alert_network: String,
    pub reminder: String,
    pub clear: String,
}

impl Default for ActionCommands {
    fn default() -> Self {
        Self {
            alert_power: "send_alert_power".to_string(),
            alert_network: "send_alert_network".to_string(),
            reminder: "send_reminder".to_string(),
            clear: "send_clear".to_string(),
        }
    }
}

impl ActionCommands {
    pub fn command_for(&self, action: NotificationAction) -> &str {
        match action {
            NotificationAction::AlertPower => &self.alert_power,
            NotificationAction::AlertNetwork => &self.alert_network,
            NotificationAction::Reminder => &self.reminder,
            NotificationAction::Clear => &self.clear,
        }
    }
}

/// `[monitor]` section
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorSettings {
    /// External address probed every tick
    pub primary_target: String,
    /// Local router, probed once when the threshold trips
    pub secondary_target: String,
    pub check_interval_secs: u64,
    /// Echo requests per primary probe
    pub probe_attempts: u32,
    pub probe_timeout_secs: u64,
    pub failure_threshold: u32,
    pub reminder_interval_secs: u64,
    pub recovery_confirmation: RecoveryConfirmation,
    pub actions: ActionCommands,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            primary_target: DEFAULT_PRIMARY_TARGET.to_string(),
            secondary_target: DEFAULT_SECONDARY_TARGET.to_string(),
            check_interval_secs: DEFAULT_CHECK_INTERVAL_SECS,
            probe_attempts: DEFAULT_PROBE_ATTEMPTS,
            probe_timeout_secs: DEFAULT_PROBE_TIMEOUT_SECS,
            failure_threshold: DEFAULT_FAILURE_THRESHOLD,
            reminder_interval_secs: DEFAULT_REMINDER_INTERVAL_SECS,
            recovery_confirmation: RecoveryConfirmation::default(),
            actions: ActionCommands::default(),
        }
    }
}

impl MonitorSettings {
    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval_secs)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }

    pub fn reminder_interval(&self) -> Duration {
        Duration::from_secs(self.reminder_interval_secs)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.primary_target.trim().is_empty() {
            return Err(ConfigError::MissingKey("monitor.primary_target".to_string()));
        }
        if self.secondary_target.trim().is_empty() {
            return Err(ConfigError::MissingKey("monitor.secondary_target".to_string()));
        }
        if self.check_interval_secs == 0 {
            return Err(ConfigError::invalid("monitor.check_interval_secs", "must be >= 1"));
        }
        if self.probe_attempts == 0 {
            return Err(ConfigError::invalid("monitor.probe_attempts", "must be >= 1"));
        }
        if self.probe_timeout_secs == 0 {
            return Err(ConfigError::invalid("monitor.probe_timeout_secs", "must be >= 1"));
        }
        if self.failure_threshold == 0 {
            return Err(ConfigError::invalid("monitor.failure_threshold", "must be >= 1"));
        }
        for action in NotificationAction::ALL {
            if self.actions.command_for(action).trim().is_empty() {
                return Err(ConfigError::MissingKey(format!("monitor.actions.{}", action)));
            }
        }
        Ok(())
    }
}

/// `[executor]` section
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorSettings {
    /// Size of the concurrency gate
    pub max_concurrent: usize,
    /// Upper clamp for any timeout (seconds)
    pub max_timeout_secs: u64,
    /// Timeout for commands that declare none (seconds)
    pub default_timeout_secs: u64,
    /// Fixed environment handed to every child
    pub env: BTreeMap<String, String>,
    /// Ambient variables copied through when set
    pub inherit_env: Vec<String>,
    /// Pause between SIGTERM and SIGKILL on timeout
    pub terminate_grace_ms: u64,
}

impl Default for ExecutorSettings {
    fn default() -> Self {
        let env = BTreeMap::from([
            ("PATH".to_string(), "/usr/local/bin:/usr/bin:/bin".to_string()),
            ("LANG".to_string(), "C.UTF-8".to_string()),
        ]);
        Self {
            max_concurrent: DEFAULT_MAX_CONCURRENT_EXECUTIONS,
            max_timeout_secs: DEFAULT_MAX_TIMEOUT_SECS,
            default_timeout_secs: DEFAULT_COMMAND_TIMEOUT_SECS,
            env,
            inherit_env: vec!["HOME".to_string()],
            terminate_grace_ms: DEFAULT_TERMINATE_GRACE_MS,
        }
    }
}

impl ExecutorSettings {
    pub fn terminate_grace(&self) -> Duration {
        Duration::from_millis(self.terminate_grace_ms)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_concurrent == 0 {
            return Err(ConfigError::invalid("executor.max_concurrent", "must be >= 1"));
        }
        if self.max_timeout_secs == 0 || self.max_timeout_secs > MAX_TIMEOUT_CEILING_SECS {
            return Err(ConfigError::invalid(
                "executor.max_timeout_secs",
                format!("must be between 1 and {}", MAX_TIMEOUT_CEILING_SECS),
            ));
        }
        if self.default_timeout_secs == 0 {
            return Err(ConfigError::invalid("executor.default_timeout_secs", "must be >= 1"));
        }
        Ok(())
    }
}

/// One `[[commands]]` entry of the whitelist
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandSpec {
    pub name: String,
    pub executable: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    #[serde(default)]
    pub args_schema: BTreeMap<String, ArgType>,
}

/// Whole `gateway.toml`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewaySettings {
    pub monitor: MonitorSettings,
    pub executor: ExecutorSettings,
    pub commands: Vec<CommandSpec>,
    pub logging: LoggingSettings,
}

impl GatewaySettings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.monitor.validate()?;
        self.executor.validate()?;
        if self.commands.is_empty() {
            return Err(ConfigError::MissingKey("commands".to_string()));
        }
        Ok(())
    }
}
