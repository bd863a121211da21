// SMS sender settings: serial modem and recipients

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

use super::LoggingSettings;
use crate::error::ConfigError;

/// Protocol timings of the modem driver (milliseconds)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModemTimings {
    /// Interval of the read-until poll loop
    pub poll_interval_ms: u64,
    /// Default wait for `OK` on simple commands
    pub command_timeout_ms: u64,
    pub handshake_attempts: u32,
    /// Backoff unit between handshake attempts (multiplied by attempt number)
    pub handshake_backoff_ms: u64,
    pub pin_query_timeout_ms: u64,
    pub pin_submit_timeout_ms: u64,
    pub pin_ready_attempts: u32,
    pub pin_ready_delay_ms: u64,
    pub operator_query_timeout_ms: u64,
    /// Wait for the `>` prompt after AT+CMGS
    pub prompt_timeout_ms: u64,
    /// Wait for the network acknowledgment after the body
    pub ack_timeout_ms: u64,
}

impl Default for ModemTimings {
    fn default() -> Self {
        Self {
            poll_interval_ms: 50,
            command_timeout_ms: 2_000,
            handshake_attempts: 3,
            handshake_backoff_ms: 500,
            pin_query_timeout_ms: 3_000,
            pin_submit_timeout_ms: 5_000,
            pin_ready_attempts: 20,
            pin_ready_delay_ms: 1_000,
            operator_query_timeout_ms: 5_000,
            prompt_timeout_ms: 5_000,
            ack_timeout_ms: 60_000,
        }
    }
}

impl ModemTimings {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_millis(self.command_timeout_ms)
    }

    pub fn handshake_backoff(&self, attempt: u32) -> Duration {
        Duration::from_millis(self.handshake_backoff_ms * u64::from(attempt))
    }

    pub fn pin_query_timeout(&self) -> Duration {
        Duration::from_millis(self.pin_query_timeout_ms)
    }

    pub fn pin_submit_timeout(&self) -> Duration {
        Duration::from_millis(self.pin_submit_timeout_ms)
    }

    pub fn pin_ready_delay(&self) -> Duration {
        Duration::from_millis(self.pin_ready_delay_ms)
    }

    pub fn operator_query_timeout(&self) -> Duration {
        Duration::from_millis(self.operator_query_timeout_ms)
    }

    pub fn prompt_timeout(&self) -> Duration {
        Duration::from_millis(self.prompt_timeout_ms)
    }

    pub fn ack_timeout(&self) -> Duration {
        Duration::from_millis(self.ack_timeout_ms)
    }
}

/// `[modem]` section
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModemSettings {
    pub port: String,
    pub baud_rate: u32,
    /// SIM PIN; empty means none configured
    pub sim_pin: Option<String>,
    pub timings: ModemTimings,
}

impl Default for ModemSettings {
    fn default() -> Self {
        Self {
            port: "/dev/ttyUSB2".to_string(),
            baud_rate: 115_200,
            sim_pin: None,
            timings: ModemTimings::default(),
        }
    }
}

impl ModemSettings {
    pub fn pin(&self) -> Option<&str> {
        self.sim_pin
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
    }
}

/// Recipient list: a TOML array or one comma/newline separated string
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Recipients {
    List(Vec<String>),
    Text(String),
}

impl Default for Recipients {
    fn default() -> Self {
        Recipients::List(Vec::new())
    }
}

impl Recipients {
    pub fn numbers(&self) -> Vec<String> {
        let raw: Vec<&str> = match self {
            Recipients::List(items) => items.iter().map(String::as_str).collect(),
            Recipients::Text(text) => text.split([',', '\n']).collect(),
        };
        raw.into_iter()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(str::to_string)
            .collect()
    }
}

/// `[sms]` section
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SmsSettings {
    pub phone_numbers: Recipients,
    /// Single-recipient fallback when `phone_numbers` is empty
    pub phone_number: Option<String>,
    /// Message texts by key (alert_power, alert_network, reminder, clear)
    pub messages: BTreeMap<String, String>,
    pub delay_between_sends_ms: u64,
}

impl Default for SmsSettings {
    fn default() -> Self {
        Self {
            phone_numbers: Recipients::default(),
            phone_number: None,
            messages: BTreeMap::new(),
            delay_between_sends_ms: 2_000,
        }
    }
}

impl SmsSettings {
    pub fn recipients(&self) -> Vec<String> {
        let numbers = self.phone_numbers.numbers();
        if !numbers.is_empty() {
            return numbers;
        }
        self.phone_number
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(|n| vec![n.to_string()])
            .unwrap_or_default()
    }

    pub fn message(&self, key: &str) -> Option<&str> {
        self.messages
            .get(key)
            .map(|m| m.trim())
            .filter(|m| !m.is_empty())
    }

    pub fn delay_between_sends(&self) -> Duration {
        Duration::from_millis(self.delay_between_sends_ms)
    }
}

/// Whole `sms.toml`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SmsSenderSettings {
    pub modem: ModemSettings,
    pub sms: SmsSettings,
    pub logging: LoggingSettings,
}

impl SmsSenderSettings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.modem.port.trim().is_empty() {
            return Err(ConfigError::MissingKey("modem.port".to_string()));
        }
        if self.modem.baud_rate == 0 {
            return Err(ConfigError::invalid("modem.baud_rate", "must be > 0"));
        }
        if self.modem.timings.handshake_attempts == 0 {
            return Err(ConfigError::invalid(
                "modem.timings.handshake_attempts",
                "must be >= 1",
            ));
        }
        if self.sms.recipients().is_empty() {
            return Err(ConfigError::MissingKey(
                "sms.phone_numbers or sms.phone_number".to_string(),
            ));
        }
        Ok(())
    }
}
