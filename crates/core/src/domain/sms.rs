// SMS Delivery Domain Model

use serde::{Deserialize, Serialize};

/// Process exit codes of the SMS sender (signalling channel to the executor)
pub mod exit_code {
    pub const SUCCESS: i32 = 0;
    /// Configuration error, or the serial device cannot be opened
    pub const CONFIG: i32 = 2;
    pub const MODEM_UNRESPONSIVE: i32 = 3;
    pub const PIN_FAILURE: i32 = 4;
    pub const TEXT_MODE: i32 = 5;
    /// Shutdown requested before any send was attempted
    pub const INTERRUPTED: i32 = 6;
    pub const NONE_DELIVERED: i32 = 8;
    pub const PARTIAL_DELIVERY: i32 = 9;
}

/// Modem session state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ModemState {
    Disconnected,
    Handshaking,
    PinRequired,
    Ready,
    Sending,
    Faulted,
}

impl std::fmt::Display for ModemState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ModemState::Disconnected => "DISCONNECTED",
            ModemState::Handshaking => "HANDSHAKING",
            ModemState::PinRequired => "PIN_REQUIRED",
            ModemState::Ready => "READY",
            ModemState::Sending => "SENDING",
            ModemState::Faulted => "FAULTED",
        };
        f.write_str(s)
    }
}

/// Per-recipient delivery outcome
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SmsSendOutcome {
    pub recipient: String,
    pub delivered: bool,
    /// Raw modem text, kept for diagnosis
    pub raw_response: String,
    pub message_reference: Option<String>,
}

impl SmsSendOutcome {
    pub fn failed(recipient: impl Into<String>, raw_response: impl Into<String>) -> Self {
        Self {
            recipient: recipient.into(),
            delivered: false,
            raw_response: raw_response.into(),
            message_reference: None,
        }
    }
}

/// Aggregate classification of a batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BatchClassification {
    FullSuccess,
    PartialSuccess,
    TotalFailure,
}

impl BatchClassification {
    pub fn exit_code(&self) -> i32 {
        match self {
            BatchClassification::FullSuccess => exit_code::SUCCESS,
            BatchClassification::PartialSuccess => exit_code::PARTIAL_DELIVERY,
            BatchClassification::TotalFailure => exit_code::NONE_DELIVERED,
        }
    }
}

/// Result of a sequential send to every recipient
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchReport {
    pub outcomes: Vec<SmsSendOutcome>,
    /// Recipients for which a submission was actually started
    pub attempted: usize,
    /// Shutdown stopped the batch before every recipient was tried
    pub interrupted: bool,
}

impl BatchReport {
    /// Report of a batch that attempted every outcome it holds
    pub fn new(outcomes: Vec<SmsSendOutcome>) -> Self {
        let attempted = outcomes.len();
        Self {
            outcomes,
            attempted,
            interrupted: false,
        }
    }

    pub fn delivered(&self) -> usize {
        self.outcomes.iter().filter(|o| o.delivered).count()
    }

    pub fn total(&self) -> usize {
        self.outcomes.len()
    }

    pub fn classification(&self) -> BatchClassification {
        let delivered = self.delivered();
        if delivered == 0 {
            BatchClassification::TotalFailure
        } else if delivered == self.total() {
            BatchClassification::FullSuccess
        } else {
            BatchClassification::PartialSuccess
        }
    }

    pub fn exit_code(&self) -> i32 {
        if self.interrupted && self.attempted == 0 {
            return exit_code::INTERRUPTED;
        }
        self.classification().exit_code()
    }
}
