// Domain Layer - Pure business logic and entities

pub mod command;
pub mod outage;
pub mod sms;

// Re-exports
pub use command::{ArgType, CommandArgs, CommandDefinition};
pub use outage::{NotificationAction, OutageKind, OutageState, Reachability};
pub use sms::{exit_code, BatchClassification, BatchReport, ModemState, SmsSendOutcome};
