// Connectivity Domain Model

use serde::{Deserialize, Serialize};
use std::time::Instant;

/// Outcome of one echo batch against a target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Reachability {
    Reachable,
    Unreachable,
}

impl Reachability {
    pub fn is_reachable(self) -> bool {
        matches!(self, Reachability::Reachable)
    }
}

impl From<bool> for Reachability {
    fn from(ok: bool) -> Self {
        if ok {
            Reachability::Reachable
        } else {
            Reachability::Unreachable
        }
    }
}

/// Root cause classification of an outage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OutageKind {
    /// Router unreachable too: local power or equipment failure
    Power,
    /// Router answers, upstream does not
    Network,
}

impl std::fmt::Display for OutageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutageKind::Power => write!(f, "POWER"),
            OutageKind::Network => write!(f, "NETWORK"),
        }
    }
}

/// Connectivity state owned by the monitor loop
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutageState {
    Stable,
    /// Consecutive primary failures below threshold
    Degraded(u32),
    ActiveOutage {
        kind: OutageKind,
        since: Instant,
        last_reminder_at: Instant,
    },
}

impl OutageState {
    pub fn streak(&self) -> u32 {
        match self {
            OutageState::Stable | OutageState::ActiveOutage { .. } => 0,
            OutageState::Degraded(streak) => *streak,
        }
    }

    pub fn is_active_outage(&self) -> bool {
        matches!(self, OutageState::ActiveOutage { .. })
    }
}

impl std::fmt::Display for OutageState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutageState::Stable => write!(f, "STABLE"),
            OutageState::Degraded(streak) => write!(f, "DEGRADED({})", streak),
            OutageState::ActiveOutage { kind, .. } => write!(f, "ACTIVE_OUTAGE({})", kind),
        }
    }
}

/// Notification emitted on a state transition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationAction {
    AlertPower,
    AlertNetwork,
    Reminder,
    Clear,
}

impl NotificationAction {
    pub const ALL: [NotificationAction; 4] = [
        NotificationAction::AlertPower,
        NotificationAction::AlertNetwork,
        NotificationAction::Reminder,
        NotificationAction::Clear,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationAction::AlertPower => "alert_power",
            NotificationAction::AlertNetwork => "alert_network",
            NotificationAction::Reminder => "reminder",
            NotificationAction::Clear => "clear",
        }
    }
}

impl std::fmt::Display for NotificationAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
