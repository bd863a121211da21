// Outage Tracker - pure connectivity state machine (no I/O)

use std::time::{Duration, Instant};

use crate::domain::{NotificationAction, OutageKind, OutageState, Reachability};
use crate::settings::RecoveryConfirmation;

/// What the monitor must do after feeding a primary probe result
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Nothing to emit
    Quiet,
    Emit(NotificationAction),
    /// Threshold tripped: probe the secondary once, then call `classify`
    Classify,
    /// Primary back during an outage: probe the secondary, then call `confirm_recovery`
    ConfirmRecovery,
}

/// Tracks the failure streak and outage state across ticks
///
/// Invariants:
/// - `ActiveOutage` is entered only from `classify`, which the monitor calls
///   only after `Step::Classify`, i.e. once the streak reached the threshold
/// - `ActiveOutage` is left only on a reachable primary
pub struct OutageTracker {
    threshold: u32,
    reminder_interval: Duration,
    recovery: RecoveryConfirmation,
    state: OutageState,
}

impl OutageTracker {
    pub fn new(threshold: u32, reminder_interval: Duration, recovery: RecoveryConfirmation) -> Self {
        Self {
            threshold: threshold.max(1),
            reminder_interval,
            recovery,
            state: OutageState::Stable,
        }
    }

    pub fn state(&self) -> &OutageState {
        &self.state
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    /// Feed the result of the primary probe
    pub fn on_primary(&mut self, primary: Reachability, now: Instant) -> Step {
        if self.state.is_active_outage() {
            return match (primary, self.recovery) {
                (Reachability::Reachable, RecoveryConfirmation::PrimaryOnly) => self.clear(),
                (Reachability::Reachable, RecoveryConfirmation::SecondaryToo) => {
                    Step::ConfirmRecovery
                }
                (Reachability::Unreachable, _) => self.remind_if_due(now),
            };
        }

        match primary {
            Reachability::Reachable => {
                self.state = OutageState::Stable;
                Step::Quiet
            }
            Reachability::Unreachable => {
                let streak = self.state.streak() + 1;
                self.state = OutageState::Degraded(streak);
                if streak >= self.threshold {
                    Step::Classify
                } else {
                    Step::Quiet
                }
            }
        }
    }

    fn remind_if_due(&mut self, now: Instant) -> Step {
        if let OutageState::ActiveOutage { last_reminder_at, .. } = &mut self.state {
            if now.saturating_duration_since(*last_reminder_at) >= self.reminder_interval {
                *last_reminder_at = now;
                return Step::Emit(NotificationAction::Reminder);
            }
        }
        Step::Quiet
    }

    /// Enter the outage using the single-shot secondary probe result
    pub fn classify(&mut self, secondary: Reachability, now: Instant) -> NotificationAction {
        let (kind, action) = match secondary {
            Reachability::Reachable => (OutageKind::Network, NotificationAction::AlertNetwork),
            Reachability::Unreachable => (OutageKind::Power, NotificationAction::AlertPower),
        };
        self.state = OutageState::ActiveOutage {
            kind,
            since: now,
            last_reminder_at: now,
        };
        action
    }

    /// Clear the outage only if the secondary answered as well
    pub fn confirm_recovery(&mut self, secondary: Reachability) -> Step {
        if secondary.is_reachable() {
            self.clear()
        } else {
            Step::Quiet
        }
    }

    fn clear(&mut self) -> Step {
        self.state = OutageState::Stable;
        Step::Emit(NotificationAction::Clear)
    }
}
