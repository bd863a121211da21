// Connectivity Monitor - single cooperative poll loop

mod tracker;

pub use tracker::{OutageTracker, Step};

use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

use crate::application::constants::SECONDARY_PROBE_ATTEMPTS;
use crate::application::shutdown::ShutdownToken;
use crate::domain::{NotificationAction, OutageState, Reachability};
use crate::port::{CommandExecutor, ExecutionRequest, ExecutionResult, ReachabilityProber};
use crate::settings::MonitorSettings;

/// Monitor polls the primary target and dispatches notification actions
///
/// One probe, one decision, one sleep per tick. The outage state is owned
/// exclusively by this loop.
pub struct ConnectivityMonitor {
    settings: Arc<MonitorSettings>,
    prober: Arc<dyn ReachabilityProber>,
    executor: Arc<dyn CommandExecutor>,
    tracker: OutageTracker,
}

impl ConnectivityMonitor {
    pub fn new(
        settings: Arc<MonitorSettings>,
        prober: Arc<dyn ReachabilityProber>,
        executor: Arc<dyn CommandExecutor>,
    ) -> Self {
        let tracker = OutageTracker::new(
            settings.failure_threshold,
            settings.reminder_interval(),
            settings.recovery_confirmation,
        );
        Self {
            settings,
            prober,
            executor,
            tracker,
        }
    }

    pub fn state(&self) -> &OutageState {
        self.tracker.state()
    }

    /// Run monitor loop with graceful shutdown support
    ///
    /// An in-flight probe or dispatched action always finishes; only the
    /// inter-tick sleep is interrupted.
    pub async fn run(&mut self, mut shutdown: ShutdownToken) {
        info!(
            primary = %self.settings.primary_target,
            secondary = %self.settings.secondary_target,
            interval_secs = self.settings.check_interval_secs,
            threshold = self.settings.failure_threshold,
            "Connectivity monitor started"
        );
        loop {
            if shutdown.is_shutdown() {
                info!("Connectivity monitor shutting down");
                break;
            }
            self.tick().await;
            if !shutdown.sleep(self.settings.check_interval()).await {
                info!("Connectivity monitor interrupted during sleep");
                break;
            }
        }
        info!(state = %self.state(), "Connectivity monitor stopped");
    }

    pub async fn tick(&mut self) -> Option<NotificationAction> {
        self.tick_at(Instant::now()).await
    }

    /// One iteration at an explicit instant; returns the action dispatched, if any
    pub async fn tick_at(&mut self, now: Instant) -> Option<NotificationAction> {
        let primary = self
            .prober
            .probe(
                &self.settings.primary_target,
                self.settings.probe_attempts,
                self.settings.probe_timeout(),
            )
            .await;

        let step = self.tracker.on_primary(primary, now);
        if !primary.is_reachable() {
            warn!(
                target = %self.settings.primary_target,
                state = %self.tracker.state(),
                threshold = self.tracker.threshold(),
                "Primary probe failed"
            );
        }

        let action = match step {
            Step::Quiet => None,
            Step::Emit(action) => Some(action),
            Step::Classify => {
                let secondary = self.probe_secondary().await;
                let action = self.tracker.classify(secondary, now);
                error!(
                    secondary = %self.settings.secondary_target,
                    secondary_reachable = secondary.is_reachable(),
                    state = %self.tracker.state(),
                    "Outage detected"
                );
                Some(action)
            }
            Step::ConfirmRecovery => {
                let secondary = self.probe_secondary().await;
                match self.tracker.confirm_recovery(secondary) {
                    Step::Emit(action) => Some(action),
                    _ => {
                        warn!(
                            secondary = %self.settings.secondary_target,
                            "Primary reachable but secondary is not; holding outage"
                        );
                        None
                    }
                }
            }
        };

        if let Some(action) = action {
            match action {
                NotificationAction::Clear => info!("Connectivity restored; outage cleared"),
                NotificationAction::Reminder => warn!("Outage ongoing; sending reminder"),
                _ => {}
            }
            self.dispatch(action).await;
        }
        action
    }

    async fn probe_secondary(&self) -> Reachability {
        self.prober
            .probe(
                &self.settings.secondary_target,
                SECONDARY_PROBE_ATTEMPTS,
                self.settings.probe_timeout(),
            )
            .await
    }

    async fn dispatch(&self, action: NotificationAction) -> ExecutionResult {
        let command = self.settings.actions.command_for(action);
        let result = self.executor.execute(ExecutionRequest::new(command)).await;

        if result.success {
            info!(
                action = %action,
                command = %command,
                duration_ms = result.duration_ms,
                "Notification action executed"
            );
        } else {
            error!(
                action = %action,
                command = %command,
                exit_code = result.exit_code,
                error = ?result.error,
                stdout = %result.stdout,
                stderr = %result.stderr,
                "Notification action failed"
            );
        }
        result
    }
}
