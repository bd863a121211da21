//! Connectivity monitor dispatching through the real sandboxed executor
//!
//! Probes are scripted; notification actions run as whitelisted shell commands
//! that append their action name to a log file.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use smsgw_core::application::{shutdown_channel, CommandRegistry, ConnectivityMonitor};
use smsgw_core::domain::{CommandDefinition, NotificationAction, OutageKind, OutageState, Reachability};
use smsgw_core::port::id_provider::UuidProvider;
use smsgw_core::port::reachability::mocks::ScriptedProber;
use smsgw_core::port::time_provider::SystemTimeProvider;
use smsgw_core::settings::{ExecutorSettings, MonitorSettings, RecoveryConfirmation};
use smsgw_infra_system::SandboxedExecutor;
use Reachability::{Reachable, Unreachable};

const PRIMARY: &str = "203.0.113.10";
const ROUTER: &str = "192.168.1.1";

fn appending(name: &str, log: &Path) -> CommandDefinition {
    CommandDefinition {
        name: name.to_string(),
        executable: PathBuf::from("/bin/sh"),
        args: vec![
            "-c".to_string(),
            format!("echo {} >> {}", name, log.display()),
        ],
        description: String::new(),
        default_timeout_secs: 10,
        args_schema: Default::default(),
    }
}

struct Harness {
    monitor: ConnectivityMonitor,
    prober: ScriptedProber,
    log: PathBuf,
    _dir: tempfile::TempDir,
}

impl Harness {
    fn new(recovery: RecoveryConfirmation) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("actions.log");

        let registry = CommandRegistry::new(vec![
            appending("send_alert_power", &log),
            appending("send_alert_network", &log),
            appending("send_reminder", &log),
            appending("send_clear", &log),
        ])
        .unwrap();

        let settings = MonitorSettings {
            primary_target: PRIMARY.to_string(),
            secondary_target: ROUTER.to_string(),
            check_interval_secs: 1,
            failure_threshold: 2,
            reminder_interval_secs: 60,
            recovery_confirmation: recovery,
            ..Default::default()
        };
        registry.check_actions(&settings.actions).unwrap();

        let executor = SandboxedExecutor::new(
            Arc::new(registry),
            ExecutorSettings::default(),
            Arc::new(SystemTimeProvider),
            Arc::new(UuidProvider),
        );
        let prober = ScriptedProber::new(Reachable);
        let monitor = ConnectivityMonitor::new(
            Arc::new(settings),
            Arc::new(prober.clone()),
            Arc::new(executor),
        );

        Self {
            monitor,
            prober,
            log,
            _dir: dir,
        }
    }

    fn dispatched(&self) -> Vec<String> {
        std::fs::read_to_string(&self.log)
            .unwrap_or_default()
            .lines()
            .map(str::to_string)
            .collect()
    }
}

/// Property: a full power outage lifecycle runs alert, reminder, clear exactly once each
#[tokio::test]
async fn test_power_outage_lifecycle() {
    let mut h = Harness::new(RecoveryConfirmation::PrimaryOnly);
    h.prober.push(PRIMARY, &[Unreachable; 4]);
    h.prober.push(ROUTER, &[Unreachable]);
    let t0 = Instant::now();

    assert_eq!(h.monitor.tick_at(t0).await, None);
    assert_eq!(
        h.monitor.tick_at(t0).await,
        Some(NotificationAction::AlertPower)
    );
    assert!(matches!(
        h.monitor.state(),
        OutageState::ActiveOutage {
            kind: OutageKind::Power,
            ..
        }
    ));

    // Still down, reminder not yet due
    assert_eq!(h.monitor.tick_at(t0 + Duration::from_secs(30)).await, None);
    assert_eq!(
        h.monitor.tick_at(t0 + Duration::from_secs(61)).await,
        Some(NotificationAction::Reminder)
    );

    // Primary answers again
    assert_eq!(
        h.monitor.tick_at(t0 + Duration::from_secs(62)).await,
        Some(NotificationAction::Clear)
    );
    assert_eq!(h.monitor.state(), &OutageState::Stable);

    assert_eq!(
        h.dispatched(),
        vec!["send_alert_power", "send_reminder", "send_clear"]
    );
    println!("✅ Power outage lifecycle dispatched {:?}", h.dispatched());
}

/// Property: a reachable router classifies the outage as a network outage
#[tokio::test]
async fn test_router_up_is_network_outage() {
    let mut h = Harness::new(RecoveryConfirmation::PrimaryOnly);
    h.prober.push(PRIMARY, &[Unreachable; 2]);
    h.prober.push(ROUTER, &[Reachable]);
    let t0 = Instant::now();

    h.monitor.tick_at(t0).await;
    assert_eq!(
        h.monitor.tick_at(t0).await,
        Some(NotificationAction::AlertNetwork)
    );
    assert_eq!(h.dispatched(), vec!["send_alert_network"]);
    assert_eq!(h.prober.calls_for(ROUTER), 1);
}

/// Property: a single failure below the threshold never dispatches anything
#[tokio::test]
async fn test_recovery_below_threshold_is_silent() {
    let mut h = Harness::new(RecoveryConfirmation::PrimaryOnly);
    h.prober.push(PRIMARY, &[Unreachable, Reachable, Unreachable, Reachable]);
    let t0 = Instant::now();

    for _ in 0..4 {
        assert_eq!(h.monitor.tick_at(t0).await, None);
    }
    assert_eq!(h.monitor.state(), &OutageState::Stable);
    assert!(h.dispatched().is_empty());
    assert_eq!(h.prober.calls_for(ROUTER), 0);
}

/// Property: with secondary confirmation, clear waits until the router answers
#[tokio::test]
async fn test_secondary_confirmation_holds_clear() {
    let mut h = Harness::new(RecoveryConfirmation::SecondaryToo);
    h.prober.push(PRIMARY, &[Unreachable, Unreachable, Reachable, Reachable]);
    h.prober.push(ROUTER, &[Unreachable, Unreachable, Reachable]);
    let t0 = Instant::now();

    h.monitor.tick_at(t0).await;
    assert_eq!(
        h.monitor.tick_at(t0).await,
        Some(NotificationAction::AlertPower)
    );
    // Primary back, router still down
    assert_eq!(h.monitor.tick_at(t0).await, None);
    assert!(h.monitor.state().is_active_outage());
    // Both answer
    assert_eq!(
        h.monitor.tick_at(t0).await,
        Some(NotificationAction::Clear)
    );
    assert_eq!(h.dispatched(), vec!["send_alert_power", "send_clear"]);
}

/// Property: a failing action is logged and the loop keeps its state
#[tokio::test]
async fn test_failing_action_does_not_stop_monitor() {
    let registry = CommandRegistry::new(
        ["send_alert_power", "send_alert_network", "send_reminder", "send_clear"]
            .iter()
            .map(|name| CommandDefinition {
                name: name.to_string(),
                executable: PathBuf::from("/bin/false"),
                args: vec![],
                description: String::new(),
                default_timeout_secs: 5,
                args_schema: Default::default(),
            })
            .collect(),
    )
    .unwrap();
    let executor = SandboxedExecutor::new(
        Arc::new(registry),
        ExecutorSettings::default(),
        Arc::new(SystemTimeProvider),
        Arc::new(UuidProvider),
    );
    let prober = ScriptedProber::new(Reachable);
    prober.push(PRIMARY, &[Unreachable; 2]);
    prober.push(ROUTER, &[Unreachable]);
    let mut monitor = ConnectivityMonitor::new(
        Arc::new(MonitorSettings {
            primary_target: PRIMARY.to_string(),
            secondary_target: ROUTER.to_string(),
            failure_threshold: 2,
            ..Default::default()
        }),
        Arc::new(prober),
        Arc::new(executor),
    );

    let t0 = Instant::now();
    monitor.tick_at(t0).await;
    assert_eq!(monitor.tick_at(t0).await, Some(NotificationAction::AlertPower));
    assert!(monitor.state().is_active_outage());
    assert_eq!(monitor.tick_at(t0).await, Some(NotificationAction::Clear));
}

/// Property: shutdown stops the loop during its sleep
#[tokio::test]
async fn test_run_stops_on_shutdown() {
    let Harness {
        mut monitor,
        prober,
        _dir,
        ..
    } = Harness::new(RecoveryConfirmation::PrimaryOnly);
    let (shutdown_tx, shutdown_rx) = shutdown_channel();

    let handle = tokio::spawn(async move {
        monitor.run(shutdown_rx).await;
    });
    tokio::time::sleep(Duration::from_millis(200)).await;
    shutdown_tx.shutdown();

    tokio::time::timeout(Duration::from_secs(3), handle)
        .await
        .expect("monitor did not stop")
        .unwrap();
    assert!(prober.calls_for(PRIMARY) >= 1);
}
