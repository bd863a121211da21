//! SMS Outage Gateway - Connectivity Monitor Daemon
//! Probes connectivity, classifies outages and dispatches whitelisted notification actions

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

use smsgw_core::application::{shutdown_channel, CommandRegistry, ConnectivityMonitor};
use smsgw_core::port::id_provider::UuidProvider;
use smsgw_core::port::time_provider::SystemTimeProvider;
use smsgw_infra_system::{init_logging, load_gateway_settings, PingProber, SandboxedExecutor};

const VERSION: &str = env!("CARGO_PKG_VERSION");
const CONFIG_ENV: &str = "SMSGW_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "gateway.toml";

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Load configuration (fatal on any error)
    let config_path = PathBuf::from(
        std::env::var(CONFIG_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string()),
    );
    let settings = load_gateway_settings(&config_path)
        .with_context(|| format!("Failed to load {}", config_path.display()))?;

    // 2. Initialize logging (guard flushes the optional log file on exit)
    let _log_guard = init_logging(&settings.logging).context("Failed to initialize logging")?;
    info!(config = %config_path.display(), "SMS outage gateway v{} starting...", VERSION);

    // 3. Command whitelist: every executable must exist, every action must resolve
    let registry = CommandRegistry::from_specs(&settings.commands, settings.executor.default_timeout_secs)
        .context("Invalid command whitelist")?;
    registry
        .check_actions(&settings.monitor.actions)
        .context("Invalid monitor action mapping")?;
    info!(commands = registry.list().len(), "Command whitelist loaded");

    // 4. Setup dependencies (DI wiring)
    let executor = Arc::new(SandboxedExecutor::new(
        Arc::new(registry),
        settings.executor.clone(),
        Arc::new(SystemTimeProvider),
        Arc::new(UuidProvider),
    ));
    let prober = Arc::new(PingProber::new());
    let mut monitor = ConnectivityMonitor::new(Arc::new(settings.monitor.clone()), prober, executor);

    // 5. Start monitor loop
    let (shutdown_tx, shutdown_rx) = shutdown_channel();
    let monitor_handle = tokio::spawn(async move {
        monitor.run(shutdown_rx).await;
    });

    info!("Press Ctrl+C to shutdown");

    // 6. Wait for shutdown signal
    wait_for_signal().await?;
    info!("Shutdown signal received. Exiting gracefully...");

    // 7. Graceful shutdown: an in-flight probe or action is allowed to finish
    shutdown_tx.shutdown();
    if let Err(e) = monitor_handle.await {
        error!(error = ?e, "Monitor task failed");
    }

    info!("Shutdown complete.");
    Ok(())
}

#[cfg(unix)]
async fn wait_for_signal() -> Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate = signal(SignalKind::terminate()).context("Failed to install SIGTERM handler")?;
    tokio::select! {
        result = tokio::signal::ctrl_c() => result.context("Failed to listen for Ctrl+C")?,
        _ = terminate.recv() => {}
    }
    Ok(())
}

#[cfg(not(unix))]
async fn wait_for_signal() -> Result<()> {
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl+C")
}
