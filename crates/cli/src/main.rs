//! SMS Gateway CLI - send SMS through the modem and exercise the command whitelist
//! `smsgw send` exits with the documented delivery codes so it can itself be a whitelisted action

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tabled::{Table, Tabled};
use tracing::{error, info, warn};

use smsgw_core::application::{shutdown_channel, CommandRegistry, ModemSession, ShutdownSender};
use smsgw_core::domain::{exit_code, BatchClassification, BatchReport, CommandArgs, CommandDefinition};
use smsgw_core::port::id_provider::UuidProvider;
use smsgw_core::port::time_provider::SystemTimeProvider;
use smsgw_core::port::{CommandExecutor, ExecutionRequest};
use smsgw_core::settings::SmsSenderSettings;
use smsgw_infra_system::{
    init_logging, load_gateway_settings, load_sms_settings, SandboxedExecutor, SerialTransport,
};

const DEFAULT_SMS_CONFIG: &str = "sms.toml";
const DEFAULT_GATEWAY_CONFIG: &str = "gateway.toml";

#[derive(Parser)]
#[command(name = "smsgw")]
#[command(about = "SMS outage gateway CLI", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Send an SMS to every configured recipient through the modem
    Send {
        /// SMS sender configuration
        #[arg(short, long, env = "SMSGW_SMS_CONFIG", default_value = DEFAULT_SMS_CONFIG)]
        config: PathBuf,

        /// Key of a message in [sms.messages] (e.g. alert_power, reminder)
        #[arg(short, long, conflicts_with = "text")]
        message: Option<String>,

        /// Literal message text
        #[arg(short, long)]
        text: Option<String>,

        /// Recipients overriding the configured list
        #[arg(long = "to")]
        to: Vec<String>,
    },

    /// Inspect or run whitelisted commands
    Commands {
        #[command(subcommand)]
        action: CommandAction,
    },
}

#[derive(Subcommand)]
enum CommandAction {
    /// List whitelisted commands
    List {
        /// Gateway configuration
        #[arg(short, long, env = "SMSGW_CONFIG", default_value = DEFAULT_GATEWAY_CONFIG)]
        config: PathBuf,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Execute a whitelisted command and print its result as JSON
    Exec {
        /// Command name
        name: String,

        /// Gateway configuration
        #[arg(short, long, env = "SMSGW_CONFIG", default_value = DEFAULT_GATEWAY_CONFIG)]
        config: PathBuf,

        /// Argument as key=value (value parsed as JSON when possible)
        #[arg(short, long = "arg", value_parser = parse_arg)]
        args: Vec<(String, Value)>,

        /// Timeout override in seconds
        #[arg(long)]
        timeout: Option<u64>,

        /// Correlation id used as execution id
        #[arg(long)]
        request_id: Option<String>,
    },
}

#[derive(Tabled)]
struct CommandRow {
    name: String,
    description: String,
    #[tabled(rename = "timeout (s)")]
    timeout_secs: u64,
    arguments: String,
}

impl From<&CommandDefinition> for CommandRow {
    fn from(def: &CommandDefinition) -> Self {
        let arguments = if def.args_schema.is_empty() {
            "-".to_string()
        } else {
            def.args_schema
                .iter()
                .map(|(key, kind)| format!("{}: {}", key, kind))
                .collect::<Vec<_>>()
                .join(", ")
        };
        Self {
            name: def.name.clone(),
            description: def.description.clone(),
            timeout_secs: def.default_timeout_secs,
            arguments,
        }
    }
}

/// `key=value`; the value is JSON when it parses as such, a string otherwise
fn parse_arg(raw: &str) -> Result<(String, Value), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{}'", raw))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("empty argument name in '{}'", raw));
    }
    let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
    Ok((key.to_string(), value))
}

/// Literal text wins; otherwise the named message from settings
fn resolve_message(
    settings: &SmsSenderSettings,
    text: Option<String>,
    key: Option<String>,
) -> Result<String, String> {
    if let Some(text) = text.filter(|t| !t.trim().is_empty()) {
        return Ok(text);
    }
    let key = key.ok_or_else(|| "pass --message <key> or --text <text>".to_string())?;
    settings
        .sms
        .message(&key)
        .map(str::to_string)
        .ok_or_else(|| format!("no text configured for [sms.messages].{}", key))
}

fn main() {
    let cli = Cli::parse();
    let code = run(cli);
    std::process::exit(code);
}

#[tokio::main]
async fn run(cli: Cli) -> i32 {
    let outcome = match cli.command {
        Commands::Send {
            config,
            message,
            text,
            to,
        } => return send(&config, message, text, to).await,
        Commands::Commands { action } => match action {
            CommandAction::List { config, json } => list_commands(&config, json),
            CommandAction::Exec {
                name,
                config,
                args,
                timeout,
                request_id,
            } => exec_command(&config, name, args, timeout, request_id).await,
        },
    };

    match outcome {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{} {:#}", "✗".red().bold(), e);
            exit_code::CONFIG
        }
    }
}

async fn send(config: &Path, message: Option<String>, text: Option<String>, to: Vec<String>) -> i32 {
    let settings = match load_sms_settings(config) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("{} {}", "✗ Config error:".red().bold(), e);
            return exit_code::CONFIG;
        }
    };
    let _log_guard = match init_logging(&settings.logging) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("{} {}", "✗ Config error:".red().bold(), e);
            return exit_code::CONFIG;
        }
    };

    let body = match resolve_message(&settings, text, message) {
        Ok(body) => body,
        Err(e) => {
            error!(error = %e, "Config error");
            return exit_code::CONFIG;
        }
    };
    let recipients = if to.is_empty() {
        settings.sms.recipients()
    } else {
        to
    };

    let transport = match SerialTransport::open(&settings.modem.port, settings.modem.baud_rate) {
        Ok(transport) => transport,
        Err(e) => {
            error!(error = %e, "Modem unavailable");
            return exit_code::CONFIG;
        }
    };

    let (shutdown_tx, shutdown_rx) = shutdown_channel();
    tokio::spawn(forward_signals(shutdown_tx));

    let mut session = ModemSession::new(transport, settings.modem.timings.clone(), shutdown_rx);
    if let Err(fault) = session.prepare(settings.modem.pin()).await {
        eprintln!("{} {}", "✗".red().bold(), fault);
        return fault.stage.exit_code();
    }

    info!(recipients = recipients.len(), "Sending batch");
    let report = session
        .send_batch(&recipients, &body, settings.sms.delay_between_sends())
        .await;
    print_summary(&report);
    report.exit_code()
}

fn print_summary(report: &BatchReport) {
    if report.interrupted && report.attempted == 0 {
        println!("{}", "✗ Interrupted before any message was sent".red().bold());
        return;
    }
    let line = format!("{}/{} messages sent", report.delivered(), report.total());
    match report.classification() {
        BatchClassification::FullSuccess => println!("{} {}", "✓".green().bold(), line),
        BatchClassification::PartialSuccess => {
            println!("{} {}", "⚠ Partial success:".yellow().bold(), line)
        }
        BatchClassification::TotalFailure => println!("{} {}", "✗".red().bold(), line),
    }
}

/// Turn SIGINT/SIGTERM into a shutdown request for the modem session
async fn forward_signals(shutdown_tx: ShutdownSender) {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut terminate) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = terminate.recv() => {}
                }
            }
            Err(e) => {
                warn!(error = %e, "SIGTERM handler unavailable; listening for Ctrl+C only");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
    warn!("Shutdown requested; stopping after the current step");
    shutdown_tx.shutdown();
}

fn load_registry(config: &Path) -> Result<(CommandRegistry, smsgw_core::settings::GatewaySettings)> {
    let settings = load_gateway_settings(config)
        .with_context(|| format!("Failed to load {}", config.display()))?;
    let registry = CommandRegistry::from_specs(&settings.commands, settings.executor.default_timeout_secs)
        .context("Invalid command whitelist")?;
    Ok((registry, settings))
}

fn list_commands(config: &Path, json: bool) -> Result<i32> {
    let (registry, _) = load_registry(config)?;

    if json {
        println!("{}", serde_json::to_string_pretty(registry.list())?);
        return Ok(exit_code::SUCCESS);
    }

    println!("{}", "Whitelisted commands".cyan().bold());
    println!();
    let rows: Vec<CommandRow> = registry.list().iter().map(CommandRow::from).collect();
    println!("{}", Table::new(rows));
    Ok(exit_code::SUCCESS)
}

async fn exec_command(
    config: &Path,
    name: String,
    args: Vec<(String, Value)>,
    timeout: Option<u64>,
    request_id: Option<String>,
) -> Result<i32> {
    let (registry, settings) = load_registry(config)?;
    let _log_guard = init_logging(&settings.logging).context("Failed to initialize logging")?;

    let executor = SandboxedExecutor::new(
        Arc::new(registry),
        settings.executor.clone(),
        Arc::new(SystemTimeProvider),
        Arc::new(UuidProvider),
    );

    let mut request = ExecutionRequest::new(name).with_args(args.into_iter().collect::<CommandArgs>());
    request.timeout_secs = timeout;
    request.request_id = request_id;

    let result = executor.execute(request).await;
    println!("{}", serde_json::to_string_pretty(&result)?);

    if result.success {
        eprintln!("{} {} ({} ms)", "✓".green().bold(), result.command, result.duration_ms);
        Ok(exit_code::SUCCESS)
    } else {
        eprintln!(
            "{} {}: {}",
            "✗".red().bold(),
            result.command,
            result.error_message.as_deref().unwrap_or("failed")
        );
        Ok(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_arg_values() {
        assert_eq!(parse_arg("count=3").unwrap(), ("count".to_string(), json!(3)));
        assert_eq!(parse_arg("urgent=true").unwrap(), ("urgent".to_string(), json!(true)));
        assert_eq!(
            parse_arg("to=+15550100").unwrap(),
            ("to".to_string(), json!("+15550100"))
        );
        assert_eq!(
            parse_arg("note=a=b").unwrap(),
            ("note".to_string(), json!("a=b"))
        );
        assert!(parse_arg("novalue").is_err());
        assert!(parse_arg("=x").is_err());
    }

    #[test]
    fn test_resolve_message() {
        let mut settings = SmsSenderSettings::default();
        settings
            .sms
            .messages
            .insert("reminder".to_string(), "Power still out".to_string());

        assert_eq!(
            resolve_message(&settings, Some("literal".to_string()), Some("reminder".to_string())),
            Ok("literal".to_string())
        );
        assert_eq!(
            resolve_message(&settings, None, Some("reminder".to_string())),
            Ok("Power still out".to_string())
        );
        assert!(resolve_message(&settings, None, Some("clear".to_string())).is_err());
        assert!(resolve_message(&settings, None, None).is_err());
    }

    #[test]
    fn test_cli_parses_exec() {
        let cli = Cli::try_parse_from([
            "smsgw", "commands", "exec", "send_reminder", "--arg", "to=+1", "--timeout", "10",
        ])
        .unwrap();
        match cli.command {
            Commands::Commands {
                action: CommandAction::Exec { name, args, timeout, .. },
            } => {
                assert_eq!(name, "send_reminder");
                assert_eq!(args.len(), 1);
                assert_eq!(timeout, Some(10));
            }
            _ => panic!("expected commands exec"),
        }
    }
}
