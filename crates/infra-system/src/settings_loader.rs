// Settings loader: TOML file plus SMSGW__SECTION__KEY environment overrides
// reason: config crate layering, shellexpand for `~` in paths
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use tracing::debug;

use smsgw_core::settings::{GatewaySettings, LoggingSettings, SmsSenderSettings};
use smsgw_core::ConfigError;

/// Environment prefix of every override (`SMSGW__MONITOR__FAILURE_THRESHOLD=6`)
pub const ENV_PREFIX: &str = "SMSGW";

/// Separator between prefix, section and key
pub const ENV_SEPARATOR: &str = "__";

/// Load and validate `gateway.toml`
///
/// Command executables are `~`-expanded and resolved against the file's
/// directory when relative.
pub fn load_gateway_settings(path: &Path) -> Result<GatewaySettings, ConfigError> {
    load_gateway_with_env(path, ambient_env())
}

/// Load and validate `sms.toml`
pub fn load_sms_settings(path: &Path) -> Result<SmsSenderSettings, ConfigError> {
    load_sms_with_env(path, ambient_env())
}

/// Process variables carrying the override prefix
///
/// Names or values that are not valid Unicode cannot be overrides and are skipped.
fn ambient_env() -> config::Map<String, String> {
    std::env::vars_os()
        .filter_map(|(key, value)| Some((key.into_string().ok()?, value.into_string().ok()?)))
        .filter(|(key, _)| key.to_ascii_uppercase().starts_with(ENV_PREFIX))
        .collect()
}

fn load_gateway_with_env(
    path: &Path,
    env: config::Map<String, String>,
) -> Result<GatewaySettings, ConfigError> {
    let path = expand_path(path);
    let mut settings: GatewaySettings = load(&path, env)?;

    let base = base_dir(&path);
    for command in &mut settings.commands {
        command.executable = resolve_against(&base, &command.executable)
            .to_string_lossy()
            .into_owned();
    }
    // Variable names are case-sensitive for the child
    settings.executor.env = std::mem::take(&mut settings.executor.env)
        .into_iter()
        .map(|(key, value)| (key.to_ascii_uppercase(), value))
        .collect();
    expand_log_file(&mut settings.logging);

    settings.validate()?;
    debug!(
        path = %path.display(),
        commands = settings.commands.len(),
        "Gateway settings loaded"
    );
    Ok(settings)
}

fn load_sms_with_env(
    path: &Path,
    env: config::Map<String, String>,
) -> Result<SmsSenderSettings, ConfigError> {
    let path = expand_path(path);
    let mut settings: SmsSenderSettings = load(&path, env)?;
    expand_log_file(&mut settings.logging);

    settings.validate()?;
    debug!(path = %path.display(), port = %settings.modem.port, "SMS settings loaded");
    Ok(settings)
}

/// Overrides stay strings; typed fields are converted during deserialization
fn load<T: DeserializeOwned>(path: &Path, env: config::Map<String, String>) -> Result<T, ConfigError> {
    if !path.is_file() {
        return Err(ConfigError::Load(format!(
            "configuration file not found: {}",
            path.display()
        )));
    }

    config::Config::builder()
        .add_source(config::File::from(path).format(config::FileFormat::Toml))
        .add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator(ENV_SEPARATOR)
                .separator(ENV_SEPARATOR)
                .source(Some(env)),
        )
        .build()
        .and_then(|c| c.try_deserialize())
        .map_err(|e| ConfigError::Load(format!("{}: {}", path.display(), e)))
}

fn expand_path(path: &Path) -> PathBuf {
    PathBuf::from(shellexpand::tilde(&path.to_string_lossy()).into_owned())
}

fn base_dir(path: &Path) -> PathBuf {
    path.parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."))
}

fn resolve_against(base: &Path, raw: &str) -> PathBuf {
    let expanded = PathBuf::from(shellexpand::tilde(raw).into_owned());
    if expanded.is_absolute() {
        expanded
    } else {
        base.join(expanded)
    }
}

fn expand_log_file(logging: &mut LoggingSettings) {
    if let Some(file) = logging.file.take() {
        logging.file = Some(expand_path(&file));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use smsgw_core::settings::{LogFormat, Recipients, RecoveryConfirmation};
    use std::io::Write;

    fn write_file(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
        path
    }

    fn overrides(pairs: &[(&str, &str)]) -> config::Map<String, String> {
        pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect()
    }

    const GATEWAY: &str = r#"
[monitor]
primary_target = "1.1.1.1"
failure_threshold = 3
recovery_confirmation = "secondary_too"

[executor]
max_concurrent = 2

[[commands]]
name = "send_clear"
executable = "bin/send_clear.sh"
description = "Power restored"
timeout_secs = 90

[commands.args_schema]
recipient = "string"

[logging]
format = "json"
"#;

    #[test]
    fn test_gateway_file_with_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(dir.path(), "gateway.toml", GATEWAY);

        let settings = load_gateway_with_env(&path, config::Map::new()).unwrap();

        assert_eq!(settings.monitor.primary_target, "1.1.1.1");
        assert_eq!(settings.monitor.failure_threshold, 3);
        assert_eq!(settings.monitor.check_interval_secs, 30);
        assert_eq!(
            settings.monitor.recovery_confirmation,
            RecoveryConfirmation::SecondaryToo
        );
        assert_eq!(settings.executor.max_concurrent, 2);
        assert_eq!(settings.executor.max_timeout_secs, 120);
        assert_eq!(settings.logging.format, LogFormat::Json);

        let command = &settings.commands[0];
        assert_eq!(command.timeout_secs, Some(90));
        assert_eq!(
            PathBuf::from(&command.executable),
            dir.path().join("bin/send_clear.sh")
        );
        assert!(command.args_schema.contains_key("recipient"));
    }

    #[test]
    fn test_environment_overrides_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(dir.path(), "gateway.toml", GATEWAY);

        let settings = load_gateway_with_env(
            &path,
            overrides(&[
                ("SMSGW__MONITOR__FAILURE_THRESHOLD", "7"),
                ("SMSGW__MONITOR__PRIMARY_TARGET", "9.9.9.9"),
            ]),
        )
        .unwrap();

        assert_eq!(settings.monitor.failure_threshold, 7);
        assert_eq!(settings.monitor.primary_target, "9.9.9.9");
    }

    const SMS: &str = r#"
[modem]
port = "/dev/ttyUSB2"

[sms]
phone_numbers = ["+15550100"]
"#;

    #[test]
    fn test_string_overrides_keep_exact_text() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(dir.path(), "sms.toml", SMS);

        let settings = load_sms_with_env(
            &path,
            overrides(&[
                ("SMSGW__MODEM__SIM_PIN", "0123"),
                ("SMSGW__SMS__PHONE_NUMBER", "+15550199"),
                ("SMSGW__MODEM__BAUD_RATE", "9600"),
            ]),
        )
        .unwrap();

        assert_eq!(settings.modem.sim_pin.as_deref(), Some("0123"));
        assert_eq!(settings.modem.pin(), Some("0123"));
        assert_eq!(settings.sms.phone_number.as_deref(), Some("+15550199"));
        assert_eq!(settings.modem.baud_rate, 9600);
    }

    #[test]
    fn test_recipient_list_override_from_single_number() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(dir.path(), "sms.toml", SMS);

        let settings = load_sms_with_env(
            &path,
            overrides(&[("SMSGW__SMS__PHONE_NUMBERS", "+15550100")]),
        )
        .unwrap();
        assert_eq!(settings.sms.recipients(), vec!["+15550100"]);

        let settings = load_sms_with_env(
            &path,
            overrides(&[("SMSGW__SMS__PHONE_NUMBERS", "+15550100,+15550101")]),
        )
        .unwrap();
        assert_eq!(settings.sms.recipients(), vec!["+15550100", "+15550101"]);
    }

    #[test]
    fn test_unprefixed_variables_are_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(dir.path(), "sms.toml", SMS);

        let settings =
            load_sms_with_env(&path, overrides(&[("MODEM__SIM_PIN", "9999")])).unwrap();
        assert_eq!(settings.modem.sim_pin, None);
    }

    #[test]
    fn test_missing_file_is_load_error() {
        let err = load_gateway_settings(Path::new("/nonexistent/gateway.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Load(_)));
    }

    #[test]
    fn test_invalid_value_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(
            dir.path(),
            "gateway.toml",
            "[monitor]\nfailure_threshold = 0\n\n[[commands]]\nname = \"x\"\nexecutable = \"/bin/true\"\n",
        );

        let err = load_gateway_with_env(&path, config::Map::new()).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn test_sms_file_with_recipient_string() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(
            dir.path(),
            "sms.toml",
            r#"
[modem]
port = "/dev/ttyUSB3"
sim_pin = "1234"

[modem.timings]
ack_timeout_ms = 30000

[sms]
phone_numbers = "+15550100, +15550101"
delay_between_sends_ms = 500

[sms.messages]
alert_power = "Power outage detected"
"#,
        );

        let settings = load_sms_with_env(&path, config::Map::new()).unwrap();

        assert_eq!(settings.modem.port, "/dev/ttyUSB3");
        assert_eq!(settings.modem.baud_rate, 115_200);
        assert_eq!(settings.modem.pin(), Some("1234"));
        assert_eq!(settings.modem.timings.ack_timeout_ms, 30_000);
        assert_eq!(settings.modem.timings.prompt_timeout_ms, 5_000);
        assert!(matches!(settings.sms.phone_numbers, Recipients::Text(_)));
        assert_eq!(settings.sms.recipients(), vec!["+15550100", "+15550101"]);
        assert_eq!(settings.sms.message("alert_power"), Some("Power outage detected"));
    }
}
