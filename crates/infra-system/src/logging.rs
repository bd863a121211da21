// Logging setup shared by every binary
// reason: tracing-subscriber (EnvFilter, pretty/json), tracing-appender for the optional file
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer, Registry};

use smsgw_core::settings::{LogFormat, LoggingSettings};
use smsgw_core::ConfigError;

/// Overrides `[logging].format` (`json` or `pretty`)
pub const LOG_FORMAT_ENV: &str = "SMSGW_LOG_FORMAT";

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Effective format: environment first, then settings
pub fn resolve_format(settings: &LoggingSettings, env_value: Option<&str>) -> LogFormat {
    match env_value.map(|v| v.trim().to_ascii_lowercase()) {
        Some(v) if v == "json" => LogFormat::Json,
        Some(v) if v == "pretty" => LogFormat::Pretty,
        _ => settings.format,
    }
}

/// Install the global subscriber
///
/// Console output goes to stderr so stdout stays free for command results.
/// The returned guard must live as long as the process when a log file is
/// configured.
pub fn init_logging(settings: &LoggingSettings) -> Result<Option<WorkerGuard>, ConfigError> {
    let format = resolve_format(settings, std::env::var(LOG_FORMAT_ENV).ok().as_deref());

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&settings.level))
        .map_err(|e| ConfigError::invalid("logging.level", e.to_string()))?;

    let mut layers: Vec<BoxedLayer> = Vec::new();
    layers.push(match format {
        // Production: JSON structured logging
        LogFormat::Json => fmt::layer().json().with_writer(std::io::stderr).boxed(),
        // Development: Pretty formatting with colors
        LogFormat::Pretty => fmt::layer().pretty().with_writer(std::io::stderr).boxed(),
    });

    let guard = match &settings.file {
        Some(path) => {
            let (layer, guard) = file_layer(path, format)?;
            layers.push(layer);
            Some(guard)
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(layers)
        .with(env_filter)
        .try_init()
        .map_err(|e| ConfigError::invalid("logging", e.to_string()))?;

    Ok(guard)
}

/// Daily-rolling file writer behind a non-blocking worker
fn file_layer(path: &Path, format: LogFormat) -> Result<(BoxedLayer, WorkerGuard), ConfigError> {
    let directory = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let file_name = path
        .file_name()
        .ok_or_else(|| ConfigError::invalid("logging.file", "must name a file"))?;

    std::fs::create_dir_all(directory).map_err(|e| {
        ConfigError::invalid("logging.file", format!("{}: {}", directory.display(), e))
    })?;

    let appender = tracing_appender::rolling::daily(directory, file_name);
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let layer = match format {
        LogFormat::Json => fmt::layer().json().with_writer(writer).boxed(),
        LogFormat::Pretty => fmt::layer().with_ansi(false).with_writer(writer).boxed(),
    };
    Ok((layer, guard))
}
