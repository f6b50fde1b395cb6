use std::sync::Arc;

use tracing::Level;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan, writer::BoxMakeWriter},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

use crate::config::LoggingConfig;

/// Crates whose events follow the configured level; everything else stays at `warn`
const RELAY_TARGETS: &[&str] = &[
    "predlive",
    "predlive_core",
    "predlive_hub",
    "predlive_api",
    "tower_http",
];

/// Initialize structured logging for the relay
///
/// `json` is meant for deployments, anything else prints pretty lines.
/// Without `RUST_LOG` the configured level applies to the relay crates
/// and the HTTP trace layer only, so dependency chatter stays quiet.
pub fn init_logging(config: &LoggingConfig) -> anyhow::Result<()> {
    let level = parse_log_level(&config.level)?;

    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(relay_directives(level))?,
    };

    let (writer, to_file) = match &config.file_path {
        Some(path) => (open_log_file(path)?, true),
        None => (BoxMakeWriter::new(std::io::stdout), false),
    };

    let registry = tracing_subscriber::registry().with(env_filter);

    if config.format.as_str() == "json" {
        registry
            .with(
                fmt::layer()
                    .json()
                    .with_span_events(FmtSpan::CLOSE)
                    .with_current_span(true)
                    .with_span_list(true)
                    .with_target(true)
                    .with_line_number(true)
                    .with_file(true)
                    .with_writer(writer),
            )
            .try_init()?;
    } else {
        registry
            .with(
                fmt::layer()
                    .pretty()
                    .with_span_events(FmtSpan::CLOSE)
                    .with_target(true)
                    .with_line_number(true)
                    .with_file(false)
                    .with_ansi(!to_file)
                    .with_writer(writer),
            )
            .try_init()?;
    }

    Ok(())
}

/// Filter directives used when `RUST_LOG` is unset
fn relay_directives(level: Level) -> String {
    let level = level.to_string().to_lowercase();
    let mut directives = String::from("warn");
    for target in RELAY_TARGETS {
        directives.push_str(&format!(",{target}={level}"));
    }
    directives
}

fn open_log_file(path: &str) -> anyhow::Result<BoxMakeWriter> {
    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| anyhow::anyhow!("Failed to open log file {path}: {e}"))?;
    Ok(BoxMakeWriter::new(Arc::new(file)))
}

/// Parse log level string to tracing Level
pub(crate) fn parse_log_level(level: &str) -> anyhow::Result<Level> {
    match level.to_lowercase().as_str() {
        "trace" => Ok(Level::TRACE),
        "debug" => Ok(Level::DEBUG),
        "info" => Ok(Level::INFO),
        "warn" | "warning" => Ok(Level::WARN),
        "error" => Ok(Level::ERROR),
        _ => Err(anyhow::anyhow!("Invalid log level: {level}")),
    }
}
