use anyhow::{Result, anyhow};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use crate::config::LoggingConfig;

/// Filter directive for the CLI verbosity count; `None` keeps the configured level.
fn verbosity_level(verbose: u8) -> Option<&'static str> {
    match verbose {
        0 => None,
        1 => Some("info"),
        2 => Some("debug"),
        _ => Some("trace"),
    }
}

fn build_env_filter(config: &LoggingConfig, verbose: u8) -> Result<EnvFilter> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    let level = verbosity_level(verbose).unwrap_or(config.level.as_str());
    EnvFilter::try_new(level).map_err(|e| anyhow!("invalid log filter '{level}': {e}"))
}

/// Installs the global subscriber. `RUST_LOG` overrides both config and `-v`.
///
/// # Errors
/// Returns an error on an invalid filter or when a subscriber is already installed.
pub fn init(config: &LoggingConfig, verbose: u8) -> Result<()> {
    let filter = build_env_filter(config, verbose)?;
    let fmt_layer = if config.json {
        tracing_subscriber::fmt::layer()
            .json()
            .with_target(true)
            .with_current_span(true)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer().with_target(true).boxed()
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init()
        .map_err(|e| anyhow!("failed to install tracing subscriber: {e}"))
}
