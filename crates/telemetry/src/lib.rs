//! Logging and tracing bootstrap.

use anyhow::Context;
use shelf_kernel::settings::{LogFormat, TelemetrySettings};
use tracing_subscriber::EnvFilter;

/// Build the filter from `RUST_LOG`, falling back to the configured level.
fn env_filter(settings: &TelemetrySettings) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&settings.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Install the global tracing subscriber.
pub fn init(settings: &TelemetrySettings) -> anyhow::Result<()> {
    let builder = tracing_subscriber::fmt().with_env_filter(env_filter(settings));

    match settings.log_format {
        LogFormat::Json => builder
            .json()
            .try_init()
            .map_err(|err| anyhow::anyhow!(err))
            .context("failed to install json tracing subscriber")?,
        LogFormat::Pretty => builder
            .try_init()
            .map_err(|err| anyhow::anyhow!(err))
            .context("failed to install tracing subscriber")?,
    }

    tracing::info!(
        target: "shelf-telemetry",
        log_format = ?settings.log_format,
        "telemetry initialized"
    );

    Ok(())
}
