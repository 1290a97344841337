use anyhow::{Context, Result};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use visiongate_core::config::ObservabilityConfig;
use visiongate_core::LogFormat;

/// `RUST_LOG` wins when set; otherwise the configured level applies to our
/// crates and tower_http.
pub fn build_env_filter(log_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "{level},visiongate_api={level},visiongate_processing={level},visiongate_infra={level},tower_http={level}",
            level = log_level
        ))
    })
}

/// Initialize the global tracing subscriber.
pub fn init_telemetry(config: &ObservabilityConfig) -> Result<()> {
    let filter = build_env_filter(&config.log_level);

    match config.log_format {
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_span_list(false),
            )
            .try_init(),
        LogFormat::Pretty => tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().compact())
            .try_init(),
    }
    .context("failed to install tracing subscriber")?;

    tracing::debug!(
        log_level = %config.log_level,
        log_format = ?config.log_format,
        "Tracing initialized"
    );
    Ok(())
}
