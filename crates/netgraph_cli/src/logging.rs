use anyhow::Result;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

use crate::config::{Config, LogFormat};

/// Build the level filter; `RUST_LOG` wins over the configured level.
pub fn env_filter(config: &Config) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level))
}

/// Initialize logging. Everything goes to stderr so generated source on
/// stdout stays clean.
pub fn init(config: &Config) -> Result<()> {
    let (json_layer, pretty_layer) = match config.log_format {
        LogFormat::Json => (
            Some(
                fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_target(true)
                    .with_writer(std::io::stderr),
            ),
            None,
        ),
        LogFormat::Pretty => (
            None,
            Some(fmt::layer().with_target(false).with_writer(std::io::stderr)),
        ),
    };

    Registry::default()
        .with(env_filter(config))
        .with(json_layer)
        .with(pretty_layer)
        .try_init()?;

    Ok(())
}

pub fn log_config(config: &Config) {
    tracing::debug!(
        class_name = %config.class_name,
        log_level = %config.log_level,
        envelope = config.envelope,
        version = env!("CARGO_PKG_VERSION"),
        "Configuration loaded"
    );
}
