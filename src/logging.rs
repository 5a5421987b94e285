//! Structured logging initialization.
//!
//! The library only emits `tracing` events; installing a subscriber is up to
//! the embedding proxy. [`init`] is a convenience that builds one from
//! [`LoggingConfig`]. The filter comes from the configuration alone; the
//! environment is not consulted.

use tracing::Subscriber;
use tracing_subscriber::prelude::*;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{EnvFilter, Layer, fmt};

use crate::config::{LogFormat, LoggingConfig};

/// Logging initialization errors.
#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    #[error("invalid log filter: {0}")]
    Filter(#[from] tracing_subscriber::filter::ParseError),
    #[error("failed to install subscriber: {0}")]
    Init(#[from] tracing_subscriber::util::TryInitError),
}

/// Install the global subscriber.
///
/// Fails instead of panicking if a global subscriber is already set.
///
/// # Example
///
/// ```ignore
/// use h2intercept::config::LoggingConfig;
/// use h2intercept::logging;
///
/// logging::init(&LoggingConfig::default())?;
/// tracing::info!("proxy starting");
/// ```
pub fn init(config: &LoggingConfig) -> Result<(), LoggingError> {
    let filter = EnvFilter::try_new(&config.level)?;

    tracing_subscriber::registry()
        .with(fmt_layer(config))
        .with(filter)
        .try_init()?;

    Ok(())
}

/// The formatting layer for the configured format.
fn fmt_layer<S>(config: &LoggingConfig) -> Box<dyn Layer<S> + Send + Sync>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    let target = config.target;

    match (config.format, config.timestamps) {
        (LogFormat::Pretty, true) => fmt::layer().pretty().with_target(target).boxed(),
        (LogFormat::Pretty, false) => fmt::layer()
            .pretty()
            .with_target(target)
            .without_time()
            .boxed(),
        (LogFormat::Compact, true) => fmt::layer().compact().with_target(target).boxed(),
        (LogFormat::Compact, false) => fmt::layer()
            .compact()
            .with_target(target)
            .without_time()
            .boxed(),
        (LogFormat::Json, true) => fmt::layer().json().with_target(target).boxed(),
        (LogFormat::Json, false) => fmt::layer()
            .json()
            .with_target(target)
            .without_time()
            .boxed(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_filter() {
        let config = LoggingConfig {
            level: "h2intercept=notalevel".to_string(),
            ..LoggingConfig::default()
        };
        assert!(matches!(init(&config), Err(LoggingError::Filter(_))));
    }

    #[test]
    fn test_second_init_fails() {
        let config = LoggingConfig {
            level: "warn".to_string(),
            format: LogFormat::Json,
            ..LoggingConfig::default()
        };
        // Another test may have installed a subscriber first; either way the
        // last call must fail cleanly.
        let _ = init(&config);
        assert!(matches!(init(&config), Err(LoggingError::Init(_))));
    }
}
