//! Logging and error reporting setup.

use std::env;
use std::io::IsTerminal;

use secrecy::ExposeSecret;
use sentry::integrations::tracing as sentry_tracing;
use tracing::Level;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::{EnvFilter, Layer, Registry, prelude::*};

use crate::config::{Config, LogFormat};
use crate::process::VERSION;

/// Initializes the Sentry client if a DSN is configured.
///
/// The returned guard flushes pending events when dropped. Must be called before the async runtime
/// is created.
pub fn init_sentry(config: &Config) -> Option<sentry::ClientInitGuard> {
    let sentry_config = &config.sentry;
    let dsn = sentry_config.dsn.as_ref()?;

    Some(sentry::init(sentry::ClientOptions {
        dsn: dsn.expose_secret().as_str().parse().ok(),
        release: Some(format!("minio@{VERSION}").into()),
        environment: sentry_config.environment.clone(),
        enable_logs: true,
        sample_rate: sentry_config.sample_rate,
        traces_sample_rate: sentry_config.traces_sample_rate,
        ..Default::default()
    }))
}

/// Initializes metrics submission to Datadog if an API key is configured.
///
/// The returned flusher must be flushed before the process exits to submit pending metrics.
pub fn init_metrics(config: &Config) -> std::io::Result<Option<merni::DatadogFlusher>> {
    config
        .metrics
        .datadog_key
        .as_ref()
        .map(|api_key| {
            let mut builder = merni::datadog(api_key.expose_secret().as_str()).prefix("minio.");
            for (k, v) in &config.metrics.tags {
                builder = builder.global_tag(k, v);
            }
            builder.try_init()
        })
        .transpose()
}

/// Installs the global tracing subscriber.
///
/// Logs go to stderr in the configured format. With Sentry enabled, warnings and errors are also
/// reported as events.
pub fn init_tracing(config: &Config) {
    // Warnings and errors become events, everything at or above INFO is sent as logs.
    let sentry_layer = config.sentry.is_enabled().then(|| {
        sentry_tracing::layer().event_filter(|metadata| match *metadata.level() {
            Level::ERROR | Level::WARN => {
                sentry_tracing::EventFilter::Event | sentry_tracing::EventFilter::Log
            }
            Level::INFO => sentry_tracing::EventFilter::Log,
            Level::DEBUG | Level::TRACE => sentry_tracing::EventFilter::Ignore,
        })
    });

    let (level, env_filter) = parse_rust_log(config.logging.level);

    tracing_subscriber::registry()
        .with(format_layer(config.logging.format).with_filter(level))
        .with(sentry_layer)
        .with(env_filter)
        .init();
}

fn format_layer(format: LogFormat) -> Box<dyn Layer<Registry> + Send + Sync> {
    let format = match format {
        LogFormat::Auto if std::io::stderr().is_terminal() => LogFormat::Pretty,
        LogFormat::Auto => LogFormat::Simplified,
        other => other,
    };

    let layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true);

    match format {
        LogFormat::Json => layer.json().flatten_event(true).boxed(),
        LogFormat::Simplified => layer.with_ansi(false).boxed(),
        LogFormat::Pretty | LogFormat::Auto => layer.compact().boxed(),
    }
}

/// Derives the output level and the per-crate filter from `RUST_LOG`.
///
/// A bare level in `RUST_LOG` replaces `default`. Anything else is used verbatim as filter
/// directives.
fn parse_rust_log(default: LevelFilter) -> (LevelFilter, EnvFilter) {
    let level = match env::var(EnvFilter::DEFAULT_ENV) {
        Ok(value) => match value.parse::<LevelFilter>() {
            Ok(level) => level,
            Err(_) => return (LevelFilter::TRACE, EnvFilter::new(value)),
        },
        Err(_) => default,
    };

    // The maximum verbosity per crate, filtered down to `level` by the format layer.
    let env_filter = EnvFilter::new(
        "INFO,\
        tower_http=TRACE,\
        minio=TRACE,\
        minio_server=TRACE,\
        minio_service=TRACE,\
        ",
    );

    (level, env_filter)
}
