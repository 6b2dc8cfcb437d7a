use crate::config::{LoggingConfig, MetricsConfig};
use metrics_exporter_statsd::StatsdBuilder;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

const METRICS_PREFIX: &str = "flightdash";

/// Installs the fmt subscriber (filtered by `RUST_LOG`, default `info`) and,
/// when a DSN is configured, Sentry. Keep the returned guard alive until exit
/// so buffered events get flushed.
pub fn init_logging(config: Option<&LoggingConfig>) -> Option<sentry::ClientInitGuard> {
    let dsn = config.and_then(|c| c.sentry_dsn.as_deref());
    let guard = dsn.map(|dsn| {
        sentry::init((
            dsn,
            sentry::ClientOptions {
                release: sentry::release_name!(),
                environment: config
                    .and_then(|c| c.environment.clone())
                    .map(Into::into),
                ..Default::default()
            },
        ))
    });

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .with(guard.as_ref().map(|_| sentry::integrations::tracing::layer()))
        .init();

    guard
}

#[derive(thiserror::Error, Debug)]
pub enum MetricsInitError {
    #[error("could not build statsd exporter: {0}")]
    Exporter(#[from] metrics_exporter_statsd::StatsdError),
    #[error("a metrics recorder is already installed")]
    AlreadyInstalled,
}

/// Routes the `metrics` facade to StatsD. Without config every metric is a
/// no-op.
pub fn init_metrics(config: Option<&MetricsConfig>) -> Result<(), MetricsInitError> {
    if let Some(config) = config {
        let recorder = StatsdBuilder::from(config.statsd_host.as_str(), config.statsd_port)
            .build(Some(METRICS_PREFIX))?;
        metrics::set_global_recorder(recorder).map_err(|_| MetricsInitError::AlreadyInstalled)?;
        tracing::info!(
            host = %config.statsd_host,
            port = config.statsd_port,
            "statsd exporter installed"
        );
    }

    shared::metrics_defs::describe_all(flights::metrics_defs::ALL_METRICS);
    shared::metrics_defs::describe_all(identity::metrics_defs::ALL_METRICS);
    Ok(())
}
