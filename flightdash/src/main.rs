mod config;
mod telemetry;

use clap::{Args, Parser, Subcommand};
use config::{Config, ConfigError};
use flights::api::{FlightsState, app, serve};
use flights::store::{FlightStore, PgFlightStore};
use identity::IdentityState;
use shared::admin_service::AdminService;
use shared::http::run_http_service;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

const PROBE_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Parser)]
#[command(version, about = "Median fare analytics for airline search data")]
struct Cli {
    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Subcommand)]
enum CliCommand {
    /// Run the API and admin listeners.
    Serve(ConfigArgs),
    /// Load and validate the configuration, then exit.
    CheckConfig(ConfigArgs),
}

#[derive(Args)]
struct ConfigArgs {
    /// YAML config file. Environment variables override its values.
    #[arg(long, short)]
    config: Option<PathBuf>,
}

#[derive(thiserror::Error, Debug)]
enum FlightdashError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Metrics(#[from] telemetry::MetricsInitError),
    #[error(transparent)]
    Api(#[from] flights::FlightsApiError),
    #[error(transparent)]
    Identity(#[from] identity::AuthError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

fn load_config(args: &ConfigArgs) -> Result<Config, ConfigError> {
    let config = Config::load(args.config.as_deref())?;
    config.validate()?;
    Ok(config)
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    match cli.command {
        CliCommand::CheckConfig(args) => match load_config(&args) {
            Ok(_) => {
                println!("Config is valid");
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("Invalid config: {e}");
                ExitCode::FAILURE
            }
        },
        CliCommand::Serve(args) => {
            let config = match load_config(&args) {
                Ok(config) => config,
                Err(e) => {
                    eprintln!("Invalid config: {e}");
                    return ExitCode::FAILURE;
                }
            };

            let _sentry = telemetry::init_logging(config.common.logging.as_ref());
            match serve_blocking(config) {
                Ok(()) => ExitCode::SUCCESS,
                Err(e) => {
                    tracing::error!("flightdash stopped: {e}");
                    ExitCode::FAILURE
                }
            }
        }
    }
}

fn serve_blocking(config: Config) -> Result<(), FlightdashError> {
    telemetry::init_metrics(config.common.metrics.as_ref())?;

    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    rt.block_on(run(config))
}

async fn run(config: Config) -> Result<(), FlightdashError> {
    let store = Arc::new(PgFlightStore::new(&config.flights.database));
    tokio::spawn(probe_until_ready(store.clone()));

    let flights_state = FlightsState::new(store.clone(), config.flights.query_timeout());
    let identity_state = IdentityState::from_config(&config.identity).await?;
    let sessions = identity::session_layer(&config.identity.session);
    let identity_routes = identity::routes::router(identity_state, sessions);

    let api_task = serve(
        &config.flights,
        app(&config.flights, flights_state, identity_routes),
    );

    let admin_task = async {
        match &config.flights.admin_listener {
            Some(admin) => {
                let ready = store.readiness();
                let service = AdminService::<_, FlightdashError>::new(move || {
                    ready.load(Ordering::Relaxed)
                });
                run_http_service(&admin.host, admin.port, service).await
            }
            None => std::future::pending().await,
        }
    };

    let result = tokio::try_join!(
        async { api_task.await.map_err(FlightdashError::from) },
        admin_task
    );
    store.close().await;
    result.map(|_| ())
}

/// Keeps trying to hand out one connection so `/ready` flips as soon as the
/// database is reachable.
async fn probe_until_ready(store: Arc<PgFlightStore>) {
    loop {
        match store.probe().await {
            Ok(()) => {
                tracing::info!("flight database reachable");
                return;
            }
            Err(e) => {
                tracing::warn!("flight database not reachable yet: {e}");
                tokio::time::sleep(PROBE_INTERVAL).await;
            }
        }
    }
}
