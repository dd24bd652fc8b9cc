mod config;
mod ingest;
mod metrics_defs;

use axum::Router;
use clap::Parser;
use config::Config;
use metrics_exporter_statsd::StatsdBuilder;
use registry::store::ClientStore;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

/// Client roster ingestion and validation service.
#[derive(Parser)]
#[command(name = "padron")]
struct Cli {
    /// Path to the YAML configuration file. Built-in defaults apply when
    /// omitted.
    #[arg(long, short)]
    config: Option<PathBuf>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => match Config::from_file(path) {
            Ok(config) => config,
            Err(err) => {
                eprintln!("could not load config: {err}");
                return ExitCode::FAILURE;
            }
        },
        None => Config::default(),
    };
    if let Err(err) = config.validate() {
        eprintln!("invalid config: {err}");
        return ExitCode::FAILURE;
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let _sentry_guard = config
        .common
        .logging
        .as_ref()
        .and_then(|logging| logging.sentry_dsn.as_deref())
        .map(|dsn| {
            sentry::init((
                dsn,
                sentry::ClientOptions {
                    release: sentry::release_name!(),
                    ..Default::default()
                },
            ))
        });

    if let Some(metrics_config) = &config.common.metrics {
        install_statsd(metrics_config);
    }

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(err) => {
            eprintln!("could not start runtime: {err}");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(config)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(%err, "server exited with an error");
            ExitCode::FAILURE
        }
    }
}

fn install_statsd(config: &config::MetricsConfig) {
    match StatsdBuilder::from(config.statsd_host.as_str(), config.statsd_port).build(Some("padron"))
    {
        Ok(recorder) => {
            if metrics::set_global_recorder(recorder).is_err() {
                tracing::warn!("a metrics recorder was already installed");
                return;
            }
            shared::metrics_defs::describe_all(registry::metrics_defs::ALL_METRICS);
            shared::metrics_defs::describe_all(metrics_defs::ALL_METRICS);
        }
        Err(err) => tracing::warn!(%err, "could not set up the statsd recorder"),
    }
}

fn app(store: ClientStore, ingest_state: ingest::IngestState) -> Router {
    registry::api::router(store).merge(ingest::router(ingest_state))
}

async fn run(config: Config) -> Result<(), std::io::Error> {
    let store = ClientStore::new();
    let ingest_state = ingest::IngestState {
        store: store.clone(),
        upload_dir: config.server.upload_dir.clone(),
        max_upload_bytes: config.server.max_upload_bytes,
    };

    let ready = Arc::new(AtomicBool::new(false));
    let admin = shared::admin::router({
        let ready = ready.clone();
        move || ready.load(Ordering::Relaxed)
    });

    let admin_listener = TcpListener::bind(config.server.admin_listener.addr()).await?;
    tokio::spawn(async move {
        if let Err(err) = axum::serve(admin_listener, admin).await {
            tracing::error!(%err, "admin listener failed");
        }
    });

    let listener = TcpListener::bind(config.server.listener.addr()).await?;
    ready.store(true, Ordering::Relaxed);
    tracing::info!(addr = %config.server.listener.addr(), "listening");
    axum::serve(listener, app(store, ingest_state)).await
}
