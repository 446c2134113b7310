mod cli;
mod error;
mod handlers;
mod refresh;
mod signal;
mod state;
mod textfile;

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::info;
use tracing_subscriber::EnvFilter;

use barman_exporter_core::barman::{Barman, BarmanCli};
use barman_exporter_core::builder::SnapshotBuilder;
use barman_exporter_core::cache::SnapshotCache;
use barman_exporter_core::config::{ExporterConfig, ListenAddress};
use barman_exporter_core::metrics::render_snapshot;

use crate::cli::{Cli, OutputMode};
use crate::state::AppState;
use crate::textfile::TextfileTarget;

/// Upper bound on waiting for in-flight barman calls once serving has stopped.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

type BoxError = Box<dyn std::error::Error>;

fn main() {
    let cli = Cli::parse();

    let config = cli.resolve_config().unwrap_or_else(|e| {
        eprintln!("Error: {e}");
        std::process::exit(1);
    });
    let mode = cli.output_mode(&config).unwrap_or_else(|e| {
        eprintln!("Error: {e}");
        std::process::exit(1);
    });

    init_logging(cli.verbose, mode.is_serve(), &config.log_format);

    if let Err(e) = run(config, mode) {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

/// Serving logs at info by default; one-shot modes stay quiet unless asked.
/// `RUST_LOG` overrides the verbosity flags.
fn init_logging(verbose: u8, serving: bool, log_format: &str) {
    let level = match verbose {
        0 if serving => "info",
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    // stdout carries metrics in debug mode.
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);
    match log_format {
        "json" => builder.json().init(),
        _ => builder.init(),
    }
}

fn run(config: ExporterConfig, mode: OutputMode) -> Result<(), BoxError> {
    let selector = config.selector()?;
    let interval = config.refresh_interval()?;
    let barman = Barman::new(BarmanCli::new(&config.barman_bin, config.command_timeout()?));

    // Refuse to start, and never bind, against an unsupported barman.
    let version = barman.ensure_supported_version()?;
    info!(barman_version = %version, servers = %selector, "barman-exporter starting");

    let builder = SnapshotBuilder::new(barman, selector);

    match mode {
        OutputMode::Stdout => {
            let snapshot = builder.build()?;
            print!("{}", render_snapshot(&snapshot)?);
            Ok(())
        }
        OutputMode::Textfile(path) => {
            let target = TextfileTarget {
                path,
                user: config.textfile.user.clone(),
                group: config.textfile.group.clone(),
                mode: config.textfile_mode()?,
            };
            let snapshot = builder.build()?;
            textfile::write_textfile(&target, &render_snapshot(&snapshot)?)?;
            Ok(())
        }
        OutputMode::Serve(listen) => {
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()
                .map_err(|e| format!("failed to build tokio runtime: {e}"))?;
            let result = runtime.block_on(serve(listen, builder, interval));
            runtime.shutdown_timeout(SHUTDOWN_GRACE);
            result
        }
    }
}

async fn serve(
    listen: ListenAddress,
    builder: SnapshotBuilder<BarmanCli>,
    interval: Duration,
) -> Result<(), BoxError> {
    let listener = TcpListener::bind((listen.host(), listen.port()))
        .await
        .map_err(|e| format!("cannot bind to {listen}: {e}"))?;

    let cache = Arc::new(SnapshotCache::new());
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let refresher = tokio::spawn(refresh::run_refresh_loop(
        Arc::clone(&cache),
        Arc::new(builder),
        interval,
        shutdown_rx,
    ));

    let app = handlers::router(AppState::new(cache));

    info!("barman-exporter listening on {listen}");
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            signal::shutdown_signal().await;
            let _ = shutdown_tx.send(true);
        })
        .await
        .map_err(|e| format!("server error: {e}"))?;

    if let Err(e) = refresher.await {
        tracing::error!(error = %e, "refresh loop ended abnormally");
    }
    info!("barman-exporter stopped");
    Ok(())
}
