mod player;
mod poller;
mod reconcile;
mod waiting;

use signage_core::config::Config;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Cancels the token on SIGTERM or SIGINT so the loop can tear down the
/// display subprocess on its normal exit path.
fn setup_shutdown_signal(shutdown: CancellationToken) {
    tokio::spawn(async move {
        let ctrl_c = async {
            tokio::signal::ctrl_c()
                .await
                .expect("failed to install Ctrl+C handler");
        };

        let terminate = async {
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                .expect("failed to install signal handler")
                .recv()
                .await;
        };

        tokio::select! {
            _ = ctrl_c => {
                info!("received Ctrl+C, shutting down");
            }
            _ = terminate => {
                info!("received SIGTERM, shutting down");
            }
        }
        shutdown.cancel();
    });
}

fn setup_logging() -> anyhow::Result<std::path::PathBuf> {
    let data_dir = signage_core::platform::data_dir();
    std::fs::create_dir_all(&data_dir)?;
    let log_path = data_dir.join("daemon.log");

    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)?;

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_writer(log_file)
        .with_ansi(false);

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,signage_daemon=debug")),
        )
        .init();

    Ok(log_path)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let log_path = setup_logging()?;
    info!("Log file: {:?}", log_path);

    // A bad config is the one fatal, non-retried error.
    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("signage-daemon: {}", e);
            eprintln!("example config: {:?}", Config::config_path());
            std::process::exit(1);
        }
    };
    info!(
        "Config loaded from {:?} (player_id={}, backend={})",
        Config::config_path(),
        config.player_id,
        config.output_backend
    );

    if let Err(e) = waiting::ensure_placeholder(&config.waiting_image) {
        tracing::warn!("could not prepare waiting image: {:#}", e);
    }

    let shutdown = CancellationToken::new();
    setup_shutdown_signal(shutdown.clone());

    info!("Daemon initialised, running reconciliation loop");
    reconcile::ReconcileLoop::new(&config, shutdown)?.run().await?;

    info!("Daemon exited cleanly");
    Ok(())
}
