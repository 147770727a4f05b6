pub mod config;
pub mod controller;
pub mod desktop;

use crate::config::{config_path, ManagerConfig};
use crate::controller::controller_handle::ControllerHandle;
use crate::controller::device::GilrsDevice;
use crate::desktop::dispatcher::DispatcherHandle;
use crate::desktop::manager::DesktopManager;
use crate::desktop::TracingSink;
use color_eyre::{eyre::eyre, Result};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

// About one second of frames at the default period
const EVENT_QUEUE_CAPACITY: usize = 128;

#[tokio::main]
async fn main() -> Result<()> {
    setup()?;

    let path = config_path();
    ManagerConfig::ensure_default_config(&path).await?;
    let config = ManagerConfig::load(&path).await?;
    info!("Loaded config from {}: {:?}", path.display(), config);
    let validated = config
        .validate()
        .map_err(|e| eyre!("Invalid configuration in {}: {}", path.display(), e))?;

    let (event_tx, event_rx) = mpsc::channel(EVENT_QUEUE_CAPACITY);
    let (status_tx, status_rx) = watch::channel(validated.desktop.start_enabled);

    let manager = DesktopManager::new(validated.desktop, status_tx);
    let dispatcher = DispatcherHandle::spawn(event_rx, manager, TracingSink::new());
    let status_logger = tokio::spawn(log_status(status_rx));

    let controller = ControllerHandle::spawn(
        validated.poller,
        GilrsDevice::connect,
        event_tx,
        CancellationToken::new(),
    )
    .map_err(|e| eyre!("Failed to spawn controller: {}", e))?;

    info!("Running, press Ctrl-C to stop");
    tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            signal?;
            info!("Shutdown requested");
        }
        _ = wait_for_exit(&controller) => {
            warn!("Poll thread exited on its own, shutting down");
        }
    }

    let stats = tokio::task::spawn_blocking(move || controller.stop()).await??;
    info!("Poller statistics: {:?}", stats);

    // The poller dropped its sender, so the dispatcher drains and ends
    let dispatch_stats = dispatcher.join().await?;
    info!("Dispatcher statistics: {:?}", dispatch_stats);
    status_logger.abort();

    Ok(())
}

async fn wait_for_exit(controller: &ControllerHandle) {
    let mut interval = tokio::time::interval(Duration::from_millis(250));
    while !controller.is_finished() {
        interval.tick().await;
    }
}

/// Reports every active/inactive change
async fn log_status(mut status: watch::Receiver<bool>) {
    info!(
        "Desktop manager starts {}",
        if *status.borrow() { "enabled" } else { "disabled" }
    );
    while status.changed().await.is_ok() {
        let active = *status.borrow_and_update();
        info!(
            "Status: {}",
            if active { "Disable Desktop Manager" } else { "Enable Desktop Manager" }
        );
    }
    warn!("Status channel closed");
}

fn setup() -> Result<()> {
    if std::env::var("RUST_LIB_BACKTRACE").is_err() {
        std::env::set_var("RUST_LIB_BACKTRACE", "0")
    }
    color_eyre::install()?;
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info")
    }
    setup_logging_env();
    Ok(())
}

fn setup_logging_env() {
    FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .pretty()
        .init();
}
