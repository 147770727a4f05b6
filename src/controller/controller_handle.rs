//! Controller Handle - lifecycle API for the polling thread
//!
//! Owns the dedicated poll thread, the stop token that ends it and the
//! statistics it hands back when joined.
//!

use std::thread::JoinHandle;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use super::device::{ControllerDevice, DeviceError};
use super::events::FrameEvents;
use super::poller::{PollStats, Poller, PollerSettings};

/// Errors that can occur while starting, running or stopping the poller
#[derive(Debug, thiserror::Error)]
pub enum ControllerError {
    /// The device could not be opened on the poll thread
    ///
    /// Typically a missing or broken gamepad backend. Disconnected pads do not
    /// end up here, the loop keeps running and skips frames instead.
    #[error("Device error: {0}")]
    DeviceError(#[from] DeviceError),

    #[error("Initialization error: {0}")]
    InitializationError(String),

    /// The poll thread panicked
    #[error("Poll thread terminated abnormally")]
    ThreadPanicked,
}

/// Handle for the running poll thread
///
/// # Threading Model
///
/// The loop runs on its own OS thread named `pad-poller`. Pacing uses blocking
/// sleeps, so the thread never shares a runtime worker with async tasks. Frame
/// batches leave the thread through a bounded tokio channel using `try_send`;
/// the poller never waits on its consumer.
///
/// ```text
/// GilrsDevice ─► Poller<Polling> ─[FrameEvents]→ dispatcher task
///               (pad-poller thread)  (mpsc, try_send)
/// ```
///
/// # Shutdown
///
/// [`ControllerHandle::stop`] cancels the token and joins the thread. The
/// current cycle finishes first, the token is observed at the top of the next
/// one, so shutdown takes at most one frame period plus one device read.
pub struct ControllerHandle {
    cancel: CancellationToken,
    thread: JoinHandle<Result<PollStats, ControllerError>>,
}

impl ControllerHandle {
    /// Spawns the poll thread.
    ///
    /// `open_device` runs on the poll thread itself, so backends that must stay
    /// on the thread that created them (gilrs on some platforms) work unchanged.
    ///
    /// # Errors
    ///
    /// * [`ControllerError::InitializationError`] - the OS refused to spawn the thread
    ///
    /// Errors from `open_device` surface when the handle is stopped.
    pub fn spawn<F, D>(
        settings: PollerSettings,
        open_device: F,
        sender: mpsc::Sender<FrameEvents>,
        cancel: CancellationToken,
    ) -> Result<Self, ControllerError>
    where
        F: FnOnce() -> Result<D, DeviceError> + Send + 'static,
        D: ControllerDevice,
    {
        info!("Initializing poller with settings: {:?}", settings);
        let poller = Poller::create(settings, sender);

        let token = cancel.clone();
        let thread = std::thread::Builder::new()
            .name("pad-poller".to_string())
            .spawn(move || {
                let mut device = open_device().map_err(|e| {
                    error!("Failed to open controller device: {}", e);
                    ControllerError::from(e)
                })?;

                let stopped = poller.start().run(&mut device, &token);
                Ok(stopped.into_stats())
            })
            .map_err(|e| ControllerError::InitializationError(e.to_string()))?;

        info!("Poll thread spawned successfully");
        Ok(Self { cancel, thread })
    }

    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }

    /// Requests a stop and blocks until the poll thread has exited
    pub fn stop(self) -> Result<PollStats, ControllerError> {
        info!("Stopping poller");
        self.cancel.cancel();
        let stats = self
            .thread
            .join()
            .map_err(|_| ControllerError::ThreadPanicked)??;
        info!(
            "Poller stopped after {} cycles ({} overruns, {} dropped batches)",
            stats.cycles, stats.overruns, stats.dropped_batches
        );
        Ok(stats)
    }
}
