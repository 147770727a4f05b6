//! Async consumer of frame batches.
//!
//! Runs the [`DesktopManager`] on every batch and forwards the resulting
//! commands to a [`CommandSink`]. Ends once every sender is dropped and the
//! queue is drained.

use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinHandle};
use tracing::{debug, info, warn};

use super::manager::DesktopManager;
use super::CommandSink;
use crate::controller::events::FrameEvents;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DispatchStats {
    pub batches: u64,
    pub commands: u64,
    pub sink_errors: u64,
}

pub struct DispatcherHandle {
    task: JoinHandle<DispatchStats>,
}

impl DispatcherHandle {
    pub fn spawn<S>(
        receiver: mpsc::Receiver<FrameEvents>,
        manager: DesktopManager,
        sink: S,
    ) -> Self
    where
        S: CommandSink + Send + 'static,
    {
        info!("Spawning desktop dispatcher");
        let task = tokio::spawn(run_dispatcher(receiver, manager, sink));
        Self { task }
    }

    /// Waits for the queue to close and drain
    pub async fn join(self) -> Result<DispatchStats, JoinError> {
        self.task.await
    }
}

async fn run_dispatcher<S: CommandSink>(
    mut receiver: mpsc::Receiver<FrameEvents>,
    mut manager: DesktopManager,
    mut sink: S,
) -> DispatchStats {
    let mut stats = DispatchStats::default();

    while let Some(batch) = receiver.recv().await {
        stats.batches += 1;
        for command in manager.handle_frame(&batch) {
            stats.commands += 1;
            if let Err(e) = sink.execute(&command) {
                stats.sink_errors += 1;
                warn!("Dropping command from frame {}: {}", batch.frame, e);
            }
        }
        debug!("Dispatched frame {}", batch.frame);
    }

    info!(
        "Dispatcher finished: {} batches, {} commands, {} sink errors",
        stats.batches, stats.commands, stats.sink_errors
    );
    stats
}
