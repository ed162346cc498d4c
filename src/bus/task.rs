/*!
 * Bus Task - Dispatch Loop
 *
 * Background task that drains the observation bus on every doorbell ring and
 * on a fixed interval as a backstop for coalesced notifications.
 *
 * # Shutdown
 *
 * Same graceful-with-fallback pattern as the other background tasks:
 *
 * 1. `shutdown().await` sends `Shutdown`, the loop performs a final drain,
 *    closes the tracer and hands the doorbell back to the bus.
 * 2. Dropping the handle without `shutdown()` aborts the loop and logs a
 *    warning. Queued items stay queued; the tracer is not closed.
 */

use super::ObservationBus;
use crate::core::errors::{BusError, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// Control messages for the dispatch loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusCommand {
    /// Drain now, regardless of the doorbell
    Drain,
    Shutdown,
}

/// Handle to the running dispatch loop
pub struct BusTask {
    command_tx: mpsc::UnboundedSender<BusCommand>,
    handle: Option<tokio::task::JoinHandle<()>>,
    shutdown_initiated: Arc<AtomicBool>,
}

impl BusTask {
    /// Start draining `bus` every `drain_interval` and on every doorbell ring
    ///
    /// Fails if the tracer cannot initialize or a loop is already running on
    /// this bus. Must be called within a tokio runtime.
    pub fn spawn(bus: Arc<ObservationBus>, drain_interval: Duration) -> Result<Self> {
        bus.tracer().init()?;
        let doorbell = bus.take_doorbell().ok_or(BusError::AlreadyRunning)?;

        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(run_bus_loop(bus, doorbell, command_rx, drain_interval));

        info!(interval_ms = drain_interval.as_millis() as u64, "Observation bus started");

        Ok(Self {
            command_tx,
            handle: Some(handle),
            shutdown_initiated: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Request an immediate drain
    pub fn trigger(&self) {
        let _ = self.command_tx.send(BusCommand::Drain);
    }

    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, |h| h.is_finished())
    }

    /// Stop the loop after a final drain and close the tracer
    pub async fn shutdown(mut self) {
        self.shutdown_initiated.store(true, Ordering::SeqCst);
        let _ = self.command_tx.send(BusCommand::Shutdown);

        if let Some(handle) = self.handle.take() {
            match handle.await {
                Ok(()) => info!("Observation bus stopped"),
                Err(e) => warn!(error = %e, "Observation bus shutdown error"),
            }
        }
    }
}

async fn run_bus_loop(
    bus: Arc<ObservationBus>,
    mut doorbell: mpsc::Receiver<()>,
    mut command_rx: mpsc::UnboundedReceiver<BusCommand>,
    drain_interval: Duration,
) {
    let mut interval = tokio::time::interval(drain_interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            biased;

            cmd = command_rx.recv() => match cmd {
                Some(BusCommand::Drain) => {
                    bus.drain();
                }
                // Handle gone without shutdown: treat as shutdown
                Some(BusCommand::Shutdown) | None => break,
            },

            Some(()) = doorbell.recv() => {
                bus.drain();
            }

            _ = interval.tick() => {
                bus.drain();
            }
        }
    }

    let last = bus.drain();
    debug!(items = last.items, "Final drain before stop");
    bus.tracer().close();
    bus.restore_doorbell(doorbell);
}

impl Drop for BusTask {
    fn drop(&mut self) {
        if self.shutdown_initiated.load(Ordering::SeqCst) {
            return;
        }

        if let Some(handle) = self.handle.take() {
            warn!(
                "BusTask dropped without calling shutdown() - aborting dispatch loop. \
                 Use `task.shutdown().await` to drain and close the tracer."
            );
            handle.abort();
        }
    }
}
