/*!
 * Background Tasks
 * Environment profiler loop and the handle that owns every spawned task
 */

mod profile;

pub use profile::{EnvironmentProfiler, EnvironmentalProfile, ProfileSource};

use crate::bus::BusTask;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ProfilerCommand {
    Sample,
    Shutdown,
}

/// Handle to the profiler loop, same shutdown contract as [`BusTask`]
pub struct ProfilerTask {
    command_tx: mpsc::UnboundedSender<ProfilerCommand>,
    handle: Option<tokio::task::JoinHandle<()>>,
    shutdown_initiated: Arc<AtomicBool>,
}

impl ProfilerTask {
    /// Sample immediately, then every `interval`
    pub fn spawn(profiler: Arc<EnvironmentProfiler>, interval: Duration) -> Self {
        let (command_tx, mut command_rx) = mpsc::unbounded_channel();

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    biased;

                    cmd = command_rx.recv() => match cmd {
                        Some(ProfilerCommand::Sample) => {
                            profiler.sample();
                        }
                        Some(ProfilerCommand::Shutdown) | None => break,
                    },

                    _ = ticker.tick() => {
                        profiler.sample();
                    }
                }
            }
        });

        info!(interval_ms = interval.as_millis() as u64, "Environment profiler started");

        Self {
            command_tx,
            handle: Some(handle),
            shutdown_initiated: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Take a profile now
    pub fn trigger(&self) {
        let _ = self.command_tx.send(ProfilerCommand::Sample);
    }

    pub async fn shutdown(mut self) {
        self.shutdown_initiated.store(true, Ordering::SeqCst);
        let _ = self.command_tx.send(ProfilerCommand::Shutdown);

        if let Some(handle) = self.handle.take() {
            match handle.await {
                Ok(()) => info!("Environment profiler stopped"),
                Err(e) => warn!(error = %e, "Environment profiler shutdown error"),
            }
        }
    }
}

impl Drop for ProfilerTask {
    fn drop(&mut self) {
        if self.shutdown_initiated.load(Ordering::SeqCst) {
            return;
        }

        if let Some(handle) = self.handle.take() {
            warn!(
                "ProfilerTask dropped without calling shutdown() - aborting task immediately. \
                 Use `task.shutdown().await` for graceful cleanup."
            );
            handle.abort();
        }
    }
}

/// Every background task started together; stopped together
#[derive(Default)]
pub struct Background {
    bus: Option<BusTask>,
    profiler: Option<ProfilerTask>,
}

impl Background {
    pub fn new(bus: Option<BusTask>, profiler: Option<ProfilerTask>) -> Self {
        Self { bus, profiler }
    }

    pub fn bus(&self) -> Option<&BusTask> {
        self.bus.as_ref()
    }

    pub fn profiler(&self) -> Option<&ProfilerTask> {
        self.profiler.as_ref()
    }

    /// Stop the profiler, then the bus (final drain, tracer closed)
    pub async fn shutdown(self) {
        let Self { bus, profiler } = self;
        if let Some(profiler) = profiler {
            profiler.shutdown().await;
        }
        if let Some(bus) = bus {
            bus.shutdown().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_profiler_task_samples_and_stops() {
        let profiler = Arc::new(EnvironmentProfiler::new(8));
        let task = ProfilerTask::spawn(profiler.clone(), Duration::from_secs(3600));

        for _ in 0..100 {
            if profiler.retained() > 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert!(profiler.latest().timestamp > 0);

        task.trigger();
        for _ in 0..100 {
            if profiler.retained() > 1 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(profiler.retained(), 2);

        task.shutdown().await;
    }

    #[tokio::test]
    async fn test_empty_background_shutdown() {
        let background = Background::default();
        assert!(background.bus().is_none());
        assert!(background.profiler().is_none());
        background.shutdown().await;
    }
}
