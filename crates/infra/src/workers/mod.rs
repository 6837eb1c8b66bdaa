//! Long-running robot workers and their control handles.

pub mod robot_worker;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use rand::Rng;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::warn;

use scanfleet_core::RobotCode;
use scanfleet_fleet::StatusMode;
use scanfleet_inventory::DiscrepancyPolicy;

use crate::config::SimulatorConfig;
use crate::locks::LockCoordinator;
use crate::store::WarehouseStore;
use crate::telemetry::TelemetrySink;

pub use robot_worker::{CycleReport, RobotWorker, ScanOutcome, WorkerError};

const CHARGE_FACTOR: u32 = 2;
const JITTER_MIN: f64 = 0.85;
const JITTER_MAX: f64 = 1.25;
const MIN_ERROR_PAUSE: Duration = Duration::from_secs(1);

/// Cooperative stop flag, checked once per cycle.
#[derive(Debug, Clone, Default)]
pub struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Handle to control and join a spawned worker.
#[derive(Debug)]
pub struct WorkerHandle {
    robot: RobotCode,
    stop: StopSignal,
    join: Option<JoinHandle<()>>,
}

impl WorkerHandle {
    pub fn robot(&self) -> &RobotCode {
        &self.robot
    }

    /// Ask the worker to stop after its current cycle.
    pub fn stop(&self) {
        self.stop.stop();
    }

    pub fn is_finished(&self) -> bool {
        self.join.as_ref().is_none_or(JoinHandle::is_finished)
    }

    /// Wait for the worker task to end.
    pub async fn join(mut self) {
        if let Some(join) = self.join.take() {
            if let Err(e) = join.await {
                warn!(robot = %self.robot, error = %e, "worker task ended abnormally");
            }
        }
    }

    /// Wait for the worker until `deadline`, aborting it if it is still
    /// running then. Returns whether it ended on its own.
    pub async fn join_by(mut self, deadline: Instant) -> bool {
        let Some(mut join) = self.join.take() else {
            return true;
        };
        match tokio::time::timeout_at(deadline, &mut join).await {
            Ok(Ok(())) => true,
            Ok(Err(e)) => {
                warn!(robot = %self.robot, error = %e, "worker task ended abnormally");
                true
            }
            Err(_) => {
                join.abort();
                false
            }
        }
    }

    /// Request graceful shutdown and wait for the worker to stop.
    pub async fn shutdown(self) {
        self.stop();
        self.join().await;
    }
}

/// Where scanned contents come from.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ContentSource {
    /// Latest snapshot per product from the store.
    Store,
    /// Products carried by the location itself (offline topology).
    Synthetic,
}

/// Timing and scanning behaviour shared by every worker.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkerSettings {
    pub update_interval: Duration,
    pub status_interval: Duration,
    pub status_mode: StatusMode,
    pub discrepancy: DiscrepancyPolicy,
    pub contents: ContentSource,
}

impl WorkerSettings {
    pub fn from_config(config: &SimulatorConfig, contents: ContentSource) -> Self {
        Self {
            update_interval: config.update_interval,
            status_interval: config.status_interval,
            status_mode: config.status_mode,
            discrepancy: config.discrepancy,
            contents,
        }
    }

    /// Pause between cycles: the update interval scaled by U(0.85, 1.25).
    pub fn jittered_interval<R: Rng + ?Sized>(&self, rng: &mut R) -> Duration {
        self.update_interval
            .mul_f64(rng.gen_range(JITTER_MIN..JITTER_MAX))
    }

    pub fn charge_pause(&self) -> Duration {
        self.update_interval * CHARGE_FACTOR
    }

    pub fn error_pause(&self) -> Duration {
        self.update_interval.max(MIN_ERROR_PAUSE)
    }
}

/// The shared services a worker talks to.
#[derive(Clone)]
pub struct Services {
    pub store: Arc<dyn WarehouseStore>,
    pub locks: Arc<dyn LockCoordinator>,
    pub telemetry: Arc<dyn TelemetrySink>,
}

impl core::fmt::Debug for Services {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Services").finish_non_exhaustive()
    }
}
