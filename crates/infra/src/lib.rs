//! Infrastructure layer: configuration, Postgres, advisory locks, the
//! telemetry client, and the long-running robot workers.

pub mod config;
pub mod db;
pub mod locks;
pub mod planner;
pub mod store;
pub mod telemetry;
pub mod workers;

pub use config::{ConfigError, Mode, SimulatorConfig, StoreConfig};
pub use db::{Database, DbError};
pub use locks::{InMemoryLocks, LockCoordinator, LockError, LockSession, PgAdvisoryLocks};
pub use planner::FleetPlanner;
pub use store::{Fetch, InMemoryWarehouseStore, PostgresWarehouseStore, WarehouseStore};
pub use telemetry::{HttpTelemetryClient, RecordingTelemetry, TelemetryError, TelemetrySink};
pub use workers::{
    ContentSource, CycleReport, RobotWorker, ScanOutcome, Services, StopSignal, WorkerError,
    WorkerHandle, WorkerSettings,
};
