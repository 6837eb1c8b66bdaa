//! Fleet startup and shutdown.

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use rand::SeedableRng;
use rand::rngs::StdRng;
use thiserror::Error;
use tokio::time::Instant;
use tracing::{info, warn};

use scanfleet_core::RobotCode;
use scanfleet_infra::{
    ContentSource, Database, FleetPlanner, HttpTelemetryClient, InMemoryLocks,
    InMemoryWarehouseStore, Mode, PgAdvisoryLocks, PostgresWarehouseStore, RobotWorker, Services,
    SimulatorConfig, TelemetryError, WarehouseStore, WorkerHandle, WorkerSettings,
};

#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("telemetry client: {0}")]
    Telemetry(#[from] TelemetryError),

    #[error("no robots to run: the store has none and ROBOTS_COUNT is 0")]
    NoRobots,
}

/// Build the services for the configured mode. Offline never touches
/// Postgres.
pub fn connect(config: &SimulatorConfig) -> Result<Services, RunnerError> {
    let telemetry = Arc::new(HttpTelemetryClient::new(&config.api_url, config.http_timeout)?);
    let services = match config.mode {
        Mode::Live => {
            let db = Database::new(&config.store);
            Services {
                store: Arc::new(PostgresWarehouseStore::new(db.clone())),
                locks: Arc::new(PgAdvisoryLocks::new(db)),
                telemetry,
            }
        }
        Mode::Offline => Services {
            store: Arc::new(InMemoryWarehouseStore::new()),
            locks: Arc::new(InMemoryLocks::new()),
            telemetry,
        },
    };
    Ok(services)
}

/// Running workers, one per robot.
#[derive(Debug)]
pub struct Fleet {
    mode: Mode,
    handles: Vec<WorkerHandle>,
    grace: Duration,
}

impl Fleet {
    /// Effective mode after topology load.
    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    pub fn robots(&self) -> impl Iterator<Item = &RobotCode> {
        self.handles.iter().map(WorkerHandle::robot)
    }

    /// Signal every worker, then give them the grace period to finish their
    /// current cycle. Returns how many had to be abandoned.
    pub async fn shutdown(self) -> usize {
        info!(workers = self.handles.len(), "stopping workers");
        for handle in &self.handles {
            handle.stop();
        }

        let deadline = Instant::now() + self.grace;
        let mut abandoned = 0;
        for handle in self.handles {
            if !handle.join_by(deadline).await {
                abandoned += 1;
            }
        }
        if abandoned > 0 {
            warn!(abandoned, "grace period elapsed with workers still running");
        }
        info!("emulator stopped");
        abandoned
    }
}

/// Load topology, plan routes, resolve tokens and start one worker per robot.
pub async fn launch<R: Rng + ?Sized>(
    config: &SimulatorConfig,
    mut services: Services,
    rng: &mut R,
) -> Result<Fleet, RunnerError> {
    let mut planner = FleetPlanner::new(services.store.clone(), config);
    planner.load(rng).await;

    let contents = match planner.mode() {
        Mode::Live => ContentSource::Store,
        Mode::Offline => ContentSource::Synthetic,
    };
    if planner.mode() != config.mode {
        info!("running offline topology on in-process locks");
        services.locks = Arc::new(InMemoryLocks::new());
    }

    planner.backfill_robots();
    if planner.robots().is_empty() {
        return Err(RunnerError::NoRobots);
    }
    planner.plan_routes(rng);

    let codes: Vec<RobotCode> = planner.robots().iter().map(|r| r.code.clone()).collect();
    let tokens = services.store.robot_tokens(&codes).await.or_empty();
    info!(robots = codes.len(), with_tokens = tokens.len(), "robot tokens resolved");

    let settings = WorkerSettings::from_config(config, contents);
    let mut handles = Vec::with_capacity(codes.len());
    for robot in planner.robots() {
        let route = planner.route_for(robot);
        let token = tokens
            .get(&robot.code)
            .cloned()
            .or_else(|| config.auth_token.clone());
        info!(robot = %robot.code, warehouse = %route.warehouse_code, locations = route.len(), "starting worker");

        let worker = RobotWorker::new(robot.clone(), route, settings.clone(), services.clone())
            .with_token(token)
            .with_rng(StdRng::seed_from_u64(rng.r#gen()));
        handles.push(worker.spawn());
    }

    Ok(Fleet {
        mode: planner.mode(),
        handles,
        grace: config.shutdown_grace,
    })
}
