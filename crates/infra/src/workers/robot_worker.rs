//! One simulated robot walking its route.
//!
//! Each cycle visits the next stop: lock the location, read what is on the
//! shelf, distort it per the discrepancy policy, post the scan and release the
//! lock. Status reports go out at most once per status interval. The battery
//! drains a little every cycle and the robot pauses to charge when it runs low.

use chrono::{DateTime, Utc};
use rand::SeedableRng;
use rand::rngs::StdRng;
use thiserror::Error;
use tokio::time::{Instant, sleep};
use tracing::{debug, error, info, warn};

use scanfleet_core::LockKey;
use scanfleet_fleet::{Battery, DepletionOutcome, Location, Robot, Route, ScanReport, StatusReport};

use super::{ContentSource, Services, StopSignal, WorkerHandle, WorkerSettings};
use crate::locks::LockSession;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("route is empty")]
    EmptyRoute,
}

/// What happened to the scan of one stop.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ScanOutcome {
    /// Scan sent and accepted.
    Posted,
    /// Scan sent and rejected (or never delivered).
    Failed,
    /// Another robot held the location.
    Skipped,
    /// The lock could not be opened or queried; nothing was sent.
    Unavailable,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct CycleReport {
    pub scan: ScanOutcome,
    /// `Some(accepted)` when a status report was due this cycle.
    pub status: Option<bool>,
    pub needs_charge: bool,
}

pub struct RobotWorker {
    robot: Robot,
    route: Route,
    token: Option<String>,
    settings: WorkerSettings,
    services: Services,
    battery: Battery,
    position: usize,
    last_data_sent: Option<DateTime<Utc>>,
    last_status_at: Option<Instant>,
    consecutive_failures: u32,
    rng: StdRng,
}

impl core::fmt::Debug for RobotWorker {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("RobotWorker")
            .field("robot", &self.robot.code)
            .field("route", &self.route.len())
            .field("position", &self.position)
            .field("battery", &self.battery.level())
            .finish_non_exhaustive()
    }
}

impl RobotWorker {
    pub fn new(robot: Robot, route: Route, settings: WorkerSettings, services: Services) -> Self {
        Self {
            robot,
            route,
            token: None,
            settings,
            services,
            battery: Battery::full(),
            position: 0,
            last_data_sent: None,
            last_status_at: None,
            consecutive_failures: 0,
            rng: StdRng::from_entropy(),
        }
    }

    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token.filter(|t| !t.is_empty());
        self
    }

    pub fn with_rng(mut self, rng: StdRng) -> Self {
        self.rng = rng;
        self
    }

    pub fn with_battery(mut self, battery: Battery) -> Self {
        self.battery = battery;
        self
    }

    pub fn robot(&self) -> &Robot {
        &self.robot
    }

    pub fn battery(&self) -> Battery {
        self.battery
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn last_data_sent(&self) -> Option<DateTime<Utc>> {
        self.last_data_sent
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    /// Run on the current tokio runtime until `stop` is raised.
    pub fn spawn(self) -> WorkerHandle {
        let stop = StopSignal::new();
        let robot = self.robot.code.clone();
        let join = tokio::spawn(self.run(stop.clone()));
        WorkerHandle {
            robot,
            stop,
            join: Some(join),
        }
    }

    /// Loop over the route until stopped. Returns at once for an empty route.
    pub async fn run(mut self, stop: StopSignal) {
        let robot = self.robot.code.clone();
        if self.route.is_empty() {
            info!(%robot, "empty route, stopping");
            return;
        }
        info!(%robot, locations = self.route.len(), "worker started");

        while !stop.is_stopped() {
            match self.cycle().await {
                Ok(report) => {
                    if report.needs_charge {
                        info!(%robot, battery = self.battery.level(), "low battery, charging");
                        sleep(self.settings.charge_pause()).await;
                        self.battery.recharge();
                    }
                    sleep(self.settings.jittered_interval(&mut self.rng)).await;
                }
                Err(e) => {
                    error!(%robot, error = %e, "cycle failed");
                    sleep(self.settings.error_pause()).await;
                }
            }
        }
        info!(%robot, "worker stopped");
    }

    /// One step along the route. Sleeping is left to the caller.
    pub async fn cycle(&mut self) -> Result<CycleReport, WorkerError> {
        let location = self
            .route
            .stop_at(self.position)
            .cloned()
            .ok_or(WorkerError::EmptyRoute)?;

        let scan = self.scan_and_post(&location).await;

        let status = if self.status_due() {
            self.last_status_at = Some(Instant::now());
            Some(self.post_status().await)
        } else {
            None
        };

        self.position = self.position.wrapping_add(1);
        let needs_charge = self.battery.deplete(&mut self.rng) == DepletionOutcome::NeedsCharge;

        Ok(CycleReport {
            scan,
            status,
            needs_charge,
        })
    }

    fn status_due(&self) -> bool {
        self.last_status_at
            .is_none_or(|at| at.elapsed() >= self.settings.status_interval)
    }

    async fn scan_and_post(&mut self, location: &Location) -> ScanOutcome {
        let key = LockKey::for_location(&location.id);
        let mut session = match self.services.locks.open_session().await {
            Ok(session) => session,
            Err(e) => {
                warn!(robot = %self.robot.code, location = %location.id, error = %e, "lock session unavailable, skipping scan");
                return ScanOutcome::Unavailable;
            }
        };
        let outcome = self.scan_locked(session.as_mut(), key, location).await;
        session.close().await;
        outcome
    }

    async fn scan_locked(
        &mut self,
        session: &mut dyn LockSession,
        key: LockKey,
        location: &Location,
    ) -> ScanOutcome {
        match session.try_acquire(key).await {
            Ok(true) => {}
            Ok(false) => {
                warn!(robot = %self.robot.code, location = %location.id, key = key.as_i64(), "location locked elsewhere, skipping");
                return ScanOutcome::Skipped;
            }
            Err(e) => {
                warn!(robot = %self.robot.code, location = %location.id, key = key.as_i64(), error = %e, "lock query failed, skipping scan");
                return ScanOutcome::Unavailable;
            }
        }

        let posted = self.post_scan(location).await;

        match session.release(key).await {
            Ok(true) => {}
            Ok(false) => warn!(robot = %self.robot.code, key = key.as_i64(), "unlock reported no lock held"),
            Err(e) => warn!(robot = %self.robot.code, key = key.as_i64(), error = %e, "unlock failed"),
        }

        if posted { ScanOutcome::Posted } else { ScanOutcome::Failed }
    }

    async fn post_scan(&mut self, location: &Location) -> bool {
        let products = match self.settings.contents {
            ContentSource::Store => self
                .services
                .store
                .location_contents(&location.id)
                .await
                .or_empty(),
            ContentSource::Synthetic => location.products.clone(),
        };
        let results = self.settings.discrepancy.scan(&products, &mut self.rng);
        self.resolve_token().await;

        let report = ScanReport::new(
            self.robot.code.clone(),
            Utc::now(),
            location,
            results,
            self.battery.percent(),
        );
        let posted = self
            .services
            .telemetry
            .post_scan(&report, self.token.as_deref())
            .await;
        self.record(posted);
        if posted {
            self.last_data_sent = Some(report.timestamp);
            debug!(
                robot = %self.robot.code,
                location = %report.next_checkpoint,
                results = report.scan_results.len(),
                "scan posted"
            );
        }
        posted
    }

    async fn post_status(&mut self) -> bool {
        let status = self
            .settings
            .status_mode
            .classify(self.battery.level(), self.consecutive_failures);
        let report = StatusReport {
            robot_id: self.robot.code.clone(),
            timestamp: Utc::now(),
            status,
            battery_level: self.battery.percent(),
            last_data_sent: self.last_data_sent,
        };
        let posted = self
            .services
            .telemetry
            .post_status(&report, self.token.as_deref())
            .await;
        self.record(posted);
        posted
    }

    fn record(&mut self, posted: bool) {
        if posted {
            self.consecutive_failures = 0;
        } else {
            self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        }
    }

    /// Ask the store once for a token when none was handed out at startup.
    async fn resolve_token(&mut self) {
        if self.token.is_some() {
            return;
        }
        if let Some(token) = self
            .services
            .store
            .robot_token(&self.robot.code)
            .await
            .rows()
            .filter(|t| !t.is_empty())
        {
            info!(robot = %self.robot.code, "token resolved from store");
            self.token = Some(token);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use scanfleet_core::{LocationId, RobotCode};
    use scanfleet_fleet::{Coordinate, RobotStatus, StatusMode};
    use scanfleet_inventory::{DiscrepancyPolicy, ProductSnapshot, StockStatus};

    use async_trait::async_trait;

    use crate::locks::{InMemoryLocks, LockCoordinator, LockError};
    use crate::store::InMemoryWarehouseStore;
    use crate::telemetry::RecordingTelemetry;

    struct Rig {
        store: InMemoryWarehouseStore,
        locks: InMemoryLocks,
        telemetry: RecordingTelemetry,
    }

    impl Rig {
        fn new() -> Self {
            Self {
                store: InMemoryWarehouseStore::new(),
                locks: InMemoryLocks::new(),
                telemetry: RecordingTelemetry::new(),
            }
        }

        fn services(&self) -> Services {
            Services {
                store: Arc::new(self.store.clone()),
                locks: Arc::new(self.locks.clone()),
                telemetry: Arc::new(self.telemetry.clone()),
            }
        }

        fn worker(&self, route: Vec<Location>, contents: ContentSource) -> RobotWorker {
            let settings = WorkerSettings {
                update_interval: Duration::from_millis(2),
                status_interval: Duration::from_secs(3600),
                status_mode: StatusMode::Battery,
                discrepancy: DiscrepancyPolicy::truthful(),
                contents,
            };
            RobotWorker::new(
                Robot::new(RobotCode::new("RB-0001"), Some("WH-1".into())),
                Route::new("WH-1", route),
                settings,
                self.services(),
            )
            .with_rng(StdRng::seed_from_u64(21))
        }
    }

    /// Coordinator whose sessions never open, as during a database outage.
    struct UnreachableLocks;

    #[async_trait]
    impl LockCoordinator for UnreachableLocks {
        async fn open_session(&self) -> Result<Box<dyn LockSession>, LockError> {
            Err(LockError::Closed)
        }
    }

    fn stocked(id: &str, quantity: i64) -> Location {
        let mut location = Location::new(LocationId::text(id), Coordinate { zone: 1, row: 2, shelf: 3 });
        location.products.push(ProductSnapshot::new("SKU-0007", "Product 7", quantity));
        location
    }

    #[tokio::test]
    async fn posts_truthful_scan_and_first_status() {
        let rig = Rig::new();
        let mut worker = rig.worker(vec![stocked("WH-1-1", 10)], ContentSource::Synthetic);

        let report = worker.cycle().await.unwrap();
        assert_eq!(report.scan, ScanOutcome::Posted);
        assert_eq!(report.status, Some(true));

        let scans = rig.telemetry.scans();
        assert_eq!(scans.len(), 1);
        assert_eq!(scans[0].next_checkpoint, "WH-1-1");
        assert_eq!(scans[0].scan_results[0].quantity, 10);
        assert_eq!(scans[0].scan_results[0].status_code, StockStatus::LowStock);
        assert_eq!(scans[0].battery_level, 100);

        let statuses = rig.telemetry.statuses();
        assert_eq!(statuses.len(), 1);
        assert_eq!(statuses[0].status, RobotStatus::Working);
        assert_eq!(statuses[0].last_data_sent, Some(scans[0].timestamp));
        assert_eq!(worker.last_data_sent(), Some(scans[0].timestamp));
        assert_eq!(rig.locks.held(), 0);

        // Status interval not yet elapsed.
        let report = worker.cycle().await.unwrap();
        assert_eq!(report.status, None);
        assert_eq!(rig.telemetry.statuses().len(), 1);
    }

    #[tokio::test]
    async fn contended_location_is_skipped() {
        let rig = Rig::new();
        let location = stocked("WH-1-1", 30);
        let key = LockKey::for_location(&location.id);
        let mut holder = rig.locks.open_session().await.unwrap();
        assert!(holder.try_acquire(key).await.unwrap());

        let mut worker = rig.worker(vec![location], ContentSource::Synthetic);
        let report = worker.cycle().await.unwrap();

        assert_eq!(report.scan, ScanOutcome::Skipped);
        assert!(rig.telemetry.scans().is_empty());
        assert_eq!(rig.locks.held(), 1);

        holder.release(key).await.unwrap();
        assert_eq!(worker.cycle().await.unwrap().scan, ScanOutcome::Posted);
    }

    #[tokio::test]
    async fn failed_post_still_releases_the_lock() {
        let rig = Rig::new();
        rig.telemetry.set_failing(true);
        let mut worker = rig.worker(vec![stocked("WH-1-1", 30)], ContentSource::Synthetic);

        let report = worker.cycle().await.unwrap();
        assert_eq!(report.scan, ScanOutcome::Failed);
        assert_eq!(report.status, Some(false));
        assert_eq!(rig.locks.held(), 0);
        assert_eq!(worker.last_data_sent(), None);
        assert_eq!(worker.consecutive_failures(), 2);
    }

    #[tokio::test]
    async fn connectivity_mode_reports_failures() {
        let rig = Rig::new();
        rig.telemetry.set_failing(true);
        let location = stocked("WH-1-1", 30);
        let key = LockKey::for_location(&location.id);
        let mut worker = rig.worker(vec![location], ContentSource::Synthetic);
        worker.settings.status_mode = StatusMode::Connectivity;
        worker.settings.status_interval = Duration::ZERO;

        // Two cycles with a failing scan and a failing status each.
        for _ in 0..2 {
            worker.cycle().await.unwrap();
        }
        assert_eq!(worker.consecutive_failures(), 4);

        // Keep the scan out of the way so the next status sees the streak.
        let mut holder = rig.locks.open_session().await.unwrap();
        assert!(holder.try_acquire(key).await.unwrap());
        rig.telemetry.set_failing(false);

        let report = worker.cycle().await.unwrap();
        assert_eq!(report.scan, ScanOutcome::Skipped);
        assert_eq!(report.status, Some(true));
        let statuses = rig.telemetry.statuses();
        assert_eq!(statuses.len(), 1);
        assert_eq!(statuses[0].status, RobotStatus::Offline);
        assert_eq!(worker.consecutive_failures(), 0);
    }

    #[tokio::test]
    async fn lock_outage_still_reports_status_and_moves_on() {
        let rig = Rig::new();
        let mut worker = rig.worker(
            vec![stocked("WH-1-1", 30), stocked("WH-1-2", 30)],
            ContentSource::Synthetic,
        );
        worker.services.locks = Arc::new(UnreachableLocks);
        worker.settings.status_mode = StatusMode::Connectivity;
        worker.settings.status_interval = Duration::ZERO;

        for _ in 0..5 {
            let report = worker.cycle().await.unwrap();
            assert_eq!(report.scan, ScanOutcome::Unavailable);
            assert_eq!(report.status, Some(true));
        }

        assert!(rig.telemetry.scans().is_empty());
        let statuses = rig.telemetry.statuses();
        assert_eq!(statuses.len(), 5);
        assert!(statuses.iter().all(|s| s.status == RobotStatus::Connected));
        assert_eq!(worker.position, 5);
        assert!(worker.battery().level() < 100.0);
        assert_eq!(worker.consecutive_failures(), 0);
    }

    #[tokio::test]
    async fn store_contents_and_lazy_token() {
        let rig = Rig::new();
        let robot = RobotCode::new("RB-0001");
        let store = rig
            .store
            .clone()
            .with_contents(55i64, vec![ProductSnapshot::new("SKU-0042", "Bolts", 3)])
            .with_token(robot, "robot-token");
        let location = Location::new(55i64, Coordinate { zone: 1, row: 1, shelf: 1 });
        let mut worker = rig.worker(vec![location], ContentSource::Store);
        assert_eq!(worker.token(), None);

        worker.cycle().await.unwrap();
        worker.cycle().await.unwrap();

        let scans = rig.telemetry.scans();
        assert_eq!(scans[0].scan_results[0].product_code, "SKU-0042");
        assert_eq!(scans[0].scan_results[0].status_code, StockStatus::Critical);
        assert_eq!(scans[0].next_checkpoint, "55");
        assert_eq!(
            rig.telemetry.scan_tokens(),
            [Some("robot-token".to_string()), Some("robot-token".to_string())]
        );
        assert_eq!(store.token_lookups(), 1);
    }

    #[tokio::test]
    async fn startup_token_skips_the_lookup() {
        let rig = Rig::new();
        let mut worker = rig
            .worker(vec![stocked("WH-1-1", 30)], ContentSource::Synthetic)
            .with_token(Some("global".into()));

        worker.cycle().await.unwrap();
        assert_eq!(rig.store.token_lookups(), 0);
        assert_eq!(rig.telemetry.scan_tokens(), [Some("global".to_string())]);
    }

    #[tokio::test]
    async fn low_battery_asks_for_a_charge() {
        let rig = Rig::new();
        let mut worker = rig
            .worker(vec![stocked("WH-1-1", 30)], ContentSource::Synthetic)
            .with_battery(Battery::at(18.1));

        let report = worker.cycle().await.unwrap();
        assert!(report.needs_charge);
        assert!(worker.battery().level() < 18.0);
    }

    #[tokio::test(start_paused = true)]
    async fn charges_to_full_after_twice_the_update_interval() {
        let rig = Rig::new();
        let mut worker = rig
            .worker(vec![stocked("WH-1-1", 30)], ContentSource::Synthetic)
            .with_battery(Battery::at(18.1));
        worker.settings.update_interval = Duration::from_secs(1);
        let handle = worker.spawn();

        // First scan at t=0, then a 2s charge and a 0.85..1.25s pause.
        tokio::time::sleep(Duration::from_millis(2800)).await;
        let scans = rig.telemetry.scans();
        assert_eq!(scans.len(), 1);
        assert_eq!(scans[0].battery_level, 18);

        tokio::time::sleep(Duration::from_millis(600)).await;
        let scans = rig.telemetry.scans();
        assert_eq!(scans.len(), 2);
        assert_eq!(scans[1].battery_level, 100);

        handle.stop();
        tokio::time::timeout(Duration::from_secs(5), handle.join())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn route_wraps_around() {
        let rig = Rig::new();
        let mut worker = rig.worker(
            vec![stocked("WH-1-1", 30), stocked("WH-1-2", 30)],
            ContentSource::Synthetic,
        );
        for _ in 0..3 {
            worker.cycle().await.unwrap();
        }
        let visited: Vec<String> = rig
            .telemetry
            .scans()
            .into_iter()
            .map(|s| s.next_checkpoint)
            .collect();
        assert_eq!(visited, ["WH-1-1", "WH-1-2", "WH-1-1"]);
    }

    #[tokio::test]
    async fn empty_route_stops_without_telemetry() {
        let rig = Rig::new();
        let handle = rig.worker(Vec::new(), ContentSource::Synthetic).spawn();

        tokio::time::timeout(Duration::from_secs(1), handle.join())
            .await
            .unwrap();
        assert!(rig.telemetry.scans().is_empty());
        assert!(rig.telemetry.statuses().is_empty());
    }

    #[tokio::test]
    async fn runs_until_stopped() {
        let rig = Rig::new();
        let handle = rig
            .worker(vec![stocked("WH-1-1", 30), stocked("WH-1-2", 4)], ContentSource::Synthetic)
            .spawn();

        tokio::time::sleep(Duration::from_millis(50)).await;
        tokio::time::timeout(Duration::from_secs(1), handle.shutdown())
            .await
            .unwrap();

        assert!(!rig.telemetry.scans().is_empty());
        assert_eq!(rig.locks.held(), 0);
    }
}
