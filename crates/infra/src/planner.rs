//! Topology loading and route planning.

use rand::Rng;
use tracing::{info, warn};

use scanfleet_core::{RobotCode, WarehouseRef, distinct_by_id};
use scanfleet_fleet::{
    Location, Robot, Route, RoutePlan, Warehouse, fabricate_grid, plan_routes, synthesize_offline,
};

use crate::config::{Mode, SimulatorConfig};
use crate::store::{Fetch, WarehouseStore};

const BACKFILL_SERIES: &str = "FAKE";
const BACKFILL_WAREHOUSE: &str = "WH-1";

/// Owns the topology and hands each robot its route.
///
/// The mode starts as configured and switches to [`Mode::Offline`] when a
/// live load finds no warehouses.
#[derive(Debug)]
pub struct FleetPlanner<S> {
    store: S,
    mode: Mode,
    robots_count: usize,
    warehouses: Vec<Warehouse>,
    locations: Vec<(String, Vec<Location>)>,
    robots: Vec<Robot>,
    plan: RoutePlan,
}

impl<S: WarehouseStore> FleetPlanner<S> {
    pub fn new(store: S, config: &SimulatorConfig) -> Self {
        Self {
            store,
            mode: config.mode,
            robots_count: config.robots_count,
            warehouses: Vec::new(),
            locations: Vec::new(),
            robots: Vec::new(),
            plan: RoutePlan::default(),
        }
    }

    /// Effective mode after [`load`](Self::load).
    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn warehouses(&self) -> &[Warehouse] {
        &self.warehouses
    }

    /// `(warehouse key, locations)` in load order.
    pub fn locations(&self) -> &[(String, Vec<Location>)] {
        &self.locations
    }

    pub fn robots(&self) -> &[Robot] {
        &self.robots
    }

    pub fn plan(&self) -> &RoutePlan {
        &self.plan
    }

    pub async fn load<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        if self.mode == Mode::Live {
            match self.store.warehouses().await {
                Fetch::Rows(warehouses) => self.load_live(warehouses).await,
                Fetch::Empty => {
                    warn!("no warehouses in store, switching to offline");
                    self.mode = Mode::Offline;
                }
                Fetch::Failed(reason) => {
                    warn!(error = %reason, "warehouse load failed, switching to offline");
                    self.mode = Mode::Offline;
                }
            }
        }
        if self.mode == Mode::Offline {
            self.load_offline(rng);
        }

        info!(
            mode = %self.mode,
            warehouses = self.warehouses.len(),
            locations = self.locations.iter().map(|(_, l)| l.len()).sum::<usize>(),
            robots = self.robots.len(),
            "topology loaded"
        );
    }

    async fn load_live(&mut self, warehouses: Vec<Warehouse>) {
        for warehouse in warehouses {
            let key = warehouse.key();
            if self.locations.iter().any(|(k, _)| *k == key) {
                continue;
            }
            let mut locations = self
                .store
                .locations(&WarehouseRef::from_key(&key))
                .await
                .or_empty();
            if locations.is_empty() {
                locations = fabricate_grid(&key, warehouse.bounds);
                info!(warehouse = %key, locations = locations.len(), "fabricated location grid");
            }
            self.locations.push((key, locations));
            self.warehouses.push(warehouse);
        }

        self.robots = distinct_by_id(self.store.robots().await.or_empty());
        if self.robots.is_empty() {
            info!("no robots in store");
        }
        for robot in &self.robots {
            if let Err(e) = robot.code.as_str().parse::<RobotCode>() {
                warn!(error = %e, "robot code outside the fleet pattern, the backend may reject it");
            }
        }
    }

    fn load_offline<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        let fleet = synthesize_offline(self.robots_count, rng);
        self.locations = vec![(fleet.warehouse.key(), fleet.locations)];
        self.warehouses = vec![fleet.warehouse];
        self.robots = fleet.robots;
    }

    /// Create `RB-FAKE-nnnn` robots round-robin over the loaded warehouses
    /// when a live load found none. Returns how many were added.
    pub fn backfill_robots(&mut self) -> usize {
        if self.mode != Mode::Live || !self.robots.is_empty() || self.robots_count == 0 {
            return 0;
        }
        let keys: Vec<String> = if self.locations.is_empty() {
            vec![BACKFILL_WAREHOUSE.to_string()]
        } else {
            self.locations.iter().map(|(k, _)| k.clone()).collect()
        };
        self.robots = (0..self.robots_count)
            .map(|i| {
                Robot::new(
                    RobotCode::numbered(BACKFILL_SERIES, i + 1),
                    Some(keys[i % keys.len()].clone()),
                )
            })
            .collect();
        info!(robots = self.robots.len(), "backfilled placeholder robots");
        self.robots.len()
    }

    pub fn plan_routes<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        self.plan = plan_routes(&self.robots, &self.locations, rng);
        for (robot, route) in self.plan.iter() {
            info!(robot = %robot, warehouse = %route.warehouse_code, locations = route.len(), "route assigned");
        }
    }

    /// The robot's planned route, or a copy of its warehouse's full location
    /// list when it has none.
    pub fn route_for(&self, robot: &Robot) -> Route {
        if let Some(route) = self.plan.get(&robot.code) {
            return route.clone();
        }
        let key = robot
            .warehouse_code
            .clone()
            .or_else(|| self.locations.first().map(|(k, _)| k.clone()))
            .unwrap_or_default();
        let stops = self
            .locations
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, l)| l.clone())
            .unwrap_or_default();
        Route::new(key, stops)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use std::collections::HashSet;

    use scanfleet_core::LocationId;
    use scanfleet_fleet::{Coordinate, GridBounds, OFFLINE_WAREHOUSE_CODE};

    use crate::store::InMemoryWarehouseStore;

    fn config(mode: Mode, robots_count: usize) -> SimulatorConfig {
        SimulatorConfig {
            mode,
            robots_count,
            ..SimulatorConfig::default()
        }
    }

    fn warehouse(id: i64, code: &str, bounds: GridBounds) -> Warehouse {
        Warehouse {
            id,
            code: Some(code.to_string()),
            name: code.to_string(),
            bounds,
        }
    }

    #[tokio::test]
    async fn empty_store_falls_back_to_offline() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut planner = FleetPlanner::new(InMemoryWarehouseStore::new(), &config(Mode::Live, 4));
        planner.load(&mut rng).await;

        assert_eq!(planner.mode(), Mode::Offline);
        assert_eq!(planner.locations().len(), 1);
        assert_eq!(planner.locations()[0].0, OFFLINE_WAREHOUSE_CODE);
        assert_eq!(planner.locations()[0].1.len(), 144);
        assert_eq!(planner.backfill_robots(), 0);

        planner.plan_routes(&mut rng);
        let codes: Vec<&str> = planner.robots().iter().map(|r| r.code.as_str()).collect();
        assert_eq!(codes, ["RB-EMU-0001", "RB-EMU-0002", "RB-EMU-0003", "RB-EMU-0004"]);
        for robot in planner.robots() {
            assert_eq!(planner.route_for(robot).len(), 36);
        }
    }

    #[tokio::test]
    async fn failing_store_falls_back_to_offline() {
        let store = InMemoryWarehouseStore::new();
        store.set_failing(true);
        let mut planner = FleetPlanner::new(store, &config(Mode::Live, 0));
        planner.load(&mut StdRng::seed_from_u64(2)).await;

        assert_eq!(planner.mode(), Mode::Offline);
        assert_eq!(planner.robots().len(), 4);
    }

    #[tokio::test]
    async fn warehouse_without_locations_gets_a_fabricated_grid() {
        let store = InMemoryWarehouseStore::new()
            .with_warehouse(warehouse(3, "WH-3", GridBounds::new(2, 2, 3)), Vec::new())
            .with_warehouse(
                warehouse(4, "WH-4", GridBounds::new(1, 1, 1)),
                vec![Location::new(41i64, Coordinate { zone: 1, row: 1, shelf: 1 })],
            );
        let mut planner = FleetPlanner::new(store, &config(Mode::Live, 0));
        planner.load(&mut StdRng::seed_from_u64(3)).await;

        assert_eq!(planner.mode(), Mode::Live);
        let (key, grid) = &planner.locations()[0];
        assert_eq!(key, "WH-3");
        assert_eq!(grid.len(), 12);
        assert_eq!(grid[0].id, LocationId::text("WH-3-1"));
        assert_eq!(grid[11].id, LocationId::text("WH-3-12"));
        assert_eq!(planner.locations()[1].1[0].id, LocationId::Numeric(41));
    }

    #[tokio::test]
    async fn backfill_assigns_round_robin() {
        let store = InMemoryWarehouseStore::new()
            .with_warehouse(warehouse(1, "WH-A", GridBounds::new(1, 2, 2)), Vec::new())
            .with_warehouse(warehouse(2, "WH-B", GridBounds::new(1, 2, 2)), Vec::new());
        let mut planner = FleetPlanner::new(store, &config(Mode::Live, 3));
        let mut rng = StdRng::seed_from_u64(4);
        planner.load(&mut rng).await;

        assert_eq!(planner.backfill_robots(), 3);
        let assigned: Vec<(&str, Option<&str>)> = planner
            .robots()
            .iter()
            .map(|r| (r.code.as_str(), r.warehouse_code.as_deref()))
            .collect();
        assert_eq!(
            assigned,
            [
                ("RB-FAKE-0001", Some("WH-A")),
                ("RB-FAKE-0002", Some("WH-B")),
                ("RB-FAKE-0003", Some("WH-A")),
            ]
        );

        planner.plan_routes(&mut rng);
        let a: HashSet<LocationId> = planner
            .robots()
            .iter()
            .filter(|r| r.warehouse_code.as_deref() == Some("WH-A"))
            .flat_map(|r| planner.route_for(r).stops().iter().map(|l| l.id.clone()).collect::<Vec<_>>())
            .collect();
        assert_eq!(a.len(), 4);
    }

    #[tokio::test]
    async fn duplicate_store_robots_get_one_worker() {
        let store = InMemoryWarehouseStore::new()
            .with_warehouse(warehouse(1, "WH-A", GridBounds::new(1, 1, 2)), Vec::new())
            .with_robot(Robot::new(RobotCode::new("RB-0001"), Some("WH-A".into())))
            .with_robot(Robot::new(RobotCode::new("RB-0001"), None));
        let mut planner = FleetPlanner::new(store, &config(Mode::Live, 0));
        planner.load(&mut StdRng::seed_from_u64(7)).await;

        assert_eq!(planner.robots().len(), 1);
        assert_eq!(planner.robots()[0].warehouse_code.as_deref(), Some("WH-A"));
    }

    #[tokio::test]
    async fn off_pattern_robot_codes_are_kept() {
        let store = InMemoryWarehouseStore::new()
            .with_warehouse(warehouse(1, "WH-A", GridBounds::new(1, 1, 2)), Vec::new())
            .with_robot(Robot::new(RobotCode::new("forklift-7"), Some("WH-A".into())));
        let mut planner = FleetPlanner::new(store, &config(Mode::Live, 0));
        planner.load(&mut StdRng::seed_from_u64(8)).await;

        assert_eq!(planner.robots().len(), 1);
        assert!(!planner.robots()[0].code.matches_fleet_pattern());
        assert_eq!(planner.backfill_robots(), 0);
    }

    #[tokio::test]
    async fn store_robots_are_not_backfilled() {
        let store = InMemoryWarehouseStore::new()
            .with_warehouse(warehouse(1, "WH-A", GridBounds::new(1, 1, 2)), Vec::new())
            .with_robot(Robot::new(RobotCode::new("RB-0001"), None));
        let mut planner = FleetPlanner::new(store, &config(Mode::Live, 5));
        planner.load(&mut StdRng::seed_from_u64(5)).await;

        assert_eq!(planner.backfill_robots(), 0);
        assert_eq!(planner.robots().len(), 1);
    }

    #[tokio::test]
    async fn unplanned_robot_gets_its_warehouse_locations() {
        let store = InMemoryWarehouseStore::new()
            .with_warehouse(warehouse(1, "WH-A", GridBounds::new(1, 2, 5)), Vec::new());
        let mut planner = FleetPlanner::new(store, &config(Mode::Live, 0));
        let mut rng = StdRng::seed_from_u64(6);
        planner.load(&mut rng).await;
        planner.plan_routes(&mut rng);

        let stranger = Robot::new(RobotCode::new("RB-9999"), None);
        let route = planner.route_for(&stranger);
        assert_eq!(route.warehouse_code, "WH-A");
        assert_eq!(route.len(), 10);
    }
}
