//! In-memory warehouse store for offline runs and tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;

use scanfleet_core::{LocationId, RobotCode, WarehouseRef};
use scanfleet_fleet::{Location, Robot, Warehouse};
use scanfleet_inventory::ProductSnapshot;

use super::{Fetch, WarehouseStore};

#[derive(Debug, Default)]
struct Tables {
    warehouses: Vec<Warehouse>,
    locations: HashMap<i64, Vec<Location>>,
    robots: Vec<Robot>,
    contents: HashMap<LocationId, Vec<ProductSnapshot>>,
    tokens: HashMap<RobotCode, String>,
}

/// In-memory warehouse store for offline runs and tests.
///
/// `set_failing(true)` makes every read come back as [`Fetch::Failed`].
#[derive(Debug, Default, Clone)]
pub struct InMemoryWarehouseStore {
    tables: Arc<RwLock<Tables>>,
    failing: Arc<AtomicBool>,
    token_lookups: Arc<AtomicUsize>,
}

impl InMemoryWarehouseStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Tables> {
        self.tables.write().unwrap_or_else(|e| e.into_inner())
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Tables> {
        self.tables.read().unwrap_or_else(|e| e.into_inner())
    }

    pub fn with_warehouse(self, warehouse: Warehouse, locations: Vec<Location>) -> Self {
        {
            let mut tables = self.write();
            tables.locations.insert(warehouse.id, locations);
            tables.warehouses.push(warehouse);
        }
        self
    }

    pub fn with_robot(self, robot: Robot) -> Self {
        self.write().robots.push(robot);
        self
    }

    pub fn with_contents(self, location: impl Into<LocationId>, products: Vec<ProductSnapshot>) -> Self {
        self.write().contents.insert(location.into(), products);
        self
    }

    pub fn with_token(self, robot: RobotCode, token: impl Into<String>) -> Self {
        self.write().tokens.insert(robot, token.into());
        self
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Number of single-robot token lookups served so far.
    pub fn token_lookups(&self) -> usize {
        self.token_lookups.load(Ordering::SeqCst)
    }

    fn guard<T>(&self, op: &str) -> Option<Fetch<T>> {
        self.failing
            .load(Ordering::SeqCst)
            .then(|| Fetch::Failed(format!("{op}: store unavailable")))
    }
}

#[async_trait]
impl WarehouseStore for InMemoryWarehouseStore {
    async fn warehouses(&self) -> Fetch<Vec<Warehouse>> {
        if let Some(failed) = self.guard("warehouses") {
            return failed;
        }
        Fetch::from_vec(self.read().warehouses.clone())
    }

    async fn robots(&self) -> Fetch<Vec<Robot>> {
        if let Some(failed) = self.guard("robots") {
            return failed;
        }
        Fetch::from_vec(self.read().robots.clone())
    }

    async fn locations(&self, warehouse: &WarehouseRef) -> Fetch<Vec<Location>> {
        if let Some(failed) = self.guard("locations") {
            return failed;
        }
        let tables = self.read();
        let id = match warehouse {
            WarehouseRef::Id(id) => Some(*id),
            WarehouseRef::Code(code) => tables
                .warehouses
                .iter()
                .find(|w| w.code.as_deref() == Some(code.as_str()))
                .map(|w| w.id),
        };
        Fetch::from_vec(
            id.and_then(|id| tables.locations.get(&id).cloned())
                .unwrap_or_default(),
        )
    }

    async fn location_contents(&self, location: &LocationId) -> Fetch<Vec<ProductSnapshot>> {
        if let Some(failed) = self.guard("location_contents") {
            return failed;
        }
        Fetch::from_vec(self.read().contents.get(location).cloned().unwrap_or_default())
    }

    async fn robot_token(&self, robot: &RobotCode) -> Fetch<String> {
        self.token_lookups.fetch_add(1, Ordering::SeqCst);
        if let Some(failed) = self.guard("robot_token") {
            return failed;
        }
        Fetch::from(self.read().tokens.get(robot).cloned())
    }

    async fn robot_tokens(&self, robots: &[RobotCode]) -> Fetch<HashMap<RobotCode, String>> {
        if let Some(failed) = self.guard("robot_tokens") {
            return failed;
        }
        let tables = self.read();
        Fetch::from_map(
            robots
                .iter()
                .filter_map(|r| tables.tokens.get(r).map(|t| (r.clone(), t.clone())))
                .collect(),
        )
    }
}
