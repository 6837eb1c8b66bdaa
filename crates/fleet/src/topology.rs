//! Warehouses, locations and robots, plus the synthetic topologies used when
//! the store has nothing to offer.

use rand::Rng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

use scanfleet_core::{Entity, LocationId, RobotCode, ValueObject};
use scanfleet_inventory::ProductSnapshot;

/// Code of the warehouse synthesized in offline mode.
pub const OFFLINE_WAREHOUSE_CODE: &str = "WH-EMU-1";
const OFFLINE_WAREHOUSE_ID: i64 = 9999;
const OFFLINE_ROBOT_SERIES: &str = "EMU";
const OFFLINE_DEFAULT_ROBOTS: usize = 4;
const OFFLINE_SKU_COUNT: usize = 100;
const OFFLINE_STOCKED_SHARE: f64 = 0.5;

/// Capacity bounds of a warehouse grid.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridBounds {
    pub zones: u32,
    pub rows: u32,
    pub shelves: u32,
}

impl GridBounds {
    pub const fn new(zones: u32, rows: u32, shelves: u32) -> Self {
        Self { zones, rows, shelves }
    }

    /// Bounds assumed for a store warehouse whose columns are missing.
    pub fn from_store(zones: Option<i32>, rows: Option<i32>, shelves: Option<i32>) -> Self {
        let pick = |v: Option<i32>, default: u32| {
            v.and_then(|n| u32::try_from(n).ok()).unwrap_or(default)
        };
        Self::new(pick(zones, 1), pick(rows, 5), pick(shelves, 10))
    }

    pub fn capacity(&self) -> usize {
        self.zones as usize * self.rows as usize * self.shelves as usize
    }
}

impl ValueObject for GridBounds {}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Warehouse {
    pub id: i64,
    pub code: Option<String>,
    pub name: String,
    pub bounds: GridBounds,
}

impl Warehouse {
    /// Key used to group robots and locations: the code, or the id as text.
    pub fn key(&self) -> String {
        match self.code.as_deref().map(str::trim) {
            Some(code) if !code.is_empty() => code.to_string(),
            _ => self.id.to_string(),
        }
    }
}

impl Entity for Warehouse {
    type Id = i64;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

/// Position of a shelf inside a warehouse.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Coordinate {
    pub zone: u32,
    pub row: u32,
    pub shelf: u32,
}

impl ValueObject for Coordinate {}

impl core::fmt::Display for Coordinate {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}-{}-{}", self.zone, self.row, self.shelf)
    }
}

/// A shelf location: the unit of mutual exclusion between robots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub id: LocationId,
    pub coordinate: Coordinate,
    /// Synthetic contents; always empty for store-backed locations, whose
    /// contents are read from the store at scan time.
    pub products: Vec<ProductSnapshot>,
}

impl Location {
    pub fn new(id: impl Into<LocationId>, coordinate: Coordinate) -> Self {
        Self {
            id: id.into(),
            coordinate,
            products: Vec::new(),
        }
    }

    /// Value reported as `nextCheckpoint`.
    pub fn checkpoint(&self) -> String {
        if self.id.is_blank() {
            self.coordinate.to_string()
        } else {
            self.id.to_string()
        }
    }
}

impl Entity for Location {
    type Id = LocationId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Robot {
    pub code: RobotCode,
    pub warehouse_code: Option<String>,
}

impl Robot {
    pub fn new(code: RobotCode, warehouse_code: Option<String>) -> Self {
        Self {
            code,
            warehouse_code,
        }
    }
}

impl Entity for Robot {
    type Id = RobotCode;

    fn id(&self) -> &Self::Id {
        &self.code
    }
}

/// Full `zones × rows × shelves` grid with ids `"{key}-{n}"`, n from 1,
/// iterating zone, then row, then shelf.
pub fn fabricate_grid(warehouse_key: &str, bounds: GridBounds) -> Vec<Location> {
    let mut locations = Vec::with_capacity(bounds.capacity());
    let mut n = 1usize;
    for zone in 1..=bounds.zones {
        for row in 1..=bounds.rows {
            for shelf in 1..=bounds.shelves {
                locations.push(Location::new(
                    LocationId::text(format!("{warehouse_key}-{n}")),
                    Coordinate { zone, row, shelf },
                ));
                n += 1;
            }
        }
    }
    locations
}

/// Topology used when running without a store.
#[derive(Debug, Clone, PartialEq)]
pub struct OfflineFleet {
    pub warehouse: Warehouse,
    pub locations: Vec<Location>,
    pub robots: Vec<Robot>,
}

/// One 3 × 8 × 6 warehouse, about half its shelves stocked with a single
/// product, and `robots_count` robots (4 when zero).
pub fn synthesize_offline<R: Rng + ?Sized>(robots_count: usize, rng: &mut R) -> OfflineFleet {
    let warehouse = Warehouse {
        id: OFFLINE_WAREHOUSE_ID,
        code: Some(OFFLINE_WAREHOUSE_CODE.to_string()),
        name: "EMULATED".to_string(),
        bounds: GridBounds::new(3, 8, 6),
    };
    let skus: Vec<String> = (1..=OFFLINE_SKU_COUNT).map(|i| format!("SKU-{i:04}")).collect();

    let mut locations = fabricate_grid(OFFLINE_WAREHOUSE_CODE, warehouse.bounds);
    for (i, location) in locations.iter_mut().enumerate() {
        if rng.gen_bool(OFFLINE_STOCKED_SHARE) {
            if let Some(sku) = skus.choose(rng) {
                location.products.push(ProductSnapshot::new(
                    sku.clone(),
                    format!("Product {i}"),
                    rng.gen_range(1..=50),
                ));
            }
        }
    }

    let count = if robots_count == 0 {
        OFFLINE_DEFAULT_ROBOTS
    } else {
        robots_count
    };
    let robots = (1..=count)
        .map(|n| {
            Robot::new(
                RobotCode::numbered(OFFLINE_ROBOT_SERIES, n),
                Some(OFFLINE_WAREHOUSE_CODE.to_string()),
            )
        })
        .collect();

    OfflineFleet {
        warehouse,
        locations,
        robots,
    }
}
