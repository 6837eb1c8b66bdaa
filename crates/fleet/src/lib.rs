//! Fleet domain: warehouse topology, routes, and robot runtime state.
//!
//! Pure logic only. Loading topology from the store and driving robots in
//! time live in `scanfleet-infra`.

pub mod battery;
pub mod route;
pub mod status;
pub mod telemetry;
pub mod topology;

pub use battery::{Battery, DepletionOutcome};
pub use route::{Route, RoutePlan, UNKNOWN_WAREHOUSE, plan_routes};
pub use status::{RobotStatus, StatusMode};
pub use telemetry::{ScanReport, ShelfPosition, StatusReport};
pub use topology::{
    Coordinate, GridBounds, Location, OFFLINE_WAREHOUSE_CODE, OfflineFleet, Robot, Warehouse,
    fabricate_grid,
    synthesize_offline,
};
