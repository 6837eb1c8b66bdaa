//! Route planning.
//!
//! Robots are grouped by warehouse. Inside a group of `n` robots, the robot at
//! index `i` receives every location whose index is `i` modulo `n`, so the
//! group covers the warehouse exactly once. Each route is then shuffled.

use std::collections::HashMap;

use rand::Rng;
use rand::seq::SliceRandom;

use scanfleet_core::RobotCode;

use crate::topology::{Location, Robot};

/// Bucket for robots whose warehouse cannot be determined.
pub const UNKNOWN_WAREHOUSE: &str = "UNKNOWN";

/// Ordered, endlessly revisited sequence of locations for one robot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    pub warehouse_code: String,
    stops: Vec<Location>,
}

impl Route {
    pub fn new(warehouse_code: impl Into<String>, stops: Vec<Location>) -> Self {
        Self {
            warehouse_code: warehouse_code.into(),
            stops,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.stops.is_empty()
    }

    pub fn len(&self) -> usize {
        self.stops.len()
    }

    pub fn stops(&self) -> &[Location] {
        &self.stops
    }

    /// Stop visited at the given cycle position (wraps around).
    pub fn stop_at(&self, position: usize) -> Option<&Location> {
        if self.stops.is_empty() {
            None
        } else {
            self.stops.get(position % self.stops.len())
        }
    }
}

/// Routes for one planning cycle, keyed by robot.
#[derive(Debug, Clone, Default)]
pub struct RoutePlan {
    routes: HashMap<RobotCode, Route>,
}

impl RoutePlan {
    pub fn get(&self, robot: &RobotCode) -> Option<&Route> {
        self.routes.get(robot)
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&RobotCode, &Route)> {
        self.routes.iter()
    }
}

/// Partition each warehouse's locations across its robots.
///
/// `warehouses` is `(key, locations)` in load order. Robots without a
/// warehouse join the only warehouse if there is exactly one, otherwise the
/// [`UNKNOWN_WAREHOUSE`] bucket. A group whose warehouse has no locations
/// borrows the first warehouse's locations.
pub fn plan_routes<R: Rng + ?Sized>(
    robots: &[Robot],
    warehouses: &[(String, Vec<Location>)],
    rng: &mut R,
) -> RoutePlan {
    let sole_warehouse = match warehouses {
        [(key, _)] => Some(key.as_str()),
        _ => None,
    };

    // Insertion-ordered grouping so index assignment follows input order.
    let mut groups: Vec<(String, Vec<&Robot>)> = Vec::new();
    for robot in robots {
        let key = robot
            .warehouse_code
            .as_deref()
            .filter(|c| !c.trim().is_empty())
            .or(sole_warehouse)
            .unwrap_or(UNKNOWN_WAREHOUSE)
            .to_string();
        match groups.iter_mut().find(|(k, _)| *k == key) {
            Some((_, members)) => members.push(robot),
            None => groups.push((key, vec![robot])),
        }
    }

    let fallback: &[Location] = warehouses.first().map(|(_, l)| l.as_slice()).unwrap_or(&[]);

    let mut plan = RoutePlan::default();
    for (key, members) in groups {
        let pool = warehouses
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, l)| l.as_slice())
            .filter(|l| !l.is_empty())
            .unwrap_or(fallback);

        let n = members.len().max(1);
        for (i, robot) in members.into_iter().enumerate() {
            let mut stops: Vec<Location> = pool
                .iter()
                .enumerate()
                .filter(|(idx, _)| idx % n == i)
                .map(|(_, loc)| loc.clone())
                .collect();
            stops.shuffle(rng);
            plan.routes
                .insert(robot.code.clone(), Route::new(key.clone(), stops));
        }
    }
    plan
}
