//! Read side of the warehouse database.
//!
//! Every read is best-effort: a failure is logged where it happens and comes
//! back as [`Fetch::Failed`], which callers usually fold into an empty result.
//! A store outage degrades one poll; it never takes a worker down.

pub mod in_memory;
pub mod postgres;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use scanfleet_core::{LocationId, RobotCode, WarehouseRef};
use scanfleet_fleet::{Location, Robot, Warehouse};
use scanfleet_inventory::ProductSnapshot;

pub use in_memory::InMemoryWarehouseStore;
pub use postgres::PostgresWarehouseStore;

/// Outcome of a best-effort read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fetch<T> {
    Rows(T),
    /// The read succeeded and found nothing.
    Empty,
    /// The read failed; the reason has already been logged.
    Failed(String),
}

impl<T> Fetch<T> {
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }

    pub fn rows(self) -> Option<T> {
        match self {
            Self::Rows(rows) => Some(rows),
            Self::Empty | Self::Failed(_) => None,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Fetch<U> {
        match self {
            Self::Rows(rows) => Fetch::Rows(f(rows)),
            Self::Empty => Fetch::Empty,
            Self::Failed(reason) => Fetch::Failed(reason),
        }
    }
}

impl<T: Default> Fetch<T> {
    /// Treat a failure the same as an empty result.
    pub fn or_empty(self) -> T {
        self.rows().unwrap_or_default()
    }
}

impl<T> Fetch<Vec<T>> {
    pub fn from_vec(rows: Vec<T>) -> Self {
        if rows.is_empty() { Self::Empty } else { Self::Rows(rows) }
    }
}

impl<K, V> Fetch<HashMap<K, V>> {
    pub fn from_map(rows: HashMap<K, V>) -> Self {
        if rows.is_empty() { Self::Empty } else { Self::Rows(rows) }
    }
}

impl<T> From<Option<T>> for Fetch<T> {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Empty, Self::Rows)
    }
}

/// Warehouse database reads.
#[async_trait]
pub trait WarehouseStore: Send + Sync {
    /// Non-deleted warehouses with their grid bounds.
    async fn warehouses(&self) -> Fetch<Vec<Warehouse>>;

    /// Non-deleted robots with the code of their warehouse.
    async fn robots(&self) -> Fetch<Vec<Robot>>;

    /// Locations of a warehouse, by id or by code.
    async fn locations(&self, warehouse: &WarehouseRef) -> Fetch<Vec<Location>>;

    /// Latest quantity per product at a location.
    async fn location_contents(&self, location: &LocationId) -> Fetch<Vec<ProductSnapshot>>;

    /// Most recent token of one robot.
    async fn robot_token(&self, robot: &RobotCode) -> Fetch<String>;

    /// Most recent token per robot, only for robots that have one.
    async fn robot_tokens(&self, robots: &[RobotCode]) -> Fetch<HashMap<RobotCode, String>>;
}

#[async_trait]
impl<S> WarehouseStore for Arc<S>
where
    S: WarehouseStore + ?Sized,
{
    async fn warehouses(&self) -> Fetch<Vec<Warehouse>> {
        (**self).warehouses().await
    }

    async fn robots(&self) -> Fetch<Vec<Robot>> {
        (**self).robots().await
    }

    async fn locations(&self, warehouse: &WarehouseRef) -> Fetch<Vec<Location>> {
        (**self).locations(warehouse).await
    }

    async fn location_contents(&self, location: &LocationId) -> Fetch<Vec<ProductSnapshot>> {
        (**self).location_contents(location).await
    }

    async fn robot_token(&self, robot: &RobotCode) -> Fetch<String> {
        (**self).robot_token(robot).await
    }

    async fn robot_tokens(&self, robots: &[RobotCode]) -> Fetch<HashMap<RobotCode, String>> {
        (**self).robot_tokens(robots).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failures_fold_into_empty() {
        let failed: Fetch<Vec<u8>> = Fetch::Failed("connection refused".into());
        assert!(failed.is_failed());
        assert!(failed.or_empty().is_empty());

        assert_eq!(Fetch::from_vec(vec![1, 2]).or_empty(), vec![1, 2]);
        assert_eq!(Fetch::<Vec<u8>>::from_vec(Vec::new()), Fetch::Empty);
        assert_eq!(Fetch::from(Some("t")).rows(), Some("t"));
        assert_eq!(Fetch::<&str>::from(None), Fetch::Empty);
    }
}
