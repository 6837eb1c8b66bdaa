//! `scanfleet-core`: foundation building blocks for the scan fleet.
//!
//! This crate contains **pure** primitives (no IO, no async, no storage).

pub mod entity;
pub mod error;
pub mod id;
pub mod lock_key;
pub mod value_object;

pub use entity::{Entity, distinct_by_id};
pub use error::{DomainError, DomainResult};
pub use id::{LocationId, RobotCode, WarehouseRef};
pub use lock_key::LockKey;
pub use value_object::ValueObject;
