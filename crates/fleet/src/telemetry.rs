//! Wire payloads posted to the warehouse backend.

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};

use scanfleet_core::RobotCode;
use scanfleet_inventory::ScanResult;

use crate::status::RobotStatus;
use crate::topology::{Coordinate, Location};

/// Body of `POST /api/robots/data`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanReport {
    pub code: RobotCode,
    #[serde(serialize_with = "micros")]
    pub timestamp: DateTime<Utc>,
    pub location: ShelfPosition,
    pub scan_results: Vec<ScanResult>,
    pub battery_level: u8,
    pub next_checkpoint: String,
}

impl ScanReport {
    pub fn new(
        code: RobotCode,
        timestamp: DateTime<Utc>,
        location: &Location,
        scan_results: Vec<ScanResult>,
        battery_level: u8,
    ) -> Self {
        Self {
            code,
            timestamp,
            location: location.coordinate.into(),
            scan_results,
            battery_level,
            next_checkpoint: location.checkpoint(),
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
pub struct ShelfPosition {
    pub zone: u32,
    pub row: u32,
    pub shelf: u32,
}

impl From<Coordinate> for ShelfPosition {
    fn from(c: Coordinate) -> Self {
        Self {
            zone: c.zone,
            row: c.row,
            shelf: c.shelf,
        }
    }
}

/// Body of `POST /api/robots/status`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusReport {
    pub robot_id: RobotCode,
    #[serde(serialize_with = "millis")]
    pub timestamp: DateTime<Utc>,
    pub status: RobotStatus,
    pub battery_level: u8,
    #[serde(serialize_with = "millis_opt", skip_serializing_if = "Option::is_none")]
    pub last_data_sent: Option<DateTime<Utc>>,
}

fn micros<S: Serializer>(ts: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
    s.collect_str(&ts.format("%Y-%m-%dT%H:%M:%S%.6fZ"))
}

fn millis<S: Serializer>(ts: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
    s.collect_str(&ts.format("%Y-%m-%dT%H:%M:%S%.3fZ"))
}

fn millis_opt<S: Serializer>(ts: &Option<DateTime<Utc>>, s: S) -> Result<S::Ok, S::Error> {
    match ts {
        Some(ts) => millis(ts, s),
        None => s.serialize_none(),
    }
}
