//! Strongly-typed identifiers used across the fleet.

use core::str::FromStr;
use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// Prefix shared by every robot code in the fleet.
pub const ROBOT_CODE_PREFIX: &str = "RB-";

/// Identifier of a shelf location.
///
/// Store-backed locations carry numeric ids; fabricated grid locations carry
/// opaque text ids such as `WH-EMU-1-17`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LocationId {
    Numeric(i64),
    Text(String),
}

impl LocationId {
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }

    /// True when the id carries no usable value (blank text).
    pub fn is_blank(&self) -> bool {
        matches!(self, Self::Text(s) if s.trim().is_empty())
    }
}

impl core::fmt::Display for LocationId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Numeric(n) => write!(f, "{n}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

impl From<i64> for LocationId {
    fn from(value: i64) -> Self {
        Self::Numeric(value)
    }
}

impl From<&str> for LocationId {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

/// Robot identity (`robot_code` in the store, `code`/`robotId` on the wire).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RobotCode(String);

impl RobotCode {
    /// Wrap a code without validation (store rows are taken as-is).
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    /// Code for the `n`-th synthesized robot in a series, e.g. `RB-EMU-0003`.
    pub fn numbered(series: &str, n: usize) -> Self {
        Self(format!("{ROBOT_CODE_PREFIX}{series}-{n:04}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the code follows the fleet naming pattern: `RB-` followed by
    /// upper-case letters, digits and dashes, ending in a digit.
    pub fn matches_fleet_pattern(&self) -> bool {
        let Some(rest) = self.0.strip_prefix(ROBOT_CODE_PREFIX) else {
            return false;
        };
        !rest.is_empty()
            && rest
                .chars()
                .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '-')
            && rest.ends_with(|c: char| c.is_ascii_digit())
    }
}

impl core::fmt::Display for RobotCode {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for RobotCode {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let code = Self(s.trim().to_string());
        if code.matches_fleet_pattern() {
            Ok(code)
        } else {
            Err(DomainError::invalid_id(format!("RobotCode: {s:?}")))
        }
    }
}

/// How a warehouse is addressed when looking up its locations.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum WarehouseRef {
    Id(i64),
    Code(String),
}

impl WarehouseRef {
    /// All-digit keys address a warehouse by id, anything else by code.
    pub fn from_key(key: &str) -> Self {
        let trimmed = key.trim();
        if !trimmed.is_empty() && trimmed.bytes().all(|b| b.is_ascii_digit()) {
            if let Ok(id) = trimmed.parse::<i64>() {
                return Self::Id(id);
            }
        }
        Self::Code(trimmed.to_string())
    }
}

impl core::fmt::Display for WarehouseRef {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Id(id) => write!(f, "#{id}"),
            Self::Code(code) => f.write_str(code),
        }
    }
}
