//! Robot status classification for status reports.

use serde::{Deserialize, Serialize};

/// Battery level above which a robot reports itself as working.
pub const WORKING_THRESHOLD: f64 = 20.0;

/// Consecutive failed posts after which a robot considers itself offline.
pub const OFFLINE_AFTER_FAILURES: u32 = 3;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RobotStatus {
    Working,
    Charging,
    Connected,
    Reconnecting,
    Offline,
}

impl RobotStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Working => "WORKING",
            Self::Charging => "CHARGING",
            Self::Connected => "CONNECTED",
            Self::Reconnecting => "RECONNECTING",
            Self::Offline => "OFFLINE",
        }
    }
}

impl core::fmt::Display for RobotStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which signal drives the reported status.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusMode {
    /// `WORKING` / `CHARGING` by battery level.
    #[default]
    Battery,
    /// `CONNECTED` / `RECONNECTING` / `OFFLINE` by consecutive post failures.
    Connectivity,
}

impl StatusMode {
    pub fn classify(&self, battery_level: f64, consecutive_failures: u32) -> RobotStatus {
        match self {
            Self::Battery if battery_level > WORKING_THRESHOLD => RobotStatus::Working,
            Self::Battery => RobotStatus::Charging,
            Self::Connectivity => match consecutive_failures {
                0 => RobotStatus::Connected,
                n if n < OFFLINE_AFTER_FAILURES => RobotStatus::Reconnecting,
                _ => RobotStatus::Offline,
            },
        }
    }
}

impl core::str::FromStr for StatusMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "battery" => Ok(Self::Battery),
            "connectivity" => Ok(Self::Connectivity),
            other => Err(format!("unknown status mode: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn battery_mode() {
        assert_eq!(StatusMode::Battery.classify(20.5, 9), RobotStatus::Working);
        assert_eq!(StatusMode::Battery.classify(20.0, 0), RobotStatus::Charging);
    }

    #[test]
    fn connectivity_mode() {
        let mode = StatusMode::Connectivity;
        assert_eq!(mode.classify(5.0, 0), RobotStatus::Connected);
        assert_eq!(mode.classify(90.0, 1), RobotStatus::Reconnecting);
        assert_eq!(mode.classify(90.0, 2), RobotStatus::Reconnecting);
        assert_eq!(mode.classify(90.0, 3), RobotStatus::Offline);
    }

    #[test]
    fn parses_modes() {
        assert_eq!("Battery".parse::<StatusMode>(), Ok(StatusMode::Battery));
        assert_eq!(" connectivity ".parse::<StatusMode>(), Ok(StatusMode::Connectivity));
        assert!("wifi".parse::<StatusMode>().is_err());
    }
}
