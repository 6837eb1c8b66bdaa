//! Configuration loading and representation.
//!
//! The configuration is read once at startup into an immutable
//! [`SimulatorConfig`] and handed to every component; nothing else reads the
//! environment.

use std::time::Duration;

use thiserror::Error;

use scanfleet_core::DomainError;
use scanfleet_fleet::StatusMode;
use scanfleet_inventory::DiscrepancyPolicy;
use scanfleet_observability::LogFormat;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value:?} ({reason})")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },

    #[error("discrepancy probabilities: {0}")]
    Discrepancy(#[from] DomainError),
}

impl ConfigError {
    fn invalid(key: &'static str, value: &str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            value: value.to_string(),
            reason: reason.into(),
        }
    }
}

/// Where topology and contents come from.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum Mode {
    /// Read warehouses, robots and shelf contents from Postgres.
    #[default]
    Live,
    /// Fully synthetic; no database involved.
    Offline,
}

impl core::str::FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "live" => Ok(Self::Live),
            "offline" => Ok(Self::Offline),
            other => Err(format!("expected live or offline, got {other}")),
        }
    }
}

impl core::fmt::Display for Mode {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(match self {
            Self::Live => "live",
            Self::Offline => "offline",
        })
    }
}

/// Postgres connection parameters.
#[derive(Clone, PartialEq)]
pub struct StoreConfig {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub user: String,
    pub password: String,
    /// Bound on connecting and on each query.
    pub timeout: Duration,
}

// Hand-written so the password never reaches the logs.
impl core::fmt::Debug for StoreConfig {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("StoreConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &"[HIDDEN]")
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            database: "smart_warehouse".to_string(),
            user: "warehouse_user".to_string(),
            password: "warehouse_pass".to_string(),
            timeout: Duration::from_secs(3),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SimulatorConfig {
    /// Backend base URL, without a trailing slash.
    pub api_url: String,
    pub mode: Mode,
    /// Fleet size override; 0 means "whatever the store has" (4 offline).
    pub robots_count: usize,
    pub update_interval: Duration,
    pub status_interval: Duration,
    /// Fallback bearer token for robots without one of their own.
    pub auth_token: Option<String>,
    pub store: StoreConfig,
    pub discrepancy: DiscrepancyPolicy,
    pub status_mode: StatusMode,
    pub http_timeout: Duration,
    pub shutdown_grace: Duration,
    pub log_format: LogFormat,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            api_url: "http://localhost:8080".to_string(),
            mode: Mode::Live,
            robots_count: 0,
            update_interval: Duration::from_secs(8),
            status_interval: Duration::from_secs(8),
            auth_token: None,
            store: StoreConfig::default(),
            discrepancy: DiscrepancyPolicy::default(),
            status_mode: StatusMode::Battery,
            http_timeout: Duration::from_secs(6),
            shutdown_grace: Duration::from_secs(2),
            log_format: LogFormat::Json,
        }
    }
}

impl SimulatorConfig {
    /// Read the configuration from process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup.
    ///
    /// Missing or blank keys take their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| sanitize(&v)).filter(|v| !v.is_empty());
        let defaults = Self::default();
        let store_defaults = StoreConfig::default();

        let update_interval = match get("UPDATE_INTERVAL") {
            Some(v) => parse_seconds("UPDATE_INTERVAL", &v)?,
            None => defaults.update_interval,
        };
        let status_interval = match get("STATUS_INTERVAL") {
            Some(v) => parse_seconds("STATUS_INTERVAL", &v)?,
            None => update_interval.max(Duration::from_secs(5)),
        };

        let discrepancy = {
            let base = DiscrepancyPolicy::default();
            let p = |key: &'static str, default: f64| match get(key) {
                Some(v) => parse::<f64>(key, &v),
                None => Ok(default),
            };
            DiscrepancyPolicy::new(
                p("SIM_P_MISSING", base.p_missing())?,
                p("SIM_P_SWAPPED", base.p_swapped())?,
                p("SIM_P_COUNT_ERROR", base.p_count_error())?,
            )?
        };

        let store = StoreConfig {
            host: get("POSTGRES_HOST").unwrap_or(store_defaults.host),
            port: match get("POSTGRES_PORT") {
                Some(v) => parse("POSTGRES_PORT", &v)?,
                None => store_defaults.port,
            },
            database: get("POSTGRES_DB").unwrap_or(store_defaults.database),
            user: get("POSTGRES_USER").unwrap_or(store_defaults.user),
            password: get("POSTGRES_PASSWORD").unwrap_or(store_defaults.password),
            timeout: match get("STORE_TIMEOUT_SECS") {
                Some(v) => parse_seconds("STORE_TIMEOUT_SECS", &v)?,
                None => store_defaults.timeout,
            },
        };

        Ok(Self {
            api_url: get("API_URL")
                .map(|u| u.trim_end_matches('/').to_string())
                .unwrap_or(defaults.api_url),
            mode: match get("MODE") {
                Some(v) => parse_with("MODE", &v, str::parse)?,
                None => defaults.mode,
            },
            robots_count: match get("ROBOTS_COUNT") {
                Some(v) => parse("ROBOTS_COUNT", &v)?,
                None => defaults.robots_count,
            },
            update_interval,
            status_interval,
            auth_token: get("ROBOT_AUTH_TOKEN"),
            store,
            discrepancy,
            status_mode: match get("STATUS_MODE") {
                Some(v) => parse_with("STATUS_MODE", &v, str::parse)?,
                None => defaults.status_mode,
            },
            http_timeout: match get("HTTP_TIMEOUT_SECS") {
                Some(v) => parse_seconds("HTTP_TIMEOUT_SECS", &v)?,
                None => defaults.http_timeout,
            },
            shutdown_grace: match get("SHUTDOWN_GRACE_SECS") {
                Some(v) => parse_seconds("SHUTDOWN_GRACE_SECS", &v)?,
                None => defaults.shutdown_grace,
            },
            log_format: match get("LOG_FORMAT") {
                Some(v) => parse_with("LOG_FORMAT", &v, str::parse)?,
                None => defaults.log_format,
            },
        })
    }
}

/// Strip BOMs, zero-width spaces and replacement characters; turn
/// non-breaking spaces into plain ones; trim.
fn sanitize(raw: &str) -> String {
    raw.chars()
        .filter(|c| !matches!(c, '\u{feff}' | '\u{200b}' | '\u{fffd}'))
        .map(|c| if c == '\u{a0}' { ' ' } else { c })
        .collect::<String>()
        .trim()
        .to_string()
}

fn parse<T>(key: &'static str, value: &str) -> Result<T, ConfigError>
where
    T: core::str::FromStr,
    T::Err: core::fmt::Display,
{
    value
        .parse::<T>()
        .map_err(|e| ConfigError::invalid(key, value, e.to_string()))
}

fn parse_with<T, E: core::fmt::Display>(
    key: &'static str,
    value: &str,
    f: impl Fn(&str) -> Result<T, E>,
) -> Result<T, ConfigError> {
    f(value).map_err(|e| ConfigError::invalid(key, value, e.to_string()))
}

fn parse_seconds(key: &'static str, value: &str) -> Result<Duration, ConfigError> {
    let secs: f64 = parse(key, value)?;
    if !secs.is_finite() || secs <= 0.0 {
        return Err(ConfigError::invalid(key, value, "must be a positive number of seconds"));
    }
    Ok(Duration::from_secs_f64(secs))
}
