//! Telemetry delivery to the warehouse backend.
//!
//! Implementations only report what happened; the provided `post_*` methods
//! log failures and fold them into a success flag, which is all a worker
//! needs. There is no retry of a failed payload: the next cycle sends fresh
//! data.

pub mod http;
pub mod recording;

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tracing::warn;

use scanfleet_fleet::{ScanReport, StatusReport};

pub use http::HttpTelemetryClient;
pub use recording::RecordingTelemetry;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TelemetryError {
    #[error("network error: {0}")]
    Network(String),
    #[error("API error ({0}): {1}")]
    Api(u16, String),
    #[error("encode error: {0}")]
    Encode(String),
}

#[async_trait]
pub trait TelemetrySink: Send + Sync {
    async fn send_scan(&self, report: &ScanReport, token: Option<&str>) -> Result<(), TelemetryError>;

    async fn send_status(
        &self,
        report: &StatusReport,
        token: Option<&str>,
    ) -> Result<(), TelemetryError>;

    /// Send a scan report; `false` on any failure, after logging it.
    async fn post_scan(&self, report: &ScanReport, token: Option<&str>) -> bool {
        match self.send_scan(report, token).await {
            Ok(()) => true,
            Err(e) => {
                warn!(robot = %report.code, location = %report.next_checkpoint, error = %e, "scan post failed");
                false
            }
        }
    }

    /// Send a status report; `false` on any failure, after logging it.
    async fn post_status(&self, report: &StatusReport, token: Option<&str>) -> bool {
        match self.send_status(report, token).await {
            Ok(()) => true,
            Err(e) => {
                warn!(robot = %report.robot_id, status = %report.status, error = %e, "status post failed");
                false
            }
        }
    }
}

#[async_trait]
impl<T> TelemetrySink for Arc<T>
where
    T: TelemetrySink + ?Sized,
{
    async fn send_scan(&self, report: &ScanReport, token: Option<&str>) -> Result<(), TelemetryError> {
        (**self).send_scan(report, token).await
    }

    async fn send_status(
        &self,
        report: &StatusReport,
        token: Option<&str>,
    ) -> Result<(), TelemetryError> {
        (**self).send_status(report, token).await
    }
}
