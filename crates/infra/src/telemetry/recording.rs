use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;

use scanfleet_fleet::{ScanReport, StatusReport};

use super::{TelemetryError, TelemetrySink};

#[derive(Debug, Default)]
struct Log {
    scans: Vec<(ScanReport, Option<String>)>,
    statuses: Vec<(StatusReport, Option<String>)>,
}

/// Captures every payload instead of sending it. Used by offline dry runs and
/// tests; `set_failing(true)` makes every send fail with a 503.
#[derive(Debug, Default, Clone)]
pub struct RecordingTelemetry {
    log: Arc<Mutex<Log>>,
    failing: Arc<AtomicBool>,
}

impl RecordingTelemetry {
    pub fn new() -> Self {
        Self::default()
    }

    fn log(&self) -> MutexGuard<'_, Log> {
        self.log.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn scans(&self) -> Vec<ScanReport> {
        self.log().scans.iter().map(|(r, _)| r.clone()).collect()
    }

    pub fn statuses(&self) -> Vec<StatusReport> {
        self.log().statuses.iter().map(|(r, _)| r.clone()).collect()
    }

    /// Tokens attached to each scan, in send order.
    pub fn scan_tokens(&self) -> Vec<Option<String>> {
        self.log().scans.iter().map(|(_, t)| t.clone()).collect()
    }

    fn check(&self) -> Result<(), TelemetryError> {
        if self.failing.load(Ordering::SeqCst) {
            Err(TelemetryError::Api(503, "recording sink set to fail".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl TelemetrySink for RecordingTelemetry {
    async fn send_scan(&self, report: &ScanReport, token: Option<&str>) -> Result<(), TelemetryError> {
        self.check()?;
        self.log()
            .scans
            .push((report.clone(), token.map(str::to_string)));
        Ok(())
    }

    async fn send_status(
        &self,
        report: &StatusReport,
        token: Option<&str>,
    ) -> Result<(), TelemetryError> {
        self.check()?;
        self.log()
            .statuses
            .push((report.clone(), token.map(str::to_string)));
        Ok(())
    }
}
