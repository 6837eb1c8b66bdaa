//! reqwest-backed telemetry client.

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tracing::debug;

use scanfleet_fleet::{ScanReport, StatusReport};

use super::{TelemetryError, TelemetrySink};

pub const SCAN_PATH: &str = "/api/robots/data";
pub const STATUS_PATH: &str = "/api/robots/status";

/// Posts JSON payloads to the backend with an optional bearer token.
#[derive(Debug, Clone)]
pub struct HttpTelemetryClient {
    client: reqwest::Client,
    base_url: String,
}

impl HttpTelemetryClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, TelemetryError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TelemetryError::Network(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn post<B: Serialize + Sync>(
        &self,
        path: &str,
        body: &B,
        token: Option<&str>,
    ) -> Result<(), TelemetryError> {
        let url = format!("{}{}", self.base_url, path);
        let mut req = self.client.post(&url).json(body);
        if let Some(token) = token.filter(|t| !t.is_empty()) {
            req = req.bearer_auth(token);
        }

        let resp = req.send().await.map_err(|e| {
            if e.is_builder() {
                TelemetryError::Encode(e.to_string())
            } else {
                TelemetryError::Network(e.to_string())
            }
        })?;

        let status = resp.status();
        if !status.is_success() {
            return Err(TelemetryError::Api(status.as_u16(), resp.text().await.unwrap_or_default()));
        }
        debug!(%url, status = status.as_u16(), "telemetry accepted");
        Ok(())
    }
}

#[async_trait]
impl TelemetrySink for HttpTelemetryClient {
    async fn send_scan(&self, report: &ScanReport, token: Option<&str>) -> Result<(), TelemetryError> {
        self.post(SCAN_PATH, report, token).await
    }

    async fn send_status(
        &self,
        report: &StatusReport,
        token: Option<&str>,
    ) -> Result<(), TelemetryError> {
        self.post(STATUS_PATH, report, token).await
    }
}
