//! Alert sources
//!
//! A source never fails outright: every problem is folded into the error
//! field of the returned [`AlertState`] so that it is rendered and
//! dispatched like any other change.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use super::model::{Alert, AlertState};

/// Shown when the response body is not a Prometheus API response
pub const DECODE_FAILURE: &str = "Failed to get response from Prometheus";

/// Produces the current alert set
#[async_trait]
pub trait AlertSource: Send + Sync {
    async fn fetch(&self) -> AlertState;
}

/// Prometheus (or Alertmanager v1) `/api/v1/alerts` endpoint
#[derive(Debug, Clone)]
pub struct PrometheusSource {
    url: String,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiResponse {
    #[serde(default)]
    status: String,
    #[serde(default)]
    data: Option<ApiData>,
    #[serde(default)]
    error_type: Option<String>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    warnings: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ApiData {
    #[serde(default)]
    alerts: Vec<Alert>,
}

impl PrometheusSource {
    /// Create a source with a per-request timeout
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            url: url.into(),
            client,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Fetch and decode the alert list
    pub async fn fetch_alerts(&self) -> Result<Vec<Alert>, FetchError> {
        let response = self.client.get(&self.url).send().await?;
        let status = response.status();
        // Prometheus reports API errors as JSON with a 4xx/5xx status
        let body = response.text().await?;

        let parsed: ApiResponse = serde_json::from_str(&body).map_err(|e| {
            tracing::debug!(
                url = %self.url,
                status = %status,
                body = %body,
                "Undecodable alerts response"
            );
            FetchError::Decode(e.to_string())
        })?;

        decode_response(parsed, &self.url)
    }
}

fn decode_response(parsed: ApiResponse, url: &str) -> Result<Vec<Alert>, FetchError> {
    for warning in &parsed.warnings {
        tracing::warn!(url = %url, warning = %warning, "Alert source warning");
    }

    if let Some(error) = parsed.error.filter(|e| !e.is_empty()) {
        let message = match parsed.error_type.filter(|t| !t.is_empty()) {
            Some(kind) => format!("{}: {}", kind, error),
            None => error,
        };
        return Err(FetchError::Payload(message));
    }

    let alerts = parsed.data.unwrap_or_default().alerts;
    tracing::info!(
        url = %url,
        status = %parsed.status,
        count = alerts.len(),
        "Fetched alerts"
    );
    Ok(alerts)
}

#[async_trait]
impl AlertSource for PrometheusSource {
    async fn fetch(&self) -> AlertState {
        match self.fetch_alerts().await {
            Ok(alerts) => AlertState::from_alerts(alerts),
            Err(e) => {
                tracing::warn!(url = %self.url, error = %e, "Alert fetch failed");
                AlertState::failed(e.state_message())
            }
        }
    }
}

/// Alert source errors
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Alert source error: {0}")]
    Payload(String),
}

impl FetchError {
    /// Text carried in [`AlertState::error`] and shown to users
    pub fn state_message(&self) -> String {
        match self {
            FetchError::Transport(e) => e.to_string(),
            FetchError::Decode(_) => DECODE_FAILURE.to_string(),
            FetchError::Payload(message) => message.clone(),
        }
    }
}
