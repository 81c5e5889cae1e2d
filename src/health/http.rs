//! Provider backed by a remote health-data service speaking JSON.
//!
//! Endpoints, relative to the base URL:
//! - `GET /access` -> 2xx when reads are permitted
//! - `GET /metrics/{name}?start=..&end=..` -> `{"value": number | null}`
//! - `GET /history?start=..&end=..` -> `[NutrientHistoryEntry]`

use super::{DateRange, HealthDataProvider, ProviderError};
use crate::db::NutrientHistoryEntry;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Deserialize)]
struct MetricResponse {
    value: Option<f64>,
}

pub struct HttpHealthProvider {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl HttpHealthProvider {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ProviderError> {
        let base_url = if base_url.starts_with("http://") || base_url.starts_with("https://") {
            base_url.trim_end_matches('/').to_string()
        } else {
            format!("http://{}", base_url.trim_end_matches('/'))
        };

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        Ok(Self {
            client,
            base_url,
            timeout,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn get(&self, path: &str, range: Option<&DateRange>) -> Result<reqwest::Response, ProviderError> {
        let mut request = self.client.get(format!("{}{}", self.base_url, path));
        if let Some(range) = range {
            request = request.query(&[
                ("start", range.start.to_rfc3339()),
                ("end", range.end.to_rfc3339()),
            ]);
        }

        request.send().await.map_err(|e| {
            if e.is_timeout() {
                ProviderError::Timeout(self.timeout)
            } else if e.is_connect() {
                ProviderError::Unavailable(e.to_string())
            } else {
                ProviderError::Network(e.to_string())
            }
        })
    }
}

/// Map non-success statuses onto provider errors.
fn check_status(status: StatusCode) -> Result<(), ProviderError> {
    if status.is_success() {
        return Ok(());
    }

    let msg = format!("provider returned {}", status);
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        Err(ProviderError::PermissionDenied(msg))
    } else if status == StatusCode::SERVICE_UNAVAILABLE {
        Err(ProviderError::Unavailable(msg))
    } else {
        Err(ProviderError::Query(msg))
    }
}

#[async_trait]
impl HealthDataProvider for HttpHealthProvider {
    async fn check_access(&self) -> Result<(), ProviderError> {
        let response = self.get("/access", None).await.map_err(|e| match e {
            ProviderError::Network(msg) => ProviderError::Unavailable(msg),
            other => other,
        })?;
        check_status(response.status())
    }

    async fn query_metric(&self, name: &str, range: &DateRange) -> Result<Option<f64>, ProviderError> {
        let response = self.get(&format!("/metrics/{}", name), Some(range)).await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        check_status(response.status())?;

        let body: MetricResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Decode(e.to_string()))?;
        Ok(body.value)
    }

    async fn query_history(&self, range: &DateRange) -> Result<Vec<NutrientHistoryEntry>, ProviderError> {
        let response = self.get("/history", Some(range)).await?;
        check_status(response.status())?;

        response
            .json()
            .await
            .map_err(|e| ProviderError::Decode(e.to_string()))
    }
}
