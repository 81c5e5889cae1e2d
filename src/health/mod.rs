//! Health data providers.
//!
//! A provider is the read-only source of nutrient totals and intake
//! history. Supports a local SQLite-backed provider and a remote HTTP one.

mod catalog;
mod http;
mod local;

pub use catalog::*;
pub use http::*;
pub use local::*;

use crate::db::NutrientHistoryEntry;

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Provider error types.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("permission denied: {0}")]
    PermissionDenied(String),
    #[error("provider unavailable: {0}")]
    Unavailable(String),
    #[error("query failed: {0}")]
    Query(String),
    #[error("network error: {0}")]
    Network(String),
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
    #[error("invalid response: {0}")]
    Decode(String),
}

impl ProviderError {
    /// Whether the error applies to the provider as a whole rather than to
    /// one query.
    pub fn is_categorical(&self) -> bool {
        matches!(self, Self::PermissionDenied(_) | Self::Unavailable(_))
    }
}

/// An inclusive time range `[start, end]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DateRange {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    /// The UTC calendar day containing `now`.
    pub fn today(now: DateTime<Utc>) -> Self {
        let start = Utc.from_utc_datetime(&now.date_naive().and_time(chrono::NaiveTime::MIN));
        Self {
            start,
            end: start + ChronoDuration::days(1),
        }
    }

    /// The 24 hours ending at `now`.
    pub fn trailing_day(now: DateTime<Utc>) -> Self {
        Self {
            start: now - ChronoDuration::days(1),
            end: now,
        }
    }

    pub fn is_well_formed(&self) -> bool {
        self.start <= self.end
    }

    pub fn contains(&self, t: DateTime<Utc>) -> bool {
        self.start <= t && t <= self.end
    }
}

/// Read-only access to health data.
#[async_trait]
pub trait HealthDataProvider: Send + Sync {
    /// Fails with a categorical error when the provider cannot be used at
    /// all (e.g. permission denied).
    async fn check_access(&self) -> Result<(), ProviderError>;

    /// Total of a metric within `range`, or `None` when nothing was logged.
    async fn query_metric(&self, name: &str, range: &DateRange) -> Result<Option<f64>, ProviderError>;

    /// Every intake event within `range`.
    async fn query_history(&self, range: &DateRange) -> Result<Vec<NutrientHistoryEntry>, ProviderError>;
}
