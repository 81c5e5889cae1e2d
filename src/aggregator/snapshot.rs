//! Snapshot types produced by the aggregator.

use crate::db::NutrientHistoryEntry;
use crate::health::{DateRange, Nutrient, ProviderError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// How a metric is computed from the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryKind {
    /// Sum of the metric's samples in the range.
    Total,
    /// Timestamp of the latest intake event in the range.
    MostRecent,
}

/// A named metric request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricQuery {
    pub name: String,
    pub range: DateRange,
    #[serde(default = "default_kind")]
    pub kind: QueryKind,
}

fn default_kind() -> QueryKind {
    QueryKind::Total
}

impl MetricQuery {
    pub fn total(name: &str, range: DateRange) -> Self {
        Self {
            name: name.to_string(),
            range,
            kind: QueryKind::Total,
        }
    }

    pub fn most_recent(name: &str, range: DateRange) -> Self {
        Self {
            name: name.to_string(),
            range,
            kind: QueryKind::MostRecent,
        }
    }
}

/// Per-metric failure, contained to that metric's slot.
#[derive(Error, Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "message", rename_all = "snake_case")]
pub enum MetricError {
    #[error("metric unavailable: {0}")]
    MetricUnavailable(String),
    #[error("provider unavailable: {0}")]
    ProviderUnavailable(String),
}

impl From<ProviderError> for MetricError {
    fn from(e: ProviderError) -> Self {
        if e.is_categorical() {
            Self::ProviderUnavailable(e.to_string())
        } else {
            Self::MetricUnavailable(e.to_string())
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MetricValue {
    Quantity { amount: f64, unit: String },
    Timestamp { at: DateTime<Utc> },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum MetricOutcome {
    Value { value: MetricValue },
    NoValue,
    Error { error: MetricError },
}

/// A metric name paired with what the provider gave back for it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricResult {
    pub name: String,
    #[serde(flatten)]
    pub outcome: MetricOutcome,
}

impl MetricResult {
    pub fn quantity(name: &str, amount: f64) -> Self {
        let unit = Nutrient::from_name(name).map(Nutrient::unit).unwrap_or_default();
        Self {
            name: name.to_string(),
            outcome: MetricOutcome::Value {
                value: MetricValue::Quantity {
                    amount,
                    unit: unit.to_string(),
                },
            },
        }
    }

    pub fn timestamp(name: &str, at: DateTime<Utc>) -> Self {
        Self {
            name: name.to_string(),
            outcome: MetricOutcome::Value {
                value: MetricValue::Timestamp { at },
            },
        }
    }

    pub fn no_value(name: &str) -> Self {
        Self {
            name: name.to_string(),
            outcome: MetricOutcome::NoValue,
        }
    }

    pub fn error(name: &str, error: MetricError) -> Self {
        Self {
            name: name.to_string(),
            outcome: MetricOutcome::Error { error },
        }
    }

    pub fn value(&self) -> Option<&MetricValue> {
        match &self.outcome {
            MetricOutcome::Value { value } => Some(value),
            _ => None,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self.outcome, MetricOutcome::Error { .. })
    }

    /// Display text: "—" for no value, "unavailable" for errors.
    pub fn display(&self) -> String {
        match &self.outcome {
            MetricOutcome::Value {
                value: MetricValue::Quantity { amount, .. },
            } => match Nutrient::from_name(&self.name) {
                Some(n) => n.format_amount(*amount),
                None => format!("{:.1}", amount),
            },
            MetricOutcome::Value {
                value: MetricValue::Timestamp { at },
            } => at.format("%H:%M").to_string(),
            MetricOutcome::NoValue => "—".to_string(),
            MetricOutcome::Error { .. } => "unavailable".to_string(),
        }
    }
}

/// A fully resolved set of metric results.
#[derive(Debug, Clone, Serialize)]
pub struct HealthSnapshot {
    pub captured_at: DateTime<Utc>,
    pub results: BTreeMap<String, MetricResult>,
}

impl HealthSnapshot {
    pub fn get(&self, name: &str) -> Option<&MetricResult> {
        self.results.get(name)
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }
}

/// The entry with the latest timestamp inside `range`, if any.
pub fn latest_entry<'a>(
    entries: &'a [NutrientHistoryEntry],
    range: &DateRange,
) -> Option<&'a NutrientHistoryEntry> {
    entries
        .iter()
        .filter(|e| range.contains(e.time))
        .max_by_key(|e| e.time)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration as ChronoDuration, TimeZone};

    fn meal(time: DateTime<Utc>) -> NutrientHistoryEntry {
        NutrientHistoryEntry {
            time,
            nutrient: "carbs".to_string(),
            amount: 30.0,
            unit: "g".to_string(),
        }
    }

    #[test]
    fn test_latest_entry_picks_max_timestamp() {
        let t = Utc.with_ymd_and_hms(2024, 11, 7, 18, 0, 0).unwrap();
        let entries = vec![
            meal(t - ChronoDuration::seconds(3600)),
            meal(t - ChronoDuration::seconds(7200)),
            meal(t - ChronoDuration::seconds(1800)),
        ];
        let range = DateRange::trailing_day(t);

        let latest = latest_entry(&entries, &range).unwrap();
        assert_eq!(latest.time, t - ChronoDuration::seconds(1800));
    }

    #[test]
    fn test_latest_entry_empty_and_out_of_range() {
        let t = Utc.with_ymd_and_hms(2024, 11, 7, 18, 0, 0).unwrap();
        let range = DateRange::trailing_day(t);
        assert!(latest_entry(&[], &range).is_none());

        let stale = vec![meal(t - ChronoDuration::days(2))];
        assert!(latest_entry(&stale, &range).is_none());
    }

    #[test]
    fn test_display() {
        assert_eq!(MetricResult::quantity("hydration", 0.5).display(), "500 mL");
        assert_eq!(MetricResult::quantity("protein", 31.6).display(), "32g");
        assert_eq!(MetricResult::no_value("fats").display(), "—");
        let err = MetricResult::error("carbs", MetricError::MetricUnavailable("boom".into()));
        assert!(err.is_error());
        assert_eq!(err.display(), "unavailable");
    }

    #[test]
    fn test_provider_error_conversion() {
        let e: MetricError = ProviderError::PermissionDenied("no".into()).into();
        assert!(matches!(e, MetricError::ProviderUnavailable(_)));
        let e: MetricError = ProviderError::Query("bad".into()).into();
        assert!(matches!(e, MetricError::MetricUnavailable(_)));
    }
}
