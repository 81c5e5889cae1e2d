//! Concurrent health metric aggregation.
//!
//! Every query in a request is fetched on its own task; the aggregator waits
//! for all of them and folds the outcomes into one [`HealthSnapshot`]. A
//! failing fetch only affects its own slot unless the provider as a whole
//! reports itself unavailable.

mod snapshot;

pub use snapshot::*;

use crate::health::{DateRange, HealthDataProvider, Nutrient};

use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use thiserror::Error;
use tokio::task::JoinSet;

/// Name of the most-recent-meal slot in the fuel check.
pub const LAST_MEAL: &str = "last_meal";

/// Aggregator error types.
#[derive(Error, Debug)]
pub enum AggregateError {
    #[error("invalid query: {0}")]
    InvalidQuery(String),
}

/// Reject a request before any provider call is made.
pub fn validate_queries(queries: &[MetricQuery]) -> Result<(), AggregateError> {
    if queries.is_empty() {
        return Err(AggregateError::InvalidQuery("no metrics requested".to_string()));
    }

    let mut seen = HashSet::with_capacity(queries.len());
    for q in queries {
        if !seen.insert(q.name.as_str()) {
            return Err(AggregateError::InvalidQuery(format!("duplicate metric {:?}", q.name)));
        }
        if !q.range.is_well_formed() {
            return Err(AggregateError::InvalidQuery(format!(
                "metric {:?} range starts at {} after it ends at {}",
                q.name, q.range.start, q.range.end
            )));
        }
    }

    Ok(())
}

/// The standard fuel-check request: today's macro and water totals plus
/// the last meal in the past 24 hours.
pub fn fuel_check_queries(now: DateTime<Utc>) -> Vec<MetricQuery> {
    let today = DateRange::today(now);
    let mut queries: Vec<MetricQuery> = Nutrient::ALL
        .iter()
        .map(|n| MetricQuery::total(n.name(), today))
        .collect();
    queries.push(MetricQuery::most_recent(LAST_MEAL, DateRange::trailing_day(now)));
    queries
}

/// Fans metric queries out to a provider and joins them into a snapshot.
pub struct SnapshotAggregator {
    provider: Arc<dyn HealthDataProvider>,
}

impl SnapshotAggregator {
    pub fn new(provider: Arc<dyn HealthDataProvider>) -> Self {
        Self { provider }
    }

    /// Fetch every query concurrently and return once all have resolved.
    ///
    /// Fails only on malformed input. Dropping the returned future aborts
    /// the in-flight fetches.
    pub async fn fetch_snapshot(&self, queries: &[MetricQuery]) -> Result<HealthSnapshot, AggregateError> {
        validate_queries(queries)?;

        if let Err(e) = self.provider.check_access().await {
            tracing::warn!("Health provider unavailable, filling {} slots: {}", queries.len(), e);
            let error = MetricError::ProviderUnavailable(e.to_string());
            let results = queries
                .iter()
                .map(|q| (q.name.clone(), MetricResult::error(&q.name, error.clone())))
                .collect();
            return Ok(HealthSnapshot {
                captured_at: Utc::now(),
                results,
            });
        }

        let mut tasks = JoinSet::new();
        for query in queries {
            let provider = self.provider.clone();
            let query = query.clone();
            tasks.spawn(async move { run_query(provider.as_ref(), &query).await });
        }

        tracing::debug!("Fetching {} metrics", queries.len());

        let mut results = BTreeMap::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(result) => {
                    results.insert(result.name.clone(), result);
                }
                Err(e) => tracing::error!("Metric fetch task failed: {}", e),
            }
        }

        // A categorical failure seen mid-fetch applies to the whole snapshot.
        let categorical = results.values().find_map(|r| match &r.outcome {
            MetricOutcome::Error {
                error: error @ MetricError::ProviderUnavailable(_),
            } => Some(error.clone()),
            _ => None,
        });
        if let Some(error) = categorical {
            tracing::warn!("Health provider became unavailable during fetch: {}", error);
            for q in queries {
                results.insert(q.name.clone(), MetricResult::error(&q.name, error.clone()));
            }
        }

        // Slots whose task died still have to appear in the snapshot.
        for q in queries {
            results.entry(q.name.clone()).or_insert_with(|| {
                MetricResult::error(
                    &q.name,
                    MetricError::MetricUnavailable("fetch did not complete".to_string()),
                )
            });
        }

        let snapshot = HealthSnapshot {
            captured_at: Utc::now(),
            results,
        };
        tracing::debug!("Snapshot complete with {} metrics", snapshot.len());
        Ok(snapshot)
    }

    /// Fetch the standard fuel-check snapshot.
    pub async fn fuel_check(&self, now: DateTime<Utc>) -> HealthSnapshot {
        let queries = fuel_check_queries(now);
        match self.fetch_snapshot(&queries).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                // The built-in query set is always well formed.
                tracing::error!("Fuel check rejected: {}", e);
                HealthSnapshot {
                    captured_at: Utc::now(),
                    results: BTreeMap::new(),
                }
            }
        }
    }
}

async fn run_query(provider: &dyn HealthDataProvider, query: &MetricQuery) -> MetricResult {
    match query.kind {
        QueryKind::Total => match provider.query_metric(&query.name, &query.range).await {
            Ok(Some(amount)) => MetricResult::quantity(&query.name, amount),
            Ok(None) => MetricResult::no_value(&query.name),
            Err(e) => {
                tracing::warn!("Fetch for {} failed: {}", query.name, e);
                MetricResult::error(&query.name, e.into())
            }
        },
        QueryKind::MostRecent => match provider.query_history(&query.range).await {
            Ok(entries) => match latest_entry(&entries, &query.range) {
                Some(entry) => MetricResult::timestamp(&query.name, entry.time),
                None => MetricResult::no_value(&query.name),
            },
            Err(e) => {
                tracing::warn!("History fetch for {} failed: {}", query.name, e);
                MetricResult::error(&query.name, e.into())
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::NutrientHistoryEntry;
    use crate::health::ProviderError;

    use async_trait::async_trait;
    use chrono::Duration as ChronoDuration;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Scripted provider that counts every call it receives.
    #[derive(Default)]
    struct MockProvider {
        values: HashMap<String, Option<f64>>,
        failing: HashSet<String>,
        unavailable: HashSet<String>,
        panicking: HashSet<String>,
        history: Vec<NutrientHistoryEntry>,
        denied: bool,
        delay: Option<Duration>,
        calls: AtomicUsize,
        completed: AtomicUsize,
    }

    #[async_trait]
    impl HealthDataProvider for MockProvider {
        async fn check_access(&self) -> Result<(), ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.denied {
                Err(ProviderError::PermissionDenied("health access not granted".into()))
            } else {
                Ok(())
            }
        }

        async fn query_metric(&self, name: &str, _range: &DateRange) -> Result<Option<f64>, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            if self.panicking.contains(name) {
                panic!("provider crashed on {}", name);
            }
            self.completed.fetch_add(1, Ordering::SeqCst);
            if self.failing.contains(name) {
                return Err(ProviderError::Query(format!("{} query failed", name)));
            }
            if self.unavailable.contains(name) {
                return Err(ProviderError::Unavailable("health store went away".into()));
            }
            Ok(self.values.get(name).copied().flatten())
        }

        async fn query_history(&self, _range: &DateRange) -> Result<Vec<NutrientHistoryEntry>, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.history.clone())
        }
    }

    fn macros(values: &[(&str, Option<f64>)]) -> MockProvider {
        MockProvider {
            values: values.iter().map(|(n, v)| (n.to_string(), *v)).collect(),
            ..Default::default()
        }
    }

    fn totals(names: &[&str]) -> Vec<MetricQuery> {
        let range = DateRange::today(Utc::now());
        names.iter().map(|n| MetricQuery::total(n, range)).collect()
    }

    #[tokio::test]
    async fn test_snapshot_keys_match_request() {
        let provider = Arc::new(macros(&[("carbs", Some(120.0)), ("protein", Some(80.0)), ("fats", None)]));
        let aggregator = SnapshotAggregator::new(provider);

        let queries = totals(&["carbs", "protein", "fats", "hydration"]);
        let snapshot = aggregator.fetch_snapshot(&queries).await.unwrap();

        let names: Vec<&str> = snapshot.results.keys().map(String::as_str).collect();
        assert_eq!(names, vec!["carbs", "fats", "hydration", "protein"]);
        assert_eq!(
            snapshot.get("carbs").unwrap().value(),
            Some(&MetricValue::Quantity { amount: 120.0, unit: "g".to_string() })
        );
        assert_eq!(snapshot.get("fats").unwrap().outcome, MetricOutcome::NoValue);
        assert_eq!(snapshot.get("hydration").unwrap().outcome, MetricOutcome::NoValue);
    }

    #[tokio::test]
    async fn test_one_failure_keeps_other_results() {
        let mut provider = macros(&[("carbs", Some(120.0)), ("protein", Some(80.0)), ("fats", Some(40.0))]);
        provider.failing.insert("protein".to_string());
        let aggregator = SnapshotAggregator::new(Arc::new(provider));

        let snapshot = aggregator
            .fetch_snapshot(&totals(&["carbs", "protein", "fats"]))
            .await
            .unwrap();

        assert_eq!(snapshot.len(), 3);
        assert!(matches!(
            snapshot.get("protein").unwrap().outcome,
            MetricOutcome::Error { error: MetricError::MetricUnavailable(_) }
        ));
        assert!(snapshot.get("carbs").unwrap().value().is_some());
        assert!(snapshot.get("fats").unwrap().value().is_some());
    }

    #[tokio::test]
    async fn test_panicking_fetch_still_fills_slot() {
        let mut provider = macros(&[("carbs", Some(10.0))]);
        provider.panicking.insert("fats".to_string());
        let aggregator = SnapshotAggregator::new(Arc::new(provider));

        let snapshot = aggregator.fetch_snapshot(&totals(&["carbs", "fats"])).await.unwrap();
        assert_eq!(snapshot.len(), 2);
        assert!(snapshot.get("fats").unwrap().is_error());
        assert!(!snapshot.get("carbs").unwrap().is_error());
    }

    #[tokio::test]
    async fn test_malformed_range_makes_no_provider_calls() {
        let provider = Arc::new(MockProvider::default());
        let aggregator = SnapshotAggregator::new(provider.clone());

        let now = Utc::now();
        let bad = MetricQuery::total("carbs", DateRange::new(now, now - ChronoDuration::hours(1)));
        let result = aggregator.fetch_snapshot(&[bad]).await;

        assert!(matches!(result, Err(AggregateError::InvalidQuery(_))));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_validate_queries() {
        assert!(validate_queries(&[]).is_err());
        assert!(validate_queries(&totals(&["carbs", "carbs"])).is_err());
        assert!(validate_queries(&totals(&["carbs", "vitamin_d3"])).is_ok());
        assert!(validate_queries(&totals(&["Carbs", "dietary-water"])).is_ok());
    }

    #[tokio::test]
    async fn test_permission_denied_fills_every_slot() {
        let provider = Arc::new(MockProvider {
            denied: true,
            ..Default::default()
        });
        let aggregator = SnapshotAggregator::new(provider.clone());

        let snapshot = aggregator
            .fetch_snapshot(&totals(&["carbs", "protein"]))
            .await
            .unwrap();

        assert_eq!(snapshot.len(), 2);
        for result in snapshot.results.values() {
            assert!(matches!(
                result.outcome,
                MetricOutcome::Error { error: MetricError::ProviderUnavailable(_) }
            ));
        }
        // Only the access check reached the provider.
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_last_meal_empty_history_is_no_value() {
        let aggregator = SnapshotAggregator::new(Arc::new(MockProvider::default()));
        let query = MetricQuery::most_recent(LAST_MEAL, DateRange::trailing_day(Utc::now()));

        let snapshot = aggregator.fetch_snapshot(&[query]).await.unwrap();
        assert_eq!(snapshot.get(LAST_MEAL).unwrap().outcome, MetricOutcome::NoValue);
    }

    #[tokio::test]
    async fn test_fuel_check_reports_last_meal() {
        let now = Utc::now();
        let entry = |secs: i64| NutrientHistoryEntry {
            time: now - ChronoDuration::seconds(secs),
            nutrient: "carbs".to_string(),
            amount: 20.0,
            unit: "g".to_string(),
        };
        let provider = MockProvider {
            history: vec![entry(3600), entry(7200), entry(1800)],
            ..macros(&[("carbs", Some(60.0))])
        };
        let aggregator = SnapshotAggregator::new(Arc::new(provider));

        let snapshot = aggregator.fuel_check(now).await;
        assert_eq!(snapshot.len(), Nutrient::ALL.len() + 1);
        assert_eq!(
            snapshot.get(LAST_MEAL).unwrap().value(),
            Some(&MetricValue::Timestamp { at: now - ChronoDuration::seconds(1800) })
        );
    }

    #[tokio::test]
    async fn test_fetches_run_concurrently() {
        let provider = MockProvider {
            delay: Some(Duration::from_millis(200)),
            ..Default::default()
        };
        let aggregator = SnapshotAggregator::new(Arc::new(provider));

        let started = std::time::Instant::now();
        let snapshot = aggregator
            .fetch_snapshot(&totals(&["carbs", "protein", "fats", "calories", "hydration"]))
            .await
            .unwrap();

        assert_eq!(snapshot.len(), 5);
        // Sequential fetches would take a full second.
        assert!(started.elapsed() < Duration::from_millis(800));
    }

    #[tokio::test]
    async fn test_dropped_request_aborts_fetches() {
        let provider = Arc::new(MockProvider {
            delay: Some(Duration::from_millis(100)),
            ..Default::default()
        });
        let aggregator = SnapshotAggregator::new(provider.clone());
        let queries = totals(&["carbs", "protein"]);

        let result = tokio::time::timeout(Duration::from_millis(20), aggregator.fetch_snapshot(&queries)).await;
        assert!(result.is_err());

        tokio::time::sleep(Duration::from_millis(250)).await;
        assert_eq!(provider.completed.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_categorical_failure_mid_fetch_fills_every_slot() {
        let mut provider = macros(&[("carbs", Some(120.0)), ("protein", Some(80.0))]);
        provider.unavailable.insert("fats".to_string());
        let aggregator = SnapshotAggregator::new(Arc::new(provider));

        let snapshot = aggregator
            .fetch_snapshot(&totals(&["carbs", "protein", "fats"]))
            .await
            .unwrap();

        assert_eq!(snapshot.len(), 3);
        for result in snapshot.results.values() {
            assert!(matches!(
                result.outcome,
                MetricOutcome::Error { error: MetricError::ProviderUnavailable(_) }
            ));
        }
    }

    #[tokio::test]
    async fn test_names_are_not_restricted() {
        let aggregator = SnapshotAggregator::new(Arc::new(macros(&[("Carbs", Some(10.0))])));

        let snapshot = aggregator
            .fetch_snapshot(&totals(&["Carbs", "dietary-water"]))
            .await
            .unwrap();

        let names: Vec<&str> = snapshot.results.keys().map(String::as_str).collect();
        assert_eq!(names, vec!["Carbs", "dietary-water"]);
        assert!(snapshot.get("Carbs").unwrap().value().is_some());
    }
}
