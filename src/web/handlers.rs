//! HTTP request handlers.

use super::AppState;
use crate::aggregator::{AggregateError, HealthSnapshot, MetricOutcome, MetricQuery};
use crate::db::NutrientHistoryEntry;
use crate::health::Nutrient;
use crate::plans::{plans_for, PlanCategory, PERFORMANCE_RECOMMENDATIONS};
use crate::timeline::{Timeline, TimelineEntry};

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ============================================================================
// API: Snapshots
// ============================================================================

#[derive(Debug, Serialize)]
pub struct MetricView {
    pub name: String,
    #[serde(flatten)]
    pub outcome: MetricOutcome,
    pub display: String,
}

#[derive(Debug, Serialize)]
pub struct SnapshotResponse {
    pub captured_at: DateTime<Utc>,
    pub metrics: Vec<MetricView>,
}

impl From<HealthSnapshot> for SnapshotResponse {
    fn from(snapshot: HealthSnapshot) -> Self {
        let metrics = snapshot
            .results
            .into_values()
            .map(|r| MetricView {
                display: r.display(),
                name: r.name,
                outcome: r.outcome,
            })
            .collect();
        Self {
            captured_at: snapshot.captured_at,
            metrics,
        }
    }
}

pub async fn handle_get_snapshot(State(state): State<AppState>) -> impl IntoResponse {
    let snapshot = state.aggregator.fuel_check(Utc::now()).await;
    Json(SnapshotResponse::from(snapshot))
}

#[derive(Debug, Deserialize)]
pub struct SnapshotRequest {
    pub queries: Vec<MetricQuery>,
}

pub async fn handle_post_snapshot(
    State(state): State<AppState>,
    Json(req): Json<SnapshotRequest>,
) -> impl IntoResponse {
    match state.aggregator.fetch_snapshot(&req.queries).await {
        Ok(snapshot) => Json(SnapshotResponse::from(snapshot)).into_response(),
        Err(e @ AggregateError::InvalidQuery(_)) => (StatusCode::BAD_REQUEST, e.to_string()).into_response(),
    }
}

// ============================================================================
// API: Water counter
// ============================================================================

pub async fn handle_get_water(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.counter.read().await)
}

/// Widget "Add Cup" action. Store failures are logged and the current
/// (possibly default) state is returned.
pub async fn handle_increment_water(State(state): State<AppState>) -> impl IntoResponse {
    if let Err(e) = state.counter.increment().await {
        tracing::warn!("Add cup failed: {}", e);
    }
    Json(state.counter.read().await)
}

#[derive(Debug, Deserialize)]
pub struct AddWaterRequest {
    pub cups: u64,
}

pub async fn handle_add_water(
    State(state): State<AppState>,
    Json(req): Json<AddWaterRequest>,
) -> impl IntoResponse {
    if let Err(e) = state.counter.add(req.cups).await {
        tracing::warn!("Manual water entry of {} cups failed: {}", req.cups, e);
    }
    Json(state.counter.read().await)
}

#[derive(Debug, Deserialize)]
pub struct SetWaterRequest {
    pub count: u64,
}

pub async fn handle_set_water(
    State(state): State<AppState>,
    Json(req): Json<SetWaterRequest>,
) -> impl IntoResponse {
    if let Err(e) = state.counter.set(req.count).await {
        tracing::warn!("Setting water intake to {} failed: {}", req.count, e);
    }
    Json(state.counter.read().await)
}

#[derive(Debug, Serialize)]
pub struct TimelineResponse {
    /// Entry last published by the refresh loop.
    pub current: TimelineEntry,
    #[serde(flatten)]
    pub timeline: Timeline,
}

pub async fn handle_get_timeline(State(state): State<AppState>) -> impl IntoResponse {
    Json(TimelineResponse {
        current: state.timeline.current(),
        timeline: state.timeline.timeline().await,
    })
}

// ============================================================================
// API: Nutrient log
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct NutrientsQuery {
    #[serde(default)]
    pub hours: Option<i64>,
}

pub async fn handle_get_nutrients(
    State(state): State<AppState>,
    Query(query): Query<NutrientsQuery>,
) -> impl IntoResponse {
    let hours = query.hours.unwrap_or(24);
    if hours <= 0 {
        return (StatusCode::BAD_REQUEST, "hours must be positive").into_response();
    }

    let end = Utc::now();
    let Some(start) = ChronoDuration::try_hours(hours).and_then(|d| end.checked_sub_signed(d)) else {
        return (StatusCode::BAD_REQUEST, "hours is out of range").into_response();
    };

    match state.store.get_nutrient_history(start, end) {
        Ok(entries) => Json(entries).into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}

#[derive(Debug, Deserialize)]
pub struct LogSample {
    pub nutrient: String,
    pub amount: f64,
    #[serde(default)]
    pub time: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub struct LogNutrientsRequest {
    pub samples: Vec<LogSample>,
}

pub async fn handle_log_nutrients(
    State(state): State<AppState>,
    Json(req): Json<LogNutrientsRequest>,
) -> impl IntoResponse {
    let now = Utc::now();
    let mut entries = Vec::with_capacity(req.samples.len());

    for s in req.samples {
        let Some(nutrient) = Nutrient::from_name(&s.nutrient) else {
            return (StatusCode::BAD_REQUEST, format!("Unknown nutrient: {}", s.nutrient)).into_response();
        };
        if !s.amount.is_finite() || s.amount <= 0.0 {
            return (StatusCode::BAD_REQUEST, "Amount must be positive").into_response();
        }
        entries.push(NutrientHistoryEntry {
            time: s.time.unwrap_or(now),
            nutrient: nutrient.name().to_string(),
            amount: s.amount,
            unit: nutrient.unit().to_string(),
        });
    }

    match state.store.add_nutrient_samples(&entries) {
        Ok(_) => (StatusCode::CREATED, Json(entries)).into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}

// ============================================================================
// API: Plans
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct PlansQuery {
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub start: Option<String>,
}

pub async fn handle_get_plans(Query(query): Query<PlansQuery>) -> impl IntoResponse {
    let start = query
        .start
        .as_ref()
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(Utc::now);

    let categories = match query.category.as_deref() {
        None => PlanCategory::ALL.to_vec(),
        Some(name) => match PlanCategory::parse(name) {
            Some(c) => vec![c],
            None => return (StatusCode::BAD_REQUEST, "Invalid plan category").into_response(),
        },
    };

    let plans: BTreeMap<String, _> = categories
        .into_iter()
        .map(|c| (c.name().to_string(), plans_for(c, start)))
        .collect();

    Json(plans).into_response()
}

pub async fn handle_get_recommendations() -> impl IntoResponse {
    Json(PERFORMANCE_RECOMMENDATIONS)
}
