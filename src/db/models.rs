//! Database model types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One logged meal or intake event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NutrientHistoryEntry {
    pub time: DateTime<Utc>,
    pub nutrient: String,
    pub amount: f64,
    pub unit: String,
}

/// An integer value in the shared key-value area.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KvEntry {
    pub value: i64,
    pub updated_at: DateTime<Utc>,
}
