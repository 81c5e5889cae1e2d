//! Shared daily water-intake counter.
//!
//! The count lives in the shared key-value area so the widget action and
//! the app's manual entry both mutate the same value. Increments go through
//! the store's atomic add; reads never fail and degrade to zero.

use crate::db::{DbError, KvEntry, Store};

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::broadcast;

/// Key the count is stored under.
pub const WATER_INTAKE_KEY: &str = "dailyWaterIntake";

/// Fallback refresh interval for anything displaying the count.
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(15 * 60);

/// Counter error types.
#[derive(Error, Debug)]
pub enum CounterError {
    #[error("shared store unavailable: {0}")]
    StoreUnavailable(String),
    #[error("cannot add {0} cups")]
    InvalidAmount(u64),
}

/// Process-shared integer storage.
///
/// `add_int` must be atomic: concurrent adds from any number of handles are
/// all reflected in the final value.
pub trait KeyValueStore: Send + Sync {
    fn get_int(&self, key: &str) -> Result<Option<KvEntry>, DbError>;
    fn set_int(&self, key: &str, value: i64) -> Result<KvEntry, DbError>;
    fn add_int(&self, key: &str, delta: i64) -> Result<KvEntry, DbError>;
}

impl KeyValueStore for Store {
    fn get_int(&self, key: &str) -> Result<Option<KvEntry>, DbError> {
        self.get_kv(key)
    }

    fn set_int(&self, key: &str, value: i64) -> Result<KvEntry, DbError> {
        self.set_kv(key, value)
    }

    fn add_int(&self, key: &str, delta: i64) -> Result<KvEntry, DbError> {
        self.add_kv(key, delta)
    }
}

/// Broadcast after every successful mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshSignal {
    pub count: u64,
    pub at: DateTime<Utc>,
}

/// Current counter state as seen by readers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WaterCounterState {
    pub count: u64,
    pub last_updated: Option<DateTime<Utc>>,
    pub next_refresh: DateTime<Utc>,
}

pub struct WaterCounter {
    store: Arc<dyn KeyValueStore>,
    refresh_tx: broadcast::Sender<RefreshSignal>,
    refresh_interval: Duration,
}

impl WaterCounter {
    pub fn new(store: Arc<dyn KeyValueStore>, refresh_interval: Duration) -> Self {
        let (refresh_tx, _) = broadcast::channel(16);
        Self {
            store,
            refresh_tx,
            refresh_interval,
        }
    }

    pub fn refresh_interval(&self) -> Duration {
        self.refresh_interval
    }

    /// Receive a signal after every successful increment.
    pub fn subscribe(&self) -> broadcast::Receiver<RefreshSignal> {
        self.refresh_tx.subscribe()
    }

    /// Widget "Add Cup" action.
    pub async fn increment(&self) -> Result<u64, CounterError> {
        self.add(1).await
    }

    /// Add `cups` atomically and return the new count.
    pub async fn add(&self, cups: u64) -> Result<u64, CounterError> {
        if cups == 0 {
            return Ok(self.read().await.count);
        }
        let delta = i64::try_from(cups).map_err(|_| CounterError::InvalidAmount(cups))?;

        let store = self.store.clone();
        let entry = tokio::task::spawn_blocking(move || store.add_int(WATER_INTAKE_KEY, delta))
            .await
            .map_err(|e| CounterError::StoreUnavailable(e.to_string()))?
            .map_err(|e| {
                tracing::error!("Failed to add {} cups: {}", cups, e);
                CounterError::StoreUnavailable(e.to_string())
            })?;

        let count = u64::try_from(entry.value).map_err(|_| {
            CounterError::StoreUnavailable(format!("stored count {} is negative", entry.value))
        })?;

        // No subscribers is fine; the periodic refresh still picks it up.
        let _ = self.refresh_tx.send(RefreshSignal {
            count,
            at: entry.updated_at,
        });
        tracing::debug!("Water intake now {} cups", count);

        Ok(count)
    }

    /// Overwrite the count from the app's manual-entry screen.
    ///
    /// Races with a concurrent `add` resolve as last write wins.
    pub async fn set(&self, count: u64) -> Result<u64, CounterError> {
        let value = i64::try_from(count).map_err(|_| CounterError::InvalidAmount(count))?;

        let store = self.store.clone();
        let entry = tokio::task::spawn_blocking(move || store.set_int(WATER_INTAKE_KEY, value))
            .await
            .map_err(|e| CounterError::StoreUnavailable(e.to_string()))?
            .map_err(|e| {
                tracing::error!("Failed to set water intake to {}: {}", count, e);
                CounterError::StoreUnavailable(e.to_string())
            })?;

        let _ = self.refresh_tx.send(RefreshSignal {
            count,
            at: entry.updated_at,
        });
        Ok(count)
    }

    /// Read the current count. Store failures read as a fresh counter.
    pub async fn read(&self) -> WaterCounterState {
        let store = self.store.clone();
        let entry = match tokio::task::spawn_blocking(move || store.get_int(WATER_INTAKE_KEY)).await {
            Ok(Ok(entry)) => entry,
            Ok(Err(e)) => {
                tracing::warn!("Water intake unreadable, using default: {}", e);
                None
            }
            Err(e) => {
                tracing::warn!("Water intake read task failed: {}", e);
                None
            }
        };

        let (count, last_updated) = match entry {
            Some(KvEntry { value, updated_at }) => match u64::try_from(value) {
                Ok(count) => (count, Some(updated_at)),
                Err(_) => {
                    tracing::warn!("Ignoring corrupt water intake value {}", value);
                    (0, None)
                }
            },
            None => (0, None),
        };

        WaterCounterState {
            count,
            last_updated,
            next_refresh: Utc::now() + self.refresh_chrono(),
        }
    }

    fn refresh_chrono(&self) -> ChronoDuration {
        ChronoDuration::from_std(self.refresh_interval).unwrap_or_else(|_| ChronoDuration::minutes(15))
    }
}
