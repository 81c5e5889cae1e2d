//! Widget timeline provider.
//!
//! Keeps a current display entry for the water widget. The entry is rebuilt
//! whenever the counter signals a change, and on a fixed fallback interval
//! regardless of signals.

use crate::counter::{RefreshSignal, WaterCounter};

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, watch, Mutex};

/// One display entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TimelineEntry {
    pub date: DateTime<Utc>,
    pub water_intake: u64,
}

/// When the host should ask for a new timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "policy", content = "at", rename_all = "snake_case")]
pub enum ReloadPolicy {
    After(DateTime<Utc>),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Timeline {
    pub entries: Vec<TimelineEntry>,
    pub policy: ReloadPolicy,
}

pub struct TimelineProvider {
    counter: Arc<WaterCounter>,
    current: watch::Sender<TimelineEntry>,
    stop: Arc<Mutex<Option<broadcast::Sender<()>>>>,
}

impl TimelineProvider {
    pub fn new(counter: Arc<WaterCounter>) -> Self {
        let (current, _) = watch::channel(Self::placeholder());
        Self {
            counter,
            current,
            stop: Arc::new(Mutex::new(None)),
        }
    }

    /// Entry shown before any data has been read.
    pub fn placeholder() -> TimelineEntry {
        TimelineEntry {
            date: Utc::now(),
            water_intake: 0,
        }
    }

    /// A fresh entry read straight from the store.
    pub async fn snapshot(&self) -> TimelineEntry {
        let state = self.counter.read().await;
        TimelineEntry {
            date: Utc::now(),
            water_intake: state.count,
        }
    }

    /// A single-entry timeline that asks to be reloaded after the fallback
    /// interval.
    pub async fn timeline(&self) -> Timeline {
        let entry = self.snapshot().await;
        let interval = ChronoDuration::from_std(self.counter.refresh_interval())
            .unwrap_or_else(|_| ChronoDuration::minutes(15));
        Timeline {
            entries: vec![entry],
            policy: ReloadPolicy::After(entry.date + interval),
        }
    }

    /// The most recently published entry.
    pub fn current(&self) -> TimelineEntry {
        *self.current.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<TimelineEntry> {
        self.current.subscribe()
    }

    async fn reload(&self) {
        let entry = self.snapshot().await;
        self.current.send_replace(entry);
        tracing::debug!("Timeline reloaded: {} cups", entry.water_intake);
    }

    /// Start the reload loop in the background.
    pub async fn start(self: &Arc<Self>) {
        let (tx, _) = broadcast::channel(1);
        {
            let mut stop_guard = self.stop.lock().await;
            *stop_guard = Some(tx.clone());
        }

        // Subscribe before spawning so no signal sent after `start` returns
        // is missed.
        let mut stop_rx = tx.subscribe();
        let mut refresh_rx = self.counter.subscribe();
        let provider = self.clone();

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(provider.counter.refresh_interval());
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = stop_rx.recv() => break,
                    signal = refresh_rx.recv() => match signal {
                        Ok(RefreshSignal { count, .. }) => {
                            tracing::debug!("Refresh requested at {} cups", count);
                            provider.reload().await;
                        }
                        Err(RecvError::Lagged(skipped)) => {
                            tracing::debug!("Coalesced {} refresh signals", skipped);
                            provider.reload().await;
                        }
                        Err(RecvError::Closed) => break,
                    },
                    _ = interval.tick() => {
                        provider.reload().await;
                    }
                }
            }

            tracing::info!("Timeline provider stopped");
        });
    }

    /// Stop the reload loop.
    pub async fn stop(&self) {
        let stop = self.stop.lock().await;
        if let Some(tx) = stop.as_ref() {
            let _ = tx.send(());
        }
    }
}
