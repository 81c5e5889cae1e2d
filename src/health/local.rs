//! Provider backed by the local nutrient sample log.

use super::{DateRange, HealthDataProvider, Nutrient, ProviderError};
use crate::db::{DbError, NutrientHistoryEntry, Store};

use async_trait::async_trait;
use std::sync::Arc;

/// Reads totals and history from the `nutrient_samples` table.
pub struct LocalHealthProvider {
    store: Arc<Store>,
}

impl LocalHealthProvider {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }

    async fn with_store<T, F>(&self, f: F) -> Result<T, ProviderError>
    where
        T: Send + 'static,
        F: FnOnce(&Store) -> Result<T, DbError> + Send + 'static,
    {
        let store = self.store.clone();
        tokio::task::spawn_blocking(move || f(store.as_ref()))
            .await
            .map_err(|e| ProviderError::Query(e.to_string()))?
            .map_err(|e| match e {
                DbError::Poisoned => ProviderError::Unavailable(e.to_string()),
                other => ProviderError::Query(other.to_string()),
            })
    }
}

#[async_trait]
impl HealthDataProvider for LocalHealthProvider {
    async fn check_access(&self) -> Result<(), ProviderError> {
        let store = self.store.clone();
        tokio::task::spawn_blocking(move || store.ping())
            .await
            .map_err(|e| ProviderError::Unavailable(e.to_string()))?
            .map_err(|e| ProviderError::Unavailable(e.to_string()))
    }

    async fn query_metric(&self, name: &str, range: &DateRange) -> Result<Option<f64>, ProviderError> {
        let nutrient = Nutrient::from_name(name)
            .ok_or_else(|| ProviderError::Query(format!("unknown metric: {}", name)))?;
        let range = *range;
        self.with_store(move |store| store.sum_nutrient(nutrient.name(), range.start, range.end))
            .await
    }

    async fn query_history(&self, range: &DateRange) -> Result<Vec<NutrientHistoryEntry>, ProviderError> {
        let range = *range;
        self.with_store(move |store| store.get_nutrient_history(range.start, range.end))
            .await
    }
}
