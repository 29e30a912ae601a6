//! Persistence seam used by the importer.

use async_trait::async_trait;
use thiserror::Error;

use crate::subscriptions::model::NewSubscription;

#[derive(Debug, Error)]
pub enum StoreError {
    /// Unique constraint on the client name was hit.
    #[error("duplicate client: {0}")]
    Duplicate(String),

    #[error("storage error: {0}")]
    Backend(String),
}

impl StoreError {
    pub fn from_sqlx(err: sqlx::Error, client_name: &str) -> Self {
        let unique_violation = err
            .as_database_error()
            .and_then(|db| db.code())
            .is_some_and(|code| code == "23505");
        if unique_violation {
            StoreError::Duplicate(client_name.to_string())
        } else {
            StoreError::Backend(err.to_string())
        }
    }
}

#[async_trait]
pub trait SubscriptionSink: Send + Sync {
    /// Insert-or-update every row keyed on the case-insensitive client name.
    /// Rows must already be unique by that key.
    async fn upsert_batch(&self, batch: &[NewSubscription]) -> Result<(), StoreError>;

    /// Case-insensitive existence check on the client name.
    async fn exists_by_name(&self, client_name: &str) -> Result<bool, StoreError>;

    async fn insert(&self, row: &NewSubscription) -> Result<(), StoreError>;
}
