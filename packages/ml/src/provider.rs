//! Historical data provider abstraction.
//!
//! The engine only ever asks for "the most recent N readings". The
//! [`DatabaseProvider`] answers that from the campus store; tests substitute
//! in-memory providers.

use std::sync::Arc;

use campus_air_database::{DbError, queries};
use campus_air_database_models::HistoricalRecord;
use switchy_database::Database;
use thiserror::Error;

/// Errors raised by a [`HistoricalDataProvider`].
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The backing store failed.
    #[error("Store error: {0}")]
    Database(#[from] DbError),

    /// The provider could not serve the request.
    #[error("Provider unavailable: {message}")]
    Unavailable {
        /// Description of what went wrong.
        message: String,
    },
}

/// Source of historical air quality readings.
#[async_trait::async_trait]
pub trait HistoricalDataProvider: Send + Sync {
    /// Returns up to `limit` readings, most recent first.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError`] if the readings cannot be fetched.
    async fn get_recent(&self, limit: u32) -> Result<Vec<HistoricalRecord>, ProviderError>;
}

/// [`HistoricalDataProvider`] backed by the campus `SQLite` store.
#[derive(Clone)]
pub struct DatabaseProvider {
    db: Arc<dyn Database>,
}

impl DatabaseProvider {
    /// Wraps an open store connection.
    #[must_use]
    pub fn new(db: Arc<dyn Database>) -> Self {
        Self { db }
    }
}

#[async_trait::async_trait]
impl HistoricalDataProvider for DatabaseProvider {
    async fn get_recent(&self, limit: u32) -> Result<Vec<HistoricalRecord>, ProviderError> {
        Ok(queries::get_recent_air_quality(self.db.as_ref(), limit).await?)
    }
}
