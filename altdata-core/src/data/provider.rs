//! Source traits and structured error types.
//!
//! `RemoteLoader` abstracts the vendor data-access layer that hands out
//! long-format extracts; `PriceProvider` abstracts daily market history. Both
//! sit below the cache layer and know nothing about snapshots.

use super::dataset::DatasetKind;
use super::normalize::NormalizeError;
use super::schema::SchemaError;
use crate::domain::DailyBar;
use chrono::NaiveDate;
use polars::prelude::DataFrame;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Structured error types for data operations.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("network unreachable: {0}")]
    NetworkUnreachable(String),

    #[error("rate limited by provider (retry after {retry_after_secs}s)")]
    RateLimited { retry_after_secs: u64 },

    #[error("response format changed: {0}")]
    ResponseFormatChanged(String),

    #[error("authentication required: {0}")]
    AuthenticationRequired(String),

    #[error("symbol not found: {symbol}")]
    SymbolNotFound { symbol: String },

    #[error("hard stop: data provider has blocked requests (circuit breaker tripped)")]
    CircuitBreakerTripped,

    #[error("cache error: {0}")]
    CacheError(String),

    #[error("parquet I/O error: {0}")]
    ParquetError(String),

    #[error("object not found: s3://{bucket}/{key}")]
    ObjectNotFound { bucket: String, key: String },

    #[error("object store error: {0}")]
    ObjectStore(String),

    #[error("loader '{loader}' failed: {reason}")]
    Loader { loader: String, reason: String },

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Normalize(#[from] NormalizeError),

    #[error("data error: {0}")]
    Other(String),
}

/// Where a table came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataSource {
    Snapshot,
    RemoteExtract,
    YahooFinance,
}

/// Parameters of one extract call against the data-access layer.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractRequest {
    pub dataset: DatasetKind,
    /// Incremental generation, for feeds that ship more than one.
    pub generation: Option<u8>,
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    pub db_name: Option<String>,
    pub schema_name: Option<String>,
    /// `None` loads every ticker the feed covers.
    pub tickers: Option<Vec<String>>,
}

impl ExtractRequest {
    pub fn all_tickers(dataset: DatasetKind) -> Self {
        Self {
            dataset,
            generation: None,
            start: None,
            end: None,
            db_name: None,
            schema_name: None,
            tickers: None,
        }
    }

    pub fn generation(mut self, generation: u8) -> Self {
        self.generation = Some(generation);
        self
    }
}

/// Pulls long-format extracts from the external data-access layer.
pub trait RemoteLoader: Send + Sync {
    /// Human-readable name of this loader.
    fn name(&self) -> &str;

    /// Fetch the long-format table for a request.
    fn extract(&self, request: &ExtractRequest) -> Result<DataFrame, DataError>;
}

/// Result of a successful price fetch for a single symbol.
#[derive(Debug, Clone)]
pub struct FetchResult {
    pub symbol: String,
    pub bars: Vec<DailyBar>,
    pub source: DataSource,
}

/// Daily market history source (Yahoo Finance, mocks).
pub trait PriceProvider: Send + Sync {
    fn name(&self) -> &str;

    fn fetch(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<FetchResult, DataError>;

    /// Check if the provider is currently available (not rate-limited, not blocked).
    fn is_available(&self) -> bool;
}
