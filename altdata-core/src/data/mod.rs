//! Data loading, caching and normalization

pub mod circuit_breaker;
pub mod dataset;
pub mod extract;
pub mod frame;
pub mod market;
pub mod normalize;
pub mod object_store;
pub mod provider;
pub mod reconcile;
pub mod schema;
pub mod snapshot;
pub mod transform;
pub mod yahoo;

pub use circuit_breaker::CircuitBreaker;
pub use dataset::DatasetKind;
pub use extract::ParquetExtractLoader;
pub use frame::{observations_from_frame, points_from_frame, wide_from_dataframe, wide_to_dataframe};
pub use market::{fetch_market_history, MarketHistory, DEFAULT_EXCHANGE_SUFFIX};
pub use normalize::{normalize, NormalizeError, VintagePolicy, VintageTieBreak};
pub use object_store::{read_table, write_table, LocalObjectStore, ObjectStore, DEFAULT_BUCKET};
pub use provider::{DataError, DataSource, ExtractRequest, FetchResult, PriceProvider, RemoteLoader};
pub use reconcile::{reconcile, ReconcileSummary};
pub use schema::{ColumnNames, LongSchema, SchemaError};
pub use snapshot::{CacheMiss, SnapshotMeta, SnapshotStatus, SnapshotStore};
pub use yahoo::YahooProvider;
