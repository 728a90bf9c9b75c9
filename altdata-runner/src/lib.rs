//! altdata runner: dataset pipelines on top of `altdata-core`.
//!
//! - TOML pipeline configuration with per-dataset database names
//! - Explicit data handler and pipeline context (no global state)
//! - Snapshot-or-extract loading with generation reconciliation
//! - Register operations for POS, retailer weekly, geolocation, market and
//!   fundamentals
//! - CSV export

pub mod config;
pub mod context;
pub mod data_loader;
pub mod export;
pub mod handler;
pub mod register;

pub use config::{ConfigError, PipelineConfig};
pub use context::PipelineContext;
pub use data_loader::{
    extract, load_dataset, load_pos, reload, reload_all_pos, LoadError, LoadOptions, LoadedDataset,
};
pub use export::{export_csv, write_csv};
pub use handler::{DataHandler, DataId, HandlerError, Universe};
pub use register::{
    register_fundamental, register_geolocation, register_market, register_pos,
    register_retailer_weekly, FundamentalSource, MarketRegistration, MarketSource,
};
