//! Register operations: load a dataset, shape it, hand it to the
//! `DataHandler` under its alias.

use crate::context::PipelineContext;
use crate::data_loader::{load_dataset, load_pos, LoadError, LoadOptions};
use crate::handler::{DataHandler, DataId};
use altdata_core::data::dataset::DatasetKind;
use altdata_core::data::market::fetch_market_history;
use altdata_core::data::object_store::{read_table, write_table};
use altdata_core::data::transform::log_diff;
use altdata_core::domain::WideTable;
use chrono::NaiveDate;
use tracing::{info, warn};

/// Origin tag of vendor feeds in the handler.
pub const EXTERNAL: &str = "external";
/// Provenance tag of vendor feeds in the handler.
pub const SAMPLE: &str = "sample";

/// Market snapshot file under the data directory.
pub const MARKET_FILE: &str = "market_on_mongo.parquet";
/// Object key of the year-over-year fundamentals table.
pub const FUNDAMENTAL_KEY: &str = "common/fundamental_yoy_on_mongo.parquet";
pub const FUNDAMENTAL_PERIODS: usize = 4;
pub const FUNDAMENTAL_SUFFIX: &str = "_yoy";

pub const MARKET_ALIAS: &str = "market";
pub const FUNDAMENTAL_ALIAS: &str = "funda";

/// Ticker conversion applied before registration.
pub type TickerMap<'a> = &'a dyn Fn(&str) -> String;

pub fn register_pos(
    handler: &mut DataHandler,
    ctx: &PipelineContext<'_>,
    kind: DatasetKind,
    opts: &LoadOptions,
    convert: Option<TickerMap<'_>>,
) -> Result<DataId, LoadError> {
    let loaded = load_pos(ctx, kind, opts)?;
    register_converted(handler, loaded.table, kind.alias(), convert)
}

/// Retailer weekly has no snapshot; every call extracts.
pub fn register_retailer_weekly(
    handler: &mut DataHandler,
    ctx: &PipelineContext<'_>,
    opts: &LoadOptions,
    convert: Option<TickerMap<'_>>,
) -> Result<DataId, LoadError> {
    let loaded = load_dataset(ctx, DatasetKind::RetailerWeekly, opts)?;
    register_converted(handler, loaded.table, DatasetKind::RetailerWeekly.alias(), convert)
}

/// Foot traffic summed per ticker, restricted to `tickers` when non-empty.
///
/// The extract always covers every ticker so the snapshot stays complete;
/// the restriction is applied afterwards.
pub fn register_geolocation(
    handler: &mut DataHandler,
    ctx: &PipelineContext<'_>,
    tickers: &[String],
    opts: &LoadOptions,
) -> Result<DataId, LoadError> {
    let opts = LoadOptions {
        tickers: None,
        ..opts.clone()
    };
    let mut table = load_dataset(ctx, DatasetKind::Geolocation, &opts)?.table;
    if !tickers.is_empty() {
        table.retain_entities(|t| tickers.iter().any(|k| k == t));
    }
    register_converted(handler, table, DatasetKind::Geolocation.alias(), None)
}

/// Where market history comes from.
pub enum MarketSource<'a> {
    /// The market snapshot in the data directory.
    Snapshot,
    /// The context's price provider, over the universe of `base_ids`.
    Provider { base_ids: &'a [DataId], end: NaiveDate },
}

#[derive(Debug, Clone, PartialEq)]
pub struct MarketRegistration {
    pub id: DataId,
    /// Tickers the provider had no history for.
    pub missing: Vec<String>,
}

pub fn register_market(
    handler: &mut DataHandler,
    ctx: &PipelineContext<'_>,
    source: MarketSource<'_>,
) -> Result<MarketRegistration, LoadError> {
    let (table, missing) = match source {
        MarketSource::Snapshot => (ctx.snapshots.read(MARKET_FILE)?, Vec::new()),
        MarketSource::Provider { base_ids, end } => {
            let provider = ctx
                .prices
                .ok_or_else(|| LoadError::Missing("no price provider configured".into()))?;
            let universe = handler.universe(base_ids)?;
            let tickers: Vec<String> = universe.tickers.into_iter().collect();
            info!(
                provider = provider.name(),
                tickers = tickers.len(),
                start = %universe.start.date(),
                "fetching market history"
            );
            let history = fetch_market_history(
                provider,
                &tickers,
                universe.start.date(),
                end,
                &ctx.config.exchange_suffix,
            )?;
            if !history.missing.is_empty() {
                warn!(missing = %history.missing.join(","), "tickers without market data");
            }
            (history.table, history.missing)
        }
    };

    let id = handler.set_raw_data(table, EXTERNAL, SAMPLE);
    handler.set_alias(id, MARKET_ALIAS)?;
    Ok(MarketRegistration { id, missing })
}

/// Where fundamentals come from.
pub enum FundamentalSource {
    /// Raw quarterly levels; converted to log differences and stored.
    Fresh(WideTable),
    /// Previously stored year-over-year table.
    Stored,
}

pub fn register_fundamental(
    handler: &mut DataHandler,
    ctx: &PipelineContext<'_>,
    source: FundamentalSource,
) -> Result<DataId, LoadError> {
    let bucket = ctx.config.bucket.as_str();
    let table = match source {
        FundamentalSource::Fresh(levels) => {
            let yoy = log_diff(&levels, FUNDAMENTAL_PERIODS, FUNDAMENTAL_SUFFIX);
            write_table(ctx.objects, &yoy, bucket, FUNDAMENTAL_KEY)?;
            info!(bucket, key = FUNDAMENTAL_KEY, rows = yoy.len(), "stored fundamentals");
            yoy
        }
        FundamentalSource::Stored => read_table(ctx.objects, bucket, FUNDAMENTAL_KEY)?,
    };

    let id = handler.set_raw_data(table, EXTERNAL, SAMPLE);
    handler.set_alias(id, FUNDAMENTAL_ALIAS)?;
    Ok(id)
}

fn register_converted(
    handler: &mut DataHandler,
    table: WideTable,
    alias: &str,
    convert: Option<TickerMap<'_>>,
) -> Result<DataId, LoadError> {
    let table = match convert {
        Some(f) => table.rename_entities(f)?,
        None => table,
    };
    let id = handler.set_raw_data(table, EXTERNAL, SAMPLE);
    handler.set_alias(id, alias)?;
    Ok(id)
}
