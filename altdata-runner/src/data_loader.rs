//! Dataset loading for the runner.
//!
//! Fallback policy for datasets that keep a snapshot:
//! 1. Snapshot present and readable → use it
//! 2. Snapshot missing or corrupt (quarantined) → extract remotely, normalize,
//!    reconcile generations, write the snapshot. A narrowed extract (tickers
//!    or date window) is returned but never written.
//! 3. Any other snapshot I/O failure → fail
//!
//! Remote failures always propagate; there is no retry and no partial result.

use crate::context::PipelineContext;
use altdata_core::data::dataset::DatasetKind;
use altdata_core::data::frame::{observations_from_frame, points_from_frame, text_values};
use altdata_core::data::normalize::{normalize, NormalizeError, VintagePolicy};
use altdata_core::data::provider::{DataError, DataSource, ExtractRequest};
use altdata_core::data::reconcile::{reconcile_with_summary, ReconcileSummary};
use altdata_core::data::schema::SchemaError;
use altdata_core::data::snapshot::CacheMiss;
use altdata_core::data::transform::{
    aggregate_sum, company_totals, weekly_resample, CompanyObservation, WEEKLY_SUM_COLUMNS,
};
use altdata_core::domain::{KeyCollision, WideTable};
use chrono::NaiveDate;
use std::collections::BTreeSet;
use thiserror::Error;
use tracing::{info, warn};

/// Column naming the reporting company in retailer extracts.
pub const COMPANY_COLUMN: &str = "COMPANY_ID";

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("'{0}' is not a POS dataset")]
    NotPos(DatasetKind),

    #[error("'{0}' has no snapshot to reload")]
    NoSnapshot(DatasetKind),

    #[error("snapshot unreadable: {0}")]
    Cache(#[from] CacheMiss),

    #[error("data error: {0}")]
    Data(#[from] DataError),

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Normalize(#[from] NormalizeError),

    #[error(transparent)]
    Rename(#[from] KeyCollision),

    #[error(transparent)]
    Handler(#[from] crate::handler::HandlerError),

    #[error("{0}")]
    Missing(String),
}

#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    pub start: Option<NaiveDate>,
    /// Inclusive.
    pub end: Option<NaiveDate>,
    /// Overrides config and environment.
    pub db_name: Option<String>,
    pub schema_name: Option<String>,
    /// `None` loads every ticker.
    pub tickers: Option<Vec<String>>,
    /// Skip the snapshot even when present.
    pub force: bool,
}

impl LoadOptions {
    /// No ticker list and no date window: the extract covers the whole feed.
    pub fn is_unfiltered(&self) -> bool {
        self.tickers.is_none() && self.start.is_none() && self.end.is_none()
    }
}

/// A loaded table with its provenance.
#[derive(Debug, Clone)]
pub struct LoadedDataset {
    pub kind: DatasetKind,
    pub table: WideTable,
    pub source: DataSource,
    /// Set when two generations were merged.
    pub reconcile: Option<ReconcileSummary>,
}

/// Cache-or-load for one of the three POS datasets.
pub fn load_pos(
    ctx: &PipelineContext<'_>,
    kind: DatasetKind,
    opts: &LoadOptions,
) -> Result<LoadedDataset, LoadError> {
    if !DatasetKind::POS.contains(&kind) {
        return Err(LoadError::NotPos(kind));
    }
    load_dataset(ctx, kind, opts)
}

/// Cache-or-load for any dataset. Loader-only datasets always extract.
pub fn load_dataset(
    ctx: &PipelineContext<'_>,
    kind: DatasetKind,
    opts: &LoadOptions,
) -> Result<LoadedDataset, LoadError> {
    let Some(file) = kind.snapshot_file() else {
        return extract(ctx, kind, opts);
    };

    if !opts.force {
        match ctx.snapshots.read(file) {
            Ok(table) => {
                info!(dataset = %kind, rows = table.len(), "loaded from snapshot");
                return Ok(LoadedDataset {
                    kind,
                    table,
                    source: DataSource::Snapshot,
                    reconcile: None,
                });
            }
            Err(miss) if miss.is_recoverable() => {
                info!(dataset = %kind, reason = %miss, "snapshot miss, extracting by loader");
            }
            Err(miss) => return Err(miss.into()),
        }
    }

    let loaded = extract(ctx, kind, opts)?;
    if opts.is_unfiltered() {
        ctx.snapshots.write(file, &loaded.table, ctx.loader.name())?;
    } else {
        info!(dataset = %kind, "narrowed extract, snapshot left untouched");
    }
    Ok(loaded)
}

/// Extract remotely and overwrite the snapshot.
///
/// Always extracts every ticker; a ticker list in `opts` is ignored. The date
/// window is honoured.
pub fn reload(
    ctx: &PipelineContext<'_>,
    kind: DatasetKind,
    opts: &LoadOptions,
) -> Result<LoadedDataset, LoadError> {
    let file = kind.snapshot_file().ok_or(LoadError::NoSnapshot(kind))?;
    let opts = LoadOptions {
        tickers: None,
        ..opts.clone()
    };
    let loaded = extract(ctx, kind, &opts)?;
    let meta = ctx.snapshots.write(file, &loaded.table, ctx.loader.name())?;
    info!(dataset = %kind, rows = meta.rows, hash = %meta.data_hash, "snapshot reloaded");
    Ok(loaded)
}

/// Reload the three POS datasets; returns every ticker they cover.
pub fn reload_all_pos(
    ctx: &PipelineContext<'_>,
    opts: &LoadOptions,
) -> Result<BTreeSet<String>, LoadError> {
    let mut tickers = BTreeSet::new();
    for kind in DatasetKind::POS {
        let loaded = reload(ctx, kind, opts)?;
        tickers.extend(loaded.table.entities());
    }
    Ok(tickers)
}

/// Remote extraction and shaping, no snapshot involved.
pub fn extract(
    ctx: &PipelineContext<'_>,
    kind: DatasetKind,
    opts: &LoadOptions,
) -> Result<LoadedDataset, LoadError> {
    let base = request(ctx, kind, opts);
    let mut reconcile = None;

    let table = match kind {
        DatasetKind::PosConsumerGoods => {
            let gen1 = extract_normalized(ctx, &base.clone().generation(1))?;
            // Generation 2 is always pulled from the start of its history.
            let mut gen2_request = base.generation(2);
            gen2_request.start = None;
            let gen2 = extract_normalized(ctx, &gen2_request)?;

            let (merged, summary) = reconcile_with_summary(gen1, gen2);
            info!(
                dataset = %kind,
                from_gen1 = summary.from_gen1,
                from_gen2 = summary.from_gen2,
                superseded = summary.superseded,
                "generations reconciled"
            );
            reconcile = Some(summary);
            merged
        }
        DatasetKind::PosElectronics | DatasetKind::PosRetailer => extract_normalized(ctx, &base)?,
        DatasetKind::RetailerWeekly => {
            let df = ctx.loader.extract(&base)?;
            let observations = observations_from_frame(&df, &kind.column_names())?;
            let companies = text_values(&df, COMPANY_COLUMN)?;
            let records = observations
                .into_iter()
                .zip(companies)
                .map(|(observation, company)| CompanyObservation {
                    company_id: company.unwrap_or_default(),
                    observation,
                });
            let totals = company_totals(records, VintagePolicy::Oldest, ctx.config.tie_break)?;
            weekly_resample(&totals, WEEKLY_SUM_COLUMNS)
        }
        DatasetKind::Geolocation => {
            let df = ctx.loader.extract(&base)?;
            aggregate_sum(points_from_frame(&df, &kind.column_names())?)
        }
    };

    if table.is_empty() {
        warn!(dataset = %kind, "extract produced no rows");
    }
    Ok(LoadedDataset {
        kind,
        table,
        source: DataSource::RemoteExtract,
        reconcile,
    })
}

fn extract_normalized(
    ctx: &PipelineContext<'_>,
    request: &ExtractRequest,
) -> Result<WideTable, LoadError> {
    let df = ctx.loader.extract(request)?;
    info!(
        loader = ctx.loader.name(),
        dataset = %request.dataset,
        generation = ?request.generation,
        rows = df.height(),
        "extract received"
    );
    let records = observations_from_frame(&df, &request.dataset.column_names())?;
    Ok(normalize(records, ctx.config.tie_break)?)
}

fn request(ctx: &PipelineContext<'_>, kind: DatasetKind, opts: &LoadOptions) -> ExtractRequest {
    ExtractRequest {
        dataset: kind,
        generation: None,
        start: opts.start,
        end: opts.end,
        db_name: ctx.config.database_for(kind, opts.db_name.as_deref()),
        schema_name: opts
            .schema_name
            .clone()
            .or_else(|| ctx.config.schema_name.clone()),
        tickers: opts.tickers.clone(),
    }
}
