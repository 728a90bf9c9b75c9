//! Remote loader backed by Parquet extract drops on disk.
//!
//! Layout: `{root}/{database}/{slug}[_gen{n}].parquet`, the database level
//! omitted when the request names none.

use super::provider::{DataError, ExtractRequest, RemoteLoader};
use chrono::NaiveDate;
use polars::prelude::*;
use std::path::PathBuf;
use tracing::{debug, info};

pub struct ParquetExtractLoader {
    root: PathBuf,
}

impl ParquetExtractLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn extract_path(&self, request: &ExtractRequest) -> PathBuf {
        let mut path = self.root.clone();
        if let Some(db) = &request.db_name {
            path.push(db);
        }
        let file = match request.generation {
            Some(n) => format!("{}_gen{n}.parquet", request.dataset.slug()),
            None => format!("{}.parquet", request.dataset.slug()),
        };
        path.join(file)
    }

    fn loader_error(&self, reason: impl Into<String>) -> DataError {
        DataError::Loader {
            loader: self.name().to_string(),
            reason: reason.into(),
        }
    }
}

impl RemoteLoader for ParquetExtractLoader {
    fn name(&self) -> &str {
        "parquet-extract"
    }

    fn extract(&self, request: &ExtractRequest) -> Result<DataFrame, DataError> {
        let path = self.extract_path(request);
        if !path.exists() {
            return Err(self.loader_error(format!("no extract at {}", path.display())));
        }
        info!(
            dataset = %request.dataset,
            generation = ?request.generation,
            path = %path.display(),
            "extracting"
        );

        let names = request.dataset.column_names();
        let mut lf = LazyFrame::scan_parquet(&path, Default::default())
            .map_err(|e| self.loader_error(e.to_string()))?;

        let time_ms = || {
            col(names.time.as_str())
                .cast(DataType::Datetime(TimeUnit::Milliseconds, None))
                .cast(DataType::Int64)
        };
        if let Some(start) = request.start {
            lf = lf.filter(time_ms().gt_eq(lit(day_start_millis(start))));
        }
        if let Some(end) = request.end {
            // End date is inclusive.
            let next = end.succ_opt().unwrap_or(end);
            lf = lf.filter(time_ms().lt(lit(day_start_millis(next))));
        }
        if let Some(tickers) = &request.tickers {
            let any_ticker = tickers
                .iter()
                .map(|t| col(names.entity.as_str()).eq(lit(t.clone())))
                .reduce(|a, b| a.or(b))
                .unwrap_or_else(|| lit(false));
            lf = lf.filter(any_ticker);
        }

        let df = lf.collect().map_err(|e| self.loader_error(e.to_string()))?;
        debug!(rows = df.height(), "extract collected");
        Ok(df)
    }
}

fn day_start_millis(date: NaiveDate) -> i64 {
    date.and_time(chrono::NaiveTime::MIN)
        .and_utc()
        .timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::dataset::DatasetKind;
    use std::env;
    use std::fs;
    use std::path::Path;
    use std::sync::atomic::{AtomicU64, Ordering};

    static TEST_COUNTER: AtomicU64 = AtomicU64::new(0);

    fn temp_root() -> PathBuf {
        let id = TEST_COUNTER.fetch_add(1, Ordering::Relaxed);
        let dir = env::temp_dir().join(format!("altdata_extract_test_{}_{id}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    fn write_extract(path: &Path) {
        let times: Vec<i64> = [1, 2, 3, 3].iter().map(|d| day_start_millis(date(*d))).collect();
        let mut df = DataFrame::new(vec![
            Column::new("TICKER".into(), &["A", "A", "A", "B"]),
            Column::new("DATETIME".into(), times.clone())
                .cast(&DataType::Datetime(TimeUnit::Milliseconds, None))
                .unwrap(),
            Column::new("VARIABLE".into(), &["sales", "sales", "sales", "sales"]),
            Column::new("VALUE".into(), &[1.0, 2.0, 3.0, 4.0]),
            Column::new("SMOOTH".into(), &[0i64, 0, 0, 0]),
            Column::new("RELEASE_TIMESTAMP".into(), times)
                .cast(&DataType::Datetime(TimeUnit::Milliseconds, None))
                .unwrap(),
        ])
        .unwrap();
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        let file = fs::File::create(path).unwrap();
        ParquetWriter::new(file).finish(&mut df).unwrap();
    }

    #[test]
    fn path_includes_database_and_generation() {
        let loader = ParquetExtractLoader::new("/data");
        let mut request = ExtractRequest::all_tickers(DatasetKind::PosConsumerGoods).generation(2);
        request.db_name = Some("AIQ_DB".into());
        assert_eq!(
            loader.extract_path(&request),
            PathBuf::from("/data/AIQ_DB/pos_csmr_goods_gen2.parquet")
        );
        let plain = ExtractRequest::all_tickers(DatasetKind::PosRetailer);
        assert_eq!(
            loader.extract_path(&plain),
            PathBuf::from("/data/pos_retailer.parquet")
        );
    }

    #[test]
    fn filters_by_inclusive_dates_and_tickers() {
        let root = temp_root();
        let loader = ParquetExtractLoader::new(&root);
        write_extract(&root.join("pos_retailer.parquet"));

        let mut request = ExtractRequest::all_tickers(DatasetKind::PosRetailer);
        assert_eq!(loader.extract(&request).unwrap().height(), 4);

        request.start = Some(date(2));
        request.end = Some(date(3));
        assert_eq!(loader.extract(&request).unwrap().height(), 3);

        request.tickers = Some(vec!["B".into()]);
        assert_eq!(loader.extract(&request).unwrap().height(), 1);

        request.tickers = Some(vec![]);
        assert_eq!(loader.extract(&request).unwrap().height(), 0);

        let _ = fs::remove_dir_all(&root);
    }

    #[test]
    fn missing_extract_is_a_loader_error() {
        let root = temp_root();
        let loader = ParquetExtractLoader::new(&root);
        let err = loader
            .extract(&ExtractRequest::all_tickers(DatasetKind::Geolocation))
            .unwrap_err();
        assert!(matches!(err, DataError::Loader { .. }));
        let _ = fs::remove_dir_all(&root);
    }
}
