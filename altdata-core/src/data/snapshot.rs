//! Parquet snapshot cache for normalized wide tables.
//!
//! Layout: `{base_dir}/{file_name}` plus `{file_name}.meta.json`.
//!
//! Features:
//! - Atomic writes (write to .tmp, rename into place)
//! - Typed cache misses: not found, corrupt, other I/O
//! - Quarantine for corrupt files ({file_name}.quarantined)
//! - Metadata sidecar per snapshot (hash, row count, time range)

use super::frame::{decode_parquet_frame, encode_parquet, wide_from_dataframe};
use super::provider::DataError;
use crate::domain::WideTable;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

/// Why a snapshot could not be served.
#[derive(Debug, Error)]
pub enum CacheMiss {
    #[error("no snapshot at {}", path.display())]
    NotFound { path: PathBuf },

    #[error("corrupt snapshot at {} (quarantined): {reason}", path.display())]
    Corrupt { path: PathBuf, reason: String },

    #[error("cannot read snapshot at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl CacheMiss {
    /// Misses the caller should answer by loading from the source again.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, CacheMiss::Io { .. })
    }
}

/// Metadata sidecar for a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotMeta {
    pub file_name: String,
    pub rows: usize,
    pub entities: usize,
    pub columns: Vec<String>,
    pub start: Option<NaiveDateTime>,
    pub end: Option<NaiveDateTime>,
    pub data_hash: String,
    pub source: String,
    pub written_at: NaiveDateTime,
}

/// Presence and shape of one snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotStatus {
    pub file_name: String,
    pub present: bool,
    pub size_bytes: Option<u64>,
    pub meta: Option<SnapshotMeta>,
}

pub struct SnapshotStore {
    base_dir: PathBuf,
}

impl SnapshotStore {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// `{base_dir}/{file_name}`
    pub fn path(&self, file_name: &str) -> PathBuf {
        self.base_dir.join(file_name)
    }

    fn meta_path(&self, file_name: &str) -> PathBuf {
        self.base_dir.join(format!("{file_name}.meta.json"))
    }

    /// Load a snapshot. Corrupt files are moved aside so the next read is a
    /// clean `NotFound`.
    pub fn read(&self, file_name: &str) -> Result<WideTable, CacheMiss> {
        let path = self.path(file_name);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(CacheMiss::NotFound { path });
            }
            Err(source) => return Err(CacheMiss::Io { path, source }),
        };

        match decode_snapshot(bytes) {
            Ok(table) => {
                debug!(file = file_name, rows = table.len(), "snapshot hit");
                Ok(table)
            }
            Err(reason) => {
                let quarantine = path.with_extension("parquet.quarantined");
                warn!(
                    path = %path.display(),
                    %reason,
                    "quarantining corrupt snapshot"
                );
                if let Err(e) = fs::rename(&path, &quarantine) {
                    warn!(
                        path = %path.display(),
                        error = %e,
                        "quarantine failed, corrupt snapshot left in place"
                    );
                }
                Err(CacheMiss::Corrupt { path, reason })
            }
        }
    }

    /// Overwrite a snapshot with `table`.
    pub fn write(
        &self,
        file_name: &str,
        table: &WideTable,
        source: &str,
    ) -> Result<SnapshotMeta, DataError> {
        fs::create_dir_all(&self.base_dir)
            .map_err(|e| DataError::CacheError(format!("failed to create dir: {e}")))?;

        let bytes = encode_parquet(table)?;
        let path = self.path(file_name);
        let tmp_path = path.with_extension("parquet.tmp");

        fs::write(&tmp_path, &bytes)
            .map_err(|e| DataError::ParquetError(format!("write {}: {e}", tmp_path.display())))?;

        // Atomic rename
        fs::rename(&tmp_path, &path).map_err(|e| {
            let _ = fs::remove_file(&tmp_path);
            DataError::CacheError(format!("atomic rename failed: {e}"))
        })?;

        let (start, end) = match table.time_range() {
            Some((lo, hi)) => (Some(lo), Some(hi)),
            None => (None, None),
        };
        let meta = SnapshotMeta {
            file_name: file_name.to_string(),
            rows: table.len(),
            entities: table.entities().len(),
            columns: table.columns().map(String::from).collect(),
            start,
            end,
            data_hash: table_hash(table),
            source: source.to_string(),
            written_at: chrono::Local::now().naive_local(),
        };
        let meta_json = serde_json::to_string_pretty(&meta)
            .map_err(|e| DataError::CacheError(format!("meta serialization: {e}")))?;
        fs::write(self.meta_path(file_name), meta_json)
            .map_err(|e| DataError::CacheError(format!("meta write: {e}")))?;

        debug!(file = file_name, rows = meta.rows, "snapshot written");
        Ok(meta)
    }

    pub fn meta(&self, file_name: &str) -> Option<SnapshotMeta> {
        let content = fs::read_to_string(self.meta_path(file_name)).ok()?;
        serde_json::from_str(&content).ok()
    }

    pub fn status(&self, file_names: &[&str]) -> Vec<SnapshotStatus> {
        file_names
            .iter()
            .map(|name| {
                let size_bytes = fs::metadata(self.path(name)).ok().map(|m| m.len());
                SnapshotStatus {
                    file_name: name.to_string(),
                    present: size_bytes.is_some(),
                    size_bytes,
                    meta: self.meta(name),
                }
            })
            .collect()
    }
}

fn decode_snapshot(bytes: Vec<u8>) -> Result<WideTable, String> {
    let df = decode_parquet_frame(bytes).map_err(|e| e.to_string())?;
    if df.width() == 0 {
        return Err("snapshot has no columns".into());
    }
    wide_from_dataframe(&df).map_err(|e| e.to_string())
}

/// Deterministic BLAKE3 hash over keys, column names and cell bits.
pub fn table_hash(table: &WideTable) -> String {
    let mut hasher = blake3::Hasher::new();
    for column in table.columns() {
        hasher.update(column.as_bytes());
        hasher.update(&[0]);
    }
    for (key, row) in table.rows() {
        hasher.update(key.entity_id.as_bytes());
        hasher.update(&key.event_time.and_utc().timestamp_millis().to_le_bytes());
        for (column, value) in row {
            hasher.update(column.as_bytes());
            hasher.update(&value.to_le_bytes());
        }
    }
    hasher.finalize().to_hex().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::PanelKey;
    use chrono::NaiveDate;
    use std::env;
    use std::sync::atomic::{AtomicU64, Ordering};

    static TEST_COUNTER: AtomicU64 = AtomicU64::new(0);

    fn temp_cache_dir() -> PathBuf {
        let id = TEST_COUNTER.fetch_add(1, Ordering::Relaxed);
        let dir = env::temp_dir().join(format!("altdata_snapshot_test_{}_{id}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn sample_table() -> WideTable {
        let d = |day| PanelKey::on_date("7203", NaiveDate::from_ymd_opt(2024, 1, day).unwrap());
        let mut t = WideTable::new();
        t.set(d(1), "pos_sales", Some(100.0));
        t.set(d(1), "share", Some(0.12));
        t.set(d(8), "pos_sales", Some(104.0));
        t
    }

    #[test]
    fn write_and_read_roundtrip() {
        let dir = temp_cache_dir();
        let store = SnapshotStore::new(&dir);

        store.write("pos.parquet", &sample_table(), "test").unwrap();
        let loaded = store.read("pos.parquet").unwrap();
        assert_eq!(loaded, sample_table());

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn missing_file_is_not_found() {
        let dir = temp_cache_dir();
        let store = SnapshotStore::new(&dir);

        let miss = store.read("absent.parquet").unwrap_err();
        assert!(matches!(miss, CacheMiss::NotFound { .. }));
        assert!(miss.is_recoverable());

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn corrupt_file_is_quarantined() {
        let dir = temp_cache_dir();
        let store = SnapshotStore::new(&dir);
        fs::write(store.path("pos.parquet"), b"definitely not parquet").unwrap();

        let miss = store.read("pos.parquet").unwrap_err();
        assert!(matches!(miss, CacheMiss::Corrupt { .. }));
        assert!(!store.path("pos.parquet").exists());
        assert!(dir.join("pos.parquet.quarantined").exists());

        // Second read sees a plain miss.
        assert!(matches!(
            store.read("pos.parquet").unwrap_err(),
            CacheMiss::NotFound { .. }
        ));

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn failed_quarantine_keeps_reporting_corrupt() {
        let dir = temp_cache_dir();
        let store = SnapshotStore::new(&dir);
        fs::write(store.path("pos.parquet"), b"definitely not parquet").unwrap();
        // A non-empty directory in the way makes the rename fail.
        let blocker = dir.join("pos.parquet.quarantined");
        fs::create_dir_all(&blocker).unwrap();
        fs::write(blocker.join("keep"), b"x").unwrap();

        for _ in 0..2 {
            assert!(matches!(
                store.read("pos.parquet").unwrap_err(),
                CacheMiss::Corrupt { .. }
            ));
            assert!(store.path("pos.parquet").exists());
        }

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn write_overwrites_previous_snapshot() {
        let dir = temp_cache_dir();
        let store = SnapshotStore::new(&dir);
        store.write("pos.parquet", &sample_table(), "test").unwrap();

        let mut smaller = WideTable::new();
        smaller.set(
            PanelKey::on_date("9983", NaiveDate::from_ymd_opt(2024, 2, 1).unwrap()),
            "pos_sales",
            Some(1.0),
        );
        store.write("pos.parquet", &smaller, "test").unwrap();

        assert_eq!(store.read("pos.parquet").unwrap(), smaller);
        assert!(!dir.join("pos.parquet.tmp").exists());

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn meta_and_status() {
        let dir = temp_cache_dir();
        let store = SnapshotStore::new(&dir);
        let meta = store.write("pos.parquet", &sample_table(), "remote").unwrap();

        assert_eq!(meta.rows, 2);
        assert_eq!(meta.entities, 1);
        assert_eq!(meta.columns, vec!["pos_sales", "share"]);
        assert_eq!(meta.data_hash, table_hash(&sample_table()));
        assert_eq!(store.meta("pos.parquet"), Some(meta));

        let statuses = store.status(&["pos.parquet", "other.parquet"]);
        assert!(statuses[0].present);
        assert!(statuses[0].size_bytes.unwrap() > 0);
        assert!(!statuses[1].present);
        assert!(statuses[1].meta.is_none());

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn table_hash_depends_on_values() {
        let a = sample_table();
        let mut b = sample_table();
        b.set(
            PanelKey::on_date("7203", NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()),
            "share",
            Some(0.13),
        );
        assert_eq!(table_hash(&a), table_hash(&sample_table()));
        assert_ne!(table_hash(&a), table_hash(&b));
    }
}
