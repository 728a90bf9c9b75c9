//! Object storage for shared derived tables.
//!
//! Tables are stored as Parquet, always keyed by `TICKER`, `DATETIME`.

use super::frame::{decode_parquet, encode_parquet, KEY_COLUMNS};
use super::provider::DataError;
use crate::domain::WideTable;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const DEFAULT_BUCKET: &str = "aiq-trial-data";

/// Primary keys every stored table is written with.
pub const PRIMARY_KEYS: [&str; 2] = KEY_COLUMNS;

/// Minimal bucket/key blob store.
pub trait ObjectStore: Send + Sync {
    fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>, DataError>;

    fn put(&self, bucket: &str, key: &str, bytes: &[u8]) -> Result<(), DataError>;
}

/// Filesystem-backed store: `{root}/{bucket}/{key}`.
pub struct LocalObjectStore {
    root: PathBuf,
}

impl LocalObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn object_path(&self, bucket: &str, key: &str) -> PathBuf {
        let mut path = self.root.join(bucket);
        for part in key.split('/').filter(|p| !p.is_empty()) {
            path.push(part);
        }
        path
    }
}

impl ObjectStore for LocalObjectStore {
    fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>, DataError> {
        let path = self.object_path(bucket, key);
        fs::read(&path).map_err(|e| {
            if e.kind() == io::ErrorKind::NotFound {
                DataError::ObjectNotFound {
                    bucket: bucket.to_string(),
                    key: key.to_string(),
                }
            } else {
                DataError::ObjectStore(format!("read {}: {e}", path.display()))
            }
        })
    }

    fn put(&self, bucket: &str, key: &str, bytes: &[u8]) -> Result<(), DataError> {
        let path = self.object_path(bucket, key);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| DataError::ObjectStore(format!("create {}: {e}", parent.display())))?;
        }
        let tmp_path = path.with_extension("tmp");
        fs::write(&tmp_path, bytes)
            .map_err(|e| DataError::ObjectStore(format!("write {}: {e}", tmp_path.display())))?;
        fs::rename(&tmp_path, &path).map_err(|e| {
            let _ = fs::remove_file(&tmp_path);
            DataError::ObjectStore(format!("rename into {}: {e}", path.display()))
        })
    }
}

pub fn read_table(store: &dyn ObjectStore, bucket: &str, key: &str) -> Result<WideTable, DataError> {
    let bytes = store.get(bucket, key)?;
    let table = decode_parquet(bytes)?;
    debug!(bucket, key, rows = table.len(), "read table from object store");
    Ok(table)
}

pub fn write_table(
    store: &dyn ObjectStore,
    table: &WideTable,
    bucket: &str,
    key: &str,
) -> Result<(), DataError> {
    let bytes = encode_parquet(table)?;
    store.put(bucket, key, &bytes)?;
    debug!(bucket, key, rows = table.len(), pkeys = ?PRIMARY_KEYS, "wrote table to object store");
    Ok(())
}
