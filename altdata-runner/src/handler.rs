//! Registry of loaded tables, passed explicitly to every register operation.

use altdata_core::domain::WideTable;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use thiserror::Error;
use tracing::debug;

/// Handle of a table registered in a `DataHandler`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DataId(pub u32);

impl fmt::Display for DataId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum HandlerError {
    #[error("no data registered under id {0}")]
    UnknownId(DataId),

    #[error("no data registered under alias '{0}'")]
    UnknownAlias(String),

    #[error("universe is empty: none of the given ids hold any rows")]
    EmptyUniverse,
}

#[derive(Debug, Clone)]
pub struct RegisteredData {
    pub table: WideTable,
    /// Broad origin tag, e.g. `external`.
    pub data_source: String,
    /// Free-form provenance, e.g. `sample` or the loader name.
    pub source: String,
}

/// Tickers and earliest timestamp across a set of registered tables.
#[derive(Debug, Clone, PartialEq)]
pub struct Universe {
    pub tickers: BTreeSet<String>,
    pub start: NaiveDateTime,
}

#[derive(Debug, Default)]
pub struct DataHandler {
    entries: BTreeMap<DataId, RegisteredData>,
    aliases: BTreeMap<String, DataId>,
    next_id: u32,
}

impl DataHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_raw_data(&mut self, table: WideTable, data_source: &str, source: &str) -> DataId {
        let id = DataId(self.next_id);
        self.next_id += 1;
        debug!(%id, rows = table.len(), data_source, source, "registered table");
        self.entries.insert(
            id,
            RegisteredData {
                table,
                data_source: data_source.to_string(),
                source: source.to_string(),
            },
        );
        id
    }

    /// Point `alias` at `id`. Re-aliasing moves the alias to the new id.
    pub fn set_alias(&mut self, id: DataId, alias: &str) -> Result<(), HandlerError> {
        if !self.entries.contains_key(&id) {
            return Err(HandlerError::UnknownId(id));
        }
        self.aliases.insert(alias.to_string(), id);
        Ok(())
    }

    pub fn get_raw_data(&self, id: DataId) -> Result<&WideTable, HandlerError> {
        self.entry(id).map(|e| &e.table)
    }

    pub fn entry(&self, id: DataId) -> Result<&RegisteredData, HandlerError> {
        self.entries.get(&id).ok_or(HandlerError::UnknownId(id))
    }

    pub fn alias_id(&self, alias: &str) -> Option<DataId> {
        self.aliases.get(alias).copied()
    }

    pub fn by_alias(&self, alias: &str) -> Result<&WideTable, HandlerError> {
        let id = self
            .alias_id(alias)
            .ok_or_else(|| HandlerError::UnknownAlias(alias.to_string()))?;
        self.get_raw_data(id)
    }

    pub fn aliases(&self) -> impl Iterator<Item = (&str, DataId)> {
        self.aliases.iter().map(|(a, id)| (a.as_str(), *id))
    }

    pub fn ids(&self) -> impl Iterator<Item = DataId> + '_ {
        self.entries.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Union of tickers and the earliest timestamp over `ids`.
    pub fn universe(&self, ids: &[DataId]) -> Result<Universe, HandlerError> {
        let mut tickers = BTreeSet::new();
        let mut start: Option<NaiveDateTime> = None;
        for id in ids {
            let table = self.get_raw_data(*id)?;
            tickers.extend(table.entities());
            if let Some((lo, _)) = table.time_range() {
                start = Some(start.map_or(lo, |s| s.min(lo)));
            }
        }
        let start = start.ok_or(HandlerError::EmptyUniverse)?;
        Ok(Universe { tickers, start })
    }
}
