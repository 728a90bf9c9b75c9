//! Wide table: (entity, time) rows × named variable columns.
//!
//! Rows are kept in a `BTreeMap` so iteration is always sorted by key, which
//! is the order every consumer (snapshot writer, CSV export, reconciler)
//! expects. Missing cells are simply absent from a row; the column set is
//! tracked separately so an all-missing column survives a round trip.

use super::observation::PanelKey;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

/// Cells of one row, keyed by column name.
pub type Row = BTreeMap<String, f64>;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WideTable {
    columns: BTreeSet<String>,
    rows: BTreeMap<PanelKey, Row>,
}

/// Two source entities mapped onto the same target entity.
#[derive(Debug, Error, PartialEq)]
#[error("entity rename collision: '{from}' maps to '{to}' which already holds {time}")]
pub struct KeyCollision {
    pub from: String,
    pub to: String,
    pub time: NaiveDateTime,
}

impl WideTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty table with a declared column set.
    pub fn with_columns<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            rows: BTreeMap::new(),
        }
    }

    /// Set one cell, creating the row if needed. `NaN` is stored as missing.
    pub fn set(&mut self, key: PanelKey, column: &str, value: Option<f64>) {
        self.columns.insert(column.to_string());
        let row = self.rows.entry(key).or_default();
        match value.filter(|v| !v.is_nan()) {
            Some(v) => {
                row.insert(column.to_string(), v);
            }
            None => {
                row.remove(column);
            }
        }
    }

    /// Replace a whole row, returning the previous one.
    pub fn insert_row(&mut self, key: PanelKey, row: Row) -> Option<Row> {
        self.columns.extend(row.keys().cloned());
        self.rows.insert(key, row)
    }

    pub fn get(&self, key: &PanelKey) -> Option<&Row> {
        self.rows.get(key)
    }

    pub fn value(&self, key: &PanelKey, column: &str) -> Option<f64> {
        self.rows.get(key).and_then(|row| row.get(column)).copied()
    }

    pub fn contains_key(&self, key: &PanelKey) -> bool {
        self.rows.contains_key(key)
    }

    pub fn rows(&self) -> impl Iterator<Item = (&PanelKey, &Row)> {
        self.rows.iter()
    }

    pub fn into_rows(self) -> impl Iterator<Item = (PanelKey, Row)> {
        self.rows.into_iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &PanelKey> {
        self.rows.keys()
    }

    /// Column names in sorted order.
    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(String::as_str)
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Distinct entities, sorted.
    pub fn entities(&self) -> BTreeSet<String> {
        self.rows.keys().map(|k| k.entity_id.clone()).collect()
    }

    /// Earliest and latest event time across all rows.
    pub fn time_range(&self) -> Option<(NaiveDateTime, NaiveDateTime)> {
        let mut times = self.rows.keys().map(|k| k.event_time);
        let first = times.next()?;
        Some(times.fold((first, first), |(lo, hi), t| (lo.min(t), hi.max(t))))
    }

    /// Rows of one entity in time order.
    pub fn entity_rows<'a>(
        &'a self,
        entity: &'a str,
    ) -> impl Iterator<Item = (&'a PanelKey, &'a Row)> + 'a {
        self.rows
            .iter()
            .filter(move |(k, _)| k.entity_id == entity)
    }

    pub fn retain_entities(&mut self, mut keep: impl FnMut(&str) -> bool) {
        self.rows.retain(|k, _| keep(&k.entity_id));
    }

    /// Relabel entities (ticker conversion).
    pub fn rename_entities(
        self,
        mut rename: impl FnMut(&str) -> String,
    ) -> Result<WideTable, KeyCollision> {
        let mut out = WideTable {
            columns: self.columns,
            rows: BTreeMap::new(),
        };
        for (key, row) in self.rows {
            let to = rename(&key.entity_id);
            let new_key = PanelKey::new(to.clone(), key.event_time);
            if out.rows.contains_key(&new_key) {
                return Err(KeyCollision {
                    from: key.entity_id,
                    to,
                    time: key.event_time,
                });
            }
            out.rows.insert(new_key, row);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(entity: &str, day: u32) -> PanelKey {
        PanelKey::on_date(
            entity,
            chrono::NaiveDate::from_ymd_opt(2024, 1, day).unwrap(),
        )
    }

    #[test]
    fn nan_is_stored_as_missing() {
        let mut t = WideTable::new();
        t.set(key("A", 1), "sales", Some(f64::NAN));
        assert_eq!(t.len(), 1);
        assert_eq!(t.value(&key("A", 1), "sales"), None);
        assert_eq!(t.columns().collect::<Vec<_>>(), vec!["sales"]);
    }

    #[test]
    fn rows_iterate_in_key_order() {
        let mut t = WideTable::new();
        t.set(key("B", 1), "x", Some(1.0));
        t.set(key("A", 2), "x", Some(2.0));
        t.set(key("A", 1), "x", Some(3.0));
        let order: Vec<_> = t.keys().cloned().collect();
        assert_eq!(order, vec![key("A", 1), key("A", 2), key("B", 1)]);
    }

    #[test]
    fn time_range_spans_all_entities() {
        let mut t = WideTable::new();
        t.set(key("B", 3), "x", Some(1.0));
        t.set(key("A", 9), "x", Some(1.0));
        let (lo, hi) = t.time_range().unwrap();
        assert_eq!(lo, key("B", 3).event_time);
        assert_eq!(hi, key("A", 9).event_time);
    }

    #[test]
    fn rename_entities_relabels_rows() {
        let mut t = WideTable::new();
        t.set(key("7203", 1), "x", Some(1.0));
        let renamed = t.rename_entities(|e| format!("{e}.T")).unwrap();
        assert_eq!(renamed.value(&key("7203.T", 1), "x"), Some(1.0));
    }

    #[test]
    fn rename_entities_rejects_collisions() {
        let mut t = WideTable::new();
        t.set(key("a", 1), "x", Some(1.0));
        t.set(key("A", 1), "x", Some(2.0));
        let err = t.rename_entities(|e| e.to_uppercase()).unwrap_err();
        assert_eq!(err.to, "A");
    }

    #[test]
    fn retain_entities_filters_rows() {
        let mut t = WideTable::new();
        t.set(key("A", 1), "x", Some(1.0));
        t.set(key("B", 1), "x", Some(1.0));
        t.retain_entities(|e| e == "B");
        assert_eq!(t.entities().into_iter().collect::<Vec<_>>(), vec!["B"]);
        // Columns are kept even when rows go away.
        assert_eq!(t.column_count(), 1);
    }
}
