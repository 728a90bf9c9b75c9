//! Generation overlay: merge a stale seed extract with a fresher one.
//!
//! Generation 2 owns every key it covers, whole row. Generation 1 only fills
//! keys generation 2 has no row for.

use crate::domain::WideTable;
use serde::{Deserialize, Serialize};

/// Row counts of one reconciliation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ReconcileSummary {
    /// Rows only generation 1 had.
    pub from_gen1: usize,
    /// Rows taken from generation 2.
    pub from_gen2: usize,
    /// Generation 1 rows replaced by generation 2.
    pub superseded: usize,
}

pub fn reconcile(gen1: WideTable, gen2: WideTable) -> WideTable {
    reconcile_with_summary(gen1, gen2).0
}

pub fn reconcile_with_summary(gen1: WideTable, gen2: WideTable) -> (WideTable, ReconcileSummary) {
    let mut summary = ReconcileSummary {
        from_gen2: gen2.len(),
        ..Default::default()
    };

    let mut merged = WideTable::with_columns(gen1.columns().chain(gen2.columns()).map(String::from));

    for (key, row) in gen1.into_rows() {
        if gen2.contains_key(&key) {
            summary.superseded += 1;
        } else {
            summary.from_gen1 += 1;
            merged.insert_row(key, row);
        }
    }
    for (key, row) in gen2.into_rows() {
        merged.insert_row(key, row);
    }

    (merged, summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::PanelKey;
    use chrono::NaiveDate;

    fn key(entity: &str) -> PanelKey {
        PanelKey::on_date(entity, NaiveDate::from_ymd_opt(2024, 1, 1).unwrap())
    }

    #[test]
    fn generation_two_wins_and_fills_new_keys() {
        let mut gen1 = WideTable::new();
        gen1.set(key("A"), "sales", Some(10.0));

        let mut gen2 = WideTable::new();
        gen2.set(key("A"), "sales", Some(12.0));
        gen2.set(key("B"), "sales", Some(5.0));

        let (merged, summary) = reconcile_with_summary(gen1, gen2);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged.value(&key("A"), "sales"), Some(12.0));
        assert_eq!(merged.value(&key("B"), "sales"), Some(5.0));
        assert_eq!(
            summary,
            ReconcileSummary {
                from_gen1: 0,
                from_gen2: 2,
                superseded: 1
            }
        );
    }

    #[test]
    fn whole_row_replace_never_blends_fields() {
        let mut gen1 = WideTable::new();
        gen1.set(key("A"), "sales", Some(10.0));
        gen1.set(key("A"), "share", Some(0.4));

        let mut gen2 = WideTable::new();
        gen2.set(key("A"), "sales", Some(12.0));

        let merged = reconcile(gen1, gen2);
        assert_eq!(merged.value(&key("A"), "sales"), Some(12.0));
        // share came only from generation 1 and must not leak into the row.
        assert_eq!(merged.value(&key("A"), "share"), None);
        assert!(merged.columns().any(|c| c == "share"));
    }

    #[test]
    fn generation_one_only_keys_pass_through() {
        let mut gen1 = WideTable::new();
        gen1.set(key("C"), "sales", Some(7.0));
        let merged = reconcile(gen1, WideTable::new());
        assert_eq!(merged.value(&key("C"), "sales"), Some(7.0));
    }
}
