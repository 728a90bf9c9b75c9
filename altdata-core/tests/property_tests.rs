//! Property tests for normalizer and reconciler invariants.
//!
//! 1. One row per key, carrying the value of the max-release record
//! 2. Smoothed records never reach the output
//! 3. Generation 2 rows survive reconciliation exactly
//! 4. Generation-1-only rows survive reconciliation unchanged

use altdata_core::data::normalize::{latest_vintages, normalize, VintagePolicy, VintageTieBreak};
use altdata_core::data::reconcile::reconcile;
use altdata_core::domain::{Observation, PanelKey, WideTable};
use chrono::{NaiveDate, NaiveDateTime};
use proptest::prelude::*;
use std::collections::BTreeMap;

// ── Strategies ───────────────────────────────────────────────────────

fn at(day: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 1, day)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
}

/// (entity, day, variable, value, smoothing, release day)
fn arb_record() -> impl Strategy<Value = (usize, u32, usize, f64, i64, u32)> {
    (
        0..3usize,
        1..5u32,
        0..2usize,
        (-1000.0..1000.0_f64).prop_map(|v| (v * 100.0).round() / 100.0),
        0..3i64,
        1..28u32,
    )
}

fn to_observation(r: (usize, u32, usize, f64, i64, u32)) -> Observation {
    let (e, t, v, value, smooth, release) = r;
    Observation {
        entity_id: ["A", "B", "C"][e].into(),
        event_time: at(t),
        variable: ["sales", "share"][v].into(),
        value: Some(value),
        smoothing_level: smooth,
        release_timestamp: at(release),
        is_backfill: false,
    }
}

fn arb_table() -> impl Strategy<Value = WideTable> {
    prop::collection::vec((0..4usize, 1..6u32, 0..2usize, -100.0..100.0_f64), 0..20).prop_map(
        |cells| {
            let mut t = WideTable::new();
            for (e, d, c, v) in cells {
                t.set(
                    PanelKey::new(["A", "B", "C", "D"][e], at(d)),
                    ["sales", "share"][c],
                    Some(v),
                );
            }
            t
        },
    )
}

// ── 1-2. Normalizer ──────────────────────────────────────────────────

proptest! {
    /// Distinct release timestamps per key, arriving in any order: the
    /// survivor is the max-release record.
    #[test]
    fn one_row_per_key_at_max_release(
        base in (0..3usize, 1..5u32, 0..2usize),
        (values, order) in prop::collection::vec(-1000.0..1000.0_f64, 1..8)
            .prop_flat_map(|values| {
                let order = Just((0..values.len()).collect::<Vec<_>>()).prop_shuffle();
                (Just(values), order)
            }),
    ) {
        let (e, t, v) = base;
        let records: Vec<Observation> = order
            .iter()
            .map(|&i| to_observation((e, t, v, values[i], 0, i as u32 + 1)))
            .collect();
        let expected = *values.last().unwrap();

        let kept = latest_vintages(records, VintagePolicy::Latest, VintageTieBreak::Reject).unwrap();
        prop_assert_eq!(kept.len(), 1);
        prop_assert_eq!(kept[0].value, Some(expected));
        prop_assert_eq!(kept[0].release_timestamp, at(values.len() as u32));
    }

    /// No output cell is sourced from a smoothed record, and every surviving
    /// key is unique.
    #[test]
    fn smoothed_records_never_survive(raw in prop::collection::vec(arb_record(), 0..40)) {
        let records: Vec<Observation> = raw.into_iter().map(to_observation).collect();
        let kept = latest_vintages(
            records.clone(),
            VintagePolicy::Latest,
            VintageTieBreak::PreferMaxValue,
        ).unwrap();

        prop_assert!(kept.iter().all(|o| o.smoothing_level == 0));
        let mut seen = BTreeMap::new();
        for o in &kept {
            prop_assert!(seen.insert(o.vintage_key(), ()).is_none());
        }

        let table = normalize(records.clone(), VintageTieBreak::PreferMaxValue).unwrap();
        let raw_keys: Vec<PanelKey> = records.iter().filter(|o| o.is_raw()).map(|o| o.panel_key()).collect();
        for key in table.keys() {
            prop_assert!(raw_keys.contains(key));
        }
    }

    /// PreferMaxValue does not depend on input order.
    #[test]
    fn prefer_max_value_is_order_independent(raw in prop::collection::vec(arb_record(), 0..40)) {
        let records: Vec<Observation> = raw.into_iter().map(to_observation).collect();
        let mut reversed = records.clone();
        reversed.reverse();
        prop_assert_eq!(
            normalize(records, VintageTieBreak::PreferMaxValue).unwrap(),
            normalize(reversed, VintageTieBreak::PreferMaxValue).unwrap()
        );
    }
}

// ── 3-4. Reconciler ──────────────────────────────────────────────────

proptest! {
    #[test]
    fn generation_two_rows_are_exact(gen1 in arb_table(), gen2 in arb_table()) {
        let merged = reconcile(gen1.clone(), gen2.clone());
        for (key, row) in gen2.rows() {
            prop_assert_eq!(merged.get(key), Some(row));
        }
        for (key, row) in gen1.rows() {
            if !gen2.contains_key(key) {
                prop_assert_eq!(merged.get(key), Some(row));
            }
        }
        let expected_len = gen2.len() + gen1.keys().filter(|k| !gen2.contains_key(k)).count();
        prop_assert_eq!(merged.len(), expected_len);
    }
}

#[test]
fn two_generation_scenario() {
    let day = PanelKey::new("A", at(1));
    let b = PanelKey::new("B", at(1));

    let mut gen1 = WideTable::new();
    gen1.set(day.clone(), "sales", Some(10.0));
    let mut gen2 = WideTable::new();
    gen2.set(day.clone(), "sales", Some(12.0));
    gen2.set(b.clone(), "sales", Some(5.0));

    let merged = reconcile(gen1, gen2);
    assert_eq!(merged.len(), 2);
    assert_eq!(merged.value(&day, "sales"), Some(12.0));
    assert_eq!(merged.value(&b, "sales"), Some(5.0));
}
