//! Point-in-time normalization of release-tagged observations.
//!
//! Every fact can be published several times (revisions). For each
//! (entity, time, variable) at smoothing level 0 exactly one vintage
//! survives: the latest release by default, the earliest for feeds that are
//! consumed as first-release data. The survivors are pivoted into a wide
//! table.

use crate::domain::{Observation, PanelKey, WideTable};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use thiserror::Error;

/// Which vintage of a fact to keep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VintagePolicy {
    #[default]
    Latest,
    Oldest,
}

/// What to do when two records share the winning release timestamp but
/// disagree on the value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VintageTieBreak {
    /// Fail the load.
    #[default]
    Reject,
    /// Keep the larger value; a missing value loses to any present one.
    PreferMaxValue,
}

#[derive(Debug, Error, PartialEq)]
pub enum NormalizeError {
    #[error(
        "ambiguous vintage for ({entity}, {time}, {variable}): conflicting values released at {release}"
    )]
    AmbiguousVintage {
        entity: String,
        time: NaiveDateTime,
        variable: String,
        release: NaiveDateTime,
    },
}

struct Slot<T> {
    best: T,
    ambiguous: bool,
}

/// Keep one vintage per key. Generic over the record type so feeds with extra
/// key columns (company id) can reuse it.
pub fn select_vintages<T, K, F, G>(
    records: impl IntoIterator<Item = T>,
    key: F,
    observation: G,
    policy: VintagePolicy,
    tie_break: VintageTieBreak,
) -> Result<Vec<T>, NormalizeError>
where
    K: Ord,
    F: Fn(&T) -> K,
    G: Fn(&T) -> &Observation,
{
    let mut slots: BTreeMap<K, Slot<T>> = BTreeMap::new();

    for record in records {
        let k = key(&record);
        let Some(slot) = slots.get_mut(&k) else {
            slots.insert(
                k,
                Slot {
                    best: record,
                    ambiguous: false,
                },
            );
            continue;
        };

        let incoming = observation(&record);
        let current = observation(&slot.best);
        let order = match policy {
            VintagePolicy::Latest => incoming.release_timestamp.cmp(&current.release_timestamp),
            VintagePolicy::Oldest => current.release_timestamp.cmp(&incoming.release_timestamp),
        };

        match order {
            Ordering::Greater => {
                slot.best = record;
                slot.ambiguous = false;
            }
            Ordering::Less => {}
            Ordering::Equal => {
                if same_value(incoming.value, current.value) {
                    continue;
                }
                match tie_break {
                    VintageTieBreak::Reject => slot.ambiguous = true,
                    VintageTieBreak::PreferMaxValue => {
                        if incoming.value.partial_cmp(&current.value) == Some(Ordering::Greater) {
                            slot.best = record;
                        }
                    }
                }
            }
        }
    }

    let mut out = Vec::with_capacity(slots.len());
    for (_, slot) in slots {
        if slot.ambiguous {
            let obs = observation(&slot.best);
            return Err(NormalizeError::AmbiguousVintage {
                entity: obs.entity_id.clone(),
                time: obs.event_time,
                variable: obs.variable.clone(),
                release: obs.release_timestamp,
            });
        }
        out.push(slot.best);
    }
    Ok(out)
}

/// Filter to smoothing level 0 and keep one vintage per
/// (entity, time, variable). Output is sorted by that key.
pub fn latest_vintages(
    records: impl IntoIterator<Item = Observation>,
    policy: VintagePolicy,
    tie_break: VintageTieBreak,
) -> Result<Vec<Observation>, NormalizeError> {
    select_vintages(
        records.into_iter().filter(Observation::is_raw),
        Observation::vintage_key,
        |o| o,
        policy,
        tie_break,
    )
}

/// Pivot observations into a wide table: variable → column, value → cell.
///
/// Callers must have reduced the input to one record per key; a later record
/// for the same cell overwrites an earlier one.
pub fn pivot(records: impl IntoIterator<Item = Observation>) -> WideTable {
    let mut table = WideTable::new();
    for obs in records {
        table.set(
            PanelKey::new(obs.entity_id, obs.event_time),
            &obs.variable,
            obs.value,
        );
    }
    table
}

/// Full point-in-time normalization: smoothing filter, latest vintage, pivot.
pub fn normalize(
    records: impl IntoIterator<Item = Observation>,
    tie_break: VintageTieBreak,
) -> Result<WideTable, NormalizeError> {
    let survivors = latest_vintages(records, VintagePolicy::Latest, tie_break)?;
    Ok(pivot(survivors))
}

fn same_value(a: Option<f64>, b: Option<f64>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(x), Some(y)) => x == y,
        _ => false,
    }
}
