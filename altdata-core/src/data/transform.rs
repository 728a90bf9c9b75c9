//! Table transforms applied after extraction: aggregation, weekly buckets,
//! year-over-year log differences.

use super::normalize::{select_vintages, NormalizeError, VintagePolicy, VintageTieBreak};
use crate::domain::{Observation, PanelKey, RawPoint, Row, WideTable};
use chrono::{Datelike, Duration, NaiveDate};
use std::collections::BTreeMap;

/// Company ids of this prefix carry the all-stores total of a ticker.
pub const ALL_COMPANIES_PREFIX: &str = "all_";

/// Weekly column summed when bucketing retailer data; the rest are averaged.
pub const WEEKLY_SUM_COLUMNS: &[&str] = &["sales"];

/// An observation tagged with the reporting company.
#[derive(Debug, Clone, PartialEq)]
pub struct CompanyObservation {
    pub company_id: String,
    pub observation: Observation,
}

/// Sum values per (entity, time, variable) and pivot.
///
/// Missing values are skipped; a group with nothing but missing values sums
/// to 0.
pub fn aggregate_sum(points: impl IntoIterator<Item = RawPoint>) -> WideTable {
    let mut sums: BTreeMap<(PanelKey, String), f64> = BTreeMap::new();
    for p in points {
        let cell = sums
            .entry((PanelKey::new(p.entity_id, p.event_time), p.variable))
            .or_insert(0.0);
        if let Some(v) = p.value {
            *cell += v;
        }
    }

    let mut table = WideTable::new();
    for ((key, variable), total) in sums {
        table.set(key, &variable, Some(total));
    }
    table
}

/// Retailer totals: keep all-stores company rows, one vintage per company
/// and key, then sum across companies.
pub fn company_totals(
    records: impl IntoIterator<Item = CompanyObservation>,
    policy: VintagePolicy,
    tie_break: VintageTieBreak,
) -> Result<WideTable, NormalizeError> {
    let totals = records
        .into_iter()
        .filter(|r| r.company_id.starts_with(ALL_COMPANIES_PREFIX) && r.observation.is_raw());
    let kept = select_vintages(
        totals,
        |r| (r.company_id.clone(), r.observation.vintage_key()),
        |r| &r.observation,
        policy,
        tie_break,
    )?;

    Ok(aggregate_sum(kept.into_iter().map(|r| RawPoint {
        entity_id: r.observation.entity_id,
        event_time: r.observation.event_time,
        variable: r.observation.variable,
        value: r.observation.value,
    })))
}

/// The Sunday closing the week that contains `date`.
pub fn week_ending(date: NaiveDate) -> NaiveDate {
    let to_sunday = 6 - i64::from(date.weekday().num_days_from_monday());
    date + Duration::days(to_sunday)
}

#[derive(Default)]
struct Bucket {
    sums: BTreeMap<String, f64>,
    means: BTreeMap<String, (f64, usize)>,
}

/// Bucket each entity's rows into weeks ending Sunday, labelled with that
/// Sunday at midnight.
///
/// Columns in `sum_columns` are summed, all others averaged. Weeks between an
/// entity's first and last row are emitted even when empty: sums read 0 and
/// means are missing.
pub fn weekly_resample(table: &WideTable, sum_columns: &[&str]) -> WideTable {
    let summed: Vec<&str> = table
        .columns()
        .filter(|c| sum_columns.contains(c))
        .collect();

    let mut out = WideTable::with_columns(table.columns().map(String::from));
    for entity in table.entities() {
        let mut buckets: BTreeMap<NaiveDate, Bucket> = BTreeMap::new();
        for (key, row) in table.entity_rows(&entity) {
            let bucket = buckets.entry(week_ending(key.event_time.date())).or_default();
            for (column, value) in row {
                if summed.contains(&column.as_str()) {
                    *bucket.sums.entry(column.clone()).or_insert(0.0) += value;
                } else {
                    let acc = bucket.means.entry(column.clone()).or_insert((0.0, 0));
                    acc.0 += value;
                    acc.1 += 1;
                }
            }
        }

        let (Some(first), Some(last)) = (
            buckets.keys().next().copied(),
            buckets.keys().next_back().copied(),
        ) else {
            continue;
        };

        let mut week = first;
        while week <= last {
            let mut row = Row::new();
            for column in &summed {
                row.insert(column.to_string(), 0.0);
            }
            if let Some(bucket) = buckets.remove(&week) {
                row.extend(bucket.sums);
                for (column, (total, n)) in bucket.means {
                    row.insert(column, total / n as f64);
                }
            }
            out.insert_row(PanelKey::on_date(entity.clone(), week), row);
            week += Duration::weeks(1);
        }
    }
    out
}

/// Per entity, row-positional `ln(x_t) - ln(x_{t-periods})`.
///
/// Non-positive or missing inputs give a missing cell. Output columns are the
/// input names with `suffix` appended.
pub fn log_diff(table: &WideTable, periods: usize, suffix: &str) -> WideTable {
    let renamed = |c: &str| format!("{c}{suffix}");
    let mut out = WideTable::with_columns(table.columns().map(renamed));

    for entity in table.entities() {
        let rows: Vec<(&PanelKey, &Row)> = table.entity_rows(&entity).collect();
        for (i, (key, row)) in rows.iter().enumerate() {
            let mut diffs = Row::new();
            if i >= periods {
                let (_, base) = rows[i - periods];
                for column in table.columns() {
                    let now = row.get(column).copied().filter(|v| *v > 0.0);
                    let then = base.get(column).copied().filter(|v| *v > 0.0);
                    if let (Some(now), Some(then)) = (now, then) {
                        diffs.insert(renamed(column), now.ln() - then.ln());
                    }
                }
            }
            out.insert_row((*key).clone(), diffs);
        }
    }
    out
}
