//! Conversions between Polars frames and domain records.
//!
//! Long extracts are read column by column into `Observation`s; wide tables
//! are written as `TICKER`, `DATETIME`, then one Float64 column per variable.

use super::provider::DataError;
use super::schema::{validate_columns, ColumnKind, ColumnNames, LongSchema, SchemaError};
use crate::domain::{Observation, PanelKey, RawPoint, WideTable};
use chrono::{DateTime, NaiveDateTime};
use polars::prelude::*;
use std::io::Cursor;

/// Primary-key columns of every persisted wide table.
pub const KEY_COLUMNS: [&str; 2] = ["TICKER", "DATETIME"];

// ── Long frames ─────────────────────────────────────────────────────

/// Read a release-tagged long extract.
pub fn observations_from_frame(
    df: &DataFrame,
    names: &ColumnNames,
) -> Result<Vec<Observation>, SchemaError> {
    LongSchema::validate(df, names)?;

    let entities = text_column(df, &names.entity)?;
    let times = millis_column(df, &names.time)?;
    let variables = text_column(df, &names.variable)?;
    let values = float_column(df, &names.value)?;
    let smoothing = int_column(df, &names.smoothing)?;
    let releases = millis_column(df, &names.release)?;
    let backfill = if df.schema().contains(&names.backfill) {
        Some(bool_column(df, &names.backfill)?)
    } else {
        None
    };

    let mut out = Vec::with_capacity(df.height());
    for i in 0..df.height() {
        out.push(Observation {
            entity_id: required(&entities, &names.entity, i)?,
            event_time: required_time(&times, &names.time, i)?,
            variable: required(&variables, &names.variable, i)?,
            value: values[i].filter(|v| !v.is_nan()),
            smoothing_level: smoothing[i].ok_or_else(|| SchemaError::NullKey {
                column: names.smoothing.clone(),
                row: i,
            })?,
            release_timestamp: required_time(&releases, &names.release, i)?,
            is_backfill: backfill
                .as_ref()
                .and_then(|b| b[i])
                .unwrap_or(false),
        });
    }
    Ok(out)
}

/// Read a vintage-free long extract. When the smoothing column is present
/// only unadjusted rows are kept.
pub fn points_from_frame(df: &DataFrame, names: &ColumnNames) -> Result<Vec<RawPoint>, SchemaError> {
    validate_columns(
        df,
        &[
            (names.entity.as_str(), ColumnKind::Text),
            (names.time.as_str(), ColumnKind::Temporal),
            (names.variable.as_str(), ColumnKind::Text),
            (names.value.as_str(), ColumnKind::Numeric),
        ],
    )?;

    let entities = text_column(df, &names.entity)?;
    let times = millis_column(df, &names.time)?;
    let variables = text_column(df, &names.variable)?;
    let values = float_column(df, &names.value)?;
    let smoothing = if df.schema().contains(&names.smoothing) {
        Some(int_column(df, &names.smoothing)?)
    } else {
        None
    };

    let mut out = Vec::with_capacity(df.height());
    for i in 0..df.height() {
        if let Some(levels) = &smoothing {
            if levels[i] != Some(Observation::RAW_SMOOTHING) {
                continue;
            }
        }
        out.push(RawPoint {
            entity_id: required(&entities, &names.entity, i)?,
            event_time: required_time(&times, &names.time, i)?,
            variable: required(&variables, &names.variable, i)?,
            value: values[i].filter(|v| !v.is_nan()),
        });
    }
    Ok(out)
}

/// Read an optional text column by name (e.g. `COMPANY_ID`), nulls as `None`.
pub fn text_values(df: &DataFrame, name: &str) -> Result<Vec<Option<String>>, SchemaError> {
    validate_columns(df, &[(name, ColumnKind::Text)])?;
    text_column(df, name)
}

// ── Wide frames ─────────────────────────────────────────────────────

/// Convert a wide table to a DataFrame keyed by `TICKER`, `DATETIME`.
pub fn wide_to_dataframe(table: &WideTable) -> Result<DataFrame, DataError> {
    let tickers: Vec<&str> = table.keys().map(|k| k.entity_id.as_str()).collect();
    let times: Vec<i64> = table
        .keys()
        .map(|k| k.event_time.and_utc().timestamp_millis())
        .collect();

    let mut columns = Vec::with_capacity(table.column_count() + 2);
    columns.push(Column::new(KEY_COLUMNS[0].into(), tickers));
    columns.push(
        Column::new(KEY_COLUMNS[1].into(), times)
            .cast(&DataType::Datetime(TimeUnit::Milliseconds, None))
            .map_err(|e| DataError::ParquetError(format!("datetime cast: {e}")))?,
    );
    for name in table.columns() {
        let cells: Vec<Option<f64>> = table.rows().map(|(_, row)| row.get(name).copied()).collect();
        columns.push(Column::new(name.into(), cells));
    }

    DataFrame::new(columns).map_err(|e| DataError::ParquetError(format!("dataframe creation: {e}")))
}

/// Read a wide DataFrame. Key columns are matched case-insensitively; every
/// other column must be numeric.
pub fn wide_from_dataframe(df: &DataFrame) -> Result<WideTable, SchemaError> {
    let ticker_col = find_column(df, KEY_COLUMNS[0])?;
    let time_col = find_column(df, KEY_COLUMNS[1])?;
    validate_columns(
        df,
        &[
            (ticker_col.as_str(), ColumnKind::Text),
            (time_col.as_str(), ColumnKind::Temporal),
        ],
    )?;

    let tickers = text_column(df, &ticker_col)?;
    let times = millis_column(df, &time_col)?;

    let value_names: Vec<String> = df
        .get_column_names()
        .into_iter()
        .map(|n| n.to_string())
        .filter(|n| n != &ticker_col && n != &time_col)
        .collect();

    let mut table = WideTable::with_columns(value_names.iter().cloned());
    let mut keys = Vec::with_capacity(df.height());
    for i in 0..df.height() {
        let key = PanelKey::new(
            required(&tickers, &ticker_col, i)?,
            required_time(&times, &time_col, i)?,
        );
        if table.contains_key(&key) {
            return Err(SchemaError::DuplicateKey {
                entity: key.entity_id,
                time: key.event_time.to_string(),
            });
        }
        table.insert_row(key.clone(), Default::default());
        keys.push(key);
    }

    for name in &value_names {
        let dtype = df
            .schema()
            .get(name)
            .cloned()
            .ok_or_else(|| SchemaError::MissingColumn(name.clone()))?;
        if !matches!(
            dtype,
            DataType::Float32
                | DataType::Float64
                | DataType::Int8
                | DataType::Int16
                | DataType::Int32
                | DataType::Int64
                | DataType::UInt8
                | DataType::UInt16
                | DataType::UInt32
                | DataType::UInt64
                | DataType::Null
        ) {
            return Err(SchemaError::TypeMismatch {
                column: name.clone(),
                expected: "numeric",
                actual: dtype,
            });
        }
        let values = float_column(df, name)?;
        for (key, value) in keys.iter().zip(values) {
            if value.is_some() {
                table.set(key.clone(), name, value);
            }
        }
    }

    Ok(table)
}

// ── Parquet codec ───────────────────────────────────────────────────

/// Serialize a wide table to Parquet bytes.
pub fn encode_parquet(table: &WideTable) -> Result<Vec<u8>, DataError> {
    let mut df = wide_to_dataframe(table)?;
    let mut buf = Vec::new();
    ParquetWriter::new(&mut buf)
        .finish(&mut df)
        .map_err(|e| DataError::ParquetError(format!("write parquet: {e}")))?;
    Ok(buf)
}

/// Parse Parquet bytes into a DataFrame.
pub fn decode_parquet_frame(bytes: Vec<u8>) -> Result<DataFrame, DataError> {
    ParquetReader::new(Cursor::new(bytes))
        .finish()
        .map_err(|e| DataError::ParquetError(format!("read: {e}")))
}

/// Parse Parquet bytes into a wide table.
pub fn decode_parquet(bytes: Vec<u8>) -> Result<WideTable, DataError> {
    let df = decode_parquet_frame(bytes)?;
    Ok(wide_from_dataframe(&df)?)
}

// ── Column helpers ──────────────────────────────────────────────────

fn find_column(df: &DataFrame, wanted: &str) -> Result<String, SchemaError> {
    df.get_column_names()
        .into_iter()
        .find(|n| n.as_str().eq_ignore_ascii_case(wanted))
        .map(|n| n.to_string())
        .ok_or_else(|| SchemaError::MissingColumn(wanted.to_string()))
}

fn unreadable(column: &str, e: PolarsError) -> SchemaError {
    SchemaError::Unreadable {
        column: column.to_string(),
        reason: e.to_string(),
    }
}

fn text_column(df: &DataFrame, name: &str) -> Result<Vec<Option<String>>, SchemaError> {
    let col = df.column(name).map_err(|e| unreadable(name, e))?;
    let ca = col.str().map_err(|e| unreadable(name, e))?;
    Ok(ca.into_iter().map(|v| v.map(str::to_string)).collect())
}

/// Temporal column as epoch milliseconds.
fn millis_column(df: &DataFrame, name: &str) -> Result<Vec<Option<i64>>, SchemaError> {
    let col = df
        .column(name)
        .map_err(|e| unreadable(name, e))?
        .cast(&DataType::Datetime(TimeUnit::Milliseconds, None))
        .and_then(|c| c.cast(&DataType::Int64))
        .map_err(|e| unreadable(name, e))?;
    let ca = col.i64().map_err(|e| unreadable(name, e))?;
    Ok(ca.into_iter().collect())
}

fn float_column(df: &DataFrame, name: &str) -> Result<Vec<Option<f64>>, SchemaError> {
    let col = df
        .column(name)
        .map_err(|e| unreadable(name, e))?
        .cast(&DataType::Float64)
        .map_err(|e| unreadable(name, e))?;
    let ca = col.f64().map_err(|e| unreadable(name, e))?;
    Ok(ca.into_iter().map(|v| v.filter(|x| !x.is_nan())).collect())
}

fn int_column(df: &DataFrame, name: &str) -> Result<Vec<Option<i64>>, SchemaError> {
    let col = df
        .column(name)
        .map_err(|e| unreadable(name, e))?
        .cast(&DataType::Int64)
        .map_err(|e| unreadable(name, e))?;
    let ca = col.i64().map_err(|e| unreadable(name, e))?;
    Ok(ca.into_iter().collect())
}

fn bool_column(df: &DataFrame, name: &str) -> Result<Vec<Option<bool>>, SchemaError> {
    let col = df
        .column(name)
        .map_err(|e| unreadable(name, e))?
        .cast(&DataType::Boolean)
        .map_err(|e| unreadable(name, e))?;
    let ca = col.bool().map_err(|e| unreadable(name, e))?;
    Ok(ca.into_iter().collect())
}

fn required(values: &[Option<String>], column: &str, row: usize) -> Result<String, SchemaError> {
    values[row].clone().ok_or_else(|| SchemaError::NullKey {
        column: column.to_string(),
        row,
    })
}

fn required_time(
    values: &[Option<i64>],
    column: &str,
    row: usize,
) -> Result<NaiveDateTime, SchemaError> {
    values[row]
        .and_then(DateTime::from_timestamp_millis)
        .map(|dt| dt.naive_utc())
        .ok_or_else(|| SchemaError::NullKey {
            column: column.to_string(),
            row,
        })
}
