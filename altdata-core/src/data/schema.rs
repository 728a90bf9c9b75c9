use polars::prelude::*;

/// Column names of a long-format vendor extract.
///
/// Two conventions are in circulation: the warehouse extracts use upper-case
/// names, older file drops use lower-case ones with `values` instead of
/// `VALUE`. Both keep `SMOOTH` upper-case.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnNames {
    pub entity: String,
    pub time: String,
    pub variable: String,
    pub value: String,
    pub smoothing: String,
    pub release: String,
    pub backfill: String,
}

impl ColumnNames {
    pub fn snowflake() -> Self {
        Self {
            entity: "TICKER".into(),
            time: "DATETIME".into(),
            variable: "VARIABLE".into(),
            value: "VALUE".into(),
            smoothing: "SMOOTH".into(),
            release: "RELEASE_TIMESTAMP".into(),
            backfill: "BACKFILL".into(),
        }
    }

    pub fn legacy() -> Self {
        Self {
            entity: "ticker".into(),
            time: "datetime".into(),
            variable: "variable".into(),
            value: "values".into(),
            smoothing: "SMOOTH".into(),
            release: "release_timestamp".into(),
            backfill: "backfill".into(),
        }
    }
}

/// Broad dtype families accepted for a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Text,
    Temporal,
    Numeric,
    Integer,
}

impl ColumnKind {
    fn accepts(self, dtype: &DataType) -> bool {
        match self {
            ColumnKind::Text => matches!(dtype, DataType::String),
            ColumnKind::Temporal => matches!(dtype, DataType::Date | DataType::Datetime(_, _)),
            ColumnKind::Integer => matches!(
                dtype,
                DataType::Int8
                    | DataType::Int16
                    | DataType::Int32
                    | DataType::Int64
                    | DataType::UInt8
                    | DataType::UInt16
                    | DataType::UInt32
                    | DataType::UInt64
            ),
            ColumnKind::Numeric => {
                ColumnKind::Integer.accepts(dtype)
                    || matches!(dtype, DataType::Float32 | DataType::Float64)
            }
        }
    }

    fn describe(self) -> &'static str {
        match self {
            ColumnKind::Text => "utf8",
            ColumnKind::Temporal => "date or datetime",
            ColumnKind::Numeric => "numeric",
            ColumnKind::Integer => "integer",
        }
    }
}

/// Expected layout of a release-tagged long extract.
pub struct LongSchema;

impl LongSchema {
    /// Required columns and their dtype families. The backfill flag is optional.
    pub fn required(names: &ColumnNames) -> [(&str, ColumnKind); 6] {
        [
            (names.entity.as_str(), ColumnKind::Text),
            (names.time.as_str(), ColumnKind::Temporal),
            (names.variable.as_str(), ColumnKind::Text),
            (names.value.as_str(), ColumnKind::Numeric),
            (names.smoothing.as_str(), ColumnKind::Integer),
            (names.release.as_str(), ColumnKind::Temporal),
        ]
    }

    /// Validate DataFrame against schema
    pub fn validate(df: &DataFrame, names: &ColumnNames) -> Result<(), SchemaError> {
        validate_columns(df, &Self::required(names))
    }
}

/// Check that every listed column exists with an accepted dtype.
pub fn validate_columns(df: &DataFrame, columns: &[(&str, ColumnKind)]) -> Result<(), SchemaError> {
    let schema = df.schema();

    for (name, _) in columns {
        if !schema.contains(name) {
            return Err(SchemaError::MissingColumn(name.to_string()));
        }
    }

    for (name, kind) in columns {
        let actual = schema
            .get(name)
            .ok_or_else(|| SchemaError::MissingColumn(name.to_string()))?;
        if !kind.accepts(actual) {
            return Err(SchemaError::TypeMismatch {
                column: name.to_string(),
                expected: kind.describe(),
                actual: actual.clone(),
            });
        }
    }

    Ok(())
}

#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    #[error("Missing required column: {0}")]
    MissingColumn(String),

    #[error("Type mismatch in column {column}: expected {expected}, got {actual:?}")]
    TypeMismatch {
        column: String,
        expected: &'static str,
        actual: DataType,
    },

    #[error("Null value in key column {column} at row {row}")]
    NullKey { column: String, row: usize },

    #[error("Duplicate key ({entity}, {time}) in wide table")]
    DuplicateKey { entity: String, time: String },

    #[error("Column {column} could not be read: {reason}")]
    Unreadable { column: String, reason: String },
}
