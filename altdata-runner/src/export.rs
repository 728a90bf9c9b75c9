//! CSV export of wide tables.
//!
//! Columns: TICKER, DATETIME, then one column per variable in name order.
//! Missing cells are written empty.

use std::fs;
use std::path::Path;

use altdata_core::data::frame::KEY_COLUMNS;
use altdata_core::domain::WideTable;
use anyhow::{Context, Result};

const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub fn export_csv(table: &WideTable) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);

    let columns: Vec<&str> = table.columns().collect();
    let header: Vec<&str> = KEY_COLUMNS.iter().copied().chain(columns.iter().copied()).collect();
    wtr.write_record(&header)?;

    for (key, row) in table.rows() {
        let mut record = Vec::with_capacity(header.len());
        record.push(key.entity_id.clone());
        record.push(key.event_time.format(DATETIME_FORMAT).to_string());
        for column in &columns {
            record.push(row.get(*column).map(|v| v.to_string()).unwrap_or_default());
        }
        wtr.write_record(&record)?;
    }

    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

/// Write `export_csv` output to `path`, creating parent directories.
pub fn write_csv(table: &WideTable, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let csv = export_csv(table)?;
    fs::write(path, csv).with_context(|| format!("failed to write {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use altdata_core::domain::PanelKey;
    use chrono::NaiveDate;

    fn sample() -> WideTable {
        let d = |day| NaiveDate::from_ymd_opt(2024, 1, day).unwrap();
        let mut t = WideTable::new();
        t.set(PanelKey::on_date("9983", d(2)), "sales", Some(12.5));
        t.set(PanelKey::on_date("7203", d(1)), "sales", Some(10.0));
        t.set(PanelKey::on_date("7203", d(1)), "share", Some(0.25));
        t
    }

    #[test]
    fn header_then_sorted_rows() {
        let csv = export_csv(&sample()).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "TICKER,DATETIME,sales,share");
        assert_eq!(lines[1], "7203,2024-01-01 00:00:00,10,0.25");
        assert_eq!(lines[2], "9983,2024-01-02 00:00:00,12.5,");
    }

    #[test]
    fn empty_table_is_header_only() {
        let csv = export_csv(&WideTable::new()).unwrap();
        assert_eq!(csv.lines().collect::<Vec<_>>(), vec!["TICKER,DATETIME"]);
    }

    #[test]
    fn write_csv_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("pos.csv");
        write_csv(&sample(), &path).unwrap();
        assert!(fs::read_to_string(&path).unwrap().starts_with("TICKER,DATETIME"));
    }
}
