//! Long-format records as they come out of a vendor extract.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Index of every wide table: (entity, time), ordered entity-first.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PanelKey {
    pub entity_id: String,
    pub event_time: NaiveDateTime,
}

impl PanelKey {
    pub fn new(entity_id: impl Into<String>, event_time: NaiveDateTime) -> Self {
        Self {
            entity_id: entity_id.into(),
            event_time,
        }
    }

    /// Key at midnight of the given date.
    pub fn on_date(entity_id: impl Into<String>, date: NaiveDate) -> Self {
        Self::new(entity_id, date.and_time(chrono::NaiveTime::MIN))
    }
}

/// One measured fact as released at a point in time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub entity_id: String,
    pub event_time: NaiveDateTime,
    pub variable: String,
    /// `None` when the vendor shipped a null or NaN.
    pub value: Option<f64>,
    pub smoothing_level: i64,
    pub release_timestamp: NaiveDateTime,
    pub is_backfill: bool,
}

impl Observation {
    /// Smoothing level of unadjusted data. Everything else is discarded.
    pub const RAW_SMOOTHING: i64 = 0;

    pub fn is_raw(&self) -> bool {
        self.smoothing_level == Self::RAW_SMOOTHING
    }

    pub fn panel_key(&self) -> PanelKey {
        PanelKey::new(self.entity_id.clone(), self.event_time)
    }

    /// Vintage key: (entity, time, variable, smoothing).
    pub fn vintage_key(&self) -> (String, NaiveDateTime, String, i64) {
        (
            self.entity_id.clone(),
            self.event_time,
            self.variable.clone(),
            self.smoothing_level,
        )
    }
}

/// A vintage-free measurement (foot traffic counts and similar feeds).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawPoint {
    pub entity_id: String,
    pub event_time: NaiveDateTime,
    pub variable: String,
    pub value: Option<f64>,
}

/// Daily price bar from a market data provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyBar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
    pub adj_close: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").unwrap()
    }

    #[test]
    fn panel_keys_order_by_entity_then_time() {
        let a2 = PanelKey::new("A", ts("2024-01-02 00:00:00"));
        let a1 = PanelKey::new("A", ts("2024-01-01 00:00:00"));
        let b0 = PanelKey::new("B", ts("2023-01-01 00:00:00"));
        let mut keys = vec![b0.clone(), a2.clone(), a1.clone()];
        keys.sort();
        assert_eq!(keys, vec![a1, a2, b0]);
    }

    #[test]
    fn on_date_is_midnight() {
        let key = PanelKey::on_date("7203", NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
        assert_eq!(key.event_time, ts("2024-03-01 00:00:00"));
    }

    #[test]
    fn raw_smoothing_is_level_zero() {
        let mut obs = Observation {
            entity_id: "A".into(),
            event_time: ts("2024-01-01 00:00:00"),
            variable: "sales".into(),
            value: Some(1.0),
            smoothing_level: 0,
            release_timestamp: ts("2024-01-05 00:00:00"),
            is_backfill: false,
        };
        assert!(obs.is_raw());
        obs.smoothing_level = 7;
        assert!(!obs.is_raw());
    }
}
