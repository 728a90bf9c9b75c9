//! Daily market history for a ticker universe.

use super::provider::{DataError, PriceProvider};
use crate::domain::{PanelKey, WideTable};
use chrono::NaiveDate;
use tracing::{info, warn};

/// Suffix Yahoo uses for Tokyo listings.
pub const DEFAULT_EXCHANGE_SUFFIX: &str = ".T";

pub const MARKET_COLUMNS: [&str; 6] = ["open", "high", "low", "close", "volume", "adj_close"];

#[derive(Debug, Clone, PartialEq)]
pub struct MarketHistory {
    /// Keyed by the bare ticker, not the provider symbol.
    pub table: WideTable,
    /// Tickers the provider had no data for.
    pub missing: Vec<String>,
}

/// Fetch each ticker in turn as `{ticker}{suffix}`.
///
/// Symbols the provider does not know are collected in `missing`; any other
/// provider error aborts the fetch.
pub fn fetch_market_history(
    provider: &dyn PriceProvider,
    tickers: &[String],
    start: NaiveDate,
    end: NaiveDate,
    suffix: &str,
) -> Result<MarketHistory, DataError> {
    let mut table = WideTable::with_columns(MARKET_COLUMNS);
    let mut missing = Vec::new();

    for ticker in tickers {
        let symbol = format!("{ticker}{suffix}");
        let fetched = match provider.fetch(&symbol, start, end) {
            Ok(fetched) => fetched,
            Err(DataError::SymbolNotFound { .. }) => {
                warn!(ticker = %ticker, "no market data");
                missing.push(ticker.clone());
                continue;
            }
            Err(e) => return Err(e),
        };
        info!(ticker = %ticker, bars = fetched.bars.len(), "fetched market history");

        for bar in fetched.bars {
            let key = PanelKey::on_date(ticker.clone(), bar.date);
            let cells = [
                bar.open,
                bar.high,
                bar.low,
                bar.close,
                bar.volume as f64,
                bar.adj_close,
            ];
            for (column, value) in MARKET_COLUMNS.iter().zip(cells) {
                table.set(key.clone(), column, Some(value));
            }
        }
    }

    Ok(MarketHistory { table, missing })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::provider::{DataSource, FetchResult};
    use crate::domain::DailyBar;
    use std::sync::Mutex;

    struct MockProvider {
        calls: Mutex<Vec<String>>,
    }

    impl PriceProvider for MockProvider {
        fn name(&self) -> &str {
            "mock"
        }

        fn fetch(&self, symbol: &str, start: NaiveDate, _end: NaiveDate) -> Result<FetchResult, DataError> {
            self.calls.lock().unwrap().push(symbol.to_string());
            match symbol {
                "7203.T" => Ok(FetchResult {
                    symbol: symbol.into(),
                    bars: vec![DailyBar {
                        date: start,
                        open: 1.0,
                        high: 2.0,
                        low: 0.5,
                        close: 1.5,
                        volume: 100,
                        adj_close: 1.4,
                    }],
                    source: DataSource::YahooFinance,
                }),
                "0000.T" => Err(DataError::SymbolNotFound {
                    symbol: symbol.into(),
                }),
                _ => Err(DataError::CircuitBreakerTripped),
            }
        }

        fn is_available(&self) -> bool {
            true
        }
    }

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 4).unwrap()
    }

    #[test]
    fn collects_missing_and_keys_by_bare_ticker() {
        let provider = MockProvider {
            calls: Mutex::new(vec![]),
        };
        let history = fetch_market_history(
            &provider,
            &["7203".into(), "0000".into()],
            day(),
            day(),
            DEFAULT_EXCHANGE_SUFFIX,
        )
        .unwrap();

        assert_eq!(history.missing, vec!["0000"]);
        let key = PanelKey::on_date("7203", day());
        assert_eq!(history.table.value(&key, "close"), Some(1.5));
        assert_eq!(history.table.value(&key, "volume"), Some(100.0));
        assert_eq!(*provider.calls.lock().unwrap(), vec!["7203.T", "0000.T"]);
    }

    #[test]
    fn other_errors_propagate() {
        let provider = MockProvider {
            calls: Mutex::new(vec![]),
        };
        let err = fetch_market_history(&provider, &["9999".into()], day(), day(), ".T").unwrap_err();
        assert!(matches!(err, DataError::CircuitBreakerTripped));
    }
}
