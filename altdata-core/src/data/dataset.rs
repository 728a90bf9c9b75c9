//! Catalogue of the alternative-data feeds this crate knows how to load.

use super::schema::ColumnNames;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DatasetKind {
    /// POS statistics for consumer goods, shipped as two incremental generations.
    PosConsumerGoods,
    /// POS statistics for consumer electronics.
    PosElectronics,
    /// POS statistics per retailer.
    PosRetailer,
    /// Retailer weekly sales (loader only, never snapshotted).
    RetailerWeekly,
    /// Foot-traffic counts per place, summed per ticker.
    Geolocation,
}

impl DatasetKind {
    pub const ALL: [DatasetKind; 5] = [
        DatasetKind::PosConsumerGoods,
        DatasetKind::PosElectronics,
        DatasetKind::PosRetailer,
        DatasetKind::RetailerWeekly,
        DatasetKind::Geolocation,
    ];

    /// The three POS feeds reloaded together.
    pub const POS: [DatasetKind; 3] = [
        DatasetKind::PosConsumerGoods,
        DatasetKind::PosElectronics,
        DatasetKind::PosRetailer,
    ];

    pub fn slug(self) -> &'static str {
        match self {
            DatasetKind::PosConsumerGoods => "pos_csmr_goods",
            DatasetKind::PosElectronics => "pos_elec_goods",
            DatasetKind::PosRetailer => "pos_retailer",
            DatasetKind::RetailerWeekly => "retailer_weekly",
            DatasetKind::Geolocation => "geolocation",
        }
    }

    /// Snapshot file name under the data directory.
    pub fn snapshot_file(self) -> Option<&'static str> {
        match self {
            DatasetKind::PosConsumerGoods => Some("pos_csmr_goods_stack.parquet"),
            DatasetKind::PosElectronics => Some("pos_elec_goods_stack.parquet"),
            DatasetKind::PosRetailer => Some("pos_retailer_stack.parquet"),
            DatasetKind::RetailerWeekly => None,
            DatasetKind::Geolocation => Some("pos_geolocation.parquet"),
        }
    }

    /// Environment variable naming the default database of the feed.
    pub fn database_env_var(self) -> &'static str {
        match self {
            DatasetKind::PosConsumerGoods => "TRIAL_SNOWFLAKE_DATABASE_AIQ_POS_CSMR_GOODS",
            DatasetKind::PosElectronics => "TRIAL_SNOWFLAKE_DATABASE_AIQ_POS_ELEC_GOODS",
            DatasetKind::PosRetailer => "TRIAL_SNOWFLAKE_DATABASE_AIQ_POS_RETAILER",
            DatasetKind::RetailerWeekly => "TRIAL_SNOWFLAKE_DATABASE_AIQ_RETAILER_WEEKLY",
            DatasetKind::Geolocation => "TRIAL_SNOWFLAKE_DATABASE_AIQ_GEOLOCATION",
        }
    }

    /// Alias the dataset is registered under in a data handler.
    pub fn alias(self) -> &'static str {
        self.slug()
    }

    /// Generations to extract and reconcile. Empty means a single extract.
    pub fn generations(self) -> &'static [u8] {
        match self {
            DatasetKind::PosConsumerGoods => &[1, 2],
            _ => &[],
        }
    }

    pub fn column_names(self) -> ColumnNames {
        ColumnNames::snowflake()
    }
}

impl fmt::Display for DatasetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

impl FromStr for DatasetKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DatasetKind::ALL
            .into_iter()
            .find(|k| k.slug() == s)
            .ok_or_else(|| {
                let known: Vec<_> = DatasetKind::ALL.iter().map(|k| k.slug()).collect();
                format!("unknown dataset '{s}' (known: {})", known.join(", "))
            })
    }
}
