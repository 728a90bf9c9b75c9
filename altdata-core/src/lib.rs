//! altdata core: domain tables, point-in-time normalization, generation
//! reconciliation, snapshot cache and source adapters for the POS
//! alternative-data feeds.
//!
//! - Domain types (panel keys, release-tagged observations, wide tables)
//! - Latest-vintage normalizer and pivot
//! - Generation reconciler (newer extract wins whole rows)
//! - Parquet snapshot store with typed cache misses
//! - Remote loader, object storage and price provider boundaries

pub mod data;
pub mod domain;

#[cfg(test)]
mod tests {
    use super::*;

    /// Compile-time check: shared types can cross threads.
    #[allow(dead_code)]
    fn assert_send_sync() {
        fn require_send<T: Send>() {}
        fn require_sync<T: Sync>() {}

        require_send::<domain::Observation>();
        require_sync::<domain::Observation>();
        require_send::<domain::WideTable>();
        require_sync::<domain::WideTable>();
        require_send::<domain::PanelKey>();
        require_sync::<domain::PanelKey>();

        require_send::<data::SnapshotStore>();
        require_sync::<data::SnapshotStore>();
        require_send::<data::LocalObjectStore>();
        require_sync::<data::LocalObjectStore>();
        require_send::<data::ParquetExtractLoader>();
        require_sync::<data::ParquetExtractLoader>();
        require_send::<data::YahooProvider>();
        require_sync::<data::YahooProvider>();
        require_send::<data::DataError>();
    }

    /// Loaders are used as trait objects by the runner.
    #[test]
    fn source_traits_are_object_safe() {
        fn _loader(_: &dyn data::RemoteLoader) {}
        fn _store(_: &dyn data::ObjectStore) {}
        fn _prices(_: &dyn data::PriceProvider) {}
    }
}
