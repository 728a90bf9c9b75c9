//! Everything a pipeline operation needs, bundled and passed explicitly.

use crate::config::PipelineConfig;
use altdata_core::data::{ObjectStore, PriceProvider, RemoteLoader, SnapshotStore};

pub struct PipelineContext<'a> {
    pub config: PipelineConfig,
    pub snapshots: SnapshotStore,
    pub loader: &'a dyn RemoteLoader,
    pub objects: &'a dyn ObjectStore,
    pub prices: Option<&'a dyn PriceProvider>,
}

impl<'a> PipelineContext<'a> {
    /// Snapshot store rooted at `config.data_dir`; no price provider.
    pub fn new(
        config: PipelineConfig,
        loader: &'a dyn RemoteLoader,
        objects: &'a dyn ObjectStore,
    ) -> Self {
        let snapshots = SnapshotStore::new(config.data_dir.clone());
        Self {
            config,
            snapshots,
            loader,
            objects,
            prices: None,
        }
    }

    pub fn with_prices(mut self, prices: &'a dyn PriceProvider) -> Self {
        self.prices = Some(prices);
        self
    }
}
