//! Application state

use crate::config::FilcConfig;
use crate::store::JsonDealStore;
use filc_blockstore::{FlexibleBlockStore, FsBlockStore, IpfsBlockStore};
use filc_client::RpcProviderClient;
use filc_core::{ContentCatalog, DealOrchestrator, ProviderRanker};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::debug;

/// Orchestrator wired to the gateway client and the JSON deal store
pub type Orchestrator = DealOrchestrator<RpcProviderClient, JsonDealStore>;

/// Everything a command needs, built once from configuration
pub struct AppState {
    pub config: FilcConfig,
    /// Blocks imported for deals
    pub blockstore: Arc<FlexibleBlockStore>,
    pub deals: Arc<JsonDealStore>,
    pub catalog: Arc<ContentCatalog>,
    pub ranker: Arc<ProviderRanker<JsonDealStore>>,
    pub client: Arc<RpcProviderClient>,
}

impl AppState {
    pub async fn new(config: FilcConfig) -> anyhow::Result<Self> {
        tokio::fs::create_dir_all(&config.data_dir).await?;
        debug!(data_dir = %config.data_dir.display(), "using data directory");

        let blockstore = match config.ipfs_config() {
            Some(ipfs) => {
                debug!(api = %ipfs.api_url, "using IPFS block store");
                let store = IpfsBlockStore::new(ipfs)?;
                store.verify_connection().await?;
                FlexibleBlockStore::Ipfs(store)
            }
            None => FlexibleBlockStore::Fs(FsBlockStore::open(config.blockstore_dir()).await?),
        };
        let blockstore = Arc::new(blockstore);
        let deals = Arc::new(JsonDealStore::open(config.deals_path()).await?);
        let catalog = Arc::new(ContentCatalog::new().with_node_getter(blockstore.clone()));
        let ranker = Arc::new(ProviderRanker::with_config(
            deals.clone(),
            config.ranker_config(),
        ));
        let client = Arc::new(RpcProviderClient::new(config.client_config())?);

        Ok(Self {
            config,
            blockstore,
            deals,
            catalog,
            ranker,
            client,
        })
    }

    /// Build an orchestrator that stops polling when `shutdown` fires
    pub fn orchestrator(&self, shutdown: watch::Receiver<bool>) -> Orchestrator {
        DealOrchestrator::new(self.client.clone(), self.ranker.clone(), self.deals.clone())
            .with_config(self.config.deal_config())
            .with_catalog(self.catalog.clone())
            .with_shutdown(shutdown)
    }
}
