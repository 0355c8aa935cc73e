//! Client configuration
//!
//! Sources, lowest precedence first: built-in defaults,
//! `<data_dir>/config.toml`, `FILC_*` environment variables, then flags.

use config::{Config, ConfigError, Environment, File};
use filc_blockstore::{ChunkerConfig, IpfsConfig, DEFAULT_CHUNK_SIZE};
use filc_client::{ClientConfig, DEFAULT_ENDPOINT};
use filc_core::{DealConfig, RankerConfig, DEFAULT_DEAL_DURATION};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// filc configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FilcConfig {
    /// Directory holding the block store, deal records and config file
    pub data_dir: PathBuf,
    /// Provider gateway JSON-RPC endpoint
    pub endpoint: String,
    /// Bearer token for the gateway
    #[serde(default)]
    pub token: Option<String>,
    /// Lifetime of the cached provider ranking
    pub ranking_ttl_secs: u64,
    /// Delay between transfer status polls
    pub poll_interval_ms: u64,
    /// Deal length in epochs
    pub deal_duration_epochs: u64,
    /// Give up on a transfer after this long; unbounded when unset
    #[serde(default)]
    pub transfer_timeout_secs: Option<u64>,
    /// Gateway request timeout
    pub request_timeout_secs: u64,
    /// Import chunk size (bytes)
    pub chunk_size: usize,
    /// Keep blocks in an IPFS node instead of `<data_dir>/blockstore`
    #[serde(default)]
    pub ipfs_api: Option<String>,
}

impl Default for FilcConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            token: None,
            ranking_ttl_secs: 60,
            poll_interval_ms: 100,
            deal_duration_epochs: DEFAULT_DEAL_DURATION,
            transfer_timeout_secs: None,
            request_timeout_secs: 30,
            chunk_size: DEFAULT_CHUNK_SIZE,
            ipfs_api: None,
        }
    }
}

/// `~/.filc`, or `./.filc` when no home directory is known
pub fn default_data_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".filc")
}

impl FilcConfig {
    /// Load configuration, reading `config.toml` from `data_dir` (or the
    /// default data directory). An explicit `data_dir` wins over any source.
    pub fn load(data_dir: Option<&Path>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let dir = data_dir
            .map(Path::to_path_buf)
            .unwrap_or_else(|| defaults.data_dir.clone());

        let s = Config::builder()
            .set_default("data_dir", dir.to_string_lossy().into_owned())?
            .set_default("endpoint", defaults.endpoint)?
            .set_default("ranking_ttl_secs", defaults.ranking_ttl_secs as i64)?
            .set_default("poll_interval_ms", defaults.poll_interval_ms as i64)?
            .set_default("deal_duration_epochs", defaults.deal_duration_epochs as i64)?
            .set_default("request_timeout_secs", defaults.request_timeout_secs as i64)?
            .set_default("chunk_size", defaults.chunk_size as i64)?
            .add_source(File::from(dir.join("config.toml")).required(false))
            // e.g. FILC_ENDPOINT, FILC_POLL_INTERVAL_MS
            .add_source(Environment::with_prefix("FILC"))
            .build()?;

        let mut config: Self = s.try_deserialize()?;
        if let Some(dir) = data_dir {
            config.data_dir = dir.to_path_buf();
        }
        Ok(config)
    }

    pub fn blockstore_dir(&self) -> PathBuf {
        self.data_dir.join("blockstore")
    }

    pub fn deals_path(&self) -> PathBuf {
        self.data_dir.join("deals.json")
    }

    pub fn ipfs_config(&self) -> Option<IpfsConfig> {
        self.ipfs_api.as_ref().map(|url| {
            IpfsConfig::with_url(url).with_timeout(Duration::from_secs(self.request_timeout_secs))
        })
    }

    pub fn client_config(&self) -> ClientConfig {
        let config = ClientConfig::new(&self.endpoint)
            .with_timeout(Duration::from_secs(self.request_timeout_secs));
        match &self.token {
            Some(token) => config.with_token(token),
            None => config,
        }
    }

    pub fn ranker_config(&self) -> RankerConfig {
        RankerConfig::default().with_ttl(Duration::from_secs(self.ranking_ttl_secs))
    }

    pub fn deal_config(&self) -> DealConfig {
        let config = DealConfig::default()
            .with_poll_interval(Duration::from_millis(self.poll_interval_ms))
            .with_duration(self.deal_duration_epochs);
        match self.transfer_timeout_secs {
            Some(secs) => config.with_transfer_timeout(Duration::from_secs(secs)),
            None => config,
        }
    }

    pub fn chunker_config(&self) -> filc_blockstore::Result<ChunkerConfig> {
        ChunkerConfig::with_chunk_size(self.chunk_size)
    }
}
