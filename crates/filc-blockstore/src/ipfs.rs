//! IPFS HTTP API client for block operations

use crate::block::Block;
use crate::cid_utils::CidCodec;
use crate::{BlockStore, BlockStoreError, Result};
use async_trait::async_trait;
use bytes::Bytes;
use cid::Cid;
use reqwest::{multipart, Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use tracing::instrument;

/// Configuration for IPFS connection
#[derive(Clone, Debug)]
pub struct IpfsConfig {
    /// IPFS API URL (e.g., "http://localhost:5001")
    pub api_url: String,
    /// Request timeout
    pub timeout: Duration,
}

impl Default for IpfsConfig {
    fn default() -> Self {
        Self {
            api_url: "http://localhost:5001".to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}

impl IpfsConfig {
    /// Create with a custom API URL
    pub fn with_url(api_url: impl Into<String>) -> Self {
        Self {
            api_url: api_url.into().trim_end_matches('/').to_string(),
            ..Default::default()
        }
    }

    /// Set timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Block store backed by an IPFS node's HTTP API
#[derive(Clone)]
pub struct IpfsBlockStore {
    client: Client,
    config: IpfsConfig,
}

impl IpfsBlockStore {
    /// Create a new IPFS block store
    pub fn new(config: IpfsConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| BlockStoreError::Connection(e.to_string()))?;

        Ok(Self { client, config })
    }

    /// Verify connection to IPFS
    pub async fn verify_connection(&self) -> Result<()> {
        let url = format!("{}/api/v0/id", self.config.api_url);
        self.client
            .post(&url)
            .send()
            .await
            .map_err(|e| BlockStoreError::Connection(format!("Failed to connect to IPFS: {}", e)))?;
        Ok(())
    }

    /// Get block by CID
    #[instrument(skip(self))]
    pub async fn get_block_raw(&self, cid: &Cid) -> Result<Bytes> {
        let url = format!("{}/api/v0/block/get?arg={}", self.config.api_url, cid);

        let response = self.client.post(&url).send().await?;

        if !response.status().is_success() {
            if response.status() == StatusCode::NOT_FOUND {
                return Err(BlockStoreError::NotFound(*cid));
            }
            let error = response.text().await.unwrap_or_default();
            return Err(BlockStoreError::IpfsApi(format!(
                "Failed to get block: {}",
                error
            )));
        }

        response
            .bytes()
            .await
            .map_err(|e| BlockStoreError::IpfsApi(e.to_string()))
    }

    /// Put a block under the codec of its CID
    #[instrument(skip(self, block), fields(cid = %block.cid, size = block.size()))]
    pub async fn put_block_with_codec(&self, block: Block) -> Result<Cid> {
        let codec = CidCodec::from_code(block.cid.codec()).unwrap_or_default();
        let url = format!(
            "{}/api/v0/block/put?cid-codec={}&mhtype=sha2-256",
            self.config.api_url,
            codec.name(),
        );

        let part = multipart::Part::bytes(block.data.to_vec())
            .file_name("data")
            .mime_str("application/octet-stream")
            .map_err(|e| BlockStoreError::IpfsApi(e.to_string()))?;

        let form = multipart::Form::new().part("data", part);

        let response = self.client.post(&url).multipart(form).send().await?;

        if !response.status().is_success() {
            let error = response.text().await.unwrap_or_default();
            return Err(BlockStoreError::IpfsApi(format!(
                "Failed to put block: {}",
                error
            )));
        }

        let result: BlockPutResponse = response
            .json()
            .await
            .map_err(|e| BlockStoreError::IpfsApi(e.to_string()))?;

        let stored: Cid = result
            .key
            .parse()
            .map_err(|e: cid::Error| BlockStoreError::InvalidCid(e.to_string()))?;

        if stored.hash() != block.cid.hash() {
            return Err(BlockStoreError::IpfsApi(format!(
                "node stored {} but expected {}",
                stored, block.cid
            )));
        }
        Ok(block.cid)
    }

    /// Get block stat (size)
    pub async fn block_stat(&self, cid: &Cid) -> Result<BlockStat> {
        let url = format!("{}/api/v0/block/stat?arg={}", self.config.api_url, cid);

        let response = self.client.post(&url).send().await?;

        if !response.status().is_success() {
            if response.status() == StatusCode::NOT_FOUND {
                return Err(BlockStoreError::NotFound(*cid));
            }
            let error = response.text().await.unwrap_or_default();
            return Err(BlockStoreError::IpfsApi(format!(
                "Failed to get block stat: {}",
                error
            )));
        }

        response
            .json()
            .await
            .map_err(|e| BlockStoreError::IpfsApi(e.to_string()))
    }

    /// Remove a block
    pub async fn remove_block(&self, cid: &Cid) -> Result<()> {
        let url = format!("{}/api/v0/block/rm?arg={}", self.config.api_url, cid);

        let response = self.client.post(&url).send().await?;

        if !response.status().is_success() {
            let error = response.text().await.unwrap_or_default();
            return Err(BlockStoreError::IpfsApi(format!(
                "Failed to remove block: {}",
                error
            )));
        }

        Ok(())
    }
}

#[async_trait]
impl BlockStore for IpfsBlockStore {
    async fn put_block(&self, data: &[u8]) -> Result<Cid> {
        self.put_block_with_codec(Block::raw(Bytes::copy_from_slice(data)))
            .await
    }

    async fn get_block(&self, cid: &Cid) -> Result<Bytes> {
        self.get_block_raw(cid).await
    }

    async fn has_block(&self, cid: &Cid) -> Result<bool> {
        match self.block_stat(cid).await {
            Ok(_) => Ok(true),
            Err(BlockStoreError::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn delete_block(&self, cid: &Cid) -> Result<()> {
        self.remove_block(cid).await
    }

    async fn block_size(&self, cid: &Cid) -> Result<u64> {
        Ok(self.block_stat(cid).await?.size)
    }

    async fn put_ipld<T: serde::Serialize + Send + Sync>(&self, data: &T) -> Result<Cid> {
        self.put_block_with_codec(Block::encode_ipld(data)?).await
    }

    async fn get_ipld<T: serde::de::DeserializeOwned>(&self, cid: &Cid) -> Result<T> {
        let bytes = self.get_block_raw(cid).await?;
        serde_ipld_dagcbor::from_slice(&bytes)
            .map_err(|e| BlockStoreError::Deserialization(e.to_string()))
    }
}

/// Response from /api/v0/block/put
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct BlockPutResponse {
    pub key: String,
    pub size: u64,
}

/// Block statistics
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct BlockStat {
    pub key: String,
    pub size: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cid_utils::create_cid;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_config_with_url_trims_slash() {
        let config = IpfsConfig::with_url("http://custom:5001/");
        assert_eq!(config.api_url, "http://custom:5001");
        assert_eq!(config.timeout, Duration::from_secs(30));
    }

    #[tokio::test]
    async fn test_get_block() {
        let server = MockServer::start().await;
        let cid = create_cid(b"remote", CidCodec::Raw);

        Mock::given(method("POST"))
            .and(path("/api/v0/block/get"))
            .and(query_param("arg", cid.to_string()))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"remote".to_vec()))
            .mount(&server)
            .await;

        let store = IpfsBlockStore::new(IpfsConfig::with_url(server.uri())).unwrap();
        let data = store.get_block(&cid).await.unwrap();
        assert_eq!(data.as_ref(), b"remote");
    }

    #[tokio::test]
    async fn test_has_block_missing() {
        let server = MockServer::start().await;
        let cid = create_cid(b"absent", CidCodec::Raw);

        Mock::given(method("POST"))
            .and(path("/api/v0/block/stat"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let store = IpfsBlockStore::new(IpfsConfig::with_url(server.uri())).unwrap();
        assert!(!store.has_block(&cid).await.unwrap());
    }

    #[tokio::test]
    async fn test_put_ipld_sends_codec() {
        let server = MockServer::start().await;
        let block = Block::encode_ipld(&"node").unwrap();

        Mock::given(method("POST"))
            .and(path("/api/v0/block/put"))
            .and(query_param("cid-codec", "dag-cbor"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "Key": block.cid.to_string(),
                "Size": block.size(),
            })))
            .expect(1)
            .mount(&server)
            .await;

        let store = IpfsBlockStore::new(IpfsConfig::with_url(server.uri())).unwrap();
        let cid = store.put_ipld(&"node").await.unwrap();
        assert_eq!(cid, block.cid);
    }
}
