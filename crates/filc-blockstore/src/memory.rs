//! In-memory block store for tests and dry runs

use crate::block::Block;
use crate::{BlockStore, BlockStoreError, Result, MAX_BLOCK_SIZE};
use async_trait::async_trait;
use bytes::Bytes;
use cid::Cid;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// An in-memory block store
#[derive(Clone, Default)]
pub struct MemoryBlockStore {
    blocks: Arc<DashMap<Cid, Bytes>>,
    reads: Arc<AtomicU64>,
}

impl MemoryBlockStore {
    /// Create a new empty memory store
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a pre-built block
    pub fn insert(&self, block: Block) -> Cid {
        let cid = block.cid;
        self.blocks.insert(cid, block.data);
        cid
    }

    /// Number of blocks stored
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Number of `get_block` calls served, hits or misses
    pub fn reads(&self) -> u64 {
        self.reads.load(Ordering::Relaxed)
    }

    /// Total size of all blocks
    pub fn total_size(&self) -> u64 {
        self.blocks.iter().map(|entry| entry.value().len() as u64).sum()
    }

    fn check_size(data: &[u8]) -> Result<()> {
        if data.len() > MAX_BLOCK_SIZE {
            return Err(BlockStoreError::BlockTooLarge {
                size: data.len(),
                max: MAX_BLOCK_SIZE,
            });
        }
        Ok(())
    }
}

#[async_trait]
impl BlockStore for MemoryBlockStore {
    async fn put_block(&self, data: &[u8]) -> Result<Cid> {
        Self::check_size(data)?;
        Ok(self.insert(Block::raw(Bytes::copy_from_slice(data))))
    }

    async fn get_block(&self, cid: &Cid) -> Result<Bytes> {
        self.reads.fetch_add(1, Ordering::Relaxed);
        self.blocks
            .get(cid)
            .map(|entry| entry.value().clone())
            .ok_or(BlockStoreError::NotFound(*cid))
    }

    async fn has_block(&self, cid: &Cid) -> Result<bool> {
        Ok(self.blocks.contains_key(cid))
    }

    async fn delete_block(&self, cid: &Cid) -> Result<()> {
        self.blocks.remove(cid);
        Ok(())
    }

    async fn block_size(&self, cid: &Cid) -> Result<u64> {
        self.blocks
            .get(cid)
            .map(|entry| entry.value().len() as u64)
            .ok_or(BlockStoreError::NotFound(*cid))
    }

    async fn put_ipld<T: serde::Serialize + Send + Sync>(&self, data: &T) -> Result<Cid> {
        let block = Block::encode_ipld(data)?;
        Self::check_size(&block.data)?;
        Ok(self.insert(block))
    }

    async fn get_ipld<T: serde::de::DeserializeOwned>(&self, cid: &Cid) -> Result<T> {
        let bytes = self.get_block(cid).await?;
        serde_ipld_dagcbor::from_slice(&bytes)
            .map_err(|e| BlockStoreError::Deserialization(e.to_string()))
    }
}
