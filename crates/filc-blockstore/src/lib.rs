//! # filc Blockstore
//!
//! Local block storage for the filc storage-deal client.
//!
//! This crate provides:
//! - **Block operations**: Put, get, and delete content-addressed blocks
//! - **CID generation**: Create content identifiers for raw and DAG-CBOR blocks
//! - **Filesystem nodes**: File and directory DAG nodes used to classify roots
//! - **Importing**: Chunk files and directories into a DAG ready for a deal
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │      Importer      │   NodeGetter       │
//! ├─────────────────────────────────────────┤
//! │           BlockStore Trait              │
//! ├─────────────┬─────────────┬─────────────┤
//! │ MemoryStore │   FsStore   │  IpfsStore  │
//! └─────────────┴─────────────┴─────────────┘
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use filc_blockstore::{Importer, MemoryBlockStore};
//!
//! let store = MemoryBlockStore::new();
//! let imported = Importer::new(&store).import_bytes(&data).await?;
//! let node = store.get_node(&imported.root).await?;
//! ```

pub mod block;
pub mod cid_utils;
pub mod error;
pub mod fs;
pub mod importer;
pub mod ipfs;
pub mod memory;
pub mod node;

pub use block::{cid_serde, Block};
pub use cid_utils::{create_cid, parse_cid, CidCodec};
pub use error::{BlockStoreError, Result};
pub use fs::FsBlockStore;
pub use importer::{ChunkerConfig, ImportedDag, Importer};
pub use ipfs::{IpfsBlockStore, IpfsConfig};
pub use memory::MemoryBlockStore;
pub use node::{DagLink, DagNode, FsNode, FsNodeKind, NodeGetter};

use async_trait::async_trait;
use bytes::Bytes;
use cid::Cid;

/// Default chunk size (256 KB)
pub const DEFAULT_CHUNK_SIZE: usize = 256 * 1024;

/// Maximum block size (1 MB)
pub const MAX_BLOCK_SIZE: usize = 1024 * 1024;

/// Maximum links per filesystem node before the importer adds a layer
pub const DEFAULT_MAX_LINKS: usize = 174;

/// Trait for block storage backends
#[async_trait]
pub trait BlockStore: Send + Sync {
    /// Store a raw block and return its CID
    async fn put_block(&self, data: &[u8]) -> Result<Cid>;

    /// Retrieve a block by CID
    async fn get_block(&self, cid: &Cid) -> Result<Bytes>;

    /// Check if a block exists
    async fn has_block(&self, cid: &Cid) -> Result<bool>;

    /// Delete a block
    async fn delete_block(&self, cid: &Cid) -> Result<()>;

    /// Get block size without retrieving content
    async fn block_size(&self, cid: &Cid) -> Result<u64>;

    /// Encode a value as DAG-CBOR and store it
    async fn put_ipld<T: serde::Serialize + Send + Sync>(&self, data: &T) -> Result<Cid>;

    /// Retrieve and decode a DAG-CBOR block
    async fn get_ipld<T: serde::de::DeserializeOwned>(&self, cid: &Cid) -> Result<T>;
}

/// Block store chosen at runtime
pub enum FlexibleBlockStore {
    /// Blocks on the local filesystem
    Fs(FsBlockStore),
    /// Blocks held by an IPFS node
    Ipfs(IpfsBlockStore),
    /// In-memory storage (tests, dry runs)
    Memory(MemoryBlockStore),
}

#[async_trait]
impl BlockStore for FlexibleBlockStore {
    async fn put_block(&self, data: &[u8]) -> Result<Cid> {
        match self {
            Self::Fs(store) => store.put_block(data).await,
            Self::Ipfs(store) => store.put_block(data).await,
            Self::Memory(store) => store.put_block(data).await,
        }
    }

    async fn get_block(&self, cid: &Cid) -> Result<Bytes> {
        match self {
            Self::Fs(store) => store.get_block(cid).await,
            Self::Ipfs(store) => store.get_block(cid).await,
            Self::Memory(store) => store.get_block(cid).await,
        }
    }

    async fn has_block(&self, cid: &Cid) -> Result<bool> {
        match self {
            Self::Fs(store) => store.has_block(cid).await,
            Self::Ipfs(store) => store.has_block(cid).await,
            Self::Memory(store) => store.has_block(cid).await,
        }
    }

    async fn delete_block(&self, cid: &Cid) -> Result<()> {
        match self {
            Self::Fs(store) => store.delete_block(cid).await,
            Self::Ipfs(store) => store.delete_block(cid).await,
            Self::Memory(store) => store.delete_block(cid).await,
        }
    }

    async fn block_size(&self, cid: &Cid) -> Result<u64> {
        match self {
            Self::Fs(store) => store.block_size(cid).await,
            Self::Ipfs(store) => store.block_size(cid).await,
            Self::Memory(store) => store.block_size(cid).await,
        }
    }

    async fn put_ipld<T: serde::Serialize + Send + Sync>(&self, data: &T) -> Result<Cid> {
        match self {
            Self::Fs(store) => store.put_ipld(data).await,
            Self::Ipfs(store) => store.put_ipld(data).await,
            Self::Memory(store) => store.put_ipld(data).await,
        }
    }

    async fn get_ipld<T: serde::de::DeserializeOwned>(&self, cid: &Cid) -> Result<T> {
        match self {
            Self::Fs(store) => store.get_ipld(cid).await,
            Self::Ipfs(store) => store.get_ipld(cid).await,
            Self::Memory(store) => store.get_ipld(cid).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_flexible_store_imports_and_reads_nodes() {
        let store = FlexibleBlockStore::Memory(MemoryBlockStore::new());
        let imported = Importer::new(&store).import_bytes(b"flexible").await.unwrap();

        let node = store.get_node(&imported.root).await.unwrap();
        assert!(!node.as_fs_node().unwrap().is_dir());
        assert!(store.has_block(&imported.root).await.unwrap());
    }
}
