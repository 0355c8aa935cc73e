//! DAG nodes and filesystem node decoding
//!
//! Imported content is laid out as DAG-CBOR filesystem nodes linking raw leaf
//! blocks. A node fetched through [`NodeGetter`] can be interpreted with
//! [`DagNode::as_fs_node`]; anything that is not a DAG-CBOR filesystem node is
//! reported as [`BlockStoreError::NotFsNode`].

use crate::block::{cid_serde, Block};
use crate::cid_utils::CidCodec;
use crate::{BlockStore, BlockStoreError, Result};
use async_trait::async_trait;
use bytes::Bytes;
use cid::Cid;
use serde::{Deserialize, Serialize};
use tracing::instrument;

/// Filesystem node kinds
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FsNodeKind {
    Raw,
    Directory,
    File,
    Metadata,
    Symlink,
    HamtShard,
}

impl FsNodeKind {
    /// Whether the kind represents a directory (plain or sharded)
    pub fn is_dir(&self) -> bool {
        matches!(self, FsNodeKind::Directory | FsNodeKind::HamtShard)
    }
}

/// A named link from a filesystem node to a child block
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DagLink {
    /// Entry name (empty for file chunks)
    #[serde(default)]
    pub name: String,
    /// The CID being linked to
    #[serde(with = "cid_serde")]
    pub cid: Cid,
    /// Cumulative size of the linked data
    pub size: u64,
}

impl DagLink {
    /// Create a new DAG link
    pub fn new(name: impl Into<String>, cid: Cid, size: u64) -> Self {
        Self {
            name: name.into(),
            cid,
            size,
        }
    }
}

/// A filesystem node stored as DAG-CBOR
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FsNode {
    pub kind: FsNodeKind,
    /// Logical file size for file nodes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_size: Option<u64>,
    #[serde(default)]
    pub links: Vec<DagLink>,
}

impl FsNode {
    /// A file node over the given chunk links
    pub fn file(links: Vec<DagLink>) -> Self {
        let file_size = links.iter().map(|l| l.size).sum();
        Self {
            kind: FsNodeKind::File,
            file_size: Some(file_size),
            links,
        }
    }

    /// A directory node over the given entries
    pub fn directory(mut entries: Vec<DagLink>) -> Self {
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Self {
            kind: FsNodeKind::Directory,
            file_size: None,
            links: entries,
        }
    }

    pub fn is_dir(&self) -> bool {
        self.kind.is_dir()
    }

    /// Size of all data reachable from this node
    pub fn cumulative_size(&self) -> u64 {
        self.links.iter().map(|l| l.size).sum()
    }

    /// Encode into a DAG-CBOR block
    pub fn to_block(&self) -> Result<Block> {
        Block::encode_ipld(self)
    }

    /// Decode a filesystem node from a block
    pub fn decode(cid: &Cid, data: &[u8]) -> Result<Self> {
        if cid.codec() != CidCodec::DagCbor.code() {
            return Err(BlockStoreError::NotFsNode {
                cid: *cid,
                reason: format!("unsupported codec 0x{:x}", cid.codec()),
            });
        }

        serde_ipld_dagcbor::from_slice(data).map_err(|e| BlockStoreError::NotFsNode {
            cid: *cid,
            reason: e.to_string(),
        })
    }
}

/// A block fetched as a DAG node
#[derive(Clone, Debug)]
pub struct DagNode {
    pub cid: Cid,
    pub data: Bytes,
}

impl DagNode {
    /// Interpret this node as a filesystem node
    pub fn as_fs_node(&self) -> Result<FsNode> {
        FsNode::decode(&self.cid, &self.data)
    }
}

/// Fetches DAG nodes by CID
#[async_trait]
pub trait NodeGetter: Send + Sync {
    async fn get_node(&self, cid: &Cid) -> Result<DagNode>;
}

#[async_trait]
impl<S: BlockStore> NodeGetter for S {
    #[instrument(skip(self))]
    async fn get_node(&self, cid: &Cid) -> Result<DagNode> {
        let data = self.get_block(cid).await?;
        Ok(DagNode { cid: *cid, data })
    }
}
