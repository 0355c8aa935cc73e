//! Filesystem block store
//!
//! One file per block, named by the CID's string form, under a single
//! directory. Writes go through a temporary file and a rename so a reader
//! never observes a partial block.

use crate::block::Block;
use crate::{BlockStore, BlockStoreError, Result, MAX_BLOCK_SIZE};
use async_trait::async_trait;
use bytes::Bytes;
use cid::Cid;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, instrument};

const TMP_SUFFIX: &str = ".tmp";

/// Block store backed by a directory
#[derive(Clone, Debug)]
pub struct FsBlockStore {
    root: PathBuf,
}

impl FsBlockStore {
    /// Open (and create if needed) a block store rooted at `root`
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        tokio::fs::create_dir_all(&root).await?;
        Ok(Self { root })
    }

    /// Directory holding the blocks
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Remove every block by deleting the store directory
    #[instrument(skip(self), fields(root = %self.root.display()))]
    pub async fn clear(&self) -> Result<()> {
        match tokio::fs::remove_dir_all(&self.root).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn block_path(&self, cid: &Cid) -> PathBuf {
        self.root.join(cid.to_string())
    }

    async fn write_block(&self, block: Block) -> Result<Cid> {
        if block.size() > MAX_BLOCK_SIZE {
            return Err(BlockStoreError::BlockTooLarge {
                size: block.size(),
                max: MAX_BLOCK_SIZE,
            });
        }

        let path = self.block_path(&block.cid);
        if tokio::fs::try_exists(&path).await? {
            return Ok(block.cid);
        }

        write_atomic(&path, &block.data).await?;
        debug!(cid = %block.cid, size = block.size(), "wrote block");
        Ok(block.cid)
    }
}

/// Write `data` to a sibling temporary file and rename it into place. The
/// temporary file is removed if the rename fails.
async fn write_atomic(path: &Path, data: &[u8]) -> Result<()> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(TMP_SUFFIX);
    let tmp = PathBuf::from(tmp);

    tokio::fs::write(&tmp, data).await?;
    if let Err(e) = tokio::fs::rename(&tmp, path).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(e.into());
    }
    Ok(())
}

#[async_trait]
impl BlockStore for FsBlockStore {
    async fn put_block(&self, data: &[u8]) -> Result<Cid> {
        self.write_block(Block::raw(Bytes::copy_from_slice(data))).await
    }

    async fn get_block(&self, cid: &Cid) -> Result<Bytes> {
        match tokio::fs::read(self.block_path(cid)).await {
            Ok(data) => Ok(Bytes::from(data)),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(BlockStoreError::NotFound(*cid)),
            Err(e) => Err(e.into()),
        }
    }

    async fn has_block(&self, cid: &Cid) -> Result<bool> {
        Ok(tokio::fs::try_exists(self.block_path(cid)).await?)
    }

    async fn delete_block(&self, cid: &Cid) -> Result<()> {
        match tokio::fs::remove_file(self.block_path(cid)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn block_size(&self, cid: &Cid) -> Result<u64> {
        match tokio::fs::metadata(self.block_path(cid)).await {
            Ok(meta) => Ok(meta.len()),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(BlockStoreError::NotFound(*cid)),
            Err(e) => Err(e.into()),
        }
    }

    async fn put_ipld<T: serde::Serialize + Send + Sync>(&self, data: &T) -> Result<Cid> {
        let block = Block::encode_ipld(data)?;
        self.write_block(block).await
    }

    async fn get_ipld<T: serde::de::DeserializeOwned>(&self, cid: &Cid) -> Result<T> {
        let bytes = self.get_block(cid).await?;
        serde_ipld_dagcbor::from_slice(&bytes)
            .map_err(|e| BlockStoreError::Deserialization(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_failed_rename_removes_temp_file() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("occupied");
        // A non-empty directory cannot be replaced by a rename
        std::fs::create_dir_all(target.join("child")).unwrap();

        assert!(write_atomic(&target, b"data").await.is_err());
        assert!(!dir.path().join("occupied.tmp").exists());
    }

    #[tokio::test]
    async fn test_put_get_delete() {
        let dir = tempdir().unwrap();
        let store = FsBlockStore::open(dir.path().join("blocks")).await.unwrap();

        let cid = store.put_block(b"on disk").await.unwrap();
        assert!(store.has_block(&cid).await.unwrap());
        assert_eq!(store.get_block(&cid).await.unwrap().as_ref(), b"on disk");
        assert_eq!(store.block_size(&cid).await.unwrap(), 7);

        store.delete_block(&cid).await.unwrap();
        assert!(!store.has_block(&cid).await.unwrap());
        assert!(matches!(
            store.get_block(&cid).await,
            Err(BlockStoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_put_is_idempotent() {
        let dir = tempdir().unwrap();
        let store = FsBlockStore::open(dir.path()).await.unwrap();

        let a = store.put_block(b"twice").await.unwrap();
        let b = store.put_block(b"twice").await.unwrap();
        assert_eq!(a, b);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[tokio::test]
    async fn test_clear_removes_directory() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("blockstore");
        let store = FsBlockStore::open(&root).await.unwrap();
        store.put_block(b"gone soon").await.unwrap();

        store.clear().await.unwrap();
        assert!(!root.exists());

        // clearing twice is fine
        store.clear().await.unwrap();
    }
}
