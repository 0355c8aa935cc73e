//! File and directory import
//!
//! Splits data into raw leaf blocks and builds filesystem nodes over them.
//! A file whose leaves exceed the link limit gets intermediate file nodes,
//! layer by layer, until a single root remains.

use crate::node::{DagLink, FsNode};
use crate::{BlockStore, BlockStoreError, Result, DEFAULT_CHUNK_SIZE, DEFAULT_MAX_LINKS, MAX_BLOCK_SIZE};
use cid::Cid;
use std::future::Future;
use std::path::Path;
use std::pin::Pin;
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::debug;

/// Configuration for the importer
#[derive(Clone, Debug)]
pub struct ChunkerConfig {
    /// Size of each leaf chunk in bytes
    pub chunk_size: usize,
    /// Maximum links per filesystem node
    pub max_links: usize,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            max_links: DEFAULT_MAX_LINKS,
        }
    }
}

impl ChunkerConfig {
    /// Create with a custom chunk size
    pub fn with_chunk_size(chunk_size: usize) -> Result<Self> {
        if chunk_size == 0 || chunk_size > MAX_BLOCK_SIZE {
            return Err(BlockStoreError::Configuration(format!(
                "chunk size must be between 1 and {} bytes",
                MAX_BLOCK_SIZE
            )));
        }
        Ok(Self {
            chunk_size,
            ..Default::default()
        })
    }

    /// Set the link limit per node
    pub fn with_max_links(mut self, max_links: usize) -> Result<Self> {
        if max_links < 2 {
            return Err(BlockStoreError::Configuration(
                "a node needs room for at least 2 links".to_string(),
            ));
        }
        self.max_links = max_links;
        Ok(self)
    }
}

/// Result of importing a file or directory
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImportedDag {
    /// Root CID of the imported DAG
    pub root: Cid,
    /// Logical size of the imported data
    pub size: u64,
    /// Number of blocks written
    pub blocks: usize,
}

/// Imports data into a block store as a filesystem DAG
pub struct Importer<'a, S: BlockStore> {
    store: &'a S,
    config: ChunkerConfig,
}

impl<'a, S: BlockStore> Importer<'a, S> {
    /// Create an importer with default chunking
    pub fn new(store: &'a S) -> Self {
        Self::with_config(store, ChunkerConfig::default())
    }

    pub fn with_config(store: &'a S, config: ChunkerConfig) -> Self {
        Self { store, config }
    }

    /// Import an in-memory byte slice as a file
    pub async fn import_bytes(&self, data: &[u8]) -> Result<ImportedDag> {
        self.import_reader(data).await
    }

    /// Import everything readable from `reader` as a file
    pub async fn import_reader<R: AsyncRead + Unpin + Send>(&self, reader: R) -> Result<ImportedDag> {
        self.import_chunks(reader, 0).await
    }

    /// Chunk `reader` into leaves, reserving room for `expected_chunks` links
    async fn import_chunks<R: AsyncRead + Unpin + Send>(
        &self,
        mut reader: R,
        expected_chunks: usize,
    ) -> Result<ImportedDag> {
        let mut links = Vec::with_capacity(expected_chunks);
        let mut buffer = vec![0u8; self.config.chunk_size];

        loop {
            let filled = fill_chunk(&mut reader, &mut buffer).await?;
            if filled == 0 {
                break;
            }
            let cid = self.store.put_block(&buffer[..filled]).await?;
            links.push(DagLink::new("", cid, filled as u64));
        }

        let leaves = links.len();
        let (root, size, nodes) = self.build_file(links).await?;
        Ok(ImportedDag {
            root,
            size,
            blocks: leaves + nodes,
        })
    }

    /// Import a file or directory from disk
    pub fn import_path<'b>(
        &'b self,
        path: &'b Path,
    ) -> Pin<Box<dyn Future<Output = Result<ImportedDag>> + Send + 'b>> {
        Box::pin(async move {
            let meta = tokio::fs::metadata(path).await?;
            if meta.is_dir() {
                self.import_dir(path).await
            } else {
                let file = tokio::fs::File::open(path).await?;
                let expected = calculate_chunk_count(meta.len(), self.config.chunk_size);
                let imported = self.import_chunks(file, expected).await?;
                debug!(path = %path.display(), root = %imported.root, "imported file");
                Ok(imported)
            }
        })
    }

    async fn import_dir(&self, path: &Path) -> Result<ImportedDag> {
        let mut entries = Vec::new();
        let mut size = 0;
        let mut blocks = 0;

        let mut dir = tokio::fs::read_dir(path).await?;
        while let Some(entry) = dir.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            let child_path = entry.path();
            let child = self.import_path(&child_path).await?;
            size += child.size;
            blocks += child.blocks;
            entries.push(DagLink::new(name, child.root, child.size));
        }

        let root = self.store.put_ipld(&FsNode::directory(entries)).await?;
        debug!(%root, size, "imported directory");
        Ok(ImportedDag {
            root,
            size,
            blocks: blocks + 1,
        })
    }

    /// Build the file node tree over leaf links, returning the root, the
    /// logical size and the number of interior nodes written
    async fn build_file(&self, mut links: Vec<DagLink>) -> Result<(Cid, u64, usize)> {
        let size = links.iter().map(|l| l.size).sum();
        let mut nodes = 0;

        while links.len() > self.config.max_links {
            let mut parents = Vec::with_capacity(links.len() / self.config.max_links + 1);
            for group in links.chunks(self.config.max_links) {
                let node = FsNode::file(group.to_vec());
                let cid = self.store.put_ipld(&node).await?;
                parents.push(DagLink::new("", cid, node.cumulative_size()));
                nodes += 1;
            }
            links = parents;
        }

        let root = self.store.put_ipld(&FsNode::file(links)).await?;
        Ok((root, size, nodes + 1))
    }
}

/// Read until the buffer is full or the reader is exhausted
async fn fill_chunk<R: AsyncRead + Unpin>(reader: &mut R, buffer: &mut [u8]) -> Result<usize> {
    let mut filled = 0;
    while filled < buffer.len() {
        let n = reader.read(&mut buffer[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}

/// Calculate how many leaf chunks a file of `size` bytes produces
pub fn calculate_chunk_count(size: u64, chunk_size: usize) -> usize {
    if size == 0 {
        return 0;
    }
    size.div_ceil(chunk_size as u64) as usize
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::NodeGetter;
    use crate::MemoryBlockStore;
    use proptest::prelude::*;

    #[tokio::test]
    async fn test_import_small_file() {
        let store = MemoryBlockStore::new();
        let imported = Importer::new(&store).import_bytes(b"Hello, World!").await.unwrap();

        assert_eq!(imported.size, 13);
        assert_eq!(imported.blocks, 2);

        let node = store.get_node(&imported.root).await.unwrap().as_fs_node().unwrap();
        assert_eq!(node.file_size, Some(13));
        assert_eq!(node.links.len(), 1);
    }

    #[tokio::test]
    async fn test_import_empty_file() {
        let store = MemoryBlockStore::new();
        let imported = Importer::new(&store).import_bytes(&[]).await.unwrap();

        assert_eq!(imported.size, 0);
        let node = store.get_node(&imported.root).await.unwrap().as_fs_node().unwrap();
        assert!(node.links.is_empty());
        assert!(!node.is_dir());
    }

    #[tokio::test]
    async fn test_import_layers_wide_files() {
        let store = MemoryBlockStore::new();
        let config = ChunkerConfig::with_chunk_size(4)
            .unwrap()
            .with_max_links(3)
            .unwrap();
        // 10 leaves -> 4 interior nodes -> 2 nodes -> root
        let imported = Importer::with_config(&store, config)
            .import_bytes(&[7u8; 40])
            .await
            .unwrap();

        let root = store.get_node(&imported.root).await.unwrap().as_fs_node().unwrap();
        assert_eq!(root.links.len(), 2);
        assert_eq!(root.file_size, Some(40));
        assert_eq!(imported.size, 40);
    }

    #[tokio::test]
    async fn test_import_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), b"alpha").unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();
        std::fs::write(dir.path().join("nested").join("b.txt"), b"beta").unwrap();

        let store = MemoryBlockStore::new();
        let imported = Importer::new(&store).import_path(dir.path()).await.unwrap();

        assert_eq!(imported.size, 9);
        let root = store.get_node(&imported.root).await.unwrap().as_fs_node().unwrap();
        assert!(root.is_dir());
        let names: Vec<_> = root.links.iter().map(|l| l.name.as_str()).collect();
        assert_eq!(names, vec!["a.txt", "nested"]);
    }

    #[tokio::test]
    async fn test_import_file_path_matches_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.bin");
        let data: Vec<u8> = (0..1000u32).map(|i| (i % 251) as u8).collect();
        std::fs::write(&path, &data).unwrap();

        let store = MemoryBlockStore::new();
        let config = ChunkerConfig::with_chunk_size(64).unwrap();
        let importer = Importer::with_config(&store, config);
        let from_path = importer.import_path(&path).await.unwrap();
        let from_bytes = importer.import_bytes(&data).await.unwrap();

        assert_eq!(from_path.root, from_bytes.root);
        assert_eq!(from_path.blocks, calculate_chunk_count(1000, 64) + 1);
    }

    #[test]
    fn test_chunker_config_bounds() {
        assert!(ChunkerConfig::with_chunk_size(0).is_err());
        assert!(ChunkerConfig::with_chunk_size(MAX_BLOCK_SIZE + 1).is_err());
        assert!(ChunkerConfig::default().with_max_links(1).is_err());
    }

    #[test]
    fn test_calculate_chunk_count() {
        assert_eq!(calculate_chunk_count(0, 256), 0);
        assert_eq!(calculate_chunk_count(256, 256), 1);
        assert_eq!(calculate_chunk_count(257, 256), 2);
    }

    proptest! {
        #[test]
        fn imported_size_matches_input(len in 0usize..2048, chunk in 1usize..300) {
            let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
            let store = MemoryBlockStore::new();
            let data = vec![3u8; len];
            let config = ChunkerConfig::with_chunk_size(chunk).unwrap();

            let imported = rt
                .block_on(Importer::with_config(&store, config).import_bytes(&data))
                .unwrap();

            prop_assert_eq!(imported.size, len as u64);
            prop_assert!(imported.blocks >= calculate_chunk_count(len as u64, chunk) + 1);
        }
    }
}
