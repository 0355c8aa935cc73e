//! In-memory content catalog
//!
//! Tracks content records, the deduplicated objects they are built from and
//! the references between the two. An object is collectable once no content
//! references it; offloaded references still count.

use crate::content::{Content, ContentId, ContentType, NewContent, ObjRef, Object, ObjectId};
use crate::{CoreError, Result};
use chrono::Utc;
use cid::Cid;
use dashmap::DashMap;
use filc_blockstore::NodeGetter;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, instrument};

/// Classify a content root by inspecting its root node.
///
/// Never fails: an absent root or accessor, or a failed fetch, gives
/// `Unknown`. A fetched node that does not decode as a filesystem node is
/// treated as a `File`.
pub async fn classify(root: Option<&Cid>, getter: Option<&dyn NodeGetter>) -> ContentType {
    let (Some(root), Some(getter)) = (root, getter) else {
        return ContentType::Unknown;
    };

    let node = match getter.get_node(root).await {
        Ok(node) => node,
        Err(e) => {
            debug!(%root, error = %e, "root fetch failed, type unknown");
            return ContentType::Unknown;
        }
    };

    match node.as_fs_node() {
        Ok(fs) if fs.is_dir() => ContentType::Directory,
        Ok(_) => ContentType::File,
        Err(e) => {
            debug!(%root, error = %e, "root is not a filesystem node, assuming file");
            ContentType::File
        }
    }
}

/// Catalog of content, objects and references
pub struct ContentCatalog {
    contents: DashMap<ContentId, Content>,
    objects: DashMap<ObjectId, Object>,
    objects_by_cid: DashMap<Cid, ObjectId>,
    refs: DashMap<ContentId, Vec<ObjRef>>,
    next_content: AtomicU64,
    next_object: AtomicU64,
    node_getter: Option<Arc<dyn NodeGetter>>,
}

impl Default for ContentCatalog {
    fn default() -> Self {
        Self::new()
    }
}

impl ContentCatalog {
    pub fn new() -> Self {
        Self {
            contents: DashMap::new(),
            objects: DashMap::new(),
            objects_by_cid: DashMap::new(),
            refs: DashMap::new(),
            next_content: AtomicU64::new(1),
            next_object: AtomicU64::new(1),
            node_getter: None,
        }
    }

    /// Attach the accessor used by [`Self::classify_content`]
    pub fn with_node_getter(mut self, getter: Arc<dyn NodeGetter>) -> Self {
        self.node_getter = Some(getter);
        self
    }

    pub fn add_content(&self, new: NewContent) -> ContentId {
        let id = self.next_content.fetch_add(1, Ordering::SeqCst);
        let content = new.into_content(id);
        debug!(id, root = %content.root, name = %content.name, "added content");
        self.contents.insert(id, content);
        id
    }

    /// Classify the root, then add the content with that type
    #[instrument(skip(self, new), fields(root = %new.root))]
    pub async fn add_classified_content(&self, new: NewContent) -> ContentId {
        let content_type = self.classify_content(Some(&new.root)).await;
        self.add_content(new.with_type(content_type))
    }

    pub fn content(&self, id: ContentId) -> Option<Content> {
        self.contents.get(&id).map(|c| c.clone())
    }

    /// Earliest content with the given root, for duplicate detection
    pub fn find_by_root(&self, root: &Cid) -> Option<Content> {
        self.contents
            .iter()
            .filter(|c| c.root == *root)
            .min_by_key(|c| c.id)
            .map(|c| c.clone())
    }

    /// Add an object, returning the existing id when the CID is already known
    pub fn add_object(&self, cid: Cid, size: u64) -> ObjectId {
        *self.objects_by_cid.entry(cid).or_insert_with(|| {
            let id = self.next_object.fetch_add(1, Ordering::SeqCst);
            self.objects.insert(
                id,
                Object {
                    id,
                    cid,
                    size,
                    reads: 0,
                    last_access: Utc::now(),
                },
            );
            id
        })
    }

    pub fn object(&self, id: ObjectId) -> Option<Object> {
        self.objects.get(&id).map(|o| o.clone())
    }

    /// Reference `object` from `content`; linking twice is a no-op
    pub fn link(&self, content: ContentId, object: ObjectId) -> Result<()> {
        if !self.contents.contains_key(&content) {
            return Err(CoreError::ContentNotFound(content));
        }
        if !self.objects.contains_key(&object) {
            return Err(CoreError::ObjectNotFound(object));
        }

        let mut refs = self.refs.entry(content).or_default();
        if !refs.iter().any(|r| r.object == object) {
            refs.push(ObjRef {
                content,
                object,
                offloaded: false,
            });
        }
        Ok(())
    }

    pub fn refs(&self, content: ContentId) -> Vec<ObjRef> {
        self.refs.get(&content).map(|r| r.clone()).unwrap_or_default()
    }

    /// Number of references to `object`, offloaded ones included
    pub fn refcount(&self, object: ObjectId) -> usize {
        self.refs
            .iter()
            .map(|entry| entry.iter().filter(|r| r.object == object).count())
            .sum()
    }

    /// Remove a content record and its references.
    ///
    /// Returns the objects left without any reference.
    pub fn remove_content(&self, id: ContentId) -> Result<Vec<ObjectId>> {
        self.contents
            .remove(&id)
            .ok_or(CoreError::ContentNotFound(id))?;

        let dropped = self.refs.remove(&id).map(|(_, refs)| refs).unwrap_or_default();
        let mut collectable: Vec<ObjectId> = dropped
            .iter()
            .map(|r| r.object)
            .filter(|object| self.refcount(*object) == 0)
            .collect();
        collectable.sort_unstable();
        collectable.dedup();

        debug!(id, collectable = collectable.len(), "removed content");
        Ok(collectable)
    }

    /// All objects with no references
    pub fn collectable_objects(&self) -> Vec<ObjectId> {
        let mut ids: Vec<ObjectId> = self
            .objects
            .iter()
            .map(|o| o.id)
            .filter(|id| self.refcount(*id) == 0)
            .collect();
        ids.sort_unstable();
        ids
    }

    /// Mark content and all of its references as offloaded
    pub fn mark_offloaded(&self, id: ContentId) -> Result<()> {
        let mut content = self
            .contents
            .get_mut(&id)
            .ok_or(CoreError::ContentNotFound(id))?;
        content.offloaded = true;
        content.updated_at = Utc::now();
        drop(content);

        if let Some(mut refs) = self.refs.get_mut(&id) {
            for r in refs.iter_mut() {
                r.offloaded = true;
            }
        }
        Ok(())
    }

    /// Count a read of `object`
    pub fn record_access(&self, object: ObjectId) -> Result<()> {
        let mut obj = self
            .objects
            .get_mut(&object)
            .ok_or(CoreError::ObjectNotFound(object))?;
        obj.reads += 1;
        obj.last_access = Utc::now();
        Ok(())
    }

    /// Fragments produced by splitting `parent`
    pub fn split_children(&self, parent: ContentId) -> Vec<Content> {
        let mut children: Vec<Content> = self
            .contents
            .iter()
            .filter(|c| c.split_from == Some(parent))
            .map(|c| c.clone())
            .collect();
        children.sort_by_key(|c| c.id);
        children
    }

    /// Content that may be proposed to a provider
    pub fn deal_candidates(&self) -> Vec<Content> {
        let mut candidates: Vec<Content> = self
            .contents
            .iter()
            .filter(|c| c.is_dealable())
            .map(|c| c.clone())
            .collect();
        candidates.sort_by_key(|c| c.id);
        candidates
    }

    /// Reject a root known to be a split DAG root
    pub fn ensure_dealable(&self, root: &Cid) -> Result<()> {
        if self.contents.iter().any(|c| c.root == *root && c.dag_split) {
            return Err(CoreError::DagSplitRoot(*root));
        }
        Ok(())
    }

    /// Classify a root using the catalog's node accessor
    pub async fn classify_content(&self, root: Option<&Cid>) -> ContentType {
        classify(root, self.node_getter.as_deref()).await
    }

    pub fn len(&self) -> usize {
        self.contents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contents.is_empty()
    }
}
