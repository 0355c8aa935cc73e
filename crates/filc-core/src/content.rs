//! Content, object and reference records

use chrono::{DateTime, Utc};
use cid::Cid;
use filc_blockstore::cid_serde;
use serde::{Deserialize, Serialize};
use std::fmt;

pub type ContentId = u64;
pub type ObjectId = u64;

/// Whether a content root is a file or a directory
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    #[default]
    Unknown,
    File,
    Directory,
}

impl ContentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::File => "file",
            Self::Directory => "directory",
        }
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A piece of user content tracked for storage deals
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Content {
    pub id: ContentId,

    /// Root of the content DAG
    #[serde(with = "cid_serde")]
    pub root: Cid,

    pub name: String,
    pub user_id: u64,
    #[serde(default)]
    pub description: String,

    /// Size in bytes
    pub size: u64,

    #[serde(default)]
    pub content_type: ContentType,

    pub active: bool,
    #[serde(default)]
    pub offloaded: bool,
    #[serde(default)]
    pub pinning: bool,
    #[serde(default)]
    pub pin_meta: String,
    #[serde(default)]
    pub failed: bool,

    /// Where the content is currently held
    #[serde(default)]
    pub location: String,

    /// Number of deals wanted for this content
    pub replication: u32,

    /// Aggregate this content was packed into
    #[serde(default)]
    pub aggregated_in: Option<ContentId>,
    /// Whether this content is itself an aggregate
    #[serde(default)]
    pub aggregate: bool,

    /// Set on the root of a DAG that was split into dealable fragments
    #[serde(default)]
    pub dag_split: bool,
    /// Parent content for a split fragment
    #[serde(default)]
    pub split_from: Option<ContentId>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Content {
    /// Whether this content may be proposed to a provider
    pub fn is_dealable(&self) -> bool {
        self.active && !self.failed && !self.dag_split && self.aggregated_in.is_none()
    }
}

/// Fields for creating a content record
#[derive(Clone, Debug)]
pub struct NewContent {
    pub root: Cid,
    pub name: String,
    pub user_id: u64,
    pub description: String,
    pub size: u64,
    pub content_type: ContentType,
    pub replication: u32,
    pub location: String,
    pub aggregated_in: Option<ContentId>,
    pub aggregate: bool,
    pub dag_split: bool,
    pub split_from: Option<ContentId>,
}

impl NewContent {
    /// Default replication target for new content
    pub const DEFAULT_REPLICATION: u32 = 6;

    pub fn new(root: Cid, name: impl Into<String>, size: u64) -> Self {
        Self {
            root,
            name: name.into(),
            user_id: 0,
            description: String::new(),
            size,
            content_type: ContentType::Unknown,
            replication: Self::DEFAULT_REPLICATION,
            location: "local".to_string(),
            aggregated_in: None,
            aggregate: false,
            dag_split: false,
            split_from: None,
        }
    }

    pub fn with_user(mut self, user_id: u64) -> Self {
        self.user_id = user_id;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_type(mut self, content_type: ContentType) -> Self {
        self.content_type = content_type;
        self
    }

    pub fn with_replication(mut self, replication: u32) -> Self {
        self.replication = replication;
        self
    }

    /// Mark as the root of a split DAG
    pub fn split_root(mut self) -> Self {
        self.dag_split = true;
        self
    }

    /// Mark as a fragment of `parent`
    pub fn split_fragment_of(mut self, parent: ContentId) -> Self {
        self.split_from = Some(parent);
        self
    }

    /// Mark as packed into the aggregate `parent`
    pub fn aggregated_in(mut self, parent: ContentId) -> Self {
        self.aggregated_in = Some(parent);
        self
    }

    pub(crate) fn into_content(self, id: ContentId) -> Content {
        let now = Utc::now();
        Content {
            id,
            root: self.root,
            name: self.name,
            user_id: self.user_id,
            description: self.description,
            size: self.size,
            content_type: self.content_type,
            active: true,
            offloaded: false,
            pinning: false,
            pin_meta: String::new(),
            failed: false,
            location: self.location,
            replication: self.replication,
            aggregated_in: self.aggregated_in,
            aggregate: self.aggregate,
            dag_split: self.dag_split,
            split_from: self.split_from,
            created_at: now,
            updated_at: now,
        }
    }
}

/// A deduplicated stored block
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Object {
    pub id: ObjectId,
    #[serde(with = "cid_serde")]
    pub cid: Cid,
    pub size: u64,
    pub reads: u64,
    pub last_access: DateTime<Utc>,
}

/// Link between a content record and one of its objects
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjRef {
    pub content: ContentId,
    pub object: ObjectId,
    /// Backing bytes evicted from local storage but still required
    pub offloaded: bool,
}
