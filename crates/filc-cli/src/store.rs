//! Deal records persisted as a JSON file

use async_trait::async_trait;
use cid::Cid;
use filc_core::{CoreError, DealId, DealRecord, DealStore, NewDeal, Result};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::debug;

/// Deal store backed by `deals.json`, rewritten on every change
pub struct JsonDealStore {
    path: PathBuf,
    records: Mutex<BTreeMap<DealId, DealRecord>>,
}

fn store_err(e: impl std::fmt::Display) -> CoreError {
    CoreError::Store(e.to_string())
}

impl JsonDealStore {
    /// Open the store at `path`, starting empty if the file does not exist
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let records = match tokio::fs::read(&path).await {
            Ok(bytes) => {
                let list: Vec<DealRecord> = serde_json::from_slice(&bytes).map_err(store_err)?;
                list.into_iter().map(|r| (r.id, r)).collect()
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(store_err(e)),
        };
        debug!(path = %path.display(), records = records.len(), "opened deal store");

        Ok(Self {
            path,
            records: Mutex::new(records),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn persist(&self, records: &BTreeMap<DealId, DealRecord>) -> Result<()> {
        let list: Vec<&DealRecord> = records.values().collect();
        let json = serde_json::to_vec_pretty(&list).map_err(store_err)?;

        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(store_err)?;
        }
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json).await.map_err(store_err)?;
        if let Err(e) = tokio::fs::rename(&tmp, &self.path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(store_err(e));
        }
        Ok(())
    }

    /// Write `next` to disk, then make it the in-memory state. On error the
    /// in-memory state is left as it was.
    async fn commit(
        &self,
        records: &mut BTreeMap<DealId, DealRecord>,
        next: BTreeMap<DealId, DealRecord>,
    ) -> Result<()> {
        self.persist(&next).await?;
        *records = next;
        Ok(())
    }

    async fn update(&self, id: DealId, f: impl FnOnce(&mut DealRecord) + Send) -> Result<()> {
        let mut records = self.records.lock().await;
        let mut next = records.clone();
        let record = next.get_mut(&id).ok_or(CoreError::DealNotFound(id))?;
        f(record);
        self.commit(&mut records, next).await
    }
}

#[async_trait]
impl DealStore for JsonDealStore {
    async fn all_deals(&self) -> Result<Vec<DealRecord>> {
        Ok(self.records.lock().await.values().cloned().collect())
    }

    async fn insert(&self, deal: NewDeal) -> Result<DealId> {
        let mut records = self.records.lock().await;
        let id = records.keys().next_back().copied().unwrap_or(0) + 1;
        let mut next = records.clone();
        next.insert(id, deal.into_record(id));
        self.commit(&mut records, next).await?;
        Ok(id)
    }

    async fn get(&self, id: DealId) -> Result<Option<DealRecord>> {
        Ok(self.records.lock().await.get(&id).cloned())
    }

    async fn mark_failed(&self, id: DealId) -> Result<()> {
        self.update(id, |r| r.failed = true).await
    }

    async fn confirm(&self, id: DealId, on_chain_id: u64) -> Result<()> {
        if on_chain_id == 0 {
            return Err(CoreError::InvalidInput("on-chain deal id must be positive".to_string()));
        }
        self.update(id, |r| r.deal_id = on_chain_id).await
    }

    async fn set_proposal(&self, id: DealId, proposal_cid: Cid) -> Result<()> {
        self.update(id, |r| r.proposal_cid = Some(proposal_cid)).await
    }
}
