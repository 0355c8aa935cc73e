//! Deal records and their store

use crate::address::ProviderAddress;
use crate::{CoreError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use cid::Cid;
use filc_blockstore::cid_serde;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

pub type DealId = u64;

/// One attempt to store content with one provider.
///
/// `deal_id` is the on-chain identifier and stays zero until the deal is
/// confirmed on chain. The provider is kept as recorded so that a corrupt
/// record surfaces when statistics are computed.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DealRecord {
    pub id: DealId,
    #[serde(with = "cid_serde")]
    pub content_root: Cid,
    pub provider: String,
    #[serde(default)]
    pub deal_id: u64,
    #[serde(default)]
    pub failed: bool,
    #[serde(default, with = "cid_serde::opt")]
    pub proposal_cid: Option<Cid>,
    #[serde(default)]
    pub verified: bool,
    pub created_at: DateTime<Utc>,
}

/// Lifecycle bucket of a record as counted by the stats aggregator
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DealState {
    InProgress,
    Confirmed,
    Faulted,
    FailedPreAcceptance,
}

impl DealRecord {
    pub fn state(&self) -> DealState {
        match (self.deal_id > 0, self.failed) {
            (true, false) => DealState::Confirmed,
            (true, true) => DealState::Faulted,
            (false, true) => DealState::FailedPreAcceptance,
            (false, false) => DealState::InProgress,
        }
    }

    /// Resolve the recorded provider address
    pub fn provider_address(&self) -> Result<ProviderAddress> {
        self.provider
            .parse()
            .map_err(|e: CoreError| CoreError::MalformedDealRecord {
                record_id: self.id,
                reason: e.to_string(),
            })
    }
}

/// Fields for a new deal record
#[derive(Clone, Debug)]
pub struct NewDeal {
    pub content_root: Cid,
    pub provider: ProviderAddress,
    pub proposal_cid: Option<Cid>,
    pub verified: bool,
}

impl NewDeal {
    pub fn new(content_root: Cid, provider: ProviderAddress) -> Self {
        Self {
            content_root,
            provider,
            proposal_cid: None,
            verified: false,
        }
    }

    pub fn with_proposal(mut self, proposal_cid: Cid) -> Self {
        self.proposal_cid = Some(proposal_cid);
        self
    }

    pub fn verified(mut self, verified: bool) -> Self {
        self.verified = verified;
        self
    }

    pub fn into_record(self, id: DealId) -> DealRecord {
        DealRecord {
            id,
            content_root: self.content_root,
            provider: self.provider.to_string(),
            deal_id: 0,
            failed: false,
            proposal_cid: self.proposal_cid,
            verified: self.verified,
            created_at: Utc::now(),
        }
    }
}

/// Persistent store of deal records
#[async_trait]
pub trait DealStore: Send + Sync {
    /// Every record, in insertion order
    async fn all_deals(&self) -> Result<Vec<DealRecord>>;

    async fn insert(&self, deal: NewDeal) -> Result<DealId>;

    async fn get(&self, id: DealId) -> Result<Option<DealRecord>>;

    async fn mark_failed(&self, id: DealId) -> Result<()>;

    /// Record the on-chain id of a deal
    async fn confirm(&self, id: DealId, on_chain_id: u64) -> Result<()>;

    async fn set_proposal(&self, id: DealId, proposal_cid: Cid) -> Result<()>;
}

/// Deal store held in memory
#[derive(Default)]
pub struct MemoryDealStore {
    records: RwLock<BTreeMap<DealId, DealRecord>>,
    next_id: AtomicU64,
}

impl MemoryDealStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store with existing records, keeping their ids
    pub fn with_records(records: impl IntoIterator<Item = DealRecord>) -> Self {
        let records: BTreeMap<_, _> = records.into_iter().map(|r| (r.id, r)).collect();
        let next = records.keys().next_back().copied().unwrap_or(0);
        Self {
            records: RwLock::new(records),
            next_id: AtomicU64::new(next),
        }
    }

    /// Add a record as-is, keeping its id
    pub fn push(&self, record: DealRecord) {
        self.next_id.fetch_max(record.id, Ordering::SeqCst);
        self.records.write().insert(record.id, record);
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    fn update(&self, id: DealId, f: impl FnOnce(&mut DealRecord)) -> Result<()> {
        let mut records = self.records.write();
        let record = records.get_mut(&id).ok_or(CoreError::DealNotFound(id))?;
        f(record);
        Ok(())
    }
}

#[async_trait]
impl DealStore for MemoryDealStore {
    async fn all_deals(&self) -> Result<Vec<DealRecord>> {
        Ok(self.records.read().values().cloned().collect())
    }

    async fn insert(&self, deal: NewDeal) -> Result<DealId> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        self.records.write().insert(id, deal.into_record(id));
        Ok(id)
    }

    async fn get(&self, id: DealId) -> Result<Option<DealRecord>> {
        Ok(self.records.read().get(&id).cloned())
    }

    async fn mark_failed(&self, id: DealId) -> Result<()> {
        self.update(id, |r| r.failed = true)
    }

    async fn confirm(&self, id: DealId, on_chain_id: u64) -> Result<()> {
        if on_chain_id == 0 {
            return Err(CoreError::InvalidInput("on-chain deal id must be positive".to_string()));
        }
        self.update(id, |r| r.deal_id = on_chain_id)
    }

    async fn set_proposal(&self, id: DealId, proposal_cid: Cid) -> Result<()> {
        self.update(id, |r| r.proposal_cid = Some(proposal_cid))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn root() -> Cid {
        filc_blockstore::Block::raw(b"root".as_slice()).cid
    }

    fn provider() -> ProviderAddress {
        "f01234".parse().unwrap()
    }

    #[rstest]
    #[case(0, false, DealState::InProgress)]
    #[case(0, true, DealState::FailedPreAcceptance)]
    #[case(5, false, DealState::Confirmed)]
    #[case(5, true, DealState::Faulted)]
    fn test_record_state(#[case] deal_id: u64, #[case] failed: bool, #[case] expected: DealState) {
        let mut record = NewDeal::new(root(), provider()).into_record(1);
        record.deal_id = deal_id;
        record.failed = failed;
        assert_eq!(record.state(), expected);
    }

    #[test]
    fn test_malformed_provider() {
        let mut record = NewDeal::new(root(), provider()).into_record(7);
        record.provider = "garbage".to_string();
        assert!(matches!(
            record.provider_address(),
            Err(CoreError::MalformedDealRecord { record_id: 7, .. })
        ));
    }

    #[tokio::test]
    async fn test_memory_store_lifecycle() {
        let store = MemoryDealStore::new();
        let id = store.insert(NewDeal::new(root(), provider())).await.unwrap();
        assert_eq!(id, 1);

        store.set_proposal(id, root()).await.unwrap();
        store.confirm(id, 42).await.unwrap();

        let record = store.get(id).await.unwrap().unwrap();
        assert_eq!(record.deal_id, 42);
        assert_eq!(record.proposal_cid, Some(root()));
        assert_eq!(record.state(), DealState::Confirmed);

        store.mark_failed(id).await.unwrap();
        assert_eq!(store.get(id).await.unwrap().unwrap().state(), DealState::Faulted);
    }

    #[tokio::test]
    async fn test_memory_store_unknown_id() {
        let store = MemoryDealStore::new();
        assert!(matches!(store.mark_failed(3).await, Err(CoreError::DealNotFound(3))));
        assert!(store.confirm(3, 0).await.is_err());
        assert!(store.get(3).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_seeded_ids_continue() {
        let seeded = NewDeal::new(root(), provider()).into_record(10);
        let store = MemoryDealStore::with_records([seeded]);
        let id = store.insert(NewDeal::new(root(), provider())).await.unwrap();
        assert_eq!(id, 11);
        assert_eq!(store.all_deals().await.unwrap().len(), 2);
    }

    #[test]
    fn test_record_json_shape() {
        let record = NewDeal::new(root(), provider()).into_record(1);
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["provider"], "f01234");
        assert_eq!(json["content_root"], root().to_string());
        assert!(json["proposal_cid"].is_null());

        let back: DealRecord = serde_json::from_value(json).unwrap();
        assert_eq!(back, record);
    }
}
