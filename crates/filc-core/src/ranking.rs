//! Provider ranking with a time-limited cache
//!
//! Providers are ordered by deal success ratio. The ordering is cached for a
//! TTL; one lock covers both the freshness check and the recomputation, so
//! callers arriving during a miss wait for a single recomputation instead of
//! each running their own.

use crate::address::ProviderAddress;
use crate::deals::DealStore;
use crate::stats::{aggregate_deal_stats, ProviderStats};
use crate::Result;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, instrument};

/// Default lifetime of a computed ranking
pub const DEFAULT_RANKING_TTL: Duration = Duration::from_secs(60);

#[derive(Clone, Debug)]
pub struct RankerConfig {
    /// How long a computed ordering is served from cache
    pub ttl: Duration,
}

impl Default for RankerConfig {
    fn default() -> Self {
        Self {
            ttl: DEFAULT_RANKING_TTL,
        }
    }
}

impl RankerConfig {
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }
}

struct CachedRanking {
    computed_at: Instant,
    providers: Vec<ProviderAddress>,
}

/// Ranks providers from the deal store, caching the result
pub struct ProviderRanker<S: DealStore> {
    store: Arc<S>,
    config: RankerConfig,
    cache: Mutex<Option<CachedRanking>>,
}

impl<S: DealStore> ProviderRanker<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self::with_config(store, RankerConfig::default())
    }

    pub fn with_config(store: Arc<S>, config: RankerConfig) -> Self {
        Self {
            store,
            config,
            cache: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &RankerConfig {
        &self.config
    }

    /// Providers ordered best first.
    ///
    /// Served from cache while it is younger than the TTL. A failed
    /// recomputation leaves the previous cache in place and returns the error.
    #[instrument(skip(self))]
    pub async fn get_ranked_providers(&self) -> Result<Vec<ProviderAddress>> {
        let mut cache = self.cache.lock().await;

        if let Some(cached) = cache.as_ref() {
            if cached.computed_at.elapsed() < self.config.ttl {
                debug!(providers = cached.providers.len(), "ranking served from cache");
                return Ok(cached.providers.clone());
            }
        }

        let providers: Vec<ProviderAddress> = self
            .ranked_stats()
            .await?
            .into_iter()
            .map(|s| s.provider)
            .collect();

        debug!(providers = providers.len(), "ranking recomputed");
        *cache = Some(CachedRanking {
            computed_at: Instant::now(),
            providers: providers.clone(),
        });
        Ok(providers)
    }

    /// Freshly computed stats in ranking order, bypassing the cache
    pub async fn ranked_stats(&self) -> Result<Vec<ProviderStats>> {
        let records = self.store.all_deals().await?;
        let stats = aggregate_deal_stats(&records)?;
        Ok(rank_stats(stats))
    }

    /// Drop the cached ordering so the next call recomputes
    pub async fn invalidate(&self) {
        *self.cache.lock().await = None;
    }
}

/// Order stats by decreasing success ratio, ties by address.
///
/// Providers without any recorded deal are left out.
pub fn rank_stats(stats: HashMap<ProviderAddress, ProviderStats>) -> Vec<ProviderStats> {
    let mut ranked: Vec<(f64, ProviderStats)> = stats
        .into_values()
        .filter_map(|s| s.success_ratio().map(|ratio| (ratio, s)))
        .collect();

    ranked.sort_by(|(ra, a), (rb, b)| {
        rb.partial_cmp(ra)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.provider.cmp(&b.provider))
    });

    ranked.into_iter().map(|(_, s)| s).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deals::{DealRecord, MemoryDealStore, NewDeal};
    use crate::CoreError;
    use async_trait::async_trait;
    use cid::Cid;
    use proptest::prelude::*;
    use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};

    fn root() -> Cid {
        filc_blockstore::Block::raw(b"root".as_slice()).cid
    }

    fn record(id: u64, provider: &str, deal_id: u64, failed: bool) -> DealRecord {
        let mut record = NewDeal::new(root(), provider.parse().unwrap()).into_record(id);
        record.deal_id = deal_id;
        record.failed = failed;
        record
    }

    fn addrs(list: &[ProviderAddress]) -> Vec<&str> {
        list.iter().map(|a| a.as_str()).collect()
    }

    /// Counts bulk reads and delegates to a memory store
    #[derive(Default)]
    struct CountingStore {
        inner: MemoryDealStore,
        reads: AtomicUsize,
    }

    #[async_trait]
    impl DealStore for CountingStore {
        async fn all_deals(&self) -> Result<Vec<DealRecord>> {
            self.reads.fetch_add(1, AtomicOrdering::SeqCst);
            tokio::task::yield_now().await;
            self.inner.all_deals().await
        }

        async fn insert(&self, deal: NewDeal) -> Result<u64> {
            self.inner.insert(deal).await
        }

        async fn get(&self, id: u64) -> Result<Option<DealRecord>> {
            self.inner.get(id).await
        }

        async fn mark_failed(&self, id: u64) -> Result<()> {
            self.inner.mark_failed(id).await
        }

        async fn confirm(&self, id: u64, on_chain_id: u64) -> Result<()> {
            self.inner.confirm(id, on_chain_id).await
        }

        async fn set_proposal(&self, id: u64, proposal_cid: Cid) -> Result<()> {
            self.inner.set_proposal(id, proposal_cid).await
        }
    }

    #[tokio::test]
    async fn test_ranking_order() {
        let store = Arc::new(MemoryDealStore::with_records([
            record(1, "f01", 5, false),
            record(2, "f01", 0, true),
            record(3, "f02", 7, false),
        ]));
        let ranker = ProviderRanker::new(store);

        let ranked = ranker.get_ranked_providers().await.unwrap();
        assert_eq!(addrs(&ranked), vec!["f02", "f01"]);
    }

    #[tokio::test]
    async fn test_cached_within_ttl() {
        let store = Arc::new(MemoryDealStore::with_records([
            record(1, "f01", 5, false),
            record(2, "f02", 0, false),
        ]));
        let ranker = ProviderRanker::new(store.clone());
        let first = ranker.get_ranked_providers().await.unwrap();
        assert_eq!(addrs(&first), vec!["f01", "f02"]);

        // f02 now outranks f01, and f03 appears
        store.mark_failed(1).await.unwrap();
        store.confirm(2, 9).await.unwrap();
        store.push(record(3, "f03", 4, false));

        let second = ranker.get_ranked_providers().await.unwrap();
        assert_eq!(first, second);

        ranker.invalidate().await;
        let third = ranker.get_ranked_providers().await.unwrap();
        assert_eq!(addrs(&third), vec!["f02", "f03", "f01"]);
    }

    #[tokio::test]
    async fn test_zero_ttl_recomputes() {
        let store = Arc::new(CountingStore::default());
        store.inner.push(record(1, "f01", 1, false));
        let ranker = ProviderRanker::with_config(
            store.clone(),
            RankerConfig::default().with_ttl(Duration::ZERO),
        );

        ranker.get_ranked_providers().await.unwrap();
        ranker.get_ranked_providers().await.unwrap();
        assert_eq!(store.reads.load(AtomicOrdering::SeqCst), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_miss_recomputes_once() {
        let store = Arc::new(CountingStore::default());
        store.inner.push(record(1, "f01", 1, false));
        store.inner.push(record(2, "f02", 0, true));
        let ranker = Arc::new(ProviderRanker::new(store.clone()));

        let calls = (0..16).map(|_| {
            let ranker = Arc::clone(&ranker);
            tokio::spawn(async move { ranker.get_ranked_providers().await.unwrap() })
        });
        let results = futures::future::join_all(calls).await;

        assert_eq!(store.reads.load(AtomicOrdering::SeqCst), 1);
        for result in results {
            assert_eq!(addrs(&result.unwrap()), vec!["f01", "f02"]);
        }
    }

    #[tokio::test]
    async fn test_error_leaves_cache_untouched() {
        let store = Arc::new(MemoryDealStore::with_records([record(1, "f01", 1, false)]));
        let ranker = ProviderRanker::with_config(
            store.clone(),
            RankerConfig::default().with_ttl(Duration::ZERO),
        );
        let good = ranker.get_ranked_providers().await.unwrap();

        let mut bad = record(2, "f02", 0, false);
        bad.provider = "bogus".to_string();
        store.push(bad);

        let err = ranker.get_ranked_providers().await.unwrap_err();
        assert!(matches!(err, CoreError::MalformedDealRecord { .. }));

        let cache = ranker.cache.lock().await;
        assert_eq!(cache.as_ref().unwrap().providers, good);
    }

    #[test]
    fn test_zero_total_excluded_and_ties_by_address() {
        let mut stats = HashMap::new();
        for (addr, total, confirmed) in [("f09", 2, 1), ("f03", 4, 2), ("f05", 0, 0)] {
            let provider: ProviderAddress = addr.parse().unwrap();
            let mut s = ProviderStats::new(provider.clone());
            s.total = total;
            s.confirmed = confirmed;
            stats.insert(provider, s);
        }

        let ranked: Vec<_> = rank_stats(stats).into_iter().map(|s| s.provider).collect();
        assert_eq!(addrs(&ranked), vec!["f03", "f09"]);
    }

    proptest! {
        #[test]
        fn ranking_is_non_increasing(
            deals in prop::collection::vec((0u8..6, 0u64..3, any::<bool>()), 0..120)
        ) {
            let records: Vec<_> = deals
                .iter()
                .enumerate()
                .map(|(i, (p, id, failed))| record(i as u64, &format!("f0{}", p), *id, *failed))
                .collect();

            let ranked = rank_stats(aggregate_deal_stats(&records).unwrap());
            for pair in ranked.windows(2) {
                let a = pair[0].success_ratio().unwrap();
                let b = pair[1].success_ratio().unwrap();
                prop_assert!(a >= b);
            }
            prop_assert!(ranked.iter().all(|s| s.total > 0));
        }
    }
}
