//! Per-provider deal statistics

use crate::address::ProviderAddress;
use crate::deals::{DealRecord, DealState};
use crate::Result;
use serde::Serialize;
use std::collections::HashMap;

/// Deal counters for one provider
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ProviderStats {
    pub provider: ProviderAddress,
    pub total: u64,
    pub confirmed: u64,
    /// Failed before an on-chain id was assigned
    pub failed_deals: u64,
    /// Failed after an on-chain id was assigned
    pub deal_faults: u64,
}

impl ProviderStats {
    pub fn new(provider: ProviderAddress) -> Self {
        Self {
            provider,
            total: 0,
            confirmed: 0,
            failed_deals: 0,
            deal_faults: 0,
        }
    }

    /// Deals neither confirmed nor failed
    pub fn in_progress(&self) -> u64 {
        self.total - self.confirmed - self.failed_deals - self.deal_faults
    }

    /// `confirmed / total`, `None` when no deals were recorded
    pub fn success_ratio(&self) -> Option<f64> {
        (self.total > 0).then(|| self.confirmed as f64 / self.total as f64)
    }

    fn record(&mut self, state: DealState) {
        self.total += 1;
        match state {
            DealState::Confirmed => self.confirmed += 1,
            DealState::Faulted => self.deal_faults += 1,
            DealState::FailedPreAcceptance => self.failed_deals += 1,
            DealState::InProgress => {}
        }
    }
}

/// Fold deal records into per-provider counters.
///
/// A record whose provider cannot be parsed aborts the whole computation.
pub fn aggregate_deal_stats(
    records: &[DealRecord],
) -> Result<HashMap<ProviderAddress, ProviderStats>> {
    let mut stats: HashMap<ProviderAddress, ProviderStats> = HashMap::new();

    for record in records {
        let provider = record.provider_address()?;
        stats
            .entry(provider.clone())
            .or_insert_with(|| ProviderStats::new(provider))
            .record(record.state());
    }

    Ok(stats)
}
