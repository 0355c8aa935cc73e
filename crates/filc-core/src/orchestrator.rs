//! Deal orchestration
//!
//! Drives one deal from provider selection to the end of its data transfer:
//!
//! ```text
//! resolve provider -> get ask -> submit proposal -> start transfer -> poll
//!
//! Requested -> Ongoing -> {TransferFinished, Finalizing, Completing} -> Completed
//! Requested | Ongoing -> Failing -> Failed
//! any non-terminal -> Cancelled
//! ```
//!
//! Nothing is retried here. The poll loop sleeps without holding any shared
//! lock and wakes early when the shutdown signal fires.

use crate::address::ProviderAddress;
use crate::catalog::ContentCatalog;
use crate::deals::{DealId, DealStore, NewDeal};
use crate::market::{
    ChannelId, DealProposal, ProposalResponse, ProposalState, ProviderClient, TransferStatusCode,
};
use crate::ranking::ProviderRanker;
use crate::{CoreError, Result};
use cid::Cid;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, instrument, warn};

/// Epochs per day on the storage network
pub const EPOCHS_PER_DAY: u64 = 2880;

/// Default deal length, one year
pub const DEFAULT_DEAL_DURATION: u64 = EPOCHS_PER_DAY * 365;

/// Default delay between transfer status polls
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Clone, Debug)]
pub struct DealConfig {
    pub poll_interval: Duration,
    pub duration_epochs: u64,
    pub start_epoch_offset: u64,
    /// Upper bound on the transfer phase, unbounded when `None`
    pub transfer_timeout: Option<Duration>,
}

impl Default for DealConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            duration_epochs: DEFAULT_DEAL_DURATION,
            start_epoch_offset: 0,
            transfer_timeout: None,
        }
    }
}

impl DealConfig {
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_duration(mut self, epochs: u64) -> Self {
        self.duration_epochs = epochs;
        self
    }

    pub fn with_transfer_timeout(mut self, timeout: Duration) -> Self {
        self.transfer_timeout = Some(timeout);
        self
    }
}

/// Progress notifications for a single deal
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DealEvent {
    ProposalSubmitted {
        record_id: DealId,
        provider: ProviderAddress,
        proposal_cid: Cid,
    },
    ProposalAccepted {
        state: ProposalState,
    },
    TransferStarted {
        channel: ChannelId,
    },
    /// Emitted once per change of transfer status
    Transition {
        from: Option<TransferStatusCode>,
        to: TransferStatusCode,
    },
    Completed {
        bytes_sent: u64,
    },
}

/// Result of a deal whose transfer completed
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DealOutcome {
    pub record_id: DealId,
    pub provider: ProviderAddress,
    /// Locally computed proposal identifier
    pub proposal_cid: Cid,
    /// Proposal identifier returned by the provider
    pub provider_proposal: Cid,
    pub channel_id: ChannelId,
    pub bytes_sent: u64,
}

/// Makes storage deals with providers
pub struct DealOrchestrator<C: ProviderClient, S: DealStore> {
    client: Arc<C>,
    ranker: Arc<ProviderRanker<S>>,
    store: Arc<S>,
    catalog: Option<Arc<ContentCatalog>>,
    config: DealConfig,
    shutdown: Option<watch::Receiver<bool>>,
    events: Option<mpsc::UnboundedSender<DealEvent>>,
}

impl<C: ProviderClient, S: DealStore> DealOrchestrator<C, S> {
    pub fn new(client: Arc<C>, ranker: Arc<ProviderRanker<S>>, store: Arc<S>) -> Self {
        Self {
            client,
            ranker,
            store,
            catalog: None,
            config: DealConfig::default(),
            shutdown: None,
            events: None,
        }
    }

    pub fn with_config(mut self, config: DealConfig) -> Self {
        self.config = config;
        self
    }

    /// Refuse roots the catalog knows as split DAG roots
    pub fn with_catalog(mut self, catalog: Arc<ContentCatalog>) -> Self {
        self.catalog = Some(catalog);
        self
    }

    /// Stop polling once the watched value turns `true`
    pub fn with_shutdown(mut self, shutdown: watch::Receiver<bool>) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    pub fn with_events(mut self, events: mpsc::UnboundedSender<DealEvent>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn config(&self) -> &DealConfig {
        &self.config
    }

    /// Make a deal for `root` with `provider`, or with the best ranked
    /// provider when none is given, and wait for the transfer to finish.
    #[instrument(skip(self))]
    pub async fn make_deal(
        &self,
        provider: Option<ProviderAddress>,
        root: Cid,
        verified: bool,
    ) -> Result<DealOutcome> {
        if let Some(catalog) = &self.catalog {
            catalog.ensure_dealable(&root)?;
        }

        let provider = match provider {
            Some(provider) => provider,
            None => self.best_provider().await?,
        };

        let ask = self.client.get_ask(&provider).await?;
        let proposal = DealProposal {
            provider: provider.clone(),
            root,
            price_per_epoch: ask.price_for(verified),
            start_epoch_offset: self.config.start_epoch_offset,
            duration_epochs: self.config.duration_epochs,
            verified,
        };
        let proposal_cid = proposal.proposal_cid()?;

        let record_id = self
            .store
            .insert(
                NewDeal::new(root, provider.clone())
                    .with_proposal(proposal_cid)
                    .verified(verified),
            )
            .await?;
        info!(record_id, %proposal_cid, price = %proposal.price_per_epoch, "submitting proposal");
        self.emit(DealEvent::ProposalSubmitted {
            record_id,
            provider: provider.clone(),
            proposal_cid,
        });

        match self
            .negotiate_and_transfer(record_id, proposal_cid, &proposal)
            .await
        {
            Ok((response, channel_id, bytes_sent)) => {
                info!(record_id, %channel_id, bytes_sent, "transfer complete");
                self.emit(DealEvent::Completed { bytes_sent });
                Ok(DealOutcome {
                    record_id,
                    provider,
                    proposal_cid,
                    provider_proposal: response.proposal,
                    channel_id,
                    bytes_sent,
                })
            }
            Err(CoreError::Cancelled) => Err(CoreError::Cancelled),
            Err(e) => {
                if let Err(store_err) = self.store.mark_failed(record_id).await {
                    warn!(record_id, error = %store_err, "could not mark deal failed");
                }
                Err(e)
            }
        }
    }

    async fn best_provider(&self) -> Result<ProviderAddress> {
        let ranked = self.ranker.get_ranked_providers().await?;
        let provider = ranked.into_iter().next().ok_or(CoreError::NoProviders)?;
        debug!(%provider, "using top ranked provider");
        Ok(provider)
    }

    async fn negotiate_and_transfer(
        &self,
        record_id: DealId,
        proposal_cid: Cid,
        proposal: &DealProposal,
    ) -> Result<(ProposalResponse, ChannelId, u64)> {
        let response = self.client.submit_proposal(proposal).await?;
        info!(state = response.state.code(), "proposal response");

        match response.state {
            ProposalState::WaitingForData | ProposalState::ProposalAccepted => {
                info!("provider accepted the deal");
                self.emit(DealEvent::ProposalAccepted {
                    state: response.state,
                });
            }
            ProposalState::ProposalRejected => {
                return Err(CoreError::ProposalRejected(response.message));
            }
            ProposalState::Error => return Err(CoreError::ProviderError(response.message)),
            ProposalState::Other(state) => {
                return Err(CoreError::UnrecognizedResponse {
                    state,
                    message: response.message,
                });
            }
        }

        // The record tracks the proposal under the provider's identifier
        if response.proposal != proposal_cid {
            debug!(record_id, provider_proposal = %response.proposal, "provider renamed proposal");
            self.store.set_proposal(record_id, response.proposal).await?;
        }

        let channel = self
            .client
            .start_transfer(&proposal.provider, &response.proposal, &proposal.root)
            .await?;
        info!(%channel, "data transfer started");
        self.emit(DealEvent::TransferStarted {
            channel: channel.clone(),
        });

        let sent = self.await_transfer(&channel).await?;
        Ok((response, channel, sent))
    }

    /// Poll the channel until it reaches a terminal state
    #[instrument(skip(self), fields(channel = %channel))]
    async fn await_transfer(&self, channel: &ChannelId) -> Result<u64> {
        let started = Instant::now();
        let mut shutdown = self.shutdown.clone();
        let mut last: Option<TransferStatusCode> = None;

        if shutdown.as_ref().is_some_and(|rx| *rx.borrow()) {
            return Err(CoreError::Cancelled);
        }

        loop {
            let status = self.client.get_transfer_status(channel).await?;
            let code = status.status;

            if last != Some(code) {
                match code {
                    TransferStatusCode::Failing => {
                        warn!(message = %status.message, "data transfer failing")
                    }
                    TransferStatusCode::Other(n) => {
                        warn!(code = n, message = %status.message, "unexpected data transfer state")
                    }
                    _ => info!(state = %code, "transfer state changed"),
                }
                self.emit(DealEvent::Transition { from: last, to: code });
            }

            if code.is_terminal() {
                return match code {
                    TransferStatusCode::Completed => Ok(status.sent),
                    TransferStatusCode::Cancelled => {
                        Err(CoreError::TransferCancelled(status.message))
                    }
                    _ => Err(CoreError::TransferFailed(status.message)),
                };
            }
            debug!(state = %code, sent = status.sent, "transfer progress");
            last = Some(code);

            if let Some(timeout) = self.config.transfer_timeout {
                if started.elapsed() >= timeout {
                    return Err(CoreError::TransferTimeout { timeout });
                }
            }

            self.pause(&mut shutdown).await?;
        }
    }

    /// Sleep one poll interval, returning early on shutdown
    async fn pause(&self, shutdown: &mut Option<watch::Receiver<bool>>) -> Result<()> {
        let sleep = tokio::time::sleep(self.config.poll_interval);
        tokio::pin!(sleep);

        if let Some(rx) = shutdown.as_mut() {
            let stopped = tokio::select! {
                () = &mut sleep => return Ok(()),
                res = rx.wait_for(|stop| *stop) => res.is_ok(),
            };
            if stopped {
                info!("shutdown requested, abandoning transfer poll");
                return Err(CoreError::Cancelled);
            }
            // Sender dropped without signalling; keep polling unsupervised
            *shutdown = None;
        }

        sleep.await;
        Ok(())
    }

    fn emit(&self, event: DealEvent) {
        if let Some(events) = &self.events {
            let _ = events.send(event);
        }
    }
}
