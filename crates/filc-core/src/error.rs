//! Error types for the filc-core crate

use cid::Cid;
use std::time::Duration;
use thiserror::Error;

/// Result type alias using `CoreError`
pub type Result<T> = std::result::Result<T, CoreError>;

/// Errors surfaced by the catalog, the ranker and the deal orchestrator
#[derive(Error, Debug)]
pub enum CoreError {
    /// Provider address could not be parsed
    #[error("invalid provider address {address:?}: {reason}")]
    InvalidAddress { address: String, reason: String },

    /// Caller supplied input that cannot be acted on
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A persisted deal record is unusable; ranking is aborted
    #[error("malformed deal record {record_id}: {reason}")]
    MalformedDealRecord { record_id: u64, reason: String },

    /// No provider was given and none could be ranked
    #[error("no ranked providers available")]
    NoProviders,

    /// Content is the root of a split DAG; only its children may be dealt
    #[error("content {0} is a split DAG root and cannot be dealt directly")]
    DagSplitRoot(Cid),

    /// Content id not present in the catalog
    #[error("content not found: {0}")]
    ContentNotFound(u64),

    /// Object id not present in the catalog
    #[error("object not found: {0}")]
    ObjectNotFound(u64),

    /// Deal record id not present in the store
    #[error("deal record not found: {0}")]
    DealNotFound(u64),

    /// Provider rejected the proposal
    #[error("deal rejected by provider: {0}")]
    ProposalRejected(String),

    /// Provider answered the proposal with an error state
    #[error("error response from provider: {0}")]
    ProviderError(String),

    /// Provider answered the proposal with a state we do not act on
    #[error("unrecognized response from provider: {state} {message}")]
    UnrecognizedResponse { state: u64, message: String },

    /// Data transfer reached the failed state
    #[error("data transfer failed: {0}")]
    TransferFailed(String),

    /// Data transfer was cancelled
    #[error("transfer cancelled: {0}")]
    TransferCancelled(String),

    /// Transfer did not finish within the configured bound
    #[error("transfer did not complete within {timeout:?}")]
    TransferTimeout { timeout: Duration },

    /// Shutdown was requested while polling
    #[error("deal orchestration cancelled")]
    Cancelled,

    /// Transport or protocol failure talking to the provider client
    #[error("provider client error: {0}")]
    Provider(String),

    /// Deal-record store failure
    #[error("deal store error: {0}")]
    Store(String),

    /// Block store error
    #[error("block store error: {0}")]
    BlockStore(#[from] filc_blockstore::BlockStoreError),
}

impl CoreError {
    /// Provider refused or garbled the proposal
    pub fn is_negotiation_failure(&self) -> bool {
        matches!(
            self,
            Self::ProposalRejected(_) | Self::ProviderError(_) | Self::UnrecognizedResponse { .. }
        )
    }

    /// Transfer reached a terminal failure state
    pub fn is_transfer_failure(&self) -> bool {
        matches!(self, Self::TransferFailed(_) | Self::TransferCancelled(_))
    }

    /// Rejected before any provider was contacted
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidAddress { .. } | Self::InvalidInput(_) | Self::DagSplitRoot(_)
        )
    }

    /// Message reported by the provider, when the error carries one
    pub fn provider_message(&self) -> Option<&str> {
        match self {
            Self::ProposalRejected(msg)
            | Self::ProviderError(msg)
            | Self::TransferFailed(msg)
            | Self::TransferCancelled(msg) => Some(msg),
            Self::UnrecognizedResponse { message, .. } => Some(message),
            _ => None,
        }
    }
}
