//! Provider-client capability and storage market types
//!
//! The core never speaks a provider's wire protocol. Everything it needs
//! from a provider goes through [`ProviderClient`], implemented over JSON-RPC
//! by `filc-client` and by scripted clients in tests.

use crate::address::ProviderAddress;
use crate::Result;
use async_trait::async_trait;
use cid::Cid;
use filc_blockstore::{cid_serde, Block};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Token amount in atto units
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TokenAmount(pub u128);

impl TokenAmount {
    pub const fn zero() -> Self {
        Self(0)
    }

    pub fn atto(&self) -> u128 {
        self.0
    }
}

impl fmt::Display for TokenAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serialize for TokenAmount {
    fn serialize<S: Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        s.serialize_str(&self.0.to_string())
    }
}

impl<'de> Deserialize<'de> for TokenAmount {
    fn deserialize<D: Deserializer<'de>>(d: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(d)?;
        s.parse().map(Self).map_err(serde::de::Error::custom)
    }
}

/// Price and size limits a provider advertises
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageAsk {
    pub provider: ProviderAddress,
    /// Price per GiB per epoch
    pub price: TokenAmount,
    pub verified_price: TokenAmount,
    pub min_piece_size: u64,
    pub max_piece_size: u64,
}

impl StorageAsk {
    pub fn price_for(&self, verified: bool) -> TokenAmount {
        if verified {
            self.verified_price
        } else {
            self.price
        }
    }
}

/// Storage deal proposal sent to a provider
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DealProposal {
    pub provider: ProviderAddress,
    #[serde(with = "cid_serde")]
    pub root: Cid,
    pub price_per_epoch: TokenAmount,
    pub start_epoch_offset: u64,
    pub duration_epochs: u64,
    pub verified: bool,
}

impl DealProposal {
    /// Local identifier derived from the DAG-CBOR encoding of the proposal
    pub fn proposal_cid(&self) -> Result<Cid> {
        Ok(Block::encode_ipld(self)?.cid)
    }
}

/// Proposal states a provider may answer with
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProposalState {
    ProposalRejected,
    ProposalAccepted,
    WaitingForData,
    Error,
    Other(u64),
}

impl ProposalState {
    pub fn from_code(code: u64) -> Self {
        match code {
            2 => Self::ProposalRejected,
            3 => Self::ProposalAccepted,
            18 => Self::WaitingForData,
            26 => Self::Error,
            other => Self::Other(other),
        }
    }

    pub fn code(&self) -> u64 {
        match self {
            Self::ProposalRejected => 2,
            Self::ProposalAccepted => 3,
            Self::WaitingForData => 18,
            Self::Error => 26,
            Self::Other(code) => *code,
        }
    }
}

impl Serialize for ProposalState {
    fn serialize<S: Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        s.serialize_u64(self.code())
    }
}

impl<'de> Deserialize<'de> for ProposalState {
    fn deserialize<D: Deserializer<'de>>(d: D) -> std::result::Result<Self, D::Error> {
        u64::deserialize(d).map(Self::from_code)
    }
}

/// Provider's synchronous answer to a proposal
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposalResponse {
    pub state: ProposalState,
    #[serde(default)]
    pub message: String,
    /// Proposal identifier the provider tracks the deal under
    #[serde(with = "cid_serde")]
    pub proposal: Cid,
}

/// Data-transfer channel states
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TransferStatusCode {
    Requested,
    Ongoing,
    TransferFinished,
    Finalizing,
    Completing,
    Completed,
    Failing,
    Failed,
    Cancelled,
    Other(u64),
}

impl TransferStatusCode {
    pub fn from_code(code: u64) -> Self {
        match code {
            0 => Self::Requested,
            1 => Self::Ongoing,
            2 => Self::TransferFinished,
            4 => Self::Finalizing,
            5 => Self::Completing,
            6 => Self::Completed,
            7 => Self::Failing,
            8 => Self::Failed,
            10 => Self::Cancelled,
            other => Self::Other(other),
        }
    }

    pub fn code(&self) -> u64 {
        match self {
            Self::Requested => 0,
            Self::Ongoing => 1,
            Self::TransferFinished => 2,
            Self::Finalizing => 4,
            Self::Completing => 5,
            Self::Completed => 6,
            Self::Failing => 7,
            Self::Failed => 8,
            Self::Cancelled => 10,
            Self::Other(code) => *code,
        }
    }

    /// No further state changes follow
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

impl fmt::Display for TransferStatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Requested => "Requested",
            Self::Ongoing => "Ongoing",
            Self::TransferFinished => "TransferFinished",
            Self::Finalizing => "Finalizing",
            Self::Completing => "Completing",
            Self::Completed => "Completed",
            Self::Failing => "Failing",
            Self::Failed => "Failed",
            Self::Cancelled => "Cancelled",
            Self::Other(code) => return write!(f, "Unknown({})", code),
        };
        f.write_str(name)
    }
}

impl Serialize for TransferStatusCode {
    fn serialize<S: Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        s.serialize_u64(self.code())
    }
}

impl<'de> Deserialize<'de> for TransferStatusCode {
    fn deserialize<D: Deserializer<'de>>(d: D) -> std::result::Result<Self, D::Error> {
        u64::deserialize(d).map(Self::from_code)
    }
}

/// Identifier of a data-transfer channel
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChannelId {
    pub initiator: String,
    pub responder: String,
    pub id: u64,
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}-{}", self.initiator, self.responder, self.id)
    }
}

/// Snapshot of a transfer channel
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferStatus {
    pub status: TransferStatusCode,
    #[serde(default)]
    pub message: String,
    /// Bytes sent so far
    #[serde(default)]
    pub sent: u64,
}

/// Retrieval availability reported by a provider
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum QueryStatus {
    Available,
    Unavailable,
    Error,
    Unknown(u64),
}

impl QueryStatus {
    pub fn from_code(code: u64) -> Self {
        match code {
            0 => Self::Available,
            1 => Self::Unavailable,
            2 => Self::Error,
            other => Self::Unknown(other),
        }
    }

    pub fn code(&self) -> u64 {
        match self {
            Self::Available => 0,
            Self::Unavailable => 1,
            Self::Error => 2,
            Self::Unknown(code) => *code,
        }
    }
}

impl fmt::Display for QueryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Available => f.write_str("Available"),
            Self::Unavailable => f.write_str("Unavailable"),
            Self::Error => f.write_str("Error"),
            Self::Unknown(code) => write!(f, "Unknown ({})", code),
        }
    }
}

impl Serialize for QueryStatus {
    fn serialize<S: Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        s.serialize_u64(self.code())
    }
}

impl<'de> Deserialize<'de> for QueryStatus {
    fn deserialize<D: Deserializer<'de>>(d: D) -> std::result::Result<Self, D::Error> {
        u64::deserialize(d).map(Self::from_code)
    }
}

/// Answer to a retrieval query
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryResponse {
    pub status: QueryStatus,
    pub size: u64,
    pub unseal_price: TokenAmount,
    pub min_price_per_byte: TokenAmount,
    pub payment_address: String,
    pub max_payment_interval: u64,
    pub max_payment_interval_increase: u64,
    #[serde(default)]
    pub piece_cid_found: bool,
    #[serde(default)]
    pub message: String,
}

/// Operations the core needs from a storage provider
#[async_trait]
pub trait ProviderClient: Send + Sync {
    async fn get_ask(&self, provider: &ProviderAddress) -> Result<StorageAsk>;

    async fn submit_proposal(&self, proposal: &DealProposal) -> Result<ProposalResponse>;

    /// Open a transfer channel pushing `root` to the provider
    async fn start_transfer(
        &self,
        provider: &ProviderAddress,
        proposal: &Cid,
        root: &Cid,
    ) -> Result<ChannelId>;

    async fn get_transfer_status(&self, channel: &ChannelId) -> Result<TransferStatus>;

    async fn retrieval_query(&self, provider: &ProviderAddress, root: &Cid) -> Result<QueryResponse>;
}
