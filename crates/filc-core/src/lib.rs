//! # filc Core
//!
//! Deal-making core for the filc storage client.
//!
//! This crate provides:
//! - **Content Catalog**: Content, deduplicated objects and the references between them
//! - **Stats Aggregation**: Per-provider deal counters folded from deal records
//! - **Provider Ranking**: Success-ratio ordering served from a TTL cache
//! - **Deal Orchestration**: Proposal, transfer and the polling state machine
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │           Deal Orchestrator             │
//! ├────────────────────┬────────────────────┤
//! │  Provider Ranker   │  ProviderClient    │
//! ├────────────────────┤  (external)        │
//! │  Stats Aggregator  │                    │
//! ├────────────────────┼────────────────────┤
//! │     DealStore      │  Content Catalog   │
//! └────────────────────┴────────────────────┘
//! ```

pub mod address;
pub mod catalog;
pub mod content;
pub mod deals;
pub mod error;
pub mod market;
pub mod orchestrator;
pub mod ranking;
pub mod stats;

pub use address::ProviderAddress;
pub use catalog::{classify, ContentCatalog};
pub use content::{Content, ContentId, ContentType, NewContent, ObjRef, Object, ObjectId};
pub use deals::{DealId, DealRecord, DealState, DealStore, MemoryDealStore, NewDeal};
pub use error::{CoreError, Result};
pub use market::{
    ChannelId, DealProposal, ProposalResponse, ProposalState, ProviderClient, QueryResponse,
    QueryStatus, StorageAsk, TokenAmount, TransferStatus, TransferStatusCode,
};
pub use orchestrator::{
    DealConfig, DealEvent, DealOrchestrator, DealOutcome, DEFAULT_DEAL_DURATION,
    DEFAULT_POLL_INTERVAL, EPOCHS_PER_DAY,
};
pub use ranking::{rank_stats, ProviderRanker, RankerConfig, DEFAULT_RANKING_TTL};
pub use stats::{aggregate_deal_stats, ProviderStats};
