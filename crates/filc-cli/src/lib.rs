//! # filc CLI
//!
//! Command-line client that imports content into a local block store and
//! makes storage deals with ranked providers.
//!
//! This crate provides:
//! - **Configuration**: Defaults, `config.toml` and `FILC_*` environment layering
//! - **Deal Records**: A JSON-file `DealStore` under the data directory
//! - **Commands**: deal, get-ask, query-retrieval, list, rank, classify, clear-blockstore
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │               filc binary               │
//! ├─────────────────────────────────────────┤
//! │  Commands  │  AppState  │  FilcConfig   │
//! ├─────────────────────────────────────────┤
//! │ filc-core  │ filc-client │ JsonDealStore│
//! ├─────────────────────────────────────────┤
//! │      filc-blockstore (FsBlockStore)     │
//! └─────────────────────────────────────────┘
//! ```

pub mod commands;
pub mod config;
pub mod state;
pub mod store;

pub use commands::{run, Command};
pub use config::FilcConfig;
pub use state::{AppState, Orchestrator};
pub use store::JsonDealStore;
