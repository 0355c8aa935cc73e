//! # filc Client
//!
//! JSON-RPC implementation of the provider-client capability used by
//! `filc-core`: storage asks, deal proposals, data transfers and retrieval
//! queries, all through a single storage gateway endpoint.
//!
//! ## Example
//!
//! ```rust,ignore
//! use filc_client::{ClientConfig, RpcProviderClient};
//! use filc_core::ProviderClient;
//!
//! let client = RpcProviderClient::new(
//!     ClientConfig::new("http://127.0.0.1:1234/rpc/v0").with_token("token"),
//! )?;
//! let ask = client.get_ask(&"f01234".parse()?).await?;
//! println!("price: {}", ask.price);
//! ```

mod client;
mod config;
mod error;
pub mod types;

pub use client::RpcProviderClient;
pub use config::{ClientConfig, DEFAULT_ENDPOINT};
pub use error::{ClientError, Result};
