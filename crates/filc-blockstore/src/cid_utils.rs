//! CID (Content Identifier) utilities
//!
//! Blocks are addressed with CIDv1 over a SHA2-256 multihash of the block bytes.

use cid::Cid;
use multihash_codetable::{Code, MultihashDigest};

/// Supported IPLD codecs
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CidCodec {
    /// Raw binary data (0x55)
    #[default]
    Raw,
    /// DAG-CBOR (0x71)
    DagCbor,
    /// DAG-PB/Protobuf (0x70)
    DagPb,
}

impl CidCodec {
    /// Get the multicodec code
    pub fn code(&self) -> u64 {
        match self {
            CidCodec::Raw => 0x55,
            CidCodec::DagCbor => 0x71,
            CidCodec::DagPb => 0x70,
        }
    }

    /// Parse from multicodec code
    pub fn from_code(code: u64) -> Option<Self> {
        match code {
            0x55 => Some(CidCodec::Raw),
            0x71 => Some(CidCodec::DagCbor),
            0x70 => Some(CidCodec::DagPb),
            _ => None,
        }
    }

    /// Name used by the IPFS HTTP API (`cid-codec` parameter)
    pub fn name(&self) -> &'static str {
        match self {
            CidCodec::Raw => "raw",
            CidCodec::DagCbor => "dag-cbor",
            CidCodec::DagPb => "dag-pb",
        }
    }
}

/// Create a CIDv1 for `data` under the given codec
pub fn create_cid(data: &[u8], codec: CidCodec) -> Cid {
    Cid::new_v1(codec.code(), Code::Sha2_256.digest(data))
}

/// Verify that data matches a CID
pub fn verify_cid(data: &[u8], cid: &Cid) -> bool {
    match CidCodec::from_code(cid.codec()) {
        Some(codec) => create_cid(data, codec) == *cid,
        None => false,
    }
}

/// Parse a CID from a string
pub fn parse_cid(s: &str) -> Result<Cid, crate::BlockStoreError> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return Err(crate::BlockStoreError::InvalidCid("empty CID".to_string()));
    }
    trimmed
        .parse()
        .map_err(|e: cid::Error| crate::BlockStoreError::InvalidCid(e.to_string()))
}

/// Get the codec of a CID
pub fn get_codec(cid: &Cid) -> Option<CidCodec> {
    CidCodec::from_code(cid.codec())
}
