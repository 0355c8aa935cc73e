//! Block types

use crate::cid_utils::{create_cid, CidCodec};
use bytes::Bytes;
use cid::Cid;

/// A block of data with its CID
#[derive(Clone, Debug)]
pub struct Block {
    /// The content identifier
    pub cid: Cid,
    /// The raw data
    pub data: Bytes,
}

impl Block {
    /// Create a block from bytes, computing its CID under `codec`
    pub fn new(data: impl Into<Bytes>, codec: CidCodec) -> Self {
        let data = data.into();
        let cid = create_cid(&data, codec);
        Self { cid, data }
    }

    /// Create a raw leaf block
    pub fn raw(data: impl Into<Bytes>) -> Self {
        Self::new(data, CidCodec::Raw)
    }

    /// Encode a value as DAG-CBOR and wrap it in a block
    pub fn encode_ipld<T: serde::Serialize>(value: &T) -> crate::Result<Self> {
        let bytes = serde_ipld_dagcbor::to_vec(value)
            .map_err(|e| crate::BlockStoreError::Serialization(e.to_string()))?;
        Ok(Self::new(bytes, CidCodec::DagCbor))
    }

    /// Get the size of the block
    pub fn size(&self) -> usize {
        self.data.len()
    }
}

/// Serializes CIDs as their string form
pub mod cid_serde {
    use cid::Cid;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(cid: &Cid, s: S) -> Result<S::Ok, S::Error> {
        cid.to_string().serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Cid, D::Error> {
        let s = String::deserialize(d)?;
        s.parse().map_err(serde::de::Error::custom)
    }

    /// Same encoding for optional CIDs
    pub mod opt {
        use cid::Cid;
        use serde::{Deserialize, Deserializer, Serialize, Serializer};

        pub fn serialize<S: Serializer>(cid: &Option<Cid>, s: S) -> Result<S::Ok, S::Error> {
            cid.map(|c| c.to_string()).serialize(s)
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Cid>, D::Error> {
            Option::<String>::deserialize(d)?
                .map(|s| s.parse().map_err(serde::de::Error::custom))
                .transpose()
        }
    }
}
