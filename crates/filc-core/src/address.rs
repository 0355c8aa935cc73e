//! Storage provider addresses
//!
//! Addresses are kept in their canonical string form (`f01234`, `t3abc...`).
//! The payload checksum is not verified; parsing only rejects strings that
//! cannot be an actor address at all.

use crate::{CoreError, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Address protocol, the digit after the network prefix
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Protocol {
    Id,
    Secp256k1,
    Actor,
    Bls,
    Delegated,
}

impl Protocol {
    fn from_digit(c: char) -> Option<Self> {
        match c {
            '0' => Some(Self::Id),
            '1' => Some(Self::Secp256k1),
            '2' => Some(Self::Actor),
            '3' => Some(Self::Bls),
            '4' => Some(Self::Delegated),
            _ => None,
        }
    }
}

/// Address of a storage provider (miner actor)
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProviderAddress(String);

impl ProviderAddress {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn invalid(address: &str, reason: impl Into<String>) -> CoreError {
    CoreError::InvalidAddress {
        address: address.to_string(),
        reason: reason.into(),
    }
}

fn is_base32(payload: &str) -> bool {
    !payload.is_empty()
        && payload
            .bytes()
            .all(|b| b.is_ascii_lowercase() || (b'2'..=b'7').contains(&b))
}

impl FromStr for ProviderAddress {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let mut chars = s.chars();

        match chars.next() {
            Some('f') | Some('t') => {}
            Some(_) => return Err(invalid(s, "unknown network prefix")),
            None => return Err(invalid(s, "empty address")),
        }

        let protocol = chars
            .next()
            .and_then(Protocol::from_digit)
            .ok_or_else(|| invalid(s, "unknown address protocol"))?;
        let payload = &s[2..];

        match protocol {
            Protocol::Id => {
                if payload.is_empty() || !payload.bytes().all(|b| b.is_ascii_digit()) {
                    return Err(invalid(s, "actor id must be decimal"));
                }
                if payload.len() > 1 && payload.starts_with('0') {
                    return Err(invalid(s, "actor id has leading zeros"));
                }
                payload
                    .parse::<u64>()
                    .map_err(|e| invalid(s, e.to_string()))?;
            }
            Protocol::Delegated => {
                let (namespace, sub) = payload
                    .split_once('f')
                    .ok_or_else(|| invalid(s, "delegated address missing namespace separator"))?;
                if namespace.is_empty() || !namespace.bytes().all(|b| b.is_ascii_digit()) {
                    return Err(invalid(s, "delegated namespace must be decimal"));
                }
                if !is_base32(sub) {
                    return Err(invalid(s, "payload is not lowercase base32"));
                }
            }
            _ => {
                if !is_base32(payload) {
                    return Err(invalid(s, "payload is not lowercase base32"));
                }
            }
        }

        Ok(Self(s.to_string()))
    }
}

impl fmt::Display for ProviderAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Serialize for ProviderAddress {
    fn serialize<S: Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        s.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for ProviderAddress {
    fn deserialize<D: Deserializer<'de>>(d: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(d)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("f01234")]
    #[case("t01000")]
    #[case("f00")]
    #[case("f1abcdefghijklmnopqrstuvwxyz234567")]
    #[case("t3vvmn62lofvhjd2ugzca6sof2j2ubwok6cj4xxbfzz4yuxfkgobpihhd2thlanmsh3w2ptld2gqkn2jvlss4a")]
    #[case("f410fkkld55ioe7qg24wvt7fu6pbknb56ht7pt4zamxa")]
    fn test_valid_addresses(#[case] input: &str) {
        let addr: ProviderAddress = input.parse().unwrap();
        assert_eq!(addr.to_string(), input);
    }

    #[rstest]
    #[case("")]
    #[case("x01234")]
    #[case("f9abc")]
    #[case("f0")]
    #[case("f0abc")]
    #[case("f0012")]
    #[case("f1ABC")]
    #[case("f1")]
    #[case("f4abc")]
    fn test_invalid_addresses(#[case] input: &str) {
        let err = input.parse::<ProviderAddress>().unwrap_err();
        assert!(err.is_input_error());
    }

    #[test]
    fn test_surrounding_whitespace_trimmed() {
        let addr: ProviderAddress = "  f01234\n".parse().unwrap();
        assert_eq!(addr.as_str(), "f01234");
    }

    #[test]
    fn test_ordering_is_by_string() {
        let mut addrs: Vec<ProviderAddress> = ["f02", "f010", "f01"]
            .iter()
            .map(|s| s.parse().unwrap())
            .collect();
        addrs.sort();
        let sorted: Vec<_> = addrs.iter().map(|a| a.as_str()).collect();
        assert_eq!(sorted, vec!["f01", "f010", "f02"]);
    }

    #[test]
    fn test_serde_as_string() {
        let addr: ProviderAddress = "f01234".parse().unwrap();
        let json = serde_json::to_string(&addr).unwrap();
        assert_eq!(json, "\"f01234\"");
        let back: ProviderAddress = serde_json::from_str(&json).unwrap();
        assert_eq!(back, addr);
        assert!(serde_json::from_str::<ProviderAddress>("\"nope\"").is_err());
    }
}
