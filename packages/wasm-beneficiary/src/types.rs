//! Shared chain-facing types

use crate::config::Network;
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

/// Deserialize u128 from either a number or string
fn deserialize_u128<'de, D>(deserializer: D) -> Result<u128, D::Error>
where
    D: Deserializer<'de>,
{
    struct U128Visitor;

    impl<'de> de::Visitor<'de> for U128Visitor {
        type Value = u128;

        fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
            formatter.write_str("a u128 as number or string")
        }

        fn visit_u64<E>(self, value: u64) -> Result<u128, E>
        where
            E: de::Error,
        {
            Ok(value as u128)
        }

        fn visit_i64<E>(self, value: i64) -> Result<u128, E>
        where
            E: de::Error,
        {
            if value >= 0 {
                Ok(value as u128)
            } else {
                Err(E::custom("negative values not allowed"))
            }
        }

        fn visit_str<E>(self, value: &str) -> Result<u128, E>
        where
            E: de::Error,
        {
            value.parse().map_err(E::custom)
        }
    }

    deserializer.deserialize_any(U128Visitor)
}

/// Balances leave the crate as decimal strings; JS numbers lose precision
fn serialize_u128<S>(value: &u128, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&value.to_string())
}

/// Free and reserved balance of an account, in the chain's smallest unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountBalance {
    #[serde(
        serialize_with = "serialize_u128",
        deserialize_with = "deserialize_u128"
    )]
    pub free: u128,
    #[serde(
        serialize_with = "serialize_u128",
        deserialize_with = "deserialize_u128"
    )]
    pub reserved: u128,
    #[serde(
        serialize_with = "serialize_u128",
        deserialize_with = "deserialize_u128"
    )]
    pub total: u128,
}

impl AccountBalance {
    pub fn new(free: u128, reserved: u128) -> Self {
        Self {
            free,
            reserved,
            total: free.saturating_add(reserved),
        }
    }
}

/// Raw `free`/`reserved` pair as the chain adapter reports it
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct RawBalance {
    #[serde(deserialize_with = "deserialize_u128")]
    pub free: u128,
    #[serde(deserialize_with = "deserialize_u128")]
    pub reserved: u128,
}

impl From<RawBalance> for AccountBalance {
    fn from(raw: RawBalance) -> Self {
        AccountBalance::new(raw.free, raw.reserved)
    }
}

/// Identity of the connected node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkInfo {
    pub chain: String,
    pub node_name: String,
    pub node_version: String,
    #[serde(default)]
    pub network: Network,
}

/// `5EGoFA…VJkr` style abbreviation for display
pub fn shorten_address(address: &str, length: usize) -> String {
    let chars: Vec<char> = address.chars().collect();
    if chars.len() <= 2 * length + 2 {
        return address.to_string();
    }
    let head: String = chars[..length + 2].iter().collect();
    let tail: String = chars[chars.len() - length..].iter().collect();
    format!("{}…{}", head, tail)
}
