use std::fmt;
use std::str::FromStr;

use serde::de::{Deserializer, Error as DeError};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};

pub const ADDRESS_LENGTH: usize = 32;

/// 32 字节十六进制标识，地址与对象 ID 共用同一布局。
macro_rules! hex_identifier {
    ($name:ident, $label:literal) => {
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
        pub struct $name([u8; ADDRESS_LENGTH]);

        impl $name {
            pub const ZERO: Self = Self([0u8; ADDRESS_LENGTH]);

            pub const fn new(bytes: [u8; ADDRESS_LENGTH]) -> Self {
                Self(bytes)
            }

            /// 以低位字节构造，例如系统对象 `0x5`。
            pub const fn from_low_u64(value: u64) -> Self {
                let mut bytes = [0u8; ADDRESS_LENGTH];
                let be = value.to_be_bytes();
                let mut idx = 0;
                while idx < 8 {
                    bytes[ADDRESS_LENGTH - 8 + idx] = be[idx];
                    idx += 1;
                }
                Self(bytes)
            }

            pub fn random() -> Self {
                Self(rand::random())
            }

            pub fn as_bytes(&self) -> &[u8; ADDRESS_LENGTH] {
                &self.0
            }

            pub fn is_zero(&self) -> bool {
                self.0 == [0u8; ADDRESS_LENGTH]
            }

            pub fn to_hex_literal(&self) -> String {
                format!("0x{}", hex::encode(self.0))
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "0x{}", hex::encode(self.0))
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self)
            }
        }

        impl FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                parse_hex_32(s)
                    .map(Self)
                    .map_err(|err| format!(concat!("invalid ", $label, " `{}`: {}"), s, err))
            }
        }

        impl From<[u8; ADDRESS_LENGTH]> for $name {
            fn from(bytes: [u8; ADDRESS_LENGTH]) -> Self {
                Self(bytes)
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                if serializer.is_human_readable() {
                    serializer.serialize_str(&self.to_string())
                } else {
                    self.0.serialize(serializer)
                }
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                if deserializer.is_human_readable() {
                    let raw = String::deserialize(deserializer)?;
                    raw.parse().map_err(DeError::custom)
                } else {
                    <[u8; ADDRESS_LENGTH]>::deserialize(deserializer).map(Self)
                }
            }
        }
    };
}

hex_identifier!(SuiAddress, "address");
hex_identifier!(ObjectId, "object id");

impl From<ObjectId> for SuiAddress {
    fn from(id: ObjectId) -> Self {
        SuiAddress::new(*id.as_bytes())
    }
}

impl From<SuiAddress> for ObjectId {
    fn from(address: SuiAddress) -> Self {
        ObjectId::new(*address.as_bytes())
    }
}

/// 接受 `0x` 前缀与短格式（如 `0x2`），左侧补零到 32 字节。
fn parse_hex_32(raw: &str) -> Result<[u8; ADDRESS_LENGTH], String> {
    let trimmed = raw.trim();
    let digits = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);
    if digits.is_empty() {
        return Err("empty hex string".to_string());
    }
    if digits.len() > ADDRESS_LENGTH * 2 {
        return Err(format!("expected at most {} hex digits", ADDRESS_LENGTH * 2));
    }

    let padded = format!("{digits:0>width$}", width = ADDRESS_LENGTH * 2);
    let decoded = hex::decode(padded).map_err(|err| err.to_string())?;
    let mut bytes = [0u8; ADDRESS_LENGTH];
    bytes.copy_from_slice(&decoded);
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_literal_is_left_padded() {
        let id: ObjectId = "0x5".parse().expect("parse short id");
        assert_eq!(id, ObjectId::from_low_u64(5));
        assert_eq!(
            id.to_string(),
            "0x0000000000000000000000000000000000000000000000000000000000000005"
        );
    }

    #[test]
    fn rejects_overlong_and_non_hex() {
        assert!(format!("0x{}", "a".repeat(65)).parse::<SuiAddress>().is_err());
        assert!("0xzz".parse::<SuiAddress>().is_err());
        assert!("".parse::<SuiAddress>().is_err());
    }

    #[test]
    fn json_uses_hex_string() {
        let address = SuiAddress::from_low_u64(0xabc);
        let json = serde_json::to_string(&address).expect("serialize");
        assert_eq!(json, format!("\"{address}\""));
        let back: SuiAddress = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, address);
    }
}
