use std::fmt;
use std::str::FromStr;

use serde::de::{Deserializer, Error as DeError};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};

use super::address::{ObjectId, SuiAddress};

pub const SUI_COIN_TYPE: &str = "0x2::sui::SUI";

/// 对象内容摘要，链上以 base58 表示。
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ObjectDigest([u8; 32]);

impl ObjectDigest {
    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn random() -> Self {
        Self(rand::random())
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for ObjectDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&bs58::encode(self.0).into_string())
    }
}

impl fmt::Debug for ObjectDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectDigest({self})")
    }
}

impl FromStr for ObjectDigest {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let decoded = bs58::decode(s.trim())
            .into_vec()
            .map_err(|err| format!("invalid digest `{s}`: {err}"))?;
        let bytes: [u8; 32] = decoded
            .try_into()
            .map_err(|raw: Vec<u8>| format!("digest `{s}` has {} bytes, expected 32", raw.len()))?;
        Ok(Self(bytes))
    }
}

impl Serialize for ObjectDigest {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if serializer.is_human_readable() {
            serializer.serialize_str(&self.to_string())
        } else {
            self.0.serialize(serializer)
        }
    }
}

impl<'de> Deserialize<'de> for ObjectDigest {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        if deserializer.is_human_readable() {
            let raw = String::deserialize(deserializer)?;
            raw.parse().map_err(DeError::custom)
        } else {
            <[u8; 32]>::deserialize(deserializer).map(Self)
        }
    }
}

/// 拥有型对象引用：ID + 版本 + 摘要。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObjectRef {
    pub object_id: ObjectId,
    pub version: u64,
    pub digest: ObjectDigest,
}

impl ObjectRef {
    pub fn new(object_id: ObjectId, version: u64, digest: ObjectDigest) -> Self {
        Self {
            object_id,
            version,
            digest,
        }
    }
}

/// 代币类型标签，地址部分统一为完整 32 字节形式，方便比较。
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct CoinType(String);

impl CoinType {
    pub fn new(raw: &str) -> Result<Self, String> {
        let trimmed = raw.trim();
        let (address, rest) = trimmed
            .split_once("::")
            .ok_or_else(|| format!("invalid coin type `{raw}`: expected `address::module::Name`"))?;
        if rest.split("::").count() < 2 {
            return Err(format!(
                "invalid coin type `{raw}`: expected `address::module::Name`"
            ));
        }
        let address: SuiAddress = address.parse()?;
        Ok(Self(format!("{address}::{rest}")))
    }

    pub fn sui() -> Self {
        Self(format!("{}::sui::SUI", SuiAddress::from_low_u64(2)))
    }

    pub fn is_sui(&self) -> bool {
        *self == Self::sui()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for CoinType {
    fn default() -> Self {
        Self::sui()
    }
}

impl fmt::Display for CoinType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for CoinType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CoinType({})", self.0)
    }
}

impl FromStr for CoinType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl<'de> Deserialize<'de> for CoinType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::new(&raw).map_err(DeError::custom)
    }
}

/// 一枚拥有型代币对象（可替代余额的最小单位）。
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Coin {
    pub object_ref: ObjectRef,
    pub coin_type: CoinType,
    pub balance: u64,
}

impl Coin {
    pub fn id(&self) -> ObjectId {
        self.object_ref.object_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coin_type_normalizes_address() {
        let short = CoinType::new("0x2::sui::SUI").expect("short form");
        let long = CoinType::new(
            "0x0000000000000000000000000000000000000000000000000000000000000002::sui::SUI",
        )
        .expect("long form");
        assert_eq!(short, long);
        assert!(short.is_sui());
    }

    #[test]
    fn coin_type_keeps_generic_suffix() {
        let ty = CoinType::new("0xabc::lp::LP<0x2::sui::SUI>").expect("generic");
        assert!(ty.as_str().ends_with("::lp::LP<0x2::sui::SUI>"));
        assert!(!ty.is_sui());
    }

    #[test]
    fn coin_type_rejects_missing_module() {
        assert!(CoinType::new("0x2").is_err());
        assert!(CoinType::new("0x2::sui").is_err());
    }

    #[test]
    fn digest_round_trips_through_base58() {
        let digest = ObjectDigest::random();
        let parsed: ObjectDigest = digest.to_string().parse().expect("parse digest");
        assert_eq!(parsed, digest);
    }
}
