use std::fmt;
use std::str::FromStr;

use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha512;
use zeroize::Zeroizing;

use crate::engine::{EngineError, EngineResult};

type HmacSha512 = Hmac<Sha512>;

const HARDENED_OFFSET: u32 = 0x8000_0000;
const PURPOSE: u32 = 44;
const SUI_COIN_TYPE: u32 = 784;
const ED25519_CURVE_KEY: &[u8] = b"ed25519 seed";

/// 派生路径选择器，对应 `m/44'/784'/{account}'/{change}'/{index}'`，全部为 hardened。
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DerivationPath {
    pub account: u32,
    pub is_external: bool,
    pub address_index: u32,
}

impl DerivationPath {
    pub fn new(account: u32, is_external: bool, address_index: u32) -> Self {
        Self {
            account,
            is_external,
            address_index,
        }
    }

    pub fn account(account: u32) -> Self {
        Self {
            account,
            ..Self::default()
        }
    }

    pub fn segments(&self) -> [u32; 5] {
        [
            PURPOSE,
            SUI_COIN_TYPE,
            self.account,
            u32::from(self.is_external),
            self.address_index,
        ]
    }

    /// 从 BIP-39 种子派生 ed25519 私钥。
    pub fn derive_secret(&self, seed: &[u8]) -> EngineResult<Zeroizing<[u8; 32]>> {
        derive_hardened(seed, &self.segments())
    }
}

impl fmt::Display for DerivationPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("m")?;
        for segment in self.segments() {
            write!(f, "/{segment}'")?;
        }
        Ok(())
    }
}

impl FromStr for DerivationPath {
    type Err = EngineError;

    /// 接受完整路径 `m/44'/784'/0'/0'/0'`。
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &str| {
            EngineError::InvalidArgument(format!("派生路径 `{s}` 非法: {reason}"))
        };
        let mut parts = s.trim().split('/');
        if parts.next() != Some("m") {
            return Err(invalid("必须以 m/ 开头"));
        }
        let segments = parts
            .map(|part| {
                let index = part
                    .strip_suffix('\'')
                    .ok_or_else(|| invalid("ed25519 只支持 hardened 段"))?;
                index
                    .parse::<u32>()
                    .ok()
                    .filter(|value| *value < HARDENED_OFFSET)
                    .ok_or_else(|| invalid("段不是合法的索引"))
            })
            .collect::<Result<Vec<_>, _>>()?;
        match segments.as_slice() {
            [PURPOSE, SUI_COIN_TYPE, account, change @ (0 | 1), index] => {
                Ok(Self::new(*account, *change == 1, *index))
            }
            [PURPOSE, SUI_COIN_TYPE, _, _, _] => Err(invalid("change 段只能是 0 或 1")),
            _ => Err(invalid("需要 m/44'/784'/account'/change'/index' 五段")),
        }
    }
}

/// SLIP-0010 ed25519 派生，仅支持 hardened 索引。
pub(crate) fn derive_hardened(seed: &[u8], segments: &[u32]) -> EngineResult<Zeroizing<[u8; 32]>> {
    let (mut key, mut chain_code) = hmac_split(ED25519_CURVE_KEY, &[seed])?;
    for segment in segments {
        let hardened = segment | HARDENED_OFFSET;
        let (child_key, child_chain) = hmac_split(
            &chain_code[..],
            &[&[0u8][..], &key[..], &hardened.to_be_bytes()[..]],
        )?;
        key = child_key;
        chain_code = child_chain;
    }
    Ok(key)
}

fn hmac_split(
    key: &[u8],
    parts: &[&[u8]],
) -> EngineResult<(Zeroizing<[u8; 32]>, Zeroizing<[u8; 32]>)> {
    let mut mac = HmacSha512::new_from_slice(key)
        .map_err(|err| EngineError::InvalidArgument(format!("hmac key: {err}")))?;
    for part in parts {
        mac.update(part);
    }
    let mut output = Zeroizing::new([0u8; 64]);
    output.copy_from_slice(&mac.finalize().into_bytes());
    let mut left = Zeroizing::new([0u8; 32]);
    let mut right = Zeroizing::new([0u8; 32]);
    left.copy_from_slice(&output[..32]);
    right.copy_from_slice(&output[32..]);
    Ok((left, right))
}

#[cfg(test)]
mod tests {
    use super::*;

    // SLIP-0010 test vector 1
    const SEED: &str = "000102030405060708090a0b0c0d0e0f";

    #[test]
    fn matches_slip10_vectors() {
        let seed = hex::decode(SEED).unwrap();
        let master = derive_hardened(&seed, &[]).unwrap();
        assert_eq!(
            hex::encode(*master),
            "2b4be7f19ee27bbf30c667b642d5f4aa69fd169872f8fc3059c08ebae2eb19e7"
        );
        let child = derive_hardened(&seed, &[0]).unwrap();
        assert_eq!(
            hex::encode(*child),
            "68e0fe46dfb67e368c75379acec591dad19df3cde26e63b93a8e704f1dade7a3"
        );
    }

    #[test]
    fn distinct_paths_give_distinct_keys() {
        let seed = [7u8; 64];
        let a = DerivationPath::default().derive_secret(&seed).unwrap();
        let b = DerivationPath::new(0, false, 1).derive_secret(&seed).unwrap();
        let c = DerivationPath::new(0, true, 0).derive_secret(&seed).unwrap();
        let again = DerivationPath::default().derive_secret(&seed).unwrap();
        assert_eq!(*a, *again);
        assert_ne!(*a, *b);
        assert_ne!(*a, *c);
    }

    #[test]
    fn display_and_parse_agree() {
        let path = DerivationPath::new(3, true, 9);
        assert_eq!(path.to_string(), "m/44'/784'/3'/1'/9'");
        assert_eq!(path.to_string().parse::<DerivationPath>().unwrap(), path);
        assert_eq!(
            DerivationPath::default().to_string(),
            "m/44'/784'/0'/0'/0'"
        );
    }

    #[test]
    fn rejects_foreign_paths() {
        assert!("m/44'/60'/0'/0'/0'".parse::<DerivationPath>().is_err());
        assert!("m/44'/784'/0'/0/0".parse::<DerivationPath>().is_err());
        assert!("m/44'/784'/0'/2'/0'".parse::<DerivationPath>().is_err());
        assert!("44'/784'/0'/0'/0'".parse::<DerivationPath>().is_err());
    }
}
