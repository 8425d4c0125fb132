use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::crypto::{SuiPublicKey, blake2b256};
use crate::engine::{EngineError, EngineResult};
use crate::types::SuiAddress;

pub const MULTISIG_FLAG: u8 = 0x03;
/// 位图为 16 位，网络侧限制单个策略最多 10 个公钥。
pub const MAX_SIGNERS: usize = 10;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeightedKey {
    pub public_key: SuiPublicKey,
    pub weight: u8,
}

/// 加权门限策略：按声明顺序排列的 (公钥, 权重) 与门限。
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawPolicy")]
pub struct MultiSigPolicy {
    keys: Vec<WeightedKey>,
    threshold: u16,
}

#[derive(Deserialize)]
struct RawPolicy {
    keys: Vec<WeightedKey>,
    threshold: u16,
}

impl TryFrom<RawPolicy> for MultiSigPolicy {
    type Error = EngineError;

    fn try_from(raw: RawPolicy) -> Result<Self, Self::Error> {
        Self::from_weighted(raw.keys, raw.threshold)
    }
}

impl MultiSigPolicy {
    pub fn new(keys: Vec<(SuiPublicKey, u8)>, threshold: u16) -> EngineResult<Self> {
        let keys = keys
            .into_iter()
            .map(|(public_key, weight)| WeightedKey { public_key, weight })
            .collect();
        Self::from_weighted(keys, threshold)
    }

    fn from_weighted(keys: Vec<WeightedKey>, threshold: u16) -> EngineResult<Self> {
        if keys.is_empty() {
            return Err(EngineError::InvalidPolicy("policy has no public keys".into()));
        }
        if keys.len() > MAX_SIGNERS {
            return Err(EngineError::InvalidPolicy(format!(
                "policy has {} public keys, at most {MAX_SIGNERS} allowed",
                keys.len()
            )));
        }
        if threshold == 0 {
            return Err(EngineError::InvalidPolicy("threshold must be positive".into()));
        }

        let mut seen = HashSet::with_capacity(keys.len());
        for entry in &keys {
            if entry.weight == 0 {
                return Err(EngineError::InvalidPolicy(format!(
                    "public key {} has zero weight",
                    entry.public_key
                )));
            }
            if !seen.insert(entry.public_key) {
                return Err(EngineError::InvalidPolicy(format!(
                    "public key {} listed more than once",
                    entry.public_key
                )));
            }
        }

        let total: u32 = keys.iter().map(|entry| u32::from(entry.weight)).sum();
        if total < u32::from(threshold) {
            return Err(EngineError::InvalidPolicy(format!(
                "total weight {total} can never reach threshold {threshold}"
            )));
        }

        Ok(Self { keys, threshold })
    }

    pub fn keys(&self) -> &[WeightedKey] {
        &self.keys
    }

    pub fn threshold(&self) -> u16 {
        self.threshold
    }

    pub fn total_weight(&self) -> u32 {
        self.keys.iter().map(|entry| u32::from(entry.weight)).sum()
    }

    pub fn position_of(&self, public_key: &SuiPublicKey) -> Option<usize> {
        self.keys
            .iter()
            .position(|entry| entry.public_key == *public_key)
    }

    pub fn weight_of(&self, public_key: &SuiPublicKey) -> Option<u8> {
        self.position_of(public_key).map(|idx| self.keys[idx].weight)
    }

    /// blake2b256(0x03 ‖ threshold_le ‖ (flag ‖ pk ‖ weight)*)
    pub fn address(&self) -> SuiAddress {
        let mut preimage = Vec::with_capacity(3 + self.keys.len() * 34);
        preimage.push(MULTISIG_FLAG);
        preimage.extend_from_slice(&self.threshold.to_le_bytes());
        for entry in &self.keys {
            preimage.extend_from_slice(&entry.public_key.to_flagged_bytes());
            preimage.push(entry.weight);
        }
        SuiAddress::new(blake2b256(&preimage))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::SuiKeyPair;

    fn keys(n: usize) -> Vec<SuiPublicKey> {
        (0..n).map(|_| SuiKeyPair::generate().public_key()).collect()
    }

    #[test]
    fn rejects_unreachable_threshold() {
        let pks = keys(2);
        let err = MultiSigPolicy::new(vec![(pks[0], 1), (pks[1], 1)], 3).unwrap_err();
        assert!(matches!(err, EngineError::InvalidPolicy(_)));
    }

    #[test]
    fn rejects_zero_threshold_and_zero_weight() {
        let pks = keys(2);
        assert!(MultiSigPolicy::new(vec![(pks[0], 1)], 0).is_err());
        assert!(MultiSigPolicy::new(vec![(pks[0], 0), (pks[1], 2)], 1).is_err());
    }

    #[test]
    fn rejects_duplicates_and_oversized_policies() {
        let pks = keys(11);
        assert!(MultiSigPolicy::new(vec![(pks[0], 1), (pks[0], 1)], 1).is_err());
        let all = pks.iter().map(|pk| (*pk, 1)).collect();
        assert!(MultiSigPolicy::new(all, 1).is_err());
    }

    #[test]
    fn address_depends_on_order_and_threshold() {
        let pks = keys(2);
        let a = MultiSigPolicy::new(vec![(pks[0], 1), (pks[1], 1)], 1).unwrap();
        let b = MultiSigPolicy::new(vec![(pks[1], 1), (pks[0], 1)], 1).unwrap();
        let c = MultiSigPolicy::new(vec![(pks[0], 1), (pks[1], 1)], 2).unwrap();
        assert_ne!(a.address(), b.address());
        assert_ne!(a.address(), c.address());
        assert_eq!(a.address(), a.clone().address());
    }

    #[test]
    fn deserialization_revalidates() {
        let pk = keys(1)[0];
        let json = format!(
            r#"{{"keys":[{{"public_key":"{}","weight":1}}],"threshold":5}}"#,
            pk.to_base64()
        );
        assert!(serde_json::from_str::<MultiSigPolicy>(&json).is_err());
    }
}
