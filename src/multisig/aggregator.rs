use std::collections::HashSet;

use base64::{Engine as _, engine::general_purpose};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::crypto::signature::ED25519_SIGNATURE_LENGTH;
use crate::crypto::{CryptoError, Ed25519Signature, SuiPublicKey, intent_digest};
use crate::engine::{EngineError, EngineResult};
use crate::monitoring::events;

use super::policy::{MULTISIG_FLAG, MultiSigPolicy};

/// 单个参与方的签名：(公钥, 权重, 签名字节)。
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WeightedSignature {
    pub public_key: SuiPublicKey,
    pub weight: u8,
    pub signature: [u8; ED25519_SIGNATURE_LENGTH],
}

impl WeightedSignature {
    pub fn new(
        public_key: SuiPublicKey,
        weight: u8,
        signature: [u8; ED25519_SIGNATURE_LENGTH],
    ) -> Self {
        Self {
            public_key,
            weight,
            signature,
        }
    }

    /// 按策略中登记的权重包装一份单签。
    pub fn from_ed25519(
        signature: &Ed25519Signature,
        policy: &MultiSigPolicy,
    ) -> EngineResult<Self> {
        let public_key = signature.public_key();
        let weight = policy
            .weight_of(&public_key)
            .ok_or_else(|| EngineError::UnknownSigner(public_key.to_base64()))?;
        Ok(Self::new(public_key, weight, *signature.signature_bytes()))
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
struct CompressedSignature(Vec<u8>);

/// 组合后的多签授权：策略 + 位图 + 按策略顺序排列的签名。
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CombinedAuthorization {
    signatures: Vec<CompressedSignature>,
    bitmap: u16,
    policy: MultiSigPolicy,
}

impl CombinedAuthorization {
    pub fn policy(&self) -> &MultiSigPolicy {
        &self.policy
    }

    pub fn bitmap(&self) -> u16 {
        self.bitmap
    }

    pub fn signature_count(&self) -> usize {
        self.signatures.len()
    }

    /// 位图中出现的策略下标，升序。
    pub fn signer_positions(&self) -> Vec<usize> {
        (0..16)
            .filter(|idx| self.bitmap & (1u16 << idx) != 0)
            .collect()
    }

    pub fn weight(&self) -> u32 {
        self.signer_positions()
            .into_iter()
            .filter_map(|idx| self.policy.keys().get(idx))
            .map(|entry| u32::from(entry.weight))
            .sum()
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, CryptoError> {
        let mut out = vec![MULTISIG_FLAG];
        let body = bincode::serde::encode_to_vec(self, bincode::config::standard())
            .map_err(|err| CryptoError::Encoding(err.to_string()))?;
        out.extend_from_slice(&body);
        Ok(out)
    }

    pub fn to_base64(&self) -> Result<String, CryptoError> {
        Ok(general_purpose::STANDARD.encode(self.to_bytes()?))
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        let body = match bytes.split_first() {
            Some((&MULTISIG_FLAG, body)) => body,
            Some((flag, _)) => return Err(CryptoError::UnsupportedScheme(*flag)),
            None => return Err(CryptoError::InvalidSignature("empty multisig".into())),
        };
        let (decoded, _): (Self, usize) =
            bincode::serde::decode_from_slice(body, bincode::config::standard())
                .map_err(|err| CryptoError::Encoding(err.to_string()))?;
        Ok(decoded)
    }

    /// 逐一校验签名，并重新检查门限。
    pub fn verify(&self, tx_bytes: &[u8]) -> Result<(), CryptoError> {
        let positions = self.signer_positions();
        if positions.len() != self.signatures.len() {
            return Err(CryptoError::Authorization(format!(
                "bitmap marks {} signers but {} signatures are present",
                positions.len(),
                self.signatures.len()
            )));
        }

        let digest = intent_digest(tx_bytes);
        for (position, signature) in positions.iter().zip(&self.signatures) {
            let entry = self.policy.keys().get(*position).ok_or_else(|| {
                CryptoError::Authorization(format!(
                    "bitmap position {position} outside policy of {} keys",
                    self.policy.keys().len()
                ))
            })?;
            entry.public_key.verify(&digest, &signature.0)?;
        }

        let weight = self.weight();
        if weight < u32::from(self.policy.threshold()) {
            return Err(CryptoError::Authorization(format!(
                "combined weight {weight} below threshold {}",
                self.policy.threshold()
            )));
        }
        Ok(())
    }
}

/// 按加权门限策略组合多方签名。
#[derive(Clone, Debug)]
pub struct MultiSigAggregator {
    policy: MultiSigPolicy,
}

impl MultiSigAggregator {
    pub fn new(policy: MultiSigPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &MultiSigPolicy {
        &self.policy
    }

    pub fn combine(&self, signatures: &[WeightedSignature]) -> EngineResult<CombinedAuthorization> {
        combine(&self.policy, signatures)
    }
}

/// 组合签名。同一公钥的重复签名只计一次（先到者生效），输出顺序以策略声明顺序为准。
pub fn combine(
    policy: &MultiSigPolicy,
    signatures: &[WeightedSignature],
) -> EngineResult<CombinedAuthorization> {
    let mut slots: Vec<Option<&WeightedSignature>> = vec![None; policy.keys().len()];
    let mut seen = HashSet::with_capacity(signatures.len());

    for signature in signatures {
        let position = policy
            .position_of(&signature.public_key)
            .ok_or_else(|| EngineError::UnknownSigner(signature.public_key.to_base64()))?;
        if !seen.insert(signature.public_key) {
            debug!(
                target: "multisig",
                public_key = %signature.public_key,
                "duplicate signature ignored"
            );
            continue;
        }
        let declared = policy.keys()[position].weight;
        if signature.weight != declared {
            debug!(
                target: "multisig",
                public_key = %signature.public_key,
                supplied = signature.weight,
                declared,
                "signature weight differs from policy, using policy weight"
            );
        }
        slots[position] = Some(signature);
    }

    let mut bitmap = 0u16;
    let mut weight = 0u32;
    let mut ordered = Vec::with_capacity(seen.len());
    for (position, slot) in slots.into_iter().enumerate() {
        if let Some(signature) = slot {
            bitmap |= 1u16 << position;
            weight += u32::from(policy.keys()[position].weight);
            ordered.push(CompressedSignature(signature.signature.to_vec()));
        }
    }

    if weight < u32::from(policy.threshold()) {
        return Err(EngineError::ThresholdNotMet {
            weight,
            threshold: policy.threshold(),
        });
    }

    debug!(
        target: "multisig",
        bitmap = format_args!("{bitmap:#018b}"),
        "signature bitmap"
    );
    events::multisig_combined(&policy.address(), ordered.len(), weight, policy.threshold());

    Ok(CombinedAuthorization {
        signatures: ordered,
        bitmap,
        policy: policy.clone(),
    })
}
