use base64::{Engine as _, engine::general_purpose};

use crate::multisig::{CombinedAuthorization, MULTISIG_FLAG};
use crate::types::SuiAddress;

use super::keys::{ED25519_FLAG, PUBLIC_KEY_LENGTH, SuiPublicKey};
use super::{CryptoError, intent_digest};

pub const ED25519_SIGNATURE_LENGTH: usize = 64;

#[derive(Clone, PartialEq, Eq)]
pub struct Ed25519Signature {
    signature: [u8; ED25519_SIGNATURE_LENGTH],
    public_key: SuiPublicKey,
}

impl Ed25519Signature {
    pub fn new(signature: [u8; ED25519_SIGNATURE_LENGTH], public_key: SuiPublicKey) -> Self {
        Self {
            signature,
            public_key,
        }
    }

    pub fn signature_bytes(&self) -> &[u8; ED25519_SIGNATURE_LENGTH] {
        &self.signature
    }

    pub fn public_key(&self) -> SuiPublicKey {
        self.public_key
    }
}

impl std::fmt::Debug for Ed25519Signature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ed25519Signature")
            .field("public_key", &self.public_key)
            .field("signature", &general_purpose::STANDARD.encode(self.signature))
            .finish()
    }
}

/// 提交到链上的签名：单签 ed25519 或组合后的多签授权。
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SuiSignature {
    Ed25519(Ed25519Signature),
    MultiSig(CombinedAuthorization),
}

impl SuiSignature {
    /// 单签：`0x00 ‖ sig ‖ pk`；多签：`0x03 ‖ bincode(authorization)`。
    pub fn to_bytes(&self) -> Result<Vec<u8>, CryptoError> {
        match self {
            SuiSignature::Ed25519(inner) => {
                let mut out =
                    Vec::with_capacity(1 + ED25519_SIGNATURE_LENGTH + PUBLIC_KEY_LENGTH);
                out.push(ED25519_FLAG);
                out.extend_from_slice(&inner.signature);
                out.extend_from_slice(inner.public_key.as_bytes());
                Ok(out)
            }
            SuiSignature::MultiSig(authorization) => authorization.to_bytes(),
        }
    }

    pub fn to_base64(&self) -> Result<String, CryptoError> {
        Ok(general_purpose::STANDARD.encode(self.to_bytes()?))
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        match bytes.split_first() {
            Some((&ED25519_FLAG, rest)) => {
                if rest.len() != ED25519_SIGNATURE_LENGTH + PUBLIC_KEY_LENGTH {
                    return Err(CryptoError::InvalidSignature(format!(
                        "ed25519 signature must be {} bytes after the flag, got {}",
                        ED25519_SIGNATURE_LENGTH + PUBLIC_KEY_LENGTH,
                        rest.len()
                    )));
                }
                let mut signature = [0u8; ED25519_SIGNATURE_LENGTH];
                signature.copy_from_slice(&rest[..ED25519_SIGNATURE_LENGTH]);
                let mut public = [0u8; PUBLIC_KEY_LENGTH];
                public.copy_from_slice(&rest[ED25519_SIGNATURE_LENGTH..]);
                Ok(SuiSignature::Ed25519(Ed25519Signature::new(
                    signature,
                    SuiPublicKey::from_bytes(public)?,
                )))
            }
            Some((&MULTISIG_FLAG, _)) => {
                CombinedAuthorization::from_bytes(bytes).map(SuiSignature::MultiSig)
            }
            Some((flag, _)) => Err(CryptoError::UnsupportedScheme(*flag)),
            None => Err(CryptoError::InvalidSignature("empty signature".into())),
        }
    }

    pub fn from_base64(encoded: &str) -> Result<Self, CryptoError> {
        let raw = general_purpose::STANDARD
            .decode(encoded.trim())
            .map_err(|err| CryptoError::InvalidSignature(format!("signature base64: {err}")))?;
        Self::from_bytes(&raw)
    }

    /// 校验签名并返回其对应的签名地址。
    pub fn verify(&self, tx_bytes: &[u8]) -> Result<SuiAddress, CryptoError> {
        match self {
            SuiSignature::Ed25519(inner) => {
                inner
                    .public_key
                    .verify(&intent_digest(tx_bytes), &inner.signature)?;
                Ok(inner.public_key.address())
            }
            SuiSignature::MultiSig(authorization) => {
                authorization.verify(tx_bytes)?;
                Ok(authorization.policy().address())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::SuiKeyPair;

    #[test]
    fn single_signature_wire_round_trip() {
        let keypair = SuiKeyPair::generate();
        let signature = SuiSignature::Ed25519(keypair.sign_transaction(b"tx"));
        let encoded = signature.to_base64().expect("encode");
        let decoded = SuiSignature::from_base64(&encoded).expect("decode");
        assert_eq!(decoded, signature);
        assert_eq!(decoded.verify(b"tx").expect("verify"), keypair.address());
    }

    #[test]
    fn verify_rejects_tampered_bytes() {
        let keypair = SuiKeyPair::generate();
        let signature = SuiSignature::Ed25519(keypair.sign_transaction(b"tx"));
        assert!(signature.verify(b"tx2").is_err());
    }

    #[test]
    fn unknown_flag_is_reported() {
        assert!(matches!(
            SuiSignature::from_bytes(&[0x09, 1, 2]),
            Err(CryptoError::UnsupportedScheme(0x09))
        ));
    }
}
