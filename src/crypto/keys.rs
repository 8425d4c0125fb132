use std::fmt;
use std::str::FromStr;

use base64::{Engine as _, engine::general_purpose};
use ed25519_dalek::{Signer as _, SigningKey, Verifier as _, VerifyingKey};
use serde::de::{Deserializer, Error as DeError};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::types::SuiAddress;

use super::signature::{Ed25519Signature, SuiSignature};
use super::{CryptoError, blake2b256, intent_digest};

pub const ED25519_FLAG: u8 = 0x00;
pub const PUBLIC_KEY_LENGTH: usize = 32;
pub const SECRET_KEY_LENGTH: usize = 32;

/// ed25519 公钥，序列化形式为 `flag ‖ pk`。
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SuiPublicKey([u8; PUBLIC_KEY_LENGTH]);

impl SuiPublicKey {
    pub fn from_bytes(bytes: [u8; PUBLIC_KEY_LENGTH]) -> Result<Self, CryptoError> {
        VerifyingKey::from_bytes(&bytes)
            .map_err(|err| CryptoError::InvalidKey(format!("ed25519 public key: {err}")))?;
        Ok(Self(bytes))
    }

    pub fn as_bytes(&self) -> &[u8; PUBLIC_KEY_LENGTH] {
        &self.0
    }

    pub fn flag(&self) -> u8 {
        ED25519_FLAG
    }

    /// `flag ‖ pk`
    pub fn to_flagged_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(PUBLIC_KEY_LENGTH + 1);
        out.push(ED25519_FLAG);
        out.extend_from_slice(&self.0);
        out
    }

    pub fn to_base64(&self) -> String {
        general_purpose::STANDARD.encode(self.to_flagged_bytes())
    }

    pub fn address(&self) -> SuiAddress {
        SuiAddress::new(blake2b256(&self.to_flagged_bytes()))
    }

    pub fn verify(&self, message: &[u8], signature: &[u8]) -> Result<(), CryptoError> {
        let key = VerifyingKey::from_bytes(&self.0)
            .map_err(|err| CryptoError::InvalidKey(err.to_string()))?;
        let signature = ed25519_dalek::Signature::from_slice(signature)
            .map_err(|err| CryptoError::InvalidSignature(err.to_string()))?;
        key.verify(message, &signature)
            .map_err(|err| CryptoError::InvalidSignature(err.to_string()))
    }
}

impl fmt::Display for SuiPublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_base64())
    }
}

impl fmt::Debug for SuiPublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SuiPublicKey({})", self.to_base64())
    }
}

impl FromStr for SuiPublicKey {
    type Err = CryptoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = general_purpose::STANDARD
            .decode(s.trim())
            .map_err(|err| CryptoError::InvalidKey(format!("public key base64: {err}")))?;
        let body = match raw.as_slice() {
            [ED25519_FLAG, rest @ ..] if rest.len() == PUBLIC_KEY_LENGTH => rest,
            rest if rest.len() == PUBLIC_KEY_LENGTH => rest,
            [flag, ..] if raw.len() == PUBLIC_KEY_LENGTH + 1 => {
                return Err(CryptoError::UnsupportedScheme(*flag));
            }
            _ => {
                return Err(CryptoError::InvalidKey(format!(
                    "public key must be 32 bytes (or 33 with flag), got {}",
                    raw.len()
                )));
            }
        };
        let mut bytes = [0u8; PUBLIC_KEY_LENGTH];
        bytes.copy_from_slice(body);
        Self::from_bytes(bytes)
    }
}

impl Serialize for SuiPublicKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if serializer.is_human_readable() {
            serializer.serialize_str(&self.to_base64())
        } else {
            self.0.serialize(serializer)
        }
    }
}

impl<'de> Deserialize<'de> for SuiPublicKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        if deserializer.is_human_readable() {
            let raw = String::deserialize(deserializer)?;
            raw.parse().map_err(DeError::custom)
        } else {
            let bytes = <[u8; PUBLIC_KEY_LENGTH]>::deserialize(deserializer)?;
            Self::from_bytes(bytes).map_err(DeError::custom)
        }
    }
}

/// 签名身份的密钥句柄。
pub struct SuiKeyPair {
    signing: SigningKey,
    public: SuiPublicKey,
}

impl SuiKeyPair {
    pub fn generate() -> Self {
        let secret = Zeroizing::new(rand::random::<[u8; SECRET_KEY_LENGTH]>());
        Self::from_secret_bytes(&secret)
    }

    pub fn from_secret_bytes(secret: &[u8; SECRET_KEY_LENGTH]) -> Self {
        let signing = SigningKey::from_bytes(secret);
        let public = SuiPublicKey(signing.verifying_key().to_bytes());
        Self { signing, public }
    }

    /// 解析私钥字符串：base64（可带 scheme flag）、0x 十六进制或 JSON 字节数组。
    pub fn parse_secret(raw: &str) -> Result<Self, CryptoError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(CryptoError::InvalidKey("secret key string empty".into()));
        }

        let bytes: Zeroizing<Vec<u8>> = if trimmed.starts_with('[') {
            Zeroizing::new(
                serde_json::from_str(trimmed)
                    .map_err(|err| CryptoError::InvalidKey(format!("secret key array: {err}")))?,
            )
        } else if let Some(hex_digits) = trimmed.strip_prefix("0x") {
            Zeroizing::new(
                hex::decode(hex_digits)
                    .map_err(|err| CryptoError::InvalidKey(format!("secret key hex: {err}")))?,
            )
        } else {
            Zeroizing::new(
                general_purpose::STANDARD
                    .decode(trimmed)
                    .map_err(|err| CryptoError::InvalidKey(format!("secret key base64: {err}")))?,
            )
        };

        let secret = match bytes.len() {
            SECRET_KEY_LENGTH => &bytes[..],
            33 if bytes[0] == ED25519_FLAG => &bytes[1..],
            33 => return Err(CryptoError::UnsupportedScheme(bytes[0])),
            // 64 字节格式为 secret ‖ public
            64 => &bytes[..SECRET_KEY_LENGTH],
            other => {
                return Err(CryptoError::InvalidKey(format!(
                    "secret key must be 32, 33 or 64 bytes, got {other}"
                )));
            }
        };

        let mut fixed = Zeroizing::new([0u8; SECRET_KEY_LENGTH]);
        fixed.copy_from_slice(secret);
        Ok(Self::from_secret_bytes(&fixed))
    }

    /// base64 编码的 `flag ‖ secret`，与常见钱包导出格式一致。
    pub fn export_base64(&self) -> Zeroizing<String> {
        let mut raw = Zeroizing::new(Vec::with_capacity(SECRET_KEY_LENGTH + 1));
        raw.push(ED25519_FLAG);
        raw.extend_from_slice(self.signing.as_bytes());
        Zeroizing::new(general_purpose::STANDARD.encode(raw.as_slice()))
    }

    pub fn public_key(&self) -> SuiPublicKey {
        self.public
    }

    pub fn address(&self) -> SuiAddress {
        self.public.address()
    }

    /// 对交易字节做意图签名。
    pub fn sign_transaction(&self, tx_bytes: &[u8]) -> Ed25519Signature {
        let digest = intent_digest(tx_bytes);
        let signature = self.signing.sign(&digest);
        Ed25519Signature::new(signature.to_bytes(), self.public)
    }
}

impl fmt::Debug for SuiKeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SuiKeyPair")
            .field("public", &self.public)
            .finish_non_exhaustive()
    }
}

/// 单签或多签签名者，统一产出可提交的签名。
pub trait TransactionSigner: Send + Sync {
    fn address(&self) -> SuiAddress;

    fn sign(&self, tx_bytes: &[u8]) -> SuiSignature;
}

impl TransactionSigner for SuiKeyPair {
    fn address(&self) -> SuiAddress {
        SuiKeyPair::address(self)
    }

    fn sign(&self, tx_bytes: &[u8]) -> SuiSignature {
        SuiSignature::Ed25519(self.sign_transaction(tx_bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn export_and_parse_restore_same_key() {
        let keypair = SuiKeyPair::generate();
        let exported = keypair.export_base64();
        let restored = SuiKeyPair::parse_secret(&exported).expect("parse exported key");
        assert_eq!(restored.public_key(), keypair.public_key());
        assert_eq!(restored.address(), keypair.address());
    }

    #[test]
    fn parse_secret_accepts_hex_and_json_array() {
        let secret = [7u8; 32];
        let expected = SuiKeyPair::from_secret_bytes(&secret).address();

        let hex_form = format!("0x{}", hex::encode(secret));
        assert_eq!(
            SuiKeyPair::parse_secret(&hex_form).expect("hex").address(),
            expected
        );

        let json_form = serde_json::to_string(&secret.to_vec()).expect("json");
        assert_eq!(
            SuiKeyPair::parse_secret(&json_form).expect("json").address(),
            expected
        );
    }

    #[test]
    fn parse_secret_rejects_other_schemes() {
        let mut raw = vec![0x01u8];
        raw.extend_from_slice(&[1u8; 32]);
        let encoded = general_purpose::STANDARD.encode(raw);
        assert!(matches!(
            SuiKeyPair::parse_secret(&encoded),
            Err(CryptoError::UnsupportedScheme(0x01))
        ));
    }

    #[test]
    fn public_key_base64_round_trip() {
        let keypair = SuiKeyPair::generate();
        let encoded = keypair.public_key().to_base64();
        let parsed: SuiPublicKey = encoded.parse().expect("parse public key");
        assert_eq!(parsed, keypair.public_key());
    }

    #[test]
    fn signature_verifies_against_intent_digest() {
        let keypair = SuiKeyPair::generate();
        let tx = b"payload bytes";
        let signature = keypair.sign_transaction(tx);
        keypair
            .public_key()
            .verify(&intent_digest(tx), signature.signature_bytes())
            .expect("valid signature");
        assert!(
            keypair
                .public_key()
                .verify(&intent_digest(b"other"), signature.signature_bytes())
                .is_err()
        );
    }
}
