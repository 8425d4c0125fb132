pub mod keys;
pub mod signature;

use blake2::digest::consts::U32;
use blake2::{Blake2b, Digest};
use thiserror::Error;

pub use keys::{ED25519_FLAG, SuiKeyPair, SuiPublicKey, TransactionSigner};
pub use signature::{Ed25519Signature, SuiSignature};

/// 交易数据意图前缀：scope=TransactionData, version=V0, app=Sui。
pub const TRANSACTION_INTENT: [u8; 3] = [0, 0, 0];

type Blake2b256 = Blake2b<U32>;

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("invalid key: {0}")]
    InvalidKey(String),
    #[error("invalid signature: {0}")]
    InvalidSignature(String),
    #[error("unsupported signature scheme flag {0:#04x}")]
    UnsupportedScheme(u8),
    #[error("multisig encoding failed: {0}")]
    Encoding(String),
    #[error("{0}")]
    Authorization(String),
}

pub fn blake2b256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Blake2b256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// 待签名的摘要：blake2b256(intent ‖ tx_bytes)。
pub fn intent_digest(tx_bytes: &[u8]) -> [u8; 32] {
    let mut hasher = Blake2b256::new();
    hasher.update(TRANSACTION_INTENT);
    hasher.update(tx_bytes);
    hasher.finalize().into()
}

/// 交易摘要（base58），与链上 digest 展示一致。
pub fn transaction_digest(tx_bytes: &[u8]) -> String {
    bs58::encode(intent_digest(tx_bytes)).into_string()
}
