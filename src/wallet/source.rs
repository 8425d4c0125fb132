use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use bip39::Mnemonic;
use parking_lot::RwLock;
use rand::RngCore;
use tracing::debug;
use zeroize::Zeroizing;

use crate::crypto::SuiKeyPair;
use crate::engine::{EngineError, EngineResult};
use crate::types::SuiAddress;

use super::derivation::DerivationPath;

/// 解析后的签名身份：地址与密钥句柄。
#[derive(Clone)]
pub struct ResolvedIdentity {
    pub address: SuiAddress,
    pub keypair: Arc<SuiKeyPair>,
}

impl fmt::Debug for ResolvedIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedIdentity")
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}

impl From<SuiKeyPair> for ResolvedIdentity {
    fn from(keypair: SuiKeyPair) -> Self {
        Self {
            address: keypair.address(),
            keypair: Arc::new(keypair),
        }
    }
}

/// 按派生路径提供签名身份。
pub trait AddressSource: Send + Sync {
    fn resolve(&self, path: &DerivationPath) -> EngineResult<ResolvedIdentity>;

    fn kind(&self) -> &'static str;
}

/// BIP-39 助记词来源；每个路径只派生一次，会话内缓存。
pub struct MnemonicAddressSource {
    seed: Zeroizing<[u8; 64]>,
    cache: RwLock<HashMap<DerivationPath, ResolvedIdentity>>,
}

impl MnemonicAddressSource {
    pub fn from_phrase(phrase: &str) -> EngineResult<Self> {
        let mnemonic = Mnemonic::parse_normalized(phrase)
            .map_err(|err| EngineError::InvalidConfig(format!("助记词非法: {err}")))?;
        Ok(Self {
            seed: Zeroizing::new(mnemonic.to_seed_normalized("")),
            cache: RwLock::new(HashMap::new()),
        })
    }

    pub fn cached_paths(&self) -> usize {
        self.cache.read().len()
    }
}

impl AddressSource for MnemonicAddressSource {
    fn resolve(&self, path: &DerivationPath) -> EngineResult<ResolvedIdentity> {
        if let Some(identity) = self.cache.read().get(path) {
            return Ok(identity.clone());
        }
        let secret = path.derive_secret(self.seed.as_slice())?;
        let identity = ResolvedIdentity::from(SuiKeyPair::from_secret_bytes(&secret));
        debug!(
            target: "wallet",
            path = %path,
            address = %identity.address,
            "derived identity"
        );
        Ok(self
            .cache
            .write()
            .entry(*path)
            .or_insert(identity)
            .clone())
    }

    fn kind(&self) -> &'static str {
        "mnemonic"
    }
}

/// 单私钥来源，只有默认路径可用。
pub struct KeypairAddressSource {
    identity: ResolvedIdentity,
}

impl KeypairAddressSource {
    pub fn new(keypair: SuiKeyPair) -> Self {
        Self {
            identity: keypair.into(),
        }
    }

    pub fn from_secret(raw: &str) -> EngineResult<Self> {
        let keypair = SuiKeyPair::parse_secret(raw)
            .map_err(|err| EngineError::InvalidConfig(format!("私钥非法: {err}")))?;
        Ok(Self::new(keypair))
    }
}

impl AddressSource for KeypairAddressSource {
    fn resolve(&self, path: &DerivationPath) -> EngineResult<ResolvedIdentity> {
        if *path != DerivationPath::default() {
            return Err(EngineError::InvalidArgument(format!(
                "单私钥钱包没有派生路径 {path}，只能使用默认路径"
            )));
        }
        Ok(self.identity.clone())
    }

    fn kind(&self) -> &'static str {
        "keypair"
    }
}

/// 生成新的助记词，`words` 只能是 12 或 24。
pub fn generate_mnemonic(words: usize) -> EngineResult<Zeroizing<String>> {
    let entropy_len = match words {
        12 => 16,
        24 => 32,
        other => {
            return Err(EngineError::InvalidArgument(format!(
                "助记词长度只能是 12 或 24，收到 {other}"
            )));
        }
    };
    let mut entropy = Zeroizing::new([0u8; 32]);
    rand::rng().fill_bytes(&mut entropy[..entropy_len]);
    let mnemonic = Mnemonic::from_entropy(&entropy[..entropy_len])
        .map_err(|err| EngineError::InvalidArgument(format!("生成助记词失败: {err}")))?;
    Ok(Zeroizing::new(mnemonic.to_string()))
}
