//! 签名身份：派生路径、助记词/私钥来源。

pub mod derivation;
pub mod source;

pub use derivation::DerivationPath;
pub use source::{
    AddressSource, KeypairAddressSource, MnemonicAddressSource, ResolvedIdentity,
    generate_mnemonic,
};
