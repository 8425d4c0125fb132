use std::path::PathBuf;

use bincode::error::{DecodeError, EncodeError};
use thiserror::Error;

use crate::crypto::CryptoError;
use crate::rpc::RpcError;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("余额不足: {owner} 持有 {coin_type} 共 {available}，需要 {requested}")]
    InsufficientBalance {
        owner: String,
        coin_type: String,
        requested: u64,
        available: u128,
    },
    #[error("代币列表无效: {0}")]
    InvalidCoinSet(String),
    #[error("收款人数量 {recipients} 与金额数量 {amounts} 不一致")]
    LengthMismatch { recipients: usize, amounts: usize },
    #[error("交易已定稿，不能再追加操作")]
    PayloadFinalized,
    #[error("交易引用非法: {0}")]
    MalformedPayload(String),
    #[error("签名公钥不在多签策略中: {0}")]
    UnknownSigner(String),
    #[error("多签权重不足: 已收集 {weight}，门限 {threshold}")]
    ThresholdNotMet { weight: u32, threshold: u16 },
    #[error("多签策略非法: {0}")]
    InvalidPolicy(String),
    #[error("合约包目录不存在或不是目录: {}", .0.display())]
    PackageNotFound(PathBuf),
    #[error("合约包构建失败: {0}")]
    BuildFailed(String),
    #[error("发布结果缺少包信息: {0}")]
    PublishResultMalformed(String),
    #[error("交易被拒绝: {0}")]
    SubmissionRejected(String),
    #[error("参数非法: {0}")]
    InvalidArgument(String),
    #[error("配置缺失或非法: {0}")]
    InvalidConfig(String),
    #[error("密钥处理失败: {0}")]
    Crypto(#[from] CryptoError),
    #[error("RPC 请求失败: {0}")]
    Rpc(#[from] RpcError),
    #[error("I/O 错误: {0}")]
    Io(#[from] std::io::Error),
    #[error("交易编码失败: {0}")]
    Encode(#[from] EncodeError),
    #[error("交易解码失败: {0}")]
    Decode(#[from] DecodeError),
    #[error("JSON 处理失败: {0}")]
    Json(#[from] serde_json::Error),
}

pub type EngineResult<T> = Result<T, EngineError>;
