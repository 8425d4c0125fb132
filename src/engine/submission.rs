use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::crypto::SuiSignature;
use crate::monitoring::events;
use crate::rpc::{ChainClient, ExecuteOptions, ExecutionStatus, SignedTransaction, TransactionResponse};
use crate::types::{CoinType, ObjectRef, SuiAddress};

use super::builder::TransactionBuilder;
use super::error::{EngineError, EngineResult};

/// 单笔交易最多携带的 gas 币数量（节点上限）。
pub const MAX_GAS_PAYMENT_OBJECTS: usize = 256;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GasSettings {
    /// 单笔交易 gas 预算（MIST）。
    pub budget: u64,
    /// 固定 gas 单价；为空时使用节点参考价。
    pub price: Option<u64>,
    pub max_payment_objects: usize,
}

impl Default for GasSettings {
    fn default() -> Self {
        Self {
            budget: 50_000_000,
            price: None,
            max_payment_objects: MAX_GAS_PAYMENT_OBJECTS,
        }
    }
}

/// 补全发送方与 gas 参数；已显式设置的字段保持不变。
pub(crate) async fn fill_gas(
    chain: &dyn ChainClient,
    builder: &mut TransactionBuilder,
    sender: SuiAddress,
    settings: &GasSettings,
) -> EngineResult<()> {
    let owner = match builder.sender() {
        Some(owner) => owner,
        None => {
            builder.set_sender(sender)?;
            sender
        }
    };
    if builder.gas_price().is_none() {
        let price = match settings.price {
            Some(price) => price,
            None => chain.reference_gas_price().await?,
        };
        builder.set_gas_price(price)?;
    }
    if builder.gas_budget().is_none() {
        builder.set_gas_budget(settings.budget)?;
    }
    if builder.has_gas_payment() {
        return Ok(());
    }

    let used = builder.payload().referenced_objects();
    let sui = CoinType::sui();
    let payment: Vec<ObjectRef> = chain
        .list_owned_objects(owner, &sui)
        .await?
        .into_iter()
        .filter(|coin| !used.contains(&coin.id()))
        .take(settings.max_payment_objects.max(1))
        .map(|coin| coin.object_ref)
        .collect();
    if payment.is_empty() {
        return Err(EngineError::InsufficientBalance {
            owner: owner.to_string(),
            coin_type: sui.to_string(),
            requested: builder.gas_budget().unwrap_or(settings.budget),
            available: 0,
        });
    }
    debug!(
        target: "engine::submission",
        owner = %owner,
        gas_objects = payment.len(),
        "gas payment selected"
    );
    builder.set_gas_payment(payment)
}

/// 提交已签名交易；节点拒绝或执行失败都映射为 `SubmissionRejected`，不重试。
pub(crate) async fn submit(
    chain: &dyn ChainClient,
    sender: SuiAddress,
    tx_bytes: Vec<u8>,
    signatures: Vec<SuiSignature>,
) -> EngineResult<TransactionResponse> {
    let transaction = SignedTransaction {
        tx_bytes,
        signatures,
    };
    let started = Instant::now();
    let response = chain
        .submit(&transaction, &ExecuteOptions::default())
        .await
        .map_err(|err| {
            if err.is_rejection() {
                events::transaction_rejected(&sender, &err.to_string());
                EngineError::SubmissionRejected(err.to_string())
            } else {
                EngineError::Rpc(err)
            }
        })?;

    match response.status() {
        Some(ExecutionStatus::Failure { error }) => {
            events::transaction_submitted(&sender, &response.digest, false, started.elapsed());
            Err(EngineError::SubmissionRejected(format!(
                "交易 {} 执行失败: {error}",
                response.digest
            )))
        }
        _ => {
            events::transaction_submitted(&sender, &response.digest, true, started.elapsed());
            Ok(response)
        }
    }
}
