pub mod client;
pub mod error;
pub mod memory;
pub mod serde_helpers;
pub mod types;

use async_trait::async_trait;

use crate::types::{Coin, CoinType, SuiAddress};

pub use client::JsonRpcClient;
pub use error::RpcError;
pub use memory::InMemoryLedger;
pub use types::{
    Balance, BalanceChange, DevInspectResults, ExecuteOptions, ExecutionStatus, ObjectChange,
    Owner, SignedTransaction, TransactionEffects, TransactionResponse,
};

/// 链上读写接口。读操作无副作用；写操作只做透传，不重试。
#[async_trait]
pub trait ChainClient: Send + Sync {
    fn endpoint(&self) -> String;

    async fn get_balance(
        &self,
        owner: SuiAddress,
        coin_type: Option<&CoinType>,
    ) -> Result<Balance, RpcError>;

    async fn get_all_balances(&self, owner: SuiAddress) -> Result<Vec<Balance>, RpcError>;

    /// 返回 `owner` 名下全部 `coin_type` 代币，顺序由节点决定。
    async fn list_owned_objects(
        &self,
        owner: SuiAddress,
        coin_type: &CoinType,
    ) -> Result<Vec<Coin>, RpcError>;

    async fn reference_gas_price(&self) -> Result<u64, RpcError>;

    async fn submit(
        &self,
        transaction: &SignedTransaction,
        options: &ExecuteOptions,
    ) -> Result<TransactionResponse, RpcError>;

    /// 模拟执行：不提交、不扣 gas。
    async fn dev_inspect(
        &self,
        tx_bytes: &[u8],
        sender: SuiAddress,
    ) -> Result<DevInspectResults, RpcError>;
}
