use std::sync::Arc;

use crate::monitoring::events;
use crate::rpc::ChainClient;
use crate::types::{Coin, CoinType, ObjectRef, SuiAddress};

use super::error::{EngineError, EngineResult};

/// 选币结果：按节点返回顺序累加，直到总额覆盖请求金额。
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SelectionResult {
    pub coins: Vec<Coin>,
    pub total: u128,
    pub requested: u64,
}

impl SelectionResult {
    pub fn surplus(&self) -> u128 {
        self.total - u128::from(self.requested)
    }

    pub fn object_refs(&self) -> Vec<ObjectRef> {
        self.coins.iter().map(|coin| coin.object_ref).collect()
    }
}

#[derive(Clone)]
pub struct CoinSelector {
    chain: Arc<dyn ChainClient>,
}

impl CoinSelector {
    pub fn new(chain: Arc<dyn ChainClient>) -> Self {
        Self { chain }
    }

    /// 只读；不保证对象数量最少，只保证总额 ≥ `amount`。
    pub async fn select(
        &self,
        owner: SuiAddress,
        amount: u64,
        coin_type: &CoinType,
    ) -> EngineResult<SelectionResult> {
        if owner.is_zero() {
            return Err(EngineError::InvalidArgument("选币地址为空".into()));
        }
        if amount == 0 {
            return Err(EngineError::InvalidArgument("选币金额必须大于 0".into()));
        }

        let available = self.chain.list_owned_objects(owner, coin_type).await?;
        let selection = accumulate(available, amount).map_err(|available| {
            EngineError::InsufficientBalance {
                owner: owner.to_string(),
                coin_type: coin_type.to_string(),
                requested: amount,
                available,
            }
        })?;
        events::coin_selection(
            &owner,
            coin_type,
            amount,
            selection.coins.len(),
            selection.total,
        );
        Ok(selection)
    }

    /// `owner` 名下全部 `coin_type` 代币，顺序与节点一致。
    pub async fn select_all(
        &self,
        owner: SuiAddress,
        coin_type: &CoinType,
    ) -> EngineResult<Vec<Coin>> {
        if owner.is_zero() {
            return Err(EngineError::InvalidArgument("选币地址为空".into()));
        }
        Ok(self.chain.list_owned_objects(owner, coin_type).await?)
    }
}

/// 累加到覆盖 `amount` 为止；不足时返回可用总额。
fn accumulate(coins: Vec<Coin>, amount: u64) -> Result<SelectionResult, u128> {
    let target = u128::from(amount);
    let mut total = 0u128;
    let mut selected = Vec::new();
    let mut remaining = coins.into_iter();
    for coin in remaining.by_ref() {
        total += u128::from(coin.balance);
        selected.push(coin);
        if total >= target {
            return Ok(SelectionResult {
                coins: selected,
                total,
                requested: amount,
            });
        }
    }
    Err(total + remaining.map(|coin| u128::from(coin.balance)).sum::<u128>())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rpc::InMemoryLedger;

    fn setup(balances: &[u64]) -> (Arc<InMemoryLedger>, SuiAddress) {
        let ledger = Arc::new(InMemoryLedger::default());
        let owner = SuiAddress::random();
        for balance in balances {
            ledger.mint_sui(owner, *balance);
        }
        (ledger, owner)
    }

    #[tokio::test]
    async fn stops_once_amount_is_covered() {
        let (ledger, owner) = setup(&[30, 30, 30, 30]);
        let selector = CoinSelector::new(ledger);
        let selection = selector.select(owner, 50, &CoinType::sui()).await.unwrap();
        assert_eq!(selection.coins.len(), 2);
        assert_eq!(selection.total, 60);
        assert_eq!(selection.surplus(), 10);
    }

    #[tokio::test]
    async fn selection_sum_always_covers_amount() {
        let (ledger, owner) = setup(&[7, 1, 13, 2, 40]);
        let selector = CoinSelector::new(ledger);
        for amount in 1..=63u64 {
            let selection = selector.select(owner, amount, &CoinType::sui()).await.unwrap();
            assert!(selection.total >= u128::from(amount));
            assert!(!selection.coins.is_empty());
        }
    }

    #[tokio::test]
    async fn shortfall_reports_available_balance() {
        let (ledger, owner) = setup(&[10, 20]);
        let selector = CoinSelector::new(ledger);
        let err = selector.select(owner, 31, &CoinType::sui()).await.unwrap_err();
        match err {
            EngineError::InsufficientBalance {
                requested,
                available,
                ..
            } => {
                assert_eq!(requested, 31);
                assert_eq!(available, 30);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn other_coin_types_are_ignored() {
        let (ledger, owner) = setup(&[5]);
        let usdc = CoinType::new("0xdba3::usdc::USDC").unwrap();
        ledger.mint_coin(owner, usdc.clone(), 1_000);
        let selector = CoinSelector::new(ledger);
        assert!(selector.select(owner, 6, &CoinType::sui()).await.is_err());
        let selection = selector.select(owner, 6, &usdc).await.unwrap();
        assert_eq!(selection.coins[0].coin_type, usdc);
    }

    #[tokio::test]
    async fn rejects_zero_owner_and_amount() {
        let (ledger, owner) = setup(&[5]);
        let selector = CoinSelector::new(ledger);
        assert!(matches!(
            selector.select(SuiAddress::ZERO, 1, &CoinType::sui()).await,
            Err(EngineError::InvalidArgument(_))
        ));
        assert!(matches!(
            selector.select(owner, 0, &CoinType::sui()).await,
            Err(EngineError::InvalidArgument(_))
        ));
    }
}
