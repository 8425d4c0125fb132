use std::path::Path;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, info};

use crate::crypto::{SuiSignature, TransactionSigner};
use crate::monitoring::events;
use crate::multisig::CombinedAuthorization;
use crate::publish::{PackagePublisher, PublishOutcome, ToolchainSettings};
use crate::rpc::{Balance, ChainClient, DevInspectResults, SignedTransaction, TransactionResponse};
use crate::types::{Coin, CoinType, SuiAddress};
use crate::wallet::{AddressSource, DerivationPath, ResolvedIdentity};

use super::builder::TransactionBuilder;
use super::error::{EngineError, EngineResult};
use super::input::TransactionInput;
use super::payload::{Argument, CallArg, TransactionPayload};
use super::selector::{CoinSelector, SelectionResult};
use super::submission::{self, GasSettings};

#[derive(Clone, Debug, Default)]
pub struct EngineSettings {
    pub gas: GasSettings,
    pub toolchain: ToolchainSettings,
    pub default_path: DerivationPath,
}

/// 对外入口：持有当前身份，串起选币、组装、签名和提交。
/// 当前身份只通过 `switch_account` 改变；其余操作可带显式路径覆盖。
pub struct Engine {
    wallet: Arc<dyn AddressSource>,
    chain: Arc<dyn ChainClient>,
    selector: CoinSelector,
    publisher: PackagePublisher,
    gas: GasSettings,
    current: RwLock<DerivationPath>,
}

impl Engine {
    pub fn new(
        wallet: Arc<dyn AddressSource>,
        chain: Arc<dyn ChainClient>,
        settings: EngineSettings,
    ) -> Self {
        let selector = CoinSelector::new(chain.clone());
        let publisher = PackagePublisher::new(settings.toolchain, chain.clone(), settings.gas.clone());
        Self {
            wallet,
            chain,
            selector,
            publisher,
            gas: settings.gas,
            current: RwLock::new(settings.default_path),
        }
    }

    pub fn chain(&self) -> &Arc<dyn ChainClient> {
        &self.chain
    }

    pub fn current_path(&self) -> DerivationPath {
        *self.current.read()
    }

    /// 未显式给出路径时取当前路径；多步操作只取一次，中途切换账户不影响本次调用。
    fn pinned_path(&self, path: Option<&DerivationPath>) -> DerivationPath {
        path.copied().unwrap_or_else(|| self.current_path())
    }

    fn identity(&self, path: Option<&DerivationPath>) -> EngineResult<ResolvedIdentity> {
        self.wallet.resolve(&self.pinned_path(path))
    }

    pub fn current_address(&self) -> EngineResult<SuiAddress> {
        Ok(self.identity(None)?.address)
    }

    pub fn address_at(&self, path: &DerivationPath) -> EngineResult<SuiAddress> {
        Ok(self.wallet.resolve(path)?.address)
    }

    /// 切换默认身份；路径无法解析时保持原身份不变。
    pub fn switch_account(&self, path: DerivationPath) -> EngineResult<SuiAddress> {
        let identity = self.wallet.resolve(&path)?;
        *self.current.write() = path;
        events::account_switched(&path.to_string(), &identity.address);
        Ok(identity.address)
    }

    pub async fn get_balance(&self, coin_type: Option<&CoinType>) -> EngineResult<Balance> {
        let owner = self.current_address()?;
        Ok(self.chain.get_balance(owner, coin_type).await?)
    }

    pub async fn get_all_balances(&self) -> EngineResult<Vec<Balance>> {
        let owner = self.current_address()?;
        Ok(self.chain.get_all_balances(owner).await?)
    }

    pub async fn get_coins(&self, coin_type: &CoinType) -> EngineResult<Vec<Coin>> {
        let owner = self.current_address()?;
        self.selector.select_all(owner, coin_type).await
    }

    pub async fn select_coins(
        &self,
        amount: u64,
        coin_type: &CoinType,
    ) -> EngineResult<SelectionResult> {
        let owner = self.current_address()?;
        self.selector.select(owner, amount, coin_type).await
    }

    /// 为任意发送方补全 gas 并定稿，用于多签地址等无本地私钥的发送方。
    pub async fn prepare_for(
        &self,
        mut builder: TransactionBuilder,
        sender: SuiAddress,
    ) -> EngineResult<Vec<u8>> {
        submission::fill_gas(self.chain.as_ref(), &mut builder, sender, &self.gas).await?;
        builder.finalize()
    }

    async fn normalize(&self, input: TransactionInput, sender: SuiAddress) -> EngineResult<Vec<u8>> {
        match input {
            TransactionInput::Builder(builder) => self.prepare_for(builder, sender).await,
            bytes @ TransactionInput::Bytes(_) => bytes.into_bytes(),
        }
    }

    pub async fn sign_transaction(
        &self,
        input: impl Into<TransactionInput>,
        path: Option<&DerivationPath>,
    ) -> EngineResult<SignedTransaction> {
        let identity = self.identity(path)?;
        let tx_bytes = self.normalize(input.into(), identity.address).await?;
        let signature = identity.keypair.sign(&tx_bytes);
        debug!(
            target: "engine::orchestrator",
            signer = %identity.address,
            bytes = tx_bytes.len(),
            "transaction signed"
        );
        Ok(SignedTransaction {
            tx_bytes,
            signatures: vec![signature],
        })
    }

    pub async fn sign_and_send(
        &self,
        input: impl Into<TransactionInput>,
        path: Option<&DerivationPath>,
    ) -> EngineResult<TransactionResponse> {
        let signed = self.sign_transaction(input, path).await?;
        self.execute_signed(signed).await
    }

    /// 提交已签名交易，不重试。
    pub async fn execute_signed(
        &self,
        signed: SignedTransaction,
    ) -> EngineResult<TransactionResponse> {
        let sender = TransactionPayload::from_bytes(&signed.tx_bytes)?.sender;
        submission::submit(self.chain.as_ref(), sender, signed.tx_bytes, signed.signatures).await
    }

    /// 模拟执行，不提交也不扣 gas。
    pub async fn dev_inspect(
        &self,
        input: impl Into<TransactionInput>,
        path: Option<&DerivationPath>,
    ) -> EngineResult<DevInspectResults> {
        let identity = self.identity(path)?;
        let tx_bytes = self.normalize(input.into(), identity.address).await?;
        Ok(self.chain.dev_inspect(&tx_bytes, identity.address).await?)
    }

    pub async fn transfer_sui(
        &self,
        recipient: SuiAddress,
        amount: u64,
        path: Option<&DerivationPath>,
    ) -> EngineResult<TransactionResponse> {
        let mut builder = TransactionBuilder::new();
        builder.transfer_sui(recipient, amount)?;
        self.sign_and_send(builder, path).await
    }

    pub async fn transfer_sui_to_many(
        &self,
        recipients: &[SuiAddress],
        amounts: &[u64],
        path: Option<&DerivationPath>,
    ) -> EngineResult<TransactionResponse> {
        let mut builder = TransactionBuilder::new();
        builder.transfer_sui_to_many(recipients, amounts)?;
        self.sign_and_send(builder, path).await
    }

    pub async fn transfer_coin(
        &self,
        coin_type: &CoinType,
        recipient: SuiAddress,
        amount: u64,
        path: Option<&DerivationPath>,
    ) -> EngineResult<TransactionResponse> {
        self.transfer_coin_to_many(coin_type, &[recipient], &[amount], path)
            .await
    }

    /// SUI 直接从 gas 币拆分；其他代币先选币再合并拆分。
    pub async fn transfer_coin_to_many(
        &self,
        coin_type: &CoinType,
        recipients: &[SuiAddress],
        amounts: &[u64],
        path: Option<&DerivationPath>,
    ) -> EngineResult<TransactionResponse> {
        if coin_type.is_sui() {
            return self.transfer_sui_to_many(recipients, amounts, path).await;
        }
        if recipients.len() != amounts.len() {
            return Err(EngineError::LengthMismatch {
                recipients: recipients.len(),
                amounts: amounts.len(),
            });
        }
        let total = amounts.iter().try_fold(0u64, |acc, amount| acc.checked_add(*amount));
        let total = total.ok_or_else(|| {
            EngineError::InvalidArgument("转账总额超出 u64 范围".into())
        })?;

        let path = self.pinned_path(path);
        let identity = self.wallet.resolve(&path)?;
        let selection = self
            .selector
            .select(identity.address, total, coin_type)
            .await?;
        let mut builder = TransactionBuilder::new();
        builder.transfer_coin_to_many(&selection.object_refs(), recipients, amounts)?;
        self.sign_and_send(builder, Some(&path)).await
    }

    pub async fn stake_sui(
        &self,
        amount: u64,
        validator: SuiAddress,
        path: Option<&DerivationPath>,
    ) -> EngineResult<TransactionResponse> {
        let mut builder = TransactionBuilder::new();
        builder.stake_sui(amount, validator)?;
        self.sign_and_send(builder, path).await
    }

    pub async fn move_call(
        &self,
        target: &str,
        type_arguments: Vec<String>,
        arguments: Vec<CallArg>,
        path: Option<&DerivationPath>,
    ) -> EngineResult<TransactionResponse> {
        let mut builder = TransactionBuilder::new();
        let arguments = arguments
            .into_iter()
            .map(|argument| builder.input(argument))
            .collect::<EngineResult<Vec<Argument>>>()?;
        builder.move_call(target, type_arguments, arguments)?;
        self.sign_and_send(builder, path).await
    }

    pub async fn publish_package(
        &self,
        package: &Path,
        path: Option<&DerivationPath>,
    ) -> EngineResult<PublishOutcome> {
        let identity = self.identity(path)?;
        self.publisher.publish(package, &identity).await
    }

    /// 以多签地址为发送方提交交易，提交前本地校验聚合签名。
    pub async fn execute_multisig(
        &self,
        tx_bytes: Vec<u8>,
        authorization: CombinedAuthorization,
    ) -> EngineResult<TransactionResponse> {
        let payload = TransactionPayload::from_bytes(&tx_bytes)?;
        payload.validate()?;
        let address = authorization.policy().address();
        if payload.sender != address {
            return Err(EngineError::InvalidArgument(format!(
                "交易发送方 {} 不是多签地址 {address}",
                payload.sender
            )));
        }
        authorization.verify(&tx_bytes)?;
        info!(
            target: "engine::orchestrator",
            sender = %address,
            signers = authorization.signature_count(),
            weight = authorization.weight(),
            "submitting multisig transaction"
        );
        submission::submit(
            self.chain.as_ref(),
            address,
            tx_bytes,
            vec![SuiSignature::MultiSig(authorization)],
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Weak;

    use async_trait::async_trait;
    use once_cell::sync::OnceCell;

    use super::*;
    use crate::crypto::SuiKeyPair;
    use crate::multisig::{MultiSigPolicy, WeightedSignature, combine};
    use crate::rpc::{ExecuteOptions, InMemoryLedger, RpcError};
    use crate::wallet::{KeypairAddressSource, MnemonicAddressSource};

    const PHRASE: &str = "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";
    const FUNDING: u64 = 10_000_000_000;

    fn engine() -> (Engine, Arc<InMemoryLedger>) {
        let ledger = Arc::new(InMemoryLedger::default());
        let wallet = Arc::new(MnemonicAddressSource::from_phrase(PHRASE).unwrap());
        let engine = Engine::new(wallet, ledger.clone(), EngineSettings::default());
        (engine, ledger)
    }

    fn funded() -> (Engine, Arc<InMemoryLedger>, SuiAddress) {
        let (engine, ledger) = engine();
        let owner = engine.current_address().unwrap();
        ledger.mint_sui(owner, FUNDING);
        (engine, ledger, owner)
    }

    async fn sui_balance(ledger: &InMemoryLedger, owner: SuiAddress) -> u128 {
        ledger.get_balance(owner, None).await.unwrap().total_balance
    }

    #[tokio::test]
    async fn take_amount_simulation_yields_exact_split() {
        let (engine, ledger, owner) = funded();
        let usdc = CoinType::new("0xdba3::usdc::USDC").unwrap();
        let coins: Vec<Coin> = [20, 25, 30]
            .into_iter()
            .map(|balance| ledger.mint_coin(owner, usdc.clone(), balance))
            .collect();
        let refs: Vec<_> = coins.iter().map(|coin| coin.object_ref).collect();

        let mut builder = TransactionBuilder::new();
        let (taken, remainder) = builder.take_amount_from_coins(&refs, 50).unwrap();
        assert_ne!(taken, remainder);
        let tx_bytes = engine.prepare_for(builder, owner).await.unwrap();

        let simulation = ledger.simulate(&tx_bytes).unwrap();
        assert!(simulation.effects.status.is_success());
        let created = simulation.created_coins();
        assert_eq!(created.len(), 1);
        assert_eq!(created[0].balance, 50);
        assert_eq!(created[0].coin_type, usdc);
        assert_eq!(simulation.coin(&coins[0].id()).unwrap().balance, 25);
        assert!(simulation.coin(&coins[1].id()).is_none());
        assert!(simulation.coin(&coins[2].id()).is_none());
        assert_eq!(ledger.coin(&coins[0].id()).unwrap(), coins[0]);
    }

    #[tokio::test]
    async fn transfer_to_many_pays_in_order() {
        let (engine, ledger, _) = funded();
        let recipients = [SuiAddress::random(), SuiAddress::random(), SuiAddress::random()];
        engine
            .transfer_sui_to_many(&recipients, &[10, 20, 30], None)
            .await
            .unwrap();
        for (recipient, expected) in recipients.iter().zip([10u128, 20, 30]) {
            assert_eq!(sui_balance(&ledger, *recipient).await, expected);
        }

        let err = engine
            .transfer_sui_to_many(&recipients[..2], &[10], None)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            EngineError::LengthMismatch {
                recipients: 2,
                amounts: 1
            }
        ));
    }

    #[tokio::test]
    async fn transfer_charges_amount_and_gas() {
        let (engine, ledger, owner) = funded();
        let recipient = SuiAddress::random();
        let response = engine.transfer_sui(recipient, 1_234, None).await.unwrap();
        assert!(response.status().unwrap().is_success());
        assert_eq!(sui_balance(&ledger, recipient).await, 1_234);
        assert_eq!(
            sui_balance(&ledger, owner).await,
            u128::from(FUNDING - 1_234 - ledger.flat_gas_cost())
        );
    }

    /// 在列出代币之后切换引擎账户，模拟并发的 `switch_account`。
    struct SwitchingChain {
        inner: Arc<InMemoryLedger>,
        engine: OnceCell<Weak<Engine>>,
        target: DerivationPath,
    }

    #[async_trait]
    impl ChainClient for SwitchingChain {
        fn endpoint(&self) -> String {
            self.inner.endpoint()
        }

        async fn get_balance(
            &self,
            owner: SuiAddress,
            coin_type: Option<&CoinType>,
        ) -> Result<Balance, RpcError> {
            self.inner.get_balance(owner, coin_type).await
        }

        async fn get_all_balances(&self, owner: SuiAddress) -> Result<Vec<Balance>, RpcError> {
            self.inner.get_all_balances(owner).await
        }

        async fn list_owned_objects(
            &self,
            owner: SuiAddress,
            coin_type: &CoinType,
        ) -> Result<Vec<Coin>, RpcError> {
            let coins = self.inner.list_owned_objects(owner, coin_type).await?;
            if let Some(engine) = self.engine.get().and_then(Weak::upgrade) {
                engine.switch_account(self.target).unwrap();
            }
            Ok(coins)
        }

        async fn reference_gas_price(&self) -> Result<u64, RpcError> {
            self.inner.reference_gas_price().await
        }

        async fn submit(
            &self,
            transaction: &SignedTransaction,
            options: &ExecuteOptions,
        ) -> Result<TransactionResponse, RpcError> {
            self.inner.submit(transaction, options).await
        }

        async fn dev_inspect(
            &self,
            tx_bytes: &[u8],
            sender: SuiAddress,
        ) -> Result<DevInspectResults, RpcError> {
            self.inner.dev_inspect(tx_bytes, sender).await
        }
    }

    #[tokio::test]
    async fn account_switch_mid_transfer_keeps_original_signer() {
        let ledger = Arc::new(InMemoryLedger::default());
        let other = DerivationPath::new(0, false, 1);
        let chain = Arc::new(SwitchingChain {
            inner: ledger.clone(),
            engine: OnceCell::new(),
            target: other,
        });
        let wallet = Arc::new(MnemonicAddressSource::from_phrase(PHRASE).unwrap());
        let engine = Arc::new(Engine::new(wallet, chain.clone(), EngineSettings::default()));
        chain.engine.set(Arc::downgrade(&engine)).unwrap();

        let owner = engine.current_address().unwrap();
        ledger.mint_sui(owner, FUNDING);
        let usdc = CoinType::new("0xdba3::usdc::USDC").unwrap();
        ledger.mint_coin(owner, usdc.clone(), 100);
        let recipient = SuiAddress::random();

        let response = engine.transfer_coin(&usdc, recipient, 60, None).await.unwrap();
        assert!(response.status().unwrap().is_success());
        assert_eq!(
            ledger.get_balance(recipient, Some(&usdc)).await.unwrap().total_balance,
            60
        );
        assert_eq!(engine.current_path(), other);
        assert_ne!(engine.current_address().unwrap(), owner);
    }

    #[tokio::test]
    async fn transfer_coin_selects_and_merges() {
        let (engine, ledger, owner) = funded();
        let usdc = CoinType::new("0xdba3::usdc::USDC").unwrap();
        for balance in [40, 40, 40] {
            ledger.mint_coin(owner, usdc.clone(), balance);
        }
        let recipient = SuiAddress::random();
        engine.transfer_coin(&usdc, recipient, 70, None).await.unwrap();

        let received = ledger.get_balance(recipient, Some(&usdc)).await.unwrap();
        assert_eq!(received.total_balance, 70);
        let left = ledger.get_balance(owner, Some(&usdc)).await.unwrap();
        assert_eq!(left.total_balance, 50);
        assert_eq!(left.coin_object_count, 2);

        let err = engine.transfer_coin(&usdc, recipient, 500, None).await.unwrap_err();
        assert!(matches!(err, EngineError::InsufficientBalance { available: 50, .. }));
    }

    #[tokio::test]
    async fn stale_object_surfaces_as_rejection() {
        let (engine, _ledger, _) = funded();
        let mut first = TransactionBuilder::new();
        first.transfer_sui(SuiAddress::random(), 1).unwrap();
        let mut second = TransactionBuilder::new();
        second.transfer_sui(SuiAddress::random(), 2).unwrap();

        let first = engine.sign_transaction(first, None).await.unwrap();
        let second = engine.sign_transaction(second, None).await.unwrap();
        engine.execute_signed(first).await.unwrap();
        let err = engine.execute_signed(second).await.unwrap_err();
        assert!(matches!(err, EngineError::SubmissionRejected(message) if message.contains("stale")));
    }

    #[tokio::test]
    async fn dev_inspect_does_not_mutate_ledger() {
        let (engine, ledger, owner) = funded();
        let before = engine.get_coins(&CoinType::sui()).await.unwrap();
        let mut builder = TransactionBuilder::new();
        builder.transfer_sui(SuiAddress::random(), 99).unwrap();
        let results = engine.dev_inspect(builder, None).await.unwrap();
        assert!(results.error.is_none());
        assert_eq!(engine.get_coins(&CoinType::sui()).await.unwrap(), before);
        assert_eq!(sui_balance(&ledger, owner).await, u128::from(FUNDING));
        assert_eq!(ledger.submission_count(), 0);
    }

    #[tokio::test]
    async fn reads_repeat_identically() {
        let (engine, _ledger, _) = funded();
        let balance = engine.get_balance(None).await.unwrap();
        assert_eq!(engine.get_balance(None).await.unwrap(), balance);
        let coins = engine.get_coins(&CoinType::sui()).await.unwrap();
        assert_eq!(engine.get_coins(&CoinType::sui()).await.unwrap(), coins);
        assert_eq!(engine.get_all_balances().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn switching_accounts_is_explicit() {
        let (engine, ledger, first) = funded();
        let second_path = DerivationPath::account(1);
        let second = engine.address_at(&second_path).unwrap();
        assert_ne!(first, second);
        assert_eq!(engine.current_address().unwrap(), first);

        ledger.mint_sui(second, FUNDING);
        let recipient = SuiAddress::random();
        engine
            .transfer_sui(recipient, 5, Some(&second_path))
            .await
            .unwrap();
        assert_eq!(engine.current_address().unwrap(), first);
        assert_eq!(sui_balance(&ledger, first).await, u128::from(FUNDING));

        assert_eq!(engine.switch_account(second_path).unwrap(), second);
        assert_eq!(engine.current_address().unwrap(), second);
        assert_eq!(engine.current_path(), second_path);
    }

    #[tokio::test]
    async fn single_key_wallet_rejects_other_paths() {
        let ledger = Arc::new(InMemoryLedger::default());
        let keypair = SuiKeyPair::generate();
        let address = keypair.address();
        let engine = Engine::new(
            Arc::new(KeypairAddressSource::new(keypair)),
            ledger,
            EngineSettings::default(),
        );
        assert_eq!(engine.current_address().unwrap(), address);
        assert!(engine.switch_account(DerivationPath::account(3)).is_err());
        assert_eq!(engine.current_address().unwrap(), address);
    }

    #[tokio::test]
    async fn stake_creates_staked_object() {
        let (engine, ledger, owner) = funded();
        let validator = SuiAddress::random();
        let response = engine.stake_sui(1_000_000_000, validator, None).await.unwrap();
        assert!(response.created_of_type("::staking_pool::StakedSui").is_some());
        assert_eq!(
            sui_balance(&ledger, owner).await,
            u128::from(FUNDING - 1_000_000_000 - ledger.flat_gas_cost())
        );
    }

    #[tokio::test]
    async fn unsupported_move_call_is_rejected_with_status() {
        let (engine, _ledger, _) = funded();
        let err = engine
            .move_call(
                "0x2::coin::zero",
                vec!["0x2::sui::SUI".into()],
                Vec::new(),
                None,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::SubmissionRejected(_)));
    }

    #[tokio::test]
    async fn multisig_transfer_executes() {
        let (engine, ledger) = engine();
        let signers: Vec<DerivationPath> = (0..3).map(DerivationPath::account).collect();
        let keys: Vec<_> = signers
            .iter()
            .map(|path| engine.wallet.resolve(path).unwrap().keypair.public_key())
            .collect();
        let policy = MultiSigPolicy::new(
            vec![(keys[0], 1), (keys[1], 1), (keys[2], 2)],
            2,
        )
        .unwrap();
        let multisig_address = policy.address();
        ledger.mint_sui(multisig_address, FUNDING);

        let recipient = SuiAddress::random();
        let mut builder = TransactionBuilder::new();
        builder.transfer_sui(recipient, 777).unwrap();
        let tx_bytes = engine.prepare_for(builder, multisig_address).await.unwrap();

        let mut partials = Vec::new();
        for path in [&signers[1], &signers[0]] {
            let signed = engine
                .sign_transaction(tx_bytes.clone(), Some(path))
                .await
                .unwrap();
            let SuiSignature::Ed25519(signature) = &signed.signatures[0] else {
                panic!("expected an ed25519 signature");
            };
            partials.push(WeightedSignature::from_ed25519(signature, &policy).unwrap());
        }
        let authorization = combine(&policy, &partials).unwrap();
        assert_eq!(authorization.signer_positions(), vec![0, 1]);

        engine
            .execute_multisig(tx_bytes, authorization)
            .await
            .unwrap();
        assert_eq!(sui_balance(&ledger, recipient).await, 777);
    }

    #[tokio::test]
    async fn multisig_rejects_foreign_sender() {
        let (engine, _ledger, owner) = funded();
        let key = engine.wallet.resolve(&DerivationPath::default()).unwrap();
        let policy = MultiSigPolicy::new(vec![(key.keypair.public_key(), 1)], 1).unwrap();
        let mut builder = TransactionBuilder::new();
        builder.transfer_sui(SuiAddress::random(), 1).unwrap();
        let tx_bytes = engine.prepare_for(builder, owner).await.unwrap();
        let signature = key.keypair.sign_transaction(&tx_bytes);
        let authorization = combine(
            &policy,
            &[WeightedSignature::from_ed25519(&signature, &policy).unwrap()],
        )
        .unwrap();
        let err = engine
            .execute_multisig(tx_bytes, authorization)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidArgument(_)));
    }
}
