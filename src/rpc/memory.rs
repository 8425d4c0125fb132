use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::debug;

use crate::crypto::{SuiSignature, transaction_digest};
use crate::engine::payload::{Argument, CallArg, ObjectArg, Operation, TransactionPayload};
use crate::types::{
    Coin, CoinType, ObjectDigest, ObjectId, ObjectRef, SUI_FRAMEWORK_PACKAGE_ID,
    SUI_SYSTEM_PACKAGE_ID, SuiAddress,
};

use super::ChainClient;
use super::error::RpcError;
use super::types::{
    Balance, BalanceChange, DevInspectResults, ExecuteOptions, ExecutionStatus, GasCostSummary,
    ObjectChange, OwnedObjectRef, Owner, SignedTransaction, SuiObjectRef, TransactionEffects,
    TransactionResponse,
};

/// 每笔交易按固定计算单位计费：gas_price × 1000。
const FLAT_COMPUTATION_UNITS: u64 = 1_000;
/// 节点对交易输入问题的错误码。
const INVALID_INPUT_CODE: i64 = -32002;
const BINCODE: bincode::config::Configuration = bincode::config::standard();

#[derive(Clone, Debug)]
enum ObjectKind {
    Coin { coin_type: CoinType, balance: u64 },
    StakedSui { validator: SuiAddress, principal: u64 },
    UpgradeCap { package: ObjectId },
    Package { modules: usize },
}

impl ObjectKind {
    fn type_tag(&self) -> String {
        match self {
            ObjectKind::Coin { coin_type, .. } => {
                format!("{SUI_FRAMEWORK_PACKAGE_ID}::coin::Coin<{coin_type}>")
            }
            ObjectKind::StakedSui { .. } => {
                format!("{SUI_SYSTEM_PACKAGE_ID}::staking_pool::StakedSui")
            }
            ObjectKind::UpgradeCap { .. } => {
                format!("{SUI_FRAMEWORK_PACKAGE_ID}::package::UpgradeCap")
            }
            ObjectKind::Package { .. } => "package".to_string(),
        }
    }
}

#[derive(Clone, Debug)]
struct StoredObject {
    reference: ObjectRef,
    owner: Owner,
    kind: ObjectKind,
    seq: u64,
}

impl StoredObject {
    fn as_coin(&self) -> Option<Coin> {
        match &self.kind {
            ObjectKind::Coin { coin_type, balance } => Some(Coin {
                object_ref: self.reference,
                coin_type: coin_type.clone(),
                balance: *balance,
            }),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, Default)]
struct LedgerState {
    objects: HashMap<ObjectId, StoredObject>,
    next_seq: u64,
}

impl LedgerState {
    fn insert(&mut self, id: ObjectId, owner: Owner, kind: ObjectKind, version: u64) {
        self.next_seq += 1;
        self.objects.insert(
            id,
            StoredObject {
                reference: ObjectRef::new(id, version, ObjectDigest::random()),
                owner,
                kind,
                seq: self.next_seq,
            },
        );
    }

    fn owned_coins(&self, owner: SuiAddress, coin_type: Option<&CoinType>) -> Vec<Coin> {
        let mut owned: Vec<&StoredObject> = self
            .objects
            .values()
            .filter(|object| object.owner == Owner::AddressOwner(owner))
            .collect();
        owned.sort_by_key(|object| object.seq);
        owned
            .into_iter()
            .filter_map(StoredObject::as_coin)
            .filter(|coin| coin_type.is_none_or(|ty| coin.coin_type == *ty))
            .collect()
    }
}

/// 模拟执行的结果：效果、对象变更、余额变更，以及执行后被触及的代币。
#[derive(Clone, Debug)]
pub struct Simulation {
    pub effects: TransactionEffects,
    pub object_changes: Vec<ObjectChange>,
    pub balance_changes: Vec<BalanceChange>,
    coins: HashMap<ObjectId, Coin>,
}

impl Simulation {
    pub fn coin(&self, id: &ObjectId) -> Option<&Coin> {
        self.coins.get(id)
    }

    pub fn created_coins(&self) -> Vec<&Coin> {
        self.effects
            .created
            .iter()
            .filter_map(|created| self.coins.get(&created.reference.object_id))
            .collect()
    }
}

struct Execution {
    state: LedgerState,
    simulation: Simulation,
}

/// 进程内账本：按真实节点的输入校验规则执行交易，用于模拟和测试。
#[derive(Debug)]
pub struct InMemoryLedger {
    state: Mutex<LedgerState>,
    gas_price: u64,
    submissions: AtomicU64,
}

impl Default for InMemoryLedger {
    fn default() -> Self {
        Self::new(1_000)
    }
}

impl InMemoryLedger {
    pub fn new(gas_price: u64) -> Self {
        Self {
            state: Mutex::new(LedgerState::default()),
            gas_price,
            submissions: AtomicU64::new(0),
        }
    }

    pub fn flat_gas_cost(&self) -> u64 {
        self.gas_price.saturating_mul(FLAT_COMPUTATION_UNITS)
    }

    pub fn mint_coin(&self, owner: SuiAddress, coin_type: CoinType, balance: u64) -> Coin {
        let id = ObjectId::random();
        let mut state = self.state.lock();
        state.insert(
            id,
            Owner::AddressOwner(owner),
            ObjectKind::Coin {
                coin_type: coin_type.clone(),
                balance,
            },
            1,
        );
        Coin {
            object_ref: state.objects[&id].reference,
            coin_type,
            balance,
        }
    }

    pub fn mint_sui(&self, owner: SuiAddress, balance: u64) -> Coin {
        self.mint_coin(owner, CoinType::sui(), balance)
    }

    pub fn coin(&self, id: &ObjectId) -> Option<Coin> {
        self.state.lock().objects.get(id).and_then(StoredObject::as_coin)
    }

    pub fn owner_of(&self, id: &ObjectId) -> Option<Owner> {
        self.state.lock().objects.get(id).map(|object| object.owner)
    }

    pub fn submission_count(&self) -> u64 {
        self.submissions.load(Ordering::Relaxed)
    }

    /// 不提交、不校验签名、不扣 gas 地执行交易。
    pub fn simulate(&self, tx_bytes: &[u8]) -> Result<Simulation, RpcError> {
        let payload = decode_payload(tx_bytes)?;
        let state = self.state.lock();
        let execution = execute(&state, &payload, tx_bytes, None)?;
        Ok(execution.simulation)
    }
}

#[async_trait]
impl ChainClient for InMemoryLedger {
    fn endpoint(&self) -> String {
        "memory://ledger".to_string()
    }

    async fn get_balance(
        &self,
        owner: SuiAddress,
        coin_type: Option<&CoinType>,
    ) -> Result<Balance, RpcError> {
        let coin_type = coin_type.cloned().unwrap_or_default();
        let coins = self.state.lock().owned_coins(owner, Some(&coin_type));
        Ok(Balance {
            coin_object_count: coins.len() as u64,
            total_balance: coins.iter().map(|coin| u128::from(coin.balance)).sum(),
            coin_type,
        })
    }

    async fn get_all_balances(&self, owner: SuiAddress) -> Result<Vec<Balance>, RpcError> {
        let coins = self.state.lock().owned_coins(owner, None);
        let mut grouped: BTreeMap<CoinType, (u64, u128)> = BTreeMap::new();
        for coin in coins {
            let entry = grouped.entry(coin.coin_type).or_default();
            entry.0 += 1;
            entry.1 += u128::from(coin.balance);
        }
        Ok(grouped
            .into_iter()
            .map(|(coin_type, (count, total))| Balance {
                coin_type,
                coin_object_count: count,
                total_balance: total,
            })
            .collect())
    }

    async fn list_owned_objects(
        &self,
        owner: SuiAddress,
        coin_type: &CoinType,
    ) -> Result<Vec<Coin>, RpcError> {
        Ok(self.state.lock().owned_coins(owner, Some(coin_type)))
    }

    async fn reference_gas_price(&self) -> Result<u64, RpcError> {
        Ok(self.gas_price)
    }

    async fn submit(
        &self,
        transaction: &SignedTransaction,
        _options: &ExecuteOptions,
    ) -> Result<TransactionResponse, RpcError> {
        let payload = decode_payload(&transaction.tx_bytes)?;
        let signers = transaction
            .signatures
            .iter()
            .map(|signature| verify_signature(signature, &transaction.tx_bytes))
            .collect::<Result<Vec<_>, _>>()?;
        if !signers.contains(&payload.sender) {
            return Err(reject(format!(
                "no signature matches sender {}",
                payload.sender
            )));
        }

        let mut state = self.state.lock();
        let execution = execute(&state, &payload, &transaction.tx_bytes, Some(self.gas_price))?;
        *state = execution.state;
        drop(state);
        self.submissions.fetch_add(1, Ordering::Relaxed);

        let simulation = execution.simulation;
        debug!(
            target: "rpc::memory",
            digest = %simulation.effects.transaction_digest,
            success = simulation.effects.status.is_success(),
            created = simulation.effects.created.len(),
            deleted = simulation.effects.deleted.len(),
            "transaction executed"
        );
        Ok(TransactionResponse {
            digest: simulation.effects.transaction_digest.clone(),
            effects: Some(simulation.effects),
            object_changes: Some(simulation.object_changes),
            balance_changes: Some(simulation.balance_changes),
            checkpoint: None,
        })
    }

    async fn dev_inspect(
        &self,
        tx_bytes: &[u8],
        sender: SuiAddress,
    ) -> Result<DevInspectResults, RpcError> {
        let mut payload = decode_payload(tx_bytes)?;
        payload.sender = sender;
        let state = self.state.lock();
        let execution = execute(&state, &payload, tx_bytes, None)?;
        let error = match &execution.simulation.effects.status {
            ExecutionStatus::Failure { error } => Some(error.clone()),
            ExecutionStatus::Success => None,
        };
        Ok(DevInspectResults {
            effects: execution.simulation.effects,
            error,
        })
    }
}

fn add_balance(left: u64, right: u64) -> Result<u64, String> {
    left.checked_add(right)
        .ok_or_else(|| format!("ArithmeticOverflow: coin balance {left} + {right} exceeds u64"))
}

fn reject(message: String) -> RpcError {
    RpcError::JsonRpc {
        method: "sui_executeTransactionBlock".to_string(),
        code: INVALID_INPUT_CODE,
        message,
    }
}

fn decode_payload(tx_bytes: &[u8]) -> Result<TransactionPayload, RpcError> {
    let payload = TransactionPayload::from_bytes(tx_bytes)
        .map_err(|err| reject(format!("invalid transaction bytes: {err}")))?;
    payload
        .validate()
        .map_err(|err| reject(err.to_string()))?;
    Ok(payload)
}

fn verify_signature(signature: &SuiSignature, tx_bytes: &[u8]) -> Result<SuiAddress, RpcError> {
    signature
        .verify(tx_bytes)
        .map_err(|err| reject(format!("signature verification failed: {err}")))
}

/// 输入校验失败直接拒绝（不上链）；执行期失败则只扣 gas 并返回 failure 状态。
fn execute(
    state: &LedgerState,
    payload: &TransactionPayload,
    tx_bytes: &[u8],
    charge_gas_price: Option<u64>,
) -> Result<Execution, RpcError> {
    let lamport = check_inputs(state, payload)?;
    let digest = transaction_digest(tx_bytes);
    let gas_cost = match charge_gas_price {
        Some(price) => price.checked_mul(FLAT_COMPUTATION_UNITS).ok_or_else(|| {
            reject(format!("gas price {price} overflows the computation cost"))
        })?,
        None => 0,
    };
    if gas_cost > payload.gas.budget {
        return Err(reject(format!(
            "gas budget {} below minimum cost {gas_cost}",
            payload.gas.budget
        )));
    }

    let mut executor = Executor::new(state.clone(), payload);
    let status = match executor.run() {
        Ok(()) => ExecutionStatus::Success,
        Err(error) => {
            executor = Executor::new(state.clone(), payload);
            executor.smash_gas().map_err(reject)?;
            ExecutionStatus::Failure { error }
        }
    };
    executor.charge_gas(gas_cost);

    Ok(executor.finish(state, status, lamport, digest, gas_cost))
}

fn check_inputs(state: &LedgerState, payload: &TransactionPayload) -> Result<u64, RpcError> {
    let mut max_version = 0u64;
    let mut check_owned = |reference: &ObjectRef, what: &str| -> Result<(), RpcError> {
        let stored = state.objects.get(&reference.object_id).ok_or_else(|| {
            reject(format!(
                "{what} object {} not found or already consumed",
                reference.object_id
            ))
        })?;
        if stored.reference.version != reference.version {
            return Err(reject(format!(
                "{what} object {} version {} is stale, current version is {}",
                reference.object_id, reference.version, stored.reference.version
            )));
        }
        match stored.owner {
            Owner::AddressOwner(owner) if owner == payload.sender => {}
            Owner::Immutable => {}
            other => {
                return Err(reject(format!(
                    "{what} object {} is owned by {other:?}, not sender {}",
                    reference.object_id, payload.sender
                )));
            }
        }
        max_version = max_version.max(stored.reference.version);
        Ok(())
    };

    let mut seen = BTreeSet::new();
    for gas in &payload.gas.payment {
        if !seen.insert(gas.object_id) {
            return Err(reject(format!("gas object {} listed twice", gas.object_id)));
        }
        check_owned(gas, "gas")?;
        let is_sui = state
            .objects
            .get(&gas.object_id)
            .and_then(StoredObject::as_coin)
            .is_some_and(|coin| coin.coin_type.is_sui());
        if !is_sui {
            return Err(reject(format!("gas object {} is not a SUI coin", gas.object_id)));
        }
    }
    for input in &payload.inputs {
        if let CallArg::Object(ObjectArg::ImmOrOwned(reference)) = input {
            check_owned(reference, "input")?;
        }
    }
    let gas_balance: u128 = payload
        .gas
        .payment
        .iter()
        .filter_map(|gas| state.objects.get(&gas.object_id))
        .filter_map(StoredObject::as_coin)
        .map(|coin| u128::from(coin.balance))
        .sum();
    if gas_balance > u128::from(u64::MAX) {
        return Err(reject(format!(
            "gas coins hold {gas_balance} in total, more than a single coin can hold"
        )));
    }
    if gas_balance < u128::from(payload.gas.budget) {
        return Err(reject(format!(
            "gas balance {gas_balance} is below gas budget {}",
            payload.gas.budget
        )));
    }
    Ok(max_version + 1)
}

#[derive(Clone, Debug)]
enum Slot {
    Object(ObjectId),
    Pure(Vec<u8>),
}

struct Executor<'a> {
    state: LedgerState,
    payload: &'a TransactionPayload,
    results: Vec<Vec<Slot>>,
    touched: BTreeSet<ObjectId>,
    gas_coin: ObjectId,
}

impl<'a> Executor<'a> {
    fn new(state: LedgerState, payload: &'a TransactionPayload) -> Self {
        Self {
            state,
            payload,
            results: Vec::with_capacity(payload.operations.len()),
            touched: BTreeSet::new(),
            gas_coin: payload.gas.payment[0].object_id,
        }
    }

    fn run(&mut self) -> Result<(), String> {
        self.smash_gas()?;
        let payload = self.payload;
        for (index, operation) in payload.operations.iter().enumerate() {
            let produced = self
                .apply(operation)
                .map_err(|err| format!("operation #{index} ({}): {err}", operation.kind()))?;
            self.results.push(produced);
        }
        Ok(())
    }

    /// 多个 gas 币先合并到第一枚。
    fn smash_gas(&mut self) -> Result<(), String> {
        self.touched.insert(self.gas_coin);
        let payload = self.payload;
        let mut total = 0u64;
        for extra in &payload.gas.payment[1..] {
            if let Some(ObjectKind::Coin { balance, .. }) =
                self.state.objects.remove(&extra.object_id).map(|object| object.kind)
            {
                total = add_balance(total, balance)?;
            }
            self.touched.insert(extra.object_id);
        }
        if let Ok((_, balance)) = self.coin_mut(self.gas_coin) {
            *balance = add_balance(*balance, total)?;
        }
        Ok(())
    }

    fn charge_gas(&mut self, cost: u64) {
        if let Ok((_, balance)) = self.coin_mut(self.gas_coin) {
            *balance = balance.saturating_sub(cost);
        }
    }

    fn apply(&mut self, operation: &Operation) -> Result<Vec<Slot>, String> {
        match operation {
            Operation::SplitCoins { coin, amounts } => {
                let source = self.object_arg(*coin)?;
                let amounts = amounts
                    .iter()
                    .map(|amount| self.pure_u64(*amount))
                    .collect::<Result<Vec<_>, _>>()?;
                let requested: u128 = amounts.iter().map(|amount| u128::from(*amount)).sum();
                let (coin_type, balance) = self.coin_mut(source)?;
                if u128::from(*balance) < requested {
                    return Err(format!(
                        "InsufficientCoinBalance: coin {source} holds {balance}, split needs {requested}"
                    ));
                }
                *balance -= requested as u64;
                let coin_type = coin_type.clone();
                self.touched.insert(source);

                let mut produced = Vec::with_capacity(amounts.len());
                for amount in amounts {
                    let id = self.create(ObjectKind::Coin {
                        coin_type: coin_type.clone(),
                        balance: amount,
                    });
                    produced.push(Slot::Object(id));
                }
                Ok(produced)
            }
            Operation::MergeCoins {
                destination,
                sources,
            } => {
                let destination = self.object_arg(*destination)?;
                let (target_type, _) = self.coin_mut(destination)?;
                let target_type = target_type.clone();
                let mut total = 0u64;
                for source in sources {
                    let source = self.object_arg(*source)?;
                    if source == destination {
                        return Err(format!("coin {source} merged into itself"));
                    }
                    if source == self.gas_coin {
                        return Err("gas coin can only be a merge destination".to_string());
                    }
                    let (source_type, balance) = self.coin_mut(source)?;
                    if *source_type != target_type {
                        return Err(format!(
                            "coin {source} of type {source_type} cannot merge into {target_type}"
                        ));
                    }
                    total = add_balance(total, *balance)?;
                    self.delete(source);
                }
                let (_, balance) = self.coin_mut(destination)?;
                *balance = add_balance(*balance, total)?;
                self.touched.insert(destination);
                Ok(Vec::new())
            }
            Operation::TransferObjects { objects, recipient } => {
                let recipient = self.pure_address(*recipient)?;
                for object in objects {
                    let id = self.object_arg(*object)?;
                    let stored = self
                        .state
                        .objects
                        .get_mut(&id)
                        .ok_or_else(|| format!("object {id} no longer exists"))?;
                    stored.owner = Owner::AddressOwner(recipient);
                    self.touched.insert(id);
                }
                Ok(Vec::new())
            }
            Operation::MoveCall(call) => {
                let is_stake = call.package == SUI_SYSTEM_PACKAGE_ID
                    && call.module == "sui_system"
                    && call.function == "request_add_stake";
                if !is_stake {
                    return Err(format!(
                        "local ledger cannot execute move call {}",
                        call.target()
                    ));
                }
                let [_, coin, validator] = call.arguments.as_slice() else {
                    return Err("request_add_stake expects 3 arguments".to_string());
                };
                let coin = self.object_arg(*coin)?;
                let validator = self.pure_address(*validator)?;
                let (coin_type, balance) = self.coin_mut(coin)?;
                if !coin_type.is_sui() {
                    return Err(format!("stake requires a SUI coin, got {coin_type}"));
                }
                let principal = *balance;
                self.delete(coin);
                self.create(ObjectKind::StakedSui {
                    validator,
                    principal,
                });
                Ok(Vec::new())
            }
            Operation::Publish { modules, .. } => {
                let package = ObjectId::random();
                self.state.insert(
                    package,
                    Owner::Immutable,
                    ObjectKind::Package {
                        modules: modules.len(),
                    },
                    1,
                );
                self.touched.insert(package);
                let cap = self.create(ObjectKind::UpgradeCap { package });
                Ok(vec![Slot::Object(cap)])
            }
        }
    }

    fn resolve(&self, argument: Argument) -> Result<Slot, String> {
        match argument {
            Argument::GasCoin => Ok(Slot::Object(self.gas_coin)),
            Argument::Input(index) => match self.payload.inputs.get(usize::from(index)) {
                Some(CallArg::Pure(bytes)) => Ok(Slot::Pure(bytes.clone())),
                Some(CallArg::Object(object)) => Ok(Slot::Object(object.object_id())),
                None => Err(format!("input {index} missing")),
            },
            Argument::Result(source) => self.result_slot(source, 0),
            Argument::NestedResult(source, nested) => self.result_slot(source, nested),
        }
    }

    fn result_slot(&self, source: u16, nested: u16) -> Result<Slot, String> {
        self.results
            .get(usize::from(source))
            .and_then(|slots| slots.get(usize::from(nested)))
            .cloned()
            .ok_or_else(|| format!("result {nested} of operation #{source} not available"))
    }

    fn object_arg(&self, argument: Argument) -> Result<ObjectId, String> {
        match self.resolve(argument)? {
            Slot::Object(id) => Ok(id),
            Slot::Pure(_) => Err(format!("{argument:?} is a pure value, expected an object")),
        }
    }

    fn pure_u64(&self, argument: Argument) -> Result<u64, String> {
        self.decode_pure(argument)
    }

    fn pure_address(&self, argument: Argument) -> Result<SuiAddress, String> {
        self.decode_pure(argument)
    }

    fn decode_pure<T: serde::de::DeserializeOwned>(&self, argument: Argument) -> Result<T, String> {
        match self.resolve(argument)? {
            Slot::Pure(bytes) => bincode::serde::decode_from_slice(&bytes, BINCODE)
                .map(|(value, _)| value)
                .map_err(|err| format!("{argument:?} does not decode: {err}")),
            Slot::Object(id) => Err(format!("{argument:?} is object {id}, expected a pure value")),
        }
    }

    fn coin_mut(&mut self, id: ObjectId) -> Result<(&mut CoinType, &mut u64), String> {
        match self.state.objects.get_mut(&id).map(|object| &mut object.kind) {
            Some(ObjectKind::Coin { coin_type, balance }) => Ok((coin_type, balance)),
            Some(_) => Err(format!("object {id} is not a coin")),
            None => Err(format!("object {id} no longer exists")),
        }
    }

    fn create(&mut self, kind: ObjectKind) -> ObjectId {
        let id = ObjectId::random();
        self.state
            .insert(id, Owner::AddressOwner(self.payload.sender), kind, 0);
        self.touched.insert(id);
        id
    }

    fn delete(&mut self, id: ObjectId) {
        self.state.objects.remove(&id);
        self.touched.insert(id);
    }

    fn finish(
        mut self,
        before: &LedgerState,
        status: ExecutionStatus,
        lamport: u64,
        digest: String,
        gas_cost: u64,
    ) -> Execution {
        let sender = self.payload.sender;
        let mut created = Vec::new();
        let mut mutated = Vec::new();
        let mut deleted = Vec::new();
        let mut object_changes = Vec::new();
        let mut coins = HashMap::new();
        let mut deltas: BTreeMap<(SuiAddress, CoinType), i128> = BTreeMap::new();

        for id in &self.touched {
            let prior = before.objects.get(id);
            if let Some(object) = self.state.objects.get_mut(id) {
                if !matches!(object.kind, ObjectKind::Package { .. }) {
                    object.reference.version = lamport;
                    object.reference.digest = ObjectDigest::random();
                }
            }
            let after = self.state.objects.get(id);

            if let Some(coin) = prior.and_then(StoredObject::as_coin) {
                if let Some(owner) = prior.and_then(|object| object.owner.address()) {
                    *deltas.entry((owner, coin.coin_type)).or_default() -= i128::from(coin.balance);
                }
            }
            if let Some(coin) = after.and_then(StoredObject::as_coin) {
                if let Some(owner) = after.and_then(|object| object.owner.address()) {
                    *deltas.entry((owner, coin.coin_type.clone())).or_default() +=
                        i128::from(coin.balance);
                }
                coins.insert(*id, coin);
            }

            match (prior, after) {
                (None, Some(object)) => {
                    created.push(OwnedObjectRef {
                        owner: object.owner,
                        reference: object.reference.into(),
                    });
                    object_changes.push(match &object.kind {
                        ObjectKind::Package { .. } => ObjectChange::Published {
                            package_id: *id,
                            version: object.reference.version,
                            digest: object.reference.digest,
                            modules: Vec::new(),
                        },
                        kind => ObjectChange::Created {
                            sender,
                            owner: object.owner,
                            object_type: kind.type_tag(),
                            object_id: *id,
                            version: object.reference.version,
                            digest: object.reference.digest,
                        },
                    });
                }
                (Some(_), Some(object)) => {
                    mutated.push(OwnedObjectRef {
                        owner: object.owner,
                        reference: object.reference.into(),
                    });
                    object_changes.push(ObjectChange::Mutated {
                        sender,
                        owner: object.owner,
                        object_type: object.kind.type_tag(),
                        object_id: *id,
                        version: object.reference.version,
                        digest: object.reference.digest,
                    });
                }
                (Some(object), None) => {
                    deleted.push(SuiObjectRef {
                        object_id: *id,
                        version: lamport,
                        digest: ObjectDigest::default(),
                    });
                    object_changes.push(ObjectChange::Deleted {
                        sender,
                        object_type: object.kind.type_tag(),
                        object_id: *id,
                        version: lamport,
                    });
                }
                (None, None) => {}
            }
        }

        let balance_changes = deltas
            .into_iter()
            .filter(|(_, amount)| *amount != 0)
            .map(|((owner, coin_type), amount)| BalanceChange {
                owner: Owner::AddressOwner(owner),
                coin_type,
                amount,
            })
            .collect();

        let effects = TransactionEffects {
            status,
            transaction_digest: digest,
            gas_used: GasCostSummary {
                computation_cost: gas_cost,
                storage_cost: 0,
                storage_rebate: 0,
            },
            created,
            mutated,
            deleted,
        };

        Execution {
            state: self.state,
            simulation: Simulation {
                effects,
                object_changes,
                balance_changes,
                coins,
            },
        }
    }
}
