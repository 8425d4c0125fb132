use std::collections::{HashMap, HashSet};

use serde::Serialize;
use tracing::debug;

use crate::types::{
    ObjectId, ObjectRef, SUI_SYSTEM_PACKAGE_ID, SUI_SYSTEM_STATE_INITIAL_VERSION,
    SUI_SYSTEM_STATE_OBJECT_ID, SuiAddress,
};

use super::error::{EngineError, EngineResult};
use super::payload::{Argument, CallArg, MoveCall, ObjectArg, Operation, TransactionPayload};

const BINCODE: bincode::config::Configuration = bincode::config::standard();

/// 增量组装交易操作序列；`finalize` 之后只读。
#[derive(Clone, Debug, Default)]
pub struct TransactionBuilder {
    payload: TransactionPayload,
    object_inputs: HashMap<ObjectId, u16>,
    finalized: bool,
}

impl TransactionBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn payload(&self) -> &TransactionPayload {
        &self.payload
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    pub fn sender(&self) -> Option<SuiAddress> {
        (!self.payload.sender.is_zero()).then_some(self.payload.sender)
    }

    pub fn set_sender(&mut self, sender: SuiAddress) -> EngineResult<()> {
        self.ensure_open()?;
        self.payload.sender = sender;
        Ok(())
    }

    pub fn gas_budget(&self) -> Option<u64> {
        (self.payload.gas.budget > 0).then_some(self.payload.gas.budget)
    }

    pub fn set_gas_budget(&mut self, budget: u64) -> EngineResult<()> {
        self.ensure_open()?;
        self.payload.gas.budget = budget;
        Ok(())
    }

    pub fn gas_price(&self) -> Option<u64> {
        (self.payload.gas.price > 0).then_some(self.payload.gas.price)
    }

    pub fn set_gas_price(&mut self, price: u64) -> EngineResult<()> {
        self.ensure_open()?;
        self.payload.gas.price = price;
        Ok(())
    }

    pub fn has_gas_payment(&self) -> bool {
        !self.payload.gas.payment.is_empty()
    }

    pub fn set_gas_payment(&mut self, payment: Vec<ObjectRef>) -> EngineResult<()> {
        self.ensure_open()?;
        if let Some(clash) = payment
            .iter()
            .find(|object| self.object_inputs.contains_key(&object.object_id))
        {
            return Err(EngineError::InvalidCoinSet(format!(
                "gas payment object {} is already used as a transaction input",
                clash.object_id
            )));
        }
        self.payload.gas.payment = payment;
        Ok(())
    }

    /// 注册一个纯值输入（bincode 编码）。
    pub fn pure<T: Serialize + ?Sized>(&mut self, value: &T) -> EngineResult<Argument> {
        self.ensure_open()?;
        let bytes = bincode::serde::encode_to_vec(value, BINCODE)?;
        self.push_input(CallArg::Pure(bytes))
    }

    /// 注册拥有型对象输入；同一对象重复注册返回同一个句柄。
    pub fn object(&mut self, object: ObjectRef) -> EngineResult<Argument> {
        self.ensure_open()?;
        if self
            .payload
            .gas
            .payment
            .iter()
            .any(|gas| gas.object_id == object.object_id)
        {
            return Err(EngineError::InvalidCoinSet(format!(
                "object {} is already used for gas payment",
                object.object_id
            )));
        }
        if let Some(index) = self.object_inputs.get(&object.object_id) {
            return Ok(Argument::Input(*index));
        }
        let argument = self.push_input(CallArg::Object(ObjectArg::ImmOrOwned(object)))?;
        if let Argument::Input(index) = argument {
            self.object_inputs.insert(object.object_id, index);
        }
        Ok(argument)
    }

    pub fn shared_object(
        &mut self,
        object_id: ObjectId,
        initial_shared_version: u64,
        mutable: bool,
    ) -> EngineResult<Argument> {
        self.ensure_open()?;
        if let Some(index) = self.object_inputs.get(&object_id) {
            return Ok(Argument::Input(*index));
        }
        let argument = self.push_input(CallArg::Object(ObjectArg::Shared {
            object_id,
            initial_shared_version,
            mutable,
        }))?;
        if let Argument::Input(index) = argument {
            self.object_inputs.insert(object_id, index);
        }
        Ok(argument)
    }

    /// 注册已编码的调用参数，对象参数按 ID 去重。
    pub fn input(&mut self, input: CallArg) -> EngineResult<Argument> {
        match input {
            CallArg::Pure(bytes) => {
                self.ensure_open()?;
                self.push_input(CallArg::Pure(bytes))
            }
            CallArg::Object(ObjectArg::ImmOrOwned(object)) => self.object(object),
            CallArg::Object(ObjectArg::Shared {
                object_id,
                initial_shared_version,
                mutable,
            }) => self.shared_object(object_id, initial_shared_version, mutable),
        }
    }

    /// 从 `coin` 拆出若干金额，按顺序返回新币句柄。
    pub fn split_coins(&mut self, coin: Argument, amounts: &[u64]) -> EngineResult<Vec<Argument>> {
        self.ensure_open()?;
        if amounts.is_empty() {
            return Err(EngineError::InvalidArgument("split requires at least one amount".into()));
        }
        let amount_args = amounts
            .iter()
            .map(|amount| self.pure(amount))
            .collect::<EngineResult<Vec<_>>>()?;
        let index = self.push_operation(Operation::SplitCoins {
            coin,
            amounts: amount_args,
        })?;
        (0..amounts.len())
            .map(|nested| {
                let nested = u16::try_from(nested).map_err(|_| {
                    EngineError::InvalidArgument("too many split amounts".into())
                })?;
                Ok(Argument::NestedResult(index, nested))
            })
            .collect()
    }

    pub fn merge_coins(&mut self, destination: Argument, sources: Vec<Argument>) -> EngineResult<()> {
        self.ensure_open()?;
        if sources.is_empty() {
            return Err(EngineError::InvalidCoinSet("merge requires at least one source coin".into()));
        }
        self.push_operation(Operation::MergeCoins {
            destination,
            sources,
        })?;
        Ok(())
    }

    pub fn transfer_objects(
        &mut self,
        objects: Vec<Argument>,
        recipient: SuiAddress,
    ) -> EngineResult<()> {
        self.ensure_open()?;
        if objects.is_empty() {
            return Err(EngineError::InvalidArgument("transfer requires at least one object".into()));
        }
        let recipient = self.pure(&recipient)?;
        self.push_operation(Operation::TransferObjects { objects, recipient })?;
        Ok(())
    }

    /// 通用 Move 调用，`target` 形如 `0x2::coin::split`。
    pub fn move_call(
        &mut self,
        target: &str,
        type_arguments: Vec<String>,
        arguments: Vec<Argument>,
    ) -> EngineResult<Argument> {
        self.ensure_open()?;
        let (package, module, function) = parse_call_target(target)?;
        let index = self.push_operation(Operation::MoveCall(MoveCall {
            package,
            module,
            function,
            type_arguments,
            arguments,
        }))?;
        Ok(Argument::Result(index))
    }

    /// 发布合约包，返回 UpgradeCap 句柄。
    pub fn publish(
        &mut self,
        modules: Vec<Vec<u8>>,
        dependencies: Vec<ObjectId>,
    ) -> EngineResult<Argument> {
        self.ensure_open()?;
        if modules.is_empty() {
            return Err(EngineError::InvalidArgument("publish requires at least one module".into()));
        }
        let index = self.push_operation(Operation::Publish {
            modules,
            dependencies,
        })?;
        Ok(Argument::Result(index))
    }

    pub fn transfer_sui(&mut self, recipient: SuiAddress, amount: u64) -> EngineResult<Argument> {
        self.ensure_open()?;
        let pieces = self.split_coins(Argument::GasCoin, &[amount])?;
        self.transfer_objects(pieces.clone(), recipient)?;
        Ok(pieces[0])
    }

    /// 从 gas 币按顺序拆分，第 i 份转给第 i 个收款人。
    pub fn transfer_sui_to_many(
        &mut self,
        recipients: &[SuiAddress],
        amounts: &[u64],
    ) -> EngineResult<Vec<Argument>> {
        self.ensure_open()?;
        self.pay_to_many(Argument::GasCoin, recipients, amounts)
    }

    /// 与 `transfer_sui_to_many` 相同的配对规则，资金来自显式的代币对象（先合并）。
    pub fn transfer_coin_to_many(
        &mut self,
        coins: &[ObjectRef],
        recipients: &[SuiAddress],
        amounts: &[u64],
    ) -> EngineResult<Vec<Argument>> {
        self.ensure_open()?;
        check_pairing(recipients, amounts)?;
        let funding = self.merge_into_first(coins)?;
        self.pay_to_many(funding, recipients, amounts)
    }

    /// 从 gas 币拆出质押金额并调用 `0x3::sui_system::request_add_stake`。
    pub fn stake_sui(&mut self, amount: u64, validator: SuiAddress) -> EngineResult<Argument> {
        self.ensure_open()?;
        let pieces = self.split_coins(Argument::GasCoin, &[amount])?;
        let system_state = self.shared_object(
            SUI_SYSTEM_STATE_OBJECT_ID,
            SUI_SYSTEM_STATE_INITIAL_VERSION,
            true,
        )?;
        let validator = self.pure(&validator)?;
        let target = format!("{SUI_SYSTEM_PACKAGE_ID}::sui_system::request_add_stake");
        self.move_call(&target, Vec::new(), vec![system_state, pieces[0], validator])
    }

    /// 先把其余代币合并进第一枚，再拆出 `amount`。
    /// 返回 (恰好为 `amount` 的新币, 合并后的余额币)。
    pub fn take_amount_from_coins(
        &mut self,
        coins: &[ObjectRef],
        amount: u64,
    ) -> EngineResult<(Argument, Argument)> {
        self.ensure_open()?;
        let remainder = self.merge_into_first(coins)?;
        let taken = self.split_coins(remainder, &[amount])?;
        Ok((taken[0], remainder))
    }

    /// 校验引用并序列化；此后所有追加操作均返回 `PayloadFinalized`。
    pub fn finalize(&mut self) -> EngineResult<Vec<u8>> {
        self.ensure_open()?;
        self.payload.validate()?;
        let bytes = self.payload.to_bytes()?;
        self.finalized = true;
        debug!(
            target: "engine::builder",
            sender = %self.payload.sender,
            inputs = self.payload.inputs.len(),
            operations = self.payload.operations.len(),
            gas_budget = self.payload.gas.budget,
            gas_objects = self.payload.gas.payment.len(),
            bytes = bytes.len(),
            "transaction payload finalized"
        );
        Ok(bytes)
    }

    fn merge_into_first(&mut self, coins: &[ObjectRef]) -> EngineResult<Argument> {
        let (first, rest) = coins.split_first().ok_or_else(|| {
            EngineError::InvalidCoinSet("coin list is empty, nothing to take an amount from".into())
        })?;
        let mut seen = HashSet::with_capacity(coins.len());
        if let Some(repeated) = coins.iter().find(|coin| !seen.insert(coin.object_id)) {
            return Err(EngineError::InvalidCoinSet(format!(
                "coin {} listed more than once",
                repeated.object_id
            )));
        }
        let destination = self.object(*first)?;
        if !rest.is_empty() {
            let sources = rest
                .iter()
                .map(|coin| self.object(*coin))
                .collect::<EngineResult<Vec<_>>>()?;
            self.merge_coins(destination, sources)?;
        }
        Ok(destination)
    }

    fn pay_to_many(
        &mut self,
        funding: Argument,
        recipients: &[SuiAddress],
        amounts: &[u64],
    ) -> EngineResult<Vec<Argument>> {
        check_pairing(recipients, amounts)?;
        let pieces = self.split_coins(funding, amounts)?;
        for (piece, recipient) in pieces.iter().zip(recipients) {
            self.transfer_objects(vec![*piece], *recipient)?;
        }
        Ok(pieces)
    }

    fn push_input(&mut self, input: CallArg) -> EngineResult<Argument> {
        let index = u16::try_from(self.payload.inputs.len())
            .map_err(|_| EngineError::InvalidArgument("too many transaction inputs".into()))?;
        self.payload.inputs.push(input);
        Ok(Argument::Input(index))
    }

    fn push_operation(&mut self, operation: Operation) -> EngineResult<u16> {
        let index = u16::try_from(self.payload.operations.len())
            .map_err(|_| EngineError::InvalidArgument("too many transaction operations".into()))?;
        self.payload.operations.push(operation);
        Ok(index)
    }

    fn ensure_open(&self) -> EngineResult<()> {
        if self.finalized {
            Err(EngineError::PayloadFinalized)
        } else {
            Ok(())
        }
    }
}

fn check_pairing(recipients: &[SuiAddress], amounts: &[u64]) -> EngineResult<()> {
    if recipients.len() != amounts.len() {
        return Err(EngineError::LengthMismatch {
            recipients: recipients.len(),
            amounts: amounts.len(),
        });
    }
    if recipients.is_empty() {
        return Err(EngineError::InvalidArgument("no recipients given".into()));
    }
    Ok(())
}

fn parse_call_target(target: &str) -> EngineResult<(ObjectId, String, String)> {
    let mut parts = target.trim().split("::");
    let (Some(package), Some(module), Some(function), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(EngineError::InvalidArgument(format!(
            "move call target `{target}` must look like `package::module::function`"
        )));
    };
    let package: ObjectId = package.parse().map_err(EngineError::InvalidArgument)?;
    for ident in [module, function] {
        if !is_identifier(ident) {
            return Err(EngineError::InvalidArgument(format!(
                "`{ident}` in move call target `{target}` is not a valid identifier"
            )));
        }
    }
    Ok((package, module.to_string(), function.to_string()))
}

fn is_identifier(value: &str) -> bool {
    let mut chars = value.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    }
}
