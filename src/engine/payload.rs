use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::crypto::transaction_digest;
use crate::types::{ObjectId, ObjectRef, SuiAddress};

use super::error::{EngineError, EngineResult};

const BINCODE: bincode::config::Configuration = bincode::config::standard();

/// 操作参数：输入、先前操作的结果或 gas 币。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Argument {
    GasCoin,
    Input(u16),
    Result(u16),
    NestedResult(u16, u16),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ObjectArg {
    ImmOrOwned(ObjectRef),
    Shared {
        object_id: ObjectId,
        initial_shared_version: u64,
        mutable: bool,
    },
}

impl ObjectArg {
    pub fn object_id(&self) -> ObjectId {
        match self {
            ObjectArg::ImmOrOwned(object) => object.object_id,
            ObjectArg::Shared { object_id, .. } => *object_id,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CallArg {
    Pure(Vec<u8>),
    Object(ObjectArg),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveCall {
    pub package: ObjectId,
    pub module: String,
    pub function: String,
    pub type_arguments: Vec<String>,
    pub arguments: Vec<Argument>,
}

impl MoveCall {
    pub fn target(&self) -> String {
        format!("{}::{}::{}", self.package, self.module, self.function)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operation {
    TransferObjects {
        objects: Vec<Argument>,
        recipient: Argument,
    },
    SplitCoins {
        coin: Argument,
        amounts: Vec<Argument>,
    },
    MergeCoins {
        destination: Argument,
        sources: Vec<Argument>,
    },
    MoveCall(MoveCall),
    Publish {
        modules: Vec<Vec<u8>>,
        dependencies: Vec<ObjectId>,
    },
}

/// 操作产出结果的数量；Move 调用的返回值个数在本地未知。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResultArity {
    Exact(usize),
    Unknown,
}

impl Operation {
    pub fn kind(&self) -> &'static str {
        match self {
            Operation::TransferObjects { .. } => "transfer",
            Operation::SplitCoins { .. } => "split",
            Operation::MergeCoins { .. } => "merge",
            Operation::MoveCall(_) => "call",
            Operation::Publish { .. } => "publish",
        }
    }

    pub fn arguments(&self) -> Vec<Argument> {
        match self {
            Operation::TransferObjects { objects, recipient } => {
                let mut args = objects.clone();
                args.push(*recipient);
                args
            }
            Operation::SplitCoins { coin, amounts } => {
                let mut args = vec![*coin];
                args.extend_from_slice(amounts);
                args
            }
            Operation::MergeCoins {
                destination,
                sources,
            } => {
                let mut args = vec![*destination];
                args.extend_from_slice(sources);
                args
            }
            Operation::MoveCall(call) => call.arguments.clone(),
            Operation::Publish { .. } => Vec::new(),
        }
    }

    pub fn result_arity(&self) -> ResultArity {
        match self {
            Operation::TransferObjects { .. } | Operation::MergeCoins { .. } => {
                ResultArity::Exact(0)
            }
            Operation::SplitCoins { amounts, .. } => ResultArity::Exact(amounts.len()),
            Operation::MoveCall(_) => ResultArity::Unknown,
            Operation::Publish { .. } => ResultArity::Exact(1),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GasConfig {
    pub payment: Vec<ObjectRef>,
    pub price: u64,
    pub budget: u64,
}

/// 待签名的交易：有序输入 + 有序操作 + gas 参数。
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionPayload {
    pub sender: SuiAddress,
    pub inputs: Vec<CallArg>,
    pub operations: Vec<Operation>,
    pub gas: GasConfig,
}

impl TransactionPayload {
    pub fn to_bytes(&self) -> EngineResult<Vec<u8>> {
        Ok(bincode::serde::encode_to_vec(self, BINCODE)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> EngineResult<Self> {
        let (payload, consumed): (Self, usize) =
            bincode::serde::decode_from_slice(bytes, BINCODE)?;
        if consumed != bytes.len() {
            return Err(EngineError::MalformedPayload(format!(
                "{} trailing bytes after payload",
                bytes.len() - consumed
            )));
        }
        Ok(payload)
    }

    pub fn digest(&self) -> EngineResult<String> {
        Ok(transaction_digest(&self.to_bytes()?))
    }

    /// 作为输入或 gas 支付出现的全部对象 ID。
    pub fn referenced_objects(&self) -> BTreeSet<ObjectId> {
        let mut ids: BTreeSet<ObjectId> = self
            .inputs
            .iter()
            .filter_map(|input| match input {
                CallArg::Object(object) => Some(object.object_id()),
                CallArg::Pure(_) => None,
            })
            .collect();
        ids.extend(self.gas.payment.iter().map(|object| object.object_id));
        ids
    }

    /// 检查引用完整性：只允许引用已存在的输入和更早操作的结果。
    pub fn validate(&self) -> EngineResult<()> {
        if self.sender.is_zero() {
            return Err(EngineError::MalformedPayload("sender not set".into()));
        }
        if self.gas.budget == 0 {
            return Err(EngineError::MalformedPayload("gas budget is zero".into()));
        }
        if self.gas.payment.is_empty() {
            return Err(EngineError::MalformedPayload(
                "gas payment has no coin objects".into(),
            ));
        }
        if self.operations.is_empty() {
            return Err(EngineError::MalformedPayload("payload has no operations".into()));
        }

        for (index, operation) in self.operations.iter().enumerate() {
            match operation {
                Operation::TransferObjects { objects, .. } if objects.is_empty() => {
                    return Err(EngineError::MalformedPayload(format!(
                        "operation #{index} transfers no objects"
                    )));
                }
                Operation::SplitCoins { amounts, .. } if amounts.is_empty() => {
                    return Err(EngineError::MalformedPayload(format!(
                        "operation #{index} splits into no amounts"
                    )));
                }
                Operation::MergeCoins { sources, .. } if sources.is_empty() => {
                    return Err(EngineError::MalformedPayload(format!(
                        "operation #{index} merges no sources"
                    )));
                }
                Operation::Publish { modules, .. } if modules.is_empty() => {
                    return Err(EngineError::MalformedPayload(format!(
                        "operation #{index} publishes no modules"
                    )));
                }
                _ => {}
            }

            for argument in operation.arguments() {
                self.check_argument(index, operation.kind(), argument)?;
            }
        }
        Ok(())
    }

    fn check_argument(&self, index: usize, kind: &str, argument: Argument) -> EngineResult<()> {
        match argument {
            Argument::GasCoin => Ok(()),
            Argument::Input(input) => {
                if usize::from(input) < self.inputs.len() {
                    Ok(())
                } else {
                    Err(EngineError::MalformedPayload(format!(
                        "{kind} operation #{index} references input {input}, only {} inputs exist",
                        self.inputs.len()
                    )))
                }
            }
            Argument::Result(source) => {
                let arity = self.earlier_arity(index, kind, source)?;
                match arity {
                    ResultArity::Exact(0) => Err(EngineError::MalformedPayload(format!(
                        "{kind} operation #{index} uses result of operation #{source}, which produces nothing"
                    ))),
                    _ => Ok(()),
                }
            }
            Argument::NestedResult(source, nested) => {
                let arity = self.earlier_arity(index, kind, source)?;
                match arity {
                    ResultArity::Exact(count) if usize::from(nested) >= count => {
                        Err(EngineError::MalformedPayload(format!(
                            "{kind} operation #{index} uses result {nested} of operation #{source}, which produces {count}"
                        )))
                    }
                    _ => Ok(()),
                }
            }
        }
    }

    fn earlier_arity(&self, index: usize, kind: &str, source: u16) -> EngineResult<ResultArity> {
        let source = usize::from(source);
        if source >= index {
            return Err(EngineError::MalformedPayload(format!(
                "{kind} operation #{index} references operation #{source}, which is not earlier"
            )));
        }
        Ok(self.operations[source].result_arity())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ObjectDigest;

    fn base_payload() -> TransactionPayload {
        TransactionPayload {
            sender: SuiAddress::random(),
            inputs: vec![CallArg::Pure(vec![1])],
            operations: Vec::new(),
            gas: GasConfig {
                payment: vec![ObjectRef::new(ObjectId::random(), 1, ObjectDigest::random())],
                price: 1_000,
                budget: 10_000_000,
            },
        }
    }

    #[test]
    fn forward_reference_is_rejected() {
        let mut payload = base_payload();
        payload.operations.push(Operation::TransferObjects {
            objects: vec![Argument::NestedResult(1, 0)],
            recipient: Argument::Input(0),
        });
        payload.operations.push(Operation::SplitCoins {
            coin: Argument::GasCoin,
            amounts: vec![Argument::Input(0)],
        });
        let err = payload.validate().unwrap_err();
        assert!(matches!(err, EngineError::MalformedPayload(msg) if msg.contains("not earlier")));
    }

    #[test]
    fn nested_result_beyond_split_count_is_rejected() {
        let mut payload = base_payload();
        payload.operations.push(Operation::SplitCoins {
            coin: Argument::GasCoin,
            amounts: vec![Argument::Input(0)],
        });
        payload.operations.push(Operation::TransferObjects {
            objects: vec![Argument::NestedResult(0, 1)],
            recipient: Argument::Input(0),
        });
        assert!(matches!(
            payload.validate(),
            Err(EngineError::MalformedPayload(_))
        ));
    }

    #[test]
    fn dangling_input_and_empty_result_are_rejected() {
        let mut payload = base_payload();
        payload.operations.push(Operation::MergeCoins {
            destination: Argument::GasCoin,
            sources: vec![Argument::Input(3)],
        });
        assert!(payload.validate().is_err());

        let mut payload = base_payload();
        payload.operations.push(Operation::MergeCoins {
            destination: Argument::GasCoin,
            sources: vec![Argument::Input(0)],
        });
        payload.operations.push(Operation::TransferObjects {
            objects: vec![Argument::Result(0)],
            recipient: Argument::Input(0),
        });
        assert!(payload.validate().is_err());
    }

    #[test]
    fn move_call_results_are_not_bounded_locally() {
        let mut payload = base_payload();
        payload.operations.push(Operation::MoveCall(MoveCall {
            package: ObjectId::from_low_u64(2),
            module: "coin".into(),
            function: "zero".into(),
            type_arguments: vec![],
            arguments: vec![],
        }));
        payload.operations.push(Operation::TransferObjects {
            objects: vec![Argument::NestedResult(0, 4)],
            recipient: Argument::Input(0),
        });
        payload.validate().expect("unknown arity accepted");
    }

    #[test]
    fn bytes_decode_back_to_same_payload() {
        let mut payload = base_payload();
        payload.operations.push(Operation::SplitCoins {
            coin: Argument::GasCoin,
            amounts: vec![Argument::Input(0)],
        });
        let bytes = payload.to_bytes().unwrap();
        assert_eq!(TransactionPayload::from_bytes(&bytes).unwrap(), payload);

        let mut padded = bytes.clone();
        padded.push(0);
        assert!(TransactionPayload::from_bytes(&padded).is_err());
    }
}
