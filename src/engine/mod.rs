//! 交易组装、选币、签名与提交。

pub mod builder;
pub mod error;
pub mod input;
pub mod orchestrator;
pub mod payload;
pub mod selector;
pub mod submission;

pub use builder::TransactionBuilder;
pub use error::{EngineError, EngineResult};
pub use input::TransactionInput;
pub use orchestrator::{Engine, EngineSettings};
pub use payload::{
    Argument, CallArg, GasConfig, MoveCall, ObjectArg, Operation, TransactionPayload,
};
pub use selector::{CoinSelector, SelectionResult};
pub use submission::GasSettings;
