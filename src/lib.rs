//! Sui 风格对象账本的客户端工具集：选币、交易构建、多签、合约发布与编排。

pub mod cli;
pub mod config;
pub mod crypto;
pub mod engine;
pub mod monitoring;
pub mod multisig;
pub mod publish;
pub mod rpc;
pub mod types;
pub mod wallet;
