use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::types::{CoinType, SuiAddress};
use crate::wallet::DerivationPath;

#[derive(Parser, Debug)]
#[command(name = "kepler", version, about = "Sui 链上账户、转账、多签与合约发布工具")]
pub struct Cli {
    #[arg(
        short,
        long,
        value_name = "FILE",
        help = "配置文件路径（默认查找 kepler.yaml 或 config/kepler.yaml）"
    )]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// 显示当前或指定派生路径的地址
    Address(AddressCmd),
    /// 查询余额
    Balance(BalanceCmd),
    /// 列出持有的代币对象
    Coins(CoinsCmd),
    /// 向单个地址转账
    Transfer(TransferCmd),
    /// 一笔交易向多个地址转账
    Pay(PayCmd),
    /// 质押 SUI 给验证者
    Stake(StakeCmd),
    /// 构建并发布 Move 合约包
    Publish(PublishCmd),
    /// 对 base64 交易字节签名（多签成员使用）
    Sign(SignCmd),
    /// 多签相关命令
    #[command(subcommand)]
    Multisig(MultisigCmd),
    /// 生成新的助记词
    #[command(name = "new-mnemonic")]
    NewMnemonic(NewMnemonicCmd),
    /// 初始化配置模版文件
    Init(InitCmd),
}

#[derive(Args, Debug, Clone, Copy, Default)]
pub struct AccountArgs {
    #[arg(
        long,
        value_name = "PATH",
        value_parser = parse_derivation_path,
        help = "派生路径，例如 m/44'/784'/0'/0'/1'（默认使用配置中的路径）"
    )]
    pub path: Option<DerivationPath>,
}

impl AccountArgs {
    pub fn path(&self) -> Option<&DerivationPath> {
        self.path.as_ref()
    }
}

#[derive(Args, Debug)]
pub struct AddressCmd {
    #[command(flatten)]
    pub account: AccountArgs,
    #[arg(long, value_name = "N", help = "从起始路径开始连续列出 N 个地址索引")]
    pub count: Option<u32>,
}

#[derive(Args, Debug)]
pub struct BalanceCmd {
    #[command(flatten)]
    pub account: AccountArgs,
    #[arg(long, value_name = "TYPE", help = "代币类型（默认 SUI）")]
    pub coin_type: Option<CoinType>,
    #[arg(long, help = "列出所有代币类型的余额", conflicts_with = "coin_type")]
    pub all: bool,
    #[arg(
        long,
        value_name = "N",
        help = "并发查询从起始路径开始的 N 个地址索引",
        conflicts_with = "all"
    )]
    pub count: Option<u32>,
}

#[derive(Args, Debug)]
pub struct CoinsCmd {
    #[command(flatten)]
    pub account: AccountArgs,
    #[arg(long, value_name = "TYPE", help = "代币类型（默认 SUI）")]
    pub coin_type: Option<CoinType>,
}

#[derive(Args, Debug)]
pub struct TransferCmd {
    #[command(flatten)]
    pub account: AccountArgs,
    #[arg(long, value_name = "ADDRESS")]
    pub to: SuiAddress,
    #[arg(long, value_name = "AMOUNT", help = "最小单位计的金额")]
    pub amount: u64,
    #[arg(long, value_name = "TYPE", help = "代币类型（默认 SUI）")]
    pub coin_type: Option<CoinType>,
    #[arg(long, help = "只做 dev-inspect 模拟，不提交")]
    pub dry_run: bool,
}

#[derive(Args, Debug)]
pub struct PayCmd {
    #[command(flatten)]
    pub account: AccountArgs,
    #[arg(long = "to", value_name = "ADDRESS", value_delimiter = ',', required = true)]
    pub recipients: Vec<SuiAddress>,
    #[arg(long = "amount", value_name = "AMOUNT", value_delimiter = ',', required = true)]
    pub amounts: Vec<u64>,
    #[arg(long, value_name = "TYPE", help = "代币类型（默认 SUI）")]
    pub coin_type: Option<CoinType>,
}

#[derive(Args, Debug)]
pub struct StakeCmd {
    #[command(flatten)]
    pub account: AccountArgs,
    #[arg(long, value_name = "ADDRESS")]
    pub validator: SuiAddress,
    #[arg(long, value_name = "AMOUNT")]
    pub amount: u64,
}

#[derive(Args, Debug)]
pub struct PublishCmd {
    #[command(flatten)]
    pub account: AccountArgs,
    #[arg(value_name = "PACKAGE_DIR")]
    pub package: PathBuf,
}

#[derive(Args, Debug)]
pub struct SignCmd {
    #[command(flatten)]
    pub account: AccountArgs,
    #[arg(long, value_name = "BASE64", help = "待签名的交易字节")]
    pub tx_bytes: String,
}

#[derive(Args, Debug, Clone)]
pub struct PolicyArgs {
    #[arg(
        long = "pubkey",
        value_name = "BASE64:WEIGHT",
        required = true,
        help = "成员公钥与权重，可重复；顺序即多签策略顺序"
    )]
    pub members: Vec<String>,
    #[arg(long, value_name = "WEIGHT")]
    pub threshold: u16,
}

#[derive(Subcommand, Debug)]
pub enum MultisigCmd {
    /// 计算多签地址
    Address(PolicyArgs),
    /// 以多签地址为发送方构建 SUI 转账，输出待签名字节
    Transfer(MultisigTransferCmd),
    /// 聚合成员签名，可选直接提交
    Combine(MultisigCombineCmd),
}

#[derive(Args, Debug)]
pub struct MultisigTransferCmd {
    #[command(flatten)]
    pub policy: PolicyArgs,
    #[arg(long, value_name = "ADDRESS")]
    pub to: SuiAddress,
    #[arg(long, value_name = "AMOUNT")]
    pub amount: u64,
}

#[derive(Args, Debug)]
pub struct MultisigCombineCmd {
    #[command(flatten)]
    pub policy: PolicyArgs,
    #[arg(long, value_name = "BASE64", help = "成员签名的交易字节")]
    pub tx_bytes: String,
    #[arg(long = "signature", value_name = "BASE64", required = true)]
    pub signatures: Vec<String>,
    #[arg(long, help = "聚合后立即提交")]
    pub execute: bool,
}

#[derive(Args, Debug)]
pub struct NewMnemonicCmd {
    #[arg(long, default_value_t = 12, help = "单词数，12 或 24")]
    pub words: usize,
}

#[derive(Args, Debug)]
pub struct InitCmd {
    #[arg(long, value_name = "DIR", help = "可选输出目录（默认当前目录）")]
    pub output: Option<PathBuf>,
    #[arg(long, help = "若文件存在则覆盖")]
    pub force: bool,
}

fn parse_derivation_path(raw: &str) -> Result<DerivationPath, String> {
    raw.parse().map_err(|err: crate::engine::EngineError| err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn pay_accepts_comma_separated_lists() {
        let cli = Cli::try_parse_from([
            "kepler",
            "pay",
            "--to",
            "0x1,0x2",
            "--amount",
            "10,20",
            "--path",
            "m/44'/784'/0'/0'/3'",
        ])
        .unwrap();
        let Command::Pay(pay) = cli.command else {
            panic!("expected pay command");
        };
        assert_eq!(pay.recipients.len(), 2);
        assert_eq!(pay.amounts, vec![10, 20]);
        assert_eq!(pay.account.path.unwrap().address_index, 3);
    }

    #[test]
    fn rejects_malformed_path() {
        let err = Cli::try_parse_from(["kepler", "address", "--path", "m/44/784"]).unwrap_err();
        assert!(err.to_string().contains("m/44/784"));
    }
}
