use anyhow::{Result, anyhow};
use futures::future::try_join_all;
use tracing::{info, warn};

use crate::cli::args::{
    AddressCmd, BalanceCmd, Cli, CoinsCmd, Command, MultisigCmd, MultisigCombineCmd,
    MultisigTransferCmd, NewMnemonicCmd, PayCmd, PolicyArgs, PublishCmd, SignCmd, StakeCmd,
    TransferCmd,
};
use crate::cli::context::{build_engine, decode_tx_bytes, init_configs, parse_policy};
use crate::config::KeplerConfig;
use crate::crypto::SuiSignature;
use crate::engine::{Engine, TransactionBuilder};
use crate::multisig::{MultiSigAggregator, WeightedSignature};
use crate::rpc::TransactionResponse;
use crate::types::CoinType;
use crate::wallet::{DerivationPath, generate_mnemonic};

const MIST_PER_SUI: u128 = 1_000_000_000;

pub async fn run(cli: Cli, config: KeplerConfig) -> Result<()> {
    if config.monitoring.prometheus.enable {
        crate::monitoring::try_init_prometheus(&config.monitoring.prometheus.listen)?;
    }

    match cli.command {
        Command::Init(args) => init_configs(args),
        Command::NewMnemonic(args) => new_mnemonic(args),
        Command::Multisig(MultisigCmd::Address(policy)) => multisig_address(&policy),
        command => {
            let engine = build_engine(&config)?;
            dispatch(&engine, command).await
        }
    }
}

async fn dispatch(engine: &Engine, command: Command) -> Result<()> {
    match command {
        Command::Address(args) => show_addresses(engine, args),
        Command::Balance(args) => show_balance(engine, args).await,
        Command::Coins(args) => show_coins(engine, args).await,
        Command::Transfer(args) => transfer(engine, args).await,
        Command::Pay(args) => pay(engine, args).await,
        Command::Stake(args) => stake(engine, args).await,
        Command::Publish(args) => publish(engine, args).await,
        Command::Sign(args) => sign(engine, args).await,
        Command::Multisig(MultisigCmd::Transfer(args)) => multisig_transfer(engine, args).await,
        Command::Multisig(MultisigCmd::Combine(args)) => multisig_combine(engine, args).await,
        Command::Multisig(MultisigCmd::Address(policy)) => multisig_address(&policy),
        Command::NewMnemonic(args) => new_mnemonic(args),
        Command::Init(args) => init_configs(args),
    }
}

fn start_path(engine: &Engine, path: Option<&DerivationPath>) -> DerivationPath {
    path.copied().unwrap_or_else(|| engine.current_path())
}

/// 从起始路径开始按地址索引连续展开。
fn expand_paths(start: DerivationPath, count: u32) -> Result<Vec<DerivationPath>> {
    (0..count.max(1))
        .map(|offset| {
            let index = start
                .address_index
                .checked_add(offset)
                .ok_or_else(|| anyhow!("地址索引超出范围"))?;
            Ok(DerivationPath::new(start.account, start.is_external, index))
        })
        .collect()
}

fn show_addresses(engine: &Engine, args: AddressCmd) -> Result<()> {
    let start = start_path(engine, args.account.path());
    for path in expand_paths(start, args.count.unwrap_or(1))? {
        println!("{path}  {}", engine.address_at(&path)?);
    }
    Ok(())
}

async fn show_balance(engine: &Engine, args: BalanceCmd) -> Result<()> {
    if let Some(path) = args.account.path {
        engine.switch_account(path)?;
    }

    if args.all {
        for balance in engine.get_all_balances().await? {
            println!(
                "{}  {}  ({} 个对象)",
                balance.coin_type,
                format_amount(&balance.coin_type, balance.total_balance),
                balance.coin_object_count
            );
        }
        return Ok(());
    }

    let coin_type = args.coin_type.unwrap_or_default();
    let paths = expand_paths(engine.current_path(), args.count.unwrap_or(1))?;
    let lookups = paths.iter().map(|path| {
        let coin_type = &coin_type;
        async move {
            let owner = engine.address_at(path)?;
            let balance = engine.chain().get_balance(owner, Some(coin_type)).await?;
            anyhow::Ok((*path, owner, balance))
        }
    });
    for (path, owner, balance) in try_join_all(lookups).await? {
        println!(
            "{path}  {owner}  {}",
            format_amount(&coin_type, balance.total_balance)
        );
    }
    Ok(())
}

async fn show_coins(engine: &Engine, args: CoinsCmd) -> Result<()> {
    if let Some(path) = args.account.path {
        engine.switch_account(path)?;
    }
    let coin_type = args.coin_type.unwrap_or_default();
    let coins = engine.get_coins(&coin_type).await?;
    if coins.is_empty() {
        println!("{} 名下没有 {coin_type}", engine.current_address()?);
        return Ok(());
    }
    for coin in &coins {
        println!(
            "{}  v{}  {}",
            coin.id(),
            coin.object_ref.version,
            format_amount(&coin.coin_type, u128::from(coin.balance))
        );
    }
    Ok(())
}

async fn transfer(engine: &Engine, args: TransferCmd) -> Result<()> {
    let coin_type = args.coin_type.unwrap_or_default();
    let path = args.account.path();

    if args.dry_run {
        if !coin_type.is_sui() {
            return Err(anyhow!("dry-run 目前只支持 SUI 转账"));
        }
        let mut builder = TransactionBuilder::new();
        builder.transfer_sui(args.to, args.amount)?;
        let results = engine.dev_inspect(builder, path).await?;
        println!("模拟状态: {:?}", results.effects.status);
        println!(
            "gas: computation {} storage {} rebate {}",
            results.effects.gas_used.computation_cost,
            results.effects.gas_used.storage_cost,
            results.effects.gas_used.storage_rebate
        );
        if let Some(error) = results.error {
            warn!(target: "cli", %error, "dev-inspect 返回错误");
        }
        return Ok(());
    }

    let response = engine
        .transfer_coin(&coin_type, args.to, args.amount, path)
        .await?;
    report(&response);
    Ok(())
}

async fn pay(engine: &Engine, args: PayCmd) -> Result<()> {
    let coin_type = args.coin_type.unwrap_or_default();
    let response = engine
        .transfer_coin_to_many(
            &coin_type,
            &args.recipients,
            &args.amounts,
            args.account.path(),
        )
        .await?;
    report(&response);
    Ok(())
}

async fn stake(engine: &Engine, args: StakeCmd) -> Result<()> {
    let response = engine
        .stake_sui(args.amount, args.validator, args.account.path())
        .await?;
    report(&response);
    Ok(())
}

async fn publish(engine: &Engine, args: PublishCmd) -> Result<()> {
    let outcome = engine
        .publish_package(&args.package, args.account.path())
        .await?;
    println!("package: {}", outcome.package_id);
    if let Some(cap) = outcome.upgrade_cap {
        println!("upgrade cap: {cap}");
    }
    println!("digest: {}", outcome.digest);
    Ok(())
}

async fn sign(engine: &Engine, args: SignCmd) -> Result<()> {
    let tx_bytes = decode_tx_bytes(&args.tx_bytes)?;
    let signed = engine
        .sign_transaction(tx_bytes, args.account.path())
        .await?;
    for signature in &signed.signatures {
        println!("{}", signature.to_base64()?);
    }
    Ok(())
}

fn multisig_address(policy: &PolicyArgs) -> Result<()> {
    let policy = parse_policy(policy)?;
    println!("{}", policy.address());
    Ok(())
}

async fn multisig_transfer(engine: &Engine, args: MultisigTransferCmd) -> Result<()> {
    let policy = parse_policy(&args.policy)?;
    let mut builder = TransactionBuilder::new();
    builder.transfer_sui(args.to, args.amount)?;
    let tx_bytes = engine.prepare_for(builder, policy.address()).await?;
    println!("{}", base64_encode(&tx_bytes));
    Ok(())
}

async fn multisig_combine(engine: &Engine, args: MultisigCombineCmd) -> Result<()> {
    let policy = parse_policy(&args.policy)?;
    let tx_bytes = decode_tx_bytes(&args.tx_bytes)?;
    let aggregator = MultiSigAggregator::new(policy);

    let mut weighted = Vec::with_capacity(args.signatures.len());
    for raw in &args.signatures {
        match SuiSignature::from_base64(raw)? {
            SuiSignature::Ed25519(signature) => {
                weighted.push(WeightedSignature::from_ed25519(&signature, aggregator.policy())?);
            }
            SuiSignature::MultiSig(_) => {
                return Err(anyhow!("成员签名必须是单签 ed25519 签名"));
            }
        }
    }

    let authorization = aggregator.combine(&weighted)?;
    authorization.verify(&tx_bytes)?;
    println!("{}", authorization.to_base64()?);

    if args.execute {
        let response = engine.execute_multisig(tx_bytes, authorization).await?;
        report(&response);
    }
    Ok(())
}

fn new_mnemonic(args: NewMnemonicCmd) -> Result<()> {
    let phrase = generate_mnemonic(args.words)?;
    println!("{}", phrase.as_str());
    Ok(())
}

fn report(response: &TransactionResponse) {
    let success = response.status().map(|status| status.is_success());
    info!(
        target: "cli",
        digest = %response.digest,
        ?success,
        "交易已提交"
    );
    println!("digest: {}", response.digest);
    for change in response.balance_changes.as_deref().unwrap_or_default() {
        println!("  {:?}  {}  {}", change.owner, change.coin_type, change.amount);
    }
}

fn base64_encode(bytes: &[u8]) -> String {
    use base64::{Engine as _, engine::general_purpose};
    general_purpose::STANDARD.encode(bytes)
}

/// SUI 以 9 位小数展示，其它代币原样输出最小单位。
fn format_amount(coin_type: &CoinType, amount: u128) -> String {
    if !coin_type.is_sui() {
        return amount.to_string();
    }
    let whole = amount / MIST_PER_SUI;
    let fraction = amount % MIST_PER_SUI;
    if fraction == 0 {
        return format!("{whole} SUI");
    }
    let fraction = format!("{fraction:09}");
    format!("{whole}.{} SUI", fraction.trim_end_matches('0'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_sui_amounts() {
        let sui = CoinType::sui();
        assert_eq!(format_amount(&sui, 0), "0 SUI");
        assert_eq!(format_amount(&sui, 1_500_000_000), "1.5 SUI");
        assert_eq!(format_amount(&sui, 1), "0.000000001 SUI");
        let other = CoinType::new("0xabc::usdc::USDC").unwrap();
        assert_eq!(format_amount(&other, 1_500_000), "1500000");
    }

    #[test]
    fn expands_consecutive_indices() {
        let paths = expand_paths(DerivationPath::new(1, false, 4), 3).unwrap();
        let indices: Vec<u32> = paths.iter().map(|path| path.address_index).collect();
        assert_eq!(indices, vec![4, 5, 6]);
        assert!(paths.iter().all(|path| path.account == 1 && !path.is_external));
        assert_eq!(expand_paths(DerivationPath::default(), 0).unwrap().len(), 1);
        assert!(expand_paths(DerivationPath::new(0, false, u32::MAX), 2).is_err());
    }
}
