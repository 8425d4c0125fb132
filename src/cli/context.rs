use std::fs;
use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use base64::{Engine as _, engine::general_purpose};
use time::{UtcOffset, macros::format_description};
use tracing::info;
use tracing_subscriber::fmt::time::OffsetTime;
use tracing_subscriber::{EnvFilter, fmt};

use crate::config::{KeplerConfig, LoggingConfig, LoggingProfile};
use crate::crypto::SuiPublicKey;
use crate::engine::{Engine, EngineSettings};
use crate::multisig::MultiSigPolicy;
use crate::rpc::{ChainClient, JsonRpcClient};
use crate::wallet::{AddressSource, KeypairAddressSource, MnemonicAddressSource};

use super::args::PolicyArgs;

/// 初始化 tracing，兼顾 JSON 与文本输出模式。
pub fn init_tracing(config: &LoggingConfig) -> Result<()> {
    let mut filter = EnvFilter::try_new(&config.level).unwrap_or_else(|_| EnvFilter::new("info"));

    if matches!(config.profile, LoggingProfile::Lean) {
        const QUIET_TARGETS: &[(&str, &str)] = &[
            ("hyper", "warn"),
            ("hyper_util::client::legacy", "warn"),
            ("reqwest", "info"),
            ("rustls", "warn"),
        ];
        for (module, level) in QUIET_TARGETS {
            if !config.level.contains(module) {
                if let Ok(directive) = format!("{module}={level}").parse() {
                    filter = filter.add_directive(directive);
                }
            }
        }
    }

    if matches!(config.profile, LoggingProfile::Verbose) {
        const VERBOSE_TARGETS: &[(&str, &str)] = &[
            ("engine::builder", "debug"),
            ("engine::orchestrator", "debug"),
            ("multisig", "debug"),
            ("rpc", "debug"),
        ];
        for (module, level) in VERBOSE_TARGETS {
            if let Ok(directive) = format!("{module}={level}").parse() {
                filter = filter.add_directive(directive);
            }
        }
    }

    let time_format =
        format_description!("[year]-[month]-[day] [hour]:[minute]:[second].[subsecond digits:3]");
    let offset = UtcOffset::from_hms(config.timezone_offset_hours, 0, 0).map_err(|err| {
        anyhow!(
            "invalid logging timezone offset {}: {err}",
            config.timezone_offset_hours
        )
    })?;
    let offset_timer = OffsetTime::new(offset, time_format);

    let base = fmt()
        .with_timer(offset_timer)
        .with_writer(std::io::stderr)
        .with_file(false)
        .with_line_number(false)
        .with_thread_ids(false)
        .with_target(true)
        .with_level(true);

    if config.json {
        base.json()
            .with_current_span(false)
            .with_span_list(false)
            .with_env_filter(filter)
            .try_init()
            .map_err(|err| anyhow!(err.to_string()))?;
    } else {
        base.with_env_filter(filter)
            .event_format(fmt::format().compact())
            .try_init()
            .map_err(|err| anyhow!(err.to_string()))?;
    }
    Ok(())
}

/// 按配置选择钱包来源：助记词优先，其次单私钥。
pub fn build_wallet(config: &KeplerConfig) -> Result<Arc<dyn AddressSource>> {
    let wallet = &config.global.wallet;
    let mnemonic = wallet
        .mnemonic
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty());
    let private_key = wallet
        .private_key
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty());

    let source: Arc<dyn AddressSource> = match (mnemonic, private_key) {
        (Some(phrase), _) => Arc::new(MnemonicAddressSource::from_phrase(phrase)?),
        (None, Some(secret)) => Arc::new(KeypairAddressSource::from_secret(secret)?),
        (None, None) => {
            return Err(anyhow!(
                "未配置钱包：请设置 global.wallet.mnemonic / private_key，或环境变量 {} / {}",
                crate::config::ENV_MNEMONIC,
                crate::config::ENV_PRIVATE_KEY
            ));
        }
    };
    info!(target: "wallet", kind = source.kind(), "钱包来源已加载");
    Ok(source)
}

pub fn build_chain_client(config: &KeplerConfig) -> Result<Arc<dyn ChainClient>> {
    let url = config.global.primary_rpc_url()?;
    let http = reqwest::Client::builder()
        .build()
        .context("failed to build http client")?;
    let client = JsonRpcClient::new(url.as_str(), http)
        .with_request_timeout(config.global.request_timeout());
    info!(target: "rpc", endpoint = %url, "RPC 客户端已就绪");
    Ok(Arc::new(client))
}

pub fn build_engine(config: &KeplerConfig) -> Result<Engine> {
    let wallet = build_wallet(config)?;
    let chain = build_chain_client(config)?;
    let settings = EngineSettings {
        gas: config.gas.clone(),
        toolchain: config.build.clone(),
        default_path: config.global.wallet.derivation,
    };
    Ok(Engine::new(wallet, chain, settings))
}

/// 解析 `--pubkey base64:weight` 列表与门限为多签策略。
pub fn parse_policy(args: &PolicyArgs) -> Result<MultiSigPolicy> {
    let mut keys = Vec::with_capacity(args.members.len());
    for member in &args.members {
        let (key, weight) = member
            .rsplit_once(':')
            .ok_or_else(|| anyhow!("成员 `{member}` 缺少权重，格式应为 BASE64:WEIGHT"))?;
        let public_key: SuiPublicKey = key
            .parse()
            .with_context(|| format!("成员公钥 `{key}` 非法"))?;
        let weight: u8 = weight
            .trim()
            .parse()
            .with_context(|| format!("成员权重 `{weight}` 非法"))?;
        keys.push((public_key, weight));
    }
    Ok(MultiSigPolicy::new(keys, args.threshold)?)
}

pub fn decode_tx_bytes(raw: &str) -> Result<Vec<u8>> {
    general_purpose::STANDARD
        .decode(raw.trim())
        .context("交易字节不是合法的 base64")
}

pub fn init_configs(args: crate::cli::args::InitCmd) -> Result<()> {
    let output_dir = match args.output {
        Some(dir) => dir,
        None => std::env::current_dir()?,
    };

    fs::create_dir_all(&output_dir)?;

    let templates: [(&str, &str); 1] = [(
        "kepler.yaml",
        include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/kepler.yaml")),
    )];

    for (filename, contents) in templates {
        let target_path = output_dir.join(filename);
        if target_path.exists() && !args.force {
            println!(
                "跳过 {}（文件已存在，如需覆盖请加 --force）",
                target_path.display()
            );
            continue;
        }

        fs::write(&target_path, contents)?;
        println!("已写入 {}", target_path.display());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::args::InitCmd;
    use crate::crypto::SuiKeyPair;

    #[test]
    fn init_configs_respects_force() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("kepler.yaml");
        fs::write(&target, "custom: true\n").unwrap();

        init_configs(InitCmd {
            output: Some(dir.path().to_path_buf()),
            force: false,
        })
        .unwrap();
        assert_eq!(fs::read_to_string(&target).unwrap(), "custom: true\n");

        init_configs(InitCmd {
            output: Some(dir.path().to_path_buf()),
            force: true,
        })
        .unwrap();
        assert!(fs::read_to_string(&target).unwrap().contains("rpc_urls"));
    }

    #[test]
    fn policy_arguments_are_parsed_in_order() {
        let a = SuiKeyPair::generate().public_key();
        let b = SuiKeyPair::generate().public_key();
        let args = PolicyArgs {
            members: vec![format!("{}:1", a.to_base64()), format!("{}:2", b.to_base64())],
            threshold: 2,
        };
        let policy = parse_policy(&args).unwrap();
        assert_eq!(policy.position_of(&b), Some(1));
        assert_eq!(policy.weight_of(&b), Some(2));

        let missing_weight = PolicyArgs {
            members: vec![a.to_base64()],
            threshold: 1,
        };
        assert!(parse_policy(&missing_weight).is_err());
    }

    #[test]
    fn wallet_requires_a_secret() {
        let config = KeplerConfig::default();
        assert!(build_wallet(&config).is_err());

        let mut config = KeplerConfig::default();
        config.global.wallet.private_key = Some(SuiKeyPair::generate().export_base64().to_string());
        let wallet = build_wallet(&config).unwrap();
        assert_eq!(wallet.kind(), "keypair");
    }
}
