use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::engine::GasSettings;
use crate::publish::ToolchainSettings;
use crate::wallet::DerivationPath;

use super::loader::ConfigError;

pub const ENV_RPC_URL: &str = "KEPLER_RPC_URL";
pub const ENV_MNEMONIC: &str = "KEPLER_MNEMONIC";
pub const ENV_PRIVATE_KEY: &str = "KEPLER_PRIVATE_KEY";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KeplerConfig {
    #[serde(default)]
    pub global: GlobalConfig,
    #[serde(default)]
    pub gas: GasSettings,
    #[serde(default)]
    pub build: ToolchainSettings,
    #[serde(default)]
    pub monitoring: MonitoringConfig,
}

impl KeplerConfig {
    /// 用进程环境变量覆盖配置文件中的 RPC 与钱包字段。
    pub fn apply_env(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let lookup = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        if let Some(url) = lookup(ENV_RPC_URL) {
            let url = url.trim().to_string();
            self.global.rpc_urls.retain(|existing| existing != &url);
            self.global.rpc_urls.insert(0, url);
        }
        if let Some(mnemonic) = lookup(ENV_MNEMONIC) {
            self.global.wallet.mnemonic = Some(mnemonic);
        }
        if let Some(private_key) = lookup(ENV_PRIVATE_KEY) {
            self.global.wallet.private_key = Some(private_key);
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GlobalConfig {
    #[serde(default, deserialize_with = "super::deserialize_rpc_urls")]
    pub rpc_urls: Vec<String>,
    #[serde(default)]
    pub wallet: WalletConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    /// 单次 RPC 请求超时（毫秒）；为空表示不设超时，由调用方控制。
    #[serde(default)]
    pub request_timeout_ms: Option<u64>,
}

impl GlobalConfig {
    pub fn rpc_urls(&self) -> &[String] {
        &self.rpc_urls
    }

    pub fn primary_rpc_url(&self) -> Result<Url, ConfigError> {
        let raw = self.rpc_urls.first().ok_or_else(|| {
            ConfigError::Invalid(format!(
                "未配置 global.rpc_urls，也没有设置环境变量 {ENV_RPC_URL}"
            ))
        })?;
        let url = Url::parse(raw)
            .map_err(|err| ConfigError::Invalid(format!("RPC 地址 `{raw}` 非法: {err}")))?;
        match url.scheme() {
            "http" | "https" => Ok(url),
            other => Err(ConfigError::Invalid(format!(
                "RPC 地址 `{raw}` 的协议 {other} 不受支持"
            ))),
        }
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_ms
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WalletConfig {
    #[serde(default)]
    pub mnemonic: Option<String>,
    /// base64 / hex / JSON 数组格式的 ed25519 私钥，与 mnemonic 二选一。
    #[serde(default)]
    pub private_key: Option<String>,
    #[serde(default)]
    pub derivation: DerivationPath,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoggingProfile {
    #[default]
    Lean,
    Verbose,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "super::default_logging_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
    #[serde(default = "super::default_logging_profile")]
    pub profile: LoggingProfile,
    #[serde(default = "super::default_timezone_offset_hours")]
    pub timezone_offset_hours: i8,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: super::default_logging_level(),
            json: false,
            profile: super::default_logging_profile(),
            timezone_offset_hours: super::default_timezone_offset_hours(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MonitoringConfig {
    #[serde(default)]
    pub prometheus: PrometheusConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrometheusConfig {
    #[serde(default)]
    pub enable: bool,
    #[serde(default = "super::default_prometheus_listen")]
    pub listen: String,
}

impl Default for PrometheusConfig {
    fn default() -> Self {
        Self {
            enable: false,
            listen: super::default_prometheus_listen(),
        }
    }
}
