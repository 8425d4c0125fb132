use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Context, Result};
use metrics::{Unit, describe_counter, describe_histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use once_cell::sync::OnceCell;
use tracing::info;

static EXPORTER: OnceCell<SocketAddr> = OnceCell::new();
static PROMETHEUS_ENABLED: AtomicBool = AtomicBool::new(false);

/// 安装 Prometheus exporter，重复调用返回首次安装的监听地址。
pub fn try_init_prometheus(listen: &str) -> Result<SocketAddr> {
    EXPORTER
        .get_or_try_init(|| {
            let addr: SocketAddr = listen
                .parse()
                .with_context(|| format!("invalid prometheus listen address: {listen}"))?;
            PrometheusBuilder::new()
                .with_http_listener(addr)
                .install()
                .context("failed to install prometheus exporter")?;
            describe();
            PROMETHEUS_ENABLED.store(true, Ordering::Relaxed);
            info!(target: "monitoring", %addr, "prometheus exporter 已启动");
            Ok(addr)
        })
        .copied()
}

pub fn prometheus_enabled() -> bool {
    PROMETHEUS_ENABLED.load(Ordering::Relaxed)
}

fn describe() {
    describe_counter!("kepler_rpc_requests_total", "JSON-RPC 请求次数");
    describe_histogram!(
        "kepler_rpc_latency_ms",
        Unit::Milliseconds,
        "JSON-RPC 请求耗时"
    );
    describe_counter!("kepler_coin_selection_total", "选币次数");
    describe_counter!("kepler_transactions_total", "交易提交次数");
    describe_histogram!(
        "kepler_transaction_latency_ms",
        Unit::Milliseconds,
        "交易从签名到返回的耗时"
    );
    describe_counter!("kepler_publish_stage_total", "发布流程阶段切换");
    describe_histogram!(
        "kepler_build_duration_ms",
        Unit::Milliseconds,
        "合约构建耗时"
    );
    describe_counter!("kepler_multisig_combined_total", "多签聚合次数");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_listen_address_is_reported() {
        let err = try_init_prometheus("not-an-address").unwrap_err();
        assert!(err.to_string().contains("invalid prometheus listen address"));
        assert!(!prometheus_enabled());
    }
}
