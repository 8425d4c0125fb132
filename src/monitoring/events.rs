use std::time::Duration;

use metrics::{counter, histogram};
use tracing::{debug, info, warn};

use crate::types::{CoinType, SuiAddress};

use super::metrics::prometheus_enabled;

fn outcome_label(ok: bool) -> &'static str {
    if ok { "ok" } else { "error" }
}

pub fn rpc_call(method: &str, elapsed: Duration, ok: bool) {
    let latency_ms = elapsed.as_secs_f64() * 1_000.0;
    debug!(
        target: "monitoring::rpc",
        event = "rpc_call",
        method,
        latency_ms,
        ok,
        "json-rpc call finished"
    );

    if prometheus_enabled() {
        let method = method.to_string();
        counter!(
            "kepler_rpc_requests_total",
            "method" => method.clone(),
            "result" => outcome_label(ok)
        )
        .increment(1);
        histogram!("kepler_rpc_latency_ms", "method" => method).record(latency_ms);
    }
}

pub fn coin_selection(
    owner: &SuiAddress,
    coin_type: &CoinType,
    requested: u64,
    selected: usize,
    total: u128,
) {
    debug!(
        target: "monitoring::selector",
        event = "coin_selection",
        owner = %owner,
        coin_type = %coin_type,
        requested,
        selected,
        total = %total,
        "coins selected"
    );

    if prometheus_enabled() {
        counter!(
            "kepler_coin_selection_total",
            "coin_type" => coin_type.to_string()
        )
        .increment(1);
    }
}

pub fn transaction_submitted(
    sender: &SuiAddress,
    digest: &str,
    success: bool,
    elapsed: Duration,
) {
    let latency_ms = elapsed.as_secs_f64() * 1_000.0;
    if success {
        info!(
            target: "monitoring::transaction",
            event = "submitted",
            sender = %sender,
            digest,
            latency_ms,
            "交易执行成功"
        );
    } else {
        warn!(
            target: "monitoring::transaction",
            event = "submitted",
            sender = %sender,
            digest,
            latency_ms,
            "交易已上链但执行失败"
        );
    }

    if prometheus_enabled() {
        counter!(
            "kepler_transactions_total",
            "result" => if success { "success" } else { "failure" }
        )
        .increment(1);
        histogram!("kepler_transaction_latency_ms").record(latency_ms);
    }
}

pub fn transaction_rejected(sender: &SuiAddress, reason: &str) {
    warn!(
        target: "monitoring::transaction",
        event = "rejected",
        sender = %sender,
        reason,
        "交易被节点拒绝"
    );

    if prometheus_enabled() {
        counter!("kepler_transactions_total", "result" => "rejected").increment(1);
    }
}

pub fn publish_stage(from: &'static str, to: &'static str) {
    info!(
        target: "monitoring::publish",
        event = "stage",
        from,
        to,
        "发布阶段切换"
    );

    if prometheus_enabled() {
        counter!("kepler_publish_stage_total", "stage" => to).increment(1);
    }
}

pub fn build_finished(package: &str, modules: usize, elapsed: Duration, ok: bool) {
    let duration_ms = elapsed.as_secs_f64() * 1_000.0;
    if ok {
        info!(
            target: "monitoring::publish",
            event = "build",
            package,
            modules,
            duration_ms,
            "合约构建完成"
        );
    } else {
        warn!(
            target: "monitoring::publish",
            event = "build",
            package,
            duration_ms,
            "合约构建失败"
        );
    }

    if prometheus_enabled() {
        histogram!("kepler_build_duration_ms", "result" => outcome_label(ok)).record(duration_ms);
    }
}

pub fn multisig_combined(address: &SuiAddress, signers: usize, weight: u32, threshold: u16) {
    info!(
        target: "monitoring::multisig",
        event = "combined",
        address = %address,
        signers,
        weight,
        threshold,
        "多签聚合完成"
    );

    if prometheus_enabled() {
        counter!("kepler_multisig_combined_total").increment(1);
    }
}

pub fn account_switched(path: &str, address: &SuiAddress) {
    info!(
        target: "monitoring::wallet",
        event = "account_switched",
        path,
        address = %address,
        "切换派生账户"
    );
}
