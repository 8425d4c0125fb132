use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose};
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::{debug, info};

use crate::monitoring::events;
use crate::types::{Coin, CoinType, SuiAddress};

use super::ChainClient;
use super::error::RpcError;
use super::types::{
    Balance, CoinPage, DevInspectResults, ExecuteOptions, SignedTransaction, TransactionResponse,
};

/// 单页最多拉取的代币数量（节点上限为 50）。
const COIN_PAGE_LIMIT: usize = 50;

/// JSON-RPC 2.0 全节点客户端，只做透传。
#[derive(Clone, Debug)]
pub struct JsonRpcClient {
    url: String,
    client: reqwest::Client,
    request_timeout: Option<Duration>,
    next_id: Arc<AtomicU64>,
}

impl JsonRpcClient {
    pub fn new(url: impl Into<String>, client: reqwest::Client) -> Self {
        Self {
            url: url.into(),
            client,
            request_timeout: None,
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }

    pub fn with_request_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.request_timeout = timeout;
        self
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T, RpcError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });
        let start = Instant::now();
        let outcome = self.send(method, &body).await;
        events::rpc_call(method, start.elapsed(), outcome.is_ok());
        outcome
    }

    async fn send<T: DeserializeOwned>(&self, method: &str, body: &Value) -> Result<T, RpcError> {
        let mut request = self.client.post(&self.url).json(body);
        if let Some(timeout) = self.request_timeout {
            request = request.timeout(timeout);
        }
        let response = request.send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RpcError::ApiStatus {
                endpoint: self.url.clone(),
                status,
                body,
            });
        }

        let mut envelope: Value = response.json().await?;
        if let Some(error) = envelope.get("error") {
            let code = error.get("code").and_then(Value::as_i64).unwrap_or_default();
            let message = error
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("unknown error")
                .to_string();
            debug!(target: "rpc", method, code, %message, "json-rpc error");
            return Err(RpcError::JsonRpc {
                method: method.to_string(),
                code,
                message,
            });
        }

        let result = envelope
            .get_mut("result")
            .map(Value::take)
            .ok_or_else(|| RpcError::Schema(format!("{method} response has no result")))?;
        Ok(serde_json::from_value(result)?)
    }
}

#[async_trait]
impl ChainClient for JsonRpcClient {
    fn endpoint(&self) -> String {
        self.url.clone()
    }

    async fn get_balance(
        &self,
        owner: SuiAddress,
        coin_type: Option<&CoinType>,
    ) -> Result<Balance, RpcError> {
        let coin_type = coin_type.cloned().unwrap_or_default();
        self.call(
            "suix_getBalance",
            json!([owner.to_string(), coin_type.to_string()]),
        )
        .await
    }

    async fn get_all_balances(&self, owner: SuiAddress) -> Result<Vec<Balance>, RpcError> {
        self.call("suix_getAllBalances", json!([owner.to_string()]))
            .await
    }

    async fn list_owned_objects(
        &self,
        owner: SuiAddress,
        coin_type: &CoinType,
    ) -> Result<Vec<Coin>, RpcError> {
        let mut coins = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            let page: CoinPage = self
                .call(
                    "suix_getCoins",
                    json!([
                        owner.to_string(),
                        coin_type.to_string(),
                        cursor,
                        COIN_PAGE_LIMIT
                    ]),
                )
                .await?;
            coins.extend(page.data.into_iter().map(Coin::from));
            match (page.has_next_page, page.next_cursor) {
                (true, Some(next)) => cursor = Some(next),
                (true, None) => {
                    return Err(RpcError::Schema(
                        "suix_getCoins reported another page without a cursor".into(),
                    ));
                }
                (false, _) => break,
            }
        }
        debug!(
            target: "rpc",
            owner = %owner,
            coin_type = %coin_type,
            count = coins.len(),
            "owned coins listed"
        );
        Ok(coins)
    }

    async fn reference_gas_price(&self) -> Result<u64, RpcError> {
        let value: Value = self
            .call("suix_getReferenceGasPrice", json!([]))
            .await?;
        match &value {
            Value::String(raw) => raw
                .parse()
                .map_err(|err| RpcError::Schema(format!("reference gas price `{raw}`: {err}"))),
            Value::Number(number) => number
                .as_u64()
                .ok_or_else(|| RpcError::Schema(format!("reference gas price {number}"))),
            other => Err(RpcError::Schema(format!("reference gas price {other}"))),
        }
    }

    async fn submit(
        &self,
        transaction: &SignedTransaction,
        options: &ExecuteOptions,
    ) -> Result<TransactionResponse, RpcError> {
        let signatures = transaction
            .signatures
            .iter()
            .map(|signature| signature.to_base64())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|err| RpcError::Encoding(err.to_string()))?;
        let response: TransactionResponse = self
            .call(
                "sui_executeTransactionBlock",
                json!([
                    general_purpose::STANDARD.encode(&transaction.tx_bytes),
                    signatures,
                    options,
                    options.request_type,
                ]),
            )
            .await?;
        info!(
            target: "rpc",
            digest = %response.digest,
            endpoint = %self.url,
            success = response.status().map(|status| status.is_success()),
            "transaction submitted via json-rpc"
        );
        Ok(response)
    }

    async fn dev_inspect(
        &self,
        tx_bytes: &[u8],
        sender: SuiAddress,
    ) -> Result<DevInspectResults, RpcError> {
        self.call(
            "sui_devInspectTransactionBlock",
            json!([sender.to_string(), general_purpose::STANDARD.encode(tx_bytes)]),
        )
        .await
    }
}
