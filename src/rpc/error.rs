use thiserror::Error;

#[derive(Debug, Error)]
pub enum RpcError {
    #[error("failed to call fullnode: {0}")]
    Http(#[from] reqwest::Error),
    #[error("failed to parse response body: {0}")]
    Json(#[from] serde_json::Error),
    #[error("request to {endpoint} failed with status {status}: {body}")]
    ApiStatus {
        endpoint: String,
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("{method} returned error {code}: {message}")]
    JsonRpc {
        method: String,
        code: i64,
        message: String,
    },
    #[error("unexpected response schema: {0}")]
    Schema(String),
    #[error("failed to encode request: {0}")]
    Encoding(String),
}

impl RpcError {
    /// 节点明确拒绝了请求（对象过期、签名无效等），而不是传输层故障。
    pub fn is_rejection(&self) -> bool {
        matches!(self, RpcError::JsonRpc { .. })
    }
}
