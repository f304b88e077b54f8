use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use alloy::primitives::{Address, B256};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value as JsonValue, json};
use url::Url;

use crate::error::RpcError;
use crate::types::{RawBlockHeader, RawLog, RawTransaction, hex_u64};
use crate::EthRpc;

pub const DEFAULT_RPC_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Deserialize)]
struct JsonRpcErrorBody {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
struct JsonRpcResponse {
    #[serde(default)]
    result: Option<JsonValue>,
    #[serde(default)]
    error: Option<JsonRpcErrorBody>,
}

/// Thin JSON-RPC transport over an ordered endpoint list. The first endpoint
/// is preferred; a transport-level failure rotates to the next one for
/// subsequent requests. Every request races a fixed timeout; the losing
/// request future is dropped, which cancels it.
pub struct JsonRpcClient {
    http: reqwest::Client,
    endpoints: Vec<Url>,
    active: AtomicUsize,
    next_id: AtomicU64,
    timeout: Duration,
}

impl JsonRpcClient {
    pub fn new(endpoints: Vec<Url>, timeout: Duration) -> Result<Self, RpcError> {
        if endpoints.is_empty() {
            return Err(RpcError::NoEndpoints);
        }

        Ok(Self {
            http: reqwest::Client::new(),
            endpoints,
            active: AtomicUsize::new(0),
            next_id: AtomicU64::new(1),
            timeout,
        })
    }

    fn active_endpoint(&self) -> &Url {
        let idx = self.active.load(Ordering::Relaxed) % self.endpoints.len();
        &self.endpoints[idx]
    }

    fn rotate_endpoint(&self, failed: &Url) {
        if self.endpoints.len() < 2 {
            return;
        }
        let next = (self.active.load(Ordering::Relaxed) + 1) % self.endpoints.len();
        self.active.store(next, Ordering::Relaxed);
        tracing::warn!(
            "[JsonRpcClient] 🔀 Rotating away from unhealthy endpoint {failed} to {}",
            self.endpoints[next]
        );
    }

    async fn request(&self, method: &str, params: JsonValue) -> Result<JsonValue, RpcError> {
        let endpoint = self.active_endpoint().clone();
        let body = json!({
            "jsonrpc": "2.0",
            "id": self.next_id.fetch_add(1, Ordering::Relaxed),
            "method": method,
            "params": params,
        });

        let send = self.http.post(endpoint.clone()).json(&body).send();
        let response = match tokio::time::timeout(self.timeout, send).await {
            Err(_) => {
                return Err(RpcError::Timeout {
                    timeout_ms: self.timeout.as_millis() as u64,
                });
            }
            Ok(Err(e)) => {
                self.rotate_endpoint(&endpoint);
                return Err(RpcError::Transport {
                    endpoint: endpoint.to_string(),
                    message: e.to_string(),
                });
            }
            Ok(Ok(response)) => response,
        };

        if response.status().as_u16() == 429 {
            return Err(RpcError::Rpc {
                code: 429,
                message: "too many requests".to_string(),
            });
        }

        let parsed: JsonRpcResponse = response.json().await.map_err(|e| {
            RpcError::InvalidResponse(format!("{method} response body: {e}"))
        })?;

        if let Some(error) = parsed.error {
            return Err(RpcError::Rpc {
                code: error.code,
                message: error.message,
            });
        }

        parsed
            .result
            .ok_or_else(|| RpcError::InvalidResponse(format!("{method}: missing result")))
    }
}

#[async_trait]
impl EthRpc for JsonRpcClient {
    async fn block_number(&self) -> Result<u64, RpcError> {
        let result = self.request("eth_blockNumber", json!([])).await?;
        let raw = result
            .as_str()
            .ok_or_else(|| RpcError::InvalidResponse("eth_blockNumber: not a string".into()))?;
        hex_u64::parse(raw)
            .ok_or_else(|| RpcError::InvalidResponse(format!("eth_blockNumber: {raw}")))
    }

    async fn get_logs(
        &self,
        from_block: u64,
        to_block: u64,
        addresses: &[Address],
        topic0: Option<Vec<B256>>,
    ) -> Result<Vec<RawLog>, RpcError> {
        let mut filter = json!({
            "fromBlock": format!("{from_block:#x}"),
            "toBlock": format!("{to_block:#x}"),
            "address": addresses.iter().map(|a| format!("{a:#x}")).collect::<Vec<_>>(),
        });
        if let Some(topics) = topic0 {
            filter["topics"] = json!([
                topics.iter().map(|t| format!("{t:#x}")).collect::<Vec<_>>()
            ]);
        }

        let result = self.request("eth_getLogs", json!([filter])).await?;
        serde_json::from_value(result)
            .map_err(|e| RpcError::InvalidResponse(format!("eth_getLogs: {e}")))
    }

    async fn get_block_timestamp(&self, block_number: u64) -> Result<u64, RpcError> {
        let result = self
            .request(
                "eth_getBlockByNumber",
                json!([format!("{block_number:#x}"), false]),
            )
            .await?;
        if result.is_null() {
            return Err(RpcError::InvalidResponse(format!(
                "eth_getBlockByNumber: block {block_number} not found"
            )));
        }
        let header: RawBlockHeader = serde_json::from_value(result)
            .map_err(|e| RpcError::InvalidResponse(format!("eth_getBlockByNumber: {e}")))?;
        Ok(header.timestamp)
    }

    async fn call(&self, to: Address, data: Vec<u8>) -> Result<Vec<u8>, RpcError> {
        let result = self
            .request(
                "eth_call",
                json!([
                    { "to": format!("{to:#x}"), "data": format!("0x{}", hex::encode(data)) },
                    "latest",
                ]),
            )
            .await?;
        let raw = result
            .as_str()
            .ok_or_else(|| RpcError::InvalidResponse("eth_call: not a string".into()))?;
        hex::decode(raw.strip_prefix("0x").unwrap_or(raw))
            .map_err(|e| RpcError::InvalidResponse(format!("eth_call: {e}")))
    }

    async fn get_transaction_by_hash(
        &self,
        tx_hash: B256,
    ) -> Result<Option<RawTransaction>, RpcError> {
        let result = self
            .request("eth_getTransactionByHash", json!([format!("{tx_hash:#x}")]))
            .await?;
        if result.is_null() {
            return Ok(None);
        }
        serde_json::from_value(result)
            .map(Some)
            .map_err(|e| RpcError::InvalidResponse(format!("eth_getTransactionByHash: {e}")))
    }
}
