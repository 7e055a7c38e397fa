use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use alloy_primitives::{Address, Bytes, B256, U256, U64};
use anyhow::{bail, Result};
use log::{debug, trace};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;
use tokio::time::{sleep, Instant};

/// EIP-1193 code a wallet answers with when the user clicks reject.
const USER_REJECTED_CODE: i64 = 4001;
const METHOD_NOT_FOUND_CODE: i64 = -32601;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("no wallet provider reachable at {0}, install or unlock a wallet")]
    Unavailable(String),
    #[error("transaction cancelled by user")]
    UserRejected,
    #[error("rpc error {code}: {message}")]
    Rpc {
        code: i64,
        message: String,
        /// ABI-encoded revert payload, when the node handed one back.
        data: Option<Bytes>,
    },
    #[error("unexpected rpc payload: {0}")]
    Payload(String),
}

#[derive(Debug, Serialize)]
struct RpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: Value,
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    result: Option<Value>,
    error: Option<RpcErrorObject>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
    data: Option<Value>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<Address>,
    pub to: Address,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<U256>,
    pub data: Bytes,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    pub address: Address,
    pub topics: Vec<B256>,
    pub data: Bytes,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionReceipt {
    pub transaction_hash: B256,
    #[serde(default)]
    pub block_number: Option<U64>,
    #[serde(default)]
    pub status: Option<U64>,
    #[serde(default)]
    pub logs: Vec<LogEntry>,
}

impl TransactionReceipt {
    pub fn succeeded(&self) -> bool {
        self.status.map(|s| s == U64::from(1)).unwrap_or(true)
    }
}

/// Thin JSON-RPC client. Signing stays on the other side of the wire: the
/// node or wallet behind `url` owns the accounts and keys.
pub struct Provider {
    url: String,
    client: reqwest::Client,
    id: AtomicU64,
}

impl Provider {
    pub fn new(url: String) -> Self {
        let client = reqwest::Client::new();
        Self {
            url,
            client,
            id: AtomicU64::new(1),
        }
    }

    async fn request<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Value,
    ) -> Result<T, ProviderError> {
        let body = RpcRequest {
            jsonrpc: "2.0",
            id: self.id.fetch_add(1, Ordering::Relaxed),
            method,
            params,
        };
        trace!("rpc {} {}", method, body.params);
        let response = self
            .client
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(|_| ProviderError::Unavailable(self.url.clone()))?;
        let response: RpcResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Payload(e.to_string()))?;
        if let Some(error) = response.error {
            if error.code == USER_REJECTED_CODE || error.message.to_lowercase().contains("reject") {
                return Err(ProviderError::UserRejected);
            }
            return Err(ProviderError::Rpc {
                code: error.code,
                message: error.message,
                data: error.data.as_ref().and_then(revert_bytes),
            });
        }
        serde_json::from_value(response.result.unwrap_or(Value::Null))
            .map_err(|e| ProviderError::Payload(e.to_string()))
    }

    pub async fn call(&self, to: Address, data: Bytes) -> Result<Bytes, ProviderError> {
        let tx = TransactionRequest {
            from: None,
            to,
            value: None,
            data,
        };
        self.request("eth_call", json!([tx, "latest"])).await
    }

    pub async fn estimate_gas(&self, tx: &TransactionRequest) -> Result<U256, ProviderError> {
        self.request("eth_estimateGas", json!([tx])).await
    }

    pub async fn send_transaction(&self, tx: &TransactionRequest) -> Result<B256, ProviderError> {
        self.request("eth_sendTransaction", json!([tx])).await
    }

    pub async fn balance(&self, address: Address) -> Result<U256, ProviderError> {
        self.request("eth_getBalance", json!([address, "latest"]))
            .await
    }

    /// Asks the wallet for account access. Nodes that predate
    /// `eth_requestAccounts` get the read-only variant instead.
    pub async fn request_accounts(&self) -> Result<Vec<Address>, ProviderError> {
        match self.request("eth_requestAccounts", json!([])).await {
            Err(ProviderError::Rpc {
                code: METHOD_NOT_FOUND_CODE,
                ..
            }) => self.request("eth_accounts", json!([])).await,
            other => other,
        }
    }

    pub async fn transaction_receipt(
        &self,
        hash: B256,
    ) -> Result<Option<TransactionReceipt>, ProviderError> {
        self.request("eth_getTransactionReceipt", json!([hash]))
            .await
    }

    /// Polls until the transaction is mined. No resubmission, no backoff
    /// tuning, a plain interval until `timeout` runs out.
    pub async fn wait_for_receipt(
        &self,
        hash: B256,
        poll: Duration,
        timeout: Duration,
    ) -> Result<TransactionReceipt> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(receipt) = self.transaction_receipt(hash).await? {
                debug!(
                    "transaction {} mined in block {:?}",
                    hash, receipt.block_number
                );
                return Ok(receipt);
            }
            if Instant::now() >= deadline {
                bail!("transaction {} not mined after {:?}", hash, timeout);
            }
            sleep(poll).await;
        }
    }
}

/// Digs the ABI-encoded revert payload out of the error `data` field. Shape
/// varies by node: a bare hex string, or an object with a `data` key.
fn revert_bytes(data: &Value) -> Option<Bytes> {
    match data {
        Value::String(hex) => hex.parse().ok(),
        Value::Object(map) => map.get("data").and_then(revert_bytes),
        _ => None,
    }
}
