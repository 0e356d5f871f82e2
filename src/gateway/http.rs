//! JSON-RPC relay gateway.
//!
//! Every call is a `POST` of `{"method": ..., "params": {...}}` to the relay
//! endpoint, answered with `{"result": ...}` or `{"error": {"message": ...}}`.
//! Writes go out as `sendTransaction` and are confirmed by polling
//! `getTransactionReceipt` until the relay reports the transaction final.
//! Encounter notifications are pulled with `getEncounters` by a background
//! task and fanned out on a broadcast channel.

use log::{debug, trace, warn};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};

use crate::config::GatewayConfig;
use crate::game::errors::KingpinError;
use crate::game::types::{
    Account, AssetDefinition, AssetId, District, DistrictDefinition, EncounterEvent,
    PlayerRecord, TokenAmount, TokenId,
};
use crate::gateway::{Gateway, PendingTx, Receipt, WriteOp};
use crate::logutil::escape_log;

#[derive(Debug, Deserialize)]
struct RpcError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcError>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReceiptResponse {
    hash: String,
    block: u64,
    status: String,
    #[serde(default)]
    reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EncounterBatch {
    #[serde(default)]
    events: Vec<EncounterEvent>,
    next_block: u64,
}

/// How a relay call failed, before it is mapped onto [`KingpinError`].
#[derive(Debug)]
enum RpcFailure {
    /// The request never got a usable answer: connect error, timeout, HTTP status.
    Transport(String),
    /// The relay answered with an `{"error": ...}` body.
    Remote(String),
    /// The answer could not be decoded.
    Malformed(String),
}

impl From<RpcFailure> for KingpinError {
    fn from(failure: RpcFailure) -> Self {
        match failure {
            RpcFailure::Transport(reason) | RpcFailure::Remote(reason) => {
                KingpinError::RemoteUnavailable(reason)
            }
            RpcFailure::Malformed(reason) => KingpinError::InvalidResponse(reason),
        }
    }
}

/// Shared request half, used by both the gateway and its encounter poller.
#[derive(Debug, Clone)]
struct RpcClient {
    client: reqwest::Client,
    endpoint: String,
    request_timeout: Duration,
}

impl RpcClient {
    async fn call(&self, method: &str, params: Value) -> Result<Value, RpcFailure> {
        trace!("rpc {} {}", method, params);
        let request = self
            .client
            .post(&self.endpoint)
            .json(&json!({ "method": method, "params": params }));

        let response = timeout(self.request_timeout, request.send())
            .await
            .map_err(|_| {
                RpcFailure::Transport(format!(
                    "{} timed out after {:?}",
                    method, self.request_timeout
                ))
            })?
            .map_err(|e| RpcFailure::Transport(format!("{} failed: {}", method, e)))?;

        if !response.status().is_success() {
            return Err(RpcFailure::Transport(format!(
                "{} returned status {}",
                method,
                response.status()
            )));
        }

        let body: RpcResponse = response
            .json()
            .await
            .map_err(|e| RpcFailure::Malformed(format!("{}: {}", method, e)))?;

        if let Some(err) = body.error {
            return Err(RpcFailure::Remote(format!("{}: {}", method, err.message)));
        }
        Ok(body.result.unwrap_or(Value::Null))
    }

    async fn call_as<T: for<'de> Deserialize<'de>>(
        &self,
        method: &str,
        params: Value,
    ) -> Result<T, KingpinError> {
        let value = self.call(method, params).await?;
        serde_json::from_value(value)
            .map_err(|e| KingpinError::InvalidResponse(format!("{}: {}", method, e)))
    }
}

pub struct HttpGateway {
    rpc: Arc<RpcClient>,
    poll_interval: Duration,
    events: broadcast::Sender<EncounterEvent>,
    poller: JoinHandle<()>,
}

impl HttpGateway {
    /// Build the gateway and start the encounter poller. Must be called from
    /// within a tokio runtime.
    pub fn new(config: &GatewayConfig) -> Result<Self, KingpinError> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| KingpinError::RemoteUnavailable(format!("http client: {}", e)))?;
        let rpc = Arc::new(RpcClient {
            client,
            endpoint: config.endpoint.clone(),
            request_timeout: Duration::from_secs(config.request_timeout_seconds),
        });
        let poll_interval = Duration::from_millis(config.event_poll_interval_ms.max(50));
        let (events, _) = broadcast::channel(64);
        let poller = tokio::spawn(poll_encounters(rpc.clone(), events.clone(), poll_interval));
        debug!("http gateway using {}", escape_log(&config.endpoint));
        Ok(Self {
            rpc,
            poll_interval,
            events,
            poller,
        })
    }
}

impl Drop for HttpGateway {
    fn drop(&mut self) {
        self.poller.abort();
    }
}

async fn poll_encounters(
    rpc: Arc<RpcClient>,
    events: broadcast::Sender<EncounterEvent>,
    interval: Duration,
) {
    let mut from_block: Option<u64> = None;
    loop {
        let params = match from_block {
            Some(block) => json!({ "fromBlock": block }),
            None => json!({ "fromBlock": "latest" }),
        };
        match rpc.call_as::<EncounterBatch>("getEncounters", params).await {
            Ok(batch) => {
                // Only listeners exist to care; a send error just means none are attached.
                for event in batch.events {
                    let _ = events.send(event);
                }
                from_block = Some(batch.next_block);
            }
            Err(e) => warn!("encounter poll failed: {}", escape_log(&e.to_string())),
        }
        sleep(interval).await;
    }
}

fn parse_amount(method: &str, value: Value) -> Result<TokenAmount, KingpinError> {
    match value {
        Value::String(s) => s
            .trim()
            .parse()
            .map_err(|e| KingpinError::InvalidResponse(format!("{}: {}", method, e))),
        Value::Number(n) => n
            .as_u64()
            .map(TokenAmount::from)
            .ok_or_else(|| KingpinError::InvalidResponse(format!("{}: bad amount {}", method, n))),
        other => Err(KingpinError::InvalidResponse(format!(
            "{}: expected an amount, got {}",
            method, other
        ))),
    }
}

impl Gateway for HttpGateway {
    async fn is_active_player(&self, account: &Account) -> Result<bool, KingpinError> {
        self.rpc
            .call_as("isActivePlayer", json!({ "account": account }))
            .await
    }

    async fn get_player(&self, account: &Account) -> Result<PlayerRecord, KingpinError> {
        self.rpc
            .call_as("getPlayer", json!({ "account": account }))
            .await
    }

    async fn get_inventory(&self, account: &Account, asset: AssetId) -> Result<u64, KingpinError> {
        self.rpc
            .call_as("getInventory", json!({ "account": account, "asset": asset }))
            .await
    }

    async fn get_asset_count(&self) -> Result<u32, KingpinError> {
        self.rpc.call_as("getAssetCount", json!({})).await
    }

    async fn get_asset(&self, id: AssetId) -> Result<AssetDefinition, KingpinError> {
        self.rpc.call_as("getAsset", json!({ "asset": id })).await
    }

    async fn get_district(&self, district: District) -> Result<DistrictDefinition, KingpinError> {
        self.rpc
            .call_as("getDistrict", json!({ "district": district }))
            .await
    }

    async fn get_asset_price(
        &self,
        district: District,
        asset: AssetId,
    ) -> Result<TokenAmount, KingpinError> {
        let value = self
            .rpc
            .call(
                "getAssetPrice",
                json!({ "district": district, "asset": asset }),
            )
            .await?;
        parse_amount("getAssetPrice", value)
    }

    async fn get_identity_token_balance(&self, account: &Account) -> Result<u64, KingpinError> {
        self.rpc
            .call_as("getIdentityTokenBalance", json!({ "account": account }))
            .await
    }

    async fn get_identity_token_by_index(
        &self,
        account: &Account,
        index: u64,
    ) -> Result<TokenId, KingpinError> {
        self.rpc
            .call_as(
                "getIdentityTokenByIndex",
                json!({ "account": account, "index": index }),
            )
            .await
    }

    async fn submit(&self, from: &Account, op: WriteOp) -> Result<PendingTx, KingpinError> {
        let value = self
            .rpc
            .call("sendTransaction", json!({ "from": from, "tx": &op }))
            .await
            .map_err(|failure| match failure {
                // Only a relay that received the write can decline it.
                RpcFailure::Remote(reason) => KingpinError::SubmissionRejected(reason),
                other => KingpinError::from(other),
            })?;
        let hash = value
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| KingpinError::InvalidResponse("sendTransaction: missing hash".into()))?;
        debug!("submitted {} as {}", op.name(), hash);
        Ok(PendingTx { hash, op })
    }

    async fn confirm(&self, pending: PendingTx) -> Result<Receipt, KingpinError> {
        loop {
            let value = self
                .rpc
                .call("getTransactionReceipt", json!({ "hash": pending.hash }))
                .await?;
            if !value.is_null() {
                let receipt: ReceiptResponse = serde_json::from_value(value).map_err(|e| {
                    KingpinError::InvalidResponse(format!("getTransactionReceipt: {}", e))
                })?;
                return match receipt.status.as_str() {
                    "success" => Ok(Receipt {
                        hash: receipt.hash,
                        block: receipt.block,
                    }),
                    _ => Err(KingpinError::SubmissionRejected(format!(
                        "{} reverted: {}",
                        pending.op.name(),
                        receipt.reason.unwrap_or_else(|| "no reason given".into())
                    ))),
                };
            }
            sleep(self.poll_interval).await;
        }
    }

    fn subscribe_encounters(&self) -> broadcast::Receiver<EncounterEvent> {
        self.events.subscribe()
    }
}
