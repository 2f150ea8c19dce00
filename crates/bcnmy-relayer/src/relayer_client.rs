//! Meta-transaction submission and polling.
//!
//! Endpoints:
//! - POST /api/v2/meta-tx/native
//! - POST /api/v1/native
//! - GET /api/v1/native/transaction-status?transactionId=<id>

use std::time::Duration;

use alloy::primitives::{Address, B256};
use bcnmy_eip712::{MetaTxMessage, SignedMetaTx, SIGNATURE_EIP712_TYPE};
use bcnmy_types::{BcnmyError, Result};
use reqwest::RequestBuilder;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::{Endpoints, META_TX_NATIVE_PATH, META_TX_NATIVE_V1_PATH, PACKAGE_VERSION, TRANSACTION_STATUS_PATH};

pub(crate) const API_KEY_HEADER: &str = "x-api-key";

/// Meta-transaction submitted to the relayer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetaTxRequest {
    pub from: String,
    pub to: String,
    pub api_id: String,
    pub params: Vec<serde_json::Value>,
    pub signature_type: String,
}

impl MetaTxRequest {
    /// EIP-712 request; params are `[message, domainSeparator, signature]`.
    pub fn eip712(
        from: &str,
        to: Address,
        api_id: &str,
        message: &MetaTxMessage,
        domain_separator: B256,
        signature: &[u8],
    ) -> Result<Self> {
        Ok(Self {
            from: from.to_string(),
            to: to.to_string(),
            api_id: api_id.to_string(),
            params: vec![
                serde_json::to_value(message)?,
                serde_json::Value::String(domain_separator.to_string()),
                serde_json::Value::String(bcnmy_types::bytes_to_hex(signature)),
            ],
            signature_type: SIGNATURE_EIP712_TYPE.to_string(),
        })
    }

    /// Build from a locally signed message, sent to the message's target.
    pub fn from_signed(api_id: &str, signed: &SignedMetaTx) -> Result<Self> {
        Self::eip712(
            &signed.message.from.to_string(),
            signed.message.to,
            api_id,
            &signed.message,
            signed.domain_separator,
            &signed.signature,
        )
    }
}

/// Rate-limit state reported alongside a submission.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RateLimit {
    /// 0: gas usage, 1: number of meta transactions.
    #[serde(rename = "type")]
    pub kind: i64,
    pub limit_left: f64,
    pub reset_time: i64,
}

/// Relayer reply to a meta-transaction submission.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MetaTxResponse {
    pub tx_hash: Option<B256>,
    pub log: Option<String>,
    pub flag: i64,
    pub message: Option<String>,
    pub error: Option<String>,
    pub code: i64,
    pub limit: Option<RateLimit>,
    pub allowed: bool,
}

impl MetaTxResponse {
    /// The relayed transaction hash, if the relayer accepted the request.
    pub fn relayed_hash(&self) -> Option<B256> {
        self.tx_hash.filter(|h| !h.is_zero())
    }

    fn into_rejection(self) -> BcnmyError {
        let code = if self.code != 0 { self.code } else { self.flag };
        let message = self
            .message
            .or(self.error)
            .or(self.log)
            .unwrap_or_default();
        BcnmyError::Rejected { code, message }
    }
}

/// Raw v1 reply: `data` is the success payload or an error description.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MetaTxResponseV1 {
    pub flag: i64,
    pub msg: Option<String>,
    pub data: serde_json::Value,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetaTxV1SuccessData {
    pub transaction_id: String,
    #[serde(default)]
    pub connection_url: Option<String>,
}

impl MetaTxResponseV1 {
    fn into_rejection(self) -> BcnmyError {
        match self.data {
            serde_json::Value::String(message) => BcnmyError::Rejected { code: self.flag, message },
            serde_json::Value::Object(map) => BcnmyError::Rejected {
                code: map.get("code").and_then(|c| c.as_i64()).unwrap_or(self.flag),
                message: map
                    .get("error")
                    .and_then(|e| e.as_str())
                    .map(str::to_string)
                    .or(self.msg)
                    .unwrap_or_default(),
            },
            _ => BcnmyError::Rejected { code: self.flag, message: self.msg.unwrap_or_default() },
        }
    }
}

/// Status of a v1 meta-transaction.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TransactionStatus {
    pub flag: i64,
    pub log: Option<String>,
    pub code: i64,
    pub data: TransactionStatusData,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TransactionStatusData {
    pub status: Option<String>,
    pub receipt: Option<StatusReceipt>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StatusReceipt {
    #[serde(rename = "transactionHash")]
    pub tx_hash: Option<String>,
}

impl TransactionStatus {
    /// On-chain hash from the receipt; `None` while empty or zero.
    pub fn tx_hash(&self) -> Option<B256> {
        self.data
            .receipt
            .as_ref()
            .and_then(|r| r.tx_hash.as_deref())
            .and_then(|h| h.parse::<B256>().ok())
            .filter(|h| !h.is_zero())
    }

    pub fn is_mined(&self) -> bool {
        self.code == 200 && self.tx_hash().is_some()
    }
}

/// Relayer client for submitting meta-transactions and calling dashboard APIs.
#[derive(Debug, Clone)]
pub struct RelayerClient {
    endpoints: Endpoints,
    client: reqwest::Client,
    timeout: Duration,
    api_key: String,
    auth_token: Option<String>,
    poll_interval: Duration,
    status_retries: u32,
}

impl RelayerClient {
    pub fn new(api_key: &str, timeout_ms: Option<u64>) -> Self {
        let timeout_ms = timeout_ms.unwrap_or(10_000);
        Self {
            endpoints: Endpoints::default(),
            client: reqwest::Client::builder()
                .timeout(Duration::from_millis(timeout_ms))
                .build()
                .unwrap_or_default(),
            timeout: Duration::from_millis(timeout_ms),
            api_key: api_key.to_string(),
            auth_token: None,
            poll_interval: Duration::from_secs(5),
            status_retries: 5,
        }
    }

    pub fn with_endpoints(mut self, endpoints: Endpoints) -> Self {
        self.endpoints = endpoints;
        self
    }

    /// Dashboard auth token, required by dashboard, whitelist and data APIs.
    pub fn with_auth_token(mut self, auth_token: &str) -> Self {
        self.auth_token = Some(auth_token.to_string());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();
        self.timeout = timeout;
        self
    }

    /// Fixed sleep between status polls.
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn with_status_retries(mut self, status_retries: u32) -> Self {
        self.status_retries = status_retries.max(1);
        self
    }

    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    pub fn auth_token(&self) -> Option<&str> {
        self.auth_token.as_deref()
    }

    /// `Authorization` header value for the whitelist APIs.
    pub fn authorization(&self) -> Result<String> {
        Ok(format!("User {}", self.require_auth_token()?))
    }

    pub(crate) fn require_auth_token(&self) -> Result<&str> {
        self.auth_token.as_deref().ok_or(BcnmyError::MissingAuthToken)
    }

    pub(crate) fn http(&self) -> &reqwest::Client {
        &self.client
    }

    pub(crate) fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Send `request` and decode the JSON body regardless of status; the
    /// relayer reports failures in the body.
    pub(crate) async fn send_json<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        what: &str,
    ) -> Result<T> {
        let resp = request.send().await.map_err(|e| {
            warn!(%e, what, "relayer request failed");
            BcnmyError::Http(format!("{} request failed: {}", what, e))
        })?;

        let status = resp.status();
        let body = resp
            .bytes()
            .await
            .map_err(|e| BcnmyError::Http(format!("{} body read failed: {}", what, e)))?;

        serde_json::from_slice(&body).map_err(|e| {
            warn!(%e, %status, what, "failed to parse relayer response");
            BcnmyError::Http(format!(
                "failed to parse {} response (status {}): {}",
                what, status, e
            ))
        })
    }

    pub(crate) fn meta_tx_request(&self, request: &MetaTxRequest) -> RequestBuilder {
        self.client
            .post(self.endpoints.api_url(META_TX_NATIVE_PATH))
            .header(API_KEY_HEADER, &self.api_key)
            .json(request)
            .timeout(self.timeout)
    }

    pub(crate) fn meta_tx_v1_request(&self, request: &MetaTxRequest) -> RequestBuilder {
        self.client
            .post(self.endpoints.gasless_url(META_TX_NATIVE_V1_PATH))
            .header(API_KEY_HEADER, &self.api_key)
            .header("version", PACKAGE_VERSION)
            .json(request)
            .timeout(self.timeout)
    }

    pub(crate) fn status_request(&self, transaction_id: &str) -> RequestBuilder {
        self.client
            .get(self.endpoints.gasless_url(TRANSACTION_STATUS_PATH))
            .query(&[("transactionId", transaction_id)])
            .header(API_KEY_HEADER, &self.api_key)
            .header("version", PACKAGE_VERSION)
            .timeout(self.timeout)
    }

    /// Submit a meta-transaction.
    ///
    /// POST /api/v2/meta-tx/native
    ///
    /// A reply without a transaction hash is a rejection (limits, unknown api
    /// id, bad signature); the relayer's code and message are returned.
    #[instrument(skip_all, fields(api_id = %request.api_id, from = %request.from))]
    pub async fn send_meta_native_tx(&self, request: &MetaTxRequest) -> Result<MetaTxResponse> {
        debug!(request = %bcnmy_types::to_json_pretty(request), "submitting meta transaction");

        let resp: MetaTxResponse = self
            .send_json(self.meta_tx_request(request), "meta-tx native")
            .await?;

        if resp.relayed_hash().is_none() {
            warn!(
                code = resp.code,
                message = ?resp.message,
                limit = ?resp.limit,
                "relayer rejected meta transaction"
            );
            return Err(resp.into_rejection());
        }

        Ok(resp)
    }

    /// Submit through the v1 gasless endpoint and wait for the relayed hash.
    ///
    /// POST /api/v1/native, then polls the transaction status.
    #[instrument(skip_all, fields(api_id = %request.api_id, from = %request.from))]
    pub async fn send_meta_native_tx_v1(&self, request: &MetaTxRequest) -> Result<MetaTxResponse> {
        let resp: MetaTxResponseV1 = self
            .send_json(self.meta_tx_v1_request(request), "meta-tx native v1")
            .await?;

        if resp.flag != 200 {
            warn!(flag = resp.flag, msg = ?resp.msg, "relayer rejected v1 meta transaction");
            return Err(resp.into_rejection());
        }

        let success: MetaTxV1SuccessData = serde_json::from_value(resp.data)?;
        let status = self.get_transaction_status(&success.transaction_id).await?;

        Ok(MetaTxResponse {
            tx_hash: status.tx_hash(),
            flag: status.flag,
            code: status.code,
            log: status.log,
            ..Default::default()
        })
    }

    /// Poll the status of a v1 transaction until it carries an on-chain hash.
    ///
    /// GET /api/v1/native/transaction-status?transactionId=<id>
    #[instrument(skip(self))]
    pub async fn get_transaction_status(&self, transaction_id: &str) -> Result<TransactionStatus> {
        for attempt in 1..=self.status_retries {
            match self
                .send_json::<TransactionStatus>(self.status_request(transaction_id), "transaction status")
                .await
            {
                Ok(status) if status.is_mined() => return Ok(status),
                Ok(status) => info!(attempt, code = status.code, "transaction not yet relayed"),
                Err(e) => warn!(attempt, %e, "transaction status request failed"),
            }
            if attempt < self.status_retries {
                tokio::time::sleep(self.poll_interval).await;
            }
        }
        Err(BcnmyError::RetriesExhausted {
            what: format!("transaction status for {}", transaction_id),
            attempts: self.status_retries,
        })
    }
}
