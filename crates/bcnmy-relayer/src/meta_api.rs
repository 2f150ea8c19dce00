//! Registered meta APIs and per-user limits.

use bcnmy_types::{BcnmyError, Result};
use reqwest::RequestBuilder;
use serde::{Deserialize, Serialize};
use tracing::{error, instrument};

use crate::relayer_client::{RelayerClient, API_KEY_HEADER};
use crate::{CHECK_LIMITS_PATH, META_API_PATH};

/// Flag the relayer returns on a successful meta-API listing.
pub const META_API_OK_FLAG: i64 = 143;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MetaApiResponse {
    pub log: Option<String>,
    pub flag: i64,
    pub total: i64,
    #[serde(rename = "listApis")]
    pub list_apis: Vec<MetaApiInfo>,
}

/// One registered method; `contract_address` is empty for non-contract APIs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MetaApiInfo {
    pub contract_address: Option<String>,
    pub id: String,
    pub name: String,
    pub url: Option<String>,
    pub version: i64,
    pub method: String,
    pub method_type: Option<String>,
    pub api_type: Option<String>,
    pub meta_tx_limit_status: i64,
    pub meta_tx_limit: MetaTxLimit,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MetaTxLimit {
    #[serde(rename = "type")]
    pub kind: i64,
    pub value: f64,
    pub duration_value: i64,
    pub day: Option<String>,
    pub limit_start_time: i64,
    pub limit_duration_in_ms: i64,
}

/// Reply of the check-limits endpoint.
///
/// `code` is 200 when allowed, 150/151/152 when the dapp, user or API/user
/// limit is exhausted.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CheckLimitResponse {
    pub code: i64,
    pub message: Option<String>,
    pub response_code: Option<i64>,
    pub allowed: bool,
    pub limit: LimitInfo,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LimitInfo {
    pub allowed: bool,
    /// 0: gas usage, 1: number of meta transactions.
    #[serde(rename = "type")]
    pub kind: i64,
    pub reset_time: i64,
    pub limit_left: f64,
}

impl RelayerClient {
    pub(crate) fn meta_api_request(&self) -> RequestBuilder {
        self.http()
            .get(self.endpoints().api_url(META_API_PATH))
            .header(API_KEY_HEADER, self.api_key())
            .timeout(self.timeout())
    }

    pub(crate) fn check_limits_request(&self, user_address: &str, api_id: &str) -> RequestBuilder {
        self.http()
            .get(self.endpoints().api_url(CHECK_LIMITS_PATH))
            .query(&[("userAddress", user_address), ("apiId", api_id)])
            .header(API_KEY_HEADER, self.api_key())
            .timeout(self.timeout())
    }

    /// List the meta APIs registered for this api key.
    ///
    /// GET /api/v1/meta-api
    #[instrument(skip(self))]
    pub async fn get_meta_api(&self) -> Result<MetaApiResponse> {
        let resp: MetaApiResponse = self.send_json(self.meta_api_request(), "meta api").await?;
        if resp.flag != META_API_OK_FLAG {
            error!(flag = resp.flag, log = ?resp.log, "meta api listing rejected");
            return Err(BcnmyError::Rejected {
                code: resp.flag,
                message: resp.log.unwrap_or_default(),
            });
        }
        Ok(resp)
    }

    /// GET /api/v1/dapp/checkLimits?userAddress=<addr>&apiId=<id>
    #[instrument(skip(self))]
    pub async fn check_limits(&self, user_address: &str, api_id: &str) -> Result<CheckLimitResponse> {
        self.send_json(self.check_limits_request(user_address, api_id), "check limits")
            .await
    }
}
