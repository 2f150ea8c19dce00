//! Destination and proxy contract whitelists.

use bcnmy_types::Result;
use reqwest::{Method, RequestBuilder};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::relayer_client::RelayerClient;
use crate::{WHITELIST_DESTINATION_PATH, WHITELIST_PROXY_PATH};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddDestinationRequest {
    pub destination_addresses: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AddDestinationResponse {
    pub code: i64,
    pub message: Option<String>,
    pub registered_count: i64,
    pub duplicate_contracts: Vec<String>,
    pub invalid_contracts: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddProxyContractsRequest {
    pub addresses: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProxyContractsResponse {
    pub code: i64,
    pub message: Option<String>,
}

/// Enable (1) or disable (0) a whitelisted proxy contract.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatchProxyContractsRequest {
    pub status: u8,
    pub address: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GetProxyContractsResponse {
    #[serde(flatten)]
    pub response: ProxyContractsResponse,
    pub total: i64,
    pub addresses: Vec<ProxyContract>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProxyContract {
    pub address: String,
    pub status: bool,
}

impl RelayerClient {
    pub(crate) fn whitelist_request(&self, method: Method, path: &str) -> Result<RequestBuilder> {
        Ok(self
            .http()
            .request(method, self.endpoints().api_url(path))
            .header(reqwest::header::AUTHORIZATION, self.authorization()?)
            .timeout(self.timeout()))
    }

    /// POST /api/v1/dapp/whitelist/destination
    #[instrument(skip_all, fields(count = data.destination_addresses.len()))]
    pub async fn add_destination_addresses(
        &self,
        data: &AddDestinationRequest,
    ) -> Result<AddDestinationResponse> {
        let request = self
            .whitelist_request(Method::POST, WHITELIST_DESTINATION_PATH)?
            .json(data);
        let resp: AddDestinationResponse = self.send_json(request, "add destination").await?;
        info!(
            registered = resp.registered_count,
            duplicates = resp.duplicate_contracts.len(),
            invalid = resp.invalid_contracts.len(),
            "destination whitelist updated"
        );
        Ok(resp)
    }

    /// POST /api/v1/dapp/whitelist/proxy-contracts
    #[instrument(skip_all, fields(count = data.addresses.len()))]
    pub async fn add_proxy_contracts(
        &self,
        data: &AddProxyContractsRequest,
    ) -> Result<ProxyContractsResponse> {
        let request = self.whitelist_request(Method::POST, WHITELIST_PROXY_PATH)?.json(data);
        self.send_json(request, "add proxy contracts").await
    }

    /// PATCH /api/v1/dapp/whitelist/proxy-contracts
    #[instrument(skip_all, fields(address = %data.address, status = data.status))]
    pub async fn patch_proxy_contracts(
        &self,
        data: &PatchProxyContractsRequest,
    ) -> Result<ProxyContractsResponse> {
        let request = self.whitelist_request(Method::PATCH, WHITELIST_PROXY_PATH)?.json(data);
        self.send_json(request, "patch proxy contracts").await
    }

    /// GET /api/v1/dapp/whitelist/proxy-contracts
    #[instrument(skip(self))]
    pub async fn get_proxy_contracts(&self) -> Result<GetProxyContractsResponse> {
        let request = self.whitelist_request(Method::GET, WHITELIST_PROXY_PATH)?;
        self.send_json(request, "get proxy contracts").await
    }
}
