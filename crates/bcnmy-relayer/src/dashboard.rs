//! Dapp, contract and method management on the dashboard public API.
//!
//! All calls are form-encoded and authenticated with the dashboard
//! `authToken` header. Every call except create-dapp also sends `apiKey`.

use bcnmy_types::Result;
use reqwest::{Method, RequestBuilder};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::relayer_client::RelayerClient;
use crate::{
    GeneralResponse, ADD_CONTRACT_PATH, ADD_METHOD_PATH, CREATE_DAPP_PATH, DELETE_CONTRACT_PATH,
    DELETE_METHOD_PATH,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateDappRequest {
    pub dapp_name: String,
    pub network_id: String,
    pub enable_biconomy_wallet: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CreateDappResponse {
    pub code: i64,
    pub message: Option<String>,
    pub data: CreateDappData,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CreateDappData {
    pub api_key: String,
    #[serde(with = "bcnmy_types::serde_u256::option")]
    pub funding_key: Option<alloy::primitives::U256>,
}

/// `SC` for a plain contract, `SCW` for a contract wallet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContractType {
    #[serde(rename = "SC")]
    Contract,
    #[serde(rename = "SCW")]
    ContractWallet,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MetaTransactionType {
    Default,
    TrustedForwarder,
    Erc20Forwarder,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddContractRequest {
    pub contract_name: String,
    pub contract_address: String,
    pub contract_type: ContractType,
    /// `SCW`, `GNOSIS` or empty.
    pub wallet_type: String,
    pub meta_transaction_type: MetaTransactionType,
    /// Contract ABI as a JSON string.
    pub abi: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddMethodRequest {
    pub api_type: String,
    pub method_type: String,
    pub name: String,
    pub contract_address: String,
    pub method: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AddMethodResponse {
    pub code: i64,
    pub message: Option<String>,
    pub api_ids: Vec<RegisteredApi>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RegisteredApi {
    pub api_id: String,
    pub method: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteContractRequest {
    pub contract_address: String,
    pub contract_type: ContractType,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteMethodRequest {
    pub contract_address: String,
    pub method: String,
}

impl RelayerClient {
    /// Form request against the API host carrying the dashboard headers.
    pub(crate) fn dashboard_request<T: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        form: &T,
        with_api_key: bool,
    ) -> Result<RequestBuilder> {
        let token = self.require_auth_token()?;
        let mut request = self
            .http()
            .request(method, self.endpoints().api_url(path))
            .header("authToken", token)
            .form(form)
            .timeout(self.timeout());
        if with_api_key {
            request = request.header("apiKey", self.api_key());
        }
        Ok(request)
    }

    /// POST /api/v1/dapp/public-api/create-dapp
    #[instrument(skip_all, fields(dapp = %data.dapp_name, network = %data.network_id))]
    pub async fn create_dapp(&self, data: &CreateDappRequest) -> Result<CreateDappResponse> {
        let request = self.dashboard_request(Method::POST, CREATE_DAPP_PATH, data, false)?;
        let resp: CreateDappResponse = self.send_json(request, "create dapp").await?;
        info!(code = resp.code, "dapp created");
        Ok(resp)
    }

    /// POST /api/v1/smart-contract/public-api/addContract
    #[instrument(skip_all, fields(contract = %data.contract_address))]
    pub async fn add_contract(&self, data: &AddContractRequest) -> Result<GeneralResponse> {
        let request = self.dashboard_request(Method::POST, ADD_CONTRACT_PATH, data, true)?;
        self.send_json(request, "add contract").await
    }

    /// POST /api/v1/meta-api/public-api/addMethod
    #[instrument(skip_all, fields(contract = %data.contract_address, method = %data.method))]
    pub async fn add_method(&self, data: &AddMethodRequest) -> Result<AddMethodResponse> {
        let request = self.dashboard_request(Method::POST, ADD_METHOD_PATH, data, true)?;
        self.send_json(request, "add method").await
    }

    /// DELETE /api/v1/smart-contract/public-api/deleteContract
    #[instrument(skip_all, fields(contract = %data.contract_address))]
    pub async fn delete_contract(&self, data: &DeleteContractRequest) -> Result<GeneralResponse> {
        let request = self.dashboard_request(Method::DELETE, DELETE_CONTRACT_PATH, data, true)?;
        self.send_json(request, "delete contract").await
    }

    /// DELETE /api/v1/meta-api/public-api/deleteMethod
    #[instrument(skip_all, fields(contract = %data.contract_address, method = %data.method))]
    pub async fn delete_method(&self, data: &DeleteMethodRequest) -> Result<GeneralResponse> {
        let request = self.dashboard_request(Method::DELETE, DELETE_METHOD_PATH, data, true)?;
        self.send_json(request, "delete method").await
    }
}
