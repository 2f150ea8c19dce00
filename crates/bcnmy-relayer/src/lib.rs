//! HTTP client for the Biconomy relayer and dashboard services.
//!
//! - [`relayer_client`]: meta-transaction submission and status polling
//! - [`meta_api`]: registered meta APIs and per-user limits
//! - [`dashboard`]: dapp, contract and method management
//! - [`whitelist`]: destination and proxy contract whitelists
//! - [`data`]: usage statistics

pub mod dashboard;
pub mod data;
pub mod meta_api;
pub mod relayer_client;
pub mod whitelist;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use dashboard::*;
pub use data::*;
pub use meta_api::*;
pub use relayer_client::*;
pub use whitelist::*;

/// Relayer package version, sent as the `version` header on v1 calls.
pub const PACKAGE_VERSION: &str = "3.0.0";

pub const META_TX_NATIVE_PATH: &str = "/api/v2/meta-tx/native";
pub const META_TX_NATIVE_V1_PATH: &str = "/api/v1/native";
pub const TRANSACTION_STATUS_PATH: &str = "/api/v1/native/transaction-status";
pub const META_API_PATH: &str = "/api/v1/meta-api";
pub const CHECK_LIMITS_PATH: &str = "/api/v1/dapp/checkLimits";
pub const CREATE_DAPP_PATH: &str = "/api/v1/dapp/public-api/create-dapp";
pub const ADD_CONTRACT_PATH: &str = "/api/v1/smart-contract/public-api/addContract";
pub const DELETE_CONTRACT_PATH: &str = "/api/v1/smart-contract/public-api/deleteContract";
pub const ADD_METHOD_PATH: &str = "/api/v1/meta-api/public-api/addMethod";
pub const DELETE_METHOD_PATH: &str = "/api/v1/meta-api/public-api/deleteMethod";
pub const WHITELIST_DESTINATION_PATH: &str = "/api/v1/dapp/whitelist/destination";
pub const WHITELIST_PROXY_PATH: &str = "/api/v1/dapp/whitelist/proxy-contracts";
pub const UNIQUE_USER_DATA_PATH: &str = "/api/v1/dapp/uniqueUserData";
pub const USER_LIMIT_PATH: &str = "/api/v1/dapp/user-limit";

/// Base URLs of the three services the SDK talks to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    /// Meta-tx v2, meta API, dashboard and whitelist.
    pub api: String,
    /// Usage statistics.
    pub data: String,
    /// Meta-tx v1 and transaction status.
    pub gasless: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            api: "https://api.biconomy.io".into(),
            data: "https://data.biconomy.io".into(),
            gasless: "https://gasless-meta-tx.prod.biconomy.io".into(),
        }
    }
}

impl Endpoints {
    /// Route every service to the same host (proxies, local stubs).
    pub fn single(base_url: &str) -> Self {
        let base = base_url.trim_end_matches('/').to_string();
        Self { api: base.clone(), data: base.clone(), gasless: base }
    }

    pub(crate) fn api_url(&self, path: &str) -> String {
        format!("{}{}", self.api.trim_end_matches('/'), path)
    }

    pub(crate) fn data_url(&self, path: &str) -> String {
        format!("{}{}", self.data.trim_end_matches('/'), path)
    }

    pub(crate) fn gasless_url(&self, path: &str) -> String {
        format!("{}{}", self.gasless.trim_end_matches('/'), path)
    }
}

/// Plain `{code, message, responseCode}` reply used by several endpoints.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GeneralResponse {
    pub code: i64,
    pub message: Option<String>,
    pub response_code: Option<i64>,
}
