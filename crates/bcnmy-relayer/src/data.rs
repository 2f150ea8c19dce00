//! Usage statistics from the data service.

use alloy::primitives::U256;
use bcnmy_types::Result;
use chrono::NaiveDate;
use reqwest::RequestBuilder;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::relayer_client::RelayerClient;
use crate::{UNIQUE_USER_DATA_PATH, USER_LIMIT_PATH};

/// Date format the data service expects, e.g. `01-21-2022`.
pub const DATA_DATE_FORMAT: &str = "%m-%d-%Y";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UniqueUserDataRequest {
    pub start_date: String,
    pub end_date: String,
}

impl UniqueUserDataRequest {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            start_date: start.format(DATA_DATE_FORMAT).to_string(),
            end_date: end.format(DATA_DATE_FORMAT).to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UniqueUserDataResponse {
    pub code: i64,
    pub message: Option<String>,
    pub response_code: Option<i64>,
    #[serde(alias = "UniqueUserData")]
    pub unique_user_data: Vec<UniqueUserDay>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct UniqueUserDay {
    pub date: String,
    pub count: i64,
    pub addresses: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserLimitRequest {
    pub signer_address: String,
    pub api_id: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UserLimitResponse {
    pub code: i64,
    pub message: Option<String>,
    pub response_code: Option<i64>,
    pub user_limit_data: UserLimitData,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UserLimitData {
    pub limit_left: LimitLeft,
    pub limit_type: Option<String>,
    #[serde(with = "bcnmy_types::serde_u256::option")]
    pub limit_start_time: Option<U256>,
    #[serde(with = "bcnmy_types::serde_u256::option")]
    pub limit_end_time: Option<U256>,
    pub time_period_in_days: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LimitLeft {
    pub signer_address: String,
    pub transaction_limit_left: f64,
    pub transaction_count: i64,
    pub are_limits_consumed: bool,
    pub user_transaction_limit: i64,
}

impl RelayerClient {
    /// GET on the data host with a form body and dashboard headers.
    pub(crate) fn data_request<T: Serialize + ?Sized>(&self, path: &str, form: &T) -> Result<RequestBuilder> {
        Ok(self
            .http()
            .get(self.endpoints().data_url(path))
            .header("authToken", self.require_auth_token()?)
            .header("apiKey", self.api_key())
            .form(form)
            .timeout(self.timeout()))
    }

    /// Unique users per day between two dates, inclusive.
    #[instrument(skip(self))]
    pub async fn get_unique_user_data(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<UniqueUserDataResponse> {
        let form = UniqueUserDataRequest::new(start, end);
        let request = self.data_request(UNIQUE_USER_DATA_PATH, &form)?;
        self.send_json(request, "unique user data").await
    }

    #[instrument(skip(self))]
    pub async fn get_user_limit(&self, signer_address: &str, api_id: &str) -> Result<UserLimitResponse> {
        let form = UserLimitRequest {
            signer_address: signer_address.to_string(),
            api_id: api_id.to_string(),
        };
        let request = self.data_request(USER_LIMIT_PATH, &form)?;
        self.send_json(request, "user limit").await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{json_response, StubServer};
    use crate::Endpoints;

    #[test]
    fn test_date_format() {
        let req = UniqueUserDataRequest::new(
            NaiveDate::from_ymd_opt(2022, 1, 21).unwrap(),
            NaiveDate::from_ymd_opt(2022, 12, 3).unwrap(),
        );
        assert_eq!(req.start_date, "01-21-2022");
        assert_eq!(req.end_date, "12-03-2022");
    }

    #[test]
    fn test_data_request_targets_data_host() {
        let client = RelayerClient::new("key", None).with_auth_token("tok");
        let form = UserLimitRequest { signer_address: "0xabc".into(), api_id: "id".into() };
        let req = client.data_request(USER_LIMIT_PATH, &form).unwrap().build().unwrap();
        assert_eq!(req.url().as_str(), "https://data.biconomy.io/api/v1/dapp/user-limit");
        assert_eq!(req.method(), reqwest::Method::GET);
        assert_eq!(req.body().unwrap().as_bytes().unwrap(), b"signerAddress=0xabc&apiId=id");
        assert_eq!(req.headers()["apiKey"], "key");
    }

    #[test]
    fn test_user_limit_response() {
        let resp: UserLimitResponse = serde_json::from_str(
            r#"{
                "code": 200,
                "message": "ok",
                "userLimitData": {
                    "limitLeft": {
                        "signerAddress": "0xabc",
                        "transactionLimitLeft": 9,
                        "transactionCount": 1,
                        "areLimitsConsumed": false,
                        "userTransactionLimit": 10
                    },
                    "limitType": "transaction",
                    "limitStartTime": 1684800000000,
                    "limitEndTime": 1684886400000,
                    "timePeriodInDays": 1
                }
            }"#,
        )
        .unwrap();
        let data = resp.user_limit_data;
        assert_eq!(data.limit_left.transaction_limit_left, 9.0);
        assert_eq!(data.limit_start_time, Some(U256::from(1_684_800_000_000u64)));
        assert_eq!(data.time_period_in_days, 1);
    }

    #[tokio::test]
    async fn test_get_unique_user_data() {
        let server = StubServer::start(vec![json_response(
            200,
            r#"{"code":200,"message":"ok","uniqueUserData":[{"date":"01-21-2022","count":2,"addresses":["0xa","0xb"]}]}"#,
        )])
        .await;
        let client = RelayerClient::new("key", Some(2_000))
            .with_auth_token("tok")
            .with_endpoints(Endpoints::single(&server.url()));
        let resp = client
            .get_unique_user_data(
                NaiveDate::from_ymd_opt(2022, 1, 21).unwrap(),
                NaiveDate::from_ymd_opt(2022, 1, 22).unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.unique_user_data[0].count, 2);

        let requests = server.finish().await;
        assert!(requests[0].ends_with("startDate=01-21-2022&endDate=01-22-2022"));
    }
}
