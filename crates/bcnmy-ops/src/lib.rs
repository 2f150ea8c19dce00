//! Meta-transaction orchestration against a dapp behind the Biconomy forwarder.
//!
//! [`Bcnmy`] ties together the forwarder contract, the relayer client and the
//! dapp ABI:
//! - `raw_transact`: pack, estimate, sign and relay a call, then wait for it
//! - `enhance_transact`: relay a message signed elsewhere (e.g. a browser)
//! - `check_limits`: query relayer limits for a dapp method

pub mod apis;
pub mod config;
pub mod wait;

#[cfg(test)]
mod test_utils;

pub use apis::{ApiEntry, ApiIdRegistry};
pub use config::BcnmyConfig;
pub use wait::{fetch_transaction, wait_mined};

use alloy::dyn_abi::{DynSolValue, JsonAbiExt};
use alloy::json_abi::JsonAbi;
use alloy::network::TransactionBuilder;
use alloy::primitives::{Address, Bytes, B256, U256};
use alloy::providers::{DynProvider, Provider, ProviderBuilder};
use alloy::rpc::types::{Transaction, TransactionReceipt, TransactionRequest};
use alloy::signers::Signer;
use alloy::sol_types::Eip712Domain;
use bcnmy_eip712::{forwarder_domain, sign_meta_tx, MetaTxMessage};
use bcnmy_forwarder::ForwarderClient;
use bcnmy_relayer::{CheckLimitResponse, MetaTxRequest, MetaTxResponse, RelayerClient};
use bcnmy_types::{BcnmyError, Result};
use tracing::{debug, error, info, instrument};

/// Target contract of the meta-transactions.
#[derive(Debug, Clone)]
pub struct Dapp {
    pub abi: JsonAbi,
    pub address: Address,
}

impl Dapp {
    pub fn new(json_abi: &str, address: Address) -> Result<Self> {
        let abi: JsonAbi = serde_json::from_str(json_abi).map_err(|e| {
            error!(%e, "dapp abi parse failed");
            BcnmyError::Abi(format!("invalid json abi: {}", e))
        })?;
        Ok(Self { abi, address })
    }

    /// Selector-prefixed calldata for `method`, choosing the overload with
    /// a matching number of inputs.
    pub fn pack(&self, method: &str, params: &[DynSolValue]) -> Result<Bytes> {
        let overloads = self
            .abi
            .function(method)
            .ok_or_else(|| BcnmyError::Abi(format!("method {} not found in abi", method)))?;
        let function = overloads
            .iter()
            .find(|f| f.inputs.len() == params.len())
            .ok_or_else(|| {
                BcnmyError::Abi(format!("no {} overload takes {} arguments", method, params.len()))
            })?;
        function
            .abi_encode_input(params)
            .map(Bytes::from)
            .map_err(|e| BcnmyError::Abi(format!("{} encode failed: {}", method, e)))
    }
}

/// Everything known about a relayed call once it is mined.
#[derive(Debug, Clone)]
pub struct TransactOutcome {
    pub response: MetaTxResponse,
    pub transaction: Transaction,
    pub receipt: TransactionReceipt,
}

/// Meta-transaction client bound to one chain and, optionally, one dapp.
#[derive(Debug, Clone)]
pub struct Bcnmy<P> {
    provider: P,
    config: BcnmyConfig,
    chain_id: u64,
    forwarder: ForwarderClient<P>,
    relayer: RelayerClient,
    registry: ApiIdRegistry,
    dapp: Option<Dapp>,
}

impl Bcnmy<DynProvider> {
    /// Connect over HTTP JSON-RPC.
    pub async fn connect(rpc_url: &str, config: BcnmyConfig) -> Result<Self> {
        let url: reqwest::Url = rpc_url
            .parse()
            .map_err(|e| BcnmyError::Rpc(format!("invalid rpc url {}: {}", rpc_url, e)))?;
        let provider = ProviderBuilder::new().connect_http(url).erased();
        Self::new(provider, config).await
    }
}

impl<P: Provider + Clone> Bcnmy<P> {
    /// Resolve the chain's forwarder and load the api ids registered for the
    /// configured api key.
    #[instrument(skip_all)]
    pub async fn new(provider: P, config: BcnmyConfig) -> Result<Self> {
        let chain_id = provider.get_chain_id().await.map_err(|e| {
            error!(%e, "chain id lookup failed");
            BcnmyError::Rpc(format!("eth_chainId failed: {}", e))
        })?;

        let forwarder = ForwarderClient::for_chain(chain_id, provider.clone()).inspect_err(|e| {
            error!(%e, "no forwarder for chain");
        })?;

        let mut relayer = RelayerClient::new(&config.api_key, Some(config.timeout_ms))
            .with_endpoints(config.endpoints.clone())
            .with_poll_interval(config.sleep_time())
            .with_status_retries(config.status_retries);
        if let Some(token) = &config.auth_token {
            relayer = relayer.with_auth_token(token);
        }

        let listing = relayer.get_meta_api().await?;
        let registry = ApiIdRegistry::from_listing(&listing.list_apis);
        info!(chain_id, forwarder = %forwarder.address(), apis = registry.len(), "bcnmy client ready");

        Ok(Self { provider, config, chain_id, forwarder, relayer, registry, dapp: None })
    }

    pub fn with_dapp(mut self, json_abi: &str, address: Address) -> Result<Self> {
        self.dapp = Some(Dapp::new(json_abi, address)?);
        Ok(self)
    }

    pub fn with_auth_token(mut self, auth_token: &str) -> Self {
        self.config.auth_token = Some(auth_token.to_string());
        self.relayer = self.relayer.with_auth_token(auth_token);
        self
    }

    pub fn with_timeout(mut self, timeout: std::time::Duration) -> Self {
        self.config = self.config.with_timeout(timeout);
        self.relayer = self.relayer.with_timeout(timeout);
        self
    }

    pub fn with_sleep_time_secs(mut self, secs: u64) -> Self {
        self.config.sleep_time_secs = secs;
        self.relayer = self.relayer.with_poll_interval(self.config.sleep_time());
        self
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub fn config(&self) -> &BcnmyConfig {
        &self.config
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    pub fn forwarder(&self) -> &ForwarderClient<P> {
        &self.forwarder
    }

    pub fn relayer(&self) -> &RelayerClient {
        &self.relayer
    }

    pub fn registry(&self) -> &ApiIdRegistry {
        &self.registry
    }

    pub fn dapp(&self) -> Result<&Dapp> {
        self.dapp.as_ref().ok_or(BcnmyError::DappNotConfigured)
    }

    /// `User <token>`, as sent to the whitelist APIs.
    pub fn authorization(&self) -> Result<String> {
        self.relayer.authorization()
    }

    /// EIP-712 domain of this chain's forwarder.
    pub fn domain(&self) -> Eip712Domain {
        forwarder_domain(self.forwarder.address(), self.chain_id)
    }

    pub fn pack(&self, method: &str, params: &[DynSolValue]) -> Result<Bytes> {
        self.dapp()?.pack(method, params)
    }

    /// Verify a struct hash computed elsewhere and return the domain separator.
    pub fn build_transact_params(&self, message: &MetaTxMessage, typed_data_hash: B256) -> Result<B256> {
        bcnmy_eip712::build_transact_params(message, &self.domain(), typed_data_hash)
    }

    fn api_id(&self, method: &str) -> Result<(Address, String)> {
        let dapp = self.dapp()?;
        let entry = self.registry.require(dapp.address, method).inspect_err(|e| {
            error!(%e, "api id lookup failed");
        })?;
        Ok((dapp.address, entry.id.clone()))
    }

    /// Relayer limits for `from` calling `method` on the dapp.
    pub async fn check_limits(&self, from: Address, method: &str) -> Result<CheckLimitResponse> {
        let (_, api_id) = self.api_id(method)?;
        self.relayer.check_limits(&from.to_checksum(None), &api_id).await
    }

    /// Sign `method(params)` as `signer`, relay it and wait until it is mined.
    #[instrument(skip(self, signer, params), fields(from = %signer.address()))]
    pub async fn raw_transact<S: Signer + Sync>(
        &self,
        signer: &S,
        method: &str,
        params: &[DynSolValue],
    ) -> Result<TransactOutcome> {
        let (dapp_address, api_id) = self.api_id(method)?;
        let data = self.pack(method, params).inspect_err(|e| error!(%e, "abi pack failed"))?;
        let from = signer.address();

        let call = TransactionRequest::default()
            .with_from(from)
            .with_to(dapp_address)
            .with_input(data.clone());
        let tx_gas = self.provider.estimate_gas(call).await.map_err(|e| {
            error!(%e, "gas estimation failed");
            BcnmyError::Rpc(format!("eth_estimateGas failed: {}", e))
        })?;

        let batch_id = U256::from(self.config.batch_id);
        let batch_nonce = self.forwarder.get_nonce(from, batch_id).await?;
        let deadline = chrono::Utc::now().timestamp().unsigned_abs() + self.config.deadline_secs;

        let message = MetaTxMessage {
            from,
            to: dapp_address,
            token: Address::ZERO,
            tx_gas,
            token_gas_price: "0".to_string(),
            batch_id,
            batch_nonce,
            deadline: U256::from(deadline),
            data,
        };

        let signed = sign_meta_tx(signer, &message, &self.domain())
            .await
            .inspect_err(|e| error!(%e, "typed data signing failed"))?;
        let request = MetaTxRequest::from_signed(&api_id, &signed)?;
        debug!(message = %bcnmy_types::to_json_pretty(&message), "meta transaction message");

        self.submit_and_confirm(&request).await
    }

    /// Relay a message signed by a frontend, after checking its struct hash.
    #[instrument(skip(self, signature, message))]
    pub async fn enhance_transact(
        &self,
        from: Address,
        method: &str,
        signature: &[u8],
        message: &MetaTxMessage,
        typed_data_hash: B256,
    ) -> Result<TransactOutcome> {
        let (dapp_address, api_id) = self.api_id(method)?;
        let domain_separator = self.build_transact_params(message, typed_data_hash)?;
        let request = MetaTxRequest::eip712(
            &from.to_checksum(None),
            dapp_address,
            &api_id,
            message,
            domain_separator,
            signature,
        )?;
        debug!(message = %bcnmy_types::to_json_pretty(message), "meta transaction message");

        self.submit_and_confirm(&request).await
    }

    async fn submit_and_confirm(&self, request: &MetaTxRequest) -> Result<TransactOutcome> {
        let response = self
            .relayer
            .send_meta_native_tx(request)
            .await
            .inspect_err(|e| error!(%e, "meta transaction failed"))?;
        let hash = response
            .relayed_hash()
            .ok_or_else(|| BcnmyError::Other("relayer returned no transaction hash".into()))?;
        info!(%hash, "meta transaction relayed");

        let receipt = wait_mined(
            &self.provider,
            hash,
            self.config.receipt_poll_interval(),
            self.config.receipt_max_attempts,
        )
        .await
        .inspect_err(|e| error!(%e, "wait mined failed"))?;

        let transaction = fetch_transaction(
            &self.provider,
            hash,
            self.config.tx_lookup_retries,
            self.config.sleep_time(),
        )
        .await?;

        Ok(TransactOutcome { response, transaction, receipt })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{mined_transaction, mocked_provider, receipt_json};
    use alloy::network::TransactionResponse;
    use alloy::primitives::{address, U64};
    use alloy::signers::local::PrivateKeySigner;
    use alloy::sol_types::SolCall;
    use alloy::transports::mock::Asserter;
    use bcnmy_relayer::test_utils::{json_response, request_body, StubServer};
    use bcnmy_relayer::Endpoints;
    use serde_json::{json, Value};

    alloy::sol! {
        function transfer(address to, uint256 amount) external returns (bool);
    }

    const ERC20_ABI: &str = r#"[
        {"type":"function","name":"transfer","stateMutability":"nonpayable",
         "inputs":[{"name":"to","type":"address"},{"name":"amount","type":"uint256"}],
         "outputs":[{"name":"","type":"bool"}]},
        {"type":"function","name":"burn","stateMutability":"nonpayable",
         "inputs":[{"name":"amount","type":"uint256"}],"outputs":[]},
        {"type":"function","name":"burn","stateMutability":"nonpayable",
         "inputs":[{"name":"from","type":"address"},{"name":"amount","type":"uint256"}],"outputs":[]}
    ]"#;

    const DAPP: Address = address!("56b71565f6e7f9de4c3217a6e5d4133bc7fc67eb");
    const RECIPIENT: Address = address!("6a22dda833c14ca6189f32e0dbcdf41ac2a3c951");
    const MUMBAI_FORWARDER: Address = address!("69015912AA33720b842dCD6aC059Ed623F28d9f7");

    fn listing() -> String {
        json_response(
            200,
            &json!({
                "log": "ok",
                "flag": 143,
                "total": 2,
                "listApis": [
                    { "contractAddress": DAPP.to_string(), "id": "api-transfer", "name": "Transfer", "method": "transfer" },
                    { "contractAddress": "", "id": "api-wallet", "name": "Wallet", "method": "execute" }
                ]
            })
            .to_string(),
        )
    }

    fn relayed(hash: B256) -> String {
        json_response(
            200,
            &json!({ "txHash": hash, "flag": 200, "log": "Meta transaction sent to blockchain" }).to_string(),
        )
    }

    fn config_for(url: &str) -> BcnmyConfig {
        BcnmyConfig {
            endpoints: Endpoints::single(url),
            receipt_poll_ms: 5,
            sleep_time_secs: 0,
            ..BcnmyConfig::new("test-key")
        }
    }

    /// Client on chain 80001 whose relayer is `server`; its listing must be
    /// the server's first reply.
    async fn connected(server: &StubServer) -> (Bcnmy<DynProvider>, Asserter) {
        let (provider, asserter) = mocked_provider();
        asserter.push_success(&U64::from(80001u64));
        let bcnmy = Bcnmy::new(provider, config_for(&server.url()))
            .await
            .unwrap()
            .with_dapp(ERC20_ABI, DAPP)
            .unwrap();
        (bcnmy, asserter)
    }

    fn submitted(raw: &str) -> Value {
        serde_json::from_str(request_body(raw)).unwrap()
    }

    fn transfer_params() -> [DynSolValue; 2] {
        [DynSolValue::Address(RECIPIENT), DynSolValue::Uint(U256::from(5), 256)]
    }

    #[test]
    fn test_pack_matches_sol_encoding() {
        let dapp = Dapp::new(ERC20_ABI, DAPP).unwrap();
        let packed = dapp
            .pack("transfer", &[DynSolValue::Address(RECIPIENT), DynSolValue::Uint(U256::from(100_000u64), 256)])
            .unwrap();
        let expected = transferCall { to: RECIPIENT, amount: U256::from(100_000u64) }.abi_encode();
        assert_eq!(&packed[..], expected.as_slice());
        assert_eq!(&packed[..4], &[0xa9, 0x05, 0x9c, 0xbb]);
    }

    #[test]
    fn test_pack_picks_overload_by_arity() {
        let dapp = Dapp::new(ERC20_ABI, DAPP).unwrap();
        let one = dapp.pack("burn", &[DynSolValue::Uint(U256::from(1), 256)]).unwrap();
        let two = dapp
            .pack("burn", &[DynSolValue::Address(Address::ZERO), DynSolValue::Uint(U256::from(1), 256)])
            .unwrap();
        assert_eq!(one.len(), 4 + 32);
        assert_eq!(two.len(), 4 + 64);
        assert_ne!(one[..4], two[..4]);

        assert!(matches!(dapp.pack("burn", &[]), Err(BcnmyError::Abi(_))));
        assert!(matches!(dapp.pack("mint", &[]), Err(BcnmyError::Abi(_))));
    }

    #[test]
    fn test_invalid_abi() {
        assert!(matches!(Dapp::new("not json", DAPP), Err(BcnmyError::Abi(_))));
    }

    #[tokio::test]
    async fn test_new_loads_forwarder_and_registry() {
        let server = StubServer::start(vec![listing()]).await;
        let (provider, asserter) = mocked_provider();
        asserter.push_success(&U64::from(80001u64));
        let bcnmy = Bcnmy::new(provider, config_for(&server.url()))
            .await
            .unwrap()
            .with_auth_token("tok");

        assert_eq!(bcnmy.chain_id(), 80001);
        assert_eq!(bcnmy.forwarder().address(), MUMBAI_FORWARDER);
        assert_eq!(bcnmy.registry().len(), 1);
        assert_eq!(bcnmy.authorization().unwrap(), "User tok");
        assert_eq!(bcnmy.domain().salt, Some(B256::from(U256::from(80001u64))));
        assert!(matches!(bcnmy.dapp(), Err(BcnmyError::DappNotConfigured)));

        let requests = server.finish().await;
        assert!(requests[0].starts_with("GET /api/v1/meta-api"));
    }

    #[tokio::test]
    async fn test_new_rejects_unsupported_chain() {
        let server = StubServer::start(vec![]).await;
        let (provider, asserter) = mocked_provider();
        asserter.push_success(&U64::from(12345u64));

        let Err(err) = Bcnmy::new(provider, config_for(&server.url())).await else {
            panic!("chain 12345 has no forwarder");
        };
        assert!(matches!(err, BcnmyError::UnsupportedChain(12345)));
        assert!(server.finish().await.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_method_fails_before_rpc() {
        let server = StubServer::start(vec![listing()]).await;
        let (bcnmy, _asserter) = connected(&server).await;
        let signer = PrivateKeySigner::random();

        let err = bcnmy.raw_transact(&signer, "burn", &[]).await.unwrap_err();
        assert!(matches!(err, BcnmyError::ApiIdNotFound { ref method, .. } if method == "burn"));
        assert_eq!(server.finish().await.len(), 1);
    }

    #[tokio::test]
    async fn test_raw_transact_signs_and_submits() {
        let server = StubServer::start(vec![
            listing(),
            json_response(409, r#"{"code":150,"message":"DApp limit reached","allowed":false}"#),
        ])
        .await;
        let (bcnmy, asserter) = connected(&server).await;
        asserter.push_success(&U64::from(150_000u64));
        asserter.push_success(&B256::from(U256::from(7u64)));
        let signer = PrivateKeySigner::random();

        let err = bcnmy.raw_transact(&signer, "transfer", &transfer_params()).await.unwrap_err();
        assert!(matches!(err, BcnmyError::Rejected { code: 150, .. }));

        let requests = server.finish().await;
        assert_eq!(requests.len(), 2);
        assert!(requests[1].starts_with("POST /api/v2/meta-tx/native"));

        let body = submitted(&requests[1]);
        assert_eq!(body["apiId"], "api-transfer");
        assert_eq!(body["signatureType"], "EIP712_SIGN");

        let params = body["params"].as_array().unwrap();
        let message: MetaTxMessage = serde_json::from_value(params[0].clone()).unwrap();
        assert_eq!(message.from, signer.address());
        assert_eq!(message.to, DAPP);
        assert_eq!(message.tx_gas, 150_000);
        assert_eq!(message.batch_nonce, U256::from(7));
        assert_eq!(message.token_gas_price, "0");
        assert_eq!(
            &message.data[..],
            transferCall { to: RECIPIENT, amount: U256::from(5) }.abi_encode().as_slice()
        );

        let domain = bcnmy.domain();
        assert_eq!(params[1], domain.separator().to_string());
        let signature = bcnmy_types::hex_to_bytes(params[2].as_str().unwrap()).unwrap();
        let recovered = bcnmy_eip712::recover_signer(&message, &domain, &signature).unwrap();
        assert_eq!(recovered, signer.address());
    }

    #[tokio::test]
    async fn test_raw_transact_waits_for_mined_transaction() {
        let signer = PrivateKeySigner::random();
        let tx = mined_transaction(signer.address(), DAPP);
        let hash = tx.tx_hash();

        let server = StubServer::start(vec![listing(), relayed(hash)]).await;
        let (bcnmy, asserter) = connected(&server).await;
        asserter.push_success(&U64::from(150_000u64));
        asserter.push_success(&B256::from(U256::from(3u64)));
        asserter.push_success(&Value::Null);
        asserter.push_success(&receipt_json(hash, signer.address(), MUMBAI_FORWARDER));
        asserter.push_success(&Value::Null);
        asserter.push_success(&tx);

        let outcome = bcnmy.raw_transact(&signer, "transfer", &transfer_params()).await.unwrap();
        assert_eq!(outcome.response.relayed_hash(), Some(hash));
        assert_eq!(outcome.receipt.transaction_hash, hash);
        assert_eq!(outcome.transaction.tx_hash(), hash);
        assert_eq!(outcome.transaction.block_number, Some(16));

        let requests = server.finish().await;
        assert_eq!(requests.len(), 2);
        let body = submitted(&requests[1]);
        assert_eq!(body["params"][0]["batchNonce"], 3);
    }

    #[tokio::test]
    async fn test_enhance_transact_relays_frontend_signature() {
        let signer = PrivateKeySigner::random();
        let tx = mined_transaction(signer.address(), DAPP);
        let hash = tx.tx_hash();

        let server = StubServer::start(vec![listing(), relayed(hash)]).await;
        let (bcnmy, asserter) = connected(&server).await;
        asserter.push_success(&receipt_json(hash, signer.address(), MUMBAI_FORWARDER));
        asserter.push_success(&tx);

        let message = MetaTxMessage {
            from: signer.address(),
            to: DAPP,
            token: Address::ZERO,
            tx_gas: 100_000,
            token_gas_price: "0".into(),
            batch_id: U256::ZERO,
            batch_nonce: U256::from(4),
            deadline: U256::from(1_700_000_000u64),
            data: transferCall { to: RECIPIENT, amount: U256::from(5) }.abi_encode().into(),
        };
        let signed = sign_meta_tx(&signer, &message, &bcnmy.domain()).await.unwrap();

        let outcome = bcnmy
            .enhance_transact(
                signer.address(),
                "transfer",
                &signed.signature,
                &message,
                message.struct_hash().unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(outcome.receipt.transaction_hash, hash);
        assert_eq!(outcome.transaction.tx_hash(), hash);

        let requests = server.finish().await;
        let body = submitted(&requests[1]);
        assert_eq!(body["from"], signer.address().to_checksum(None));
        assert_eq!(body["apiId"], "api-transfer");
        assert_eq!(body["params"][1], signed.domain_separator_hex());
        assert_eq!(body["params"][2], signed.signature_hex());
    }

    #[tokio::test]
    async fn test_enhance_transact_rejects_hash_mismatch() {
        let server = StubServer::start(vec![listing()]).await;
        let (bcnmy, _asserter) = connected(&server).await;
        let message = MetaTxMessage {
            from: Address::repeat_byte(1),
            to: DAPP,
            token: Address::ZERO,
            tx_gas: 100_000,
            token_gas_price: "0".into(),
            batch_id: U256::ZERO,
            batch_nonce: U256::ZERO,
            deadline: U256::from(1_700_000_000u64),
            data: Bytes::new(),
        };

        let err = bcnmy
            .enhance_transact(Address::repeat_byte(1), "transfer", &[0u8; 65], &message, B256::ZERO)
            .await
            .unwrap_err();
        assert!(matches!(err, BcnmyError::HashMismatch { .. }));

        let separator = bcnmy
            .build_transact_params(&message, message.struct_hash().unwrap())
            .unwrap();
        assert_eq!(separator, bcnmy_eip712::domain_separator(MUMBAI_FORWARDER, 80001));
        assert_eq!(server.finish().await.len(), 1);
    }
}
