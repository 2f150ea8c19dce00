//! Bindings for the Biconomy trusted forwarder (ERC20 forwarder) contract.
//!
//! - `Forwarder`: the contract ABI, generated with `sol!`
//! - [`forwarder_address`]: deployed forwarder per chain id
//! - [`ForwarderClient`]: read helpers over an alloy provider

#![allow(clippy::too_many_arguments)]

use alloy::primitives::{address, Address, Bytes, B256, U256};
use alloy::providers::Provider;
use bcnmy_types::{BcnmyError, Result};
use tracing::instrument;

alloy::sol! {
    #[derive(Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
    #[sol(rpc)]
    interface Forwarder {
        struct ERC20ForwardRequest {
            address from;
            address to;
            address token;
            uint256 txGas;
            uint256 tokenGasPrice;
            uint256 batchId;
            uint256 batchNonce;
            uint256 deadline;
            bytes data;
        }

        event DomainRegistered(bytes32 indexed domainSeparator, bytes domainValue);
        event OwnershipTransferred(address indexed previousOwner, address indexed newOwner);

        function EIP712_DOMAIN_TYPE() external view returns (string memory);
        function REQUEST_TYPEHASH() external view returns (bytes32);
        function domains(bytes32 separator) external view returns (bool);
        function getNonce(address from, uint256 batchId) external view returns (uint256);
        function isOwner() external view returns (bool);
        function owner() external view returns (address);

        function verifyEIP712(ERC20ForwardRequest calldata req, bytes32 domainSeparator, bytes calldata sig) external view;
        function verifyPersonalSign(ERC20ForwardRequest calldata req, bytes calldata sig) external view;

        function executeEIP712(ERC20ForwardRequest calldata req, bytes32 domainSeparator, bytes calldata sig) external returns (bool success, bytes memory ret);
        function executePersonalSign(ERC20ForwardRequest calldata req, bytes calldata sig) external returns (bool success, bytes memory ret);
        function registerDomainSeparator(string calldata name, string calldata version) external;
        function renounceOwnership() external;
        function transferOwnership(address newOwner) external;
    }
}

pub use Forwarder::ERC20ForwardRequest;

/// Deployed forwarder contracts, keyed by chain id.
pub const FORWARDER_ADDRESSES: &[(u64, Address)] = &[
    (1, address!("84a0856b038eaAd1cC7E297cF34A7e72685A8693")),
    (5, address!("E041608922d06a4F26C0d4c27d8bCD01daf1f792")),
    (56, address!("86C80a8aa58e0A4fa09A69624c31Ab2a6CAD56b8")),
    (97, address!("61456BF1715C1415730076BB79ae118E806E74d2")),
    (137, address!("f0511f123164602042ab2bCF02111fA5D3Fe97CD")),
    (80001, address!("69015912AA33720b842dCD6aC059Ed623F28d9f7")),
];

/// Look up the forwarder deployed on `chain_id`.
pub fn forwarder_address(chain_id: u64) -> Option<Address> {
    FORWARDER_ADDRESSES
        .iter()
        .find(|(id, _)| *id == chain_id)
        .map(|(_, addr)| *addr)
}

/// Read-side client for a deployed forwarder.
#[derive(Debug, Clone)]
pub struct ForwarderClient<P> {
    instance: Forwarder::ForwarderInstance<P>,
}

impl<P: Provider> ForwarderClient<P> {
    pub fn new(address: Address, provider: P) -> Self {
        Self { instance: Forwarder::new(address, provider) }
    }

    /// Connect to the forwarder registered for `chain_id`.
    pub fn for_chain(chain_id: u64, provider: P) -> Result<Self> {
        let address = forwarder_address(chain_id).ok_or(BcnmyError::UnsupportedChain(chain_id))?;
        Ok(Self::new(address, provider))
    }

    pub fn address(&self) -> Address {
        *self.instance.address()
    }

    /// Raw contract instance, for calls that need a funded sender.
    pub const fn instance(&self) -> &Forwarder::ForwarderInstance<P> {
        &self.instance
    }

    /// Current nonce of `from` within `batch_id`.
    #[instrument(skip(self), fields(forwarder = %self.address()))]
    pub async fn get_nonce(&self, from: Address, batch_id: U256) -> Result<U256> {
        self.instance
            .getNonce(from, batch_id)
            .call()
            .await
            .map_err(|e| BcnmyError::Rpc(format!("getNonce failed: {}", e)))
    }

    pub async fn request_typehash(&self) -> Result<B256> {
        self.instance
            .REQUEST_TYPEHASH()
            .call()
            .await
            .map_err(|e| BcnmyError::Rpc(format!("REQUEST_TYPEHASH failed: {}", e)))
    }

    pub async fn domain_type(&self) -> Result<String> {
        self.instance
            .EIP712_DOMAIN_TYPE()
            .call()
            .await
            .map_err(|e| BcnmyError::Rpc(format!("EIP712_DOMAIN_TYPE failed: {}", e)))
    }

    /// Whether `separator` was registered through `registerDomainSeparator`.
    pub async fn is_domain_registered(&self, separator: B256) -> Result<bool> {
        self.instance
            .domains(separator)
            .call()
            .await
            .map_err(|e| BcnmyError::Rpc(format!("domains failed: {}", e)))
    }

    pub async fn owner(&self) -> Result<Address> {
        self.instance
            .owner()
            .call()
            .await
            .map_err(|e| BcnmyError::Rpc(format!("owner failed: {}", e)))
    }

    /// Dry-run signature verification. A revert is returned as an error.
    #[instrument(skip_all, fields(forwarder = %self.address(), from = %req.from))]
    pub async fn verify_eip712(
        &self,
        req: ERC20ForwardRequest,
        domain_separator: B256,
        signature: Bytes,
    ) -> Result<()> {
        self.instance
            .verifyEIP712(req, domain_separator, signature)
            .call()
            .await
            .map(drop)
            .map_err(|e| BcnmyError::Rpc(format!("verifyEIP712 failed: {}", e)))
    }
}
