//! EIP-712 typed data for forwarder meta-transactions.
//!
//! Flow: MetaTxMessage → ERC20ForwardRequest → hashStruct → signing hash → signature
//!
//! The forwarder domain carries no `chainId` field. The chain id is encoded as
//! the domain `salt` (32-byte big-endian), so the domain type is
//! `EIP712Domain(string name,string version,address verifyingContract,bytes32 salt)`.

use std::borrow::Cow;

use alloy::primitives::{keccak256, Address, Bytes, Signature, B256, U256};
use alloy::signers::Signer;
use alloy::sol_types::{Eip712Domain, SolStruct};
use bcnmy_forwarder::ERC20ForwardRequest;
use bcnmy_types::{parse_u256, serde_u256, BcnmyError, Hex, Result};
use serde::{Deserialize, Serialize};

pub const FORWARD_REQUEST_NAME: &str = "Biconomy Forwarder";
pub const VERSION: &str = "1";
pub const FORWARD_REQUEST_TYPE: &str = "ERC20ForwardRequest";
pub const EIP712_DOMAIN_TYPE: &str =
    "EIP712Domain(string name,string version,address verifyingContract,bytes32 salt)";

/// `signatureType` values understood by the relayer.
pub const SIGNATURE_EIP712_TYPE: &str = "EIP712_SIGN";
pub const SIGNATURE_PERSONAL_TYPE: &str = "PERSONAL_SIGN";

/// Chain id left-padded to 32 bytes, used as the domain salt.
pub fn chain_salt(chain_id: u64) -> B256 {
    B256::from(U256::from(chain_id))
}

/// The EIP-712 domain of the forwarder at `forwarder` on `chain_id`.
pub fn forwarder_domain(forwarder: Address, chain_id: u64) -> Eip712Domain {
    Eip712Domain::new(
        Some(Cow::Borrowed(FORWARD_REQUEST_NAME)),
        Some(Cow::Borrowed(VERSION)),
        None,
        Some(forwarder),
        Some(chain_salt(chain_id)),
    )
}

/// Domain separator (`hashStruct(EIP712Domain)`) of the forwarder domain.
pub fn domain_separator(forwarder: Address, chain_id: u64) -> B256 {
    forwarder_domain(forwarder, chain_id).separator()
}

/// Type hash of `ERC20ForwardRequest`; equals the forwarder's `REQUEST_TYPEHASH`.
pub fn request_typehash() -> B256 {
    keccak256(ERC20ForwardRequest::eip712_encode_type().as_bytes())
}

/// A forward request as exchanged with the relayer (JSON, camelCase).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetaTxMessage {
    pub from: Address,
    pub to: Address,
    pub token: Address,
    pub tx_gas: u64,
    /// Decimal string.
    pub token_gas_price: String,
    #[serde(with = "serde_u256")]
    pub batch_id: U256,
    #[serde(with = "serde_u256")]
    pub batch_nonce: U256,
    #[serde(with = "serde_u256")]
    pub deadline: U256,
    pub data: Bytes,
}

impl MetaTxMessage {
    /// Convert into the on-chain struct. Fails on a non-numeric token gas price.
    pub fn to_forward_request(&self) -> Result<ERC20ForwardRequest> {
        Ok(ERC20ForwardRequest {
            from: self.from,
            to: self.to,
            token: self.token,
            txGas: U256::from(self.tx_gas),
            tokenGasPrice: parse_u256(&self.token_gas_price)?,
            batchId: self.batch_id,
            batchNonce: self.batch_nonce,
            deadline: self.deadline,
            data: self.data.clone(),
        })
    }

    /// `hashStruct(ERC20ForwardRequest)`.
    pub fn struct_hash(&self) -> Result<B256> {
        Ok(self.to_forward_request()?.eip712_hash_struct())
    }

    /// `keccak256(0x1901 ‖ domainSeparator ‖ hashStruct)`.
    pub fn signing_hash(&self, domain: &Eip712Domain) -> Result<B256> {
        Ok(self.to_forward_request()?.eip712_signing_hash(domain))
    }
}

/// Fails when `txGas` does not fit in a `u64`.
impl TryFrom<ERC20ForwardRequest> for MetaTxMessage {
    type Error = BcnmyError;

    fn try_from(req: ERC20ForwardRequest) -> Result<Self> {
        let tx_gas = u64::try_from(req.txGas)
            .map_err(|_| BcnmyError::InvalidNumber(format!("txGas {} exceeds u64", req.txGas)))?;
        Ok(Self {
            from: req.from,
            to: req.to,
            token: req.token,
            tx_gas,
            token_gas_price: req.tokenGasPrice.to_string(),
            batch_id: req.batchId,
            batch_nonce: req.batchNonce,
            deadline: req.deadline,
            data: req.data,
        })
    }
}

/// A message with its EIP-712 signature, ready for relayer submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedMetaTx {
    pub message: MetaTxMessage,
    pub domain_separator: B256,
    pub signature: Bytes,
}

impl SignedMetaTx {
    pub fn domain_separator_hex(&self) -> Hex {
        self.domain_separator.to_string()
    }

    pub fn signature_hex(&self) -> Hex {
        self.signature.to_string()
    }
}

/// Sign `message` under `domain`, producing a 65-byte `r ‖ s ‖ v` signature.
pub async fn sign_meta_tx<S: Signer + Sync>(
    signer: &S,
    message: &MetaTxMessage,
    domain: &Eip712Domain,
) -> Result<SignedMetaTx> {
    let hash = message.signing_hash(domain)?;
    let signature = signer
        .sign_hash(&hash)
        .await
        .map_err(|e| BcnmyError::Signer(e.to_string()))?;

    Ok(SignedMetaTx {
        message: message.clone(),
        domain_separator: domain.separator(),
        signature: Bytes::from(signature.as_bytes().to_vec()),
    })
}

/// Recover the address that produced `signature` over `message`.
pub fn recover_signer(
    message: &MetaTxMessage,
    domain: &Eip712Domain,
    signature: &[u8],
) -> Result<Address> {
    let hash = message.signing_hash(domain)?;
    let sig = Signature::from_raw(signature).map_err(|e| BcnmyError::Signer(e.to_string()))?;
    sig.recover_address_from_prehash(&hash)
        .map_err(|e| BcnmyError::Signer(e.to_string()))
}

/// Check a caller-supplied struct hash and return the domain separator.
///
/// Used when the signature and hash were produced elsewhere (e.g. a browser
/// wallet) and only need to be forwarded to the relayer.
pub fn build_transact_params(
    message: &MetaTxMessage,
    domain: &Eip712Domain,
    typed_data_hash: B256,
) -> Result<B256> {
    let computed = message.struct_hash()?;
    if computed != typed_data_hash {
        let err = BcnmyError::HashMismatch {
            computed: computed.to_string(),
            expected: typed_data_hash.to_string(),
        };
        tracing::error!(%err, "typed data hash check failed");
        return Err(err);
    }
    Ok(domain.separator())
}
