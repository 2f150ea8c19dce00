//! Mocked providers and canned chain data.

use alloy::consensus::transaction::Recovered;
use alloy::consensus::{SignableTransaction, TxEnvelope, TxLegacy};
use alloy::primitives::{Address, Bytes, Signature, TxKind, B256, U256};
use alloy::providers::{DynProvider, Provider, ProviderBuilder};
use alloy::rpc::types::Transaction;
use alloy::transports::mock::Asserter;
use serde_json::{json, Value};

/// Provider answering from the returned asserter's queue, in call order.
pub(crate) fn mocked_provider() -> (DynProvider, Asserter) {
    let asserter = Asserter::new();
    let provider = ProviderBuilder::new().connect_mocked_client(asserter.clone()).erased();
    (provider, asserter)
}

/// Signed legacy transaction from `from` to `to`, as returned by
/// `eth_getTransactionByHash` once mined in block 16.
pub(crate) fn mined_transaction(from: Address, to: Address) -> Transaction {
    let tx = TxLegacy {
        chain_id: Some(80001),
        nonce: 3,
        gas_price: 1_000_000_000,
        gas_limit: 150_000,
        to: TxKind::Call(to),
        value: U256::ZERO,
        input: Bytes::from_static(&[0xde, 0xad, 0xbe, 0xef]),
    };
    let signed = tx.into_signed(Signature::new(U256::from(1), U256::from(2), false));
    Transaction {
        inner: Recovered::new_unchecked(TxEnvelope::Legacy(signed), from),
        block_hash: Some(B256::repeat_byte(0x0b)),
        block_number: Some(16),
        transaction_index: Some(0),
        effective_gas_price: Some(1_000_000_000),
    }
}

pub(crate) fn receipt_json(hash: B256, from: Address, to: Address) -> Value {
    json!({
        "type": "0x0",
        "status": "0x1",
        "cumulativeGasUsed": "0x5208",
        "logs": [],
        "logsBloom": format!("0x{}", "00".repeat(256)),
        "transactionHash": hash,
        "transactionIndex": "0x0",
        "blockHash": B256::repeat_byte(0x0b),
        "blockNumber": "0x10",
        "gasUsed": "0x5208",
        "effectiveGasPrice": "0x3b9aca00",
        "from": from,
        "to": to,
        "contractAddress": null
    })
}
