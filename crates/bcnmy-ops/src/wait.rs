//! Bounded polling for relayed transactions.

use std::time::Duration;

use alloy::primitives::B256;
use alloy::providers::Provider;
use alloy::rpc::types::{Transaction, TransactionReceipt};
use bcnmy_types::{BcnmyError, Result};
use tracing::{debug, warn};

/// Poll for the receipt of `hash` every `interval`, up to `max_attempts` times.
pub async fn wait_mined<P: Provider>(
    provider: &P,
    hash: B256,
    interval: Duration,
    max_attempts: u32,
) -> Result<TransactionReceipt> {
    for attempt in 1..=max_attempts {
        match provider.get_transaction_receipt(hash).await {
            Ok(Some(receipt)) => return Ok(receipt),
            Ok(None) => debug!(%hash, attempt, "transaction not yet mined"),
            Err(e) => warn!(%hash, attempt, %e, "receipt retrieval failed"),
        }
        if attempt < max_attempts {
            tokio::time::sleep(interval).await;
        }
    }
    Err(BcnmyError::RetriesExhausted {
        what: format!("receipt for {}", hash),
        attempts: max_attempts,
    })
}

/// Look up a mined transaction, retrying while the node has not indexed it.
pub async fn fetch_transaction<P: Provider>(
    provider: &P,
    hash: B256,
    retries: u32,
    sleep: Duration,
) -> Result<Transaction> {
    for attempt in 1..=retries {
        match provider.get_transaction_by_hash(hash).await {
            Ok(Some(tx)) => return Ok(tx),
            Ok(None) => warn!(%hash, attempt, retries, "transaction not found"),
            Err(e) => warn!(%hash, attempt, retries, %e, "transaction lookup failed"),
        }
        if attempt < retries {
            tokio::time::sleep(sleep).await;
        }
    }
    Err(BcnmyError::RetriesExhausted {
        what: format!("transaction {}", hash),
        attempts: retries,
    })
}
