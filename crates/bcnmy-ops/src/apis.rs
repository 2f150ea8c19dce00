use std::collections::HashMap;

use alloy::primitives::Address;
use bcnmy_relayer::MetaApiInfo;
use bcnmy_types::{BcnmyError, Result};
use tracing::debug;

/// A relayer api id registered for one contract method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiEntry {
    pub id: String,
    pub name: String,
    pub contract_address: Address,
}

/// Api ids keyed by `(contract, method)`.
#[derive(Debug, Clone, Default)]
pub struct ApiIdRegistry {
    entries: HashMap<(Address, String), ApiEntry>,
}

impl ApiIdRegistry {
    /// Build from a meta-API listing, skipping entries without a contract address.
    pub fn from_listing(apis: &[MetaApiInfo]) -> Self {
        let mut registry = Self::default();
        for info in apis {
            let Some(contract) = info
                .contract_address
                .as_deref()
                .and_then(|a| a.parse::<Address>().ok())
            else {
                debug!(id = %info.id, method = %info.method, "skipping api without contract address");
                continue;
            };
            registry.insert(
                contract,
                &info.method,
                ApiEntry { id: info.id.clone(), name: info.name.clone(), contract_address: contract },
            );
        }
        registry
    }

    pub fn insert(&mut self, contract: Address, method: &str, entry: ApiEntry) {
        self.entries.insert((contract, method.to_string()), entry);
    }

    pub fn get(&self, contract: Address, method: &str) -> Option<&ApiEntry> {
        self.entries.get(&(contract, method.to_string()))
    }

    pub fn require(&self, contract: Address, method: &str) -> Result<&ApiEntry> {
        self.get(contract, method).ok_or_else(|| BcnmyError::ApiIdNotFound {
            contract: contract.to_checksum(None),
            method: method.to_string(),
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
