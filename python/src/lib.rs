use pyo3::prelude::*;
use pyo3::exceptions::PyValueError;
use alloy::primitives::{Address, B256};

use bcnmy_eip712::{forwarder_domain, MetaTxMessage};
use bcnmy_forwarder::forwarder_address as lookup_forwarder;

fn value_err(e: impl std::fmt::Display) -> PyErr {
    PyValueError::new_err(e.to_string())
}

/// Helper: parse a MetaTxMessage from its relayer JSON form.
fn parse_message(message_json: &str) -> PyResult<MetaTxMessage> {
    serde_json::from_str(message_json).map_err(|e| PyValueError::new_err(format!("invalid message: {e}")))
}

/// Helper: explicit forwarder, or the one deployed on `chain_id`.
fn resolve_forwarder(chain_id: u64, forwarder: Option<&str>) -> PyResult<Address> {
    match forwarder {
        Some(addr) => addr
            .parse()
            .map_err(|e| PyValueError::new_err(format!("invalid forwarder address: {e}"))),
        None => lookup_forwarder(chain_id)
            .ok_or_else(|| PyValueError::new_err(format!("chain id not supported: {chain_id}"))),
    }
}

fn parse_hash(s: &str) -> PyResult<B256> {
    s.parse().map_err(|e| PyValueError::new_err(format!("invalid hash: {e}")))
}

#[pyfunction]
fn forwarder_address(chain_id: u64) -> Option<String> {
    lookup_forwarder(chain_id).map(|a| a.to_checksum(None))
}

#[pyfunction]
#[pyo3(signature = (chain_id, forwarder=None))]
fn domain_separator(chain_id: u64, forwarder: Option<&str>) -> PyResult<String> {
    let fwd = resolve_forwarder(chain_id, forwarder)?;
    Ok(bcnmy_eip712::domain_separator(fwd, chain_id).to_string())
}

#[pyfunction]
fn request_typehash() -> String {
    bcnmy_eip712::request_typehash().to_string()
}

#[pyfunction]
fn struct_hash(message_json: &str) -> PyResult<String> {
    let msg = parse_message(message_json)?;
    msg.struct_hash().map(|h| h.to_string()).map_err(value_err)
}

#[pyfunction]
#[pyo3(signature = (message_json, chain_id, forwarder=None))]
fn signing_hash(message_json: &str, chain_id: u64, forwarder: Option<&str>) -> PyResult<String> {
    let msg = parse_message(message_json)?;
    let domain = forwarder_domain(resolve_forwarder(chain_id, forwarder)?, chain_id);
    msg.signing_hash(&domain).map(|h| h.to_string()).map_err(value_err)
}

/// Check `typed_data_hash` against the message and return the domain separator.
#[pyfunction]
#[pyo3(signature = (message_json, typed_data_hash, chain_id, forwarder=None))]
fn build_transact_params(
    message_json: &str,
    typed_data_hash: &str,
    chain_id: u64,
    forwarder: Option<&str>,
) -> PyResult<String> {
    let msg = parse_message(message_json)?;
    let domain = forwarder_domain(resolve_forwarder(chain_id, forwarder)?, chain_id);
    bcnmy_eip712::build_transact_params(&msg, &domain, parse_hash(typed_data_hash)?)
        .map(|h| h.to_string())
        .map_err(value_err)
}

#[pyfunction]
#[pyo3(signature = (message_json, signature, chain_id, forwarder=None))]
fn recover_signer(
    message_json: &str,
    signature: &str,
    chain_id: u64,
    forwarder: Option<&str>,
) -> PyResult<String> {
    let msg = parse_message(message_json)?;
    let domain = forwarder_domain(resolve_forwarder(chain_id, forwarder)?, chain_id);
    let sig = bcnmy_types::hex_to_bytes(signature).map_err(value_err)?;
    bcnmy_eip712::recover_signer(&msg, &domain, &sig)
        .map(|a| a.to_checksum(None))
        .map_err(value_err)
}

/// All hashes of a message in one call: struct hash, domain separator, signing hash.
#[pyfunction]
#[pyo3(signature = (message_json, chain_id, forwarder=None))]
fn message_hashes(
    py: Python<'_>,
    message_json: &str,
    chain_id: u64,
    forwarder: Option<&str>,
) -> PyResult<PyObject> {
    let msg = parse_message(message_json)?;
    let domain = forwarder_domain(resolve_forwarder(chain_id, forwarder)?, chain_id);
    let dict = pyo3::types::PyDict::new(py);
    dict.set_item("struct_hash", msg.struct_hash().map_err(value_err)?.to_string())?;
    dict.set_item("domain_separator", domain.separator().to_string())?;
    dict.set_item("signing_hash", msg.signing_hash(&domain).map_err(value_err)?.to_string())?;
    Ok(dict.into())
}

#[pymodule]
fn _native(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_function(wrap_pyfunction!(forwarder_address, m)?)?;
    m.add_function(wrap_pyfunction!(domain_separator, m)?)?;
    m.add_function(wrap_pyfunction!(request_typehash, m)?)?;
    m.add_function(wrap_pyfunction!(struct_hash, m)?)?;
    m.add_function(wrap_pyfunction!(signing_hash, m)?)?;
    m.add_function(wrap_pyfunction!(build_transact_params, m)?)?;
    m.add_function(wrap_pyfunction!(recover_signer, m)?)?;
    m.add_function(wrap_pyfunction!(message_hashes, m)?)?;
    Ok(())
}
