use alloy::primitives::U256;
use serde::Serialize;
use thiserror::Error;

/// 0x-prefixed hex string (e.g. "0x1234...").
pub type Hex = String;

/// bcnmy SDK error types.
#[derive(Debug, Error)]
pub enum BcnmyError {
    #[error("invalid hex string: {0}")]
    InvalidHex(String),

    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("invalid number: {0}")]
    InvalidNumber(String),

    #[error("chain id not supported: {0}")]
    UnsupportedChain(u64),

    #[error("api id not found for {contract}-{method}")]
    ApiIdNotFound { contract: String, method: String },

    #[error("dapp not configured: call with_dapp first")]
    DappNotConfigured,

    #[error("auth token required for dashboard api")]
    MissingAuthToken,

    #[error("abi error: {0}")]
    Abi(String),

    #[error("typed data hash mismatch: computed {computed}, expected {expected}")]
    HashMismatch { computed: String, expected: String },

    #[error("signer error: {0}")]
    Signer(String),

    #[error("rpc error: {0}")]
    Rpc(String),

    #[error("http error: {0}")]
    Http(String),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("relayer rejected request (code {code}): {message}")]
    Rejected { code: i64, message: String },

    #[error("missing or invalid environment variable: {0}")]
    Config(String),

    #[error("{what} not available after {attempts} attempts")]
    RetriesExhausted { what: String, attempts: u32 },

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, BcnmyError>;

/// Parse a hex string (with or without 0x prefix) to bytes.
pub fn hex_to_bytes(hex_str: &str) -> Result<Vec<u8>> {
    let hex_str = hex_str.strip_prefix("0x").unwrap_or(hex_str);
    hex::decode(hex_str).map_err(|e| BcnmyError::InvalidHex(e.to_string()))
}

/// Convert bytes to a 0x-prefixed hex string.
pub fn bytes_to_hex(bytes: &[u8]) -> Hex {
    format!("0x{}", hex::encode(bytes))
}

/// Parse a decimal or 0x-prefixed hex string into a `U256`.
pub fn parse_u256(s: &str) -> Result<U256> {
    let s = s.trim();
    let parsed = match s.strip_prefix("0x") {
        Some(digits) => U256::from_str_radix(digits, 16),
        None => U256::from_str_radix(s, 10),
    };
    parsed.map_err(|e| BcnmyError::InvalidNumber(format!("{s}: {e}")))
}

/// Pretty-print a value as JSON for debug logs. Empty on failure.
pub fn to_json_pretty<T: Serialize>(value: &T) -> String {
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b" ");
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
    if value.serialize(&mut ser).is_err() {
        return String::new();
    }
    String::from_utf8(buf).unwrap_or_default()
}

/// Serde adapter for big integers exchanged with the relayer.
///
/// Values that fit in a `u64` are written as JSON numbers, larger ones as
/// decimal strings. Reading accepts numbers, decimal strings and 0x-hex.
pub mod serde_u256 {
    use alloy::primitives::U256;
    use serde::{de, Deserialize, Deserializer, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Num(u64),
        Str(String),
    }

    impl Repr {
        fn into_u256<E: de::Error>(self) -> Result<U256, E> {
            match self {
                Repr::Num(n) => Ok(U256::from(n)),
                Repr::Str(s) => super::parse_u256(&s).map_err(E::custom),
            }
        }
    }

    pub fn serialize<S: Serializer>(value: &U256, serializer: S) -> Result<S::Ok, S::Error> {
        if *value <= U256::from(u64::MAX) {
            serializer.serialize_u64(value.to::<u64>())
        } else {
            serializer.serialize_str(&value.to_string())
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<U256, D::Error> {
        Repr::deserialize(deserializer)?.into_u256()
    }

    /// Same encoding for optional fields; `null` maps to `None`.
    pub mod option {
        use super::Repr;
        use alloy::primitives::U256;
        use serde::{Deserialize, Deserializer, Serializer};

        pub fn serialize<S: Serializer>(
            value: &Option<U256>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            match value {
                Some(v) => super::serialize(v, serializer),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<U256>, D::Error> {
            Option::<Repr>::deserialize(deserializer)?
                .map(Repr::into_u256)
                .transpose()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Wrapper {
        #[serde(with = "serde_u256")]
        value: U256,
        #[serde(default, with = "serde_u256::option")]
        maybe: Option<U256>,
    }

    #[test]
    fn test_hex_helpers() {
        assert_eq!(hex_to_bytes("0x0a0b").unwrap(), vec![0x0a, 0x0b]);
        assert_eq!(hex_to_bytes("0a0b").unwrap(), vec![0x0a, 0x0b]);
        assert!(matches!(hex_to_bytes("0xzz"), Err(BcnmyError::InvalidHex(_))));
        assert_eq!(bytes_to_hex(&[0xde, 0xad]), "0xdead");
    }

    #[test]
    fn test_parse_u256() {
        assert_eq!(parse_u256("19").unwrap(), U256::from(19));
        assert_eq!(parse_u256("0x13").unwrap(), U256::from(19));
        assert_eq!(parse_u256(" 0 ").unwrap(), U256::ZERO);
        assert!(matches!(parse_u256("abc"), Err(BcnmyError::InvalidNumber(_))));
    }

    #[test]
    fn test_u256_small_values_are_numbers() {
        let w = Wrapper { value: U256::from(1684815127u64), maybe: None };
        let json = serde_json::to_string(&w).unwrap();
        assert_eq!(json, r#"{"value":1684815127,"maybe":null}"#);
    }

    #[test]
    fn test_u256_large_values_are_strings() {
        let big = U256::from(u64::MAX) + U256::from(1);
        let w = Wrapper { value: big, maybe: Some(U256::from(7)) };
        let json = serde_json::to_string(&w).unwrap();
        assert_eq!(json, r#"{"value":"18446744073709551616","maybe":7}"#);
        let back: Wrapper = serde_json::from_str(&json).unwrap();
        assert_eq!(back, w);
    }

    #[test]
    fn test_u256_accepts_hex_strings_and_missing_option() {
        let w: Wrapper = serde_json::from_str(r#"{"value":"0xff"}"#).unwrap();
        assert_eq!(w.value, U256::from(255));
        assert_eq!(w.maybe, None);
    }

    #[test]
    fn test_to_json_pretty_uses_single_space_indent() {
        let out = to_json_pretty(&serde_json::json!({ "a": 1 }));
        assert_eq!(out, "{\n \"a\": 1\n}");
    }
}
