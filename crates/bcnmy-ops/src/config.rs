use std::env;
use std::time::Duration;

use bcnmy_relayer::Endpoints;
use bcnmy_types::{BcnmyError, Result};

pub const API_KEY_ENV: &str = "BCNMY_API_KEY";
pub const AUTH_TOKEN_ENV: &str = "BCNMY_AUTH_TOKEN";
pub const TIMEOUT_MS_ENV: &str = "BCNMY_TIMEOUT_MS";
pub const SLEEP_TIME_SECS_ENV: &str = "BCNMY_SLEEP_TIME_SECS";

/// Client configuration.
#[derive(Debug, Clone)]
pub struct BcnmyConfig {
    pub api_key: String,
    pub auth_token: Option<String>,
    /// HTTP timeout for relayer calls.
    pub timeout_ms: u64,
    /// Sleep between transaction lookups and between status polls.
    pub sleep_time_secs: u64,
    pub batch_id: u64,
    /// Meta-transaction validity from signing time.
    pub deadline_secs: u64,
    pub receipt_poll_ms: u64,
    pub receipt_max_attempts: u32,
    pub tx_lookup_retries: u32,
    pub status_retries: u32,
    pub endpoints: Endpoints,
}

impl Default for BcnmyConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            auth_token: None,
            timeout_ms: 10_000,
            sleep_time_secs: 5,
            batch_id: 0,
            deadline_secs: 3600,
            receipt_poll_ms: 1_000,
            receipt_max_attempts: 300,
            tx_lookup_retries: 5,
            status_retries: 5,
            endpoints: Endpoints::default(),
        }
    }
}

impl BcnmyConfig {
    pub fn new(api_key: &str) -> Self {
        Self { api_key: api_key.to_string(), ..Default::default() }
    }

    /// Load from `BCNMY_*` environment variables; only the api key is required.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::new(&load_string(API_KEY_ENV)?);
        config.auth_token = load_string_opt(AUTH_TOKEN_ENV);
        if let Some(timeout_ms) = load_u64_opt(TIMEOUT_MS_ENV)? {
            config.timeout_ms = timeout_ms;
        }
        if let Some(sleep) = load_u64_opt(SLEEP_TIME_SECS_ENV)? {
            config.sleep_time_secs = sleep;
        }
        Ok(config)
    }

    /// Millisecond timeout, saturating at `u64::MAX`.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn sleep_time(&self) -> Duration {
        Duration::from_secs(self.sleep_time_secs)
    }

    pub fn receipt_poll_interval(&self) -> Duration {
        Duration::from_millis(self.receipt_poll_ms)
    }
}

fn load_string(key: &str) -> Result<String> {
    env::var(key).map_err(|_| BcnmyError::Config(key.to_string()))
}

fn load_string_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.is_empty())
}

fn load_u64_opt(key: &str) -> Result<Option<u64>> {
    load_string_opt(key)
        .map(|v| v.trim().parse::<u64>().map_err(|_| BcnmyError::Config(format!("{}={}", key, v))))
        .transpose()
}
