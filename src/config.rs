use std::env;
use std::time::Duration;

use crate::error::{Error, Result};

pub const DEFAULT_GRAPH_URL: &str = "https://graph.facebook.com";
pub const DEFAULT_API_VERSION: &str = "v20.0";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Connection settings for a [`MarketingClient`](crate::MarketingClient).
///
/// Credentials are always supplied by the caller, either directly or through
/// the environment:
///
/// | variable | field |
/// |---|---|
/// | `META_ACCOUNT_ID` | `account_id` (required) |
/// | `META_ACCESS_TOKEN` | `access_token` (required) |
/// | `META_API_VERSION` | `api_version` |
/// | `META_GRAPH_URL` | `base_url` |
/// | `META_TIMEOUT_SECS` | `timeout` |
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: String,
    pub api_version: String,
    pub account_id: String,
    pub access_token: String,
    pub timeout: Duration,
}

impl ClientConfig {
    pub fn new(account_id: impl Into<String>, access_token: impl Into<String>) -> Self {
        Self {
            base_url: DEFAULT_GRAPH_URL.to_string(),
            api_version: DEFAULT_API_VERSION.to_string(),
            account_id: account_id.into(),
            access_token: access_token.into(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_api_version(mut self, api_version: impl Into<String>) -> Self {
        self.api_version = api_version.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let required = |key: &str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| Error::Config(format!("{key} is not set")))
        };

        let mut config = Self::new(required("META_ACCOUNT_ID")?, required("META_ACCESS_TOKEN")?);

        if let Some(version) = lookup("META_API_VERSION") {
            config.api_version = version;
        }
        if let Some(url) = lookup("META_GRAPH_URL") {
            config.base_url = url;
        }
        if let Some(secs) = lookup("META_TIMEOUT_SECS") {
            let secs: u64 = secs
                .parse()
                .map_err(|_| Error::Config(format!("META_TIMEOUT_SECS is not a number: {secs}")))?;
            config.timeout = Duration::from_secs(secs);
        }

        Ok(config)
    }
}
