// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::constants::{
    DEFAULT_ENDPOINT, DEFAULT_FLUSH_INTERVAL, DEFAULT_MAX_BUFFER_SIZE, DEFAULT_MAX_LINE_LENGTH,
    DEFAULT_MAX_RETRIES, DEFAULT_REQUEST_TIMEOUT, DEFAULT_SELF_IMAGE, INSERT_KEY_HEADER,
    LICENSE_KEY_HEADER,
};
use crate::error::ConfigError;
use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Credential sent with every request. The variant decides the header name.
#[derive(Clone, PartialEq, Eq)]
pub enum AuthKey {
    License(String),
    Insert(String),
}

impl AuthKey {
    #[must_use]
    pub fn header_name(&self) -> &'static str {
        match self {
            AuthKey::License(_) => LICENSE_KEY_HEADER,
            AuthKey::Insert(_) => INSERT_KEY_HEADER,
        }
    }

    #[must_use]
    pub fn value(&self) -> &str {
        match self {
            AuthKey::License(key) | AuthKey::Insert(key) => key,
        }
    }

    /// A license key wins over an insert key when both are present.
    /// Empty values count as unset.
    pub fn select(
        license_key: Option<String>,
        insert_key: Option<String>,
    ) -> Result<Self, ConfigError> {
        match (
            license_key.filter(|k| !k.is_empty()),
            insert_key.filter(|k| !k.is_empty()),
        ) {
            (Some(key), _) => Ok(AuthKey::License(key)),
            (None, Some(key)) => Ok(AuthKey::Insert(key)),
            (None, None) => Err(ConfigError::MissingCredentials),
        }
    }
}

// Keys never end up in logs.
impl fmt::Debug for AuthKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AuthKey({})", self.header_name())
    }
}

/// Forwarder configuration. Read once at construction and never mutated.
#[derive(Debug, Clone)]
pub struct Config {
    /// Collector URL every batch is POSTed to
    pub endpoint: String,
    pub auth: AuthKey,
    /// Hostname reported for every event instead of the container's own
    pub hostname: Option<String>,
    pub flush_interval: Duration,
    /// Cumulative serialized size in bytes that triggers an immediate flush
    pub max_buffer_size: usize,
    /// Maximum message length in bytes, longer messages are truncated
    pub max_line_length: usize,
    pub max_retries: u32,
    /// When false, output of the forwarder's own container is not shipped
    pub verbose: bool,
    /// Image tag that identifies the forwarder's own container
    pub self_image: String,
    pub proxy_url: Option<String>,
    pub request_timeout: Duration,
}

impl Config {
    /// Configuration with default limits for the given credential.
    #[must_use]
    pub fn new(auth: AuthKey) -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            auth,
            hostname: None,
            flush_interval: DEFAULT_FLUSH_INTERVAL,
            max_buffer_size: DEFAULT_MAX_BUFFER_SIZE,
            max_line_length: DEFAULT_MAX_LINE_LENGTH,
            max_retries: DEFAULT_MAX_RETRIES,
            verbose: true,
            self_image: DEFAULT_SELF_IMAGE.to_string(),
            proxy_url: None,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    /// Create configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let auth = AuthKey::select(env::var("LICENSE_KEY").ok(), env::var("API_KEY").ok())?;

        let config = Self {
            endpoint: get_string_opt("NEW_RELIC_URL").unwrap_or_else(|| DEFAULT_ENDPOINT.to_string()),
            auth,
            hostname: get_string_opt("HOSTNAME"),
            flush_interval: get_parsed_opt::<u64>("FLUSH_INTERVAL")
                .map_or(DEFAULT_FLUSH_INTERVAL, Duration::from_millis),
            max_buffer_size: get_parsed_opt::<usize>("MAX_BUFFER_SIZE")
                .map_or(DEFAULT_MAX_BUFFER_SIZE, |mib| mib.saturating_mul(1_024 * 1_024)),
            max_line_length: get_parsed_opt("MAX_LINE_LENGTH").unwrap_or(DEFAULT_MAX_LINE_LENGTH),
            max_retries: get_parsed_opt("MAX_REQUEST_RETRY").unwrap_or(DEFAULT_MAX_RETRIES),
            verbose: env::var("VERBOSE").map_or(true, |val| val != "0"),
            self_image: get_string_opt("SELF_IMAGE")
                .unwrap_or_else(|| DEFAULT_SELF_IMAGE.to_string()),
            proxy_url: get_string_opt("PROXY_URL"),
            request_timeout: get_parsed_opt::<u64>("REQUEST_TIMEOUT")
                .map_or(DEFAULT_REQUEST_TIMEOUT, Duration::from_secs),
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.auth.value().is_empty() {
            return Err(ConfigError::MissingCredentials);
        }

        if self.endpoint.trim().is_empty() {
            return Err(ConfigError::Invalid("endpoint cannot be empty".to_string()));
        }

        if self.flush_interval.is_zero() {
            return Err(ConfigError::Invalid(
                "flush interval must be greater than 0".to_string(),
            ));
        }

        if self.max_buffer_size == 0 {
            return Err(ConfigError::Invalid(
                "max buffer size must be greater than 0".to_string(),
            ));
        }

        if let Some(proxy) = &self.proxy_url {
            reqwest::Url::parse(proxy)
                .map_err(|e| ConfigError::InvalidProxy(format!("{proxy}: {e}")))?;
        }

        Ok(())
    }
}

fn get_string_opt(name: &str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.is_empty())
}

// Unparsable values fall back to the default, same as unset ones.
fn get_parsed_opt<T: FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|value| value.trim().parse::<T>().ok())
}
