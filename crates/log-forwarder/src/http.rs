// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use core::time::Duration;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use tracing::debug;

use crate::config::Config;
use crate::error::ForwarderError;

/// Builds the client every send goes through: request timeout, connection
/// pooling and the optional outbound proxy.
pub fn build_client(config: &Config) -> Result<reqwest::Client, ForwarderError> {
    let mut builder = reqwest::Client::builder()
        .timeout(config.request_timeout)
        .pool_idle_timeout(Some(Duration::from_secs(270)))
        .tcp_keepalive(Some(Duration::from_secs(120)));

    if let Some(proxy_url) = &config.proxy_url {
        let proxy = reqwest::Proxy::all(proxy_url)
            .map_err(|e| ForwarderError::HttpClient(format!("invalid proxy {proxy_url}: {e}")))?;
        debug!("LOGS | Routing collector requests through proxy");
        builder = builder.proxy(proxy);
    }

    builder
        .build()
        .map_err(|e| ForwarderError::HttpClient(e.to_string()))
}

/// Headers attached to every batch: content type plus the auth header.
pub fn build_headers(config: &Config) -> Result<HeaderMap, ForwarderError> {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

    let name = HeaderName::from_bytes(config.auth.header_name().as_bytes())
        .map_err(|e| ForwarderError::HttpClient(format!("invalid auth header: {e}")))?;
    let mut value = HeaderValue::from_str(config.auth.value())
        .map_err(|e| ForwarderError::HttpClient(format!("invalid auth key: {e}")))?;
    value.set_sensitive(true);
    headers.insert(name, value);

    Ok(headers)
}
