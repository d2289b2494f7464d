// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use reqwest::StatusCode;

/// Errors raised while building a [`crate::config::Config`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Cannot find environment variable \"LICENSE_KEY\" or \"API_KEY\"")]
    MissingCredentials,

    #[error("Invalid proxy URL: {0}")]
    InvalidProxy(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Errors returned when starting a forwarder or talking to its queue.
///
/// None of these ever reach the producer of an event: `submit` logs and
/// counts them instead.
#[derive(Debug, thiserror::Error)]
pub enum ForwarderError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Failed to build HTTP client: {0}")]
    HttpClient(String),

    #[error("Event queue is closed")]
    QueueClosed,
}

/// Outcome of a single delivery attempt that did not end in a 200.
#[derive(Debug, thiserror::Error)]
pub enum SendError {
    /// Connection-level failure. The batch is eligible for retry.
    #[error("transport error: {0}")]
    Transport(reqwest::Error),

    /// The request never left the client (bad URL, redirect policy, ...).
    #[error("request error: {0}")]
    Request(reqwest::Error),

    #[error("collector responded with status {0}")]
    Rejected(StatusCode),
}

impl SendError {
    /// Only connection-level failures are worth sending again. The collector
    /// answering with anything but 200 means it saw the payload and refused it.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, SendError::Transport(_))
    }
}

impl From<reqwest::Error> for SendError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_connect() || e.is_timeout() || e.is_request() {
            SendError::Transport(e)
        } else {
            SendError::Request(e)
        }
    }
}
