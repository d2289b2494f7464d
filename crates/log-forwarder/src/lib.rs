// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Buffered forwarding of container log events to an HTTP log collector.
//!
//! Producers hand [`LogEvent`]s to a [`ForwarderHandle`]. Each event is
//! turned into a serialized record and queued; a single flush scheduler
//! batches records by size and time and POSTs each batch as
//! `{"logs": [...]}`. Network failures are retried a bounded number of
//! times, any other failure drops the batch with one error log line.
//!
//! ```rust,no_run
//! use log_forwarder::{Config, ContainerInfo, LogEvent, LogForwarder};
//!
//! # async fn run() -> Result<(), log_forwarder::ForwarderError> {
//! let forwarder = LogForwarder::start(Config::from_env()?)?;
//! forwarder.submit(LogEvent::new("hello", "stdout", ContainerInfo::default(), "host-1"));
//! forwarder.shutdown().await;
//! # Ok(())
//! # }
//! ```

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

pub mod aggregator;
pub mod config;
pub mod constants;
pub mod error;
pub mod event;
pub mod flusher;
pub mod forwarder;
pub mod http;
pub mod queue;
pub mod retry;
pub mod scheduler;
pub mod stats;

pub use config::{AuthKey, Config};
pub use error::{ConfigError, ForwarderError, SendError};
pub use event::{ContainerInfo, LogEvent, LogRecord};
pub use forwarder::{ForwarderHandle, LogForwarder};
pub use stats::StatsSnapshot;
