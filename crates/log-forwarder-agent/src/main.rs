// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

use std::env;
use tokio::io::{self, AsyncBufReadExt, BufReader};
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

use log_forwarder::{Config, ContainerInfo, LogEvent, LogForwarder};

#[tokio::main]
pub async fn main() {
    let log_level = env::var("LOG_LEVEL")
        .map(|val| val.to_lowercase())
        .unwrap_or("info".to_string());

    let env_filter = format!("h2=off,hyper=off,rustls=off,{log_level}");

    #[allow(clippy::expect_used)]
    let subscriber = tracing_subscriber::fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_new(env_filter).expect("could not parse log level in configuration"),
        )
        .with_level(true)
        .with_thread_names(false)
        .with_thread_ids(false)
        .with_line_number(false)
        .with_file(false)
        .with_target(true)
        .without_time()
        .with_writer(std::io::stderr)
        .finish();

    #[allow(clippy::expect_used)]
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    debug!("Logging subsystem enabled");

    let config = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            error!("Error creating config on log forwarder startup: {e}");
            return;
        }
    };

    let forwarder = match LogForwarder::start(config) {
        Ok(f) => f,
        Err(e) => {
            error!("Error starting log forwarder: {e}");
            return;
        }
    };

    let container = container_from_env();
    let hostname = env::var("HOSTNAME").unwrap_or_default();
    let mut lines = BufReader::new(io::stdin()).lines();

    info!("Log forwarder started, reading events from stdin");

    loop {
        tokio::select! {
            line = lines.next_line() => match line {
                Ok(Some(line)) => {
                    forwarder.submit(parse_line(line, &container, &hostname));
                }
                Ok(None) => {
                    debug!("Reached end of input");
                    break;
                }
                Err(e) => {
                    error!("Failed to read from stdin: {e}");
                    break;
                }
            },
            _ = tokio::signal::ctrl_c() => {
                debug!("Received interrupt");
                break;
            }
        }
    }

    forwarder.shutdown().await;
    info!("Log forwarder stopped");
}

/// A line holding a JSON event is forwarded as is; anything else is treated
/// as plain output of the container described by the environment.
fn parse_line(line: String, container: &ContainerInfo, hostname: &str) -> LogEvent {
    match serde_json::from_str::<LogEvent>(&line) {
        Ok(event) => event,
        Err(_) => LogEvent::new(line, "stdout", container.clone(), hostname),
    }
}

fn container_from_env() -> ContainerInfo {
    ContainerInfo {
        name: env::var("CONTAINER_NAME").unwrap_or_default(),
        id: env::var("CONTAINER_ID").unwrap_or_default(),
        pid: std::process::id(),
        image: env::var("CONTAINER_IMAGE").unwrap_or_default(),
    }
}
