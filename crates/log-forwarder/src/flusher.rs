//! Delivery of batches to the collector.
//!
//! The flusher turns a [`Batch`] into a single `POST {"logs": [...]}` and
//! decides what happens to its events based on the outcome:
//!
//! ```text
//!   Batch
//!     │  decode each record (malformed ones are dropped)
//!     v
//!   ┌─────────────┐
//!   │  Encode     │ {"logs": [...]}
//!   └──────┬──────┘
//!          v
//!   ┌─────────────┐
//!   │ HTTP POST   │ Content-Type + auth header
//!   └──────┬──────┘
//!          v
//!   200 ─────────────> delivered
//!   network error ──> retry gate
//!   other status ───> dropped, logged
//! ```
//!
//! Only connection-level failures are retried. A response with any status
//! other than 200 means the collector refused the payload, and sending the
//! same bytes again would be refused too.

use async_trait::async_trait;
use reqwest::header::HeaderMap;
use reqwest::StatusCode;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error};

use crate::aggregator::Batch;
use crate::config::Config;
use crate::error::{ForwarderError, SendError};
use crate::event::{LogRecord, LogsPayload};
use crate::http::{build_client, build_headers};
use crate::queue::QueuedLine;
use crate::retry::RetryGate;
use crate::stats::ForwarderStats;

/// Seam between the flush scheduler and whatever delivers its batches.
#[async_trait]
pub trait BatchSender: Send + Sync {
    /// Delivers `batch`. Every outcome is handled and logged by the sender,
    /// nothing is reported back to the scheduler.
    async fn send(&self, batch: Batch);
}

/// A batch ready to go on the wire, with the lines it was built from.
#[derive(Debug)]
pub struct EncodedBatch {
    pub body: Vec<u8>,
    pub lines: Vec<QueuedLine>,
}

/// Sends batches to the configured collector endpoint.
#[derive(Debug, Clone)]
pub struct Flusher {
    /// HTTP client for sending requests.
    client: reqwest::Client,
    /// Collector URL (e.g., "https://log-api.newrelic.com/log/v1").
    endpoint: String,
    /// Content type and auth header, built once.
    headers: HeaderMap,
    /// Where lines go after a network failure.
    retry_gate: RetryGate,
    stats: Arc<ForwarderStats>,
}

impl Flusher {
    pub fn new(
        config: &Config,
        retry_gate: RetryGate,
        stats: Arc<ForwarderStats>,
    ) -> Result<Self, ForwarderError> {
        Ok(Flusher {
            client: build_client(config)?,
            endpoint: config.endpoint.clone(),
            headers: build_headers(config)?,
            retry_gate,
            stats,
        })
    }

    /// Builds the request body. Lines whose record cannot be decoded are
    /// dropped on their own; the rest of the batch still goes out.
    ///
    /// Returns `None` when nothing is left to send.
    pub fn encode(&self, batch: Batch) -> Option<EncodedBatch> {
        let mut records: Vec<LogRecord> = Vec::with_capacity(batch.len());
        let mut lines = Vec::with_capacity(batch.len());

        for line in batch.into_lines() {
            match serde_json::from_slice::<LogRecord>(line.record()) {
                Ok(record) => {
                    records.push(record);
                    lines.push(line);
                }
                Err(e) => {
                    error!("LOGS | JSON decoding error, dropping event: {e}");
                    self.stats.record_malformed(1);
                }
            }
        }

        if records.is_empty() {
            return None;
        }

        match serde_json::to_vec(&LogsPayload { logs: &records }) {
            Ok(body) => Some(EncodedBatch { body, lines }),
            Err(e) => {
                error!(
                    "LOGS | JSON encoding error, dropping {} events: {e}",
                    lines.len()
                );
                self.stats.record_malformed(lines.len());
                None
            }
        }
    }

    /// Issues one POST. `Ok` only for a 200 response.
    pub async fn post(&self, body: Vec<u8>) -> Result<(), SendError> {
        let resp = self
            .client
            .post(&self.endpoint)
            .headers(self.headers.clone())
            .body(body)
            .send()
            .await?;

        let status = resp.status();
        if status == StatusCode::OK {
            Ok(())
        } else {
            Err(SendError::Rejected(status))
        }
    }
}

#[async_trait]
impl BatchSender for Flusher {
    async fn send(&self, batch: Batch) {
        let Some(EncodedBatch { body, lines }) = self.encode(batch) else {
            return;
        };
        let count = lines.len();
        let time = Instant::now();

        match self.post(body).await {
            Ok(()) => {
                debug!(
                    "LOGS | Delivered {count} events in {} ms",
                    time.elapsed().as_millis()
                );
                self.stats.record_delivered(count);
            }
            Err(e) if e.is_transient() => {
                error!(
                    "LOGS | Failed to send {count} events after {} ms, will retry: {e}",
                    time.elapsed().as_millis()
                );
                self.retry_gate.retry(lines);
            }
            Err(SendError::Rejected(status)) => {
                error!("LOGS | Received status code {status} while sending {count} events, dropping batch");
                self.stats.record_rejected(count);
            }
            Err(e) => {
                error!("LOGS | Failed to send {count} events, dropping batch: {e}");
                self.stats.record_undeliverable(count);
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::config::AuthKey;
    use crate::event::{ContainerInfo, LogEvent};
    use crate::queue::{EventQueue, ForwarderCommand, QueueReceiver};
    use mockito::{Matcher, Server};
    use tracing_test::traced_test;

    fn create_test_config(endpoint: String) -> Config {
        let mut config = Config::new(AuthKey::License("test-license-key".to_string()));
        config.endpoint = endpoint;
        config.request_timeout = std::time::Duration::from_secs(5);
        config
    }

    /// The returned queue must stay alive for retries to be re-enqueued.
    fn create_flusher_with_config(
        config: &Config,
        max_retries: u32,
    ) -> (Flusher, EventQueue, QueueReceiver, Arc<ForwarderStats>) {
        let (queue, receiver) = EventQueue::new();
        let stats = Arc::new(ForwarderStats::default());
        let gate = RetryGate::new(&queue, max_retries, Arc::clone(&stats));
        let flusher = Flusher::new(config, gate, Arc::clone(&stats)).unwrap();
        (flusher, queue, receiver, stats)
    }

    fn create_flusher(
        endpoint: String,
        max_retries: u32,
    ) -> (Flusher, EventQueue, QueueReceiver, Arc<ForwarderStats>) {
        create_flusher_with_config(&create_test_config(endpoint), max_retries)
    }

    fn create_line(message: &str) -> QueuedLine {
        let event = LogEvent::new(
            message,
            "stdout",
            ContainerInfo {
                name: "web".to_string(),
                id: "abc123".to_string(),
                pid: 7,
                image: "nginx".to_string(),
            },
            "web-host",
        );
        let record = LogRecord::from_event(event, 1_000, None);
        QueuedLine::new(serde_json::to_vec(&record).unwrap())
    }

    fn create_batch(messages: &[&str]) -> Batch {
        messages.iter().map(|m| create_line(m)).collect()
    }

    fn closed_port_url() -> String {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        format!("http://{addr}/log/v1")
    }

    #[test]
    fn test_encode_wraps_records_in_logs() {
        let (flusher, _queue, _rx, _stats) = create_flusher("http://localhost".to_string(), 1);

        let encoded = flusher.encode(create_batch(&["one", "two"])).unwrap();

        let body: serde_json::Value = serde_json::from_slice(&encoded.body).unwrap();
        let logs = body["logs"].as_array().unwrap();
        assert_eq!(logs.len(), 2);
        assert_eq!(logs[0]["message"], "one");
        assert_eq!(logs[1]["message"], "two");
        assert_eq!(logs[0]["container"]["pid"], 7);
        assert_eq!(encoded.lines.len(), 2);
    }

    #[test]
    #[traced_test]
    fn test_encode_drops_only_malformed_lines() {
        let (flusher, _queue, _rx, stats) = create_flusher("http://localhost".to_string(), 1);
        let mut batch = create_batch(&["good"]);
        batch.push(QueuedLine::new(b"{not json".to_vec()));
        batch.push(create_line("also good"));

        let encoded = flusher.encode(batch).unwrap();

        assert_eq!(encoded.lines.len(), 2);
        assert_eq!(stats.snapshot().malformed, 1);
        assert!(logs_contain("JSON decoding error"));
    }

    #[test]
    fn test_encode_empty_batch() {
        let (flusher, _queue, _rx, _stats) = create_flusher("http://localhost".to_string(), 1);
        assert!(flusher.encode(Batch::new()).is_none());
    }

    #[tokio::test]
    async fn test_send_success() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/log/v1")
            .match_header("X-License-Key", "test-license-key")
            .match_header("Content-Type", "application/json")
            .match_body(Matcher::AllOf(vec![
                Matcher::Regex(r#"^\{"logs":\[\{"#.to_string()),
                Matcher::Regex(r#""message":"hello""#.to_string()),
                Matcher::Regex(r#""level":"INFO","hostname":"web-host""#.to_string()),
            ]))
            .with_status(200)
            .expect(1)
            .create_async()
            .await;

        let (flusher, _queue, mut rx, stats) = create_flusher(format!("{}/log/v1", server.url()), 3);
        flusher.send(create_batch(&["hello"])).await;

        mock.assert_async().await;
        assert_eq!(stats.snapshot().delivered, 1);
        assert!(rx.try_dequeue().is_none());
    }

    #[tokio::test]
    #[traced_test]
    async fn test_send_rejected_drops_batch_with_one_error_line() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/log/v1")
            .with_status(500)
            .with_body("Internal Server Error")
            .expect(1)
            .create_async()
            .await;

        let (flusher, _queue, mut rx, stats) = create_flusher(format!("{}/log/v1", server.url()), 3);
        flusher.send(create_batch(&["a", "b", "c"])).await;

        mock.assert_async().await;
        assert!(rx.try_dequeue().is_none());
        let snapshot = stats.snapshot();
        assert_eq!(snapshot.rejected, 3);
        assert_eq!(snapshot.retried, 0);
        assert!(logs_contain("Received status code 500"));
        logs_assert(|lines: &[&str]| {
            match lines.iter().filter(|line| line.contains("ERROR")).count() {
                1 => Ok(()),
                n => Err(format!("expected exactly one error line, got {n}")),
            }
        });
    }

    #[tokio::test]
    async fn test_send_non_200_success_status_is_rejected() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/log/v1")
            .with_status(202)
            .create_async()
            .await;

        let (flusher, _queue, mut rx, stats) = create_flusher(format!("{}/log/v1", server.url()), 3);
        flusher.send(create_batch(&["accepted is not ok"])).await;

        mock.assert_async().await;
        assert!(rx.try_dequeue().is_none());
        assert_eq!(stats.snapshot().rejected, 1);
    }

    #[tokio::test]
    async fn test_send_connection_refused_requeues_lines() {
        let (flusher, _queue, mut rx, stats) = create_flusher(closed_port_url(), 3);

        flusher.send(create_batch(&["a", "b", "c"])).await;

        let mut retries = Vec::new();
        while let Some(ForwarderCommand::Enqueue(line)) = rx.try_dequeue() {
            retries.push(line.retries());
        }
        assert_eq!(retries, vec![1, 1, 1]);
        assert_eq!(stats.snapshot().retried, 3);
    }

    #[tokio::test]
    async fn test_send_connection_refused_exhausted_lines_dropped() {
        let (flusher, _queue, mut rx, stats) = create_flusher(closed_port_url(), 2);
        let batch: Batch = ["a", "b", "c"]
            .iter()
            .map(|m| {
                let mut line = create_line(m);
                line.retries = 2;
                line
            })
            .collect();

        flusher.send(batch).await;

        assert!(rx.try_dequeue().is_none());
        assert_eq!(stats.snapshot().exhausted, 3);
    }

    #[tokio::test]
    async fn test_send_timeout_requeues_lines() {
        // Connections complete in the listen backlog but nothing ever answers.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let mut config = create_test_config(format!("http://{}/log/v1", listener.local_addr().unwrap()));
        config.request_timeout = std::time::Duration::from_millis(200);
        let (flusher, _queue, mut rx, stats) = create_flusher_with_config(&config, 3);

        flusher.send(create_batch(&["slow"])).await;

        match rx.try_dequeue() {
            Some(ForwarderCommand::Enqueue(line)) => assert_eq!(line.retries(), 1),
            other => panic!("expected a requeued line, got {other:?}"),
        }
        assert!(rx.try_dequeue().is_none());
        let snapshot = stats.snapshot();
        assert_eq!(snapshot.retried, 1);
        assert_eq!(snapshot.undeliverable, 0);
        drop(listener);
    }

    #[tokio::test]
    async fn test_send_invalid_endpoint_is_not_retried() {
        let (flusher, _queue, mut rx, stats) = create_flusher("not a url".to_string(), 3);

        flusher.send(create_batch(&["a"])).await;

        assert!(rx.try_dequeue().is_none());
        assert_eq!(stats.snapshot().undeliverable, 1);
    }
}
