// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, error};

use crate::config::Config;
use crate::error::ForwarderError;
use crate::event::{LogEvent, LogRecord};
use crate::flusher::Flusher;
use crate::queue::{EventQueue, QueuedLine};
use crate::retry::RetryGate;
use crate::scheduler::FlushScheduler;
use crate::stats::{ForwarderStats, StatsSnapshot};

/// Running forwarder: the flush scheduler task plus a handle to feed it.
///
/// Dropping it together with every [`ForwarderHandle`] stops the scheduler
/// after a final flush; [`LogForwarder::shutdown`] does the same and waits.
#[derive(Debug)]
pub struct LogForwarder {
    handle: ForwarderHandle,
    scheduler: JoinHandle<()>,
}

/// Producer side of a running forwarder. Cheap to clone and share between tasks.
#[derive(Clone, Debug)]
pub struct ForwarderHandle {
    queue: EventQueue,
    config: Arc<Config>,
    stats: Arc<ForwarderStats>,
}

impl LogForwarder {
    /// Validates `config`, builds the HTTP client and spawns the flush
    /// scheduler. Must be called from within a Tokio runtime.
    pub fn start(config: Config) -> Result<Self, ForwarderError> {
        config.validate()?;

        let stats = Arc::new(ForwarderStats::default());
        let (queue, receiver) = EventQueue::new();
        let retry_gate = RetryGate::new(&queue, config.max_retries, Arc::clone(&stats));
        let flusher = Flusher::new(&config, retry_gate, Arc::clone(&stats))?;

        let scheduler = FlushScheduler::new(
            receiver,
            Arc::new(flusher),
            config.max_buffer_size,
            config.flush_interval,
        );
        let scheduler = tokio::spawn(scheduler.run());

        debug!(
            "LOGS | Forwarding to {} every {} ms or {} bytes",
            config.endpoint,
            config.flush_interval.as_millis(),
            config.max_buffer_size
        );

        Ok(Self {
            handle: ForwarderHandle {
                queue,
                config: Arc::new(config),
                stats,
            },
            scheduler,
        })
    }

    #[must_use]
    pub fn handle(&self) -> ForwarderHandle {
        self.handle.clone()
    }

    pub fn submit(&self, event: LogEvent) {
        self.handle.submit(event);
    }

    #[must_use]
    pub fn stats(&self) -> StatsSnapshot {
        self.handle.stats()
    }

    /// Stops the scheduler and waits until the final batch and every send in
    /// flight have completed.
    pub async fn shutdown(self) {
        if let Err(e) = self.handle.shutdown() {
            debug!("LOGS | Flush scheduler already stopped: {e}");
        }
        if let Err(e) = self.scheduler.await {
            error!("LOGS | Flush scheduler task failed: {e}");
        }
        debug!("LOGS | Forwarder stopped: {}", self.handle.stats());
    }
}

impl ForwarderHandle {
    /// Hands `event` to the forwarder. Never blocks and never fails from the
    /// caller's point of view: problems are logged and counted.
    ///
    /// With `verbose` off, events from the forwarder's own image are skipped
    /// before they are counted.
    pub fn submit(&self, event: LogEvent) {
        if !self.config.verbose && event.container.image == self.config.self_image {
            return;
        }

        self.stats.record_accepted();
        let record = LogRecord::from_event(
            event,
            self.config.max_line_length,
            self.config.hostname.as_deref(),
        );

        let line = match serde_json::to_vec(&record) {
            Ok(bytes) => QueuedLine::new(bytes),
            Err(e) => {
                error!("LOGS | JSON encoding error, dropping event: {e}");
                self.stats.record_malformed(1);
                return;
            }
        };

        if let Err(e) = self.queue.enqueue(line) {
            error!("LOGS | Dropping event: {e}");
            self.stats.record_abandoned(1);
        }
    }

    /// Asks the scheduler to flush what it has and stop.
    pub fn shutdown(&self) -> Result<(), ForwarderError> {
        self.queue.shutdown()
    }

    #[must_use]
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }
}
