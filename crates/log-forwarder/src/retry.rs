// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::sync::Arc;
use tracing::{debug, error, warn};

use crate::queue::{EventQueue, QueuedLine, WeakEventQueue};
use crate::stats::ForwarderStats;

/// Puts lines from a batch that failed at the network level back on the
/// queue, at most `max_retries` times each.
///
/// Holds only a weak reference to the queue, so a pending retry never keeps
/// the scheduler alive after every producer is gone.
#[derive(Clone, Debug)]
pub struct RetryGate {
    queue: WeakEventQueue,
    max_retries: u32,
    stats: Arc<ForwarderStats>,
}

impl RetryGate {
    #[must_use]
    pub fn new(queue: &EventQueue, max_retries: u32, stats: Arc<ForwarderStats>) -> Self {
        Self {
            queue: queue.downgrade(),
            max_retries,
            stats,
        }
    }

    /// Re-enqueues every line that still has retry budget and discards the rest.
    /// Never blocks: the queue is unbounded.
    pub fn retry(&self, lines: Vec<QueuedLine>) {
        let queue = self.queue.upgrade();
        let mut requeued = 0;
        let mut exhausted = 0;
        let mut abandoned = 0;

        for mut line in lines {
            if line.retries >= self.max_retries {
                exhausted += 1;
                self.stats.record_exhausted();
                continue;
            }

            line.retries += 1;
            match queue.as_ref().map(|q| q.enqueue(line)) {
                Some(Ok(())) => {
                    requeued += 1;
                    self.stats.record_retried();
                }
                Some(Err(_)) | None => {
                    abandoned += 1;
                    self.stats.record_abandoned(1);
                }
            }
        }

        if requeued > 0 {
            debug!("LOGS | Re-enqueued {requeued} events for retry");
        }
        if exhausted > 0 {
            warn!(
                "LOGS | Dropping {exhausted} events after {} failed retries",
                self.max_retries
            );
        }
        if abandoned > 0 {
            error!("LOGS | Event queue closed, dropping {abandoned} events scheduled for retry");
        }
    }
}
