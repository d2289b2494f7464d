//! Flush scheduling: turns the queue into batches and hands them to a sender.
//!
//! The scheduler is the single consumer of the event queue. It owns the
//! [`Aggregator`] and decides when the current batch is cut:
//!
//! ```text
//!   EventQueue ──> ┌────────────────┐  size reached / timer tick
//!                  │ FlushScheduler │ ─────────────────────────────> BatchSender
//!   Shutdown ────> └────────────────┘  (spawned, not awaited)
//! ```
//!
//! # Flush triggers
//!
//! - **Size**: after adding a line the batch is at or above `max_buffer_size`.
//!   The batch is flushed at once and the interval timer is re-armed.
//! - **Interval**: the timer fires. A non-empty batch is flushed, an empty
//!   one is left alone. Either way the timer is re-armed.
//!
//! Sends run on their own tasks so a slow collector never stalls dequeueing.
//!
//! # Shutdown
//!
//! On [`ForwarderCommand::Shutdown`] the queue is closed, whatever is still
//! buffered in it is drained into one final batch, and that batch is sent and
//! awaited together with every send still in flight. Lines that sends try to
//! requeue after that point are counted as abandoned by the retry gate.
//!
//! Dropping every [`crate::queue::EventQueue`] without a shutdown command has
//! the same effect. The retry gate only holds a weak reference, so it never
//! keeps the loop running on its own.

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{debug, error};

use crate::aggregator::{Aggregator, Batch};
use crate::flusher::BatchSender;
use crate::queue::{ForwarderCommand, QueueReceiver};

pub struct FlushScheduler {
    receiver: QueueReceiver,
    aggregator: Aggregator,
    sender: Arc<dyn BatchSender>,
    flush_interval: Duration,
    in_flight: JoinSet<()>,
}

impl FlushScheduler {
    #[must_use]
    pub fn new(
        receiver: QueueReceiver,
        sender: Arc<dyn BatchSender>,
        max_buffer_size: usize,
        flush_interval: Duration,
    ) -> Self {
        Self {
            receiver,
            aggregator: Aggregator::new(max_buffer_size),
            sender,
            flush_interval,
            in_flight: JoinSet::new(),
        }
    }

    /// Runs until a shutdown command arrives or every producer is gone.
    ///
    /// Meant to be spawned as its own task.
    pub async fn run(mut self) {
        debug!("LOGS | Flush scheduler started");

        let ticker = tokio::time::sleep(self.flush_interval);
        tokio::pin!(ticker);

        loop {
            tokio::select! {
                command = self.receiver.dequeue() => match command {
                    Some(ForwarderCommand::Enqueue(line)) => {
                        if self.aggregator.add(line) {
                            self.flush();
                            ticker.as_mut().reset(Instant::now() + self.flush_interval);
                        }
                    }
                    Some(ForwarderCommand::Shutdown) => {
                        debug!("LOGS | Flush scheduler received shutdown");
                        break;
                    }
                    None => {
                        debug!("LOGS | Event queue disconnected");
                        break;
                    }
                },
                () = &mut ticker => {
                    self.flush();
                    ticker.as_mut().reset(Instant::now() + self.flush_interval);
                }
                Some(result) = self.in_flight.join_next(), if !self.in_flight.is_empty() => {
                    if let Err(e) = result {
                        error!("LOGS | Send task failed: {e}");
                    }
                }
            }
        }

        self.drain().await;
        debug!("LOGS | Flush scheduler stopped");
    }

    /// Cuts the current batch and dispatches it without waiting for the send.
    fn flush(&mut self) {
        let batch = self.aggregator.drain_and_reset();
        if batch.is_empty() {
            return;
        }

        debug!(
            "LOGS | Flushing {} events ({} bytes)",
            batch.len(),
            batch.byte_size()
        );
        let sender = Arc::clone(&self.sender);
        self.in_flight.spawn(async move { sender.send(batch).await });
    }

    /// Final flush: everything already queued goes out in one last batch.
    async fn drain(&mut self) {
        self.receiver.close();

        let mut remaining = self.aggregator.drain_and_reset();
        absorb_buffered(&mut self.receiver, &mut remaining);

        if !remaining.is_empty() {
            debug!("LOGS | Sending final batch of {} events", remaining.len());
            self.sender.send(remaining).await;
        }

        while let Some(result) = self.in_flight.join_next().await {
            if let Err(e) = result {
                error!("LOGS | Send task failed: {e}");
            }
        }
    }
}

/// Moves every line still sitting in the closed queue into `batch`.
fn absorb_buffered(receiver: &mut QueueReceiver, batch: &mut Batch) {
    while let Some(command) = receiver.try_dequeue() {
        if let ForwarderCommand::Enqueue(line) = command {
            batch.push(line);
        }
    }
}
