// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use tokio::sync::mpsc;

use crate::error::ForwarderError;

/// A serialized log record waiting to be batched, plus how many times it has
/// already been resubmitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuedLine {
    pub(crate) record: Vec<u8>,
    pub(crate) retries: u32,
}

impl QueuedLine {
    #[must_use]
    pub fn new(record: Vec<u8>) -> Self {
        Self { record, retries: 0 }
    }

    /// Serialized length in bytes, the unit the buffer threshold is measured in.
    #[must_use]
    pub fn len(&self) -> usize {
        self.record.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.record.is_empty()
    }

    #[must_use]
    pub fn retries(&self) -> u32 {
        self.retries
    }

    #[must_use]
    pub fn record(&self) -> &[u8] {
        &self.record
    }
}

#[derive(Debug)]
pub enum ForwarderCommand {
    Enqueue(QueuedLine),
    Shutdown,
}

/// Producer side of the queue. Cheap to clone, never blocks.
#[derive(Clone, Debug)]
pub struct EventQueue {
    tx: mpsc::UnboundedSender<ForwarderCommand>,
}

/// Producer reference that does not keep the queue open. The scheduler sees
/// the queue as disconnected once only weak references remain.
#[derive(Clone, Debug)]
pub struct WeakEventQueue {
    tx: mpsc::WeakUnboundedSender<ForwarderCommand>,
}

/// Consumer side of the queue, owned by the flush scheduler.
#[derive(Debug)]
pub struct QueueReceiver {
    rx: mpsc::UnboundedReceiver<ForwarderCommand>,
}

impl EventQueue {
    #[must_use]
    pub fn new() -> (Self, QueueReceiver) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, QueueReceiver { rx })
    }

    pub fn enqueue(&self, line: QueuedLine) -> Result<(), ForwarderError> {
        self.tx
            .send(ForwarderCommand::Enqueue(line))
            .map_err(|_| ForwarderError::QueueClosed)
    }

    pub fn shutdown(&self) -> Result<(), ForwarderError> {
        self.tx
            .send(ForwarderCommand::Shutdown)
            .map_err(|_| ForwarderError::QueueClosed)
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    #[must_use]
    pub fn downgrade(&self) -> WeakEventQueue {
        WeakEventQueue {
            tx: self.tx.downgrade(),
        }
    }
}

impl WeakEventQueue {
    /// `None` once every [`EventQueue`] has been dropped.
    #[must_use]
    pub fn upgrade(&self) -> Option<EventQueue> {
        self.tx.upgrade().map(|tx| EventQueue { tx })
    }
}

impl QueueReceiver {
    /// Waits for the next command. `None` once every producer is gone.
    pub async fn dequeue(&mut self) -> Option<ForwarderCommand> {
        self.rx.recv().await
    }

    /// Stops accepting commands; already buffered ones can still be drained.
    pub fn close(&mut self) {
        self.rx.close();
    }

    pub(crate) fn try_dequeue(&mut self) -> Option<ForwarderCommand> {
        self.rx.try_recv().ok()
    }
}
