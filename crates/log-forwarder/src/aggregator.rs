//! Batch accumulation for the flush scheduler.
//!
//! The aggregator holds the lines dequeued since the last flush together with
//! the running sum of their serialized lengths. It is owned by the scheduler
//! task alone, producers never touch it.
//!
//! # Batching Strategy
//!
//! A batch is cut when either:
//! 1. **Size limit**: the running total reaches `max_buffer_size` after an add
//! 2. **Flush trigger**: the scheduler's interval timer fires
//!
//! The line that crosses the threshold belongs to the batch it completes, so a
//! batch can exceed `max_buffer_size` by at most one line.

use crate::queue::QueuedLine;

/// Lines accumulated between two flushes.
///
/// `byte_size` is always the sum of `line.len()` over `lines`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Batch {
    lines: Vec<QueuedLine>,
    byte_size: usize,
}

impl Batch {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, line: QueuedLine) {
        self.byte_size += line.len();
        self.lines.push(line);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Cumulative serialized size of the lines in bytes.
    #[must_use]
    pub fn byte_size(&self) -> usize {
        self.byte_size
    }

    #[must_use]
    pub fn lines(&self) -> &[QueuedLine] {
        &self.lines
    }

    #[must_use]
    pub fn into_lines(self) -> Vec<QueuedLine> {
        self.lines
    }
}

impl FromIterator<QueuedLine> for Batch {
    fn from_iter<I: IntoIterator<Item = QueuedLine>>(iter: I) -> Self {
        let mut batch = Batch::new();
        for line in iter {
            batch.push(line);
        }
        batch
    }
}

/// Accumulates lines into the current batch and reports when it is full.
///
/// # Example
///
/// ```rust
/// use log_forwarder::aggregator::Aggregator;
/// use log_forwarder::queue::QueuedLine;
///
/// let mut aggregator = Aggregator::new(16);
///
/// assert!(!aggregator.add(QueuedLine::new(b"{\"a\":1}".to_vec())));
/// assert!(aggregator.add(QueuedLine::new(b"{\"bb\":22}".to_vec())));
///
/// let batch = aggregator.drain_and_reset();
/// assert_eq!(batch.len(), 2);
/// assert!(aggregator.drain_and_reset().is_empty());
/// ```
#[derive(Debug)]
pub struct Aggregator {
    batch: Batch,
    max_buffer_size: usize,
}

impl Aggregator {
    #[must_use]
    pub fn new(max_buffer_size: usize) -> Self {
        Self {
            batch: Batch::new(),
            max_buffer_size,
        }
    }

    /// Appends `line` and returns whether the buffer threshold has been reached.
    pub fn add(&mut self, line: QueuedLine) -> bool {
        self.batch.push(line);
        self.is_full()
    }

    #[must_use]
    pub fn is_full(&self) -> bool {
        self.batch.byte_size() >= self.max_buffer_size
    }

    /// Hands out the current batch and leaves an empty one behind.
    pub fn drain_and_reset(&mut self) -> Batch {
        std::mem::take(&mut self.batch)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.batch.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.batch.is_empty()
    }

    #[must_use]
    pub fn byte_size(&self) -> usize {
        self.batch.byte_size()
    }
}
