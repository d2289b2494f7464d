//! Defaults for the forwarder configuration.
//!
//! These mirror the limits the collector's log API is designed around:
//! - **Buffer size**: a batch is flushed once its serialized records reach 1 MiB
//! - **Line length**: messages above 15,000 bytes are cut before batching
//! - **Flush interval**: sparse traffic still leaves within 250ms
//! - **Retries**: an event is resubmitted at most 5 times after a network failure

use std::time::Duration;

/// Collector endpoint used when none is configured.
pub const DEFAULT_ENDPOINT: &str = "https://log-api.newrelic.com/log/v1";

/// How long a non-empty batch may wait before it is flushed.
pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_millis(250);

/// Cumulative serialized size (bytes) that triggers an immediate flush.
///
/// # Value: 1MiB (1,048,576 bytes)
pub const DEFAULT_MAX_BUFFER_SIZE: usize = 1_024 * 1_024;

/// Maximum message length in bytes before truncation.
pub const DEFAULT_MAX_LINE_LENGTH: usize = 15_000;

/// Maximum number of resubmissions of a single event.
pub const DEFAULT_MAX_RETRIES: u32 = 5;

/// Bound on a single HTTP round trip. Hitting it counts as a network failure.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Image of the forwarder's own container; its output is skipped unless verbose.
pub const DEFAULT_SELF_IMAGE: &str = "newrelic/logspout";

/// Appended to a message cut at `max_line_length`.
pub const TRUNCATION_MARKER: &str = " (cut off, too long...)";

/// Header carrying a license key.
pub const LICENSE_KEY_HEADER: &str = "X-License-Key";

/// Header carrying an insert (API) key.
pub const INSERT_KEY_HEADER: &str = "X-Insert-Key";
