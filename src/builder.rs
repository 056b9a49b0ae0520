// Cadenza - An asynchronous, batching Statsd client for Rust!
//
// Copyright 2026 The Cadenza Developers
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use log::debug;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::buffer::BatchBuffer;
use crate::client::StatsdClient;
use crate::encoder::normalize_prefix;
use crate::flush::FlushProbability;
use crate::sinks::{DatagramSink, UdpDatagramSink};
use crate::transport::{SharedSink, Transport};
use crate::types::{ErrorKind, MeasureMode, MetricError, MetricResult};

/// Conservative payload size that fits in a single packet on any network.
pub const DEFAULT_PAYLOAD_SIZE: usize = 512;

/// Time `close()` waits for the final datagram to be sent.
pub const DEFAULT_CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

/// Builder for creating and customizing `StatsdClient` instances.
///
/// Instances of the builder should be created by calling the `::builder()`
/// method on the `StatsdClient` struct. Settings are validated when `build()`
/// is called.
///
/// Defaults:
///
/// * No prefix.
/// * Flush probability of 100, every metric is sent in its own datagram.
/// * Timings are sent as timers (`ms`).
/// * Maximum payload size of 512 bytes.
/// * Close timeout of five seconds.
/// * Unbounded queue between callers and the background thread.
/// * A non-blocking UDP socket connected to the host and port.
///
/// # Example
///
/// ```no_run
/// use std::time::Duration;
/// use cadenza::{StatsdClient, DEFAULT_PORT};
///
/// let client = StatsdClient::builder("metrics.example.com", DEFAULT_PORT)
///     .with_prefix("my.app")
///     .with_flush_probability(20)
///     .with_max_payload_size(1432)
///     .with_close_timeout(Duration::from_secs(1))
///     .build()
///     .unwrap();
/// ```
pub struct StatsdClientBuilder {
    host: String,
    port: u16,
    prefix: String,
    probability: u8,
    mode: MeasureMode,
    max_payload_size: usize,
    close_timeout: Duration,
    queue_capacity: Option<usize>,
    sink: Option<SharedSink>,
}

impl StatsdClientBuilder {
    // Set the required fields and defaults for optional fields
    pub(crate) fn new(host: &str, port: u16) -> Self {
        StatsdClientBuilder {
            // required
            host: host.to_owned(),
            port,

            // optional with defaults
            prefix: String::new(),
            probability: FlushProbability::default().percent(),
            mode: MeasureMode::default(),
            max_payload_size: DEFAULT_PAYLOAD_SIZE,
            close_timeout: DEFAULT_CLOSE_TIMEOUT,
            queue_capacity: None,
            sink: None,
        }
    }

    /// Prefix prepended to every metric name. Trailing dots are ignored and
    /// a single `.` is used as the separator.
    pub fn with_prefix(mut self, prefix: &str) -> Self {
        self.prefix = prefix.to_owned();
        self
    }

    /// Chance, in percent, that the buffer is flushed after each metric.
    /// Must be between 0 and 100.
    pub fn with_flush_probability(mut self, percent: u8) -> Self {
        self.probability = percent;
        self
    }

    /// Send timings as timers (`ms`). This is the default.
    pub fn with_measure_as_time(mut self) -> Self {
        self.mode = MeasureMode::Time;
        self
    }

    /// Send timings as histograms (`h`).
    pub fn with_measure_as_histogram(mut self) -> Self {
        self.mode = MeasureMode::Histogram;
        self
    }

    /// Largest datagram to send, in bytes. A single metric larger than this
    /// is still sent, alone in its own datagram.
    pub fn with_max_payload_size(mut self, size: usize) -> Self {
        self.max_payload_size = size;
        self
    }

    pub fn with_close_timeout(mut self, timeout: Duration) -> Self {
        self.close_timeout = timeout;
        self
    }

    /// Bound the queue between callers and the background thread. When the
    /// queue is full, datagrams are failed with a `SocketError` instead of
    /// being queued.
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = Some(capacity);
        self
    }

    /// Write datagrams to the given sink instead of a UDP socket connected
    /// to the host and port, which are then ignored.
    pub fn with_sink<T>(mut self, sink: T) -> Self
    where
        T: DatagramSink + Sync + Send + 'static,
    {
        self.sink = Some(Arc::new(sink));
        self
    }

    /// Construct a new `StatsdClient` instance based on current settings.
    ///
    /// # Failures
    ///
    /// This method may fail if:
    ///
    /// * The prefix contains a reserved character.
    /// * The flush probability is over 100.
    /// * The maximum payload size or queue capacity is zero.
    /// * The host cannot be resolved or the socket cannot be created.
    pub fn build(self) -> MetricResult<StatsdClient> {
        let prefix = normalize_prefix(&self.prefix)?;
        let probability = FlushProbability::try_from(self.probability)?;

        if self.max_payload_size == 0 {
            return Err(MetricError::from((
                ErrorKind::InvalidInput,
                "Maximum payload size must be greater than zero",
            )));
        }

        if self.queue_capacity == Some(0) {
            return Err(MetricError::from((
                ErrorKind::InvalidInput,
                "Queue capacity must be greater than zero",
            )));
        }

        let sink: SharedSink = match self.sink {
            Some(sink) => sink,
            None => Arc::new(UdpDatagramSink::connect((self.host.as_str(), self.port))?),
        };

        debug!(
            "Building Statsd client for {}:{} with prefix {:?}, flush probability {}, max payload {} bytes",
            self.host,
            self.port,
            prefix,
            probability.percent(),
            self.max_payload_size,
        );

        let buffer = BatchBuffer::new(self.max_payload_size, probability);
        let transport = Transport::new(sink, self.queue_capacity);
        Ok(StatsdClient::from_parts(
            prefix,
            self.mode,
            self.close_timeout,
            buffer,
            transport,
        ))
    }
}

impl fmt::Debug for StatsdClientBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "StatsdClientBuilder {{ host: {:?}, port: {}, prefix: {:?}, probability: {}, mode: {:?}, \
             max_payload_size: {}, close_timeout: {:?}, queue_capacity: {:?}, sink: ... }}",
            self.host,
            self.port,
            self.prefix,
            self.probability,
            self.mode,
            self.max_payload_size,
            self.close_timeout,
            self.queue_capacity,
        )
    }
}
