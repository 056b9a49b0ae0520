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
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use crate::buffer::{Append, BatchBuffer};
use crate::builder::StatsdClientBuilder;
use crate::completion::{PendingSend, SendHandle};
use crate::encoder::encode;
use crate::sinks::SinkStats;
use crate::transport::{Transport, TransportStats};
use crate::types::{MeasureMode, Metric, MetricError, MetricResult};

/// State shared by every caller, guarded by a single lock.
#[derive(Debug)]
struct Shared {
    buffer: BatchBuffer,
    closed: bool,
    // Handle of the most recently written datagram
    last: SendHandle,
}

/// Asynchronous, batching client for Statsd.
///
/// Metrics are encoded in the thread of the caller, appended to a shared
/// buffer, and written to the network by a background thread. Every call to
/// `send` or `send_all` returns a `SendHandle` which is resolved once the
/// datagram(s) carrying its lines have been accepted by the socket, or with
/// the first error encountered. Callers are never blocked on the network,
/// only on the short lock around the buffer.
///
/// # Batching
///
/// Lines are joined with `\n` into datagrams no larger than the maximum
/// payload size (512 bytes by default). After each line is appended, the
/// flush probability decides if the buffer is sent right away. With the
/// default probability of 100 every metric is sent in its own datagram.
/// Lower values trade latency for fewer, larger datagrams. A batch sent
/// with `send_all` is always flushed after its last line.
///
/// # Threading
///
/// The client is `Send` and `Sync`. Share it between threads by wrapping it
/// in an `Arc`. With a flush probability below 100 the last lines may stay
/// buffered until more traffic arrives, so wait on handles only after a
/// `flush()` or `close()`.
///
/// ```no_run
/// use std::sync::Arc;
/// use std::thread;
/// use cadenza::{Metric, StatsdClient, DEFAULT_PORT};
///
/// let client = Arc::new(StatsdClient::builder("localhost", DEFAULT_PORT)
///     .with_prefix("my.app")
///     .with_flush_probability(20)
///     .build()
///     .unwrap());
///
/// let threads: Vec<_> = (0..4).map(|_| {
///     let client = Arc::clone(&client);
///     thread::spawn(move || client.send(Metric::count("requests", 1)))
/// }).collect();
///
/// let handles: Vec<_> = threads.into_iter().map(|t| t.join().unwrap()).collect();
/// client.close().wait().unwrap();
///
/// for h in handles {
///     h.wait().unwrap();
/// }
/// ```
///
/// # Closing
///
/// `close()` flushes whatever is buffered, waits (up to the configured close
/// timeout) for it to be sent, and stops the background thread. A send that
/// takes the buffer lock after `close()` does is rejected with a
/// `ClosedClient` error. Dropping the client closes it.
pub struct StatsdClient {
    prefix: String,
    mode: MeasureMode,
    close_timeout: Duration,
    shared: Mutex<Shared>,
    transport: Transport,
}

impl StatsdClient {
    /// Create a new builder for a client sending to the Statsd server at the
    /// given host and port.
    ///
    /// The host is only resolved when the client is built. See
    /// `StatsdClientBuilder` for the available settings and their defaults.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use cadenza::{StatsdClient, DEFAULT_PORT};
    ///
    /// let client = StatsdClient::builder("metrics.example.com", DEFAULT_PORT)
    ///     .with_prefix("my.app")
    ///     .with_measure_as_histogram()
    ///     .build()
    ///     .unwrap();
    /// ```
    pub fn builder(host: &str, port: u16) -> StatsdClientBuilder {
        StatsdClientBuilder::new(host, port)
    }

    pub(crate) fn from_parts(
        prefix: String,
        mode: MeasureMode,
        close_timeout: Duration,
        buffer: BatchBuffer,
        transport: Transport,
    ) -> StatsdClient {
        StatsdClient {
            prefix,
            mode,
            close_timeout,
            shared: Mutex::new(Shared {
                buffer,
                closed: false,
                last: SendHandle::resolved(Ok(())),
            }),
            transport,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Shared> {
        self.shared.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn write_all(&self, shared: &mut Shared, res: Append) {
        if let Append::Flushed(payloads) = res {
            for payload in payloads {
                shared.last = self.transport.write(payload);
            }
        }
    }

    /// Send a single metric.
    ///
    /// The metric is encoded before anything is buffered. If it cannot be
    /// encoded the returned handle is already resolved with the error.
    pub fn send(&self, metric: Metric) -> SendHandle {
        let line = match encode(&metric, &self.prefix, self.mode) {
            Ok(line) => line,
            Err(e) => return SendHandle::failed(e),
        };

        let pending = PendingSend::new(1);
        let mut shared = self.lock();
        if shared.closed {
            return SendHandle::failed(MetricError::closed());
        }

        let res = shared.buffer.append(&line, &pending, &mut rand::thread_rng());
        self.write_all(&mut shared, res);
        pending.handle()
    }

    /// Send a batch of metrics, returning a single handle that is resolved
    /// when every metric in the batch has been sent, or with the first error.
    ///
    /// All metrics are encoded first: if any of them is invalid, none of
    /// them are sent. The buffer is flushed after the last metric of the
    /// batch, so the handle never waits on later traffic. An empty batch
    /// is resolved immediately.
    pub fn send_all(&self, metrics: &[Metric]) -> SendHandle {
        if metrics.is_empty() {
            return SendHandle::resolved(Ok(()));
        }

        let lines = match metrics
            .iter()
            .map(|m| encode(m, &self.prefix, self.mode))
            .collect::<MetricResult<Vec<String>>>()
        {
            Ok(lines) => lines,
            Err(e) => return SendHandle::failed(e),
        };

        let pending = PendingSend::new(lines.len());
        let mut shared = self.lock();
        if shared.closed {
            return SendHandle::failed(MetricError::closed());
        }

        let mut rng = rand::thread_rng();
        for line in &lines {
            let res = shared.buffer.append(line, &pending, &mut rng);
            self.write_all(&mut shared, res);
        }

        if let Some(payload) = shared.buffer.flush() {
            shared.last = self.transport.write(payload);
        }

        pending.handle()
    }

    /// Send anything currently buffered, returning the handle of the datagram
    /// written, or an already resolved handle if the buffer was empty.
    pub fn flush(&self) -> SendHandle {
        let mut shared = self.lock();
        if shared.closed {
            return SendHandle::failed(MetricError::closed());
        }

        match shared.buffer.flush() {
            Some(payload) => {
                let handle = self.transport.write(payload);
                shared.last = handle.clone();
                handle
            }
            None => SendHandle::resolved(Ok(())),
        }
    }

    /// Stop accepting metrics, send anything buffered, and stop the
    /// background thread.
    ///
    /// Blocks for at most the close timeout while datagrams already queued
    /// are sent. The returned handle belongs to the final flush (or is
    /// already resolved if nothing was buffered). Calling `close()` again
    /// returns an already resolved handle.
    pub fn close(&self) -> SendHandle {
        let (last, flushed) = {
            let mut shared = self.lock();
            if shared.closed {
                return SendHandle::resolved(Ok(()));
            }

            shared.closed = true;
            let flushed = shared.buffer.flush().map(|payload| self.transport.write(payload));
            if let Some(ref handle) = flushed {
                shared.last = handle.clone();
            }

            (shared.last.clone(), flushed)
        };

        debug!("Closing Statsd client, waiting up to {:?} for pending datagrams", self.close_timeout);
        self.transport.close(&last, self.close_timeout);
        flushed.unwrap_or_else(|| SendHandle::resolved(Ok(())))
    }

    /// Return `true` once `close()` has been called.
    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// Normalized prefix prepended to every metric name, either empty or
    /// ending with a `.`.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn measure_mode(&self) -> MeasureMode {
        self.mode
    }

    /// Return I/O telemetry from the sink, like bytes and packets sent or
    /// dropped.
    pub fn stats(&self) -> SinkStats {
        self.transport.sink_stats()
    }

    /// Return counters of the background thread writing datagrams.
    pub fn transport_stats(&self) -> TransportStats {
        self.transport.stats()
    }
}

impl Drop for StatsdClient {
    fn drop(&mut self) {
        self.close();
    }
}

impl fmt::Debug for StatsdClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "StatsdClient {{ prefix: {:?}, mode: {:?}, close_timeout: {:?}, transport: ... }}",
            self.prefix, self.mode, self.close_timeout,
        )
    }
}
