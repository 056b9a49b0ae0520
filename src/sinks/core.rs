// Cadenza - An asynchronous, batching Statsd client for Rust!
//
// Copyright 2026 The Cadenza Developers
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use std::io;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Snapshot of I/O telemetry for a sink.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SinkStats {
    pub bytes_sent: u64,
    pub packets_sent: u64,
    pub bytes_dropped: u64,
    pub packets_dropped: u64,
}

/// Counters for bytes and packets written to, or dropped by, a socket.
///
/// Clones share the same counters.
#[derive(Debug, Clone, Default)]
pub struct SocketStats {
    bytes_sent: Arc<AtomicU64>,
    packets_sent: Arc<AtomicU64>,
    bytes_dropped: Arc<AtomicU64>,
    packets_dropped: Arc<AtomicU64>,
}

impl SocketStats {
    pub fn incr_bytes_sent(&self, n: u64) {
        self.bytes_sent.fetch_add(n, Ordering::Relaxed);
    }

    pub fn incr_packets_sent(&self) {
        self.packets_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn incr_bytes_dropped(&self, n: u64) {
        self.bytes_dropped.fetch_add(n, Ordering::Relaxed);
    }

    pub fn incr_packets_dropped(&self) {
        self.packets_dropped.fetch_add(1, Ordering::Relaxed);
    }

    /// Record the outcome of writing a datagram of `len` bytes.
    pub fn update(&self, res: io::Result<usize>, len: usize) -> io::Result<usize> {
        match res {
            Ok(written) => {
                self.incr_bytes_sent(written as u64);
                self.incr_packets_sent();
                Ok(written)
            }
            Err(e) => {
                self.incr_bytes_dropped(len as u64);
                self.incr_packets_dropped();
                Err(e)
            }
        }
    }
}

impl From<&SocketStats> for SinkStats {
    fn from(stats: &SocketStats) -> Self {
        SinkStats {
            bytes_sent: stats.bytes_sent.load(Ordering::Relaxed),
            packets_sent: stats.packets_sent.load(Ordering::Relaxed),
            bytes_dropped: stats.bytes_dropped.load(Ordering::Relaxed),
            packets_dropped: stats.packets_dropped.load(Ordering::Relaxed),
        }
    }
}

/// Trait for the endpoint that batched Statsd datagrams are written to.
///
/// Each datagram is one or more metric lines in the canonical Statsd format,
/// separated by `\n` with no trailing newline, and never longer than the
/// maximum payload size of the client (unless it holds a single line that is
/// longer than that).
///
/// ``` text
/// some.counter:123|c
/// some.timer:456|ms
/// some.gauge:5|g
/// ```
///
/// Sinks are only ever called from the background transport thread of a
/// client, one datagram at a time. A sink must not block for long: the
/// default UDP sink uses a non-blocking socket and reports a full socket
/// buffer as an error rather than waiting.
///
/// See the [Statsd spec](https://github.com/b/statsd_spec) for more
/// information.
pub trait DatagramSink {
    /// Write a single datagram, returning the number of bytes written or an
    /// I/O error. Every send resolved by this datagram sees the error.
    fn send(&self, datagram: &[u8]) -> io::Result<usize>;

    /// Return I/O telemetry like bytes / packets sent or dropped.
    ///
    /// Note that not all sinks implement this method and the default implementation
    /// returns zeros.
    fn stats(&self) -> SinkStats {
        SinkStats::default()
    }
}

/// Implementation of a `DatagramSink` that discards all datagrams.
///
/// Useful for disabling metric collection or unit tests.
#[derive(Debug, Clone)]
pub struct NopDatagramSink;

impl DatagramSink for NopDatagramSink {
    fn send(&self, datagram: &[u8]) -> io::Result<usize> {
        Ok(datagram.len())
    }
}

#[cfg(test)]
mod tests {
    use super::{DatagramSink, NopDatagramSink, SinkStats, SocketStats};
    use std::io;

    #[test]
    fn test_nop_datagram_sink() {
        let sink = NopDatagramSink;
        assert_eq!(7, sink.send(b"baz:4|c").unwrap());
        assert_eq!(SinkStats::default(), sink.stats());
    }

    #[test]
    fn test_socket_stats_update() {
        let stats = SocketStats::default();
        let shared = stats.clone();

        assert!(stats.update(Ok(12), 12).is_ok());
        assert!(stats
            .update(Err(io::Error::new(io::ErrorKind::WouldBlock, "full")), 30)
            .is_err());

        let snapshot = SinkStats::from(&shared);
        assert_eq!(12, snapshot.bytes_sent);
        assert_eq!(1, snapshot.packets_sent);
        assert_eq!(30, snapshot.bytes_dropped);
        assert_eq!(1, snapshot.packets_dropped);
    }
}
