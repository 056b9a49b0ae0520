// Cadenza - An asynchronous, batching Statsd client for Rust!
//
// Copyright 2026 The Cadenza Developers
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use crate::sinks::core::DatagramSink;
use crossbeam_channel::{bounded, unbounded, Receiver, Sender, TrySendError};
use std::io::{self, ErrorKind};

/// `DatagramSink` implementation that writes every datagram to the `Sender`
/// half of a channel while callers are given ownership of the `Receiver` half.
///
/// This is not a general purpose sink, rather it's a sink meant for verifying
/// datagrams written during the course of integration tests. By default, the
/// channel used is unbounded. The channel size can be limited using the
/// `with_capacity` method, in which case writes fail once the channel is full.
///
/// # Example
///
/// ```
/// use cadenza::{Metric, SpyDatagramSink, StatsdClient};
///
/// let (rx, sink) = SpyDatagramSink::new();
/// let client = StatsdClient::builder("localhost", 8125)
///     .with_sink(sink)
///     .build()
///     .unwrap();
///
/// client.send(Metric::count("example", 1)).wait().unwrap();
/// assert_eq!(b"example:1|c".to_vec(), rx.recv().unwrap());
/// ```
#[derive(Debug)]
pub struct SpyDatagramSink {
    sender: Sender<Vec<u8>>,
}

impl SpyDatagramSink {
    pub fn new() -> (Receiver<Vec<u8>>, Self) {
        Self::with_queue_capacity(None)
    }

    pub fn with_capacity(queue: usize) -> (Receiver<Vec<u8>>, Self) {
        Self::with_queue_capacity(Some(queue))
    }

    fn with_queue_capacity(queue: Option<usize>) -> (Receiver<Vec<u8>>, Self) {
        let (tx, rx) = if let Some(sz) = queue { bounded(sz) } else { unbounded() };
        let sink = SpyDatagramSink { sender: tx };
        (rx, sink)
    }
}

impl DatagramSink for SpyDatagramSink {
    fn send(&self, datagram: &[u8]) -> io::Result<usize> {
        match self.sender.try_send(datagram.to_vec()) {
            Err(TrySendError::Disconnected(_)) => Err(io::Error::new(ErrorKind::Other, "channel disconnected")),
            Err(TrySendError::Full(_)) => Err(io::Error::new(ErrorKind::Other, "channel full")),
            Ok(_) => Ok(datagram.len()),
        }
    }
}
