// Cadenza - An asynchronous, batching Statsd client for Rust!
//
// Copyright 2026 The Cadenza Developers
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use std::mem;
use std::sync::Arc;

use rand::Rng;

use crate::completion::{Parts, PendingSend};
use crate::flush::FlushProbability;

// Shortest valid line, "a:1|c"
const MIN_LINE_LEN: usize = 5;

const LINE_ENDING: u8 = b'\n';

/// Sealed contents of the buffer, ready to be sent as a single datagram.
#[derive(Debug)]
pub(crate) struct Payload {
    bytes: Vec<u8>,
    parts: Parts,
    lines: usize,
}

impl Payload {
    pub(crate) fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub(crate) fn len(&self) -> usize {
        self.bytes.len()
    }

    pub(crate) fn lines(&self) -> usize {
        self.lines
    }

    pub(crate) fn into_parts(self) -> Parts {
        self.parts
    }
}

/// Outcome of appending a line to the buffer.
#[derive(Debug)]
pub(crate) enum Append {
    Held,
    Flushed(Vec<Payload>),
}

/// Batching of encoded lines into newline separated payloads.
///
/// The buffer never holds more than `capacity` bytes. A line that does not
/// fit in the remaining space causes the buffered lines to be sealed first.
/// A line larger than the capacity is sealed on its own. After each line the
/// flush probability decides whether the buffer is sealed early.
///
/// The buffer is not thread safe, callers guard it with a lock.
#[derive(Debug)]
pub(crate) struct BatchBuffer {
    capacity: usize,
    probability: FlushProbability,
    buf: Vec<u8>,
    parts: Parts,
    lines: usize,
}

impl BatchBuffer {
    pub(crate) fn new(capacity: usize, probability: FlushProbability) -> BatchBuffer {
        BatchBuffer {
            capacity,
            probability,
            buf: Vec::with_capacity(capacity),
            parts: Parts::default(),
            lines: 0,
        }
    }

    pub(crate) fn append<R: Rng + ?Sized>(&mut self, line: &str, pending: &Arc<PendingSend>, rng: &mut R) -> Append {
        let mut sealed = Vec::new();

        if line.len() > self.capacity {
            sealed.extend(self.flush());

            let mut parts = Parts::default();
            parts.push(pending);
            sealed.push(Payload {
                bytes: line.as_bytes().to_vec(),
                parts,
                lines: 1,
            });
            return Append::Flushed(sealed);
        }

        if self.remaining() < self.required(line) {
            sealed.extend(self.flush());
        }

        if !self.buf.is_empty() {
            self.buf.push(LINE_ENDING);
        }
        self.buf.extend_from_slice(line.as_bytes());
        self.parts.push(pending);
        self.lines += 1;

        let lucky = self.probability.should_flush(rng);
        if lucky || self.remaining() < MIN_LINE_LEN + 1 {
            sealed.extend(self.flush());
        }

        if sealed.is_empty() {
            Append::Held
        } else {
            Append::Flushed(sealed)
        }
    }

    /// Seal everything currently buffered, if anything.
    pub(crate) fn flush(&mut self) -> Option<Payload> {
        if self.buf.is_empty() {
            return None;
        }

        let bytes = mem::replace(&mut self.buf, Vec::with_capacity(self.capacity));
        let parts = mem::take(&mut self.parts);
        let lines = mem::replace(&mut self.lines, 0);
        Some(Payload { bytes, parts, lines })
    }

    #[cfg(test)]
    fn lines(&self) -> usize {
        self.lines
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.buf.len()
    }

    #[cfg(test)]
    fn capacity(&self) -> usize {
        self.capacity
    }

    #[cfg(test)]
    fn as_str(&self) -> &str {
        std::str::from_utf8(&self.buf).unwrap_or("")
    }

    fn remaining(&self) -> usize {
        self.capacity - self.buf.len()
    }

    fn required(&self, line: &str) -> usize {
        if self.buf.is_empty() {
            line.len()
        } else {
            line.len() + 1
        }
    }
}
