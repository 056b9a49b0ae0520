// Cadenza - An asynchronous, batching Statsd client for Rust!
//
// Copyright 2026 The Cadenza Developers
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use rand::Rng;

use crate::types::{ErrorKind, MetricError};

/// Chance, in percent, that the buffer is flushed after each appended line.
///
/// After every line is added to the buffer a number is drawn uniformly from
/// `[0, 100)` and the buffer is flushed if it is lower than the probability.
/// This trades latency for fewer, larger datagrams:
///
/// * `100` flushes after every line, each metric gets its own datagram.
/// * `0` only flushes when the buffer is full, when a batch completes, on an
///   explicit flush, or when the client is closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlushProbability(u8);

impl FlushProbability {
    pub const ALWAYS: FlushProbability = FlushProbability(100);
    pub const NEVER: FlushProbability = FlushProbability(0);

    pub fn percent(&self) -> u8 {
        self.0
    }

    pub(crate) fn should_flush<R: Rng + ?Sized>(&self, rng: &mut R) -> bool {
        match self.0 {
            0 => false,
            100 => true,
            p => rng.gen_range(0..100u8) < p,
        }
    }
}

impl Default for FlushProbability {
    fn default() -> Self {
        FlushProbability::ALWAYS
    }
}

impl TryFrom<u8> for FlushProbability {
    type Error = MetricError;

    fn try_from(percent: u8) -> Result<Self, Self::Error> {
        if percent <= 100 {
            Ok(FlushProbability(percent))
        } else {
            Err(MetricError::from((
                ErrorKind::InvalidInput,
                "Flush probability must be between 0 and 100",
            )))
        }
    }
}
