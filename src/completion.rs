// Cadenza - An asynchronous, batching Statsd client for Rust!
//
// Copyright 2026 The Cadenza Developers
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use crate::types::{MetricError, MetricResult};

#[derive(Debug, Default)]
struct Slot {
    result: Mutex<Option<MetricResult<()>>>,
    resolved: Condvar,
}

impl Slot {
    fn lock(&self) -> MutexGuard<'_, Option<MetricResult<()>>> {
        // A poisoned lock still holds a consistent value
        self.result.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Handle to the eventual outcome of sending one or more metrics.
///
/// A handle is resolved exactly once: with `Ok(())` after every line it
/// covers has been accepted by the socket, or with the first error seen.
/// Handles are cheap to clone and any number of threads may wait on the
/// same handle.
///
/// Acceptance by the socket does not mean the metrics were received by
/// a server. Statsd uses UDP and delivery is best effort.
///
/// # Example
///
/// ```no_run
/// use cadenza::{Metric, StatsdClient};
///
/// let client = StatsdClient::builder("localhost", 8125).build().unwrap();
/// let handle = client.send(Metric::count("requests", 1));
///
/// if let Err(e) = handle.wait() {
///     eprintln!("could not send metric: {}", e);
/// }
/// ```
#[derive(Clone, Default)]
pub struct SendHandle {
    slot: Arc<Slot>,
}

impl SendHandle {
    pub(crate) fn new() -> SendHandle {
        SendHandle::default()
    }

    pub(crate) fn resolved(result: MetricResult<()>) -> SendHandle {
        let handle = SendHandle::new();
        handle.resolve(result);
        handle
    }

    pub(crate) fn failed(err: MetricError) -> SendHandle {
        SendHandle::resolved(Err(err))
    }

    /// Resolve this handle, returning `false` if it was already resolved,
    /// in which case the existing result is kept.
    pub(crate) fn resolve(&self, result: MetricResult<()>) -> bool {
        let mut guard = self.slot.lock();
        if guard.is_some() {
            return false;
        }

        *guard = Some(result);
        self.slot.resolved.notify_all();
        true
    }

    /// Return `true` if this handle has been resolved.
    pub fn is_done(&self) -> bool {
        self.slot.lock().is_some()
    }

    /// Return the result of this handle if it has been resolved, without
    /// waiting.
    pub fn try_result(&self) -> Option<MetricResult<()>> {
        self.slot.lock().clone()
    }

    /// Block the current thread until this handle is resolved.
    pub fn wait(&self) -> MetricResult<()> {
        let mut guard = self.slot.lock();
        loop {
            if let Some(ref res) = *guard {
                return res.clone();
            }

            guard = self.slot.resolved.wait(guard).unwrap_or_else(|e| e.into_inner());
        }
    }

    /// Block the current thread until this handle is resolved or the timeout
    /// elapses, returning `None` in the latter case. A timeout too large to
    /// be represented as a deadline waits without a limit.
    pub fn wait_timeout(&self, timeout: Duration) -> Option<MetricResult<()>> {
        let deadline = match Instant::now().checked_add(timeout) {
            Some(deadline) => deadline,
            None => return Some(self.wait()),
        };

        let mut guard = self.slot.lock();
        loop {
            if let Some(ref res) = *guard {
                return Some(res.clone());
            }

            let now = Instant::now();
            if now >= deadline {
                return None;
            }

            guard = match self.slot.resolved.wait_timeout(guard, deadline - now) {
                Ok((g, _)) => g,
                Err(e) => e.into_inner().0,
            };
        }
    }
}

impl fmt::Debug for SendHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SendHandle").field("result", &self.try_result()).finish()
    }
}

/// One logical send (a `send` or `send_all` call) that may be spread over
/// several datagrams.
///
/// The number of outstanding lines is fixed before the first line is
/// buffered. Each datagram carrying lines of this send reports how many of
/// them it carried; the handle resolves when the count reaches zero, or
/// immediately on the first failure.
#[derive(Debug)]
pub(crate) struct PendingSend {
    remaining: AtomicUsize,
    handle: SendHandle,
}

impl PendingSend {
    pub(crate) fn new(lines: usize) -> Arc<PendingSend> {
        let handle = SendHandle::new();
        if lines == 0 {
            handle.resolve(Ok(()));
        }

        Arc::new(PendingSend {
            remaining: AtomicUsize::new(lines),
            handle,
        })
    }

    pub(crate) fn handle(&self) -> SendHandle {
        self.handle.clone()
    }

    pub(crate) fn complete(&self, lines: usize) {
        let prev = self.remaining.fetch_sub(lines, Ordering::AcqRel);
        debug_assert!(prev >= lines, "completed more lines than were sent");
        if prev == lines {
            self.handle.resolve(Ok(()));
        }
    }

    pub(crate) fn fail(&self, err: MetricError) {
        self.handle.resolve(Err(err));
    }
}

/// Pending sends with lines in a single datagram, along with how many of
/// their lines it carries.
#[derive(Debug, Default)]
pub(crate) struct Parts {
    parts: Vec<(Arc<PendingSend>, usize)>,
}

impl Parts {
    /// Record one more line belonging to `pending`. Consecutive lines of the
    /// same send share a single entry.
    pub(crate) fn push(&mut self, pending: &Arc<PendingSend>) {
        match self.parts.last_mut() {
            Some((last, count)) if Arc::ptr_eq(last, pending) => *count += 1,
            _ => self.parts.push((Arc::clone(pending), 1)),
        }
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.parts.len()
    }

    /// Report the outcome of the datagram to every send it carried lines for.
    pub(crate) fn resolve(self, result: &MetricResult<()>) {
        for (pending, lines) in self.parts {
            match result {
                Ok(()) => pending.complete(lines),
                Err(e) => pending.fail(e.clone()),
            }
        }
    }
}
