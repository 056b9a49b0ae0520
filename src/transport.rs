// Cadenza - An asynchronous, batching Statsd client for Rust!
//
// Copyright 2026 The Cadenza Developers
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use crossbeam_channel::{self, select, Receiver, Sender, TrySendError};
use log::{trace, warn};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::Duration;

use crate::buffer::Payload;
use crate::completion::SendHandle;
use crate::sinks::{DatagramSink, SinkStats};
use crate::types::{ErrorKind, MetricError, MetricResult};

pub(crate) type SharedSink = Arc<dyn DatagramSink + Send + Sync + 'static>;

/// Counters kept by the background thread that writes datagrams.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TransportStats {
    /// Datagrams accepted onto the transport queue.
    pub submitted: u64,
    /// Datagrams taken off the queue and handed to the sink.
    pub drained: u64,
    /// Approximate number of datagrams waiting on the queue.
    pub queued: u64,
    /// Number of times the sink panicked and the thread had to be restarted.
    pub panics: u64,
}

/// Owner of the datagram sink, running it in a background thread.
///
/// Payloads written to the transport are queued and sent by the sink in the
/// order they were written, from a single thread. Writing never blocks: when
/// created with a bounded queue, a payload that does not fit fails right away
/// with a `SocketError`.
///
/// The thread is started when the transport is created and stopped by
/// `close()` (or when the transport is dropped) after every payload queued
/// before it has been sent. The stop signal does not go through the payload
/// queue, so it is never lost when a bounded queue is full. The sink is
/// dropped, releasing its socket, when the thread stops.
#[derive(Debug)]
pub(crate) struct Transport {
    worker: Arc<Worker>,
}

impl Transport {
    pub(crate) fn new(sink: SharedSink, capacity: Option<usize>) -> Transport {
        let worker = Arc::new(Worker::new(sink, capacity));
        spawn_worker_in_thread(Arc::clone(&worker));
        Transport { worker }
    }

    /// Queue a payload to be sent as one datagram, returning a handle that is
    /// resolved once the sink has accepted or rejected it. Every pending send
    /// with lines in the payload is resolved at the same time.
    pub(crate) fn write(&self, payload: Payload) -> SendHandle {
        let handle = SendHandle::new();
        let job = Job::new(payload, handle.clone());

        if self.worker.is_stopping() {
            warn!("Unable to queue datagram: Transport has been stopped");
            job.finish(Err(MetricError::from((ErrorKind::SocketError, "Transport has been stopped"))));
            return handle;
        }

        if let Err(e) = self.worker.submit(job) {
            let desc = match e {
                TrySendError::Full(_) => "Transport queue is full",
                TrySendError::Disconnected(_) => "Transport has been stopped",
            };

            warn!("Unable to queue datagram: {}", desc);
            e.into_inner().finish(Err(MetricError::from((ErrorKind::SocketError, desc))));
        }

        handle
    }

    /// Wait at most `grace` for the final datagram to be sent, then signal
    /// the background thread to stop once the queue has been drained. Only
    /// the wait on `last` blocks. Return `false` if the final datagram was
    /// not sent in time.
    pub(crate) fn close(&self, last: &SendHandle, grace: Duration) -> bool {
        let finished = last.wait_timeout(grace).is_some();
        if !finished {
            warn!("Final datagram was not sent within {:?}", grace);
        }

        self.worker.stop();
        finished
    }

    pub(crate) fn stats(&self) -> TransportStats {
        self.worker.stats.snapshot()
    }

    pub(crate) fn sink_stats(&self) -> SinkStats {
        match *self.worker.lock_sink() {
            SinkSlot::Open(ref sink) => sink.stats(),
            SinkSlot::Closed(ref stats) => stats.clone(),
        }
    }
}

impl Drop for Transport {
    /// Send the worker a signal to stop processing payloads.
    ///
    /// Note that this destructor only sends the worker thread a signal to
    /// stop, it doesn't wait for it to stop.
    fn drop(&mut self) {
        self.worker.stop();
    }
}

/// A payload waiting to be sent along with the handle for its datagram.
///
/// A job that is dropped without being finished (the sink panicked, or the
/// transport went away with the job still queued) resolves everything it
/// carries with an error.
struct Job {
    payload: Option<Payload>,
    handle: SendHandle,
}

impl Job {
    fn new(payload: Payload, handle: SendHandle) -> Job {
        Job {
            payload: Some(payload),
            handle,
        }
    }

    fn finish(mut self, result: MetricResult<()>) {
        if let Some(payload) = self.payload.take() {
            payload.into_parts().resolve(&result);
        }

        self.handle.resolve(result);
    }
}

impl Drop for Job {
    fn drop(&mut self) {
        if let Some(payload) = self.payload.take() {
            let result = Err(MetricError::from((
                ErrorKind::SocketError,
                "Datagram was dropped before it could be sent",
            )));

            payload.into_parts().resolve(&result);
            self.handle.resolve(result);
        }
    }
}

enum SinkSlot {
    Open(SharedSink),
    Closed(SinkStats),
}

#[derive(Debug, Default)]
struct WorkerStats {
    panics: AtomicU64,
    submitted: AtomicU64,
    drained: AtomicU64,
}

impl WorkerStats {
    fn incr_panic(&self) {
        self.panics.fetch_add(1, Ordering::Release);
    }

    fn incr_submitted(&self) {
        self.submitted.fetch_add(1, Ordering::Release);
    }

    fn incr_drained(&self) {
        self.drained.fetch_add(1, Ordering::Release);
    }

    fn snapshot(&self) -> TransportStats {
        let submitted = self.submitted.load(Ordering::Acquire);
        let drained = self.drained.load(Ordering::Acquire);

        TransportStats {
            submitted,
            drained,
            queued: submitted.saturating_sub(drained),
            panics: self.panics.load(Ordering::Acquire),
        }
    }
}

/// Create a thread and run the worker in it to completion
///
/// This function uses a `Sentinel` struct to make sure that any panics from
/// the sink result in another thread being spawned to start running the
/// worker again.
fn spawn_worker_in_thread(worker: Arc<Worker>) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        let mut sentinel = Sentinel::new(&worker);
        worker.run();
        sentinel.cancel();
    })
}

/// Struct for ensuring a worker runs to completion correctly, without
/// panicking.
///
/// The sentinel will spawn a new thread to continue running the worker
/// in its destructor unless the `.cancel()` method is called after the
/// worker completes (which won't happen if the worker panics).
struct Sentinel<'a> {
    worker: &'a Arc<Worker>,
    active: bool,
}

impl<'a> Sentinel<'a> {
    fn new(worker: &'a Arc<Worker>) -> Sentinel<'a> {
        Sentinel { worker, active: true }
    }

    fn cancel(&mut self) {
        self.active = false;
    }
}

impl<'a> Drop for Sentinel<'a> {
    fn drop(&mut self) {
        if self.active {
            warn!("Datagram sink panicked, restarting transport thread");
            self.worker.stats.incr_panic();
            spawn_worker_in_thread(Arc::clone(self.worker));
        }
    }
}

/// Worker sending queued payloads with the sink.
///
/// Stopping sets a flag and wakes the worker through a separate unbounded
/// control channel. The worker then sends whatever is left on the payload
/// queue and releases the sink.
struct Worker {
    sink: Mutex<SinkSlot>,
    sender: Sender<Job>,
    receiver: Receiver<Job>,
    control_tx: Sender<()>,
    control_rx: Receiver<()>,
    stopping: AtomicBool,
    stopped: AtomicBool,
    stats: WorkerStats,
}

impl Worker {
    fn new(sink: SharedSink, capacity: Option<usize>) -> Worker {
        let (tx, rx) = if let Some(v) = capacity {
            crossbeam_channel::bounded(v)
        } else {
            crossbeam_channel::unbounded()
        };
        let (control_tx, control_rx) = crossbeam_channel::unbounded();

        Worker {
            sink: Mutex::new(SinkSlot::Open(sink)),
            sender: tx,
            receiver: rx,
            control_tx,
            control_rx,
            stopping: AtomicBool::new(false),
            stopped: AtomicBool::new(false),
            stats: WorkerStats::default(),
        }
    }

    fn lock_sink(&self) -> MutexGuard<'_, SinkSlot> {
        self.sink.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn submit(&self, job: Job) -> Result<(), TrySendError<Job>> {
        let res = self.sender.try_send(job);
        if res.is_ok() {
            self.stats.incr_submitted();
        }

        res
    }

    fn run(&self) {
        loop {
            if self.is_stopping() {
                for job in self.receiver.try_iter() {
                    self.stats.incr_drained();
                    self.process(job);
                }
                break;
            }

            select! {
                recv(self.receiver) -> msg => match msg {
                    Ok(job) => {
                        self.stats.incr_drained();
                        self.process(job);
                    }
                    Err(_) => break,
                },
                // Wakes the loop to see the stop flag
                recv(self.control_rx) -> _ => {}
            }
        }

        let mut slot = self.lock_sink();
        if let SinkSlot::Open(ref sink) = *slot {
            let stats = sink.stats();
            *slot = SinkSlot::Closed(stats);
        }

        self.stopped.store(true, Ordering::Release);
    }

    fn process(&self, job: Job) {
        let sink = match *self.lock_sink() {
            SinkSlot::Open(ref sink) => Some(Arc::clone(sink)),
            SinkSlot::Closed(_) => None,
        };

        let (len, lines, result) = match (job.payload.as_ref(), sink) {
            (Some(payload), Some(sink)) => {
                let res = sink.send(payload.as_bytes()).map(|_| ()).map_err(MetricError::from);
                (payload.len(), payload.lines(), res)
            }
            (Some(payload), None) => (payload.len(), payload.lines(), Err(MetricError::closed())),
            (None, _) => return,
        };

        match result {
            Ok(()) => trace!("Sent datagram of {} bytes with {} lines", len, lines),
            Err(ref e) => warn!("Unable to send datagram of {} bytes with {} lines: {}", len, lines, e),
        }

        job.finish(result);
    }

    fn stop(&self) {
        self.stopping.store(true, Ordering::Release);
        // Never blocks, the control channel is unbounded
        let _ = self.control_tx.send(());
    }

    fn is_stopping(&self) -> bool {
        self.stopping.load(Ordering::Acquire)
    }

    #[cfg(test)]
    fn stop_and_wait(&self) {
        self.stop();

        while !self.stopped.load(Ordering::Acquire) {
            thread::yield_now();
        }
    }

    #[cfg(test)]
    fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }
}

impl fmt::Debug for Worker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Worker {{ ... }}")
    }
}

#[cfg(test)]
mod tests {
    use super::{SharedSink, Transport};
    use crate::buffer::{BatchBuffer, Payload};
    use crate::completion::{PendingSend, SendHandle};
    use crate::flush::FlushProbability;
    use crate::sinks::{DatagramSink, NopDatagramSink, SpyDatagramSink};
    use crate::types::ErrorKind;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use std::io;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::thread;
    use std::time::{Duration, Instant};

    const QUEUE_SIZE: Option<usize> = Some(128);
    const TIMEOUT: Duration = Duration::from_secs(5);

    fn payload(lines: &[&str]) -> (Payload, Arc<PendingSend>) {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let mut buffer = BatchBuffer::new(512, FlushProbability::NEVER);
        let pending = PendingSend::new(lines.len());
        for line in lines {
            buffer.append(line, &pending, &mut rng);
        }

        (buffer.flush().unwrap(), pending)
    }

    struct FailingDatagramSink;

    impl DatagramSink for FailingDatagramSink {
        fn send(&self, _datagram: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::ConnectionRefused, "refused"))
        }
    }

    struct SometimesPanickingDatagramSink {
        counter: AtomicUsize,
    }

    impl DatagramSink for SometimesPanickingDatagramSink {
        fn send(&self, datagram: &[u8]) -> io::Result<usize> {
            let val = self.counter.fetch_add(1, Ordering::AcqRel);
            if val == 0 {
                panic!("This thread is supposed to panic");
            }

            Ok(datagram.len())
        }
    }

    struct BlockingDatagramSink;

    impl DatagramSink for BlockingDatagramSink {
        fn send(&self, _datagram: &[u8]) -> io::Result<usize> {
            loop {
                thread::park();
            }
        }
    }

    // Blocks every send until the gate is closed
    struct GatedDatagramSink {
        gate: crossbeam_channel::Receiver<()>,
    }

    impl DatagramSink for GatedDatagramSink {
        fn send(&self, datagram: &[u8]) -> io::Result<usize> {
            let _ = self.gate.recv();
            Ok(datagram.len())
        }
    }

    // Write one payload that the worker is busy sending and a second one
    // that fills a queue of size one.
    fn fill_bounded_queue(transport: &Transport) -> (SendHandle, SendHandle) {
        let (first, _) = payload(&["foo:1|c"]);
        let first = transport.write(first);
        while transport.stats().drained < 1 {
            thread::yield_now();
        }

        let (second, _) = payload(&["foo:2|c"]);
        let second = transport.write(second);
        assert!(!second.is_done());
        (first, second)
    }

    #[test]
    fn test_transport_write_resolves_handles() {
        let (rx, sink) = SpyDatagramSink::new();
        let transport = Transport::new(Arc::new(sink), QUEUE_SIZE);

        let (payload, pending) = payload(&["foo:1|c", "bar:2|g"]);
        let handle = transport.write(payload);

        assert!(handle.wait_timeout(TIMEOUT).unwrap().is_ok());
        assert!(pending.handle().wait_timeout(TIMEOUT).unwrap().is_ok());
        assert_eq!(b"foo:1|c\nbar:2|g".to_vec(), rx.recv().unwrap());
    }

    #[test]
    fn test_transport_preserves_order() {
        let (rx, sink) = SpyDatagramSink::new();
        let transport = Transport::new(Arc::new(sink), None);

        let mut handles = vec![];
        for i in 0..50 {
            let line = format!("some.counter:{}|c", i);
            let (payload, _) = payload(&[&line]);
            handles.push(transport.write(payload));
        }

        for h in handles {
            assert!(h.wait_timeout(TIMEOUT).unwrap().is_ok());
        }

        for i in 0..50 {
            let expected = format!("some.counter:{}|c", i);
            assert_eq!(expected.into_bytes(), rx.recv().unwrap());
        }
    }

    #[test]
    fn test_transport_write_failure() {
        let transport = Transport::new(Arc::new(FailingDatagramSink), QUEUE_SIZE);
        let (payload, pending) = payload(&["foo:1|c"]);
        let handle = transport.write(payload);

        let res = handle.wait_timeout(TIMEOUT).unwrap();
        assert_eq!(ErrorKind::SocketError, res.unwrap_err().kind());
        let res = pending.handle().wait_timeout(TIMEOUT).unwrap();
        assert_eq!(ErrorKind::SocketError, res.unwrap_err().kind());
    }

    #[test]
    fn test_transport_recover_from_panics() {
        let sink: SharedSink = Arc::new(SometimesPanickingDatagramSink {
            counter: AtomicUsize::new(0),
        });
        let transport = Transport::new(sink, QUEUE_SIZE);

        let (first, _) = payload(&["foo.counter:4|c"]);
        let (second, _) = payload(&["foo.counter:5|c"]);
        let first = transport.write(first);
        let second = transport.write(second);

        assert!(first.wait_timeout(TIMEOUT).unwrap().is_err());
        assert!(second.wait_timeout(TIMEOUT).unwrap().is_ok());

        transport.worker.stop_and_wait();
        assert_eq!(1, transport.stats().panics);
        assert_eq!(2, transport.stats().drained);
    }

    #[test]
    fn test_transport_queue_full() {
        let transport = Transport::new(Arc::new(BlockingDatagramSink), Some(1));

        let mut rejected = None;
        for _ in 0..100 {
            let (payload, pending) = payload(&["foo:1|c"]);
            let handle = transport.write(payload);
            if handle.is_done() {
                rejected = Some((handle, pending));
                break;
            }
        }

        let (handle, pending) = rejected.unwrap();
        assert_eq!(ErrorKind::SocketError, handle.wait().unwrap_err().kind());
        assert_eq!(ErrorKind::SocketError, pending.handle().wait().unwrap_err().kind());
    }

    #[test]
    fn test_transport_close_stops_worker() {
        let transport = Transport::new(Arc::new(NopDatagramSink), QUEUE_SIZE);
        let (payload, _) = payload(&["foo:1|c"]);
        let last = transport.write(payload);

        assert!(transport.close(&last, TIMEOUT));
        while !transport.worker.is_stopped() {
            thread::yield_now();
        }

        assert_eq!(1, transport.stats().submitted);
        assert_eq!(0, transport.stats().queued);
    }

    #[test]
    fn test_transport_close_nothing_pending() {
        let transport = Transport::new(Arc::new(NopDatagramSink), QUEUE_SIZE);
        assert!(transport.close(&SendHandle::resolved(Ok(())), TIMEOUT));
    }

    #[test]
    fn test_transport_close_times_out() {
        let transport = Transport::new(Arc::new(BlockingDatagramSink), QUEUE_SIZE);
        let (first, _) = payload(&["foo:1|c"]);
        let (second, _) = payload(&["foo:2|c"]);
        transport.write(first);
        let last = transport.write(second);

        assert!(!transport.close(&last, Duration::from_millis(50)));
        assert!(!last.is_done());
    }

    #[test]
    fn test_transport_close_full_queue_single_deadline() {
        let (gate, rx) = crossbeam_channel::unbounded::<()>();
        let transport = Transport::new(Arc::new(GatedDatagramSink { gate: rx }), Some(1));
        let (first, last) = fill_bounded_queue(&transport);

        let start = Instant::now();
        assert!(!transport.close(&last, Duration::from_millis(200)));
        assert!(start.elapsed() < Duration::from_millis(350));
        assert!(!transport.worker.is_stopped());

        drop(gate);
        assert!(first.wait_timeout(TIMEOUT).unwrap().is_ok());
        assert!(last.wait_timeout(TIMEOUT).unwrap().is_ok());

        while !transport.worker.is_stopped() {
            thread::yield_now();
        }
        assert_eq!(2, transport.stats().drained);
    }

    #[test]
    fn test_transport_drop_full_queue_stops_worker() {
        let (gate, rx) = crossbeam_channel::unbounded::<()>();
        let transport = Transport::new(Arc::new(GatedDatagramSink { gate: rx }), Some(1));
        let (first, second) = fill_bounded_queue(&transport);

        let worker = Arc::clone(&transport.worker);
        drop(transport);
        drop(gate);

        assert!(first.wait_timeout(TIMEOUT).unwrap().is_ok());
        assert!(second.wait_timeout(TIMEOUT).unwrap().is_ok());
        while !worker.is_stopped() {
            thread::yield_now();
        }
    }

    #[test]
    fn test_transport_write_after_stop_fails() {
        let transport = Transport::new(Arc::new(NopDatagramSink), QUEUE_SIZE);
        transport.worker.stop_and_wait();

        let (payload, pending) = payload(&["foo:1|c"]);
        let handle = transport.write(payload);
        assert_eq!(ErrorKind::SocketError, handle.wait().unwrap_err().kind());
        assert_eq!(ErrorKind::SocketError, pending.handle().wait().unwrap_err().kind());
    }
}
