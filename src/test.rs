// Cadenza - An asynchronous, batching Statsd client for Rust!
//
// Copyright 2026 The Cadenza Developers
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Utilities for testing Cadenza itself.
//!
//! Functionality exported to be used by integration tests. This module
//! is NOT part of the Cadenza API and is subject to change at any time.

use std::io::{self, ErrorKind};
use std::net::{SocketAddr, UdpSocket};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

#[derive(Debug, Default)]
struct Received {
    datagrams: Mutex<Vec<String>>,
    arrived: Condvar,
}

impl Received {
    fn lock(&self) -> MutexGuard<'_, Vec<String>> {
        self.datagrams.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Basic Statsd server listening on a UDP socket bound to an ephemeral
/// local port.
///
/// The server reads datagrams in a loop from a background thread and keeps
/// every one that is valid UTF-8. Tests wait until a number of metric lines
/// have been received and then inspect a snapshot of them.
///
/// The server is stopped and its thread joined when the harness is dropped.
pub struct UdpServerHarness {
    addr: SocketAddr,
    received: Arc<Received>,
    shutdown: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl UdpServerHarness {
    pub fn new() -> io::Result<Self> {
        let socket = UdpSocket::bind("127.0.0.1:0")?;
        socket.set_read_timeout(Some(Duration::from_millis(100)))?;

        let addr = socket.local_addr()?;
        let received = Arc::new(Received::default());
        let shutdown = Arc::new(AtomicBool::new(false));

        let received_local = Arc::clone(&received);
        let shutdown_local = Arc::clone(&shutdown);
        let thread = thread::spawn(move || run(socket, &received_local, &shutdown_local));

        Ok(UdpServerHarness {
            addr,
            received,
            shutdown,
            thread: Some(thread),
        })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    /// Wait until at least `lines` metric lines have been received, returning
    /// `false` if the timeout elapses first.
    pub fn wait_for_lines(&self, lines: usize, timeout: Duration) -> bool {
        let deadline = Instant::now().checked_add(timeout);
        let mut guard = self.received.lock();

        loop {
            if count_lines(&guard) >= lines {
                return true;
            }

            let deadline = match deadline {
                Some(deadline) => deadline,
                None => {
                    guard = self.received.arrived.wait(guard).unwrap_or_else(|e| e.into_inner());
                    continue;
                }
            };

            let now = Instant::now();
            if now >= deadline {
                return false;
            }

            guard = match self.received.arrived.wait_timeout(guard, deadline - now) {
                Ok((g, _)) => g,
                Err(e) => e.into_inner().0,
            };
        }
    }

    /// Datagrams received so far, in the order they arrived.
    pub fn datagrams(&self) -> Vec<String> {
        self.received.lock().clone()
    }

    /// Metric lines received so far, in the order they arrived.
    pub fn snapshot(&self) -> Vec<String> {
        self.received
            .lock()
            .iter()
            .flat_map(|d| d.split('\n'))
            .map(|l| l.to_owned())
            .collect()
    }
}

impl Drop for UdpServerHarness {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Release);
        if let Some(t) = self.thread.take() {
            let _ = t.join();
        }
    }
}

fn count_lines(datagrams: &[String]) -> usize {
    datagrams.iter().map(|d| d.split('\n').count()).sum()
}

fn run(socket: UdpSocket, received: &Received, shutdown: &AtomicBool) {
    let mut buf = [0u8; 65536];

    loop {
        match socket.recv(&mut buf) {
            Ok(v) => match std::str::from_utf8(&buf[0..v]) {
                Ok(s) => {
                    received.lock().push(s.to_owned());
                    received.arrived.notify_all();
                }
                Err(e) => eprintln!("Error: Couldn't decode string to utf-8 {}", e),
            },
            Err(e) => {
                // Hitting the read timeout is expected, check if we've been
                // asked to stop and otherwise keep reading.
                if e.kind() == ErrorKind::WouldBlock || e.kind() == ErrorKind::TimedOut {
                    if shutdown.load(Ordering::Acquire) {
                        break;
                    }
                } else {
                    eprintln!("Error: {} - {:?}", e, e.kind());
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::UdpServerHarness;
    use std::net::UdpSocket;
    use std::time::Duration;

    #[test]
    fn test_udp_server_harness_receives_lines() {
        let server = UdpServerHarness::new().unwrap();
        let client = UdpSocket::bind("127.0.0.1:0").unwrap();

        client.send_to(b"foo:1|c\nbar:2|g", server.addr()).unwrap();
        client.send_to(b"baz:3|s", server.addr()).unwrap();

        assert!(server.wait_for_lines(3, Duration::from_secs(5)));
        assert_eq!(2, server.datagrams().len());
        assert_eq!(vec!["foo:1|c", "bar:2|g", "baz:3|s"], server.snapshot());
    }

    #[test]
    fn test_udp_server_harness_wait_without_limit() {
        let server = UdpServerHarness::new().unwrap();
        let client = UdpSocket::bind("127.0.0.1:0").unwrap();

        client.send_to(b"foo:1|c", server.addr()).unwrap();
        assert!(server.wait_for_lines(1, Duration::MAX));
    }

    #[test]
    fn test_udp_server_harness_times_out() {
        let server = UdpServerHarness::new().unwrap();
        assert!(!server.wait_for_lines(1, Duration::from_millis(50)));
    }
}
