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
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr, ToSocketAddrs, UdpSocket};

use crate::sinks::core::{DatagramSink, SinkStats, SocketStats};
use crate::types::{ErrorKind, MetricError, MetricResult};

/// Attempt to convert anything implementing the `ToSocketAddrs` trait
/// into a concrete `SocketAddr` instance, returning an `InvalidInput`
/// error if the address could not be resolved.
fn get_addr<A: ToSocketAddrs>(addr: A) -> MetricResult<SocketAddr> {
    let mut addrs = addr
        .to_socket_addrs()
        .map_err(|_| MetricError::from((ErrorKind::InvalidInput, "Unable to resolve host")))?;

    match addrs.next() {
        Some(addr) => Ok(addr),
        None => Err(MetricError::from((
            ErrorKind::InvalidInput,
            "No socket addresses yielded",
        ))),
    }
}

/// Implementation of a `DatagramSink` that writes datagrams to a connected,
/// non-blocking UDP socket.
///
/// The socket is connected to the address of the Statsd server when the sink
/// is created, so the server address is resolved exactly once. Writes never
/// wait: if the socket buffer is full the datagram is dropped and the write
/// fails with `WouldBlock`.
#[derive(Debug)]
pub struct UdpDatagramSink {
    addr: SocketAddr,
    socket: UdpSocket,
    stats: SocketStats,
}

impl UdpDatagramSink {
    /// Resolve the address of the Statsd server, bind a socket to an
    /// ephemeral local port of the same address family, and connect it.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use cadenza::{UdpDatagramSink, DEFAULT_PORT};
    ///
    /// let sink = UdpDatagramSink::connect(("metrics.example.com", DEFAULT_PORT)).unwrap();
    /// ```
    ///
    /// # Failures
    ///
    /// This method may fail if:
    ///
    /// * It is unable to resolve the hostname of the metric server.
    /// * The local socket cannot be bound, connected, or put into
    ///   non-blocking mode.
    pub fn connect<A>(to_addr: A) -> MetricResult<UdpDatagramSink>
    where
        A: ToSocketAddrs,
    {
        let addr = get_addr(to_addr)?;
        let socket = match addr {
            SocketAddr::V4(_) => UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0))?,
            SocketAddr::V6(_) => UdpSocket::bind((Ipv6Addr::UNSPECIFIED, 0))?,
        };

        Self::from(addr, socket)
    }

    /// Construct a sink from an already bound socket, connecting it to the
    /// given address and putting it into non-blocking mode.
    pub fn from<A>(to_addr: A, socket: UdpSocket) -> MetricResult<UdpDatagramSink>
    where
        A: ToSocketAddrs,
    {
        let addr = get_addr(to_addr)?;
        socket.connect(addr)?;
        socket.set_nonblocking(true)?;

        let stats = SocketStats::default();
        Ok(UdpDatagramSink { addr, socket, stats })
    }

    /// Address of the Statsd server this sink writes to.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }
}

impl DatagramSink for UdpDatagramSink {
    fn send(&self, datagram: &[u8]) -> io::Result<usize> {
        self.stats.update(self.socket.send(datagram), datagram.len())
    }

    fn stats(&self) -> SinkStats {
        (&self.stats).into()
    }
}
