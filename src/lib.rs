// Cadenza - An asynchronous, batching Statsd client for Rust!
//
// Copyright 2026 The Cadenza Developers
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! An asynchronous, batching Statsd client for Rust!
//!
//! Cadenza encodes metrics into the Statsd text protocol, batches them into
//! size bounded UDP datagrams, and writes them to the network from a
//! background thread so that recording a metric never waits on the network.
//!
//! ## Features
//!
//! * Support for emitting counters, timers, histograms, gauges, and sets to
//!   Statsd over UDP.
//! * Batching of metrics into datagrams no larger than a configurable size,
//!   with a tunable flush probability to trade latency for fewer packets.
//! * A `SendHandle` for every send that is resolved once the datagram(s)
//!   carrying it have been written to the socket, or with the first error.
//! * Orderly shutdown: closing the client sends anything still buffered.
//! * Support for alternate backends via the `DatagramSink` trait.
//!
//! ## Install
//!
//! To make use of `cadenza` in your project, add it as a dependency in your
//! `Cargo.toml` file.
//!
//! ```toml
//! [dependencies]
//! cadenza = "x.y.z"
//! ```
//!
//! ## Usage
//!
//! ### Simple Use
//!
//! Create a client that writes to some imaginary metrics server and send a
//! few metrics. By default each metric is sent in its own datagram as soon
//! as it is recorded.
//!
//! ```rust,no_run
//! use cadenza::{Metric, StatsdClient, DEFAULT_PORT};
//!
//! // Note that you'll probably want to actually handle any errors creating
//! // the client when you use it for real in your application. We're just
//! // using .unwrap() here since this is an example!
//! let client = StatsdClient::builder("metrics.example.com", DEFAULT_PORT)
//!     .with_prefix("my.metrics")
//!     .build()
//!     .unwrap();
//!
//! client.send(Metric::count("some.counter", 1));
//! client.send(Metric::timing("some.methodCall", 42u64));
//! client.send(Metric::gauge("some.thing", 7));
//! client.send(Metric::set("users.uniques", 42));
//! ```
//!
//! ### Waiting For Results
//!
//! Sends never block on the network. Each returns a `SendHandle` that can be
//! waited on (or ignored) to find out if the metric made it to the socket.
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use cadenza::{Metric, StatsdClient, DEFAULT_PORT};
//!
//! let client = StatsdClient::builder("metrics.example.com", DEFAULT_PORT)
//!     .build()
//!     .unwrap();
//!
//! let handle = client.send_all(&[
//!     Metric::count("requests", 1),
//!     Metric::timing("request.latency", Duration::from_millis(35)),
//! ]);
//!
//! match handle.wait_timeout(Duration::from_secs(1)) {
//!     Some(Ok(())) => println!("sent!"),
//!     Some(Err(e)) => eprintln!("could not send metrics: {}", e),
//!     None => eprintln!("still sending"),
//! }
//! ```
//!
//! ### Batching
//!
//! Applications sending many metrics can lower the flush probability so that
//! metrics are coalesced into fewer, larger datagrams. Closing the client (or
//! dropping it) sends whatever is still buffered.
//!
//! ```rust,no_run
//! use cadenza::{Metric, StatsdClient, DEFAULT_PORT};
//!
//! let client = StatsdClient::builder("metrics.example.com", DEFAULT_PORT)
//!     .with_flush_probability(20)
//!     .with_max_payload_size(1432)
//!     .build()
//!     .unwrap();
//!
//! for i in 0..100 {
//!     client.send(Metric::histogram("batch.size", i));
//! }
//!
//! client.close().wait().unwrap();
//! ```
//!
//! ### Recording With `Metrics`
//!
//! `Metrics` wraps a shared client with shorthand methods and a clock for
//! timing things.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use cadenza::{Metrics, StatsdClient, DEFAULT_PORT};
//!
//! let client = StatsdClient::builder("metrics.example.com", DEFAULT_PORT)
//!     .build()
//!     .unwrap();
//!
//! let metrics = Metrics::builder()
//!     .with_client(Arc::new(client))
//!     .with_prefix("api")
//!     .with_measure_as_histogram()
//!     .build()
//!     .unwrap();
//!
//! metrics.incr("requests");
//! let (_rows, _handle) = metrics.timed("query", || vec![1, 2, 3]);
//! ```
//!
//! ### Custom Sinks
//!
//! Datagrams can be written anywhere by implementing `DatagramSink` and
//! passing it to the builder. `SpyDatagramSink` and `NopDatagramSink` are
//! provided for tests.
//!
//! ```rust
//! use std::io;
//! use cadenza::{DatagramSink, Metric, StatsdClient};
//!
//! struct StdoutSink;
//!
//! impl DatagramSink for StdoutSink {
//!     fn send(&self, datagram: &[u8]) -> io::Result<usize> {
//!         println!("{}", String::from_utf8_lossy(datagram));
//!         Ok(datagram.len())
//!     }
//! }
//!
//! let client = StatsdClient::builder("localhost", 8125)
//!     .with_sink(StdoutSink)
//!     .build()
//!     .unwrap();
//!
//! client.send(Metric::count("printed", 1)).wait().unwrap();
//! ```
//!
//! ## Logging
//!
//! Cadenza logs with the `log` facade: client creation and shutdown at
//! `debug`, each datagram at `trace`, and datagrams that could not be sent
//! at `warn`. No logger is installed by the library.

#![forbid(unsafe_code)]

/// Default port of Statsd servers.
pub const DEFAULT_PORT: u16 = 8125;

pub use self::builder::{StatsdClientBuilder, DEFAULT_CLOSE_TIMEOUT, DEFAULT_PAYLOAD_SIZE};
pub use self::client::StatsdClient;
pub use self::completion::SendHandle;
pub use self::encoder::{encode, SampleRate};
pub use self::flush::FlushProbability;
pub use self::metrics::{Clock, Metrics, MetricsBuilder, SystemClock};
pub use self::sinks::{DatagramSink, NopDatagramSink, SinkStats, SocketStats, SpyDatagramSink, UdpDatagramSink};
pub use self::transport::TransportStats;
pub use self::types::{ErrorKind, MeasureMode, Metric, MetricError, MetricResult, MetricValue};

mod buffer;
mod builder;
mod client;
mod completion;
mod encoder;
mod flush;
mod metrics;
pub mod prelude;
mod sinks;
mod transport;
mod types;

// Utilities for running integration tests with Cadenza.
#[doc(hidden)]
pub mod test;
