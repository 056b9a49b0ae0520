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
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::client::StatsdClient;
use crate::completion::SendHandle;
use crate::encoder::normalize_prefix;
use crate::types::{ErrorKind, MeasureMode, Metric, MetricError, MetricResult, MetricValue};

/// Source of the current time used to compute elapsed durations.
///
/// Any `Fn() -> Instant` closure can be used as a clock, which makes it
/// easy to control time in tests.
pub trait Clock {
    fn now(&self) -> Instant;
}

/// Clock backed by `Instant::now()`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

impl<F> Clock for F
where
    F: Fn() -> Instant,
{
    fn now(&self) -> Instant {
        (self)()
    }
}

/// Convenience methods for recording metrics with a shared `StatsdClient`.
///
/// Every method returns the `SendHandle` of the underlying send, which may
/// be ignored when the outcome doesn't matter.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use cadenza::{Metrics, NopDatagramSink, StatsdClient};
///
/// let client = StatsdClient::builder("localhost", 8125)
///     .with_sink(NopDatagramSink)
///     .build()
///     .unwrap();
///
/// let metrics = Metrics::new(Arc::new(client));
/// metrics.incr("requests");
/// metrics.gauge("connections", 12);
///
/// let (sum, _handle) = metrics.timed("compute", || (1..100).sum::<u64>());
/// assert_eq!(4950, sum);
/// ```
pub struct Metrics {
    client: Arc<StatsdClient>,
    clock: Arc<dyn Clock + Send + Sync>,
    prefix: String,
    mode: MeasureMode,
}

impl Metrics {
    /// Record metrics with the given client, the system clock, no extra
    /// prefix, and measurements sent as timings.
    pub fn new(client: Arc<StatsdClient>) -> Metrics {
        Metrics {
            client,
            clock: Arc::new(SystemClock),
            prefix: String::new(),
            mode: MeasureMode::Time,
        }
    }

    pub fn builder() -> MetricsBuilder {
        MetricsBuilder::default()
    }

    fn key(&self, name: &str) -> String {
        format!("{}{}", self.prefix, name)
    }

    pub fn incr(&self, name: &str) -> SendHandle {
        self.count(name, 1)
    }

    pub fn decr(&self, name: &str) -> SendHandle {
        self.count(name, -1)
    }

    pub fn count(&self, name: &str, delta: i64) -> SendHandle {
        self.client.send(Metric::count(self.key(name), delta))
    }

    pub fn gauge<V: Into<MetricValue>>(&self, name: &str, value: V) -> SendHandle {
        self.client.send(Metric::gauge(self.key(name), value))
    }

    pub fn set(&self, name: &str, member: i64) -> SendHandle {
        self.client.send(Metric::set(self.key(name), member))
    }

    /// Record a measured value, as a timing or as a histogram depending on
    /// how these metrics were built.
    pub fn measure<V: Into<MetricValue>>(&self, name: &str, value: V) -> SendHandle {
        let metric = match self.mode {
            MeasureMode::Time => Metric::timing(self.key(name), value),
            MeasureMode::Histogram => Metric::histogram(self.key(name), value),
        };

        self.client.send(metric)
    }

    pub fn time(&self, name: &str, elapsed: Duration) -> SendHandle {
        self.measure(name, elapsed)
    }

    /// Record the time elapsed between `start` and the current time of the
    /// clock.
    pub fn time_since(&self, name: &str, start: Instant) -> SendHandle {
        let elapsed = self.clock.now().saturating_duration_since(start);
        self.time(name, elapsed)
    }

    /// Run `f`, recording how long it took, and return its result along with
    /// the handle of the timing.
    pub fn timed<F, R>(&self, name: &str, f: F) -> (R, SendHandle)
    where
        F: FnOnce() -> R,
    {
        let start = self.clock.now();
        let res = f();
        let handle = self.time_since(name, start);
        (res, handle)
    }

    pub fn client(&self) -> &StatsdClient {
        &self.client
    }
}

impl fmt::Debug for Metrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Metrics {{ client: {:?}, clock: ..., prefix: {:?}, mode: {:?} }}",
            self.client, self.prefix, self.mode,
        )
    }
}

/// Builder for `Metrics`, a client must be provided.
#[derive(Default)]
pub struct MetricsBuilder {
    client: Option<Arc<StatsdClient>>,
    clock: Option<Arc<dyn Clock + Send + Sync>>,
    prefix: String,
    mode: MeasureMode,
}

impl MetricsBuilder {
    pub fn with_client(mut self, client: Arc<StatsdClient>) -> Self {
        self.client = Some(client);
        self
    }

    /// Use a specific clock instead of the system one.
    pub fn with_clock<C>(mut self, clock: C) -> Self
    where
        C: Clock + Send + Sync + 'static,
    {
        self.clock = Some(Arc::new(clock));
        self
    }

    /// Prefix prepended to metric names, after the prefix of the client.
    pub fn with_prefix(mut self, prefix: &str) -> Self {
        self.prefix = prefix.to_owned();
        self
    }

    /// Send measured values as timings. Default behavior and most compatible.
    pub fn with_measure_as_time(mut self) -> Self {
        self.mode = MeasureMode::Time;
        self
    }

    /// Send measured values as histograms, compatible with Datadog.
    pub fn with_measure_as_histogram(mut self) -> Self {
        self.mode = MeasureMode::Histogram;
        self
    }

    pub fn build(self) -> MetricResult<Metrics> {
        let client = self
            .client
            .ok_or_else(|| MetricError::from((ErrorKind::InvalidInput, "A client is required to build metrics")))?;

        Ok(Metrics {
            client,
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
            prefix: normalize_prefix(&self.prefix)?,
            mode: self.mode,
        })
    }
}

impl fmt::Debug for MetricsBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "MetricsBuilder {{ client: {:?}, clock: ..., prefix: {:?}, mode: {:?} }}",
            self.client, self.prefix, self.mode,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::{Clock, Metrics, SystemClock};
    use crate::client::StatsdClient;
    use crate::sinks::SpyDatagramSink;
    use crate::types::ErrorKind;
    use crossbeam_channel::Receiver;
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    fn new_client() -> (Receiver<Vec<u8>>, Arc<StatsdClient>) {
        let (rx, sink) = SpyDatagramSink::new();
        let client = StatsdClient::builder("localhost", 8125)
            .with_prefix("app")
            .with_sink(sink)
            .build()
            .unwrap();

        (rx, Arc::new(client))
    }

    fn next(rx: &Receiver<Vec<u8>>) -> String {
        String::from_utf8(rx.recv_timeout(Duration::from_secs(5)).unwrap()).unwrap()
    }

    #[test]
    fn test_metrics_counters() {
        let (rx, client) = new_client();
        let metrics = Metrics::new(client);

        metrics.incr("hits").wait().unwrap();
        metrics.decr("hits").wait().unwrap();
        metrics.count("hits", 5).wait().unwrap();

        assert_eq!("app.hits:1|c", next(&rx));
        assert_eq!("app.hits:-1|c", next(&rx));
        assert_eq!("app.hits:5|c", next(&rx));
    }

    #[test]
    fn test_metrics_gauge_and_set() {
        let (rx, client) = new_client();
        let metrics = Metrics::new(client);

        metrics.gauge("load", 0.75).wait().unwrap();
        metrics.set("users", 42).wait().unwrap();

        assert_eq!("app.load:0.75|g", next(&rx));
        assert_eq!("app.users:42|s", next(&rx));
    }

    #[test]
    fn test_metrics_measure_as_histogram() {
        let (rx, client) = new_client();
        let metrics = Metrics::builder()
            .with_client(client)
            .with_prefix("db")
            .with_measure_as_histogram()
            .build()
            .unwrap();

        metrics.measure("rows", 120).wait().unwrap();
        assert_eq!("app.db.rows:120|h", next(&rx));
    }

    #[test]
    fn test_metrics_time_since_with_clock() {
        let (rx, client) = new_client();
        let start = Instant::now();
        let clock = move || start + Duration::from_millis(250);

        let metrics = Metrics::builder().with_client(client).with_clock(clock).build().unwrap();
        metrics.time_since("request", start).wait().unwrap();

        assert_eq!("app.request:250|ms", next(&rx));
    }

    #[test]
    fn test_metrics_timed() {
        let (rx, client) = new_client();
        let metrics = Metrics::new(client);

        let (value, handle) = metrics.timed("work", || 7);
        handle.wait().unwrap();

        assert_eq!(7, value);
        assert!(next(&rx).starts_with("app.work:"));
    }

    #[test]
    fn test_metrics_builder_requires_client() {
        let res = Metrics::builder().build();
        assert_eq!(ErrorKind::InvalidInput, res.unwrap_err().kind());
    }

    #[test]
    fn test_metrics_builder_invalid_prefix() {
        let (_rx, client) = new_client();
        let res = Metrics::builder().with_client(client).with_prefix("a:b").build();
        assert_eq!(ErrorKind::InvalidMetricName, res.unwrap_err().kind());
    }

    #[test]
    fn test_system_clock_advances() {
        let first = SystemClock.now();
        let second = SystemClock.now();
        assert!(second >= first);
    }
}
