// Cadenza - An asynchronous, batching Statsd client for Rust!
//
// Copyright 2026 The Cadenza Developers
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use std::error;
use std::fmt;
use std::io;
use std::sync::Arc;
use std::time::Duration;

use crate::encoder::SampleRate;

/// Holder for primitive metric values.
///
/// Values for gauges, timings, and histograms may be signed, unsigned, or
/// floating point. Conversions from the common primitive types (and from
/// `Duration` for timings, in milliseconds) are provided so that callers
/// rarely need to construct this directly.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MetricValue {
    Signed(i64),
    Unsigned(u64),
    Float(f64),
}

impl From<i64> for MetricValue {
    fn from(v: i64) -> Self {
        MetricValue::Signed(v)
    }
}

impl From<i32> for MetricValue {
    fn from(v: i32) -> Self {
        MetricValue::Signed(v.into())
    }
}

impl From<u64> for MetricValue {
    fn from(v: u64) -> Self {
        MetricValue::Unsigned(v)
    }
}

impl From<u32> for MetricValue {
    fn from(v: u32) -> Self {
        MetricValue::Unsigned(v.into())
    }
}

impl From<f64> for MetricValue {
    fn from(v: f64) -> Self {
        MetricValue::Float(v)
    }
}

impl From<f32> for MetricValue {
    fn from(v: f32) -> Self {
        MetricValue::Float(v.into())
    }
}

impl From<Duration> for MetricValue {
    /// Durations are expressed in whole milliseconds when they have no
    /// sub-millisecond part and fractional milliseconds otherwise.
    fn from(v: Duration) -> Self {
        let fractional = v.as_secs() as f64 * 1000.0 + f64::from(v.subsec_nanos()) / 1_000_000.0;
        if v.subsec_nanos() % 1_000_000 != 0 {
            return MetricValue::Float(fractional);
        }

        match u64::try_from(v.as_millis()) {
            Ok(ms) => MetricValue::Unsigned(ms),
            Err(_) => MetricValue::Float(fractional),
        }
    }
}

/// A single typed metric to be encoded and sent to a Statsd server.
///
/// Metrics are plain values: no validation happens when they are created.
/// Names and values are checked when the metric is encoded, which happens
/// before anything is buffered, so an invalid metric never ends up in a
/// datagram.
///
/// # Example
///
/// ```
/// use cadenza::Metric;
///
/// let requests = Metric::count("requests", 1);
/// let latency = Metric::timing("request.latency", 35u64).with_sample_rate(0.5).unwrap();
/// let users = Metric::set("users.uniques", 42);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum Metric {
    /// Counter, incremented or decremented by `delta`.
    Count {
        name: String,
        delta: i64,
        rate: Option<SampleRate>,
    },
    /// Instantaneous value.
    Gauge { name: String, value: MetricValue },
    /// Duration in milliseconds. Rendered as `ms` or `h` depending on the
    /// measurement mode of the client.
    Timing {
        name: String,
        value: MetricValue,
        rate: Option<SampleRate>,
    },
    /// Arbitrary value to be aggregated into a histogram by the server.
    Histogram {
        name: String,
        value: MetricValue,
        rate: Option<SampleRate>,
    },
    /// Member of a set of unique values.
    Set { name: String, member: i64 },
}

impl Metric {
    pub fn count<S: Into<String>>(name: S, delta: i64) -> Metric {
        Metric::Count {
            name: name.into(),
            delta,
            rate: None,
        }
    }

    pub fn gauge<S, V>(name: S, value: V) -> Metric
    where
        S: Into<String>,
        V: Into<MetricValue>,
    {
        Metric::Gauge {
            name: name.into(),
            value: value.into(),
        }
    }

    pub fn timing<S, V>(name: S, milliseconds: V) -> Metric
    where
        S: Into<String>,
        V: Into<MetricValue>,
    {
        Metric::Timing {
            name: name.into(),
            value: milliseconds.into(),
            rate: None,
        }
    }

    pub fn histogram<S, V>(name: S, value: V) -> Metric
    where
        S: Into<String>,
        V: Into<MetricValue>,
    {
        Metric::Histogram {
            name: name.into(),
            value: value.into(),
            rate: None,
        }
    }

    pub fn set<S: Into<String>>(name: S, member: i64) -> Metric {
        Metric::Set {
            name: name.into(),
            member,
        }
    }

    /// Attach a sample rate, which must be in the range `(0.0, 1.0]`.
    ///
    /// Only counters, timings, and histograms may be sampled. Attempting to
    /// set a rate on a gauge or a set returns an `InvalidInput` error.
    pub fn with_sample_rate(self, rate: f32) -> MetricResult<Metric> {
        let sample_rate = SampleRate::try_from(rate)?;
        match self {
            Metric::Count { name, delta, .. } => Ok(Metric::Count {
                name,
                delta,
                rate: Some(sample_rate),
            }),
            Metric::Timing { name, value, .. } => Ok(Metric::Timing {
                name,
                value,
                rate: Some(sample_rate),
            }),
            Metric::Histogram { name, value, .. } => Ok(Metric::Histogram {
                name,
                value,
                rate: Some(sample_rate),
            }),
            Metric::Gauge { .. } | Metric::Set { .. } => Err(MetricError::from((
                ErrorKind::InvalidInput,
                "Sample rate only applies to counters, timings, and histograms",
            ))),
        }
    }

    /// Name of this metric, without any client prefix.
    pub fn name(&self) -> &str {
        match self {
            Metric::Count { name, .. }
            | Metric::Gauge { name, .. }
            | Metric::Timing { name, .. }
            | Metric::Histogram { name, .. }
            | Metric::Set { name, .. } => name,
        }
    }
}

/// Measurement mode, deciding how timings are rendered for a whole client.
///
/// `Time` is the default and the most widely compatible. `Histogram` sends
/// timings as histogram values which is what Datadog style servers expect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MeasureMode {
    #[default]
    Time,
    Histogram,
}

/// Kinds of errors that can happen while encoding or sending metrics.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum ErrorKind {
    /// The metric name (or client prefix) is empty or contains one of the
    /// protocol delimiters `:`, `|`, or a line break.
    InvalidMetricName,
    /// The metric value cannot be represented, e.g. NaN or infinity.
    InvalidValue,
    /// Invalid configuration or arguments.
    InvalidInput,
    /// The datagram could not be handed to the socket.
    SocketError,
    /// The client has been closed and no longer accepts metrics.
    ClosedClient,
}

/// Error generated by this library when a metric cannot be encoded or sent.
///
/// Errors are cheap to clone: every pending send coalesced into a datagram
/// that failed receives the same error.
#[derive(Debug, Clone)]
pub struct MetricError {
    repr: ErrorRepr,
}

#[derive(Debug, Clone)]
enum ErrorRepr {
    WithDescription(ErrorKind, &'static str),
    IoError(ErrorKind, Arc<io::Error>),
}

impl MetricError {
    /// Return the kind of this error
    pub fn kind(&self) -> ErrorKind {
        match self.repr {
            ErrorRepr::IoError(kind, _) => kind,
            ErrorRepr::WithDescription(kind, _) => kind,
        }
    }

    pub(crate) fn closed() -> MetricError {
        MetricError::from((ErrorKind::ClosedClient, "Client has been closed"))
    }
}

impl fmt::Display for MetricError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.repr {
            ErrorRepr::IoError(_, ref err) => err.fmt(f),
            ErrorRepr::WithDescription(_, desc) => desc.fmt(f),
        }
    }
}

impl error::Error for MetricError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self.repr {
            ErrorRepr::IoError(_, ref err) => Some(err.as_ref()),
            _ => None,
        }
    }
}

impl From<io::Error> for MetricError {
    fn from(err: io::Error) -> MetricError {
        MetricError {
            repr: ErrorRepr::IoError(ErrorKind::SocketError, Arc::new(err)),
        }
    }
}

impl From<(ErrorKind, &'static str)> for MetricError {
    fn from((kind, desc): (ErrorKind, &'static str)) -> MetricError {
        MetricError {
            repr: ErrorRepr::WithDescription(kind, desc),
        }
    }
}

pub type MetricResult<T> = Result<T, MetricError>;
