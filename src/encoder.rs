// Cadenza - An asynchronous, batching Statsd client for Rust!
//
// Copyright 2026 The Cadenza Developers
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use std::fmt::{self, Write};

use crate::types::{ErrorKind, MeasureMode, Metric, MetricError, MetricResult, MetricValue};

mod sample_rate;

pub use self::sample_rate::SampleRate;

/// Characters that have meaning in the Statsd line protocol. The protocol has
/// no way to escape them so names containing them are rejected.
const RESERVED: &[char] = &[':', '|', '\n', '\r'];

/// Maximum number of fractional digits written for floating point values.
const FLOAT_PRECISION: usize = 6;

/// Type of metric that knows how to display itself
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum MetricType {
    Counter,
    Timer,
    Gauge,
    Histogram,
    Set,
}

impl fmt::Display for MetricType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            MetricType::Counter => "c".fmt(f),
            MetricType::Timer => "ms".fmt(f),
            MetricType::Gauge => "g".fmt(f),
            MetricType::Histogram => "h".fmt(f),
            MetricType::Set => "s".fmt(f),
        }
    }
}

/// Check that a metric name (or a prefix segment) can be written verbatim.
pub(crate) fn validate_name(name: &str) -> MetricResult<()> {
    if name.is_empty() {
        return Err(MetricError::from((ErrorKind::InvalidMetricName, "Metric name is empty")));
    }

    if name.contains(RESERVED) {
        return Err(MetricError::from((
            ErrorKind::InvalidMetricName,
            "Metric name contains a reserved character (':', '|', or a line break)",
        )));
    }

    Ok(())
}

/// Write a float with at most `FLOAT_PRECISION` fractional digits and no
/// trailing zeros. Floats without a fractional part that fit in an `i64`
/// are written as integers.
fn write_float(out: &mut String, v: f64) -> MetricResult<()> {
    if !v.is_finite() {
        return Err(MetricError::from((ErrorKind::InvalidValue, "Metric value is not finite")));
    }

    if v.fract() == 0.0 && v >= i64::MIN as f64 && v < i64::MAX as f64 {
        let _ = write!(out, "{}", v as i64);
        return Ok(());
    }

    let start = out.len();
    let _ = write!(out, "{:.*}", FLOAT_PRECISION, v);
    let trimmed = out[start..].trim_end_matches('0').trim_end_matches('.').len();
    out.truncate(start + trimmed);

    // Tiny negative values round to "-0.000000"
    if &out[start..] == "-0" {
        out.truncate(start);
        out.push('0');
    }

    Ok(())
}

fn write_value(out: &mut String, value: MetricValue) -> MetricResult<()> {
    match value {
        MetricValue::Signed(v) => {
            let _ = write!(out, "{}", v);
            Ok(())
        }
        MetricValue::Unsigned(v) => {
            let _ = write!(out, "{}", v);
            Ok(())
        }
        MetricValue::Float(v) => write_float(out, v),
    }
}

/// Formatter for a single metric line.
///
/// Holds borrowed parts of a metric and writes them in the canonical
/// `[prefix.]name:value|type[|@rate]` form. The prefix is expected to be
/// normalized already (either empty or ending with a `.`).
#[derive(Debug, Clone)]
pub(crate) struct MetricFormatter<'a> {
    prefix: &'a str,
    key: &'a str,
    val: MetricValue,
    type_: MetricType,
    rate: Option<SampleRate>,
    base_size: usize,
}

impl<'a> MetricFormatter<'a> {
    pub(crate) fn from_metric(prefix: &'a str, metric: &'a Metric, mode: MeasureMode) -> Self {
        match metric {
            Metric::Count { name, delta, rate } => {
                Self::from_val(prefix, name, MetricValue::Signed(*delta), MetricType::Counter, *rate)
            }
            Metric::Gauge { name, value } => Self::from_val(prefix, name, *value, MetricType::Gauge, None),
            Metric::Timing { name, value, rate } => {
                let type_ = match mode {
                    MeasureMode::Time => MetricType::Timer,
                    MeasureMode::Histogram => MetricType::Histogram,
                };
                Self::from_val(prefix, name, *value, type_, *rate)
            }
            Metric::Histogram { name, value, rate } => {
                Self::from_val(prefix, name, *value, MetricType::Histogram, *rate)
            }
            Metric::Set { name, member } => {
                Self::from_val(prefix, name, MetricValue::Signed(*member), MetricType::Set, None)
            }
        }
    }

    #[rustfmt::skip]
    fn from_val(prefix: &'a str, key: &'a str, val: MetricValue, type_: MetricType, rate: Option<SampleRate>) -> Self {
        MetricFormatter {
            prefix,
            key,
            val,
            type_,
            rate,
            base_size: prefix.len() + key.len() + 1 /* : */ + 10 /* value */ + 1 /* | */ + 2 /* type */,
        }
    }

    fn rate_size_hint(&self) -> usize {
        match self.rate {
            Some(ref r) if r.is_applicable_to_metric(self.type_) => 2 /* |@ */ + r.len(),
            _ => 0,
        }
    }

    pub(crate) fn format(&self) -> MetricResult<String> {
        validate_name(self.key)?;

        let mut out = String::with_capacity(self.base_size + self.rate_size_hint());
        out.push_str(self.prefix);
        out.push_str(self.key);
        out.push(':');
        write_value(&mut out, self.val)?;
        out.push('|');
        let _ = write!(out, "{}", self.type_);

        if let Some(ref rate) = self.rate {
            if rate.is_applicable_to_metric(self.type_) {
                out.push_str("|@");
                out.push_str(rate.as_str());
            }
        }

        Ok(out)
    }
}

/// Encode a metric as a single Statsd protocol line.
///
/// The prefix must be normalized: either empty or a valid name ending in a
/// single `.`. Encoding is pure and never touches any shared state, so errors
/// here are always reported before a metric is buffered.
///
/// # Example
///
/// ```
/// use cadenza::{encode, MeasureMode, Metric};
///
/// assert_eq!("example:1|c", encode(&Metric::count("example", 1), "", MeasureMode::Time).unwrap());
/// assert_eq!("app.db:12|h", encode(&Metric::timing("db", 12u64), "app.", MeasureMode::Histogram).unwrap());
/// ```
pub fn encode(metric: &Metric, prefix: &str, mode: MeasureMode) -> MetricResult<String> {
    MetricFormatter::from_metric(prefix, metric, mode).format()
}

/// Turn a user supplied prefix into the form expected by `encode`: empty, or
/// a validated name with exactly one trailing `.`.
pub(crate) fn normalize_prefix(prefix: &str) -> MetricResult<String> {
    let trimmed = prefix.trim_end_matches('.');
    if trimmed.is_empty() {
        Ok(String::new())
    } else {
        validate_name(trimmed)?;
        Ok(format!("{}.", trimmed))
    }
}
