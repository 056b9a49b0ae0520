use super::MetricType;
use crate::types::{ErrorKind, MetricError};
use std::fmt;
use std::io::Write;

// Long enough for "0.xxxxxx", rates are written without the leading "@"
const MAX_LEN: usize = 8;

/// Represents the sample rate of a metric. This is used to determine how often
/// a metric should be sent to the the statsd server. The sample rate is a value
/// in the range `(0.0, 1.0]`.
///
/// The rendered form is computed once, when the rate is created, so that
/// encoding a sampled metric never needs to format the rate again.
#[derive(Clone, Copy)]
pub struct SampleRate {
    value: f32,
    digits: [u8; MAX_LEN],
    len: usize,
}

impl SampleRate {
    fn new(value: f32) -> Option<Self> {
        let mut digits = [0u8; MAX_LEN];
        let mut cursor = &mut digits[..];
        // Only "0.xxxxxx" and "1.000000" are possible for values in range
        write!(cursor, "{:.6}", value).ok()?;
        let written = MAX_LEN - cursor.len();

        let rendered = std::str::from_utf8(&digits[..written]).ok()?;
        let len = rendered.trim_end_matches('0').trim_end_matches('.').len();
        if len == 0 || &rendered[..len] == "0" {
            return None;
        }

        Some(SampleRate { value, digits, len })
    }

    pub(crate) fn is_applicable_to_metric(&self, metric_type: MetricType) -> bool {
        match metric_type {
            MetricType::Counter | MetricType::Histogram | MetricType::Timer => self.value != 1.0,
            _ => false,
        }
    }

    pub fn value(&self) -> f32 {
        self.value
    }

    pub fn as_str(&self) -> &str {
        std::str::from_utf8(&self.digits[..self.len]).unwrap_or("1")
    }

    pub(crate) fn len(&self) -> usize {
        self.len
    }
}

impl PartialEq for SampleRate {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl fmt::Debug for SampleRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("SampleRate").field(&self.value).finish()
    }
}

impl TryFrom<f32> for SampleRate {
    type Error = MetricError;

    fn try_from(rate: f32) -> Result<Self, Self::Error> {
        if rate > 0.0 && rate <= 1.0 {
            Self::new(rate).ok_or_else(|| {
                MetricError::from((ErrorKind::InvalidInput, "Sample rate is too small to be represented"))
            })
        } else {
            let err = MetricError::from((ErrorKind::InvalidInput, "Sample rate must be between 0.0 and 1.0"));
            Err(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::SampleRate;
    use crate::encoder::MetricType;
    use crate::types::ErrorKind;

    #[test]
    fn test_sample_rate_as_str() {
        let sr = SampleRate::try_from(0.5).unwrap();
        assert_eq!("0.5", sr.as_str());
        assert_eq!(3, sr.len());
    }

    #[test]
    fn test_sample_rate_rounding() {
        let sr = SampleRate::try_from(1.0 / 54.0).unwrap();
        assert_eq!("0.018519", sr.as_str());
    }

    #[test]
    fn test_sample_rate_len() {
        for i in 1..=1000 {
            let sr = SampleRate::try_from(i as f32 / 1000.0).unwrap();
            let result = sr.as_str();
            assert_eq!(sr.len(), result.len(), "sample rate was: {}, dbg: {:?}", result, sr);
        }
    }

    #[test]
    fn test_sample_rate_out_of_range() {
        for rate in [0.0, 1.01, -0.5, f32::NAN] {
            let res = SampleRate::try_from(rate);
            assert_eq!(ErrorKind::InvalidInput, res.unwrap_err().kind());
        }
    }

    #[test]
    fn test_sample_rate_too_small() {
        let res = SampleRate::try_from(0.000_000_1);
        assert_eq!(ErrorKind::InvalidInput, res.unwrap_err().kind());
    }

    #[test]
    fn test_sample_rate_applicability() {
        let sr = SampleRate::try_from(0.5).unwrap();
        assert!(sr.is_applicable_to_metric(MetricType::Counter));
        assert!(sr.is_applicable_to_metric(MetricType::Timer));
        assert!(sr.is_applicable_to_metric(MetricType::Histogram));
        assert!(!sr.is_applicable_to_metric(MetricType::Gauge));
        assert!(!sr.is_applicable_to_metric(MetricType::Set));
    }

    #[test]
    fn test_default_sample_rate_not_applicable() {
        let sr = SampleRate::try_from(1.0).unwrap();
        assert!(!sr.is_applicable_to_metric(MetricType::Counter));
        assert_eq!("1", sr.as_str());
    }
}
