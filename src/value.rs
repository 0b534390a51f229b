use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Element name to value mapping. Ordered so commit batches and counter
/// reconstruction walk elements deterministically.
pub type UserDataMap = BTreeMap<String, DataValue>;

/// A tracked data value: either a string or a number.
///
/// SCORM content only ever sees strings, but range-validated elements and
/// collection counters are stored numerically. Equality is type-and-value:
/// `Num(0.0)` and `Str("0")` are different, which matters for commit diffing
/// (a numeric write over a string default must be re-sent).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DataValue {
    Str(String),
    Num(f64),
}

impl DataValue {
    pub fn str(value: impl Into<String>) -> DataValue {
        DataValue::Str(value.into())
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, DataValue::Str(s) if s.is_empty())
    }

    /// Numeric view of the value. Empty strings count as zero and
    /// non-numeric strings as NaN, so range comparisons fail on them.
    pub fn as_number(&self) -> f64 {
        match self {
            DataValue::Num(n) => *n,
            DataValue::Str(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    0.0
                } else {
                    trimmed.parse().unwrap_or(f64::NAN)
                }
            }
        }
    }
}

impl fmt::Display for DataValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataValue::Str(s) => f.write_str(s),
            DataValue::Num(n) => {
                // Integral floats render without a decimal point, the way the
                // content-facing API has always reported them.
                if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
                    write!(f, "{}", *n as i64)
                } else {
                    write!(f, "{}", n)
                }
            }
        }
    }
}

impl From<&str> for DataValue {
    fn from(value: &str) -> Self {
        DataValue::Str(value.to_string())
    }
}

impl From<String> for DataValue {
    fn from(value: String) -> Self {
        DataValue::Str(value)
    }
}

impl From<f64> for DataValue {
    fn from(value: f64) -> Self {
        DataValue::Num(value)
    }
}

impl From<u32> for DataValue {
    fn from(value: u32) -> Self {
        DataValue::Num(value as f64)
    }
}
