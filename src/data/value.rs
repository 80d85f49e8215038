//! Tagged runtime values.
//!
//! Two absent-value kinds are distinguished: `Null` is an explicit SQL NULL,
//! `Missing` is a field absent from the source document. They are not
//! interchangeable: `equal` treats each as equal only to itself, while
//! `compare` raises on either, since ordering an absent value is decided by
//! the NULL-placement decorators in [`crate::data::ordering`], never here.

use crate::data::types::ExprType;
use crate::error::{EvalResult, EvaluationError};
use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Runtime value produced by expression evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ExprValue {
    Null,
    Missing,
    Boolean(bool),
    Byte(i8),
    Short(i16),
    Integer(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    String(String),
    Date(NaiveDate),
    Time(NaiveTime),
    Timestamp(DateTime<Utc>),
    #[serde(with = "interval_serde")]
    Interval(Duration),
    /// Struct value: field insertion order is preserved.
    Tuple(Vec<(String, ExprValue)>),
    Array(Vec<ExprValue>),
}

impl ExprValue {
    pub fn string(s: impl Into<String>) -> Self {
        ExprValue::String(s.into())
    }

    pub fn expr_type(&self) -> ExprType {
        match self {
            ExprValue::Null | ExprValue::Missing => ExprType::Undefined,
            ExprValue::Boolean(_) => ExprType::Boolean,
            ExprValue::Byte(_) => ExprType::Byte,
            ExprValue::Short(_) => ExprType::Short,
            ExprValue::Integer(_) => ExprType::Integer,
            ExprValue::Long(_) => ExprType::Long,
            ExprValue::Float(_) => ExprType::Float,
            ExprValue::Double(_) => ExprType::Double,
            ExprValue::String(_) => ExprType::String,
            ExprValue::Date(_) => ExprType::Date,
            ExprValue::Time(_) => ExprType::Time,
            ExprValue::Timestamp(_) => ExprType::Timestamp,
            ExprValue::Interval(_) => ExprType::Interval,
            ExprValue::Tuple(_) => ExprType::Struct,
            ExprValue::Array(_) => ExprType::Array,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, ExprValue::Null)
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, ExprValue::Missing)
    }

    /// NULL or MISSING.
    pub fn is_absent(&self) -> bool {
        self.is_null() || self.is_missing()
    }

    pub fn is_numeric(&self) -> bool {
        self.expr_type().is_numeric()
    }

    pub fn boolean_value(&self) -> EvalResult<bool> {
        match self {
            ExprValue::Boolean(b) => Ok(*b),
            other => Err(EvaluationError::InvalidOperand {
                operator: "boolean".to_string(),
                detail: format!("expected BOOLEAN, got {}", other.expr_type()),
            }),
        }
    }

    pub fn string_value(&self) -> EvalResult<&str> {
        match self {
            ExprValue::String(s) => Ok(s),
            other => Err(EvaluationError::InvalidOperand {
                operator: "string".to_string(),
                detail: format!("expected STRING, got {}", other.expr_type()),
            }),
        }
    }

    /// Numeric value widened to i64. Errors on floating kinds.
    pub fn long_value(&self) -> EvalResult<i64> {
        match self {
            ExprValue::Byte(v) => Ok(*v as i64),
            ExprValue::Short(v) => Ok(*v as i64),
            ExprValue::Integer(v) => Ok(*v as i64),
            ExprValue::Long(v) => Ok(*v),
            other => Err(EvaluationError::InvalidOperand {
                operator: "long".to_string(),
                detail: format!("expected integral value, got {}", other.expr_type()),
            }),
        }
    }

    /// Numeric value widened to f64.
    pub fn double_value(&self) -> EvalResult<f64> {
        match self {
            ExprValue::Byte(v) => Ok(*v as f64),
            ExprValue::Short(v) => Ok(*v as f64),
            ExprValue::Integer(v) => Ok(*v as f64),
            ExprValue::Long(v) => Ok(*v as f64),
            ExprValue::Float(v) => Ok(*v as f64),
            ExprValue::Double(v) => Ok(*v),
            other => Err(EvaluationError::InvalidOperand {
                operator: "double".to_string(),
                detail: format!("expected numeric value, got {}", other.expr_type()),
            }),
        }
    }

    /// Whether the numeric representation is floating-point.
    pub fn is_floating(&self) -> bool {
        matches!(self, ExprValue::Float(_) | ExprValue::Double(_))
    }

    /// Struct field lookup; `Missing` when absent or not a struct.
    pub fn field(&self, name: &str) -> ExprValue {
        match self {
            ExprValue::Tuple(fields) => fields
                .iter()
                .find(|(n, _)| n == name)
                .map(|(_, v)| v.clone())
                .unwrap_or(ExprValue::Missing),
            _ => ExprValue::Missing,
        }
    }

    /// Natural comparison of two comparable values. Raises on NULL/MISSING
    /// (callers decide absent-value placement) and on incomparable kinds.
    /// Numeric values of differing subtypes compare via the wider
    /// representation.
    pub fn compare(&self, other: &ExprValue) -> EvalResult<Ordering> {
        if self.is_absent() || other.is_absent() {
            return Err(EvaluationError::IncomparableValues(
                self.expr_type().to_string(),
                other.expr_type().to_string(),
            ));
        }
        match (self, other) {
            (a, b) if a.is_numeric() && b.is_numeric() => {
                if a.is_floating() || b.is_floating() {
                    Ok(a.double_value()?.total_cmp(&b.double_value()?))
                } else {
                    Ok(a.long_value()?.cmp(&b.long_value()?))
                }
            }
            (ExprValue::String(a), ExprValue::String(b)) => Ok(a.cmp(b)),
            (ExprValue::Boolean(a), ExprValue::Boolean(b)) => Ok(a.cmp(b)),
            (ExprValue::Date(a), ExprValue::Date(b)) => Ok(a.cmp(b)),
            (ExprValue::Time(a), ExprValue::Time(b)) => Ok(a.cmp(b)),
            (ExprValue::Timestamp(a), ExprValue::Timestamp(b)) => Ok(a.cmp(b)),
            (ExprValue::Interval(a), ExprValue::Interval(b)) => Ok(a.cmp(b)),
            (a, b) => Err(EvaluationError::IncomparableValues(
                a.expr_type().to_string(),
                b.expr_type().to_string(),
            )),
        }
    }

    /// Total equality. Unlike `compare`, never raises: NULL equals NULL,
    /// MISSING equals MISSING, NULL and MISSING differ, and values of
    /// incomparable kinds are simply unequal.
    pub fn equal(&self, other: &ExprValue) -> bool {
        match (self, other) {
            (ExprValue::Null, ExprValue::Null) => true,
            (ExprValue::Missing, ExprValue::Missing) => true,
            (a, b) if a.is_absent() || b.is_absent() => false,
            (a, b) if a.is_numeric() && b.is_numeric() => {
                a.compare(b) == Ok(Ordering::Equal)
            }
            (ExprValue::Tuple(a), ExprValue::Tuple(b)) => {
                a.len() == b.len()
                    && a.iter()
                        .zip(b.iter())
                        .all(|((na, va), (nb, vb))| na == nb && va.equal(vb))
            }
            (ExprValue::Array(a), ExprValue::Array(b)) => {
                a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| x.equal(y))
            }
            (a, b) => a == b,
        }
    }
}

impl fmt::Display for ExprValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExprValue::Null => write!(f, "NULL"),
            ExprValue::Missing => write!(f, "MISSING"),
            ExprValue::Boolean(v) => write!(f, "{}", v),
            ExprValue::Byte(v) => write!(f, "{}", v),
            ExprValue::Short(v) => write!(f, "{}", v),
            ExprValue::Integer(v) => write!(f, "{}", v),
            ExprValue::Long(v) => write!(f, "{}", v),
            ExprValue::Float(v) => write!(f, "{}", v),
            ExprValue::Double(v) => write!(f, "{}", v),
            ExprValue::String(v) => write!(f, "\"{}\"", v),
            ExprValue::Date(v) => write!(f, "{}", v),
            ExprValue::Time(v) => write!(f, "{}", v),
            ExprValue::Timestamp(v) => write!(f, "{}", v),
            ExprValue::Interval(v) => write!(f, "{}", v),
            ExprValue::Tuple(fields) => {
                write!(f, "{{")?;
                for (i, (name, value)) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", name, value)?;
                }
                write!(f, "}}")
            }
            ExprValue::Array(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
        }
    }
}

mod interval_serde {
    use chrono::Duration;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        (d.num_seconds(), d.subsec_nanos()).serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let (secs, nanos): (i64, i32) = Deserialize::deserialize(d)?;
        Ok(Duration::seconds(secs) + Duration::nanoseconds(nanos as i64))
    }
}
