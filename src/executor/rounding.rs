//! Span bucket rounding strategies.
//!
//! A span bucket is identified by rounding a value down to the start of its
//! interval. Three strategies cover the supported units: plain numeric
//! intervals anchored at zero, fixed time intervals anchored at the Unix
//! epoch, and calendar intervals counted in whole months from 1970-01.
//! `locate` and `round` agree by construction: the bucket start is always
//! derived from the bucket index.

use crate::data::value::ExprValue;
use crate::error::{EvalResult, EvaluationError, QueryError, QueryResult};
use crate::expression::expr::{SpanExpr, SpanUnit};
use chrono::{DateTime, Datelike, NaiveDate, Utc};

const SECONDS_PER_MINUTE: i64 = 60;
const SECONDS_PER_HOUR: i64 = 3600;
const SECONDS_PER_DAY: i64 = 86_400;
const SECONDS_PER_WEEK: i64 = 604_800;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Rounding {
    /// Numeric interval anchored at 0. Integer math when both the value
    /// and the interval are integral.
    Numeric { interval: f64, integral: bool },
    /// Fixed-length time interval anchored at the Unix epoch.
    Fixed { seconds: i64 },
    /// Calendar interval in whole months, anchored at January 1970.
    Calendar { months: i64 },
}

impl Rounding {
    /// Strategy for one span expression. Fails on a non-positive interval
    /// or a fractional interval over a time unit.
    pub fn for_span(span: &SpanExpr) -> QueryResult<Rounding> {
        match span.unit {
            SpanUnit::None => {
                let interval = span
                    .interval
                    .double_value()
                    .map_err(|_| bad_interval(&span.interval))?;
                if interval <= 0.0 {
                    return Err(bad_interval(&span.interval));
                }
                Ok(Rounding::Numeric {
                    interval,
                    integral: !span.interval.is_floating(),
                })
            }
            SpanUnit::Second
            | SpanUnit::Minute
            | SpanUnit::Hour
            | SpanUnit::Day
            | SpanUnit::Week => {
                let count = integral_interval(&span.interval)?;
                let per_unit = match span.unit {
                    SpanUnit::Second => 1,
                    SpanUnit::Minute => SECONDS_PER_MINUTE,
                    SpanUnit::Hour => SECONDS_PER_HOUR,
                    SpanUnit::Day => SECONDS_PER_DAY,
                    _ => SECONDS_PER_WEEK,
                };
                Ok(Rounding::Fixed {
                    seconds: count * per_unit,
                })
            }
            SpanUnit::Month | SpanUnit::Quarter | SpanUnit::Year => {
                let count = integral_interval(&span.interval)?;
                let per_unit = match span.unit {
                    SpanUnit::Month => 1,
                    SpanUnit::Quarter => 3,
                    _ => 12,
                };
                Ok(Rounding::Calendar {
                    months: count * per_unit,
                })
            }
        }
    }

    /// Bucket index of a value; consecutive buckets get consecutive
    /// indices, negative below the anchor.
    pub fn locate(&self, value: &ExprValue) -> EvalResult<i64> {
        match self {
            Rounding::Numeric {
                interval,
                integral,
            } => {
                if *integral && !value.is_floating() {
                    Ok(value.long_value()?.div_euclid(*interval as i64))
                } else {
                    Ok((value.double_value()? / interval).floor() as i64)
                }
            }
            Rounding::Fixed { seconds } => Ok(epoch_seconds(value)?.div_euclid(*seconds)),
            Rounding::Calendar { months } => Ok(months_since_epoch(value)?.div_euclid(*months)),
        }
    }

    /// Bucket start containing the value, i.e. the value rounded down.
    pub fn round(&self, value: &ExprValue) -> EvalResult<ExprValue> {
        let index = self.locate(value)?;
        match self {
            Rounding::Numeric {
                interval,
                integral,
            } => {
                if *integral && !value.is_floating() {
                    Ok(ExprValue::Long(index * (*interval as i64)))
                } else {
                    Ok(ExprValue::Double(index as f64 * interval))
                }
            }
            Rounding::Fixed { seconds } => timestamp_value(index * seconds),
            Rounding::Calendar { months } => {
                let start = index * months;
                let year = 1970 + start.div_euclid(12);
                let month = start.rem_euclid(12) + 1;
                let date = NaiveDate::from_ymd_opt(year as i32, month as u32, 1)
                    .ok_or(EvaluationError::InvalidOperand {
                        operator: "span".to_string(),
                        detail: format!("bucket start out of range: {} months", start),
                    })?;
                match value {
                    ExprValue::Date(_) => Ok(ExprValue::Date(date)),
                    _ => timestamp_value(date.and_hms_opt(0, 0, 0).unwrap_or_default().and_utc().timestamp()),
                }
            }
        }
    }
}

fn bad_interval(value: &ExprValue) -> QueryError {
    QueryError::semantic(format!("invalid span interval [{}]", value))
}

fn integral_interval(value: &ExprValue) -> QueryResult<i64> {
    let count = value.long_value().map_err(|_| bad_interval(value))?;
    if count <= 0 || value.is_floating() {
        return Err(bad_interval(value));
    }
    Ok(count)
}

fn epoch_seconds(value: &ExprValue) -> EvalResult<i64> {
    match value {
        ExprValue::Timestamp(ts) => Ok(ts.timestamp()),
        ExprValue::Date(d) => Ok(d
            .and_hms_opt(0, 0, 0)
            .unwrap_or_default()
            .and_utc()
            .timestamp()),
        other => Err(EvaluationError::InvalidOperand {
            operator: "span".to_string(),
            detail: format!("expected a time value, got {}", other.expr_type().name()),
        }),
    }
}

fn months_since_epoch(value: &ExprValue) -> EvalResult<i64> {
    let (year, month) = match value {
        ExprValue::Timestamp(ts) => (ts.year(), ts.month()),
        ExprValue::Date(d) => (d.year(), d.month()),
        other => {
            return Err(EvaluationError::InvalidOperand {
                operator: "span".to_string(),
                detail: format!("expected a time value, got {}", other.expr_type().name()),
            })
        }
    };
    Ok((year as i64 - 1970) * 12 + (month as i64 - 1))
}

fn timestamp_value(seconds: i64) -> EvalResult<ExprValue> {
    DateTime::<Utc>::from_timestamp(seconds, 0)
        .map(ExprValue::Timestamp)
        .ok_or(EvaluationError::InvalidOperand {
            operator: "span".to_string(),
            detail: format!("bucket start out of range: {} seconds", seconds),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::types::ExprType;
    use crate::expression::expr::Expression;

    fn span(interval: ExprValue, unit: SpanUnit) -> SpanExpr {
        SpanExpr {
            field: Expression::reference("f", ExprType::Undefined),
            interval,
            unit,
        }
    }

    fn ts(s: &str) -> ExprValue {
        ExprValue::Timestamp(s.parse::<DateTime<Utc>>().unwrap())
    }

    #[test]
    fn test_numeric_integral_rounding() {
        let r = Rounding::for_span(&span(ExprValue::Integer(10), SpanUnit::None)).unwrap();
        assert!(r.round(&ExprValue::Integer(37)).unwrap().equal(&ExprValue::Long(30)));
        assert!(r.round(&ExprValue::Integer(-3)).unwrap().equal(&ExprValue::Long(-10)));
        assert_eq!(r.locate(&ExprValue::Integer(37)).unwrap(), 3);
        assert_eq!(r.locate(&ExprValue::Integer(-3)).unwrap(), -1);
    }

    #[test]
    fn test_numeric_floating_rounding() {
        let r = Rounding::for_span(&span(ExprValue::Double(2.5), SpanUnit::None)).unwrap();
        assert!(r.round(&ExprValue::Double(6.0)).unwrap().equal(&ExprValue::Double(5.0)));
        assert!(r.round(&ExprValue::Integer(4)).unwrap().equal(&ExprValue::Double(2.5)));
    }

    #[test]
    fn test_fixed_hour_rounding() {
        let r = Rounding::for_span(&span(ExprValue::Integer(2), SpanUnit::Hour)).unwrap();
        let rounded = r.round(&ts("2024-06-01T13:45:00Z")).unwrap();
        assert!(rounded.equal(&ts("2024-06-01T12:00:00Z")));
    }

    #[test]
    fn test_fixed_rounding_anchored_at_epoch() {
        let r = Rounding::for_span(&span(ExprValue::Integer(1), SpanUnit::Day)).unwrap();
        assert_eq!(r.locate(&ts("1970-01-01T05:00:00Z")).unwrap(), 0);
        assert_eq!(r.locate(&ts("1969-12-31T23:00:00Z")).unwrap(), -1);
    }

    #[test]
    fn test_calendar_quarter_rounding() {
        let r = Rounding::for_span(&span(ExprValue::Integer(1), SpanUnit::Quarter)).unwrap();
        let rounded = r.round(&ts("2024-05-20T10:00:00Z")).unwrap();
        assert!(rounded.equal(&ts("2024-04-01T00:00:00Z")));
    }

    #[test]
    fn test_calendar_year_keeps_date_type() {
        let r = Rounding::for_span(&span(ExprValue::Integer(1), SpanUnit::Year)).unwrap();
        let date = ExprValue::Date(NaiveDate::from_ymd_opt(2024, 9, 15).unwrap());
        let rounded = r.round(&date).unwrap();
        assert!(rounded.equal(&ExprValue::Date(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap())));
    }

    #[test]
    fn test_round_matches_locate() {
        // Values in the same bucket round to the same start.
        let r = Rounding::for_span(&span(ExprValue::Integer(3), SpanUnit::Month)).unwrap();
        let a = ts("2024-01-10T00:00:00Z");
        let b = ts("2024-03-28T00:00:00Z");
        assert_eq!(r.locate(&a).unwrap(), r.locate(&b).unwrap());
        assert!(r.round(&a).unwrap().equal(&r.round(&b).unwrap()));
    }

    #[test]
    fn test_invalid_intervals_rejected() {
        assert!(Rounding::for_span(&span(ExprValue::Integer(0), SpanUnit::None)).is_err());
        assert!(Rounding::for_span(&span(ExprValue::Integer(-5), SpanUnit::Hour)).is_err());
        assert!(Rounding::for_span(&span(ExprValue::Double(1.5), SpanUnit::Day)).is_err());
        assert!(Rounding::for_span(&span(ExprValue::string("x"), SpanUnit::None)).is_err());
    }

    #[test]
    fn test_non_time_value_under_time_unit_fails() {
        let r = Rounding::for_span(&span(ExprValue::Integer(1), SpanUnit::Hour)).unwrap();
        assert!(r.round(&ExprValue::Integer(5)).is_err());
    }
}
