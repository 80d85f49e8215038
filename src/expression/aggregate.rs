//! Aggregation functions.
//!
//! An [`Aggregator`] is a stateless descriptor (function kind plus argument
//! expression); all mutable accumulation lives in an external
//! [`AccumulatorState`] threaded through by the operator that owns it. This
//! keeps expression evaluation pure and makes window-frame resets and
//! per-query scoping explicit: one state per (aggregator, bucket/partition),
//! never shared across concurrent executions.

use crate::data::types::ExprType;
use crate::data::value::ExprValue;
use crate::data::BindingTuple;
use crate::error::EvalResult;
use crate::expression::expr::Expression;
use std::cmp::Ordering;
use std::fmt;

/// Supported aggregate functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggKind {
    /// Counts non-absent argument values.
    Count,
    /// Sum of numeric values, skipping NULL/MISSING.
    Sum,
    /// Average of numeric values, skipping NULL/MISSING.
    Avg,
    Min,
    Max,
}

impl AggKind {
    pub fn name(&self) -> &'static str {
        match self {
            AggKind::Count => "count",
            AggKind::Sum => "sum",
            AggKind::Avg => "avg",
            AggKind::Min => "min",
            AggKind::Max => "max",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "count" => Some(AggKind::Count),
            "sum" => Some(AggKind::Sum),
            "avg" => Some(AggKind::Avg),
            "min" => Some(AggKind::Min),
            "max" => Some(AggKind::Max),
            _ => None,
        }
    }
}

/// Stateless aggregate descriptor.
#[derive(Debug, Clone, PartialEq)]
pub struct Aggregator {
    pub kind: AggKind,
    pub arg: Expression,
}

impl Aggregator {
    pub fn new(kind: AggKind, arg: Expression) -> Self {
        Self { kind, arg }
    }

    /// COUNT over a constant, i.e. `count(*)`.
    pub fn count_star() -> Self {
        Self::new(AggKind::Count, Expression::literal(ExprValue::Integer(1)))
    }

    pub fn return_type(&self) -> ExprType {
        match self.kind {
            AggKind::Count => ExprType::Long,
            AggKind::Avg => ExprType::Double,
            AggKind::Sum => match self.arg.expr_type() {
                ExprType::Float | ExprType::Double => ExprType::Double,
                _ => ExprType::Long,
            },
            AggKind::Min | AggKind::Max => self.arg.expr_type(),
        }
    }

    pub fn create_state(&self) -> AccumulatorState {
        AccumulatorState::default()
    }

    /// Fold one row into the state. Absent argument values are skipped, per
    /// SQL aggregate semantics.
    pub fn iterate(&self, state: &mut AccumulatorState, env: &BindingTuple) -> EvalResult<()> {
        let value = self.arg.value_of(env)?;
        if value.is_absent() {
            return Ok(());
        }
        state.count += 1;
        match self.kind {
            AggKind::Count => {}
            AggKind::Sum | AggKind::Avg => {
                if value.is_floating() || state.floating {
                    state.floating = true;
                    state.sum_double += value.double_value()?;
                } else {
                    let v = value.long_value()?;
                    state.sum_long += v;
                    state.sum_double += v as f64;
                }
            }
            AggKind::Min => {
                let replace = match &state.extreme {
                    Some(current) => value.compare(current)? == Ordering::Less,
                    None => true,
                };
                if replace {
                    state.extreme = Some(value);
                }
            }
            AggKind::Max => {
                let replace = match &state.extreme {
                    Some(current) => value.compare(current)? == Ordering::Greater,
                    None => true,
                };
                if replace {
                    state.extreme = Some(value);
                }
            }
        }
        Ok(())
    }

    /// Current result. NULL when no non-absent value was seen (except
    /// COUNT, which yields 0).
    pub fn result(&self, state: &AccumulatorState) -> ExprValue {
        match self.kind {
            AggKind::Count => ExprValue::Long(state.count),
            AggKind::Sum => {
                if state.count == 0 {
                    ExprValue::Null
                } else if state.floating {
                    ExprValue::Double(state.sum_double)
                } else {
                    ExprValue::Long(state.sum_long)
                }
            }
            AggKind::Avg => {
                if state.count == 0 {
                    ExprValue::Null
                } else {
                    ExprValue::Double(state.sum_double / state.count as f64)
                }
            }
            AggKind::Min | AggKind::Max => {
                state.extreme.clone().unwrap_or(ExprValue::Null)
            }
        }
    }
}

impl fmt::Display for Aggregator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.kind.name(), self.arg)
    }
}

/// Mutable accumulator paired with one aggregator instance.
#[derive(Debug, Clone, Default)]
pub struct AccumulatorState {
    count: i64,
    sum_long: i64,
    sum_double: f64,
    floating: bool,
    extreme: Option<ExprValue>,
}

impl AccumulatorState {
    /// Reset to the initial state (window partition boundary).
    pub fn reset(&mut self) {
        *self = AccumulatorState::default();
    }
}

/// Aggregator with its output column name.
#[derive(Debug, Clone, PartialEq)]
pub struct NamedAggregator {
    pub name: String,
    pub aggregator: Aggregator,
}

impl NamedAggregator {
    pub fn new(name: impl Into<String>, aggregator: Aggregator) -> Self {
        Self {
            name: name.into(),
            aggregator,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(age: ExprValue) -> BindingTuple {
        BindingTuple::new(vec![("age".to_string(), age)])
    }

    fn age_agg(kind: AggKind) -> Aggregator {
        Aggregator::new(kind, Expression::reference("age", ExprType::Integer))
    }

    fn run(agg: &Aggregator, inputs: Vec<ExprValue>) -> ExprValue {
        let mut state = agg.create_state();
        for v in inputs {
            agg.iterate(&mut state, &row(v)).unwrap();
        }
        agg.result(&state)
    }

    #[test]
    fn test_count_skips_absent() {
        let agg = age_agg(AggKind::Count);
        let result = run(
            &agg,
            vec![ExprValue::Integer(1), ExprValue::Null, ExprValue::Missing, ExprValue::Integer(2)],
        );
        assert!(result.equal(&ExprValue::Integer(2)));
        // COUNT keeps its 64-bit counter; no narrowing on the way out.
        assert_eq!(result.expr_type(), ExprType::Long);
        assert_eq!(agg.return_type(), ExprType::Long);
    }

    #[test]
    fn test_count_star_counts_every_row() {
        let agg = Aggregator::count_star();
        let mut state = agg.create_state();
        for v in [ExprValue::Null, ExprValue::Integer(5)] {
            agg.iterate(&mut state, &row(v)).unwrap();
        }
        assert!(agg.result(&state).equal(&ExprValue::Integer(2)));
    }

    #[test]
    fn test_sum_and_avg() {
        let sum = age_agg(AggKind::Sum);
        assert!(run(&sum, vec![ExprValue::Integer(10), ExprValue::Integer(20)])
            .equal(&ExprValue::Long(30)));

        let avg = age_agg(AggKind::Avg);
        assert!(run(&avg, vec![ExprValue::Integer(10), ExprValue::Integer(20)])
            .equal(&ExprValue::Double(15.0)));
    }

    #[test]
    fn test_sum_promotes_on_floating_input() {
        let agg = Aggregator::new(AggKind::Sum, Expression::reference("age", ExprType::Double));
        let result = run(&agg, vec![ExprValue::Integer(1), ExprValue::Double(0.5)]);
        assert!(result.equal(&ExprValue::Double(1.5)));
    }

    #[test]
    fn test_min_max() {
        let min = age_agg(AggKind::Min);
        assert!(run(&min, vec![ExprValue::Integer(3), ExprValue::Integer(1), ExprValue::Integer(2)])
            .equal(&ExprValue::Integer(1)));

        let max = age_agg(AggKind::Max);
        assert!(run(&max, vec![ExprValue::Integer(3), ExprValue::Integer(1)])
            .equal(&ExprValue::Integer(3)));
    }

    #[test]
    fn test_empty_input_results() {
        assert!(run(&age_agg(AggKind::Count), vec![]).equal(&ExprValue::Integer(0)));
        assert!(run(&age_agg(AggKind::Sum), vec![]).is_null());
        assert!(run(&age_agg(AggKind::Avg), vec![]).is_null());
        assert!(run(&age_agg(AggKind::Min), vec![]).is_null());
    }

    #[test]
    fn test_state_reset() {
        let agg = age_agg(AggKind::Sum);
        let mut state = agg.create_state();
        agg.iterate(&mut state, &row(ExprValue::Integer(10))).unwrap();
        agg.iterate(&mut state, &row(ExprValue::Integer(20))).unwrap();
        assert!(agg.result(&state).equal(&ExprValue::Long(30)));

        state.reset();
        agg.iterate(&mut state, &row(ExprValue::Integer(30))).unwrap();
        assert!(agg.result(&state).equal(&ExprValue::Long(30)));
    }
}
