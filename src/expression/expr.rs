//! Resolved expression tree definitions and evaluation.

use crate::data::types::ExprType;
use crate::data::value::ExprValue;
use crate::data::BindingTuple;
use crate::error::EvalResult;
use crate::expression::function::{FunctionSignature, ScalarImpl};
use std::fmt;

/// Field reference bound to a type by the analyzer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceExpr {
    pub name: String,
    pub expr_type: ExprType,
}

impl ReferenceExpr {
    pub fn new(name: impl Into<String>, expr_type: ExprType) -> Self {
        Self {
            name: name.into(),
            expr_type,
        }
    }
}

/// Resolved scalar function call: signature, implementation and arguments.
#[derive(Clone)]
pub struct FunctionExpr {
    pub signature: FunctionSignature,
    pub implementation: ScalarImpl,
    /// Most functions yield NULL/MISSING when any argument is absent;
    /// logical operators and null tests opt out and see raw values.
    pub propagate_absent: bool,
    pub args: Vec<Expression>,
}

impl fmt::Debug for FunctionExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionExpr")
            .field("signature", &self.signature)
            .field("args", &self.args)
            .finish()
    }
}

impl PartialEq for FunctionExpr {
    fn eq(&self, other: &Self) -> bool {
        self.signature == other.signature && self.args == other.args
    }
}

/// Aliasing wrapper: names an expression in projection/aggregation output.
#[derive(Debug, Clone, PartialEq)]
pub struct NamedExpr {
    pub name: String,
    pub expr: Expression,
}

impl NamedExpr {
    pub fn new(name: impl Into<String>, expr: Expression) -> Self {
        Self {
            name: name.into(),
            expr,
        }
    }
}

/// Time unit of a span bucket. `None` buckets a plain numeric field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpanUnit {
    None,
    Second,
    Minute,
    Hour,
    Day,
    Week,
    Month,
    Quarter,
    Year,
}

impl SpanUnit {
    /// Calendar units vary in length; fixed units are exact durations.
    pub fn is_calendar(&self) -> bool {
        matches!(self, SpanUnit::Month | SpanUnit::Quarter | SpanUnit::Year)
    }
}

/// Bucketing expression: a field, an interval and a time unit. The field
/// value is rounded down to its bucket by the aggregation collector.
#[derive(Debug, Clone, PartialEq)]
pub struct SpanExpr {
    pub field: Expression,
    pub interval: ExprValue,
    pub unit: SpanUnit,
}

/// Typed expression produced by the analyzer.
///
/// Evaluation is a pure function of the binding environment; aggregate and
/// window accumulation live outside the tree (see
/// [`crate::expression::aggregate`]).
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    Literal(ExprValue),
    Reference(ReferenceExpr),
    Function(FunctionExpr),
    Named(Box<NamedExpr>),
    Span(Box<SpanExpr>),
}

impl Expression {
    pub fn literal(value: ExprValue) -> Self {
        Expression::Literal(value)
    }

    pub fn reference(name: impl Into<String>, expr_type: ExprType) -> Self {
        Expression::Reference(ReferenceExpr::new(name, expr_type))
    }

    pub fn named(name: impl Into<String>, expr: Expression) -> Self {
        Expression::Named(Box::new(NamedExpr::new(name, expr)))
    }

    pub fn span(field: Expression, interval: ExprValue, unit: SpanUnit) -> Self {
        Expression::Span(Box::new(SpanExpr {
            field,
            interval,
            unit,
        }))
    }

    /// Evaluate against one row. Never fails for type-safe trees produced
    /// by the analyzer; an error here signals an upstream bug.
    pub fn value_of(&self, env: &BindingTuple) -> EvalResult<ExprValue> {
        match self {
            Expression::Literal(value) => Ok(value.clone()),
            Expression::Reference(r) => Ok(env.resolve(&r.name)),
            Expression::Function(f) => {
                let mut args = Vec::with_capacity(f.args.len());
                for arg in &f.args {
                    args.push(arg.value_of(env)?);
                }
                if f.propagate_absent {
                    if args.iter().any(|v| v.is_missing()) {
                        return Ok(ExprValue::Missing);
                    }
                    if args.iter().any(|v| v.is_null()) {
                        return Ok(ExprValue::Null);
                    }
                }
                (f.implementation)(&args)
            }
            Expression::Named(named) => named.expr.value_of(env),
            // Rounding into the bucket happens in the span collector; the
            // expression itself yields the raw field value.
            Expression::Span(span) => span.field.value_of(env),
        }
    }

    pub fn expr_type(&self) -> ExprType {
        match self {
            Expression::Literal(value) => value.expr_type(),
            Expression::Reference(r) => r.expr_type,
            Expression::Function(f) => f.signature.return_type,
            Expression::Named(named) => named.expr.expr_type(),
            Expression::Span(span) => span.field.expr_type(),
        }
    }

    /// Output column name: alias if present, else a rendering of the tree.
    pub fn output_name(&self) -> String {
        match self {
            Expression::Named(named) => named.name.clone(),
            Expression::Reference(r) => r.name.clone(),
            other => other.to_string(),
        }
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expression::Literal(v) => write!(f, "{}", v),
            Expression::Reference(r) => write!(f, "{}", r.name),
            Expression::Function(func) => {
                write!(f, "{}(", func.signature.name)?;
                for (i, arg) in func.args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", arg)?;
                }
                write!(f, ")")
            }
            Expression::Named(named) => write!(f, "{}", named.name),
            Expression::Span(span) => {
                write!(f, "span({}, {}, {:?})", span.field, span.interval, span.unit)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expression::scalar::default_registry;

    fn env() -> BindingTuple {
        BindingTuple::new(vec![
            ("age".to_string(), ExprValue::Integer(30)),
            ("name".to_string(), ExprValue::string("bob")),
        ])
    }

    fn call(name: &str, args: Vec<Expression>) -> Expression {
        let registry = default_registry();
        let types: Vec<_> = args.iter().map(|a| a.expr_type()).collect();
        registry.build(name, args, &types).unwrap()
    }

    #[test]
    fn test_literal_and_reference() {
        let lit = Expression::literal(ExprValue::Integer(42));
        assert!(lit.value_of(&env()).unwrap().equal(&ExprValue::Integer(42)));
        assert_eq!(lit.expr_type(), ExprType::Integer);

        let re = Expression::reference("age", ExprType::Integer);
        assert!(re.value_of(&env()).unwrap().equal(&ExprValue::Integer(30)));

        let unbound = Expression::reference("salary", ExprType::Integer);
        assert!(unbound.value_of(&env()).unwrap().is_missing());
    }

    #[test]
    fn test_function_evaluation() {
        let expr = call(
            "+",
            vec![
                Expression::reference("age", ExprType::Integer),
                Expression::literal(ExprValue::Integer(5)),
            ],
        );
        assert!(expr.value_of(&env()).unwrap().equal(&ExprValue::Integer(35)));
        assert_eq!(expr.expr_type(), ExprType::Integer);
    }

    #[test]
    fn test_absent_propagation() {
        // Arithmetic on MISSING yields MISSING, on NULL yields NULL.
        let missing = call(
            "+",
            vec![
                Expression::reference("salary", ExprType::Integer),
                Expression::literal(ExprValue::Integer(1)),
            ],
        );
        assert!(missing.value_of(&env()).unwrap().is_missing());

        let null = call(
            "*",
            vec![
                Expression::literal(ExprValue::Null),
                Expression::literal(ExprValue::Integer(2)),
            ],
        );
        assert!(null.value_of(&env()).unwrap().is_null());
    }

    #[test]
    fn test_named_wrapper() {
        let named = Expression::named("a", Expression::reference("age", ExprType::Integer));
        assert_eq!(named.output_name(), "a");
        assert_eq!(named.expr_type(), ExprType::Integer);
        assert!(named.value_of(&env()).unwrap().equal(&ExprValue::Integer(30)));
    }

    #[test]
    fn test_span_yields_raw_field_value() {
        let span = Expression::span(
            Expression::reference("age", ExprType::Integer),
            ExprValue::Integer(10),
            SpanUnit::None,
        );
        assert!(span.value_of(&env()).unwrap().equal(&ExprValue::Integer(30)));
    }

    #[test]
    fn test_display() {
        let expr = call(
            "=",
            vec![
                Expression::reference("age", ExprType::Integer),
                Expression::literal(ExprValue::Integer(1)),
            ],
        );
        assert_eq!(expr.to_string(), "=(age, 1)");
    }
}
