//! Built-in scalar function library.
//!
//! All functions operate on already-evaluated argument values. Absent-value
//! (NULL/MISSING) propagation is handled by the expression node for every
//! function except the logical operators and null tests, which need to see
//! the raw values for three-valued logic.

use crate::data::types::{ExprType, NUMERIC_TYPES};
use crate::data::value::ExprValue;
use crate::error::{EvalResult, EvaluationError};
use crate::expression::function::{FunctionRegistry, FunctionResolver};
use std::cmp::Ordering;

/// Registry preloaded with the built-in function library.
pub fn default_registry() -> FunctionRegistry {
    let mut registry = FunctionRegistry::new();

    registry.register(FunctionResolver::new("+").numeric_binary(add));
    registry.register(FunctionResolver::new("-").numeric_binary(subtract));
    registry.register(FunctionResolver::new("*").numeric_binary(multiply));
    registry.register(FunctionResolver::new("/").numeric_binary(divide));
    registry.register(FunctionResolver::new("%").numeric_binary(modulo));

    let comparisons: [(&str, crate::expression::function::ScalarImpl); 6] = [
        ("=", eq),
        ("!=", ne),
        ("<", lt),
        ("<=", le),
        (">", gt),
        (">=", ge),
    ];
    for (name, implementation) in comparisons {
        registry.register(
            FunctionResolver::new(name).comparison_over(&comparable_types(), implementation),
        );
    }

    registry.register(FunctionResolver::new("and").overload_raw(
        vec![ExprType::Boolean, ExprType::Boolean],
        ExprType::Boolean,
        and,
    ));
    registry.register(FunctionResolver::new("or").overload_raw(
        vec![ExprType::Boolean, ExprType::Boolean],
        ExprType::Boolean,
        or,
    ));
    registry.register(FunctionResolver::new("not").overload(
        vec![ExprType::Boolean],
        ExprType::Boolean,
        not,
    ));

    let mut is_null_resolver = FunctionResolver::new("is_null");
    let mut is_not_null_resolver = FunctionResolver::new("is_not_null");
    for t in all_value_types() {
        is_null_resolver = is_null_resolver.overload_raw(vec![t], ExprType::Boolean, is_null);
        is_not_null_resolver =
            is_not_null_resolver.overload_raw(vec![t], ExprType::Boolean, is_not_null);
    }
    registry.register(is_null_resolver);
    registry.register(is_not_null_resolver);

    registry.register(FunctionResolver::new("abs").numeric_unary(abs));
    registry.register(FunctionResolver::new("like").overload(
        vec![ExprType::String, ExprType::String],
        ExprType::Boolean,
        like,
    ));

    registry
}

fn comparable_types() -> Vec<ExprType> {
    let mut types = NUMERIC_TYPES.to_vec();
    types.extend([
        ExprType::String,
        ExprType::Boolean,
        ExprType::Date,
        ExprType::Time,
        ExprType::Timestamp,
        ExprType::Interval,
    ]);
    types
}

fn all_value_types() -> Vec<ExprType> {
    let mut types = comparable_types();
    types.extend([ExprType::Text, ExprType::Struct, ExprType::Array, ExprType::Undefined]);
    types
}

enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
}

impl ArithOp {
    fn name(&self) -> &'static str {
        match self {
            ArithOp::Add => "+",
            ArithOp::Sub => "-",
            ArithOp::Mul => "*",
            ArithOp::Div => "/",
            ArithOp::Rem => "%",
        }
    }
}

/// Numeric arithmetic with promotion to the wider operand representation.
fn arithmetic(args: &[ExprValue], op: ArithOp) -> EvalResult<ExprValue> {
    let (a, b) = (&args[0], &args[1]);
    let widest = ExprType::widest_numeric(a.expr_type(), b.expr_type()).ok_or_else(|| {
        EvaluationError::InvalidOperand {
            operator: op.name().to_string(),
            detail: format!("non-numeric operands {} and {}", a.expr_type(), b.expr_type()),
        }
    })?;

    if matches!(widest, ExprType::Float | ExprType::Double) {
        let (x, y) = (a.double_value()?, b.double_value()?);
        let result = match op {
            ArithOp::Add => x + y,
            ArithOp::Sub => x - y,
            ArithOp::Mul => x * y,
            ArithOp::Div => x / y,
            ArithOp::Rem => x % y,
        };
        return Ok(match widest {
            ExprType::Float => ExprValue::Float(result as f32),
            _ => ExprValue::Double(result),
        });
    }

    let (x, y) = (a.long_value()?, b.long_value()?);
    if matches!(op, ArithOp::Div | ArithOp::Rem) && y == 0 {
        return Err(EvaluationError::DivisionByZero);
    }
    let result = match op {
        ArithOp::Add => x.wrapping_add(y),
        ArithOp::Sub => x.wrapping_sub(y),
        ArithOp::Mul => x.wrapping_mul(y),
        ArithOp::Div => x / y,
        ArithOp::Rem => x % y,
    };
    Ok(match widest {
        ExprType::Long => ExprValue::Long(result),
        ExprType::Integer => ExprValue::Integer(result as i32),
        ExprType::Short => ExprValue::Short(result as i16),
        _ => ExprValue::Byte(result as i8),
    })
}

fn add(args: &[ExprValue]) -> EvalResult<ExprValue> {
    arithmetic(args, ArithOp::Add)
}

fn subtract(args: &[ExprValue]) -> EvalResult<ExprValue> {
    arithmetic(args, ArithOp::Sub)
}

fn multiply(args: &[ExprValue]) -> EvalResult<ExprValue> {
    arithmetic(args, ArithOp::Mul)
}

fn divide(args: &[ExprValue]) -> EvalResult<ExprValue> {
    arithmetic(args, ArithOp::Div)
}

fn modulo(args: &[ExprValue]) -> EvalResult<ExprValue> {
    arithmetic(args, ArithOp::Rem)
}

fn eq(args: &[ExprValue]) -> EvalResult<ExprValue> {
    Ok(ExprValue::Boolean(args[0].equal(&args[1])))
}

fn ne(args: &[ExprValue]) -> EvalResult<ExprValue> {
    Ok(ExprValue::Boolean(!args[0].equal(&args[1])))
}

fn compared<F: FnOnce(Ordering) -> bool>(args: &[ExprValue], f: F) -> EvalResult<ExprValue> {
    Ok(ExprValue::Boolean(f(args[0].compare(&args[1])?)))
}

fn lt(args: &[ExprValue]) -> EvalResult<ExprValue> {
    compared(args, Ordering::is_lt)
}

fn le(args: &[ExprValue]) -> EvalResult<ExprValue> {
    compared(args, Ordering::is_le)
}

fn gt(args: &[ExprValue]) -> EvalResult<ExprValue> {
    compared(args, Ordering::is_gt)
}

fn ge(args: &[ExprValue]) -> EvalResult<ExprValue> {
    compared(args, Ordering::is_ge)
}

/// Three-valued AND: false dominates, absent values act as NULL.
fn and(args: &[ExprValue]) -> EvalResult<ExprValue> {
    match (truth(&args[0]), truth(&args[1])) {
        (Some(false), _) | (_, Some(false)) => Ok(ExprValue::Boolean(false)),
        (Some(true), Some(true)) => Ok(ExprValue::Boolean(true)),
        _ => Ok(ExprValue::Null),
    }
}

/// Three-valued OR: true dominates, absent values act as NULL.
fn or(args: &[ExprValue]) -> EvalResult<ExprValue> {
    match (truth(&args[0]), truth(&args[1])) {
        (Some(true), _) | (_, Some(true)) => Ok(ExprValue::Boolean(true)),
        (Some(false), Some(false)) => Ok(ExprValue::Boolean(false)),
        _ => Ok(ExprValue::Null),
    }
}

fn not(args: &[ExprValue]) -> EvalResult<ExprValue> {
    Ok(ExprValue::Boolean(!args[0].boolean_value()?))
}

fn truth(value: &ExprValue) -> Option<bool> {
    match value {
        ExprValue::Boolean(b) => Some(*b),
        _ => None,
    }
}

fn is_null(args: &[ExprValue]) -> EvalResult<ExprValue> {
    Ok(ExprValue::Boolean(args[0].is_absent()))
}

fn is_not_null(args: &[ExprValue]) -> EvalResult<ExprValue> {
    Ok(ExprValue::Boolean(!args[0].is_absent()))
}

fn abs(args: &[ExprValue]) -> EvalResult<ExprValue> {
    Ok(match &args[0] {
        ExprValue::Byte(v) => ExprValue::Byte(v.wrapping_abs()),
        ExprValue::Short(v) => ExprValue::Short(v.wrapping_abs()),
        ExprValue::Integer(v) => ExprValue::Integer(v.wrapping_abs()),
        ExprValue::Long(v) => ExprValue::Long(v.wrapping_abs()),
        ExprValue::Float(v) => ExprValue::Float(v.abs()),
        ExprValue::Double(v) => ExprValue::Double(v.abs()),
        other => {
            return Err(EvaluationError::InvalidOperand {
                operator: "abs".to_string(),
                detail: format!("non-numeric operand {}", other.expr_type()),
            })
        }
    })
}

/// SQL LIKE: `%` matches any sequence, `_` matches one character.
fn like(args: &[ExprValue]) -> EvalResult<ExprValue> {
    let text: Vec<char> = args[0].string_value()?.chars().collect();
    let pattern: Vec<char> = args[1].string_value()?.chars().collect();
    Ok(ExprValue::Boolean(like_match(&text, &pattern)))
}

fn like_match(text: &[char], pattern: &[char]) -> bool {
    match pattern.first() {
        None => text.is_empty(),
        Some('%') => {
            (0..=text.len()).any(|skip| like_match(&text[skip..], &pattern[1..]))
        }
        Some('_') => !text.is_empty() && like_match(&text[1..], &pattern[1..]),
        Some(c) => text.first() == Some(c) && like_match(&text[1..], &pattern[1..]),
    }
}
