//! Expression-tree serialization.
//!
//! Function implementations are code, not data, so the wire form records
//! only the resolved name and argument types and re-resolves against a
//! function registry on the way back in. Planning-only forms (aliases,
//! spans) are not serializable and raise a typed error.

use crate::data::types::ExprType;
use crate::data::value::ExprValue;
use crate::error::{EvaluationError, QueryError, QueryResult};
use crate::expression::expr::Expression;
use crate::expression::function::FunctionRegistry;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
enum WireExpr {
    Literal(ExprValue),
    Reference { name: String, expr_type: ExprType },
    Function { name: String, arg_types: Vec<ExprType>, args: Vec<WireExpr> },
}

fn to_wire(expr: &Expression) -> Result<WireExpr, EvaluationError> {
    match expr {
        Expression::Literal(value) => Ok(WireExpr::Literal(value.clone())),
        Expression::Reference(r) => Ok(WireExpr::Reference {
            name: r.name.clone(),
            expr_type: r.expr_type,
        }),
        Expression::Function(f) => Ok(WireExpr::Function {
            name: f.signature.name.clone(),
            arg_types: f.signature.arg_types.clone(),
            args: f
                .args
                .iter()
                .map(to_wire)
                .collect::<Result<Vec<_>, _>>()?,
        }),
        Expression::Named(named) => Err(EvaluationError::NotSerializable(format!(
            "alias expression [{}]",
            named.name
        ))),
        Expression::Span(span) => Err(EvaluationError::NotSerializable(format!(
            "span expression over [{}]",
            span.field
        ))),
    }
}

fn from_wire(wire: WireExpr, registry: &FunctionRegistry) -> QueryResult<Expression> {
    match wire {
        WireExpr::Literal(value) => Ok(Expression::Literal(value)),
        WireExpr::Reference { name, expr_type } => Ok(Expression::reference(name, expr_type)),
        WireExpr::Function {
            name,
            arg_types,
            args,
        } => {
            let args = args
                .into_iter()
                .map(|a| from_wire(a, registry))
                .collect::<QueryResult<Vec<_>>>()?;
            registry.build(&name, args, &arg_types)
        }
    }
}

/// Serialize an expression tree. Fails with a typed error for trees
/// containing planning-only nodes.
pub fn serialize_expression(expr: &Expression) -> Result<Vec<u8>, EvaluationError> {
    let wire = to_wire(expr)?;
    bincode::serialize(&wire)
        .map_err(|e| EvaluationError::other(format!("failed to encode expression: {}", e)))
}

/// Deserialize an expression tree, re-resolving function calls against the
/// given registry.
pub fn deserialize_expression(
    bytes: &[u8],
    registry: &FunctionRegistry,
) -> QueryResult<Expression> {
    let wire: WireExpr = bincode::deserialize(bytes).map_err(|e| {
        QueryError::Evaluation(EvaluationError::other(format!(
            "failed to decode expression: {}",
            e
        )))
    })?;
    from_wire(wire, registry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expression::scalar::default_registry;

    fn round_trip(expr: &Expression) -> Expression {
        let registry = default_registry();
        let bytes = serialize_expression(expr).unwrap();
        deserialize_expression(&bytes, &registry).unwrap()
    }

    #[test]
    fn test_literal_round_trip() {
        let expr = Expression::literal(ExprValue::Integer(42));
        assert_eq!(round_trip(&expr), expr);

        let expr = Expression::literal(ExprValue::string("hello"));
        assert_eq!(round_trip(&expr), expr);
    }

    #[test]
    fn test_reference_round_trip() {
        let expr = Expression::reference("age", ExprType::Integer);
        assert_eq!(round_trip(&expr), expr);
    }

    #[test]
    fn test_predicate_round_trip() {
        // or(true, <(1, 2))
        let registry = default_registry();
        let less = registry
            .build(
                "<",
                vec![
                    Expression::literal(ExprValue::Integer(1)),
                    Expression::literal(ExprValue::Integer(2)),
                ],
                &[ExprType::Integer, ExprType::Integer],
            )
            .unwrap();
        let predicate = registry
            .build(
                "or",
                vec![Expression::literal(ExprValue::Boolean(true)), less],
                &[ExprType::Boolean, ExprType::Boolean],
            )
            .unwrap();
        assert_eq!(round_trip(&predicate), predicate);
    }

    #[test]
    fn test_non_serializable_raises() {
        let named = Expression::named("a", Expression::literal(ExprValue::Integer(1)));
        assert!(matches!(
            serialize_expression(&named),
            Err(EvaluationError::NotSerializable(_))
        ));

        let span = Expression::span(
            Expression::reference("age", ExprType::Integer),
            ExprValue::Integer(10),
            crate::expression::expr::SpanUnit::None,
        );
        assert!(matches!(
            serialize_expression(&span),
            Err(EvaluationError::NotSerializable(_))
        ));
    }
}
