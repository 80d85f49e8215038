//! Function registry and overload resolution.
//!
//! Each function name owns an ordered list of overloads. Resolution prefers
//! an exact signature match; otherwise every compatible overload is scored
//! by the number of argument positions needing coercion and the cheapest
//! wins. At equal cost the first-registered overload wins, so registration
//! order is the deterministic tie-break.

use crate::data::types::{ExprType, NUMERIC_TYPES};
use crate::data::value::ExprValue;
use crate::error::{EvalResult, QueryError, QueryResult};
use crate::expression::expr::{Expression, FunctionExpr};
use std::collections::HashMap;

/// Implementation of a scalar function over already-evaluated arguments.
pub type ScalarImpl = fn(&[ExprValue]) -> EvalResult<ExprValue>;

/// Resolved function identity: name plus concrete argument/return types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionSignature {
    pub name: String,
    pub arg_types: Vec<ExprType>,
    pub return_type: ExprType,
}

impl FunctionSignature {
    pub fn new(name: impl Into<String>, arg_types: Vec<ExprType>, return_type: ExprType) -> Self {
        Self {
            name: name.into(),
            arg_types,
            return_type,
        }
    }
}

/// One concrete overload of a function.
#[derive(Debug, Clone)]
struct Overload {
    arg_types: Vec<ExprType>,
    return_type: ExprType,
    implementation: ScalarImpl,
    propagate_absent: bool,
}

/// A named bundle of overloads, registered as a unit.
#[derive(Debug, Clone)]
pub struct FunctionResolver {
    name: String,
    overloads: Vec<Overload>,
}

impl FunctionResolver {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            overloads: Vec::new(),
        }
    }

    /// Add one concrete overload.
    pub fn overload(
        mut self,
        arg_types: Vec<ExprType>,
        return_type: ExprType,
        implementation: ScalarImpl,
    ) -> Self {
        self.overloads.push(Overload {
            arg_types,
            return_type,
            implementation,
            propagate_absent: true,
        });
        self
    }

    /// Add an overload that sees NULL/MISSING arguments raw instead of
    /// having them propagated (logical operators, null tests).
    pub fn overload_raw(
        mut self,
        arg_types: Vec<ExprType>,
        return_type: ExprType,
        implementation: ScalarImpl,
    ) -> Self {
        self.overloads.push(Overload {
            arg_types,
            return_type,
            implementation,
            propagate_absent: false,
        });
        self
    }

    /// Generic unary signature over "any numeric type, returns same type",
    /// expanded at registration into one overload per core numeric type.
    pub fn numeric_unary(mut self, implementation: ScalarImpl) -> Self {
        for t in NUMERIC_TYPES {
            self = self.overload(vec![t], t, implementation);
        }
        self
    }

    /// Generic binary signature `(T, T) -> T` over numeric types.
    pub fn numeric_binary(mut self, implementation: ScalarImpl) -> Self {
        for t in NUMERIC_TYPES {
            self = self.overload(vec![t, t], t, implementation);
        }
        self
    }

    /// Generic comparison `(T, T) -> BOOLEAN` over the given types.
    pub fn comparison_over(mut self, types: &[ExprType], implementation: ScalarImpl) -> Self {
        for &t in types {
            self = self.overload(vec![t, t], ExprType::Boolean, implementation);
        }
        self
    }
}

/// Resolved call ready to be wrapped into an expression node.
#[derive(Debug, Clone)]
pub struct ResolvedFunction {
    pub signature: FunctionSignature,
    pub implementation: ScalarImpl,
    pub propagate_absent: bool,
}

/// Registry mapping function name + argument types to an implementation.
#[derive(Debug, Default, Clone)]
pub struct FunctionRegistry {
    functions: HashMap<String, Vec<Overload>>,
}

impl FunctionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, resolver: FunctionResolver) {
        self.functions
            .entry(resolver.name)
            .or_default()
            .extend(resolver.overloads);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    /// Resolve a call by name and argument types.
    pub fn resolve(&self, name: &str, arg_types: &[ExprType]) -> QueryResult<ResolvedFunction> {
        let overloads = self.functions.get(name).ok_or_else(|| {
            QueryError::semantic(format!("unsupported function name: {}", name))
        })?;

        // Exact match short-circuits.
        if let Some(exact) = overloads
            .iter()
            .find(|o| o.arg_types.as_slice() == arg_types)
        {
            return Ok(Self::resolved(name, exact));
        }

        // Compatible matches scored by coercion count; lowest cost wins and
        // registration order breaks ties.
        let mut best: Option<(usize, &Overload)> = None;
        for overload in overloads {
            if overload.arg_types.len() != arg_types.len() {
                continue;
            }
            let compatible = overload
                .arg_types
                .iter()
                .zip(arg_types)
                .all(|(param, arg)| param.is_compatible(*arg));
            if !compatible {
                continue;
            }
            let cost = overload
                .arg_types
                .iter()
                .zip(arg_types)
                .filter(|(param, arg)| *param != *arg)
                .count();
            match best {
                Some((best_cost, _)) if best_cost <= cost => {}
                _ => best = Some((cost, overload)),
            }
        }

        match best {
            Some((_, overload)) => Ok(Self::resolved(name, overload)),
            None => Err(QueryError::semantic(format!(
                "function {} is not defined for argument types [{}]",
                name,
                arg_types
                    .iter()
                    .map(|t| t.to_string())
                    .collect::<Vec<_>>()
                    .join(", ")
            ))),
        }
    }

    /// Resolve and wrap into a function expression node in one step.
    pub fn build(
        &self,
        name: &str,
        args: Vec<Expression>,
        arg_types: &[ExprType],
    ) -> QueryResult<Expression> {
        let resolved = self.resolve(name, arg_types)?;
        Ok(Expression::Function(FunctionExpr {
            signature: resolved.signature,
            implementation: resolved.implementation,
            propagate_absent: resolved.propagate_absent,
            args,
        }))
    }

    fn resolved(name: &str, overload: &Overload) -> ResolvedFunction {
        ResolvedFunction {
            signature: FunctionSignature::new(
                name,
                overload.arg_types.clone(),
                overload.return_type,
            ),
            implementation: overload.implementation,
            propagate_absent: overload.propagate_absent,
        }
    }
}
