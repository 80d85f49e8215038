//! Typed expression trees and their evaluation.
//!
//! This module provides:
//! - The resolved expression tree evaluated against a [`BindingTuple`]
//! - The function registry with overload resolution
//! - The built-in scalar function library
//! - Aggregators modeled as stateless descriptors plus external state
//! - Expression-tree serialization
//!
//! [`BindingTuple`]: crate::data::BindingTuple

pub mod aggregate;
pub mod expr;
pub mod function;
pub mod scalar;
pub mod serde;

pub use aggregate::{AccumulatorState, AggKind, Aggregator, NamedAggregator};
pub use expr::{
    Expression, FunctionExpr, NamedExpr, ReferenceExpr, SpanExpr, SpanUnit,
};
pub use function::{FunctionRegistry, FunctionSignature, ScalarImpl};
pub use scalar::default_registry;
pub use serde::{deserialize_expression, serialize_expression};
