//! Typed runtime data model.
//!
//! This module provides:
//! - The type lattice used by analysis and function resolution
//! - The tagged runtime value produced by expression evaluation
//! - The per-row binding environment expressions evaluate against
//! - Natural ordering over values with NULL placement decorators

pub mod binding;
pub mod ordering;
pub mod types;
pub mod value;

pub use binding::BindingTuple;
pub use ordering::ValueOrdering;
pub use types::ExprType;
pub use value::ExprValue;
