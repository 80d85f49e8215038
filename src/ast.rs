//! Parser-facing untyped syntax trees.
//!
//! The parser itself is an external collaborator; it hands the engine these
//! unresolved trees, which carry names instead of bindings and have no type
//! information. The analyzer turns them into typed expressions and a typed
//! logical plan.

pub mod expr;
pub mod plan;

pub use expr::{SortOption, UnresolvedExpr};
pub use plan::UnresolvedPlan;
