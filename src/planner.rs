//! Logical plans and the rule-based optimizer.
//!
//! Logical plans are storage-agnostic relational trees produced by the
//! analyzer. The optimizer rewrites them bottom-up with a fixed rule list
//! until a fixpoint (or an iteration cap) is reached; storage engines may
//! layer their own rules on top through `Table::optimize`.

pub mod logical;
pub mod optimizer;

pub use logical::{LogicalPlan, TableHandle, WindowFunction, WindowSpec};
pub use optimizer::{LogicalOptimizer, OptimizerRule};
