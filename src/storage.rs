//! Storage abstraction.
//!
//! The engine core is storage-agnostic: the analyzer resolves table names
//! through a [`StorageEngine`], and the planner hands the optimized plan to
//! the [`Table`] that owns the scanned data. A table may rewrite the plan
//! to push work (filters, limits, sorts) into its native scan before
//! compiling the rest with the generic operators.

pub mod memory;

use crate::data::types::ExprType;
use crate::error::QueryResult;
use crate::executor::PhysicalPlan;
use crate::planner::logical::LogicalPlan;
use std::sync::Arc;

/// Named collection of tables backing queries.
pub trait StorageEngine: Send + Sync {
    /// Look up a table by name; `None` when it does not exist.
    fn table(&self, name: &str) -> Option<Arc<dyn Table>>;
}

/// One scannable relation.
pub trait Table: Send + Sync {
    /// Field name to type mapping exposed to the analyzer.
    fn field_types(&self) -> Vec<(String, ExprType)>;

    /// Storage-specific plan rewriting (pushdowns). The default pushes
    /// nothing.
    fn optimize(&self, plan: LogicalPlan) -> LogicalPlan {
        plan
    }

    /// Compile the optimized plan into a physical operator tree. Non-leaf
    /// nodes are typically delegated to
    /// [`crate::executor::implement_with`].
    fn implement(&self, plan: &LogicalPlan) -> QueryResult<Box<dyn PhysicalPlan>>;
}
