//! Physical operators for query execution.
//!
//! This module implements the Volcano-style pull model: each operator
//! produces rows one at a time via `next()`, composing into a pipeline.
//! `open()` must be called before the first `next()`, and `close()` must run
//! on every exit path (success, error, abort) to release scan resources.
//!
//! Aggregation and sort are deliberately blocking, materializing operators;
//! everything else streams.

pub mod aggregate;
pub mod dedupe;
pub mod eval;
pub mod filter;
pub mod limit;
pub mod project;
pub mod rounding;
pub mod sort;
pub mod values;
pub mod window;

use crate::data::types::ExprType;
use crate::data::BindingTuple;
use crate::error::{QueryError, QueryResult};
use crate::planner::logical::LogicalPlan;
use serde::Serialize;

pub use aggregate::AggregationOperator;
pub use dedupe::DedupeOperator;
pub use eval::EvalOperator;
pub use filter::FilterOperator;
pub use limit::LimitOperator;
pub use project::ProjectOperator;
pub use sort::SortOperator;
pub use values::ValuesOperator;
pub use window::WindowOperator;

/// One column of an operator's output schema.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Column {
    pub name: String,
    pub expr_type: ExprType,
}

impl Column {
    pub fn new(name: impl Into<String>, expr_type: ExprType) -> Self {
        Self {
            name: name.into(),
            expr_type,
        }
    }
}

/// Serializable node of an explain tree.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExplainNode {
    pub name: String,
    pub description: String,
    pub children: Vec<ExplainNode>,
}

/// Pull-based physical operator.
///
/// Lifecycle: `open()` before the first `next()`; `close()` after
/// exhaustion or on error. Operator trees are owned by a single query
/// execution and never reused.
pub trait PhysicalPlan: Send {
    /// Prepare for iteration. Blocking operators drain their input here.
    fn open(&mut self) -> QueryResult<()>;

    /// Next row, or `None` when exhausted.
    fn next(&mut self) -> QueryResult<Option<BindingTuple>>;

    /// Release resources. Must be idempotent.
    fn close(&mut self);

    fn schema(&self) -> Vec<Column>;

    /// Node for the explain tree.
    fn explain_node(&self) -> ExplainNode;
}

/// Leaf scan over the backing store. No children; `explain()` must
/// describe the concrete request issued to the store.
pub trait TableScanOperator: PhysicalPlan {
    fn explain(&self) -> String;
}

/// Compile the generic portion of a logical plan into operators, handing
/// leaf nodes (relations and pushdown scans) to the storage-supplied
/// builder. Storage `implement` methods are expected to delegate here for
/// everything they do not execute natively.
pub fn implement_with(
    plan: &LogicalPlan,
    leaf: &dyn Fn(&LogicalPlan) -> QueryResult<Box<dyn PhysicalPlan>>,
) -> QueryResult<Box<dyn PhysicalPlan>> {
    match plan {
        LogicalPlan::Relation { .. } | LogicalPlan::IndexScan { .. } => leaf(plan),

        LogicalPlan::Filter { input, predicate } => Ok(Box::new(FilterOperator::new(
            implement_with(input, leaf)?,
            predicate.clone(),
        ))),

        LogicalPlan::Project { input, projections } => Ok(Box::new(ProjectOperator::new(
            implement_with(input, leaf)?,
            projections.clone(),
        ))),

        LogicalPlan::Sort { input, sort_list } => Ok(Box::new(SortOperator::new(
            implement_with(input, leaf)?,
            sort_list.clone(),
        ))),

        LogicalPlan::Limit {
            input,
            limit,
            offset,
        } => Ok(Box::new(LimitOperator::new(
            implement_with(input, leaf)?,
            *limit,
            *offset,
        ))),

        LogicalPlan::Eval { input, expressions } => Ok(Box::new(EvalOperator::new(
            implement_with(input, leaf)?,
            expressions.clone(),
        ))),

        LogicalPlan::Dedupe { input, fields } => Ok(Box::new(DedupeOperator::new(
            implement_with(input, leaf)?,
            fields.clone(),
        ))),

        LogicalPlan::Values { names, rows } => {
            Ok(Box::new(ValuesOperator::new(names.clone(), rows.clone())))
        }

        LogicalPlan::Aggregation {
            input,
            aggregators,
            group_by,
        } => Ok(Box::new(AggregationOperator::new(
            implement_with(input, leaf)?,
            aggregators.clone(),
            group_by.clone(),
        ))),

        LogicalPlan::Window { input, spec } => {
            // Window frames assume input sorted by partition keys then the
            // window's sort keys.
            let mut sort_list = Vec::new();
            for key in &spec.partition_by {
                sort_list.push((key.clone(), crate::ast::expr::SortOption::asc()));
            }
            sort_list.extend(spec.sort_list.clone());
            let mut child = implement_with(input, leaf)?;
            if !sort_list.is_empty() {
                child = Box::new(SortOperator::new(child, sort_list));
            }
            Ok(Box::new(WindowOperator::new(child, spec.clone())))
        }
    }
}

/// Shorthand for an unsupported-leaf error inside `implement` methods.
pub fn unsupported_leaf(plan: &LogicalPlan) -> QueryError {
    QueryError::unsupported(format!("no physical operator for {}", plan.label()))
}
