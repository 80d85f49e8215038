//! Logical query plan representation.
//!
//! Each node owns its children immutably; optimizer rules build new trees
//! rather than mutating in place, which keeps rewriting backtracking-free.

use crate::ast::expr::SortOption;
use crate::data::value::ExprValue;
use crate::expression::aggregate::{Aggregator, NamedAggregator};
use crate::expression::expr::{Expression, NamedExpr};
use crate::storage::Table;
use std::fmt;
use std::sync::Arc;

/// Shared handle to a storage table carried inside plan nodes.
///
/// Equality is identity: two handles are equal when they point at the same
/// table instance, which is what plan-equivalence tests need.
#[derive(Clone)]
pub struct TableHandle(pub Arc<dyn Table>);

impl fmt::Debug for TableHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TableHandle")
    }
}

impl PartialEq for TableHandle {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

/// Window function kinds.
#[derive(Debug, Clone, PartialEq)]
pub enum WindowFunction {
    RowNumber,
    Rank,
    DenseRank,
    /// Aggregate evaluated as a window function over peer groups.
    Aggregate(Aggregator),
}

/// One window computation: output name, function, partition and sort keys.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowSpec {
    pub name: String,
    pub function: WindowFunction,
    pub partition_by: Vec<Expression>,
    pub sort_list: Vec<(Expression, SortOption)>,
}

/// Typed, storage-agnostic relational tree.
#[derive(Debug, Clone, PartialEq)]
pub enum LogicalPlan {
    Relation {
        name: String,
        table: TableHandle,
    },

    Filter {
        input: Box<LogicalPlan>,
        predicate: Expression,
    },

    Aggregation {
        input: Box<LogicalPlan>,
        aggregators: Vec<NamedAggregator>,
        group_by: Vec<NamedExpr>,
    },

    Sort {
        input: Box<LogicalPlan>,
        sort_list: Vec<(Expression, SortOption)>,
    },

    Project {
        input: Box<LogicalPlan>,
        projections: Vec<NamedExpr>,
    },

    Limit {
        input: Box<LogicalPlan>,
        limit: usize,
        offset: usize,
    },

    Eval {
        input: Box<LogicalPlan>,
        expressions: Vec<NamedExpr>,
    },

    Dedupe {
        input: Box<LogicalPlan>,
        fields: Vec<Expression>,
    },

    Values {
        names: Vec<String>,
        rows: Vec<Vec<ExprValue>>,
    },

    Window {
        input: Box<LogicalPlan>,
        spec: WindowSpec,
    },

    /// Storage-pushdown scan: operations the backing store executes
    /// natively instead of the generic operators.
    IndexScan {
        name: String,
        table: TableHandle,
        pushed_filter: Option<Expression>,
        pushed_sort: Option<Vec<(Expression, SortOption)>>,
        pushed_limit: Option<(usize, usize)>,
    },
}

impl LogicalPlan {
    pub fn relation(name: impl Into<String>, table: Arc<dyn Table>) -> Self {
        LogicalPlan::Relation {
            name: name.into(),
            table: TableHandle(table),
        }
    }

    pub fn filter(self, predicate: Expression) -> Self {
        LogicalPlan::Filter {
            input: Box::new(self),
            predicate,
        }
    }

    pub fn sort(self, sort_list: Vec<(Expression, SortOption)>) -> Self {
        LogicalPlan::Sort {
            input: Box::new(self),
            sort_list,
        }
    }

    pub fn project(self, projections: Vec<NamedExpr>) -> Self {
        LogicalPlan::Project {
            input: Box::new(self),
            projections,
        }
    }

    pub fn limit(self, limit: usize, offset: usize) -> Self {
        LogicalPlan::Limit {
            input: Box::new(self),
            limit,
            offset,
        }
    }

    /// The node's single input, if it has exactly one.
    pub fn input(&self) -> Option<&LogicalPlan> {
        match self {
            LogicalPlan::Filter { input, .. }
            | LogicalPlan::Aggregation { input, .. }
            | LogicalPlan::Sort { input, .. }
            | LogicalPlan::Project { input, .. }
            | LogicalPlan::Limit { input, .. }
            | LogicalPlan::Eval { input, .. }
            | LogicalPlan::Dedupe { input, .. }
            | LogicalPlan::Window { input, .. } => Some(input),
            LogicalPlan::Relation { .. }
            | LogicalPlan::Values { .. }
            | LogicalPlan::IndexScan { .. } => None,
        }
    }

    /// Rebuild this node with a new single input. Leaves return themselves.
    pub fn with_input(self, new_input: LogicalPlan) -> Self {
        let boxed = Box::new(new_input);
        match self {
            LogicalPlan::Filter { predicate, .. } => LogicalPlan::Filter {
                input: boxed,
                predicate,
            },
            LogicalPlan::Aggregation {
                aggregators,
                group_by,
                ..
            } => LogicalPlan::Aggregation {
                input: boxed,
                aggregators,
                group_by,
            },
            LogicalPlan::Sort { sort_list, .. } => LogicalPlan::Sort {
                input: boxed,
                sort_list,
            },
            LogicalPlan::Project { projections, .. } => LogicalPlan::Project {
                input: boxed,
                projections,
            },
            LogicalPlan::Limit { limit, offset, .. } => LogicalPlan::Limit {
                input: boxed,
                limit,
                offset,
            },
            LogicalPlan::Eval { expressions, .. } => LogicalPlan::Eval {
                input: boxed,
                expressions,
            },
            LogicalPlan::Dedupe { fields, .. } => LogicalPlan::Dedupe {
                input: boxed,
                fields,
            },
            LogicalPlan::Window { spec, .. } => LogicalPlan::Window { input: boxed, spec },
            leaf => leaf,
        }
    }

    /// Node label for plan rendering and explain output.
    pub fn label(&self) -> String {
        match self {
            LogicalPlan::Relation { name, .. } => format!("Relation[{}]", name),
            LogicalPlan::Filter { predicate, .. } => format!("Filter[{}]", predicate),
            LogicalPlan::Aggregation {
                aggregators,
                group_by,
                ..
            } => format!(
                "Aggregation[aggs={}, groups={}]",
                aggregators.len(),
                group_by.len()
            ),
            LogicalPlan::Sort { sort_list, .. } => format!("Sort[keys={}]", sort_list.len()),
            LogicalPlan::Project { projections, .. } => {
                format!("Project[cols={}]", projections.len())
            }
            LogicalPlan::Limit { limit, offset, .. } => {
                format!("Limit[{}, offset={}]", limit, offset)
            }
            LogicalPlan::Eval { expressions, .. } => format!("Eval[cols={}]", expressions.len()),
            LogicalPlan::Dedupe { fields, .. } => format!("Dedupe[fields={}]", fields.len()),
            LogicalPlan::Values { rows, .. } => format!("Values[rows={}]", rows.len()),
            LogicalPlan::Window { spec, .. } => format!("Window[{}]", spec.name),
            LogicalPlan::IndexScan {
                name,
                pushed_filter,
                pushed_limit,
                ..
            } => format!(
                "IndexScan[{}, filter={}, limit={:?}]",
                name,
                pushed_filter
                    .as_ref()
                    .map(|p| p.to_string())
                    .unwrap_or_else(|| "none".to_string()),
                pushed_limit
            ),
        }
    }
}
