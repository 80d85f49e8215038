//! Unresolved plan nodes (query clauses).

use crate::ast::expr::{SortOption, UnresolvedExpr};
use crate::data::value::ExprValue;

/// Untyped relational tree produced by the parser.
#[derive(Debug, Clone, PartialEq)]
pub enum UnresolvedPlan {
    /// Scan of a named index/table.
    Relation { name: String },

    /// Keep rows satisfying the predicate.
    Filter {
        input: Box<UnresolvedPlan>,
        predicate: UnresolvedExpr,
    },

    /// Grouped aggregation; group items may include a span bucket.
    Aggregation {
        input: Box<UnresolvedPlan>,
        aggregators: Vec<UnresolvedExpr>,
        group_by: Vec<UnresolvedExpr>,
    },

    /// Sort by one or more keys.
    Sort {
        input: Box<UnresolvedPlan>,
        sort_list: Vec<(UnresolvedExpr, SortOption)>,
    },

    /// Project named output columns.
    Project {
        input: Box<UnresolvedPlan>,
        projections: Vec<UnresolvedExpr>,
    },

    /// Keep at most `limit` rows after skipping `offset`.
    Limit {
        input: Box<UnresolvedPlan>,
        limit: usize,
        offset: usize,
    },

    /// Bind computed columns onto each row.
    Eval {
        input: Box<UnresolvedPlan>,
        expressions: Vec<UnresolvedExpr>,
    },

    /// Drop rows duplicating previously seen values of the listed fields.
    Dedupe {
        input: Box<UnresolvedPlan>,
        fields: Vec<UnresolvedExpr>,
    },

    /// Inline literal rows (queries without a source relation).
    Values { rows: Vec<Vec<ExprValue>> },

    /// Window functions computed over sorted partitions.
    Window {
        input: Box<UnresolvedPlan>,
        functions: Vec<UnresolvedExpr>,
    },
}

impl UnresolvedPlan {
    pub fn relation(name: impl Into<String>) -> Self {
        UnresolvedPlan::Relation { name: name.into() }
    }

    pub fn filter(self, predicate: UnresolvedExpr) -> Self {
        UnresolvedPlan::Filter {
            input: Box::new(self),
            predicate,
        }
    }

    pub fn aggregate(self, aggregators: Vec<UnresolvedExpr>, group_by: Vec<UnresolvedExpr>) -> Self {
        UnresolvedPlan::Aggregation {
            input: Box::new(self),
            aggregators,
            group_by,
        }
    }

    pub fn sort(self, sort_list: Vec<(UnresolvedExpr, SortOption)>) -> Self {
        UnresolvedPlan::Sort {
            input: Box::new(self),
            sort_list,
        }
    }

    pub fn project(self, projections: Vec<UnresolvedExpr>) -> Self {
        UnresolvedPlan::Project {
            input: Box::new(self),
            projections,
        }
    }

    pub fn limit(self, limit: usize, offset: usize) -> Self {
        UnresolvedPlan::Limit {
            input: Box::new(self),
            limit,
            offset,
        }
    }

    pub fn eval(self, expressions: Vec<UnresolvedExpr>) -> Self {
        UnresolvedPlan::Eval {
            input: Box::new(self),
            expressions,
        }
    }

    pub fn dedupe(self, fields: Vec<UnresolvedExpr>) -> Self {
        UnresolvedPlan::Dedupe {
            input: Box::new(self),
            fields,
        }
    }

    pub fn window(self, functions: Vec<UnresolvedExpr>) -> Self {
        UnresolvedPlan::Window {
            input: Box::new(self),
            functions,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clause_chaining() {
        // source=t | where age = 1 | fields age
        let plan = UnresolvedPlan::relation("t")
            .filter(UnresolvedExpr::attr("age").eq(UnresolvedExpr::literal(ExprValue::Integer(1))))
            .project(vec![UnresolvedExpr::attr("age")]);

        match plan {
            UnresolvedPlan::Project { input, projections } => {
                assert_eq!(projections.len(), 1);
                assert!(matches!(*input, UnresolvedPlan::Filter { .. }));
            }
            _ => panic!("expected project at the root"),
        }
    }
}
