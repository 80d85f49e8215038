//! Rule-based logical plan rewriting.
//!
//! Rules are applied bottom-up over the tree, repeatedly, until no rule
//! changes the plan or the iteration cap is reached. Rules must be
//! monotonic (merge, push down, never re-split) so the fixpoint exists; the
//! cap guarantees termination regardless. A rule whose structural
//! precondition is unmet returns `None` instead of rewriting vacuously.

use crate::ast::expr::SortOption;
use crate::data::types::ExprType;
use crate::expression::expr::Expression;
use crate::expression::function::FunctionRegistry;
use crate::planner::logical::LogicalPlan;
use log::debug;

/// Upper bound on full rewrite passes over one plan.
const MAX_ITERATIONS: usize = 10;

/// One rewrite rule: pattern match plus transform.
pub trait OptimizerRule {
    fn name(&self) -> &'static str;

    /// Rewritten plan, or `None` when the node does not match.
    fn apply(&self, plan: &LogicalPlan) -> Option<LogicalPlan>;
}

/// Fixed ordered rule list applied bottom-up to a fixpoint.
pub struct LogicalOptimizer {
    rules: Vec<Box<dyn OptimizerRule>>,
}

impl LogicalOptimizer {
    pub fn new(rules: Vec<Box<dyn OptimizerRule>>) -> Self {
        Self { rules }
    }

    /// The generic rule set: filter merging and push-downs. Storage
    /// engines layer their own rules via `Table::optimize`.
    pub fn with_default_rules(registry: FunctionRegistry) -> Self {
        Self::new(vec![
            Box::new(MergeFilters { registry }),
            Box::new(PushFilterUnderSort),
            Box::new(PushProjectUnderSort),
        ])
    }

    pub fn optimize(&self, plan: LogicalPlan) -> LogicalPlan {
        let mut current = plan;
        for iteration in 0..MAX_ITERATIONS {
            let next = self.rewrite(current.clone());
            if next == current {
                debug!("optimizer reached fixpoint after {} pass(es)", iteration);
                return current;
            }
            current = next;
        }
        debug!("optimizer stopped at iteration cap {}", MAX_ITERATIONS);
        current
    }

    /// One bottom-up pass: children first, then the first matching rule at
    /// this node.
    fn rewrite(&self, plan: LogicalPlan) -> LogicalPlan {
        let plan = match plan.input() {
            Some(child) => {
                let rewritten = self.rewrite(child.clone());
                plan.with_input(rewritten)
            }
            None => plan,
        };
        for rule in &self.rules {
            if let Some(next) = rule.apply(&plan) {
                if next != plan {
                    debug!("rule {} fired: {}", rule.name(), next.label());
                    return next;
                }
            }
        }
        plan
    }
}

/// `Filter(p2, Filter(p1, x))` becomes `Filter(and(p2, p1), x)`, outer
/// predicate first.
pub struct MergeFilters {
    registry: FunctionRegistry,
}

impl MergeFilters {
    pub fn new(registry: FunctionRegistry) -> Self {
        Self { registry }
    }
}

impl OptimizerRule for MergeFilters {
    fn name(&self) -> &'static str {
        "MergeFilters"
    }

    fn apply(&self, plan: &LogicalPlan) -> Option<LogicalPlan> {
        let LogicalPlan::Filter { input, predicate: outer } = plan else {
            return None;
        };
        let LogicalPlan::Filter {
            input: inner_input,
            predicate: inner,
        } = input.as_ref()
        else {
            return None;
        };
        let merged = self
            .registry
            .build(
                "and",
                vec![outer.clone(), inner.clone()],
                &[ExprType::Boolean, ExprType::Boolean],
            )
            .ok()?;
        Some(LogicalPlan::Filter {
            input: inner_input.clone(),
            predicate: merged,
        })
    }
}

/// `Filter(p, Sort(s, x))` becomes `Sort(s, Filter(p, x))`: filtering
/// before sorting is always safe and cheaper.
pub struct PushFilterUnderSort;

impl OptimizerRule for PushFilterUnderSort {
    fn name(&self) -> &'static str {
        "PushFilterUnderSort"
    }

    fn apply(&self, plan: &LogicalPlan) -> Option<LogicalPlan> {
        let LogicalPlan::Filter { input, predicate } = plan else {
            return None;
        };
        let LogicalPlan::Sort {
            input: sort_input,
            sort_list,
        } = input.as_ref()
        else {
            return None;
        };
        Some(LogicalPlan::Sort {
            input: Box::new(LogicalPlan::Filter {
                input: sort_input.clone(),
                predicate: predicate.clone(),
            }),
            sort_list: sort_list.clone(),
        })
    }
}

/// `Project(cols, Sort(s, x))` becomes `Sort(s, Project(cols, x))`, but
/// only when every sort key is still available after projection.
pub struct PushProjectUnderSort;

impl PushProjectUnderSort {
    fn sort_keys_survive(
        projections: &[crate::expression::expr::NamedExpr],
        sort_list: &[(Expression, SortOption)],
    ) -> bool {
        // The key must stay resolvable under its own name above the
        // projection; a projection that computes the key under a different
        // name drops the original column.
        sort_list.iter().all(|(key, _)| {
            projections
                .iter()
                .any(|p| &p.expr == key && p.name == key.output_name())
        })
    }
}

impl OptimizerRule for PushProjectUnderSort {
    fn name(&self) -> &'static str {
        "PushProjectUnderSort"
    }

    fn apply(&self, plan: &LogicalPlan) -> Option<LogicalPlan> {
        let LogicalPlan::Project { input, projections } = plan else {
            return None;
        };
        let LogicalPlan::Sort {
            input: sort_input,
            sort_list,
        } = input.as_ref()
        else {
            return None;
        };
        if !Self::sort_keys_survive(projections, sort_list) {
            return None;
        }
        Some(LogicalPlan::Sort {
            input: Box::new(LogicalPlan::Project {
                input: sort_input.clone(),
                projections: projections.clone(),
            }),
            sort_list: sort_list.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::types::ExprType;
    use crate::data::value::ExprValue;
    use crate::expression::expr::NamedExpr;
    use crate::expression::scalar::default_registry;
    use crate::storage::memory::MemTable;
    use crate::storage::Table;
    use std::sync::Arc;

    fn table() -> Arc<dyn Table> {
        Arc::new(MemTable::new(
            [("integer_value".to_string(), ExprType::Integer)]
                .into_iter()
                .collect(),
            vec![],
        ))
    }

    fn eq_predicate(field: &str, value: i32) -> Expression {
        default_registry()
            .build(
                "=",
                vec![
                    Expression::reference(field, ExprType::Integer),
                    Expression::literal(ExprValue::Integer(value)),
                ],
                &[ExprType::Integer, ExprType::Integer],
            )
            .unwrap()
    }

    fn optimizer() -> LogicalOptimizer {
        LogicalOptimizer::with_default_rules(default_registry())
    }

    #[test]
    fn test_merge_adjacent_filters() {
        let t = table();
        let p1 = eq_predicate("integer_value", 1);
        let p2 = eq_predicate("integer_value", 2);
        let plan = LogicalPlan::relation("schema", t.clone())
            .filter(p1.clone())
            .filter(p2.clone());

        let merged_predicate = default_registry()
            .build(
                "and",
                vec![p2, p1],
                &[ExprType::Boolean, ExprType::Boolean],
            )
            .unwrap();
        let expected = LogicalPlan::relation("schema", t).filter(merged_predicate);

        assert_eq!(optimizer().optimize(plan), expected);
    }

    #[test]
    fn test_push_filter_under_sort() {
        let t = table();
        let predicate = eq_predicate("integer_value", 1);
        let sort_list = vec![(
            Expression::reference("integer_value", ExprType::Integer),
            SortOption::asc(),
        )];

        let plan = LogicalPlan::relation("schema", t.clone())
            .sort(sort_list.clone())
            .filter(predicate.clone());
        let expected = LogicalPlan::relation("schema", t)
            .filter(predicate)
            .sort(sort_list);

        assert_eq!(optimizer().optimize(plan), expected);
    }

    #[test]
    fn test_push_project_under_sort_when_keys_survive() {
        let t = table();
        let key = Expression::reference("integer_value", ExprType::Integer);
        let sort_list = vec![(key.clone(), SortOption::asc())];
        let projections = vec![NamedExpr::new("integer_value", key)];

        let plan = LogicalPlan::relation("schema", t.clone())
            .sort(sort_list.clone())
            .project(projections.clone());
        let expected = LogicalPlan::relation("schema", t)
            .project(projections)
            .sort(sort_list);

        assert_eq!(optimizer().optimize(plan), expected);
    }

    #[test]
    fn test_project_stays_put_when_sort_key_dropped() {
        let t = table();
        let sort_list = vec![(
            Expression::reference("other_field", ExprType::Integer),
            SortOption::asc(),
        )];
        let projections = vec![NamedExpr::new(
            "integer_value",
            Expression::reference("integer_value", ExprType::Integer),
        )];

        let plan = LogicalPlan::relation("schema", t)
            .sort(sort_list)
            .project(projections);

        // Precondition unmet: the rule must be a no-op.
        assert_eq!(optimizer().optimize(plan.clone()), plan);
    }

    #[test]
    fn test_project_stays_put_when_sort_key_renamed() {
        // `renamed_value := integer_value` computes the key but drops the
        // original column, so the key would not resolve above a pushed
        // projection.
        let t = table();
        let key = Expression::reference("integer_value", ExprType::Integer);
        let sort_list = vec![(key.clone(), SortOption::asc())];
        let projections = vec![NamedExpr::new("renamed_value", key)];

        let plan = LogicalPlan::relation("schema", t)
            .sort(sort_list)
            .project(projections);

        assert_eq!(optimizer().optimize(plan.clone()), plan);
    }

    #[test]
    fn test_combined_rules_reach_fixpoint() {
        // Filter over Filter over Sort: filters merge, then push below sort.
        let t = table();
        let p1 = eq_predicate("integer_value", 1);
        let p2 = eq_predicate("integer_value", 2);
        let sort_list = vec![(
            Expression::reference("integer_value", ExprType::Integer),
            SortOption::asc(),
        )];

        let plan = LogicalPlan::relation("schema", t.clone())
            .sort(sort_list.clone())
            .filter(p1.clone())
            .filter(p2.clone());

        let merged = default_registry()
            .build("and", vec![p2, p1], &[ExprType::Boolean, ExprType::Boolean])
            .unwrap();
        let expected = LogicalPlan::relation("schema", t)
            .filter(merged)
            .sort(sort_list);

        assert_eq!(optimizer().optimize(plan), expected);
    }
}
