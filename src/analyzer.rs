//! Semantic analysis: binds unresolved syntax trees to typed expressions
//! and a typed logical plan.
//!
//! Analysis walks the plan top-down so each relational node can shape the
//! environment its parent sees, while expressions inside a node resolve
//! bottom-up against that environment and the function registry. Any
//! unresolvable name or call fails the whole query with a semantic error;
//! no partial plan escapes.

pub mod symbol;

use crate::ast::expr::{SortOption, UnresolvedExpr};
use crate::ast::plan::UnresolvedPlan;
use crate::data::types::ExprType;
use crate::error::{QueryError, QueryResult};
use crate::expression::aggregate::{AggKind, Aggregator, NamedAggregator};
use crate::expression::expr::{Expression, NamedExpr};
use crate::expression::function::FunctionRegistry;
use crate::planner::logical::{LogicalPlan, WindowFunction, WindowSpec};
use crate::storage::StorageEngine;
use log::debug;
use std::sync::Arc;
use symbol::{Namespace, TypeEnvironment};

/// Per-query semantic analyzer.
pub struct Analyzer {
    storage: Arc<dyn StorageEngine>,
    registry: FunctionRegistry,
}

impl Analyzer {
    pub fn new(storage: Arc<dyn StorageEngine>, registry: FunctionRegistry) -> Self {
        Self { storage, registry }
    }

    /// Analyze one query into a typed logical plan.
    pub fn analyze(&self, plan: &UnresolvedPlan) -> QueryResult<LogicalPlan> {
        let (logical, _env) = self.analyze_plan(plan)?;
        debug!("analyzed plan: {}", logical.label());
        Ok(logical)
    }

    /// Returns the typed node plus the environment visible above it.
    fn analyze_plan(&self, plan: &UnresolvedPlan) -> QueryResult<(LogicalPlan, TypeEnvironment)> {
        match plan {
            UnresolvedPlan::Relation { name } => {
                let table = self.storage.table(name).ok_or_else(|| {
                    QueryError::semantic(format!("no such table/index [{}]", name))
                })?;
                let mut env = TypeEnvironment::new();
                env.define(Namespace::IndexName, name.clone(), ExprType::Struct);
                for (field, field_type) in table.field_types() {
                    env.define(Namespace::FieldName, field, field_type);
                }
                Ok((LogicalPlan::relation(name.clone(), table), env))
            }

            UnresolvedPlan::Filter { input, predicate } => {
                let (child, env) = self.analyze_plan(input)?;
                let predicate = self.analyze_expr(predicate, &env)?;
                self.check_boolean(&predicate, "filter predicate")?;
                Ok((child.filter(predicate), env))
            }

            UnresolvedPlan::Sort { input, sort_list } => {
                let (child, env) = self.analyze_plan(input)?;
                let sort_list = self.analyze_sort_list(sort_list, &env)?;
                Ok((child.sort(sort_list), env))
            }

            UnresolvedPlan::Limit {
                input,
                limit,
                offset,
            } => {
                let (child, env) = self.analyze_plan(input)?;
                Ok((child.limit(*limit, *offset), env))
            }

            UnresolvedPlan::Project { input, projections } => {
                let (child, env) = self.analyze_plan(input)?;
                let mut named = Vec::with_capacity(projections.len());
                let mut output = TypeEnvironment::new();
                for projection in projections {
                    let expr = self.analyze_expr(projection, &env)?;
                    let name = expr.output_name();
                    output.define(Namespace::FieldName, name.clone(), expr.expr_type());
                    named.push(NamedExpr::new(name, expr));
                }
                Ok((child.project(named), output))
            }

            UnresolvedPlan::Eval { input, expressions } => {
                let (child, mut env) = self.analyze_plan(input)?;
                let mut named = Vec::with_capacity(expressions.len());
                for expression in expressions {
                    let expr = self.analyze_expr(expression, &env)?;
                    let name = expr.output_name();
                    // Later eval columns may refer to earlier ones.
                    env.define(Namespace::FieldName, name.clone(), expr.expr_type());
                    named.push(NamedExpr::new(name, expr));
                }
                Ok((
                    LogicalPlan::Eval {
                        input: Box::new(child),
                        expressions: named,
                    },
                    env,
                ))
            }

            UnresolvedPlan::Dedupe { input, fields } => {
                let (child, env) = self.analyze_plan(input)?;
                let fields = fields
                    .iter()
                    .map(|f| self.analyze_expr(f, &env))
                    .collect::<QueryResult<Vec<_>>>()?;
                Ok((
                    LogicalPlan::Dedupe {
                        input: Box::new(child),
                        fields,
                    },
                    env,
                ))
            }

            UnresolvedPlan::Aggregation {
                input,
                aggregators,
                group_by,
            } => {
                let (child, env) = self.analyze_plan(input)?;
                let mut output = TypeEnvironment::new();

                let mut group_exprs = Vec::with_capacity(group_by.len());
                for item in group_by {
                    let expr = self.analyze_expr(item, &env)?;
                    let name = expr.output_name();
                    output.define(Namespace::FieldName, name.clone(), expr.expr_type());
                    group_exprs.push(NamedExpr::new(name, expr));
                }

                let mut named_aggs = Vec::with_capacity(aggregators.len());
                for item in aggregators {
                    let (name, aggregator) = self.analyze_aggregate(item, &env)?;
                    output.define(
                        Namespace::FieldName,
                        name.clone(),
                        aggregator.return_type(),
                    );
                    named_aggs.push(NamedAggregator::new(name, aggregator));
                }

                Ok((
                    LogicalPlan::Aggregation {
                        input: Box::new(child),
                        aggregators: named_aggs,
                        group_by: group_exprs,
                    },
                    output,
                ))
            }

            UnresolvedPlan::Window { input, functions } => {
                let (mut child, mut env) = self.analyze_plan(input)?;
                for function in functions {
                    let spec = self.analyze_window(function, &env)?;
                    env.define(Namespace::FieldName, spec.name.clone(), spec.return_type());
                    child = LogicalPlan::Window {
                        input: Box::new(child),
                        spec,
                    };
                }
                Ok((child, env))
            }

            UnresolvedPlan::Values { rows } => {
                let width = rows.first().map(|r| r.len()).unwrap_or(0);
                let names: Vec<String> = (0..width).map(|i| format!("c{}", i)).collect();
                let mut env = TypeEnvironment::new();
                if let Some(first) = rows.first() {
                    for (name, value) in names.iter().zip(first) {
                        env.define(Namespace::FieldName, name.clone(), value.expr_type());
                    }
                }
                Ok((
                    LogicalPlan::Values {
                        names,
                        rows: rows.clone(),
                    },
                    env,
                ))
            }
        }
    }

    /// Resolve one untyped expression bottom-up.
    fn analyze_expr(
        &self,
        expr: &UnresolvedExpr,
        env: &TypeEnvironment,
    ) -> QueryResult<Expression> {
        match expr {
            UnresolvedExpr::Literal(value) => Ok(Expression::literal(value.clone())),

            UnresolvedExpr::Attribute(name) => {
                let field_type = env.resolve(Namespace::FieldName, name).ok_or_else(|| {
                    QueryError::semantic(format!("can't resolve symbol field [{}]", name))
                })?;
                Ok(Expression::reference(name.clone(), field_type))
            }

            UnresolvedExpr::Function { name, args } => {
                let args = args
                    .iter()
                    .map(|a| self.analyze_expr(a, env))
                    .collect::<QueryResult<Vec<_>>>()?;
                let arg_types: Vec<ExprType> = args.iter().map(|a| a.expr_type()).collect();
                self.registry.build(name, args, &arg_types)
            }

            UnresolvedExpr::Alias { name, expr } => {
                let inner = self.analyze_expr(expr, env)?;
                Ok(Expression::named(name.clone(), inner))
            }

            UnresolvedExpr::Span {
                field,
                interval,
                unit,
            } => {
                let field = self.analyze_expr(field, env)?;
                Ok(Expression::span(field, interval.clone(), *unit))
            }

            UnresolvedExpr::AggregateCall { name, .. } => Err(QueryError::semantic(format!(
                "aggregate function {} is not allowed in this context",
                name
            ))),

            UnresolvedExpr::WindowCall { .. } => Err(QueryError::semantic(
                "window function is not allowed in this context".to_string(),
            )),
        }
    }

    /// Aggregate item: an aggregate call, optionally aliased.
    fn analyze_aggregate(
        &self,
        expr: &UnresolvedExpr,
        env: &TypeEnvironment,
    ) -> QueryResult<(String, Aggregator)> {
        match expr {
            UnresolvedExpr::Alias { name, expr } => {
                let (_, aggregator) = self.analyze_aggregate(expr, env)?;
                Ok((name.clone(), aggregator))
            }
            UnresolvedExpr::AggregateCall { name, arg } => {
                let kind = AggKind::from_name(name).ok_or_else(|| {
                    QueryError::semantic(format!("unsupported aggregation function {}", name))
                })?;
                let aggregator = match arg {
                    Some(arg) => {
                        let arg = self.analyze_expr(arg, env)?;
                        if !matches!(kind, AggKind::Count | AggKind::Min | AggKind::Max)
                            && !arg.expr_type().is_numeric()
                            && arg.expr_type() != ExprType::Undefined
                        {
                            return Err(QueryError::semantic(format!(
                                "function {} expects a numeric argument, got {}",
                                name,
                                arg.expr_type()
                            )));
                        }
                        Aggregator::new(kind, arg)
                    }
                    None => Aggregator::count_star(),
                };
                let display = format!("{}", aggregator);
                Ok((display, aggregator))
            }
            other => Err(QueryError::semantic(format!(
                "expected an aggregate call, got {:?}",
                other
            ))),
        }
    }

    /// Window item: a window call, optionally aliased.
    fn analyze_window(
        &self,
        expr: &UnresolvedExpr,
        env: &TypeEnvironment,
    ) -> QueryResult<WindowSpec> {
        match expr {
            UnresolvedExpr::Alias { name, expr } => {
                let mut spec = self.analyze_window(expr, env)?;
                spec.name = name.clone();
                Ok(spec)
            }
            UnresolvedExpr::WindowCall {
                function,
                partition_by,
                sort_list,
            } => {
                let partition_by = partition_by
                    .iter()
                    .map(|p| self.analyze_expr(p, env))
                    .collect::<QueryResult<Vec<_>>>()?;
                let sort_list = self.analyze_sort_list(sort_list, env)?;
                let (name, window_function) = match function.as_ref() {
                    UnresolvedExpr::Function { name, args } if args.is_empty() => {
                        let f = match name.as_str() {
                            "row_number" => WindowFunction::RowNumber,
                            "rank" => WindowFunction::Rank,
                            "dense_rank" => WindowFunction::DenseRank,
                            other => {
                                return Err(QueryError::semantic(format!(
                                    "unsupported window function {}",
                                    other
                                )))
                            }
                        };
                        (format!("{}()", name), f)
                    }
                    aggregate @ UnresolvedExpr::AggregateCall { .. } => {
                        let (name, aggregator) = self.analyze_aggregate(aggregate, env)?;
                        (name, WindowFunction::Aggregate(aggregator))
                    }
                    other => {
                        return Err(QueryError::semantic(format!(
                            "expected a window function, got {:?}",
                            other
                        )))
                    }
                };
                Ok(WindowSpec {
                    name,
                    function: window_function,
                    partition_by,
                    sort_list,
                })
            }
            other => Err(QueryError::semantic(format!(
                "expected a window call, got {:?}",
                other
            ))),
        }
    }

    fn analyze_sort_list(
        &self,
        sort_list: &[(UnresolvedExpr, SortOption)],
        env: &TypeEnvironment,
    ) -> QueryResult<Vec<(Expression, SortOption)>> {
        sort_list
            .iter()
            .map(|(expr, option)| Ok((self.analyze_expr(expr, env)?, *option)))
            .collect()
    }

    fn check_boolean(&self, expr: &Expression, context: &str) -> QueryResult<()> {
        let t = expr.expr_type();
        if ExprType::Boolean.is_compatible(t) {
            Ok(())
        } else {
            Err(QueryError::semantic(format!(
                "{} must be BOOLEAN, got {}",
                context, t
            )))
        }
    }
}

impl WindowSpec {
    /// Output type of the window column.
    pub fn return_type(&self) -> ExprType {
        match &self.function {
            WindowFunction::RowNumber | WindowFunction::Rank | WindowFunction::DenseRank => {
                ExprType::Long
            }
            WindowFunction::Aggregate(aggregator) => aggregator.return_type(),
        }
    }
}
