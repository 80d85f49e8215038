//! Query service: the front door wiring the pipeline together.
//!
//! `execute` runs analyze → generic optimize → storage optimize →
//! storage implement → scheduled execution. Planning errors are returned
//! synchronously, before anything is scheduled; once planning succeeds the
//! listener is guaranteed exactly one callback.

use crate::analyzer::Analyzer;
use crate::ast::plan::UnresolvedPlan;
use crate::engine::{ExecutionEngine, ExplainListener, ResponseListener};
use crate::error::QueryResult;
use crate::executor::{implement_with, unsupported_leaf, PhysicalPlan};
use crate::expression::function::FunctionRegistry;
use crate::planner::logical::LogicalPlan;
use crate::planner::optimizer::LogicalOptimizer;
use crate::storage::{StorageEngine, Table};
use log::debug;
use std::sync::Arc;

pub struct QueryService {
    analyzer: Analyzer,
    optimizer: LogicalOptimizer,
    engine: ExecutionEngine,
}

impl QueryService {
    /// Explicit constructor wiring; no hidden globals.
    pub fn new(
        storage: Arc<dyn StorageEngine>,
        registry: FunctionRegistry,
        engine: ExecutionEngine,
    ) -> Self {
        Self {
            analyzer: Analyzer::new(storage, registry.clone()),
            optimizer: LogicalOptimizer::with_default_rules(registry),
            engine,
        }
    }

    /// Plan and schedule one query. A returned error means nothing was
    /// scheduled and the listener will never be called.
    pub fn execute(
        &self,
        query: &UnresolvedPlan,
        listener: Box<dyn ResponseListener>,
    ) -> QueryResult<()> {
        let physical = self.plan(query)?;
        self.engine.execute(physical, listener);
        Ok(())
    }

    /// Plan one query and deliver its explain tree.
    pub fn explain(
        &self,
        query: &UnresolvedPlan,
        listener: Box<dyn ExplainListener>,
    ) -> QueryResult<()> {
        let physical = self.plan(query)?;
        self.engine.explain(physical, listener);
        Ok(())
    }

    fn plan(&self, query: &UnresolvedPlan) -> QueryResult<Box<dyn PhysicalPlan>> {
        let logical = self.analyzer.analyze(query)?;
        let optimized = self.optimizer.optimize(logical);
        match leaf_table(&optimized) {
            Some(table) => {
                let pushed = table.optimize(optimized);
                debug!("storage-optimized plan: {}", pushed.label());
                table.implement(&pushed)
            }
            // Table-free plans (e.g. inline values) compile with the
            // generic operators alone.
            None => implement_with(&optimized, &|leaf| Err(unsupported_leaf(leaf))),
        }
    }
}

/// The table scanned at the bottom of the plan, if any.
fn leaf_table(plan: &LogicalPlan) -> Option<Arc<dyn Table>> {
    match plan {
        LogicalPlan::Relation { table, .. } | LogicalPlan::IndexScan { table, .. } => {
            Some(table.0.clone())
        }
        other => other.input().and_then(leaf_table),
    }
}
