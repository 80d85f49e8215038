//! In-memory storage engine.
//!
//! Tables hold their rows in a `Vec` and serve scans by cloning. Filter,
//! sort, and limit nodes directly above a scan are pushed into the scan
//! itself, exercising the same pushdown path a remote store would use.

use crate::ast::expr::SortOption;
use crate::data::types::ExprType;
use crate::data::value::ExprValue;
use crate::data::BindingTuple;
use crate::error::QueryResult;
use crate::executor::sort::compare_rows;
use crate::executor::{
    implement_with, unsupported_leaf, Column, ExplainNode, PhysicalPlan, TableScanOperator,
};
use crate::expression::expr::Expression;
use crate::planner::logical::LogicalPlan;
use crate::planner::optimizer::{LogicalOptimizer, OptimizerRule};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use super::{StorageEngine, Table};

/// Engine over a fixed set of named in-memory tables.
#[derive(Default)]
pub struct MemStorageEngine {
    tables: HashMap<String, Arc<dyn Table>>,
}

impl MemStorageEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_table(&mut self, name: impl Into<String>, table: MemTable) {
        self.tables.insert(name.into(), Arc::new(table));
    }
}

impl StorageEngine for MemStorageEngine {
    fn table(&self, name: &str) -> Option<Arc<dyn Table>> {
        self.tables.get(name).cloned()
    }
}

/// Row-vector table. Field order follows the map's sorted order, which
/// keeps analyzer output deterministic.
pub struct MemTable {
    fields: BTreeMap<String, ExprType>,
    rows: Vec<BindingTuple>,
}

impl MemTable {
    pub fn new(fields: BTreeMap<String, ExprType>, rows: Vec<BindingTuple>) -> Self {
        Self { fields, rows }
    }

    fn scan(&self, plan: &LogicalPlan) -> QueryResult<Box<dyn PhysicalPlan>> {
        match plan {
            LogicalPlan::Relation { name, .. } => Ok(Box::new(MemScanOperator::new(
                name.clone(),
                self.schema(),
                self.rows.clone(),
                None,
                None,
                None,
            ))),
            LogicalPlan::IndexScan {
                name,
                pushed_filter,
                pushed_sort,
                pushed_limit,
                ..
            } => Ok(Box::new(MemScanOperator::new(
                name.clone(),
                self.schema(),
                self.rows.clone(),
                pushed_filter.clone(),
                pushed_sort.clone(),
                *pushed_limit,
            ))),
            other => Err(unsupported_leaf(other)),
        }
    }

    fn schema(&self) -> Vec<Column> {
        self.fields
            .iter()
            .map(|(name, t)| Column::new(name.clone(), *t))
            .collect()
    }
}

impl Table for MemTable {
    fn field_types(&self) -> Vec<(String, ExprType)> {
        self.fields
            .iter()
            .map(|(name, t)| (name.clone(), *t))
            .collect()
    }

    fn optimize(&self, plan: LogicalPlan) -> LogicalPlan {
        LogicalOptimizer::new(vec![
            Box::new(PushFilterIntoScan),
            Box::new(PushSortIntoScan),
            Box::new(PushLimitIntoScan),
        ])
        .optimize(plan)
    }

    fn implement(&self, plan: &LogicalPlan) -> QueryResult<Box<dyn PhysicalPlan>> {
        implement_with(plan, &|leaf| self.scan(leaf))
    }
}

/// `Filter(Relation)` becomes a scan with a native filter. Filters above a
/// scan that already applied a limit must not be pushed past it.
pub struct PushFilterIntoScan;

impl OptimizerRule for PushFilterIntoScan {
    fn name(&self) -> &'static str {
        "PushFilterIntoScan"
    }

    fn apply(&self, plan: &LogicalPlan) -> Option<LogicalPlan> {
        let LogicalPlan::Filter { input, predicate } = plan else {
            return None;
        };
        match input.as_ref() {
            LogicalPlan::Relation { name, table } => Some(LogicalPlan::IndexScan {
                name: name.clone(),
                table: table.clone(),
                pushed_filter: Some(predicate.clone()),
                pushed_sort: None,
                pushed_limit: None,
            }),
            _ => None,
        }
    }
}

/// `Sort(Relation)` / `Sort(scan)` becomes a scan returning rows in sort
/// order. The scan orders rows before applying its limit, so a sort must
/// not be pushed onto a scan that already carries one.
pub struct PushSortIntoScan;

impl OptimizerRule for PushSortIntoScan {
    fn name(&self) -> &'static str {
        "PushSortIntoScan"
    }

    fn apply(&self, plan: &LogicalPlan) -> Option<LogicalPlan> {
        let LogicalPlan::Sort { input, sort_list } = plan else {
            return None;
        };
        match input.as_ref() {
            LogicalPlan::Relation { name, table } => Some(LogicalPlan::IndexScan {
                name: name.clone(),
                table: table.clone(),
                pushed_filter: None,
                pushed_sort: Some(sort_list.clone()),
                pushed_limit: None,
            }),
            LogicalPlan::IndexScan {
                name,
                table,
                pushed_filter,
                pushed_sort: None,
                pushed_limit: None,
            } => Some(LogicalPlan::IndexScan {
                name: name.clone(),
                table: table.clone(),
                pushed_filter: pushed_filter.clone(),
                pushed_sort: Some(sort_list.clone()),
                pushed_limit: None,
            }),
            _ => None,
        }
    }
}

/// `Limit(Relation)` / `Limit(scan)` becomes a scan with a native limit.
pub struct PushLimitIntoScan;

impl OptimizerRule for PushLimitIntoScan {
    fn name(&self) -> &'static str {
        "PushLimitIntoScan"
    }

    fn apply(&self, plan: &LogicalPlan) -> Option<LogicalPlan> {
        let LogicalPlan::Limit {
            input,
            limit,
            offset,
        } = plan
        else {
            return None;
        };
        match input.as_ref() {
            LogicalPlan::Relation { name, table } => Some(LogicalPlan::IndexScan {
                name: name.clone(),
                table: table.clone(),
                pushed_filter: None,
                pushed_sort: None,
                pushed_limit: Some((*limit, *offset)),
            }),
            LogicalPlan::IndexScan {
                name,
                table,
                pushed_filter,
                pushed_sort,
                pushed_limit: None,
            } => Some(LogicalPlan::IndexScan {
                name: name.clone(),
                table: table.clone(),
                pushed_filter: pushed_filter.clone(),
                pushed_sort: pushed_sort.clone(),
                pushed_limit: Some((*limit, *offset)),
            }),
            _ => None,
        }
    }
}

/// Scan over an in-memory row vector with optional native
/// filter/sort/limit.
pub struct MemScanOperator {
    table_name: String,
    schema: Vec<Column>,
    rows: Vec<BindingTuple>,
    filter: Option<Expression>,
    sort: Option<Vec<(Expression, SortOption)>>,
    limit: Option<(usize, usize)>,
    pos: usize,
    emitted: usize,
    skipped: usize,
}

impl MemScanOperator {
    fn new(
        table_name: String,
        schema: Vec<Column>,
        rows: Vec<BindingTuple>,
        filter: Option<Expression>,
        sort: Option<Vec<(Expression, SortOption)>>,
        limit: Option<(usize, usize)>,
    ) -> Self {
        Self {
            table_name,
            schema,
            rows,
            filter,
            sort,
            limit,
            pos: 0,
            emitted: 0,
            skipped: 0,
        }
    }
}

impl PhysicalPlan for MemScanOperator {
    fn open(&mut self) -> QueryResult<()> {
        self.pos = 0;
        self.emitted = 0;
        self.skipped = 0;
        if let Some(sort_list) = &self.sort {
            // Sorting before the filter keeps the surviving rows in the
            // same order as filtering first.
            let mut failed = None;
            self.rows.sort_by(|a, b| match compare_rows(sort_list, a, b) {
                Ok(ordering) => ordering,
                Err(e) => {
                    failed.get_or_insert(e);
                    Ordering::Equal
                }
            });
            if let Some(e) = failed {
                return Err(e);
            }
        }
        Ok(())
    }

    fn next(&mut self) -> QueryResult<Option<BindingTuple>> {
        loop {
            if let Some((limit, _)) = self.limit {
                if self.emitted >= limit {
                    return Ok(None);
                }
            }
            let Some(row) = self.rows.get(self.pos) else {
                return Ok(None);
            };
            self.pos += 1;
            if let Some(filter) = &self.filter {
                if !matches!(filter.value_of(row)?, ExprValue::Boolean(true)) {
                    continue;
                }
            }
            if let Some((_, offset)) = self.limit {
                if self.skipped < offset {
                    self.skipped += 1;
                    continue;
                }
            }
            self.emitted += 1;
            return Ok(Some(row.clone()));
        }
    }

    fn close(&mut self) {}

    fn schema(&self) -> Vec<Column> {
        self.schema.clone()
    }

    fn explain_node(&self) -> ExplainNode {
        ExplainNode {
            name: "MemScanOperator".to_string(),
            description: self.explain(),
            children: vec![],
        }
    }
}

impl TableScanOperator for MemScanOperator {
    fn explain(&self) -> String {
        let mut parts = vec![format!("table={}", self.table_name)];
        if let Some(filter) = &self.filter {
            parts.push(format!("filter={}", filter));
        }
        if let Some(sort_list) = &self.sort {
            parts.push(format!(
                "sort=[{}]",
                sort_list
                    .iter()
                    .map(|(key, _)| key.to_string())
                    .collect::<Vec<_>>()
                    .join(", ")
            ));
        }
        if let Some((limit, offset)) = self.limit {
            parts.push(format!("limit={}, offset={}", limit, offset));
        }
        parts.join(", ")
    }
}
