//! Constant-rows operator.

use crate::data::value::ExprValue;
use crate::data::BindingTuple;
use crate::error::QueryResult;
use crate::executor::{Column, ExplainNode, PhysicalPlan};

/// Leaf operator yielding a fixed list of literal rows. Backs subqueries
/// with inline data and keeps test plans storage-free.
pub struct ValuesOperator {
    names: Vec<String>,
    rows: Vec<Vec<ExprValue>>,
    pos: usize,
}

impl ValuesOperator {
    pub fn new(names: Vec<String>, rows: Vec<Vec<ExprValue>>) -> Self {
        Self {
            names,
            rows,
            pos: 0,
        }
    }
}

impl PhysicalPlan for ValuesOperator {
    fn open(&mut self) -> QueryResult<()> {
        self.pos = 0;
        Ok(())
    }

    fn next(&mut self) -> QueryResult<Option<BindingTuple>> {
        let Some(row) = self.rows.get(self.pos) else {
            return Ok(None);
        };
        self.pos += 1;
        Ok(Some(
            self.names
                .iter()
                .cloned()
                .zip(row.iter().cloned())
                .collect(),
        ))
    }

    fn close(&mut self) {}

    fn schema(&self) -> Vec<Column> {
        self.names
            .iter()
            .enumerate()
            .map(|(i, name)| {
                let expr_type = self
                    .rows
                    .first()
                    .and_then(|row| row.get(i))
                    .map(|v| v.expr_type())
                    .unwrap_or(crate::data::types::ExprType::Undefined);
                Column::new(name.clone(), expr_type)
            })
            .collect()
    }

    fn explain_node(&self) -> ExplainNode {
        ExplainNode {
            name: "ValuesOperator".to_string(),
            description: format!("rows={}", self.rows.len()),
            children: vec![],
        }
    }
}
