//! Eval operator: extends rows with computed columns.

use crate::data::BindingTuple;
use crate::error::QueryResult;
use crate::executor::{Column, ExplainNode, PhysicalPlan};
use crate::expression::expr::NamedExpr;

/// Appends one column per expression, overwriting an existing column of the
/// same name. Expressions are evaluated left to right against the row as
/// extended so far, so later columns may refer to earlier ones.
pub struct EvalOperator {
    input: Box<dyn PhysicalPlan>,
    expressions: Vec<NamedExpr>,
}

impl EvalOperator {
    pub fn new(input: Box<dyn PhysicalPlan>, expressions: Vec<NamedExpr>) -> Self {
        Self { input, expressions }
    }
}

impl PhysicalPlan for EvalOperator {
    fn open(&mut self) -> QueryResult<()> {
        self.input.open()
    }

    fn next(&mut self) -> QueryResult<Option<BindingTuple>> {
        let Some(row) = self.input.next()? else {
            return Ok(None);
        };
        let mut bindings: Vec<_> = row
            .names()
            .map(|n| (n.to_string(), row.resolve(n)))
            .collect();
        for expr in &self.expressions {
            let env = BindingTuple::new(bindings.clone());
            let value = expr.expr.value_of(&env)?;
            match bindings.iter_mut().find(|(n, _)| n == &expr.name) {
                Some(slot) => slot.1 = value,
                None => bindings.push((expr.name.clone(), value)),
            }
        }
        Ok(Some(BindingTuple::new(bindings)))
    }

    fn close(&mut self) {
        self.input.close();
    }

    fn schema(&self) -> Vec<Column> {
        let mut columns = self.input.schema();
        for expr in &self.expressions {
            let column = Column::new(expr.name.clone(), expr.expr.expr_type());
            match columns.iter_mut().find(|c| c.name == expr.name) {
                Some(slot) => *slot = column,
                None => columns.push(column),
            }
        }
        columns
    }

    fn explain_node(&self) -> ExplainNode {
        ExplainNode {
            name: "EvalOperator".to_string(),
            description: self
                .expressions
                .iter()
                .map(|e| format!("{}={}", e.name, e.expr))
                .collect::<Vec<_>>()
                .join(", "),
            children: vec![self.input.explain_node()],
        }
    }
}
