//! Filter operator: keeps rows whose predicate evaluates to true.

use crate::data::value::ExprValue;
use crate::data::BindingTuple;
use crate::error::QueryResult;
use crate::executor::{Column, ExplainNode, PhysicalPlan};
use crate::expression::expr::Expression;

pub struct FilterOperator {
    input: Box<dyn PhysicalPlan>,
    predicate: Expression,
}

impl FilterOperator {
    pub fn new(input: Box<dyn PhysicalPlan>, predicate: Expression) -> Self {
        Self { input, predicate }
    }
}

impl PhysicalPlan for FilterOperator {
    fn open(&mut self) -> QueryResult<()> {
        self.input.open()
    }

    fn next(&mut self) -> QueryResult<Option<BindingTuple>> {
        while let Some(row) = self.input.next()? {
            // NULL/MISSING predicate results drop the row (SQL WHERE).
            match self.predicate.value_of(&row)? {
                ExprValue::Boolean(true) => return Ok(Some(row)),
                _ => continue,
            }
        }
        Ok(None)
    }

    fn close(&mut self) {
        self.input.close();
    }

    fn schema(&self) -> Vec<Column> {
        self.input.schema()
    }

    fn explain_node(&self) -> ExplainNode {
        ExplainNode {
            name: "FilterOperator".to_string(),
            description: self.predicate.to_string(),
            children: vec![self.input.explain_node()],
        }
    }
}
