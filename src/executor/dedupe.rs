//! Dedupe operator: keeps the first row per distinct key combination.

use crate::data::value::ExprValue;
use crate::data::BindingTuple;
use crate::error::QueryResult;
use crate::executor::{Column, ExplainNode, PhysicalPlan};
use crate::expression::expr::Expression;

/// Streaming duplicate elimination over the listed field expressions.
///
/// Keys are matched with total value equality, so NULL and MISSING each
/// form their own group. Seen keys are held in arrival order; float keys
/// rule out hashing.
pub struct DedupeOperator {
    input: Box<dyn PhysicalPlan>,
    fields: Vec<Expression>,
    seen: Vec<Vec<ExprValue>>,
}

impl DedupeOperator {
    pub fn new(input: Box<dyn PhysicalPlan>, fields: Vec<Expression>) -> Self {
        Self {
            input,
            fields,
            seen: Vec::new(),
        }
    }

    fn key_of(&self, row: &BindingTuple) -> QueryResult<Vec<ExprValue>> {
        let mut key = Vec::with_capacity(self.fields.len());
        for field in &self.fields {
            key.push(field.value_of(row)?);
        }
        Ok(key)
    }
}

fn keys_equal(a: &[ExprValue], b: &[ExprValue]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.equal(y))
}

impl PhysicalPlan for DedupeOperator {
    fn open(&mut self) -> QueryResult<()> {
        self.seen.clear();
        self.input.open()
    }

    fn next(&mut self) -> QueryResult<Option<BindingTuple>> {
        while let Some(row) = self.input.next()? {
            let key = self.key_of(&row)?;
            if self.seen.iter().any(|s| keys_equal(s, &key)) {
                continue;
            }
            self.seen.push(key);
            return Ok(Some(row));
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
            name: "DedupeOperator".to_string(),
            description: self
                .fields
                .iter()
                .map(|f| f.to_string())
                .collect::<Vec<_>>()
                .join(", "),
            children: vec![self.input.explain_node()],
        }
    }
}
