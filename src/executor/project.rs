//! Projection operator: rebuilds each row from named expressions.

use crate::data::BindingTuple;
use crate::error::QueryResult;
use crate::executor::{Column, ExplainNode, PhysicalPlan};
use crate::expression::expr::NamedExpr;

pub struct ProjectOperator {
    input: Box<dyn PhysicalPlan>,
    projections: Vec<NamedExpr>,
}

impl ProjectOperator {
    pub fn new(input: Box<dyn PhysicalPlan>, projections: Vec<NamedExpr>) -> Self {
        Self { input, projections }
    }
}

impl PhysicalPlan for ProjectOperator {
    fn open(&mut self) -> QueryResult<()> {
        self.input.open()
    }

    fn next(&mut self) -> QueryResult<Option<BindingTuple>> {
        let Some(row) = self.input.next()? else {
            return Ok(None);
        };
        let mut bindings = Vec::with_capacity(self.projections.len());
        for projection in &self.projections {
            let value = projection.expr.value_of(&row)?;
            // MISSING columns are dropped from the output row; an unbound
            // name resolves to MISSING downstream anyway.
            if !value.is_missing() {
                bindings.push((projection.name.clone(), value));
            }
        }
        Ok(Some(BindingTuple::new(bindings)))
    }

    fn close(&mut self) {
        self.input.close();
    }

    fn schema(&self) -> Vec<Column> {
        self.projections
            .iter()
            .map(|p| Column::new(p.name.clone(), p.expr.expr_type()))
            .collect()
    }

    fn explain_node(&self) -> ExplainNode {
        ExplainNode {
            name: "ProjectOperator".to_string(),
            description: self
                .projections
                .iter()
                .map(|p| p.name.clone())
                .collect::<Vec<_>>()
                .join(", "),
            children: vec![self.input.explain_node()],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::types::ExprType;
    use crate::data::value::ExprValue;
    use crate::executor::test_util::{collect, FixedInput};
    use crate::expression::expr::Expression;
    use crate::expression::scalar::default_registry;

    #[test]
    fn test_project_narrows_and_renames() {
        let input = FixedInput::new(
            vec![
                Column::new("age", ExprType::Integer),
                Column::new("name", ExprType::String),
            ],
            vec![BindingTuple::new(vec![
                ("age".to_string(), ExprValue::Integer(30)),
                ("name".to_string(), ExprValue::string("bob")),
            ])],
        );
        let mut op = ProjectOperator::new(
            Box::new(input),
            vec![NamedExpr::new(
                "years",
                Expression::reference("age", ExprType::Integer),
            )],
        );
        assert_eq!(
            op.schema(),
            vec![Column::new("years", ExprType::Integer)]
        );
        let rows = collect(&mut op);
        assert_eq!(rows.len(), 1);
        assert!(rows[0].resolve("years").equal(&ExprValue::Integer(30)));
        assert!(rows[0].resolve("name").is_missing());
    }

    #[test]
    fn test_project_computed_column() {
        let doubled = default_registry()
            .build(
                "*",
                vec![
                    Expression::reference("age", ExprType::Integer),
                    Expression::literal(ExprValue::Integer(2)),
                ],
                &[ExprType::Integer, ExprType::Integer],
            )
            .unwrap();
        let input = FixedInput::of_ints("age", &[21]);
        let mut op = ProjectOperator::new(
            Box::new(input),
            vec![NamedExpr::new("doubled", doubled)],
        );
        let rows = collect(&mut op);
        assert!(rows[0].resolve("doubled").equal(&ExprValue::Integer(42)));
    }

    #[test]
    fn test_missing_projection_is_dropped() {
        let input = FixedInput::of_ints("age", &[1]);
        let mut op = ProjectOperator::new(
            Box::new(input),
            vec![
                NamedExpr::new("age", Expression::reference("age", ExprType::Integer)),
                NamedExpr::new("gone", Expression::reference("gone", ExprType::Undefined)),
            ],
        );
        let rows = collect(&mut op);
        assert_eq!(rows[0].names().count(), 1);
    }
}
