//! Sort operator: blocking, materializes and orders its input.

use crate::ast::expr::SortOption;
use crate::data::ordering::ValueOrdering;
use crate::data::BindingTuple;
use crate::error::QueryResult;
use crate::executor::{Column, ExplainNode, PhysicalPlan};
use crate::expression::expr::Expression;
use std::cmp::Ordering;

pub struct SortOperator {
    input: Box<dyn PhysicalPlan>,
    sort_list: Vec<(Expression, SortOption)>,
    sorted: Vec<BindingTuple>,
    pos: usize,
}

/// Comparator implementing one sort option. `reversed()` flips NULL
/// placement along with everything else, so a descending key pre-inverts
/// the placement to land NULLs where the option asks.
fn ordering_for(option: &SortOption) -> ValueOrdering {
    let base = ValueOrdering::natural();
    if option.ascending {
        if option.nulls_first {
            base.nulls_first()
        } else {
            base.nulls_last()
        }
    } else if option.nulls_first {
        base.nulls_last().reversed()
    } else {
        base.nulls_first().reversed()
    }
}

impl SortOperator {
    pub fn new(input: Box<dyn PhysicalPlan>, sort_list: Vec<(Expression, SortOption)>) -> Self {
        Self {
            input,
            sort_list,
            sorted: Vec::new(),
            pos: 0,
        }
    }

}

pub(crate) fn compare_rows(
    sort_list: &[(Expression, SortOption)],
    a: &BindingTuple,
    b: &BindingTuple,
) -> QueryResult<Ordering> {
    for (key, option) in sort_list {
        let va = key.value_of(a)?;
        let vb = key.value_of(b)?;
        let ord = ordering_for(option).compare(&va, &vb);
        if ord != Ordering::Equal {
            return Ok(ord);
        }
    }
    Ok(Ordering::Equal)
}

impl PhysicalPlan for SortOperator {
    fn open(&mut self) -> QueryResult<()> {
        self.input.open()?;
        self.sorted.clear();
        self.pos = 0;
        while let Some(row) = self.input.next()? {
            self.sorted.push(row);
        }
        // Keys are evaluated inside the comparator; a first error is
        // stashed and Equal returned so sort_by stays total.
        let mut error = None;
        let mut rows = std::mem::take(&mut self.sorted);
        let sort_list = &self.sort_list;
        rows.sort_by(|a, b| match compare_rows(sort_list, a, b) {
            Ok(ord) => ord,
            Err(e) => {
                error.get_or_insert(e);
                Ordering::Equal
            }
        });
        self.sorted = rows;
        match error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn next(&mut self) -> QueryResult<Option<BindingTuple>> {
        if self.pos < self.sorted.len() {
            self.pos += 1;
            Ok(Some(self.sorted[self.pos - 1].clone()))
        } else {
            Ok(None)
        }
    }

    fn close(&mut self) {
        self.sorted.clear();
        self.input.close();
    }

    fn schema(&self) -> Vec<Column> {
        self.input.schema()
    }

    fn explain_node(&self) -> ExplainNode {
        ExplainNode {
            name: "SortOperator".to_string(),
            description: self
                .sort_list
                .iter()
                .map(|(key, option)| {
                    format!("{} {}", key, if option.ascending { "asc" } else { "desc" })
                })
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

    fn ints_of(rows: &[BindingTuple]) -> Vec<ExprValue> {
        rows.iter().map(|r| r.resolve("n")).collect()
    }

    fn key() -> Expression {
        Expression::reference("n", ExprType::Integer)
    }

    #[test]
    fn test_ascending_sort() {
        let input = FixedInput::of_ints("n", &[3, 1, 2]);
        let mut op = SortOperator::new(Box::new(input), vec![(key(), SortOption::asc())]);
        let values = ints_of(&collect(&mut op));
        assert!(values[0].equal(&ExprValue::Integer(1)));
        assert!(values[1].equal(&ExprValue::Integer(2)));
        assert!(values[2].equal(&ExprValue::Integer(3)));
    }

    #[test]
    fn test_descending_sort_nulls_last() {
        let input = FixedInput::new(
            vec![Column::new("n", ExprType::Integer)],
            vec![
                BindingTuple::new(vec![("n".to_string(), ExprValue::Integer(1))]),
                BindingTuple::new(vec![("n".to_string(), ExprValue::Null)]),
                BindingTuple::new(vec![("n".to_string(), ExprValue::Integer(3))]),
            ],
        );
        let mut op = SortOperator::new(Box::new(input), vec![(key(), SortOption::desc())]);
        let values = ints_of(&collect(&mut op));
        assert!(values[0].equal(&ExprValue::Integer(3)));
        assert!(values[1].equal(&ExprValue::Integer(1)));
        assert!(values[2].is_null());
    }

    #[test]
    fn test_ascending_sort_nulls_first() {
        let input = FixedInput::new(
            vec![Column::new("n", ExprType::Integer)],
            vec![
                BindingTuple::new(vec![("n".to_string(), ExprValue::Integer(2))]),
                BindingTuple::default(),
                BindingTuple::new(vec![("n".to_string(), ExprValue::Null)]),
            ],
        );
        let mut op = SortOperator::new(Box::new(input), vec![(key(), SortOption::asc())]);
        let values = ints_of(&collect(&mut op));
        // MISSING sorts with NULL ahead of every value.
        assert!(values[0].is_absent());
        assert!(values[1].is_absent());
        assert!(values[2].equal(&ExprValue::Integer(2)));
    }

    #[test]
    fn test_multi_key_sort_is_stable_per_key() {
        let rows = vec![
            BindingTuple::new(vec![
                ("a".to_string(), ExprValue::Integer(1)),
                ("b".to_string(), ExprValue::Integer(2)),
            ]),
            BindingTuple::new(vec![
                ("a".to_string(), ExprValue::Integer(1)),
                ("b".to_string(), ExprValue::Integer(1)),
            ]),
            BindingTuple::new(vec![
                ("a".to_string(), ExprValue::Integer(0)),
                ("b".to_string(), ExprValue::Integer(9)),
            ]),
        ];
        let input = FixedInput::new(
            vec![
                Column::new("a", ExprType::Integer),
                Column::new("b", ExprType::Integer),
            ],
            rows,
        );
        let mut op = SortOperator::new(
            Box::new(input),
            vec![
                (Expression::reference("a", ExprType::Integer), SortOption::asc()),
                (Expression::reference("b", ExprType::Integer), SortOption::asc()),
            ],
        );
        let rows = collect(&mut op);
        assert!(rows[0].resolve("a").equal(&ExprValue::Integer(0)));
        assert!(rows[1].resolve("b").equal(&ExprValue::Integer(1)));
        assert!(rows[2].resolve("b").equal(&ExprValue::Integer(2)));
    }
}
