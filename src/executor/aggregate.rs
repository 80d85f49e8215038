//! Aggregation operator and its collectors.
//!
//! The operator drains its input on `open()`, folding every row into a
//! collector, then streams the collected buckets out. Three collectors
//! cover the grouping shapes: metric (no keys, one global bucket), bucket
//! (plain group-by keys) and span (group-by where keys are rounded into
//! interval buckets first). Buckets are kept in first-seen order; float
//! keys rule out hashing, and first-seen order is what the bucket shape
//! promises anyway.

use crate::data::value::ExprValue;
use crate::data::BindingTuple;
use crate::error::QueryResult;
use crate::executor::rounding::Rounding;
use crate::executor::{Column, ExplainNode, PhysicalPlan};
use crate::expression::aggregate::{AccumulatorState, NamedAggregator};
use crate::expression::expr::{Expression, NamedExpr};

/// Accumulates rows into buckets and yields one output row per bucket.
pub trait Collector: Send {
    fn collect(&mut self, row: &BindingTuple) -> QueryResult<()>;

    /// Output rows in bucket order. Consumes the accumulated state.
    fn results(&mut self) -> Vec<BindingTuple>;
}

/// Collector for the grouping shape of `group_by`: metric when empty,
/// span when any key is a span expression, bucket otherwise.
pub fn collector_for(
    aggregators: Vec<NamedAggregator>,
    group_by: Vec<NamedExpr>,
) -> QueryResult<Box<dyn Collector>> {
    if group_by.is_empty() {
        return Ok(Box::new(MetricCollector::new(aggregators)));
    }
    if group_by
        .iter()
        .any(|k| matches!(k.expr, Expression::Span(_)))
    {
        return Ok(Box::new(SpanCollector::new(aggregators, group_by)?));
    }
    Ok(Box::new(BucketCollector::new(aggregators, group_by)))
}

/// Global aggregation without keys. Always yields exactly one row, so an
/// empty input still produces `count=0` / `sum=NULL` style output.
pub struct MetricCollector {
    aggregators: Vec<NamedAggregator>,
    states: Vec<AccumulatorState>,
}

impl MetricCollector {
    pub fn new(aggregators: Vec<NamedAggregator>) -> Self {
        let states = aggregators.iter().map(|a| a.aggregator.create_state()).collect();
        Self {
            aggregators,
            states,
        }
    }
}

impl Collector for MetricCollector {
    fn collect(&mut self, row: &BindingTuple) -> QueryResult<()> {
        for (named, state) in self.aggregators.iter().zip(&mut self.states) {
            named.aggregator.iterate(state, row)?;
        }
        Ok(())
    }

    fn results(&mut self) -> Vec<BindingTuple> {
        let row = self
            .aggregators
            .iter()
            .zip(&self.states)
            .map(|(named, state)| (named.name.clone(), named.aggregator.result(state)))
            .collect();
        vec![row]
    }
}

/// Bucket storage shared by the keyed collectors: association list from
/// key tuple to accumulator states, in first-seen order.
struct BucketMap {
    buckets: Vec<(Vec<ExprValue>, Vec<AccumulatorState>)>,
}

impl BucketMap {
    fn new() -> Self {
        Self {
            buckets: Vec::new(),
        }
    }

    fn states_for(
        &mut self,
        key: Vec<ExprValue>,
        aggregators: &[NamedAggregator],
    ) -> &mut Vec<AccumulatorState> {
        let pos = self.buckets.iter().position(|(k, _)| {
            k.len() == key.len() && k.iter().zip(&key).all(|(a, b)| a.equal(b))
        });
        let index = match pos {
            Some(i) => i,
            None => {
                let states = aggregators
                    .iter()
                    .map(|a| a.aggregator.create_state())
                    .collect();
                self.buckets.push((key, states));
                self.buckets.len() - 1
            }
        };
        &mut self.buckets[index].1
    }

    fn drain_rows(
        &mut self,
        key_names: &[String],
        aggregators: &[NamedAggregator],
    ) -> Vec<BindingTuple> {
        std::mem::take(&mut self.buckets)
            .into_iter()
            .map(|(key, states)| {
                let mut bindings: Vec<(String, ExprValue)> =
                    key_names.iter().cloned().zip(key).collect();
                for (named, state) in aggregators.iter().zip(&states) {
                    bindings.push((named.name.clone(), named.aggregator.result(state)));
                }
                BindingTuple::new(bindings)
            })
            .collect()
    }
}

/// Keyed aggregation over plain group-by expressions.
pub struct BucketCollector {
    aggregators: Vec<NamedAggregator>,
    keys: Vec<NamedExpr>,
    buckets: BucketMap,
}

impl BucketCollector {
    pub fn new(aggregators: Vec<NamedAggregator>, keys: Vec<NamedExpr>) -> Self {
        Self {
            aggregators,
            keys,
            buckets: BucketMap::new(),
        }
    }
}

impl Collector for BucketCollector {
    fn collect(&mut self, row: &BindingTuple) -> QueryResult<()> {
        let mut key = Vec::with_capacity(self.keys.len());
        for k in &self.keys {
            key.push(k.expr.value_of(row)?);
        }
        let states = self.buckets.states_for(key, &self.aggregators);
        for (named, state) in self.aggregators.iter().zip(states) {
            named.aggregator.iterate(state, row)?;
        }
        Ok(())
    }

    fn results(&mut self) -> Vec<BindingTuple> {
        let names: Vec<String> = self.keys.iter().map(|k| k.name.clone()).collect();
        self.buckets.drain_rows(&names, &self.aggregators)
    }
}

/// Keyed aggregation where span keys are rounded to their bucket start
/// before grouping. Non-span keys pass through unrounded.
pub struct SpanCollector {
    aggregators: Vec<NamedAggregator>,
    keys: Vec<(NamedExpr, Option<Rounding>)>,
    buckets: BucketMap,
}

impl SpanCollector {
    pub fn new(aggregators: Vec<NamedAggregator>, keys: Vec<NamedExpr>) -> QueryResult<Self> {
        let keys = keys
            .into_iter()
            .map(|k| {
                let rounding = match &k.expr {
                    Expression::Span(span) => Some(Rounding::for_span(span)?),
                    _ => None,
                };
                Ok((k, rounding))
            })
            .collect::<QueryResult<Vec<_>>>()?;
        Ok(Self {
            aggregators,
            keys,
            buckets: BucketMap::new(),
        })
    }
}

impl Collector for SpanCollector {
    fn collect(&mut self, row: &BindingTuple) -> QueryResult<()> {
        let mut key = Vec::with_capacity(self.keys.len());
        for (k, rounding) in &self.keys {
            let value = k.expr.value_of(row)?;
            let value = match rounding {
                // Absent values form their own bucket instead of failing
                // the rounding math.
                Some(rounding) if !value.is_absent() => rounding.round(&value)?,
                _ => value,
            };
            key.push(value);
        }
        let states = self.buckets.states_for(key, &self.aggregators);
        for (named, state) in self.aggregators.iter().zip(states) {
            named.aggregator.iterate(state, row)?;
        }
        Ok(())
    }

    fn results(&mut self) -> Vec<BindingTuple> {
        let names: Vec<String> = self.keys.iter().map(|(k, _)| k.name.clone()).collect();
        self.buckets.drain_rows(&names, &self.aggregators)
    }
}

/// Blocking aggregation operator.
pub struct AggregationOperator {
    input: Box<dyn PhysicalPlan>,
    aggregators: Vec<NamedAggregator>,
    group_by: Vec<NamedExpr>,
    output: Vec<BindingTuple>,
    pos: usize,
}

impl AggregationOperator {
    pub fn new(
        input: Box<dyn PhysicalPlan>,
        aggregators: Vec<NamedAggregator>,
        group_by: Vec<NamedExpr>,
    ) -> Self {
        Self {
            input,
            aggregators,
            group_by,
            output: Vec::new(),
            pos: 0,
        }
    }
}

impl PhysicalPlan for AggregationOperator {
    fn open(&mut self) -> QueryResult<()> {
        self.input.open()?;
        self.output.clear();
        self.pos = 0;
        let mut collector = collector_for(self.aggregators.clone(), self.group_by.clone())?;
        while let Some(row) = self.input.next()? {
            collector.collect(&row)?;
        }
        self.output = collector.results();
        Ok(())
    }

    fn next(&mut self) -> QueryResult<Option<BindingTuple>> {
        if self.pos < self.output.len() {
            self.pos += 1;
            Ok(Some(self.output[self.pos - 1].clone()))
        } else {
            Ok(None)
        }
    }

    fn close(&mut self) {
        self.output.clear();
        self.input.close();
    }

    fn schema(&self) -> Vec<Column> {
        let mut columns: Vec<Column> = self
            .group_by
            .iter()
            .map(|k| Column::new(k.name.clone(), k.expr.expr_type()))
            .collect();
        for named in &self.aggregators {
            columns.push(Column::new(
                named.name.clone(),
                named.aggregator.return_type(),
            ));
        }
        columns
    }

    fn explain_node(&self) -> ExplainNode {
        ExplainNode {
            name: "AggregationOperator".to_string(),
            description: format!(
                "aggs=[{}], groups=[{}]",
                self.aggregators
                    .iter()
                    .map(|a| format!("{}={}", a.name, a.aggregator))
                    .collect::<Vec<_>>()
                    .join(", "),
                self.group_by
                    .iter()
                    .map(|k| k.name.clone())
                    .collect::<Vec<_>>()
                    .join(", "),
            ),
            children: vec![self.input.explain_node()],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::types::ExprType;
    use crate::executor::test_util::{collect, FixedInput};
    use crate::expression::aggregate::{AggKind, Aggregator};
    use crate::expression::expr::SpanUnit;

    fn rows(pairs: &[(&str, i32)]) -> Vec<BindingTuple> {
        pairs
            .iter()
            .map(|(city, age)| {
                BindingTuple::new(vec![
                    ("city".to_string(), ExprValue::string(*city)),
                    ("age".to_string(), ExprValue::Integer(*age)),
                ])
            })
            .collect()
    }

    fn input(pairs: &[(&str, i32)]) -> FixedInput {
        FixedInput::new(
            vec![
                Column::new("city", ExprType::String),
                Column::new("age", ExprType::Integer),
            ],
            rows(pairs),
        )
    }

    fn sum_age() -> NamedAggregator {
        NamedAggregator::new(
            "total",
            Aggregator::new(AggKind::Sum, Expression::reference("age", ExprType::Integer)),
        )
    }

    #[test]
    fn test_metric_aggregation_without_groups() {
        let mut op = AggregationOperator::new(
            Box::new(input(&[("a", 10), ("b", 20)])),
            vec![sum_age(), NamedAggregator::new("n", Aggregator::count_star())],
            vec![],
        );
        let out = collect(&mut op);
        assert_eq!(out.len(), 1);
        assert!(out[0].resolve("total").equal(&ExprValue::Long(30)));
        assert!(out[0].resolve("n").equal(&ExprValue::Integer(2)));
    }

    #[test]
    fn test_metric_aggregation_of_empty_input() {
        let mut op = AggregationOperator::new(
            Box::new(input(&[])),
            vec![sum_age(), NamedAggregator::new("n", Aggregator::count_star())],
            vec![],
        );
        let out = collect(&mut op);
        assert_eq!(out.len(), 1);
        assert!(out[0].resolve("total").is_null());
        assert!(out[0].resolve("n").equal(&ExprValue::Integer(0)));
    }

    #[test]
    fn test_bucket_aggregation_first_seen_order() {
        let mut op = AggregationOperator::new(
            Box::new(input(&[("b", 1), ("a", 2), ("b", 3)])),
            vec![sum_age()],
            vec![NamedExpr::new(
                "city",
                Expression::reference("city", ExprType::String),
            )],
        );
        let out = collect(&mut op);
        assert_eq!(out.len(), 2);
        assert!(out[0].resolve("city").equal(&ExprValue::string("b")));
        assert!(out[0].resolve("total").equal(&ExprValue::Long(4)));
        assert!(out[1].resolve("city").equal(&ExprValue::string("a")));
        assert!(out[1].resolve("total").equal(&ExprValue::Long(2)));
    }

    #[test]
    fn test_bucket_aggregation_keeps_empty_input_empty() {
        let mut op = AggregationOperator::new(
            Box::new(input(&[])),
            vec![sum_age()],
            vec![NamedExpr::new(
                "city",
                Expression::reference("city", ExprType::String),
            )],
        );
        assert!(collect(&mut op).is_empty());
    }

    #[test]
    fn test_span_aggregation_rounds_keys() {
        let span = Expression::span(
            Expression::reference("age", ExprType::Integer),
            ExprValue::Integer(10),
            SpanUnit::None,
        );
        let mut op = AggregationOperator::new(
            Box::new(input(&[("a", 12), ("b", 17), ("c", 25)])),
            vec![NamedAggregator::new("n", Aggregator::count_star())],
            vec![NamedExpr::new("bucket", span)],
        );
        let out = collect(&mut op);
        assert_eq!(out.len(), 2);
        assert!(out[0].resolve("bucket").equal(&ExprValue::Long(10)));
        assert!(out[0].resolve("n").equal(&ExprValue::Integer(2)));
        assert!(out[1].resolve("bucket").equal(&ExprValue::Long(20)));
        assert!(out[1].resolve("n").equal(&ExprValue::Integer(1)));
    }

    #[test]
    fn test_span_aggregation_absent_key_forms_own_bucket() {
        let mut rows = rows(&[("a", 5)]);
        rows.push(BindingTuple::new(vec![(
            "city".to_string(),
            ExprValue::string("d"),
        )]));
        let input = FixedInput::new(
            vec![
                Column::new("city", ExprType::String),
                Column::new("age", ExprType::Integer),
            ],
            rows,
        );
        let mut op = AggregationOperator::new(
            Box::new(input),
            vec![NamedAggregator::new("n", Aggregator::count_star())],
            vec![NamedExpr::new(
                "bucket",
                Expression::span(
                    Expression::reference("age", ExprType::Integer),
                    ExprValue::Integer(10),
                    SpanUnit::None,
                ),
            )],
        );
        let out = collect(&mut op);
        assert_eq!(out.len(), 2);
        assert!(out[1].resolve("bucket").is_missing());
    }
}
