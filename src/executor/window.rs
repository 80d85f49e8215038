//! Window operator.
//!
//! Assumes its input is sorted by partition keys then the window's sort
//! keys; the plan compiler inserts that sort. Two frame shapes exist:
//! ranking functions see one row at a time (current-row frame), while
//! windowed aggregates consume whole peer groups so every peer gets the
//! same running value. Both reset at partition boundaries.

use crate::data::types::ExprType;
use crate::data::value::ExprValue;
use crate::data::BindingTuple;
use crate::error::QueryResult;
use crate::executor::{Column, ExplainNode, PhysicalPlan};
use crate::expression::aggregate::{AccumulatorState, Aggregator};
use crate::expression::expr::Expression;
use crate::planner::logical::{WindowFunction, WindowSpec};
use std::collections::VecDeque;

pub struct WindowOperator {
    input: Box<dyn PhysicalPlan>,
    spec: WindowSpec,
    frame: Frame,
    partition_prev: Option<Vec<ExprValue>>,
    pending: VecDeque<BindingTuple>,
    lookahead: Option<BindingTuple>,
}

enum Frame {
    /// One-row frame for ranking functions.
    CurrentRow {
        row_number: i64,
        rank: i64,
        dense_rank: i64,
        prev_sort: Option<Vec<ExprValue>>,
    },
    /// Peer-group frame for windowed aggregates: cumulative within the
    /// partition, advanced one peer group at a time.
    PeerRows {
        aggregator: Aggregator,
        state: AccumulatorState,
    },
}

fn key_of(keys: &[Expression], row: &BindingTuple) -> QueryResult<Vec<ExprValue>> {
    let mut values = Vec::with_capacity(keys.len());
    for key in keys {
        values.push(key.value_of(row)?);
    }
    Ok(values)
}

fn keys_equal(a: &[ExprValue], b: &[ExprValue]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.equal(y))
}

fn extend(row: BindingTuple, name: &str, value: ExprValue) -> BindingTuple {
    let mut bindings: Vec<(String, ExprValue)> = row
        .names()
        .map(|n| (n.to_string(), row.resolve(n)))
        .collect();
    bindings.push((name.to_string(), value));
    BindingTuple::new(bindings)
}

impl WindowOperator {
    pub fn new(input: Box<dyn PhysicalPlan>, spec: WindowSpec) -> Self {
        let frame = match &spec.function {
            WindowFunction::Aggregate(aggregator) => Frame::PeerRows {
                state: aggregator.create_state(),
                aggregator: aggregator.clone(),
            },
            _ => Frame::CurrentRow {
                row_number: 0,
                rank: 0,
                dense_rank: 0,
                prev_sort: None,
            },
        };
        Self {
            input,
            spec,
            frame,
            partition_prev: None,
            pending: VecDeque::new(),
            lookahead: None,
        }
    }

    fn sort_keys(&self) -> Vec<Expression> {
        self.spec
            .sort_list
            .iter()
            .map(|(key, _)| key.clone())
            .collect()
    }

    fn pull(&mut self) -> QueryResult<Option<BindingTuple>> {
        match self.lookahead.take() {
            Some(row) => Ok(Some(row)),
            None => self.input.next(),
        }
    }
}

impl PhysicalPlan for WindowOperator {
    fn open(&mut self) -> QueryResult<()> {
        self.partition_prev = None;
        self.pending.clear();
        self.lookahead = None;
        if let Frame::CurrentRow {
            row_number,
            rank,
            dense_rank,
            prev_sort,
        } = &mut self.frame
        {
            *row_number = 0;
            *rank = 0;
            *dense_rank = 0;
            *prev_sort = None;
        }
        if let Frame::PeerRows { state, .. } = &mut self.frame {
            state.reset();
        }
        self.input.open()
    }

    fn next(&mut self) -> QueryResult<Option<BindingTuple>> {
        if let Some(row) = self.pending.pop_front() {
            return Ok(Some(row));
        }
        let Some(row) = self.pull()? else {
            return Ok(None);
        };
        let partition = key_of(&self.spec.partition_by, &row)?;
        let new_partition = match &self.partition_prev {
            Some(prev) => !keys_equal(prev, &partition),
            None => true,
        };
        self.partition_prev = Some(partition.clone());
        let sort_keys = self.sort_keys();
        let name = self.spec.name.clone();

        match &mut self.frame {
            Frame::CurrentRow {
                row_number,
                rank,
                dense_rank,
                prev_sort,
            } => {
                if new_partition {
                    *row_number = 0;
                    *rank = 0;
                    *dense_rank = 0;
                    *prev_sort = None;
                }
                let sort = key_of(&sort_keys, &row)?;
                *row_number += 1;
                // Without sort keys no two rows are peers, so RANK and
                // DENSE_RANK advance with every row.
                let is_peer = !sort_keys.is_empty()
                    && prev_sort
                        .as_ref()
                        .map(|prev| keys_equal(prev, &sort))
                        .unwrap_or(false);
                if !is_peer {
                    *rank = *row_number;
                    *dense_rank += 1;
                    *prev_sort = Some(sort);
                }
                let value = match self.spec.function {
                    WindowFunction::RowNumber => *row_number,
                    WindowFunction::Rank => *rank,
                    WindowFunction::DenseRank => *dense_rank,
                    WindowFunction::Aggregate(_) => unreachable!("aggregate uses the peer frame"),
                };
                Ok(Some(extend(row, &name, ExprValue::Long(value))))
            }
            Frame::PeerRows { aggregator, state } => {
                if new_partition {
                    state.reset();
                }
                // Gather the whole peer group so every peer sees the same
                // running value.
                let first_sort = key_of(&sort_keys, &row)?;
                let mut group = vec![row];
                loop {
                    let peek = match self.lookahead.take() {
                        Some(row) => Some(row),
                        None => self.input.next()?,
                    };
                    let Some(peek) = peek else {
                        break;
                    };
                    let same = keys_equal(&partition, &key_of(&self.spec.partition_by, &peek)?)
                        && keys_equal(&first_sort, &key_of(&sort_keys, &peek)?);
                    if same {
                        group.push(peek);
                    } else {
                        self.lookahead = Some(peek);
                        break;
                    }
                }
                for peer in &group {
                    aggregator.iterate(state, peer)?;
                }
                let value = aggregator.result(state);
                for peer in group {
                    self.pending.push_back(extend(peer, &name, value.clone()));
                }
                Ok(self.pending.pop_front())
            }
        }
    }

    fn close(&mut self) {
        self.pending.clear();
        self.lookahead = None;
        self.input.close();
    }

    fn schema(&self) -> Vec<Column> {
        let mut columns = self.input.schema();
        let expr_type = match &self.spec.function {
            WindowFunction::Aggregate(aggregator) => aggregator.return_type(),
            _ => ExprType::Long,
        };
        columns.push(Column::new(self.spec.name.clone(), expr_type));
        columns
    }

    fn explain_node(&self) -> ExplainNode {
        let function = match &self.spec.function {
            WindowFunction::RowNumber => "row_number()".to_string(),
            WindowFunction::Rank => "rank()".to_string(),
            WindowFunction::DenseRank => "dense_rank()".to_string(),
            WindowFunction::Aggregate(aggregator) => aggregator.to_string(),
        };
        ExplainNode {
            name: "WindowOperator".to_string(),
            description: format!(
                "{}={}, partition=[{}], sort=[{}]",
                self.spec.name,
                function,
                self.spec
                    .partition_by
                    .iter()
                    .map(|k| k.to_string())
                    .collect::<Vec<_>>()
                    .join(", "),
                self.spec
                    .sort_list
                    .iter()
                    .map(|(k, _)| k.to_string())
                    .collect::<Vec<_>>()
                    .join(", "),
            ),
            children: vec![self.input.explain_node()],
        }
    }
}
