//! Limit/offset operator.

use crate::data::BindingTuple;
use crate::error::QueryResult;
use crate::executor::{Column, ExplainNode, PhysicalPlan};

pub struct LimitOperator {
    input: Box<dyn PhysicalPlan>,
    limit: usize,
    offset: usize,
    emitted: usize,
    skipped: usize,
}

impl LimitOperator {
    pub fn new(input: Box<dyn PhysicalPlan>, limit: usize, offset: usize) -> Self {
        Self {
            input,
            limit,
            offset,
            emitted: 0,
            skipped: 0,
        }
    }
}

impl PhysicalPlan for LimitOperator {
    fn open(&mut self) -> QueryResult<()> {
        self.emitted = 0;
        self.skipped = 0;
        self.input.open()
    }

    fn next(&mut self) -> QueryResult<Option<BindingTuple>> {
        // Stop pulling once the limit is reached so upstream scans can
        // terminate early.
        if self.emitted >= self.limit {
            return Ok(None);
        }
        while self.skipped < self.offset {
            if self.input.next()?.is_none() {
                return Ok(None);
            }
            self.skipped += 1;
        }
        match self.input.next()? {
            Some(row) => {
                self.emitted += 1;
                Ok(Some(row))
            }
            None => Ok(None),
        }
    }

    fn close(&mut self) {
        self.input.close();
    }

    fn schema(&self) -> Vec<Column> {
        self.input.schema()
    }

    fn explain_node(&self) -> ExplainNode {
        ExplainNode {
            name: "LimitOperator".to_string(),
            description: format!("limit={}, offset={}", self.limit, self.offset),
            children: vec![self.input.explain_node()],
        }
    }
}
