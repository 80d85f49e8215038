//! Natural ordering over values with NULL placement decorators.
//!
//! Sorting needs a total order, but `ExprValue::compare` raises on absent
//! values by design. `ValueOrdering` closes the gap: it decides where
//! NULL/MISSING sort (MISSING sorts as NULL) and optionally reverses the
//! natural direction. Decoration is idempotent and reversing twice restores
//! the original comparisons.

use crate::data::value::ExprValue;
use std::cmp::Ordering;

/// Where absent values (NULL and MISSING) are placed in sort output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NullPlacement {
    First,
    Last,
}

/// Comparator over `ExprValue`s: natural ordering plus decorators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValueOrdering {
    nulls: NullPlacement,
    reversed: bool,
}

impl ValueOrdering {
    /// Ascending natural ordering, NULLs first.
    pub fn natural() -> Self {
        Self {
            nulls: NullPlacement::First,
            reversed: false,
        }
    }

    pub fn nulls_first(self) -> Self {
        Self {
            nulls: NullPlacement::First,
            ..self
        }
    }

    pub fn nulls_last(self) -> Self {
        Self {
            nulls: NullPlacement::Last,
            ..self
        }
    }

    pub fn reversed(self) -> Self {
        Self {
            reversed: !self.reversed,
            ..self
        }
    }

    /// Total comparison. Absent values compare per the NULL placement
    /// (MISSING sorts as NULL); values the natural order cannot compare are
    /// treated as ties, since the analyzer guarantees same-typed sort keys.
    pub fn compare(&self, a: &ExprValue, b: &ExprValue) -> Ordering {
        let natural = match (a.is_absent(), b.is_absent()) {
            (true, true) => Ordering::Equal,
            (true, false) => match self.nulls {
                NullPlacement::First => Ordering::Less,
                NullPlacement::Last => Ordering::Greater,
            },
            (false, true) => match self.nulls {
                NullPlacement::First => Ordering::Greater,
                NullPlacement::Last => Ordering::Less,
            },
            (false, false) => a.compare(b).unwrap_or(Ordering::Equal),
        };
        if self.reversed {
            natural.reverse()
        } else {
            natural
        }
    }
}

impl Default for ValueOrdering {
    fn default() -> Self {
        Self::natural()
    }
}
