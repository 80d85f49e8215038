//! Per-row binding environment.

use crate::data::value::ExprValue;
use std::fmt;

/// Immutable environment mapping field names to values for one row.
///
/// Constructed once per row by the storage layer or by upstream operators
/// (e.g. aggregation output) and never mutated afterwards. Resolving an
/// unbound name yields `Missing` rather than failing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BindingTuple {
    bindings: Vec<(String, ExprValue)>,
}

impl BindingTuple {
    pub fn new(bindings: Vec<(String, ExprValue)>) -> Self {
        Self { bindings }
    }

    /// Build from a struct value. Non-struct values produce an empty
    /// environment where every reference resolves to `Missing`.
    pub fn from_value(value: &ExprValue) -> Self {
        match value {
            ExprValue::Tuple(fields) => Self {
                bindings: fields.clone(),
            },
            _ => Self::default(),
        }
    }

    /// Resolve a field name; `Missing` when unbound.
    pub fn resolve(&self, name: &str) -> ExprValue {
        self.bindings
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.clone())
            .unwrap_or(ExprValue::Missing)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.bindings.iter().map(|(n, _)| n.as_str())
    }

    /// The row as a struct value, preserving binding order.
    pub fn as_value(&self) -> ExprValue {
        ExprValue::Tuple(self.bindings.clone())
    }
}

impl fmt::Display for BindingTuple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_value())
    }
}

impl FromIterator<(String, ExprValue)> for BindingTuple {
    fn from_iter<I: IntoIterator<Item = (String, ExprValue)>>(iter: I) -> Self {
        Self {
            bindings: iter.into_iter().collect(),
        }
    }
}
