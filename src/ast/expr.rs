//! Unresolved expression nodes.

use crate::data::value::ExprValue;
use crate::expression::expr::SpanUnit;

/// Untyped expression produced by the parser.
#[derive(Debug, Clone, PartialEq)]
pub enum UnresolvedExpr {
    /// Literal constant.
    Literal(ExprValue),

    /// Field name, resolved against the symbol table.
    Attribute(String),

    /// Scalar function or operator call, resolved against the registry.
    Function {
        name: String,
        args: Vec<UnresolvedExpr>,
    },

    /// Aggregate call; `arg` is `None` for `count(*)`.
    AggregateCall {
        name: String,
        arg: Option<Box<UnresolvedExpr>>,
    },

    /// Window function call with partition and sort specification.
    WindowCall {
        function: Box<UnresolvedExpr>,
        partition_by: Vec<UnresolvedExpr>,
        sort_list: Vec<(UnresolvedExpr, SortOption)>,
    },

    /// Aliased expression.
    Alias {
        name: String,
        expr: Box<UnresolvedExpr>,
    },

    /// Bucketing expression: field rounded to (interval x unit) buckets.
    Span {
        field: Box<UnresolvedExpr>,
        interval: ExprValue,
        unit: SpanUnit,
    },
}

/// Sort direction and NULL placement for one sort key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortOption {
    pub ascending: bool,
    pub nulls_first: bool,
}

impl SortOption {
    /// ASC with NULLs first, the default sort.
    pub fn asc() -> Self {
        Self {
            ascending: true,
            nulls_first: true,
        }
    }

    /// DESC with NULLs last.
    pub fn desc() -> Self {
        Self {
            ascending: false,
            nulls_first: false,
        }
    }
}

impl UnresolvedExpr {
    pub fn literal(value: ExprValue) -> Self {
        UnresolvedExpr::Literal(value)
    }

    pub fn attr(name: impl Into<String>) -> Self {
        UnresolvedExpr::Attribute(name.into())
    }

    pub fn function(name: impl Into<String>, args: Vec<UnresolvedExpr>) -> Self {
        UnresolvedExpr::Function {
            name: name.into(),
            args,
        }
    }

    pub fn alias(name: impl Into<String>, expr: UnresolvedExpr) -> Self {
        UnresolvedExpr::Alias {
            name: name.into(),
            expr: Box::new(expr),
        }
    }

    pub fn aggregate(name: impl Into<String>, arg: UnresolvedExpr) -> Self {
        UnresolvedExpr::AggregateCall {
            name: name.into(),
            arg: Some(Box::new(arg)),
        }
    }

    pub fn count_star() -> Self {
        UnresolvedExpr::AggregateCall {
            name: "count".to_string(),
            arg: None,
        }
    }

    pub fn span(field: UnresolvedExpr, interval: ExprValue, unit: SpanUnit) -> Self {
        UnresolvedExpr::Span {
            field: Box::new(field),
            interval,
            unit,
        }
    }

    /// Turn a function or aggregate call into a window call.
    pub fn over(
        self,
        partition_by: Vec<UnresolvedExpr>,
        sort_list: Vec<(UnresolvedExpr, SortOption)>,
    ) -> Self {
        UnresolvedExpr::WindowCall {
            function: Box::new(self),
            partition_by,
            sort_list,
        }
    }

    pub fn and(self, other: UnresolvedExpr) -> Self {
        Self::function("and", vec![self, other])
    }

    pub fn or(self, other: UnresolvedExpr) -> Self {
        Self::function("or", vec![self, other])
    }

    pub fn eq(self, other: UnresolvedExpr) -> Self {
        Self::function("=", vec![self, other])
    }

    pub fn lt(self, other: UnresolvedExpr) -> Self {
        Self::function("<", vec![self, other])
    }

    pub fn gt(self, other: UnresolvedExpr) -> Self {
        Self::function(">", vec![self, other])
    }
}
