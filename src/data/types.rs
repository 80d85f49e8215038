//! The expression type lattice.
//!
//! Types form a lattice rather than a flat enum: each type names zero or
//! more wider parent types, and compatibility follows the parent chain.
//! `Undefined` (the type of NULL/MISSING) is usable wherever any type is
//! expected; `Unknown` is the error type and is compatible with nothing.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Data types known to the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExprType {
    Byte,
    Short,
    Integer,
    Long,
    Float,
    Double,
    String,
    /// Full-text field carrying a keyword subfield. Usable as a string
    /// without an implicit cast.
    Text,
    Boolean,
    Date,
    Time,
    Timestamp,
    Interval,
    Struct,
    Array,
    /// Type of NULL and MISSING values.
    Undefined,
    /// Error type; compatible with nothing.
    Unknown,
}

/// Numeric types ordered from narrowest to widest. Position in this list is
/// the promotion rank used by comparisons and arithmetic.
pub const NUMERIC_TYPES: [ExprType; 6] = [
    ExprType::Byte,
    ExprType::Short,
    ExprType::Integer,
    ExprType::Long,
    ExprType::Float,
    ExprType::Double,
];

impl ExprType {
    /// Direct parent types (wider types this one promotes to).
    pub fn parents(&self) -> &'static [ExprType] {
        match self {
            ExprType::Byte => &[ExprType::Short],
            ExprType::Short => &[ExprType::Integer],
            ExprType::Integer => &[ExprType::Long],
            ExprType::Long => &[ExprType::Float],
            ExprType::Float => &[ExprType::Double],
            ExprType::Text => &[ExprType::String],
            ExprType::Date | ExprType::Time => &[ExprType::Timestamp],
            _ => &[],
        }
    }

    /// Whether a value of type `other` can be used where `self` is expected:
    /// true iff `other` equals `self` or `self` is in `other`'s transitive
    /// parent chain. `Undefined` is accepted everywhere.
    pub fn is_compatible(&self, other: ExprType) -> bool {
        if *self == ExprType::Unknown || other == ExprType::Unknown {
            return *self == other;
        }
        if other == ExprType::Undefined {
            return true;
        }
        if *self == other {
            return true;
        }
        other.parents().iter().any(|p| self.is_compatible(*p))
    }

    /// Whether an implicit cast is applied when coercing `other` to `self`.
    /// A text field is usable as a string directly, no cast needed.
    pub fn should_cast(&self, other: ExprType) -> bool {
        match (self, other) {
            (ExprType::String, ExprType::Text) => false,
            _ => self.is_compatible(other) && *self != other,
        }
    }

    pub fn is_numeric(&self) -> bool {
        NUMERIC_TYPES.contains(self)
    }

    /// Rank within the numeric promotion chain; `None` for non-numerics.
    pub fn numeric_rank(&self) -> Option<usize> {
        NUMERIC_TYPES.iter().position(|t| t == self)
    }

    /// The wider of two numeric types, or `None` if either is non-numeric.
    pub fn widest_numeric(a: ExprType, b: ExprType) -> Option<ExprType> {
        let (ra, rb) = (a.numeric_rank()?, b.numeric_rank()?);
        Some(NUMERIC_TYPES[ra.max(rb)])
    }

    pub fn name(&self) -> &'static str {
        match self {
            ExprType::Byte => "BYTE",
            ExprType::Short => "SHORT",
            ExprType::Integer => "INTEGER",
            ExprType::Long => "LONG",
            ExprType::Float => "FLOAT",
            ExprType::Double => "DOUBLE",
            ExprType::String => "STRING",
            ExprType::Text => "TEXT",
            ExprType::Boolean => "BOOLEAN",
            ExprType::Date => "DATE",
            ExprType::Time => "TIME",
            ExprType::Timestamp => "TIMESTAMP",
            ExprType::Interval => "INTERVAL",
            ExprType::Struct => "STRUCT",
            ExprType::Array => "ARRAY",
            ExprType::Undefined => "UNDEFINED",
            ExprType::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for ExprType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_parent_chain() {
        // Each numeric type is usable where any wider numeric is expected.
        assert!(ExprType::Long.is_compatible(ExprType::Integer));
        assert!(ExprType::Double.is_compatible(ExprType::Byte));
        assert!(ExprType::Float.is_compatible(ExprType::Short));

        // Not the other way around.
        assert!(!ExprType::Integer.is_compatible(ExprType::Long));
        assert!(!ExprType::Byte.is_compatible(ExprType::Double));
    }

    #[test]
    fn test_compatibility_consistent_with_parents() {
        // If B appears in A's transitive parent chain, B.is_compatible(A).
        fn chain(mut t: ExprType) -> Vec<ExprType> {
            let mut out = vec![];
            while let Some(&p) = t.parents().first() {
                out.push(p);
                t = p;
            }
            out
        }
        for t in [
            ExprType::Byte,
            ExprType::Short,
            ExprType::Integer,
            ExprType::Long,
            ExprType::Float,
            ExprType::Text,
            ExprType::Date,
            ExprType::Time,
        ] {
            for parent in chain(t) {
                assert!(
                    parent.is_compatible(t),
                    "{} should accept {}",
                    parent,
                    t
                );
            }
        }
    }

    #[test]
    fn test_undefined_and_unknown() {
        assert!(ExprType::Integer.is_compatible(ExprType::Undefined));
        assert!(ExprType::String.is_compatible(ExprType::Undefined));
        assert!(!ExprType::Integer.is_compatible(ExprType::Unknown));
        assert!(!ExprType::Unknown.is_compatible(ExprType::Integer));
        assert!(ExprType::Unknown.is_compatible(ExprType::Unknown));
    }

    #[test]
    fn test_text_refinement() {
        assert!(ExprType::String.is_compatible(ExprType::Text));
        // Usable as a string without an implicit cast.
        assert!(!ExprType::String.should_cast(ExprType::Text));
        // Widening an integer to long does cast.
        assert!(ExprType::Long.should_cast(ExprType::Integer));
        // Same type never casts.
        assert!(!ExprType::Integer.should_cast(ExprType::Integer));
    }

    #[test]
    fn test_widest_numeric() {
        assert_eq!(
            ExprType::widest_numeric(ExprType::Integer, ExprType::Long),
            Some(ExprType::Long)
        );
        assert_eq!(
            ExprType::widest_numeric(ExprType::Double, ExprType::Byte),
            Some(ExprType::Double)
        );
        assert_eq!(
            ExprType::widest_numeric(ExprType::Integer, ExprType::String),
            None
        );
    }

    #[test]
    fn test_temporal_lattice() {
        assert!(ExprType::Timestamp.is_compatible(ExprType::Date));
        assert!(ExprType::Timestamp.is_compatible(ExprType::Time));
        assert!(!ExprType::Date.is_compatible(ExprType::Time));
    }
}
