//! WHERE condition variants.
//!
//! A closed sum type with exhaustive matching in the compiler; adding a
//! condition kind is a compile error until every consumer handles it.
//! Conditions never render themselves - placeholder numbering is a single
//! pass owned by the compiler.

use super::search::SearchQuery;
use crate::value::Value;

#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// Equality (`=`) or, when negated, inequality (`<>`). A null value
    /// routes to `IS [NOT] NULL` instead of a bound parameter.
    Compare {
        column: String,
        value: Value,
        negated: bool,
    },
    /// Membership: `IN` / `NOT IN`. An empty value list is a caller error
    /// surfaced at compile time.
    In {
        column: String,
        values: Vec<Value>,
        negated: bool,
    },
    /// Pattern match via the regex operators `~`, `~*`, `!~`, `!~*`.
    Matches {
        column: String,
        pattern: Value,
        case_insensitive: bool,
        negated: bool,
    },
    /// A raw SQL fragment with `?` placeholders and their positional values.
    Raw {
        fragment: String,
        values: Vec<Value>,
        negated: bool,
    },
    /// Full-text predicate.
    FullText(SearchQuery),
    /// Boolean OR of two conjunctive condition lists.
    Or {
        left: Vec<Condition>,
        right: Vec<Condition>,
    },
}

impl Condition {
    pub fn eq(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Condition::Compare {
            column: column.into(),
            value: value.into(),
            negated: false,
        }
    }

    pub fn is_in(column: impl Into<String>, values: Vec<Value>) -> Self {
        Condition::In {
            column: column.into(),
            values,
            negated: false,
        }
    }

    pub fn matches(
        column: impl Into<String>,
        pattern: impl Into<Value>,
        case_insensitive: bool,
    ) -> Self {
        Condition::Matches {
            column: column.into(),
            pattern: pattern.into(),
            case_insensitive,
            negated: false,
        }
    }

    pub fn raw(fragment: impl Into<String>, values: Vec<Value>) -> Self {
        Condition::Raw {
            fragment: fragment.into(),
            values,
            negated: false,
        }
    }

    /// Flip the negation flag on negatable kinds; full-text and OR trees
    /// have no negated form and pass through unchanged.
    pub fn negated(self) -> Self {
        match self {
            Condition::Compare {
                column,
                value,
                negated,
            } => Condition::Compare {
                column,
                value,
                negated: !negated,
            },
            Condition::In {
                column,
                values,
                negated,
            } => Condition::In {
                column,
                values,
                negated: !negated,
            },
            Condition::Matches {
                column,
                pattern,
                case_insensitive,
                negated,
            } => Condition::Matches {
                column,
                pattern,
                case_insensitive,
                negated: !negated,
            },
            Condition::Raw {
                fragment,
                values,
                negated,
            } => Condition::Raw {
                fragment,
                values,
                negated: !negated,
            },
            other @ (Condition::FullText(_) | Condition::Or { .. }) => other,
        }
    }
}
