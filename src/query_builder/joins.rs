//! JOIN clause descriptors.

use super::compiler::quote_ident;

/// Supported SQL JOIN kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    Inner,
    Left,
    Right,
    Full,
}

impl JoinKind {
    pub fn to_sql(self) -> &'static str {
        match self {
            JoinKind::Inner => "INNER JOIN",
            JoinKind::Left => "LEFT JOIN",
            JoinKind::Right => "RIGHT JOIN",
            JoinKind::Full => "FULL OUTER JOIN",
        }
    }
}

/// How a join is matched: a primary/foreign key pair, or an arbitrary ON
/// expression passed through verbatim.
#[derive(Debug, Clone, PartialEq)]
pub enum JoinOn {
    ForeignKey {
        /// Key column on the base table.
        primary_key: String,
        /// Referencing column on the joined table.
        foreign_key: String,
    },
    Expression(String),
}

/// A single JOIN clause.
#[derive(Debug, Clone, PartialEq)]
pub struct Join {
    pub kind: JoinKind,
    pub table: String,
    pub on: JoinOn,
}

impl Join {
    pub fn inner(table: impl Into<String>, on: impl Into<String>) -> Self {
        Self {
            kind: JoinKind::Inner,
            table: table.into(),
            on: JoinOn::Expression(on.into()),
        }
    }

    pub fn left(table: impl Into<String>, on: impl Into<String>) -> Self {
        Self {
            kind: JoinKind::Left,
            table: table.into(),
            on: JoinOn::Expression(on.into()),
        }
    }

    pub fn right(table: impl Into<String>, on: impl Into<String>) -> Self {
        Self {
            kind: JoinKind::Right,
            table: table.into(),
            on: JoinOn::Expression(on.into()),
        }
    }

    pub fn full(table: impl Into<String>, on: impl Into<String>) -> Self {
        Self {
            kind: JoinKind::Full,
            table: table.into(),
            on: JoinOn::Expression(on.into()),
        }
    }

    pub fn foreign_key(
        kind: JoinKind,
        table: impl Into<String>,
        primary_key: impl Into<String>,
        foreign_key: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            table: table.into(),
            on: JoinOn::ForeignKey {
                primary_key: primary_key.into(),
                foreign_key: foreign_key.into(),
            },
        }
    }

    /// Render this join against the given base table.
    pub fn to_sql(&self, base_table: &str) -> String {
        let on = match &self.on {
            JoinOn::ForeignKey {
                primary_key,
                foreign_key,
            } => format!(
                "{}.{} = {}.{}",
                quote_ident(base_table),
                quote_ident(primary_key),
                quote_ident(&self.table),
                quote_ident(foreign_key)
            ),
            JoinOn::Expression(expression) => expression.clone(),
        };
        format!("{} {} ON {}", self.kind.to_sql(), quote_ident(&self.table), on)
    }
}
