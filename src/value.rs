//! # Domain Value Type
//!
//! The closed set of literal values a column can hold. Every condition
//! value, insert/update payload entry, and raw-SQL parameter reduces to
//! [`Value`] (or an ordered sequence of it for membership predicates), and
//! binding to the driver happens in exactly one place: [`bind_values`].

use chrono::NaiveDateTime;
use serde::{Serialize, Serializer};
use sqlx::postgres::{PgArguments, PgRow};
use sqlx::query::Query;
use sqlx::{Postgres, Row, TypeInfo, ValueRef};
use uuid::Uuid;

use crate::error::{QuarryError, Result};

/// A literal column value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Text(String),
    Bool(bool),
    Int(i32),
    BigInt(i64),
    Float(f32),
    Double(f64),
    Timestamp(NaiveDateTime),
    Uuid(Uuid),
    Null,
}

/// The semantic type of a column, used by the schema registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Text,
    Bool,
    Int,
    BigInt,
    Float,
    Double,
    Timestamp,
    Uuid,
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// The kind of this value; `None` for null.
    pub fn kind(&self) -> Option<ValueKind> {
        match self {
            Value::Text(_) => Some(ValueKind::Text),
            Value::Bool(_) => Some(ValueKind::Bool),
            Value::Int(_) => Some(ValueKind::Int),
            Value::BigInt(_) => Some(ValueKind::BigInt),
            Value::Float(_) => Some(ValueKind::Float),
            Value::Double(_) => Some(ValueKind::Double),
            Value::Timestamp(_) => Some(ValueKind::Timestamp),
            Value::Uuid(_) => Some(ValueKind::Uuid),
            Value::Null => None,
        }
    }

    /// Read one column of a fetched row as a [`Value`], dispatching on the
    /// column's Postgres type. Used for raw value tuples and for cursor
    /// extraction in keyset pagination.
    pub fn from_row_column(row: &PgRow, column: &str) -> Result<Value> {
        let raw = row.try_get_raw(column)?;
        if raw.is_null() {
            return Ok(Value::Null);
        }
        let type_name = raw.type_info().name().to_string();

        match type_name.as_str() {
            "TEXT" | "VARCHAR" | "CHAR" | "BPCHAR" | "NAME" => {
                Ok(Value::Text(row.try_get(column)?))
            }
            "BOOL" => Ok(Value::Bool(row.try_get(column)?)),
            "INT2" => Ok(Value::Int(i32::from(row.try_get::<i16, _>(column)?))),
            "INT4" => Ok(Value::Int(row.try_get(column)?)),
            "INT8" => Ok(Value::BigInt(row.try_get(column)?)),
            "FLOAT4" => Ok(Value::Float(row.try_get(column)?)),
            "FLOAT8" => Ok(Value::Double(row.try_get(column)?)),
            "TIMESTAMP" => Ok(Value::Timestamp(row.try_get(column)?)),
            "TIMESTAMPTZ" => Ok(Value::Timestamp(
                row.try_get::<chrono::DateTime<chrono::Utc>, _>(column)?
                    .naive_utc(),
            )),
            "UUID" => Ok(Value::Uuid(row.try_get(column)?)),
            other => Err(QuarryError::usage(format!(
                "column {column} has unsupported type {other} for literal decoding"
            ))),
        }
    }
}

/// Bind an ordered argument list onto a prepared query, in positional order.
pub fn bind_values<'q>(
    mut query: Query<'q, Postgres, PgArguments>,
    args: &[Value],
) -> Query<'q, Postgres, PgArguments> {
    for value in args {
        query = match value {
            Value::Text(v) => query.bind(v.clone()),
            Value::Bool(v) => query.bind(*v),
            Value::Int(v) => query.bind(*v),
            Value::BigInt(v) => query.bind(*v),
            Value::Float(v) => query.bind(*v),
            Value::Double(v) => query.bind(*v),
            Value::Timestamp(v) => query.bind(*v),
            Value::Uuid(v) => query.bind(*v),
            Value::Null => query.bind(Option::<String>::None),
        };
    }
    query
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Value::Text(v) => serializer.serialize_str(v),
            Value::Bool(v) => serializer.serialize_bool(*v),
            Value::Int(v) => serializer.serialize_i32(*v),
            Value::BigInt(v) => serializer.serialize_i64(*v),
            Value::Float(v) => serializer.serialize_f32(*v),
            Value::Double(v) => serializer.serialize_f64(*v),
            Value::Timestamp(v) => {
                serializer.serialize_str(&v.format("%Y-%m-%dT%H:%M:%S%.6f").to_string())
            }
            Value::Uuid(v) => serializer.serialize_str(&v.to_string()),
            Value::Null => serializer.serialize_none(),
        }
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::BigInt(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Float(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Double(v)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(v: NaiveDateTime) -> Self {
        Value::Timestamp(v)
    }
}

impl From<Uuid> for Value {
    fn from(v: Uuid) -> Self {
        Value::Uuid(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(inner) => inner.into(),
            None => Value::Null,
        }
    }
}
