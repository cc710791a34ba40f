//! Row and parameter types for SQL sessions.
//!
//! Rows are decoded into `serde_json::Value` cells keyed by column name.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use rust_decimal::Decimal;
use serde_json::Value;
use sqlx::postgres::{PgArguments, PgColumn, PgRow};
use sqlx::query::Query;
use sqlx::{Column, Postgres, Row, TypeInfo, ValueRef};
use uuid::Uuid;

/// A positional query parameter, bound as `$1`, `$2`, ...
#[derive(Debug, Clone, PartialEq)]
pub enum QueryParam {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Bytes(Vec<u8>),
    Json(Value),
    Uuid(Uuid),
    Timestamp(DateTime<Utc>),
    Decimal(Decimal),
}

impl QueryParam {
    pub(crate) fn bind<'q>(
        &'q self,
        query: Query<'q, Postgres, PgArguments>,
    ) -> Query<'q, Postgres, PgArguments> {
        match self {
            QueryParam::Null => query.bind(None::<String>),
            QueryParam::Bool(v) => query.bind(*v),
            QueryParam::Int(v) => query.bind(*v),
            QueryParam::Float(v) => query.bind(*v),
            QueryParam::Text(v) => query.bind(v.as_str()),
            QueryParam::Bytes(v) => query.bind(v.as_slice()),
            QueryParam::Json(v) => query.bind(sqlx::types::Json(v)),
            QueryParam::Uuid(v) => query.bind(*v),
            QueryParam::Timestamp(v) => query.bind(*v),
            QueryParam::Decimal(v) => query.bind(*v),
        }
    }
}

impl From<bool> for QueryParam {
    fn from(v: bool) -> Self {
        QueryParam::Bool(v)
    }
}

impl From<i32> for QueryParam {
    fn from(v: i32) -> Self {
        QueryParam::Int(v.into())
    }
}

impl From<i64> for QueryParam {
    fn from(v: i64) -> Self {
        QueryParam::Int(v)
    }
}

impl From<f64> for QueryParam {
    fn from(v: f64) -> Self {
        QueryParam::Float(v)
    }
}

impl From<&str> for QueryParam {
    fn from(v: &str) -> Self {
        QueryParam::Text(v.to_string())
    }
}

impl From<String> for QueryParam {
    fn from(v: String) -> Self {
        QueryParam::Text(v)
    }
}

impl From<Uuid> for QueryParam {
    fn from(v: Uuid) -> Self {
        QueryParam::Uuid(v)
    }
}

impl From<DateTime<Utc>> for QueryParam {
    fn from(v: DateTime<Utc>) -> Self {
        QueryParam::Timestamp(v)
    }
}

impl<T: Into<QueryParam>> From<Option<T>> for QueryParam {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(QueryParam::Null)
    }
}

/// One result row: column name to value, in column order.
#[derive(Debug, Clone, PartialEq)]
pub struct RowMap {
    columns: Vec<(String, Value)>,
    case_insensitive: bool,
}

impl RowMap {
    pub fn new(columns: Vec<(String, Value)>, case_insensitive: bool) -> Self {
        Self {
            columns,
            case_insensitive,
        }
    }

    /// Look up a column. Exact names win over case-insensitive matches.
    pub fn get(&self, column: &str) -> Option<&Value> {
        let exact = self
            .columns
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value);

        match exact {
            Some(value) => Some(value),
            None if self.case_insensitive => self
                .columns
                .iter()
                .find(|(name, _)| name.eq_ignore_ascii_case(column))
                .map(|(_, value)| value),
            None => None,
        }
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|(name, _)| name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.columns.iter().map(|(name, value)| (name.as_str(), value))
    }

    /// The row as a JSON object. Later duplicates of a column name win.
    pub fn into_json(self) -> Value {
        Value::Object(self.columns.into_iter().collect())
    }
}

/// Converter from Postgres rows to [`RowMap`].
pub(crate) struct PgValueConverter;

impl PgValueConverter {
    pub fn row_map(pg_row: &PgRow, case_insensitive: bool) -> RowMap {
        let columns = pg_row
            .columns()
            .iter()
            .enumerate()
            .map(|(idx, col)| (col.name().to_string(), Self::extract_value(pg_row, col, idx)))
            .collect();

        RowMap::new(columns, case_insensitive)
    }

    fn extract_value(row: &PgRow, column: &PgColumn, index: usize) -> Value {
        match row.try_get_raw(index) {
            Ok(raw) if raw.is_null() => return Value::Null,
            Err(_) => return Value::Null,
            _ => {}
        }

        Self::decode_by_type(row, index, column.type_info().name())
    }

    fn decode_by_type(row: &PgRow, index: usize, type_name: &str) -> Value {
        match type_name {
            "BOOL" => Self::decode::<bool>(row, index),

            "INT2" | "SMALLINT" | "SMALLSERIAL" => Self::decode::<i16>(row, index),
            "INT4" | "INT" | "INTEGER" | "SERIAL" => Self::decode::<i32>(row, index),
            "INT8" | "BIGINT" | "BIGSERIAL" => Self::decode::<i64>(row, index),

            "FLOAT4" | "REAL" => Self::decode::<f32>(row, index),
            "FLOAT8" | "DOUBLE PRECISION" => Self::decode::<f64>(row, index),

            // Kept as text so no precision is lost.
            "NUMERIC" | "DECIMAL" => Self::decode_display::<Decimal>(row, index),

            "TEXT" | "VARCHAR" | "CHAR" | "BPCHAR" | "NAME" => Self::decode::<String>(row, index),

            "BYTEA" => row
                .try_get::<Vec<u8>, _>(index)
                .map(|bytes| Value::String(STANDARD.encode(bytes)))
                .unwrap_or(Value::Null),

            "DATE" => Self::decode_display::<NaiveDate>(row, index),
            "TIME" | "TIMETZ" => Self::decode_display::<NaiveTime>(row, index),
            "TIMESTAMP" => Self::decode_display::<NaiveDateTime>(row, index),
            "TIMESTAMPTZ" => row
                .try_get::<DateTime<Utc>, _>(index)
                .map(|t| Value::String(t.to_rfc3339()))
                .unwrap_or(Value::Null),

            "UUID" => Self::decode_display::<Uuid>(row, index),

            "JSON" | "JSONB" => row.try_get::<Value, _>(index).unwrap_or(Value::Null),

            "_INT4" | "INT4[]" => Self::decode::<Vec<i32>>(row, index),
            "_INT8" | "INT8[]" => Self::decode::<Vec<i64>>(row, index),
            "_TEXT" | "TEXT[]" | "_VARCHAR" | "VARCHAR[]" => Self::decode::<Vec<String>>(row, index),
            "_BOOL" | "BOOL[]" => Self::decode::<Vec<bool>>(row, index),
            "_FLOAT8" | "FLOAT8[]" => Self::decode::<Vec<f64>>(row, index),

            _ => Self::decode_as_string_fallback(row, index),
        }
    }

    fn decode<'r, T>(row: &'r PgRow, index: usize) -> Value
    where
        T: sqlx::Decode<'r, Postgres> + sqlx::Type<Postgres> + Into<Value>,
    {
        row.try_get::<T, _>(index).map(Into::into).unwrap_or(Value::Null)
    }

    fn decode_display<'r, T>(row: &'r PgRow, index: usize) -> Value
    where
        T: sqlx::Decode<'r, Postgres> + sqlx::Type<Postgres> + ToString,
    {
        row.try_get::<T, _>(index)
            .map(|v| Value::String(v.to_string()))
            .unwrap_or(Value::Null)
    }

    fn decode_as_string_fallback(row: &PgRow, index: usize) -> Value {
        if let Ok(s) = row.try_get_unchecked::<String, _>(index) {
            return Value::String(s);
        }
        if let Ok(v) = row.try_get::<i64, _>(index) {
            return Value::from(v);
        }
        row.try_get::<f64, _>(index)
            .map(Value::from)
            .unwrap_or(Value::Null)
    }
}
