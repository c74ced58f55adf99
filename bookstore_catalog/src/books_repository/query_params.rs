use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde_json::Value;
use tokio_postgres::types::{ToSql, Type};
use tokio_postgres::Row;

use crate::api::QueryRow;
use crate::books_repository::{BooksRepositoryError, ValidationError};

pub type SqlParam = Box<dyn ToSql + Sync + Send>;

/// Converts caller supplied JSON values into parameters of the types
/// postgres inferred for the prepared statement.
pub fn bind_params(values: &[Value], types: &[Type]) -> Result<Vec<SqlParam>, ValidationError> {
    if values.len() != types.len() {
        return Err(ValidationError::ParameterCount {
            expected: types.len(),
            got: values.len(),
        });
    }
    values
        .iter()
        .zip(types)
        .enumerate()
        .map(|(index, (value, ty))| {
            to_sql_param(value, ty).map_err(|reason| ValidationError::InvalidParameter {
                position: index + 1,
                reason,
            })
        })
        .collect()
}

fn to_sql_param(value: &Value, ty: &Type) -> Result<SqlParam, String> {
    macro_rules! nullable {
        ($rust_ty:ty, $convert:expr) => {{
            let converted: Option<$rust_ty> = match value {
                Value::Null => None,
                other => Some($convert(other)?),
            };
            Ok(Box::new(converted) as SqlParam)
        }};
    }

    match *ty {
        Type::BOOL => nullable!(bool, |v: &Value| v
            .as_bool()
            .ok_or_else(|| format!("expected boolean, got {v}"))),
        Type::INT2 => nullable!(i16, |v: &Value| as_integer(v)
            .and_then(|n| i16::try_from(n).map_err(|_| format!("{n} out of range for smallint")))),
        Type::INT4 => nullable!(i32, |v: &Value| as_integer(v)
            .and_then(|n| i32::try_from(n).map_err(|_| format!("{n} out of range for integer")))),
        Type::INT8 => nullable!(i64, as_integer),
        Type::FLOAT4 => nullable!(f32, |v: &Value| as_float(v).map(|f| f as f32)),
        Type::FLOAT8 => nullable!(f64, as_float),
        Type::NUMERIC => nullable!(Decimal, |v: &Value| match v {
            Value::Number(n) => Decimal::from_str(&n.to_string())
                .or_else(|_| Decimal::from_scientific(&n.to_string()))
                .map_err(|err| err.to_string()),
            Value::String(s) => Decimal::from_str(s.trim()).map_err(|err| err.to_string()),
            other => Err(format!("expected number, got {other}")),
        }),
        Type::TEXT | Type::VARCHAR | Type::BPCHAR | Type::NAME | Type::UNKNOWN => {
            nullable!(String, |v: &Value| match v {
                Value::String(s) => Ok(s.clone()),
                Value::Number(n) => Ok(n.to_string()),
                Value::Bool(b) => Ok(b.to_string()),
                other => Err(format!("expected string, got {other}")),
            })
        }
        Type::TIMESTAMPTZ => nullable!(DateTime<Utc>, |v: &Value| as_str(v).and_then(|s| {
            DateTime::parse_from_rfc3339(s)
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|err| format!("{s:?} is not an RFC 3339 timestamp: {err}"))
        })),
        Type::TEXT_ARRAY | Type::VARCHAR_ARRAY => nullable!(Vec<String>, |v: &Value| match v {
            Value::Array(items) => items
                .iter()
                .map(|item| {
                    item.as_str()
                        .map(str::to_string)
                        .ok_or_else(|| format!("expected array of strings, got {item}"))
                })
                .collect::<Result<Vec<_>, _>>(),
            other => Err(format!("expected array, got {other}")),
        }),
        Type::JSON | Type::JSONB => Ok(Box::new(value.clone()) as SqlParam),
        ref other => Err(format!("unsupported parameter type {other}")),
    }
}

fn as_integer(value: &Value) -> Result<i64, String> {
    match value {
        Value::Number(n) => n.as_i64().ok_or_else(|| format!("expected integer, got {n}")),
        Value::String(s) => s
            .trim()
            .parse()
            .map_err(|_| format!("expected integer, got {s:?}")),
        other => Err(format!("expected integer, got {other}")),
    }
}

fn as_float(value: &Value) -> Result<f64, String> {
    match value {
        Value::Number(n) => n.as_f64().ok_or_else(|| format!("expected number, got {n}")),
        Value::String(s) => s
            .trim()
            .parse()
            .map_err(|_| format!("expected number, got {s:?}")),
        other => Err(format!("expected number, got {other}")),
    }
}

fn as_str(value: &Value) -> Result<&str, String> {
    value
        .as_str()
        .ok_or_else(|| format!("expected string, got {value}"))
}

/// Converts a result row into a column name to JSON value mapping
pub fn row_to_json(row: &Row) -> Result<QueryRow, BooksRepositoryError> {
    row.columns()
        .iter()
        .enumerate()
        .map(|(index, column)| Ok((column.name().to_string(), column_to_json(row, index, column.type_())?)))
        .collect()
}

fn column_to_json(row: &Row, index: usize, ty: &Type) -> Result<Value, BooksRepositoryError> {
    let value = match *ty {
        Type::BOOL => row.try_get::<_, Option<bool>>(index)?.map(Value::from),
        Type::INT2 => row.try_get::<_, Option<i16>>(index)?.map(Value::from),
        Type::INT4 => row.try_get::<_, Option<i32>>(index)?.map(Value::from),
        Type::INT8 => row.try_get::<_, Option<i64>>(index)?.map(Value::from),
        Type::FLOAT4 => row.try_get::<_, Option<f32>>(index)?.map(Value::from),
        Type::FLOAT8 => row.try_get::<_, Option<f64>>(index)?.map(Value::from),
        Type::NUMERIC => row
            .try_get::<_, Option<Decimal>>(index)?
            .map(decimal_to_json),
        Type::TEXT | Type::VARCHAR | Type::BPCHAR | Type::NAME => {
            row.try_get::<_, Option<String>>(index)?.map(Value::from)
        }
        Type::TIMESTAMPTZ => row
            .try_get::<_, Option<DateTime<Utc>>>(index)?
            .map(|ts| Value::from(ts.to_rfc3339())),
        Type::TIMESTAMP => row
            .try_get::<_, Option<NaiveDateTime>>(index)?
            .map(|ts| Value::from(ts.to_string())),
        Type::DATE => row
            .try_get::<_, Option<NaiveDate>>(index)?
            .map(|date| Value::from(date.to_string())),
        Type::JSON | Type::JSONB => row.try_get::<_, Option<Value>>(index)?,
        Type::TEXT_ARRAY | Type::VARCHAR_ARRAY => row
            .try_get::<_, Option<Vec<String>>>(index)?
            .map(Value::from),
        ref other => {
            return Err(BooksRepositoryError::Other(format!(
                "Unsupported column type {other} for column {index}"
            )))
        }
    };
    Ok(value.unwrap_or(Value::Null))
}

/// Decimals are returned as JSON numbers, 19.99 stays 19.99
pub fn decimal_to_json(value: Decimal) -> Value {
    value
        .to_f64()
        .and_then(serde_json::Number::from_f64)
        .map(Value::Number)
        .unwrap_or_else(|| Value::String(value.to_string()))
}
