//! Store values <-> interchange scalars
//!
//! | Store kind | Interchange form |
//! |---|---|
//! | date-time | `YYYY-MM-DDTHH:MM:SS` (seconds precision) |
//! | date | `YYYY-MM-DD` |
//! | decimal | floating number, two minor digits kept |
//! | bool | `true` / `false` |
//! | null | absent key (JSON), empty cell (CSV) |
//!
//! Decimal export goes through `f64`. Loss below the minor unit is accepted;
//! anything coarser fails loudly. Bytes that are not UTF-8 never leave the
//! store as text.

use std::str::FromStr;
use bigdecimal::{BigDecimal, ToPrimitive};
use serde_json::{Map, Number, Value as Json};
use crate::entity::{Column, ColumnKind};
use crate::value::{self, Row, Value, DATE_FORMAT};
use crate::{Error, Result};

/// Interchange form of date-times
pub const INTERCHANGE_DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Digits kept after the decimal point for fixed-point columns
pub const MINOR_DIGITS: i64 = 2;

/// Placeholders that import maps to null
const NULL_PLACEHOLDERS: &[&str] = &["", "None", "none", "null", "NULL", "Null"];

pub fn is_null_placeholder(s: &str) -> bool {
    NULL_PLACEHOLDERS.contains(&s.trim())
}

// ========== Export ==========

/// Convert one store value to its interchange scalar; `None` for null
pub fn to_interchange(column: &str, value: &Value) -> Result<Option<Json>> {
    let json = match value {
        Value::Null => return Ok(None),
        Value::Integer(i) => Json::from(*i),
        Value::Real(r) => Number::from_f64(*r)
            .map(Json::Number)
            .ok_or_else(|| Error::serialization(column, format!("{} is not a finite number", r)))?,
        Value::Bool(b) => Json::Bool(*b),
        Value::Text(s) => Json::String(s.clone()),
        Value::Date(d) => Json::String(d.format(DATE_FORMAT).to_string()),
        Value::DateTime(dt) => Json::String(dt.format(INTERCHANGE_DATETIME_FORMAT).to_string()),
        Value::Decimal(d) => Json::Number(decimal_to_number(column, d)?),
        Value::Blob(bytes) => match std::str::from_utf8(bytes) {
            Ok(text) => Json::String(text.to_string()),
            Err(e) => {
                return Err(Error::serialization(
                    column,
                    format!("{} bytes are not valid UTF-8 ({})", bytes.len(), e),
                ));
            }
        },
    };
    Ok(Some(json))
}

fn decimal_to_number(column: &str, d: &BigDecimal) -> Result<Number> {
    let float = d
        .to_f64()
        .ok_or_else(|| Error::serialization(column, format!("{} does not fit a float", d)))?;
    let number = Number::from_f64(float)
        .ok_or_else(|| Error::serialization(column, format!("{} does not fit a float", d)))?;

    let back = BigDecimal::from_str(&number.to_string())
        .map_err(|e| Error::serialization(column, e.to_string()))?;
    if back.round(MINOR_DIGITS) != d.round(MINOR_DIGITS) {
        return Err(Error::serialization(
            column,
            format!("{} loses more than the minor unit as a float ({})", d, float),
        ));
    }
    Ok(number)
}

/// Text form of one store value for tabular output; empty for null
pub fn to_cell(column: &str, value: &Value) -> Result<String> {
    Ok(match to_interchange(column, value)? {
        None => String::new(),
        Some(Json::String(s)) => s,
        Some(other) => other.to_string(),
    })
}

/// Structured form of a row: null columns are left out
pub fn row_to_object(row: &Row) -> Result<Map<String, Json>> {
    let mut object = Map::new();
    for (column, value) in row.iter() {
        if let Some(json) = to_interchange(column, value)? {
            object.insert(column.to_string(), json);
        }
    }
    Ok(object)
}

/// Tabular form of a row, one cell per column in row order
pub fn row_to_record(row: &Row) -> Result<Vec<String>> {
    row.iter().map(|(column, value)| to_cell(column, value)).collect()
}

// ========== Import ==========

/// Decode an interchange scalar for `column`
pub fn from_interchange(column: &Column, raw: &Json) -> Result<Value> {
    match raw {
        Json::Null => Ok(Value::Null),
        Json::String(s) => from_text(column, s),
        Json::Bool(b) => match column.kind {
            ColumnKind::Bool => Ok(Value::Bool(*b)),
            ColumnKind::Integer => Ok(Value::Integer(*b as i64)),
            ColumnKind::Text => Ok(Value::Text(b.to_string())),
            kind => Err(mismatch(column, kind, raw)),
        },
        Json::Number(n) => match column.kind {
            ColumnKind::Integer => n.as_i64().map(Value::Integer).ok_or_else(|| mismatch(column, column.kind, raw)),
            ColumnKind::Bool => match n.as_i64() {
                Some(0) => Ok(Value::Bool(false)),
                Some(1) => Ok(Value::Bool(true)),
                _ => Err(mismatch(column, column.kind, raw)),
            },
            ColumnKind::Decimal => decode_decimal(column, &n.to_string()),
            ColumnKind::Text => Ok(Value::Text(n.to_string())),
            kind => Err(mismatch(column, kind, raw)),
        },
        Json::Array(_) | Json::Object(_) => Err(mismatch(column, column.kind, raw)),
    }
}

/// Decode a textual cell (CSV field, CLI argument) for `column`
pub fn from_text(column: &Column, raw: &str) -> Result<Value> {
    if is_null_placeholder(raw) {
        return Ok(Value::Null);
    }
    let text = raw.trim();

    match column.kind {
        ColumnKind::Text => Ok(Value::Text(raw.to_string())),
        ColumnKind::Integer => text
            .parse::<i64>()
            .map(Value::Integer)
            .map_err(|e| Error::serialization(column.name, format!("'{}': {}", text, e))),
        ColumnKind::Bool => parse_bool(text)
            .map(Value::Bool)
            .ok_or_else(|| Error::serialization(column.name, format!("'{}' is not a boolean", text))),
        ColumnKind::Date => value::parse_date(text)
            .or_else(|| value::parse_datetime(text).map(|dt| dt.date()))
            .map(Value::Date)
            .ok_or_else(|| Error::serialization(column.name, format!("'{}' is not a date", text))),
        ColumnKind::DateTime => value::parse_datetime(text)
            .or_else(|| value::parse_date(text).and_then(|d| d.and_hms_opt(0, 0, 0)))
            .map(Value::DateTime)
            .ok_or_else(|| Error::serialization(column.name, format!("'{}' is not a date-time", text))),
        ColumnKind::Decimal => decode_decimal(column, text),
        ColumnKind::Choice(choices) => choices
            .canonical(text)
            .map(|name| Value::Text(name.to_string()))
            .map_err(|_| {
                Error::Validation(format!(
                    "'{}' is not a valid {} (expected one of: {})",
                    text,
                    column.name,
                    choices.names.join(", ")
                ))
            }),
    }
}

// ========== Writes ==========

/// Bring a caller-supplied value into the store form of `column`.
///
/// Text is decoded as a CLI/CSV cell would be; other values must already
/// have a compatible kind. Runs before any statement is built, so a value
/// the store could not read back never reaches it.
pub fn normalize(column: &Column, value: &Value) -> Result<Value> {
    let normalized = match (column.kind, value) {
        (_, Value::Null) => Value::Null,

        (ColumnKind::Text, Value::Text(_) | Value::Blob(_)) => value.clone(),
        (ColumnKind::Text, other) => Value::Text(other.to_string()),

        (_, Value::Text(text)) => from_text(column, text)?,

        (ColumnKind::Integer, Value::Integer(_)) => value.clone(),
        (ColumnKind::Integer, Value::Bool(b)) => Value::Integer(*b as i64),

        (ColumnKind::Bool, Value::Bool(_)) => value.clone(),
        (ColumnKind::Bool, Value::Integer(i @ (0 | 1))) => Value::Bool(*i == 1),

        (ColumnKind::Date, Value::Date(_)) => value.clone(),
        (ColumnKind::Date, Value::DateTime(dt)) => Value::Date(dt.date()),

        (ColumnKind::DateTime, Value::DateTime(_)) => value.clone(),
        (ColumnKind::DateTime, Value::Date(d)) => d
            .and_hms_opt(0, 0, 0)
            .map(Value::DateTime)
            .ok_or_else(|| kind_mismatch(column, value))?,

        (ColumnKind::Decimal, Value::Decimal(d)) => Value::Decimal(d.round(MINOR_DIGITS)),
        (ColumnKind::Decimal, Value::Integer(i)) => Value::Decimal(BigDecimal::from(*i)),
        (ColumnKind::Decimal, Value::Real(r)) if r.is_finite() => decode_decimal(column, &r.to_string())?,

        _ => return Err(kind_mismatch(column, value)),
    };
    Ok(normalized)
}

fn kind_mismatch(column: &Column, value: &Value) -> Error {
    Error::serialization(
        column.name,
        format!("{} value '{}' does not fit a {:?} column", value.type_name(), value, column.kind),
    )
}

fn decode_decimal(column: &Column, text: &str) -> Result<Value> {
    BigDecimal::from_str(text)
        .map(|d| Value::Decimal(d.round(MINOR_DIGITS)))
        .map_err(|e| Error::serialization(column.name, format!("'{}': {}", text, e)))
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.to_lowercase().as_str() {
        "true" | "1" | "yes" | "y" => Some(true),
        "false" | "0" | "no" | "n" => Some(false),
        _ => None,
    }
}

fn mismatch(column: &Column, kind: ColumnKind, raw: &Json) -> Error {
    Error::serialization(column.name, format!("{} does not fit a {:?} column", raw, kind))
}
