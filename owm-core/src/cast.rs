use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};
use thiserror::Error;

use crate::time::from_epoch_seconds;

/// Declared type of an output column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    Date,
    Float,
    Int,
    Boolean,
    String,
}

impl ColumnType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ColumnType::Date => "date",
            ColumnType::Float => "float",
            ColumnType::Int => "int",
            ColumnType::Boolean => "boolean",
            ColumnType::String => "string",
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unknown names fall back to `string`, matching how unknown keys are cast.
impl FromStr for ColumnType {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "date" => ColumnType::Date,
            "float" => ColumnType::Float,
            "int" => ColumnType::Int,
            "boolean" => ColumnType::Boolean,
            _ => ColumnType::String,
        })
    }
}

#[derive(Debug, Error)]
#[error("Cannot cast {value} to {target}")]
pub struct CastError {
    pub value: Value,
    pub target: ColumnType,
}

const TRUTHY_TOKENS: &[&str] = &["true", "True", "TRUE", "1", "T", "Vrai", "V"];

/// JSON-level truthiness: null, false, zero, "" and empty containers are falsy.
pub fn is_falsy(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
    }
}

/// Cast a flattened scalar to `target`. Falsy values are returned unchanged.
pub fn cast(value: &Value, target: ColumnType) -> Result<Value, CastError> {
    if is_falsy(value) {
        return Ok(value.clone());
    }

    let fail = || CastError {
        value: value.clone(),
        target,
    };

    match target {
        ColumnType::Date => {
            let ts = as_f64(value).ok_or_else(fail)? as i64;
            let dt = from_epoch_seconds(ts).map_err(|_| fail())?;
            Ok(Value::String(format!("{}Z", dt.format("%Y-%m-%dT%H:%M:%S"))))
        }
        ColumnType::Float => {
            let f = as_f64(value).ok_or_else(fail)?;
            Number::from_f64(f).map(Value::Number).ok_or_else(fail)
        }
        ColumnType::Int => {
            let i = match value {
                Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f.trunc() as i64)),
                Value::String(s) => s.trim().parse::<i64>().ok(),
                Value::Bool(b) => Some(i64::from(*b)),
                _ => None,
            };
            i.map(Value::from).ok_or_else(fail)
        }
        ColumnType::Boolean => Ok(Value::Bool(is_truthy_token(value))),
        ColumnType::String => Ok(Value::String(match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })),
    }
}

fn as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    }
}

fn is_truthy_token(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64() == Some(1.0),
        Value::String(s) => TRUTHY_TOKENS.contains(&s.as_str()),
        _ => false,
    }
}
