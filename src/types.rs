//! Core type definitions
//!
//! Includes column types and the typed values bound as statement parameters.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

/// RFC 3339, or PostgreSQL's text output (`2024-01-15 10:30:00.5+00`)
fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(s)
        .or_else(|_| DateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f%#z"))
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| format!("Invalid timestamp format '{}': {}", s, e))
}

// ============================================================================
// Column Types
// ============================================================================

/// Declared storage type of a column
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnType {
    /// Text field (maps to TEXT)
    String,

    /// Integer field (maps to BIGINT)
    Integer,

    /// Floating point field (maps to DOUBLE PRECISION)
    Float,

    /// Decimal field with precision and scale (maps to NUMERIC)
    Decimal { precision: u8, scale: u8 },

    /// Boolean field (maps to BOOLEAN)
    Boolean,

    /// Timestamp field, always UTC (maps to TIMESTAMP WITH TIME ZONE)
    Timestamp,

    /// UUID field (maps to UUID)
    Uuid,

    /// JSON field (maps to JSONB)
    Json,

    /// Text field restricted to a set of values
    Enum { values: Vec<String> },
}

impl ColumnType {
    /// Create a Decimal type with specified precision and scale
    pub fn decimal(precision: u8, scale: u8) -> Self {
        ColumnType::Decimal { precision, scale }
    }

    /// Create an Enum type from its allowed values
    pub fn enumeration<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ColumnType::Enum {
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    /// PostgreSQL type name, used for casting typed NULL parameters
    pub fn to_sql_type(&self) -> String {
        match self {
            ColumnType::String | ColumnType::Enum { .. } => "TEXT".to_string(),
            ColumnType::Integer => "BIGINT".to_string(),
            ColumnType::Float => "DOUBLE PRECISION".to_string(),
            ColumnType::Decimal { precision, scale } => {
                format!("NUMERIC({},{})", precision, scale)
            }
            ColumnType::Boolean => "BOOLEAN".to_string(),
            ColumnType::Timestamp => "TIMESTAMP WITH TIME ZONE".to_string(),
            ColumnType::Uuid => "UUID".to_string(),
            ColumnType::Json => "JSONB".to_string(),
        }
    }

    /// Convert a value to the representation bound for this column.
    ///
    /// NULL passes through unchanged.
    pub fn normalize(&self, value: SqlValue) -> Result<SqlValue, String> {
        if value.is_null() {
            return Ok(value);
        }

        match (self, value) {
            (ColumnType::String, SqlValue::Text(s)) => Ok(SqlValue::Text(s)),
            (ColumnType::String, SqlValue::Uuid(u)) => Ok(SqlValue::Text(u.to_string())),
            (ColumnType::String, SqlValue::Timestamp(t)) => Ok(SqlValue::Text(t.to_rfc3339())),
            (ColumnType::String, SqlValue::Decimal(d)) => Ok(SqlValue::Text(d.to_string())),

            (ColumnType::Integer, SqlValue::Int(i)) => Ok(SqlValue::Int(i)),
            (ColumnType::Integer, SqlValue::Text(s)) => s
                .parse::<i64>()
                .map(SqlValue::Int)
                .map_err(|_| format!("Cannot convert '{}' to integer", s)),

            (ColumnType::Float, SqlValue::Float(f)) => Ok(SqlValue::Float(f)),
            (ColumnType::Float, SqlValue::Int(i)) => Ok(SqlValue::Float(i as f64)),
            (ColumnType::Float, SqlValue::Text(s)) => s
                .parse::<f64>()
                .map(SqlValue::Float)
                .map_err(|_| format!("Cannot convert '{}' to float", s)),

            (ColumnType::Decimal { .. }, SqlValue::Decimal(d)) => Ok(SqlValue::Decimal(d)),
            (ColumnType::Decimal { .. }, SqlValue::Int(i)) => {
                Ok(SqlValue::Decimal(Decimal::from(i)))
            }
            (ColumnType::Decimal { .. }, SqlValue::Float(f)) => Decimal::try_from(f)
                .map(SqlValue::Decimal)
                .map_err(|e| format!("Cannot convert {} to decimal: {}", f, e)),
            (ColumnType::Decimal { .. }, SqlValue::Text(s)) => Decimal::from_str(&s)
                .map(SqlValue::Decimal)
                .map_err(|_| format!("Cannot convert '{}' to decimal", s)),

            (ColumnType::Boolean, SqlValue::Bool(b)) => Ok(SqlValue::Bool(b)),
            (ColumnType::Boolean, SqlValue::Text(s)) => match s.to_lowercase().as_str() {
                "true" | "1" | "yes" => Ok(SqlValue::Bool(true)),
                "false" | "0" | "no" => Ok(SqlValue::Bool(false)),
                _ => Err(format!("Cannot convert '{}' to boolean", s)),
            },

            (ColumnType::Timestamp, SqlValue::Timestamp(t)) => Ok(SqlValue::Timestamp(t)),
            (ColumnType::Timestamp, SqlValue::Text(s)) => {
                parse_timestamp(&s).map(SqlValue::Timestamp)
            }

            (ColumnType::Uuid, SqlValue::Uuid(u)) => Ok(SqlValue::Uuid(u)),
            (ColumnType::Uuid, SqlValue::Text(s)) => Uuid::parse_str(&s)
                .map(SqlValue::Uuid)
                .map_err(|_| format!("Cannot convert '{}' to uuid", s)),

            (ColumnType::Json, SqlValue::Json(v)) => Ok(SqlValue::Json(v)),
            (ColumnType::Json, other) => Ok(SqlValue::Json(other.to_json())),

            (ColumnType::Enum { values }, SqlValue::Text(s)) => {
                if values.contains(&s) {
                    Ok(SqlValue::Text(s))
                } else {
                    Err(format!("Value '{}' not in enum values: {:?}", s, values))
                }
            }

            (_, other) => Err(format!(
                "Type mismatch: expected {:?}, got {}",
                self,
                other.type_name()
            )),
        }
    }
}

// ============================================================================
// Bound Values
// ============================================================================

/// A literal value bound to a positional parameter
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Decimal(Decimal),
    Text(String),
    Uuid(Uuid),
    Timestamp(DateTime<Utc>),
    Json(serde_json::Value),
}

impl SqlValue {
    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null)
    }

    /// Short name of the representation, for error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            SqlValue::Null => "null",
            SqlValue::Bool(_) => "boolean",
            SqlValue::Int(_) => "integer",
            SqlValue::Float(_) => "float",
            SqlValue::Decimal(_) => "decimal",
            SqlValue::Text(_) => "text",
            SqlValue::Uuid(_) => "uuid",
            SqlValue::Timestamp(_) => "timestamp",
            SqlValue::Json(_) => "json",
        }
    }

    /// Convert an untyped JSON scalar. Arrays and objects become `Json`.
    pub fn from_json(value: &serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => SqlValue::Null,
            serde_json::Value::Bool(b) => SqlValue::Bool(*b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => SqlValue::Int(i),
                None => SqlValue::Float(n.as_f64().unwrap_or_default()),
            },
            serde_json::Value::String(s) => SqlValue::Text(s.clone()),
            other => SqlValue::Json(other.clone()),
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            SqlValue::Null => serde_json::Value::Null,
            SqlValue::Bool(b) => serde_json::Value::Bool(*b),
            SqlValue::Int(i) => serde_json::Value::from(*i),
            SqlValue::Float(f) => serde_json::Value::from(*f),
            SqlValue::Decimal(d) => serde_json::Value::String(d.to_string()),
            SqlValue::Text(s) => serde_json::Value::String(s.clone()),
            SqlValue::Uuid(u) => serde_json::Value::String(u.to_string()),
            SqlValue::Timestamp(t) => serde_json::Value::String(t.to_rfc3339()),
            SqlValue::Json(v) => v.clone(),
        }
    }

    /// Textual form of a non-null value
    pub fn to_text(&self) -> Option<String> {
        match self {
            SqlValue::Null => None,
            SqlValue::Text(s) => Some(s.clone()),
            SqlValue::Json(v) => Some(v.to_string()),
            SqlValue::Bool(b) => Some(b.to_string()),
            SqlValue::Int(i) => Some(i.to_string()),
            SqlValue::Float(f) => Some(f.to_string()),
            SqlValue::Decimal(d) => Some(d.to_string()),
            SqlValue::Uuid(u) => Some(u.to_string()),
            SqlValue::Timestamp(t) => Some(t.to_rfc3339()),
        }
    }
}

impl From<bool> for SqlValue {
    fn from(value: bool) -> Self {
        SqlValue::Bool(value)
    }
}

impl From<i32> for SqlValue {
    fn from(value: i32) -> Self {
        SqlValue::Int(value as i64)
    }
}

impl From<i64> for SqlValue {
    fn from(value: i64) -> Self {
        SqlValue::Int(value)
    }
}

impl From<f64> for SqlValue {
    fn from(value: f64) -> Self {
        SqlValue::Float(value)
    }
}

impl From<Decimal> for SqlValue {
    fn from(value: Decimal) -> Self {
        SqlValue::Decimal(value)
    }
}

impl From<&str> for SqlValue {
    fn from(value: &str) -> Self {
        SqlValue::Text(value.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(value: String) -> Self {
        SqlValue::Text(value)
    }
}

impl From<&String> for SqlValue {
    fn from(value: &String) -> Self {
        SqlValue::Text(value.clone())
    }
}

impl From<Uuid> for SqlValue {
    fn from(value: Uuid) -> Self {
        SqlValue::Uuid(value)
    }
}

impl From<DateTime<Utc>> for SqlValue {
    fn from(value: DateTime<Utc>) -> Self {
        SqlValue::Timestamp(value)
    }
}

impl From<serde_json::Value> for SqlValue {
    fn from(value: serde_json::Value) -> Self {
        SqlValue::from_json(&value)
    }
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(SqlValue::Null, Into::into)
    }
}
