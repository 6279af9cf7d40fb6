//! Filter expressions and query options
//!
//! [`Filter`] is the tagged form of the nested filter tree. It is usually
//! assembled with the combinators in this module:
//!
//! ```
//! use runtara_repository::filter::{col, Filter};
//!
//! let filter = Filter::all(vec![
//!     col("email").ilike("%@example.com"),
//!     Filter::any(vec![col("role").eq("admin"), col("role").eq("owner")]),
//!     Filter::relation("teams", col("name").eq("core")),
//! ]);
//! # let _ = filter;
//! ```
//!
//! The legacy untyped shape (`{"email": {"_ilike": "%foo%"}}`, `_and`, `_or`,
//! `_not`, nested relation objects) is accepted through [`Filter::from_json`]
//! and serde.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::error::RepositoryError;
use crate::types::SqlValue;

const AND: &str = "_and";
const OR: &str = "_or";
const NOT: &str = "_not";

/// Operand of a leaf filter
#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
    Value(SqlValue),
    /// Expanded into one parameter per element
    List(Vec<SqlValue>),
}

impl FilterValue {
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::Array(items) => {
                FilterValue::List(items.iter().map(SqlValue::from_json).collect())
            }
            other => FilterValue::Value(SqlValue::from_json(other)),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, FilterValue::Value(SqlValue::Null))
    }

    fn to_json(&self) -> Value {
        match self {
            FilterValue::Value(v) => v.to_json(),
            FilterValue::List(items) => Value::Array(items.iter().map(SqlValue::to_json).collect()),
        }
    }
}

impl From<SqlValue> for FilterValue {
    fn from(value: SqlValue) -> Self {
        FilterValue::Value(value)
    }
}

impl From<Vec<SqlValue>> for FilterValue {
    fn from(values: Vec<SqlValue>) -> Self {
        FilterValue::List(values)
    }
}

/// A nested boolean filter over one entity and its relations
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(try_from = "Value", into = "Value")]
pub enum Filter {
    /// `column` compared through the operator registered as `column + operator`
    Leaf {
        column: String,
        operator: String,
        value: FilterValue,
    },
    And(Vec<Filter>),
    Or(Vec<Filter>),
    Not(Box<Filter>),
    /// Filter evaluated against the entity reached through a named relation
    Relation { name: String, filter: Box<Filter> },
}

impl Filter {
    pub fn leaf(
        column: impl Into<String>,
        operator: impl Into<String>,
        value: impl Into<FilterValue>,
    ) -> Self {
        Filter::Leaf {
            column: column.into(),
            operator: operator.into(),
            value: value.into(),
        }
    }

    /// Every filter must hold
    pub fn all(filters: Vec<Filter>) -> Self {
        Filter::And(filters)
    }

    /// At least one filter must hold
    pub fn any(filters: Vec<Filter>) -> Self {
        Filter::Or(filters)
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(filter: Filter) -> Self {
        Filter::Not(Box::new(filter))
    }

    pub fn relation(name: impl Into<String>, filter: Filter) -> Self {
        Filter::Relation {
            name: name.into(),
            filter: Box::new(filter),
        }
    }

    /// Conjunction of `self` and `other`, flattening an existing `And`
    pub fn and(self, other: Filter) -> Self {
        match self {
            Filter::And(mut filters) => {
                filters.push(other);
                Filter::And(filters)
            }
            first => Filter::And(vec![first, other]),
        }
    }

    /// Like [`Filter::from_json`], reporting failures as [`RepositoryError::InvalidFilter`]
    pub fn parse(value: &Value) -> crate::Result<Self> {
        Self::from_json(value).map_err(RepositoryError::invalid_filter)
    }

    /// Parse the untyped nested shape
    pub fn from_json(value: &Value) -> Result<Self, String> {
        match value {
            Value::Object(map) => parse_object(map),
            other => Err(format!("Filter must be an object, got {}", other)),
        }
    }

    pub fn to_json(&self) -> Value {
        let mut map = Map::new();
        match self {
            Filter::Leaf { column, operator, value } => {
                let mut ops = Map::new();
                ops.insert(operator.clone(), value.to_json());
                map.insert(column.clone(), Value::Object(ops));
            }
            Filter::And(filters) => {
                map.insert(
                    AND.to_string(),
                    Value::Array(filters.iter().map(Filter::to_json).collect()),
                );
            }
            Filter::Or(filters) => {
                map.insert(
                    OR.to_string(),
                    Value::Array(filters.iter().map(Filter::to_json).collect()),
                );
            }
            Filter::Not(inner) => {
                map.insert(NOT.to_string(), inner.to_json());
            }
            Filter::Relation { name, filter } => {
                map.insert(name.clone(), filter.to_json());
            }
        }
        Value::Object(map)
    }
}

fn is_combinator(key: &str) -> bool {
    matches!(key, AND | OR | NOT)
}

fn parse_list(key: &str, value: &Value) -> Result<Vec<Filter>, String> {
    let items = value
        .as_array()
        .ok_or_else(|| format!("'{}' requires a list of filters", key))?;
    items.iter().map(Filter::from_json).collect()
}

fn parse_object(map: &Map<String, Value>) -> Result<Filter, String> {
    let mut parts = Vec::new();

    for (key, value) in map {
        match key.as_str() {
            AND => parts.push(Filter::And(parse_list(key, value)?)),
            OR => parts.push(Filter::Or(parse_list(key, value)?)),
            NOT => parts.push(Filter::not(Filter::from_json(value)?)),
            column => {
                let inner = value
                    .as_object()
                    .ok_or_else(|| format!("Filter for '{}' must be an object", column))?;

                let mut nested = Map::new();
                for (suffix, operand) in inner {
                    if suffix.starts_with('_') && !is_combinator(suffix) {
                        parts.push(Filter::leaf(
                            column,
                            suffix.clone(),
                            FilterValue::from_json(operand),
                        ));
                    } else {
                        nested.insert(suffix.clone(), operand.clone());
                    }
                }

                if !nested.is_empty() || inner.is_empty() {
                    parts.push(Filter::relation(column, parse_object(&nested)?));
                }
            }
        }
    }

    if parts.len() == 1 {
        Ok(parts.remove(0))
    } else {
        Ok(Filter::And(parts))
    }
}

impl TryFrom<Value> for Filter {
    type Error = String;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        Filter::from_json(&value)
    }
}

impl From<Filter> for Value {
    fn from(filter: Filter) -> Self {
        filter.to_json()
    }
}

/// Start a leaf filter on `column`
pub fn col(column: impl Into<String>) -> Column {
    Column(column.into())
}

/// Leaf filter combinators for one column
#[derive(Debug, Clone)]
pub struct Column(String);

impl Column {
    /// Leaf with an arbitrary operator suffix
    pub fn op(self, suffix: impl Into<String>, value: impl Into<FilterValue>) -> Filter {
        Filter::leaf(self.0, suffix, value)
    }

    pub fn eq(self, value: impl Into<SqlValue>) -> Filter {
        self.op("_eq", FilterValue::Value(value.into()))
    }

    pub fn neq(self, value: impl Into<SqlValue>) -> Filter {
        self.op("_neq", FilterValue::Value(value.into()))
    }

    pub fn gt(self, value: impl Into<SqlValue>) -> Filter {
        self.op("_gt", FilterValue::Value(value.into()))
    }

    pub fn gte(self, value: impl Into<SqlValue>) -> Filter {
        self.op("_gte", FilterValue::Value(value.into()))
    }

    pub fn lt(self, value: impl Into<SqlValue>) -> Filter {
        self.op("_lt", FilterValue::Value(value.into()))
    }

    pub fn lte(self, value: impl Into<SqlValue>) -> Filter {
        self.op("_lte", FilterValue::Value(value.into()))
    }

    pub fn like(self, pattern: impl Into<String>) -> Filter {
        self.op("_like", FilterValue::Value(SqlValue::Text(pattern.into())))
    }

    pub fn nlike(self, pattern: impl Into<String>) -> Filter {
        self.op("_nlike", FilterValue::Value(SqlValue::Text(pattern.into())))
    }

    pub fn ilike(self, pattern: impl Into<String>) -> Filter {
        self.op("_ilike", FilterValue::Value(SqlValue::Text(pattern.into())))
    }

    pub fn nilike(self, pattern: impl Into<String>) -> Filter {
        self.op("_nilike", FilterValue::Value(SqlValue::Text(pattern.into())))
    }

    pub fn is_in<I, V>(self, values: I) -> Filter
    where
        I: IntoIterator<Item = V>,
        V: Into<SqlValue>,
    {
        self.op("_in", FilterValue::List(values.into_iter().map(Into::into).collect()))
    }

    pub fn not_in<I, V>(self, values: I) -> Filter
    where
        I: IntoIterator<Item = V>,
        V: Into<SqlValue>,
    {
        self.op("_nin", FilterValue::List(values.into_iter().map(Into::into).collect()))
    }

    pub fn is_null(self) -> Filter {
        self.op("_is_null", FilterValue::Value(SqlValue::Null))
    }

    pub fn is_not_null(self) -> Filter {
        self.op("_is_not_null", FilterValue::Value(SqlValue::Null))
    }
}

// ============================================================================
// Ordering and Pagination
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl SortOrder {
    pub fn as_sql(&self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

impl FromStr for SortOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "ASC" => Ok(SortOrder::Asc),
            "DESC" => Ok(SortOrder::Desc),
            _ => Err(format!("Invalid sort order: '{}'. Must be 'ASC' or 'DESC'.", s)),
        }
    }
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

fn order_pairs(map: Map<String, Value>, out: &mut Vec<(String, SortOrder)>) -> Result<(), String> {
    for (column, direction) in map {
        let direction = direction
            .as_str()
            .ok_or_else(|| format!("Sort order for '{}' must be a string", column))
            .and_then(SortOrder::from_str)?;
        out.push((column, direction));
    }
    Ok(())
}

/// Accepts `{"col": "asc"}` or, to keep several columns in caller order,
/// `[{"a": "desc"}, {"b": "asc"}]`
fn deserialize_order<'de, D>(deserializer: D) -> Result<Vec<(String, SortOrder)>, D::Error>
where
    D: Deserializer<'de>,
{
    let mut order = Vec::new();
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => {}
        Some(Value::Object(map)) => order_pairs(map, &mut order).map_err(serde::de::Error::custom)?,
        Some(Value::Array(items)) => {
            for item in items {
                let Value::Object(map) = item else {
                    return Err(serde::de::Error::custom("Sort entries must be objects"));
                };
                order_pairs(map, &mut order).map_err(serde::de::Error::custom)?;
            }
        }
        Some(_) => return Err(serde::de::Error::custom("'order' must be an object or a list")),
    }
    Ok(order)
}

/// Filter, sort and pagination for a read; absent parts are unconstrained
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Query {
    #[serde(rename = "where", default)]
    pub filter: Option<Filter>,
    /// Column and direction pairs, applied in order
    #[serde(default, deserialize_with = "deserialize_order")]
    pub order: Vec<(String, SortOrder)>,
    #[serde(default)]
    pub limit: Option<i64>,
    #[serde(default)]
    pub offset: Option<i64>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn order_by(mut self, column: impl Into<String>, order: SortOrder) -> Self {
        self.order.push((column.into(), order));
        self
    }

    pub fn limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: i64) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Set pagination
    pub fn paginate(self, offset: i64, limit: i64) -> Self {
        self.offset(offset).limit(limit)
    }

    /// Parse `{"where": ..., "order": ..., "limit": n, "offset": n}`
    pub fn from_json(value: Value) -> crate::Result<Self> {
        Ok(serde_json::from_value(value)?)
    }
}
