//! WHERE clause compilation
//!
//! Walks a [`Filter`] tree against a [`Builder`]'s operators and relations,
//! producing a SQL fragment with `$n` placeholders and the matching argument
//! list. Relation nodes become `IN (SELECT ...)` sub-selects compiled by the
//! target entity's builder against the same [`Arguments`].

use tracing::{debug, warn};

use crate::config::UnknownFilterPolicy;
use crate::error::Result;
use crate::filter::{Filter, FilterValue};
use crate::registry::BuilderRegistry;
use crate::sql::builder::{Builder, Field, Relation};
use crate::sql::operator::{Arity, Operator};
use crate::sql::sanitize::{quote_column, quote_identifier};
use crate::types::{ColumnType, SqlValue};

/// Positional argument accumulator shared by every fragment of one statement
#[derive(Debug, Clone, Default)]
pub struct Arguments {
    values: Vec<SqlValue>,
}

impl Arguments {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a value and return its placeholder
    pub fn push(&mut self, value: SqlValue) -> String {
        self.values.push(value);
        format!("${}", self.values.len())
    }

    /// Like [`Arguments::push`], but NULL placeholders carry a cast to the
    /// column type so the server never has to infer it
    pub fn push_typed(&mut self, value: SqlValue, column_type: &ColumnType) -> String {
        let null = value.is_null();
        let placeholder = self.push(value);
        if null {
            format!("{}::{}", placeholder, column_type.to_sql_type())
        } else {
            placeholder
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn as_slice(&self) -> &[SqlValue] {
        &self.values
    }

    pub fn into_values(self) -> Vec<SqlValue> {
        self.values
    }
}

impl Builder {
    /// Compile `filter` into a WHERE fragment (without the keyword).
    ///
    /// Returns `None` when nothing constrains the statement, e.g. every key was
    /// dropped or the filter is an empty conjunction.
    pub fn compile_filter(
        &self,
        registry: &BuilderRegistry,
        filter: &Filter,
        args: &mut Arguments,
    ) -> Result<Option<String>> {
        self.compile_node(registry, filter, args, None)
    }

    fn compile_node(
        &self,
        registry: &BuilderRegistry,
        filter: &Filter,
        args: &mut Arguments,
        qualifier: Option<&str>,
    ) -> Result<Option<String>> {
        match filter {
            Filter::Leaf {
                column,
                operator,
                value,
            } => self.compile_leaf(column, operator, value, args, qualifier),
            Filter::And(children) => {
                self.compile_group(registry, children, " AND ", args, qualifier)
            }
            Filter::Or(children) => self.compile_group(registry, children, " OR ", args, qualifier),
            Filter::Not(inner) => Ok(self
                .compile_node(registry, inner, args, qualifier)?
                .map(|clause| format!("NOT ({})", clause))),
            Filter::Relation { name, filter } => {
                let Some(relation) = self.relations.get(name) else {
                    return self.unknown_key(name);
                };
                let subselect = self.relation_subselect(registry, relation, filter, args, false)?;
                Ok(Some(format!(
                    "{} IN ({})",
                    quote_column(qualifier, &relation.source_column),
                    subselect
                )))
            }
        }
    }

    fn compile_group(
        &self,
        registry: &BuilderRegistry,
        children: &[Filter],
        separator: &str,
        args: &mut Arguments,
        qualifier: Option<&str>,
    ) -> Result<Option<String>> {
        let mut parts = Vec::with_capacity(children.len());
        for child in children {
            if let Some(clause) = self.compile_node(registry, child, args, qualifier)? {
                parts.push(clause);
            }
        }

        if parts.is_empty() {
            Ok(None)
        } else {
            Ok(Some(format!("({})", parts.join(separator))))
        }
    }

    fn compile_leaf(
        &self,
        column: &str,
        suffix: &str,
        value: &FilterValue,
        args: &mut Arguments,
        qualifier: Option<&str>,
    ) -> Result<Option<String>> {
        let key = format!("{}{}", column, suffix);
        let (Some(operator), Some(field)) = (self.operators.get(&key), self.field(column)) else {
            return self.unknown_key(&key);
        };
        let column_sql = quote_column(qualifier, column);

        match operator.arity() {
            Arity::Nullary => Ok(Some(operator.render(&column_sql, &[]))),
            Arity::Single => match value {
                FilterValue::Value(SqlValue::Null) => Ok(None),
                FilterValue::Value(v) => {
                    let placeholder = self.bind(field, operator, v.clone(), args)?;
                    Ok(Some(operator.render(&column_sql, &[placeholder])))
                }
                FilterValue::List(_) => Err(self.compile_error(format!(
                    "operator '{}' expects a single value, got a list",
                    key
                ))),
            },
            Arity::Variadic => {
                let items = match value {
                    FilterValue::Value(SqlValue::Null) => return Ok(None),
                    FilterValue::Value(v) => vec![v.clone()],
                    FilterValue::List(items) => items.clone(),
                };
                let mut placeholders = Vec::with_capacity(items.len());
                for item in items {
                    placeholders.push(self.bind(field, operator, item, args)?);
                }
                Ok(Some(operator.render(&column_sql, &placeholders)))
            }
        }
    }

    fn bind(
        &self,
        field: &Field,
        operator: &Operator,
        value: SqlValue,
        args: &mut Arguments,
    ) -> Result<String> {
        if operator.normalizes() {
            let value = field
                .column_type
                .normalize(value)
                .map_err(|e| self.compile_error(format!("column '{}': {}", field.name, e)))?;
            Ok(args.push_typed(value, &field.column_type))
        } else {
            let value = value.to_text().map(SqlValue::Text).unwrap_or(SqlValue::Null);
            Ok(args.push(value))
        }
    }

    fn unknown_key(&self, key: &str) -> Result<Option<String>> {
        match self.config.unknown_filters {
            UnknownFilterPolicy::Ignore => {
                debug!(table = %self.table, key = %key, "Dropping unrecognized filter key");
                Ok(None)
            }
            UnknownFilterPolicy::Reject => {
                warn!(table = %self.table, key = %key, "Rejecting unrecognized filter key");
                Err(self.compile_error(format!("unrecognized filter key '{}'", key)))
            }
        }
    }

    /// Sub-select producing the values of `relation.source_column` that have a
    /// related row matching `inner`.
    ///
    /// With `as_text` the projection is cast to text, for resolving keys ahead
    /// of the main statement.
    pub(crate) fn relation_subselect(
        &self,
        registry: &BuilderRegistry,
        relation: &Relation,
        inner: &Filter,
        args: &mut Arguments,
        as_text: bool,
    ) -> Result<String> {
        let target = registry.get(&relation.target_table).ok_or_else(|| {
            self.compile_error(format!(
                "relation target table '{}' is not registered",
                relation.target_table
            ))
        })?;
        let target_table = target.table();

        let (projection, source) = match &relation.through {
            None => (
                quote_column(Some(target_table), &relation.dest_column),
                quote_identifier(target_table),
            ),
            Some(join) => (
                quote_column(Some(&join.table), &join.forward_column),
                format!(
                    "{} INNER JOIN {} ON {} = {}",
                    quote_identifier(&join.table),
                    quote_identifier(target_table),
                    quote_column(Some(target_table), &relation.dest_column),
                    quote_column(Some(&join.table), &join.back_column)
                ),
            ),
        };

        let mut sql = if as_text {
            format!("SELECT {}::text FROM {}", projection, source)
        } else {
            format!("SELECT {} FROM {}", projection, source)
        };
        // A NULL in the projection turns `NOT (x IN (...))` into NULL for every row
        sql.push_str(&format!(" WHERE {} IS NOT NULL", projection));
        if let Some(clause) = target.compile_node(registry, inner, args, Some(target_table))? {
            sql.push_str(" AND ");
            sql.push_str(&clause);
        }
        Ok(sql)
    }
}
