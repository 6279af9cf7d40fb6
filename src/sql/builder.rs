//! Per-entity statement builder
//!
//! A [`Builder`] is constructed once per entity from its [`EntitySchema`] and
//! is immutable afterwards. It owns the table metadata (ordered fields with the
//! primary key first, relations, operators) and assembles complete statements;
//! the WHERE and VALUES/SET compilers live in [`super::predicate`] and
//! [`super::mutation`].

use std::collections::{BTreeMap, HashSet};

use crate::config::BuilderConfig;
use crate::error::{RepositoryError, Result};
use crate::filter::{Filter, Query, SortOrder};
use crate::registry::BuilderRegistry;
use crate::schema::{Attribute, ColumnTag, EntitySchema, JoinTable};
use crate::sql::operator::{Operator, OperatorSet};
use crate::sql::predicate::Arguments;
use crate::sql::sanitize::{quote_identifier, validate_identifier};
use crate::types::{ColumnType, SqlValue};

/// A column of the entity
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    /// Position in [`crate::schema::Entity::values`]
    pub index: usize,
    pub name: String,
    pub column_type: ColumnType,
    /// Server-managed timestamp
    pub managed: bool,
}

/// How to reach a related entity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relation {
    pub to_one: bool,
    pub through: Option<JoinTable>,
    pub source_column: String,
    pub dest_column: String,
    pub target_table: String,
}

/// A fully assembled statement and its positional arguments
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub args: Vec<SqlValue>,
}

/// Compiled metadata and SQL generation for one entity
#[derive(Debug, Clone)]
pub struct Builder {
    pub(crate) table: String,
    pub(crate) fields: Vec<Field>,
    pub(crate) column_set: HashSet<String>,
    pub(crate) relations: BTreeMap<String, Relation>,
    pub(crate) operators: BTreeMap<String, Operator>,
    pub(crate) config: BuilderConfig,
}

fn config_error(table: &str, msg: impl std::fmt::Display) -> RepositoryError {
    RepositoryError::configuration(format!("entity '{}': {}", table, msg))
}

impl Builder {
    /// Walk the schema attributes in order and build the metadata.
    ///
    /// Fails when no attribute is tagged `pk`, when more than one is, or when an
    /// annotation or identifier is malformed.
    pub fn new(schema: &EntitySchema, config: BuilderConfig) -> Result<Self> {
        let table = schema.table_name.clone();
        validate_identifier(&table).map_err(|e| config_error(&table, e))?;

        let mut primary_key: Option<Field> = None;
        let mut others = Vec::new();
        let mut column_set = HashSet::new();
        let mut relations = BTreeMap::new();
        let mut operators = BTreeMap::new();

        for attribute in &schema.attributes {
            match attribute {
                Attribute::Column(definition) => {
                    let tag = ColumnTag::parse(&definition.tag)
                        .map_err(|e| config_error(&table, e))?;
                    validate_identifier(&tag.name).map_err(|e| config_error(&table, e))?;
                    if !column_set.insert(tag.name.clone()) {
                        return Err(config_error(
                            &table,
                            format!("duplicate column '{}'", tag.name),
                        ));
                    }

                    let column_operators =
                        OperatorSet::defaults().merge(definition.operators.clone());
                    for (suffix, operator) in column_operators.iter() {
                        operators.insert(format!("{}{}", tag.name, suffix), operator.clone());
                    }

                    let field = Field {
                        index: column_set.len() - 1,
                        name: tag.name,
                        column_type: definition.column_type.clone(),
                        managed: tag.managed,
                    };

                    if tag.primary_key {
                        if let Some(existing) = &primary_key {
                            return Err(config_error(
                                &table,
                                format!(
                                    "multiple primary keys ('{}' and '{}')",
                                    existing.name, field.name
                                ),
                            ));
                        }
                        primary_key = Some(field);
                    } else {
                        others.push(field);
                    }
                }
                Attribute::Relation { name, definition } => {
                    for identifier in [
                        &definition.source_column,
                        &definition.dest_column,
                        &definition.target_table,
                    ] {
                        validate_identifier(identifier).map_err(|e| config_error(&table, e))?;
                    }

                    let through = definition
                        .through
                        .as_deref()
                        .map(JoinTable::parse)
                        .transpose()
                        .map_err(|e| config_error(&table, e))?;
                    if let Some(join) = &through {
                        for identifier in [&join.table, &join.forward_column, &join.back_column] {
                            validate_identifier(identifier).map_err(|e| config_error(&table, e))?;
                        }
                    }

                    let relation = Relation {
                        to_one: definition.to_one,
                        through,
                        source_column: definition.source_column.clone(),
                        dest_column: definition.dest_column.clone(),
                        target_table: definition.target_table.clone(),
                    };
                    if relations.insert(name.clone(), relation).is_some() {
                        return Err(config_error(&table, format!("duplicate relation '{}'", name)));
                    }
                }
            }
        }

        let primary_key =
            primary_key.ok_or_else(|| config_error(&table, "no primary key column declared"))?;

        let mut fields = Vec::with_capacity(others.len() + 1);
        fields.push(primary_key);
        fields.extend(others);

        Ok(Self {
            table,
            fields,
            column_set,
            relations,
            operators,
            config,
        })
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// Columns, primary key first
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn primary_key(&self) -> &Field {
        &self.fields[0]
    }

    pub fn field(&self, column: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == column)
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.column_set.contains(column)
    }

    pub fn relation(&self, name: &str) -> Option<&Relation> {
        self.relations.get(name)
    }

    pub fn relations(&self) -> &BTreeMap<String, Relation> {
        &self.relations
    }

    /// Operator registered for `column + suffix`
    pub fn operator(&self, column: &str, suffix: &str) -> Option<&Operator> {
        self.operators.get(&format!("{}{}", column, suffix))
    }

    /// Registered `<column><suffix>` keys, sorted
    pub fn operator_keys(&self) -> impl Iterator<Item = &str> {
        self.operators.keys().map(String::as_str)
    }

    pub fn config(&self) -> &BuilderConfig {
        &self.config
    }

    /// Quoted column list in field order
    pub fn select_list(&self) -> String {
        self.fields
            .iter()
            .map(|f| quote_identifier(&f.name))
            .collect::<Vec<_>>()
            .join(", ")
    }

    pub(crate) fn compile_error(&self, msg: impl Into<String>) -> RepositoryError {
        RepositoryError::compile(&self.table, msg)
    }

    /// `SELECT cols FROM table [WHERE] [ORDER BY] [LIMIT] [OFFSET]`
    pub fn select(&self, registry: &BuilderRegistry, query: &Query) -> Result<Statement> {
        let mut args = Arguments::new();
        let mut sql = format!(
            "SELECT {} FROM {}",
            self.select_list(),
            quote_identifier(&self.table)
        );

        self.push_where(registry, query.filter.as_ref(), &mut args, &mut sql)?;

        if !query.order.is_empty() {
            sql.push_str(" ORDER BY ");
            sql.push_str(&self.order_clause(&query.order)?);
        }
        if let Some(limit) = query.limit {
            if limit < 0 {
                return Err(self.compile_error(format!(
                    "limit must not be negative, got {}",
                    limit
                )));
            }
            sql.push_str(&format!(" LIMIT {}", limit));
        }
        if let Some(offset) = query.offset {
            if offset < 0 {
                return Err(self.compile_error(format!(
                    "offset must not be negative, got {}",
                    offset
                )));
            }
            sql.push_str(&format!(" OFFSET {}", offset));
        }

        Ok(Statement {
            sql,
            args: args.into_values(),
        })
    }

    /// `SELECT COUNT(*) FROM table [WHERE]`
    pub fn count(&self, registry: &BuilderRegistry, filter: Option<&Filter>) -> Result<Statement> {
        let mut args = Arguments::new();
        let mut sql = format!("SELECT COUNT(*) FROM {}", quote_identifier(&self.table));
        self.push_where(registry, filter, &mut args, &mut sql)?;

        Ok(Statement {
            sql,
            args: args.into_values(),
        })
    }

    /// `DELETE FROM table [WHERE] [RETURNING cols]`
    pub fn delete(
        &self,
        registry: &BuilderRegistry,
        filter: Option<&Filter>,
        returning: bool,
    ) -> Result<Statement> {
        let mut args = Arguments::new();
        let mut sql = format!("DELETE FROM {}", quote_identifier(&self.table));
        self.push_where(registry, filter, &mut args, &mut sql)?;
        if returning {
            sql.push_str(&format!(" RETURNING {}", self.select_list()));
        }

        Ok(Statement {
            sql,
            args: args.into_values(),
        })
    }

    fn push_where(
        &self,
        registry: &BuilderRegistry,
        filter: Option<&Filter>,
        args: &mut Arguments,
        sql: &mut String,
    ) -> Result<()> {
        if let Some(filter) = filter {
            if let Some(clause) = self.compile_filter(registry, filter, args)? {
                sql.push_str(" WHERE ");
                sql.push_str(&clause);
            }
        }
        Ok(())
    }

    fn order_clause(&self, order: &[(String, SortOrder)]) -> Result<String> {
        let mut parts = Vec::with_capacity(order.len());
        for (column, direction) in order {
            if !self.has_column(column) {
                return Err(self.compile_error(format!("Invalid sort field: '{}'", column)));
            }
            parts.push(format!("{} {}", quote_identifier(column), direction.as_sql()));
        }
        Ok(parts.join(", "))
    }
}
