//! Declarative entity schemas
//!
//! An [`EntitySchema`] is the single source of truth for one entity: its
//! table, its column attributes in declaration order, and its relations.
//! Attributes carry the same annotation grammar used by the tags:
//!
//! - column: `"<columnName>[,pk][,auto]"`
//! - join descriptor: `"<joinTable>,<joinForwardColumn>,<joinBackColumn>"`

use sqlx::postgres::PgRow;

use crate::sql::operator::{OperatorSet, ProvidesOperators};
use crate::types::{ColumnType, SqlValue};

/// A persisted type with a declared schema
///
/// `values` must return one value per column attribute, in the order the
/// schema declares them.
pub trait Entity: for<'r> sqlx::FromRow<'r, PgRow> + Send + Sync + Unpin + 'static {
    fn schema() -> EntitySchema;

    fn values(&self) -> Vec<SqlValue>;
}

/// Parsed column annotation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnTag {
    pub name: String,
    pub primary_key: bool,
    /// Server-managed timestamp, never written by inserts or updates
    pub managed: bool,
}

impl ColumnTag {
    /// Parse `"<columnName>[,pk][,auto]"`
    pub fn parse(tag: &str) -> Result<Self, String> {
        let mut parts = tag.split(',').map(str::trim);
        let name = parts.next().unwrap_or_default();
        if name.is_empty() {
            return Err(format!("Column annotation '{}' has no column name", tag));
        }

        let mut parsed = ColumnTag {
            name: name.to_string(),
            primary_key: false,
            managed: false,
        };
        for flag in parts {
            match flag {
                "pk" => parsed.primary_key = true,
                "auto" => parsed.managed = true,
                other => {
                    return Err(format!(
                        "Unknown flag '{}' in column annotation '{}'",
                        other, tag
                    ));
                }
            }
        }
        Ok(parsed)
    }
}

/// Associative table linking two entities
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinTable {
    pub table: String,
    /// Join column referencing the source entity
    pub forward_column: String,
    /// Join column referencing the target entity
    pub back_column: String,
}

impl JoinTable {
    /// Parse `"<joinTable>,<joinForwardColumn>,<joinBackColumn>"`
    pub fn parse(descriptor: &str) -> Result<Self, String> {
        let parts: Vec<&str> = descriptor.split(',').map(str::trim).collect();
        match parts.as_slice() {
            [table, forward, back]
                if !table.is_empty() && !forward.is_empty() && !back.is_empty() =>
            {
                Ok(JoinTable {
                    table: table.to_string(),
                    forward_column: forward.to_string(),
                    back_column: back.to_string(),
                })
            }
            _ => Err(format!(
                "Join descriptor '{}' must have the form '<table>,<forwardColumn>,<backColumn>'",
                descriptor
            )),
        }
    }
}

/// Column attribute as declared
#[derive(Debug, Clone)]
pub struct ColumnDefinition {
    pub tag: String,
    pub column_type: ColumnType,
    /// Extra operators contributed by the column's value type
    pub operators: OperatorSet,
}

impl ColumnDefinition {
    pub fn new(tag: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            tag: tag.into(),
            column_type,
            operators: OperatorSet::new(),
        }
    }

    /// Merge the operators provided by `T` into this column
    pub fn with_operators_of<T: ProvidesOperators>(mut self) -> Self {
        self.operators = self.operators.merge(T::operators());
        self
    }

    pub fn with_operators(mut self, operators: OperatorSet) -> Self {
        self.operators = self.operators.merge(operators);
        self
    }
}

/// Relation attribute as declared
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationDefinition {
    pub to_one: bool,
    /// Column on this entity
    pub source_column: String,
    /// Column on the target entity
    pub dest_column: String,
    pub target_table: String,
    /// Raw join descriptor, parsed at builder construction
    pub through: Option<String>,
}

impl RelationDefinition {
    /// Relation resolving to at most one target row
    pub fn to_one(
        source_column: impl Into<String>,
        dest_column: impl Into<String>,
        target_table: impl Into<String>,
    ) -> Self {
        Self {
            to_one: true,
            ..Self::to_many(source_column, dest_column, target_table)
        }
    }

    /// Relation resolving to any number of target rows
    pub fn to_many(
        source_column: impl Into<String>,
        dest_column: impl Into<String>,
        target_table: impl Into<String>,
    ) -> Self {
        Self {
            to_one: false,
            source_column: source_column.into(),
            dest_column: dest_column.into(),
            target_table: target_table.into(),
            through: None,
        }
    }

    /// Traverse an associative table described by `"<table>,<forward>,<back>"`
    pub fn through(mut self, descriptor: impl Into<String>) -> Self {
        self.through = Some(descriptor.into());
        self
    }
}

/// An entity attribute, either a column or a relation
#[derive(Debug, Clone)]
pub enum Attribute {
    Column(ColumnDefinition),
    Relation {
        name: String,
        definition: RelationDefinition,
    },
}

/// Declared shape of one entity
#[derive(Debug, Clone)]
pub struct EntitySchema {
    pub table_name: String,
    pub attributes: Vec<Attribute>,
}

impl EntitySchema {
    pub fn new(table_name: impl Into<String>) -> Self {
        Self {
            table_name: table_name.into(),
            attributes: Vec::new(),
        }
    }

    /// Declare a column from its annotation
    pub fn column(self, tag: impl Into<String>, column_type: ColumnType) -> Self {
        self.attribute(Attribute::Column(ColumnDefinition::new(tag, column_type)))
    }

    /// Declare a column whose value type contributes extra operators
    pub fn column_of<T: ProvidesOperators>(
        self,
        tag: impl Into<String>,
        column_type: ColumnType,
    ) -> Self {
        self.attribute(Attribute::Column(
            ColumnDefinition::new(tag, column_type).with_operators_of::<T>(),
        ))
    }

    /// Declare a named relation
    pub fn relation(self, name: impl Into<String>, definition: RelationDefinition) -> Self {
        self.attribute(Attribute::Relation {
            name: name.into(),
            definition,
        })
    }

    pub fn attribute(mut self, attribute: Attribute) -> Self {
        self.attributes.push(attribute);
        self
    }

    /// Column attributes in declaration order
    pub fn columns(&self) -> impl Iterator<Item = &ColumnDefinition> {
        self.attributes.iter().filter_map(|a| match a {
            Attribute::Column(c) => Some(c),
            Attribute::Relation { .. } => None,
        })
    }
}
