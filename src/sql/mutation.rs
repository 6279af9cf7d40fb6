//! INSERT and UPDATE compilation
//!
//! Rows arrive as [`crate::schema::Entity::values`] output: one value per
//! column in declaration order. Managed timestamp columns are never written
//! from the row.

use crate::error::{RepositoryError, Result};
use crate::filter::Filter;
use crate::registry::BuilderRegistry;
use crate::sql::builder::{Builder, Field, Statement};
use crate::sql::predicate::Arguments;
use crate::sql::sanitize::quote_identifier;
use crate::types::SqlValue;

impl Builder {
    /// Multi-row `INSERT ... VALUES (...), (...) [RETURNING cols]`
    pub fn insert(&self, rows: &[Vec<SqlValue>], returning: bool) -> Result<Statement> {
        if rows.is_empty() {
            return Err(self.compile_error("insert requires at least one row"));
        }

        let columns = self.insert_columns();
        let mut args = Arguments::new();
        let mut sql = format!("INSERT INTO {}", quote_identifier(&self.table));

        if columns.is_empty() {
            if rows.len() > 1 {
                return Err(
                    self.compile_error("cannot insert several rows without writable columns")
                );
            }
            self.check_row(&rows[0])?;
            sql.push_str(" DEFAULT VALUES");
        } else {
            let names: Vec<String> = columns.iter().map(|f| quote_identifier(&f.name)).collect();
            sql.push_str(&format!(" ({}) VALUES ", names.join(", ")));

            let mut tuples = Vec::with_capacity(rows.len());
            for row in rows {
                self.check_row(row)?;
                let mut placeholders = Vec::with_capacity(columns.len());
                for field in &columns {
                    let value = if field.index == self.primary_key().index {
                        self.insert_key(&row[field.index])
                    } else {
                        row[field.index].clone()
                    };
                    placeholders.push(self.bind_column(field, value, &mut args)?);
                }
                tuples.push(format!("({})", placeholders.join(", ")));
            }
            sql.push_str(&tuples.join(", "));
        }

        if returning {
            sql.push_str(&format!(" RETURNING {}", self.select_list()));
        }

        Ok(Statement {
            sql,
            args: args.into_values(),
        })
    }

    /// `UPDATE ... SET ... WHERE <scope> AND pk = $n [RETURNING cols]`
    ///
    /// The row's primary-key value always joins the WHERE clause, on top of the
    /// optional caller scope.
    pub fn update(
        &self,
        registry: &BuilderRegistry,
        row: &[SqlValue],
        scope: Option<&Filter>,
        returning: bool,
    ) -> Result<Statement> {
        self.check_row(row)?;
        let key_filter = self.key_filter(&row[self.primary_key().index])?;

        let mut args = Arguments::new();
        let mut assignments = Vec::new();
        for field in self.fields.iter().skip(1) {
            if field.managed {
                if self.config.touch_column.as_deref() == Some(field.name.as_str()) {
                    assignments.push(format!("{} = NOW()", quote_identifier(&field.name)));
                }
                continue;
            }
            let placeholder = self.bind_column(field, row[field.index].clone(), &mut args)?;
            assignments.push(format!("{} = {}", quote_identifier(&field.name), placeholder));
        }
        if assignments.is_empty() {
            return Err(self.compile_error("no writable columns to update"));
        }

        let filter = match scope {
            Some(scope) => scope.clone().and(key_filter),
            None => key_filter,
        };
        let clause = self
            .compile_filter(registry, &filter, &mut args)?
            .ok_or_else(|| self.compile_error("update without a primary-key constraint"))?;

        let mut sql = format!(
            "UPDATE {} SET {} WHERE {}",
            quote_identifier(&self.table),
            assignments.join(", "),
            clause
        );
        if returning {
            sql.push_str(&format!(" RETURNING {}", self.select_list()));
        }

        Ok(Statement {
            sql,
            args: args.into_values(),
        })
    }

    /// Equality filter on the primary key.
    ///
    /// Only scalar key representations are accepted; anything else is a
    /// configuration problem with the entity.
    pub fn key_filter(&self, key: &SqlValue) -> Result<Filter> {
        let pk = self.primary_key();
        match key {
            SqlValue::Int(_)
            | SqlValue::Float(_)
            | SqlValue::Text(_)
            | SqlValue::Uuid(_)
            | SqlValue::Timestamp(_) => Ok(Filter::leaf(pk.name.clone(), "_eq", key.clone())),
            other => Err(RepositoryError::configuration(format!(
                "primary key '{}' of table '{}' has unsupported value representation '{}'",
                pk.name,
                self.table,
                other.type_name()
            ))),
        }
    }

    fn insert_columns(&self) -> Vec<&Field> {
        let pk_index = self.primary_key().index;
        let include_key = self.config.key_generator.is_some() || self.config.trust_caller_key;
        self.fields
            .iter()
            .filter(|f| if f.index == pk_index { include_key } else { !f.managed })
            .collect()
    }

    fn insert_key(&self, supplied: &SqlValue) -> SqlValue {
        if self.config.trust_caller_key && !supplied.is_null() {
            return supplied.clone();
        }
        match &self.config.key_generator {
            Some(generator) => generator.generate(),
            None => supplied.clone(),
        }
    }

    fn check_row(&self, row: &[SqlValue]) -> Result<()> {
        if row.len() != self.fields.len() {
            return Err(self.compile_error(format!(
                "expected {} column values, got {}",
                self.fields.len(),
                row.len()
            )));
        }
        Ok(())
    }

    fn bind_column(&self, field: &Field, value: SqlValue, args: &mut Arguments) -> Result<String> {
        let value = field
            .column_type
            .normalize(value)
            .map_err(|e| self.compile_error(format!("column '{}': {}", field.name, e)))?;
        Ok(args.push_typed(value, &field.column_type))
    }
}
