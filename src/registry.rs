//! Builder registry
//!
//! Every entity's [`Builder`] is constructed once, up front, and shared
//! read-only through an `Arc<BuilderRegistry>`. Relation sub-selects look up
//! their target builder here.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::info;

use crate::config::BuilderConfig;
use crate::error::{RepositoryError, Result};
use crate::schema::{Entity, EntitySchema};
use crate::sql::builder::Builder;

/// Immutable map from table name to builder
#[derive(Debug, Default)]
pub struct BuilderRegistry {
    builders: HashMap<String, Arc<Builder>>,
}

impl BuilderRegistry {
    /// Start registering entities
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    pub fn get(&self, table: &str) -> Option<&Arc<Builder>> {
        self.builders.get(table)
    }

    /// Builder for the table `E` declares
    pub fn for_entity<E: Entity>(&self) -> Option<&Arc<Builder>> {
        self.get(&E::schema().table_name)
    }

    pub fn tables(&self) -> impl Iterator<Item = &str> {
        self.builders.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.builders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.builders.is_empty()
    }
}

/// Collects entity schemas, then builds and cross-checks them
#[derive(Debug, Default)]
pub struct RegistryBuilder {
    entries: Vec<(EntitySchema, BuilderConfig)>,
}

impl RegistryBuilder {
    pub fn register<E: Entity>(self, config: BuilderConfig) -> Self {
        self.register_schema(E::schema(), config)
    }

    pub fn register_schema(mut self, schema: EntitySchema, config: BuilderConfig) -> Self {
        self.entries.push((schema, config));
        self
    }

    /// Construct every builder and validate relations against the registered
    /// tables.
    pub fn build(self) -> Result<Arc<BuilderRegistry>> {
        let mut builders = HashMap::with_capacity(self.entries.len());
        for (schema, config) in &self.entries {
            let builder = Builder::new(schema, config.clone())?;
            let table = builder.table().to_string();
            if builders.insert(table.clone(), Arc::new(builder)).is_some() {
                return Err(RepositoryError::configuration(format!(
                    "table '{}' registered more than once",
                    table
                )));
            }
        }

        for builder in builders.values() {
            for (name, relation) in builder.relations() {
                let Some(target) = builders.get(&relation.target_table) else {
                    return Err(RepositoryError::configuration(format!(
                        "relation '{}' of '{}' targets unregistered table '{}'",
                        name,
                        builder.table(),
                        relation.target_table
                    )));
                };
                if !builder.has_column(&relation.source_column) {
                    return Err(RepositoryError::configuration(format!(
                        "relation '{}' of '{}' uses unknown source column '{}'",
                        name,
                        builder.table(),
                        relation.source_column
                    )));
                }
                if !target.has_column(&relation.dest_column) {
                    return Err(RepositoryError::configuration(format!(
                        "relation '{}' of '{}' uses unknown column '{}' on '{}'",
                        name,
                        builder.table(),
                        relation.dest_column,
                        target.table()
                    )));
                }
            }
        }

        info!(tables = builders.len(), "Builder registry initialized");
        Ok(Arc::new(BuilderRegistry { builders }))
    }
}
