//! # runtara-repository
//!
//! A declarative-schema PostgreSQL query builder with a generic CRUD repository.
//!
//! Each persisted type declares an [`EntitySchema`]: its table, its columns in
//! order, and named relations to other entities. At start-up the schemas are
//! compiled into a [`BuilderRegistry`]; a [`Repository`] then turns structured
//! filters into parameterized SQL and decodes the rows back into the type.
//!
//! ## Features
//!
//! - **Declarative Schemas**: Columns annotated as `"<name>[,pk][,auto]"`, relations with optional join tables
//! - **Structured Filters**: Nested `_and`/`_or`/`_not` trees with per-column operators (`_eq`, `_ilike`, `_in`, ...)
//! - **Relation Filters**: Filter by related entities through `IN (SELECT ...)` sub-selects
//! - **Custom Operators**: Column types contribute extra operators through [`ProvidesOperators`]
//! - **Pluggable Handles**: Run the same repository against a pool, a connection or a transaction
//! - **Cancellation**: Every operation takes a [`CancellationToken`](tokio_util::sync::CancellationToken)
//! - **SQL Injection Prevention**: Identifiers are validated and quoted, values are always bound
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use chrono::{DateTime, Utc};
//! use runtara_repository::{
//!     col, BuilderConfig, BuilderRegistry, ColumnType, Entity, EntitySchema, Query, Repository,
//!     SortOrder, SqlValue,
//! };
//! use tokio_util::sync::CancellationToken;
//! use uuid::Uuid;
//!
//! #[derive(sqlx::FromRow)]
//! struct Task {
//!     id: Uuid,
//!     title: String,
//!     created_at: DateTime<Utc>,
//! }
//!
//! impl Entity for Task {
//!     fn schema() -> EntitySchema {
//!         EntitySchema::new("tasks")
//!             .column("id,pk", ColumnType::Uuid)
//!             .column("title", ColumnType::String)
//!             .column("created_at,auto", ColumnType::Timestamp)
//!     }
//!
//!     fn values(&self) -> Vec<SqlValue> {
//!         vec![self.id.into(), self.title.clone().into(), self.created_at.into()]
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let pool = sqlx::PgPool::connect("postgres://localhost/mydb").await?;
//!     let registry = BuilderRegistry::builder()
//!         .register::<Task>(BuilderConfig::builder().uuid_v7_keys().build())
//!         .build()?;
//!     let tasks: Repository<Task> = Repository::new(registry, pool)?;
//!     let cancel = CancellationToken::new();
//!
//!     let created = tasks
//!         .post_one(
//!             &cancel,
//!             &Task { id: Uuid::nil(), title: "Write docs".into(), created_at: Utc::now() },
//!         )
//!         .await?;
//!
//!     let recent = tasks
//!         .get(
//!             &cancel,
//!             &Query::new()
//!                 .filter(col("title").ilike("%docs%"))
//!                 .order_by("created_at", SortOrder::Desc)
//!                 .limit(10),
//!         )
//!         .await?;
//!     assert!(recent.iter().any(|t| t.id == created.id));
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Filters
//!
//! Filters can be built with combinators or parsed from the nested JSON shape:
//!
//! ```rust
//! use runtara_repository::{col, Filter};
//! use serde_json::json;
//!
//! let parsed = Filter::from_json(&json!({
//!     "email": {"_ilike": "%@corp.com"},
//!     "teams": {"name": {"_eq": "platform"}}
//! }))
//! .unwrap();
//!
//! let built = Filter::all(vec![
//!     col("email").ilike("%@corp.com"),
//!     Filter::relation("teams", col("name").eq("platform")),
//! ]);
//! assert_eq!(parsed, built);
//! ```

pub mod config;
pub mod error;
pub mod filter;
pub mod registry;
pub mod repository;
pub mod schema;
pub mod sql;
pub mod store;
pub mod types;

#[cfg(test)]
mod fixtures;

// Re-export main types for convenience
pub use config::{BuilderConfig, BuilderConfigBuilder, KeyGenerator, UnknownFilterPolicy};
pub use error::{RepositoryError, Result};
pub use filter::{Column, Filter, FilterValue, Query, SortOrder, col};
pub use registry::{BuilderRegistry, RegistryBuilder};
pub use repository::Repository;
pub use schema::{
    Attribute, ColumnDefinition, ColumnTag, Entity, EntitySchema, JoinTable, RelationDefinition,
};
pub use store::Store;
pub use types::{ColumnType, SqlValue};

// Re-export SQL utilities for advanced users
pub use sql::{Builder, OperatorSet, ProvidesOperators, Statement};
pub use sql::{quote_identifier, validate_identifier};
