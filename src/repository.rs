//! Repository - typed CRUD operations for one entity
//!
//! A [`Repository`] pairs the entity's [`Builder`] with a [`Store`] handle.
//! Every operation takes a [`CancellationToken`]; cancelling it abandons the
//! in-flight statement and returns [`RepositoryError::Cancelled`].

use std::future::Future;
use std::marker::PhantomData;
use std::pin::Pin;
use std::sync::Arc;

use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::{RepositoryError, Result};
use crate::filter::{Filter, FilterValue, Query};
use crate::registry::BuilderRegistry;
use crate::schema::Entity;
use crate::sql::builder::{Builder, Statement};
use crate::sql::predicate::Arguments;
use crate::store::{Store, absent_as_none};
use crate::types::SqlValue;

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

async fn cancellable<T, F>(cancel: &CancellationToken, operation: F) -> Result<T>
where
    F: Future<Output = std::result::Result<T, sqlx::Error>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(RepositoryError::Cancelled),
        result = operation => result.map_err(RepositoryError::from),
    }
}

/// Typed data access for entity `E` over store `S`
pub struct Repository<E, S = PgPool> {
    registry: Arc<BuilderRegistry>,
    builder: Arc<Builder>,
    store: S,
    prefetch_relations: bool,
    _entity: PhantomData<fn() -> E>,
}

impl<E: Entity, S: Store> Repository<E, S> {
    /// Create a repository for `E`, which must be registered in `registry`
    pub fn new(registry: Arc<BuilderRegistry>, store: S) -> Result<Self> {
        let table = E::schema().table_name;
        let builder = registry.get(&table).cloned().ok_or_else(|| {
            RepositoryError::configuration(format!("no builder registered for table '{}'", table))
        })?;

        Ok(Self {
            registry,
            builder,
            store,
            prefetch_relations: false,
            _entity: PhantomData,
        })
    }

    /// Resolve relation filters with a separate key lookup before the main
    /// statement instead of nesting them as sub-selects
    pub fn prefetch_relations(mut self, enabled: bool) -> Self {
        self.prefetch_relations = enabled;
        self
    }

    /// Same entity and settings over another handle, e.g. a transaction
    pub fn with_store<T: Store>(&self, store: T) -> Repository<E, T> {
        Repository {
            registry: Arc::clone(&self.registry),
            builder: Arc::clone(&self.builder),
            store,
            prefetch_relations: self.prefetch_relations,
            _entity: PhantomData,
        }
    }

    pub fn builder(&self) -> &Builder {
        &self.builder
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Give the handle back, e.g. to commit a transaction
    pub fn into_store(self) -> S {
        self.store
    }

    /// Rows matching the query
    pub async fn get(&self, cancel: &CancellationToken, query: &Query) -> Result<Vec<E>> {
        let mut query = query.clone();
        query.filter = self.resolve_filter(cancel, query.filter.as_ref()).await?;
        let statement = self.builder.select(&self.registry, &query)?;
        self.fetch(cancel, &statement).await
    }

    /// First row matching the filter, if any
    pub async fn get_one(
        &self,
        cancel: &CancellationToken,
        filter: Option<&Filter>,
    ) -> Result<Option<E>> {
        let query = Query {
            filter: filter.cloned(),
            limit: Some(1),
            ..Query::default()
        };
        Ok(self.get(cancel, &query).await?.into_iter().next())
    }

    /// Insert the entities and return the stored rows
    pub async fn post(&self, cancel: &CancellationToken, entities: &[E]) -> Result<Vec<E>> {
        if entities.is_empty() {
            return Ok(Vec::new());
        }
        let rows: Vec<Vec<SqlValue>> = entities.iter().map(Entity::values).collect();
        let statement = self.builder.insert(&rows, true)?;
        self.fetch(cancel, &statement).await
    }

    /// Insert one entity and return the stored row
    pub async fn post_one(&self, cancel: &CancellationToken, entity: &E) -> Result<E> {
        self.post(cancel, std::slice::from_ref(entity))
            .await?
            .pop()
            .ok_or(RepositoryError::Sql(sqlx::Error::RowNotFound))
    }

    /// Insert the entities and return the affected-row count
    pub async fn post_exec(&self, cancel: &CancellationToken, entities: &[E]) -> Result<u64> {
        if entities.is_empty() {
            return Ok(0);
        }
        let rows: Vec<Vec<SqlValue>> = entities.iter().map(Entity::values).collect();
        let statement = self.builder.insert(&rows, false)?;
        self.execute(cancel, &statement).await
    }

    /// Update each entity by primary key and return the updated rows
    pub async fn put(&self, cancel: &CancellationToken, entities: &[E]) -> Result<Vec<E>> {
        self.put_where(cancel, None, entities).await
    }

    /// Update one entity; `None` when no row has its key
    pub async fn put_one(&self, cancel: &CancellationToken, entity: &E) -> Result<Option<E>> {
        Ok(self.put(cancel, std::slice::from_ref(entity)).await?.pop())
    }

    /// Like [`Repository::put`], restricted to rows also matching `scope`
    pub async fn put_where(
        &self,
        cancel: &CancellationToken,
        scope: Option<&Filter>,
        entities: &[E],
    ) -> Result<Vec<E>> {
        if entities.is_empty() {
            return Ok(Vec::new());
        }
        let scope = self.resolve_filter(cancel, scope).await?;

        let mut updated = Vec::with_capacity(entities.len());
        for entity in entities {
            let statement = self
                .builder
                .update(&self.registry, &entity.values(), scope.as_ref(), true)?;
            updated.extend(self.fetch(cancel, &statement).await?);
        }
        Ok(updated)
    }

    /// Delete matching rows and return the affected-row count
    pub async fn delete(&self, cancel: &CancellationToken, filter: Option<&Filter>) -> Result<u64> {
        let filter = self.resolve_filter(cancel, filter).await?;
        let statement = self.builder.delete(&self.registry, filter.as_ref(), false)?;
        self.execute(cancel, &statement).await
    }

    /// Delete matching rows and return them
    pub async fn delete_return(
        &self,
        cancel: &CancellationToken,
        filter: Option<&Filter>,
    ) -> Result<Vec<E>> {
        let filter = self.resolve_filter(cancel, filter).await?;
        let statement = self.builder.delete(&self.registry, filter.as_ref(), true)?;
        self.fetch(cancel, &statement).await
    }

    /// Number of matching rows
    pub async fn count(&self, cancel: &CancellationToken, filter: Option<&Filter>) -> Result<i64> {
        let filter = self.resolve_filter(cancel, filter).await?;
        let statement = self.builder.count(&self.registry, filter.as_ref())?;
        let rows = absent_as_none(self.query(cancel, &statement).await)?.unwrap_or_default();

        match rows.first() {
            Some(row) => Ok(row.try_get::<i64, _>(0)?),
            None => Ok(0),
        }
    }

    async fn fetch(&self, cancel: &CancellationToken, statement: &Statement) -> Result<Vec<E>> {
        let rows = absent_as_none(self.query(cancel, statement).await)?.unwrap_or_default();
        rows.iter()
            .map(|row| E::from_row(row).map_err(RepositoryError::from))
            .collect()
    }

    async fn query(&self, cancel: &CancellationToken, statement: &Statement) -> Result<Vec<PgRow>> {
        debug!(
            table = %self.builder.table(),
            sql = %statement.sql,
            args = statement.args.len(),
            "Executing query"
        );
        cancellable(cancel, self.store.query(&statement.sql, &statement.args)).await
    }

    async fn execute(&self, cancel: &CancellationToken, statement: &Statement) -> Result<u64> {
        debug!(
            table = %self.builder.table(),
            sql = %statement.sql,
            args = statement.args.len(),
            "Executing statement"
        );
        let affected =
            cancellable(cancel, self.store.execute(&statement.sql, &statement.args)).await?;
        debug!(table = %self.builder.table(), affected, "Statement complete");
        Ok(affected)
    }

    async fn resolve_filter(
        &self,
        cancel: &CancellationToken,
        filter: Option<&Filter>,
    ) -> Result<Option<Filter>> {
        match filter {
            Some(filter) if self.prefetch_relations => {
                Ok(Some(self.resolve_relations(cancel, &self.builder, filter).await?))
            }
            other => Ok(other.cloned()),
        }
    }

    /// Replace every relation node with an `_in` leaf over the keys its
    /// sub-select currently yields
    fn resolve_relations<'a>(
        &'a self,
        cancel: &'a CancellationToken,
        builder: &'a Builder,
        filter: &'a Filter,
    ) -> BoxFuture<'a, Result<Filter>> {
        Box::pin(async move {
            match filter {
                Filter::Leaf { .. } => Ok(filter.clone()),
                Filter::And(children) => {
                    let mut resolved = Vec::with_capacity(children.len());
                    for child in children {
                        resolved.push(self.resolve_relations(cancel, builder, child).await?);
                    }
                    Ok(Filter::And(resolved))
                }
                Filter::Or(children) => {
                    let mut resolved = Vec::with_capacity(children.len());
                    for child in children {
                        resolved.push(self.resolve_relations(cancel, builder, child).await?);
                    }
                    Ok(Filter::Or(resolved))
                }
                Filter::Not(inner) => Ok(Filter::not(
                    self.resolve_relations(cancel, builder, inner).await?,
                )),
                Filter::Relation { name, filter: inner } => {
                    // Unknown names are left for the compiler's unknown-key policy
                    let Some(relation) = builder.relation(name) else {
                        return Ok(filter.clone());
                    };
                    let target = self.registry.get(&relation.target_table).ok_or_else(|| {
                        builder.compile_error(format!(
                            "relation target table '{}' is not registered",
                            relation.target_table
                        ))
                    })?;
                    let inner = self.resolve_relations(cancel, target, inner).await?;

                    let mut args = Arguments::new();
                    let sql = builder.relation_subselect(
                        &self.registry,
                        relation,
                        &inner,
                        &mut args,
                        true,
                    )?;
                    debug!(
                        table = %builder.table(),
                        relation = %name,
                        sql = %sql,
                        "Resolving relation keys"
                    );

                    let rows = absent_as_none(
                        cancellable(cancel, self.store.query(&sql, args.as_slice())).await,
                    )?
                    .unwrap_or_default();
                    let mut keys = Vec::with_capacity(rows.len());
                    for row in &rows {
                        if let Some(key) = row.try_get::<Option<String>, _>(0)? {
                            keys.push(SqlValue::Text(key));
                        }
                    }

                    Ok(Filter::leaf(
                        relation.source_column.clone(),
                        "_in",
                        FilterValue::List(keys),
                    ))
                }
            }
        })
    }
}
