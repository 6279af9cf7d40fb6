//! Store - the database handle statements execute against
//!
//! A repository only needs two things from its handle: run a statement that
//! returns rows, and run one that returns an affected-row count. Pools, single
//! connections and open transactions all provide both, so a repository can be
//! pointed at any of them.

use std::sync::Arc;

use async_trait::async_trait;
use sqlx::postgres::{PgArguments, PgRow};
use sqlx::{PgConnection, PgPool, Postgres, Transaction};
use tokio::sync::Mutex;

use crate::error::{RepositoryError, Result};
use crate::types::SqlValue;

type PgQuery<'q> = sqlx::query::Query<'q, Postgres, PgArguments>;

/// Executes SQL text with positional arguments
#[async_trait]
pub trait Store: Send + Sync {
    async fn query(
        &self,
        sql: &str,
        args: &[SqlValue],
    ) -> std::result::Result<Vec<PgRow>, sqlx::Error>;

    /// Returns the number of affected rows
    async fn execute(&self, sql: &str, args: &[SqlValue]) -> std::result::Result<u64, sqlx::Error>;
}

/// Bind one value with its natural Postgres type
fn bind_value<'q>(query: PgQuery<'q>, value: &SqlValue) -> PgQuery<'q> {
    match value {
        // Typed placeholders (`$n::TYPE`) take care of the real column type
        SqlValue::Null => query.bind(None::<String>),
        SqlValue::Bool(b) => query.bind(*b),
        SqlValue::Int(i) => query.bind(*i),
        SqlValue::Float(f) => query.bind(*f),
        SqlValue::Decimal(d) => query.bind(*d),
        SqlValue::Text(s) => query.bind(s.clone()),
        SqlValue::Uuid(u) => query.bind(*u),
        SqlValue::Timestamp(t) => query.bind(*t),
        SqlValue::Json(v) => query.bind(v.clone()),
    }
}

/// Prepare `sql` with every argument bound in order
pub fn bind_all<'q>(sql: &'q str, args: &[SqlValue]) -> PgQuery<'q> {
    args.iter().fold(sqlx::query(sql), bind_value)
}

/// Fold the driver's "no rows" signal into `None`
///
/// Every read path goes through this so that absence is never an error.
pub fn absent_as_none<T>(result: Result<T>) -> Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(RepositoryError::Sql(sqlx::Error::RowNotFound)) => Ok(None),
        Err(e) => Err(e),
    }
}

#[async_trait]
impl Store for PgPool {
    async fn query(
        &self,
        sql: &str,
        args: &[SqlValue],
    ) -> std::result::Result<Vec<PgRow>, sqlx::Error> {
        bind_all(sql, args).fetch_all(self).await
    }

    async fn execute(&self, sql: &str, args: &[SqlValue]) -> std::result::Result<u64, sqlx::Error> {
        Ok(bind_all(sql, args).execute(self).await?.rows_affected())
    }
}

/// A single dedicated connection
#[async_trait]
impl Store for Mutex<PgConnection> {
    async fn query(
        &self,
        sql: &str,
        args: &[SqlValue],
    ) -> std::result::Result<Vec<PgRow>, sqlx::Error> {
        let mut conn = self.lock().await;
        bind_all(sql, args).fetch_all(&mut *conn).await
    }

    async fn execute(&self, sql: &str, args: &[SqlValue]) -> std::result::Result<u64, sqlx::Error> {
        let mut conn = self.lock().await;
        Ok(bind_all(sql, args).execute(&mut *conn).await?.rows_affected())
    }
}

/// An open transaction; commit or roll back after taking it back out
#[async_trait]
impl Store for Mutex<Transaction<'static, Postgres>> {
    async fn query(
        &self,
        sql: &str,
        args: &[SqlValue],
    ) -> std::result::Result<Vec<PgRow>, sqlx::Error> {
        let mut tx = self.lock().await;
        bind_all(sql, args).fetch_all(&mut **tx).await
    }

    async fn execute(&self, sql: &str, args: &[SqlValue]) -> std::result::Result<u64, sqlx::Error> {
        let mut tx = self.lock().await;
        Ok(bind_all(sql, args).execute(&mut **tx).await?.rows_affected())
    }
}

#[async_trait]
impl<S: Store + ?Sized> Store for Arc<S> {
    async fn query(
        &self,
        sql: &str,
        args: &[SqlValue],
    ) -> std::result::Result<Vec<PgRow>, sqlx::Error> {
        (**self).query(sql, args).await
    }

    async fn execute(&self, sql: &str, args: &[SqlValue]) -> std::result::Result<u64, sqlx::Error> {
        (**self).execute(sql, args).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absent_as_none_folds_row_not_found() {
        let result: Result<i64> = Err(RepositoryError::Sql(sqlx::Error::RowNotFound));
        assert_eq!(absent_as_none(result).unwrap(), None);
    }

    #[test]
    fn test_absent_as_none_passes_values() {
        assert_eq!(absent_as_none(Ok(3)).unwrap(), Some(3));
    }

    #[test]
    fn test_absent_as_none_keeps_other_errors() {
        let result: Result<i64> = Err(RepositoryError::Sql(sqlx::Error::PoolTimedOut));
        assert!(matches!(
            absent_as_none(result),
            Err(RepositoryError::Sql(sqlx::Error::PoolTimedOut))
        ));

        let result: Result<i64> = Err(RepositoryError::Cancelled);
        assert!(matches!(absent_as_none(result), Err(RepositoryError::Cancelled)));
    }

    #[test]
    fn test_bind_all_keeps_sql() {
        let args = vec![SqlValue::Int(1), SqlValue::Null, SqlValue::from("x")];
        let query = bind_all("SELECT $1, $2::TEXT, $3", &args);
        assert_eq!(sqlx::Execute::sql(&query), "SELECT $1, $2::TEXT, $3");
    }
}
