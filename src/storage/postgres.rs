//! PostgreSQL query executor using sqlx.
//!
//! [`Database`] owns the process-wide `PgPool`: it is opened once at startup
//! from [`DatabaseConfig`], shared by every request, and drained with
//! [`Database::close`] before the process exits.
//!
//! Reads run on whatever pooled connection is free. Writes that must be atomic
//! go through [`Database::transaction`], which pins one connection for the
//! duration of the closure and commits or rolls back as a unit.

use crate::config::DatabaseConfig;
use crate::core::error::StorageError;
use crate::core::query::{BuiltQuery, SqlParam};
use futures::future::BoxFuture;
use sqlx::postgres::{PgArguments, PgConnectOptions, PgPoolOptions, PgRow, PgSslMode};
use sqlx::{Arguments, FromRow, PgConnection, PgExecutor, PgPool};

/// Embedded schema migrations
static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

/// Encode parameters positionally, in placeholder order.
pub fn to_arguments(params: &[SqlParam]) -> Result<PgArguments, StorageError> {
    let mut args = PgArguments::default();
    for param in params {
        let added = match param {
            SqlParam::Int(v) => args.add(*v),
            SqlParam::Float(v) => args.add(*v),
            SqlParam::Text(v) => args.add(v.clone()),
            SqlParam::Bool(v) => args.add(*v),
            SqlParam::Timestamp(v) => args.add(*v),
            SqlParam::IntArray(v) => args.add(v.clone()),
            SqlParam::TextArray(v) => args.add(v.clone()),
        };
        added.map_err(|e| StorageError::Bind(e.to_string()))?;
    }
    Ok(args)
}

/// Run a query on any executor (pool or pinned connection) and map every row
pub async fn fetch_all_on<'e, E, T>(executor: E, query: &BuiltQuery) -> Result<Vec<T>, StorageError>
where
    E: PgExecutor<'e>,
    T: for<'r> FromRow<'r, PgRow> + Send + Unpin,
{
    let args = to_arguments(&query.params)?;
    let rows = sqlx::query_as_with::<_, T, _>(&query.text, args)
        .fetch_all(executor)
        .await?;
    Ok(rows)
}

/// Run a query that must return exactly one row (`INSERT ... RETURNING`)
pub async fn fetch_one_on<'e, E, T>(executor: E, query: &BuiltQuery) -> Result<T, StorageError>
where
    E: PgExecutor<'e>,
    T: for<'r> FromRow<'r, PgRow> + Send + Unpin,
{
    let args = to_arguments(&query.params)?;
    let row = sqlx::query_as_with::<_, T, _>(&query.text, args)
        .fetch_one(executor)
        .await?;
    Ok(row)
}

/// Run a query expected to return at most one row
pub async fn fetch_optional_on<'e, E, T>(
    executor: E,
    query: &BuiltQuery,
) -> Result<Option<T>, StorageError>
where
    E: PgExecutor<'e>,
    T: for<'r> FromRow<'r, PgRow> + Send + Unpin,
{
    let args = to_arguments(&query.params)?;
    let row = sqlx::query_as_with::<_, T, _>(&query.text, args)
        .fetch_optional(executor)
        .await?;
    Ok(row)
}

/// Run a statement and return the number of affected rows
pub async fn execute_on<'e, E>(executor: E, query: &BuiltQuery) -> Result<u64, StorageError>
where
    E: PgExecutor<'e>,
{
    let args = to_arguments(&query.params)?;
    let result = sqlx::query_with(&query.text, args).execute(executor).await?;
    Ok(result.rows_affected())
}

/// Handle on the shared connection pool
#[derive(Clone, Debug)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Open the pool described by `config`.
    ///
    /// Connections are opened lazily; the first query reports connectivity
    /// problems.
    pub fn connect(config: &DatabaseConfig) -> Result<Self, StorageError> {
        let options = match &config.url {
            Some(url) => url
                .parse::<PgConnectOptions>()
                .map_err(StorageError::from)?,
            None => PgConnectOptions::new()
                .host(&config.host)
                .port(config.port)
                .username(&config.user)
                .password(&config.password)
                .database(&config.name),
        };
        let options = if config.require_ssl {
            options.ssl_mode(PgSslMode::Require)
        } else {
            options
        };

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .idle_timeout(config.idle_timeout())
            .acquire_timeout(config.connect_timeout())
            .connect_lazy_with(options);

        tracing::info!(
            max_connections = config.max_connections,
            "PostgreSQL pool configured"
        );
        Ok(Self { pool })
    }

    /// Wrap an existing pool (tests, embedding)
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Apply pending migrations (idempotent)
    pub async fn migrate(&self) -> Result<(), StorageError> {
        MIGRATOR
            .run(&self.pool)
            .await
            .map_err(|e| StorageError::Query(e.into()))
    }

    /// Round-trip to the server
    pub async fn ping(&self) -> Result<(), StorageError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    /// Wait for checked-out connections to return, then close the pool
    pub async fn close(&self) {
        self.pool.close().await;
        tracing::info!("PostgreSQL pool closed");
    }

    pub async fn fetch_all<T>(&self, query: &BuiltQuery) -> Result<Vec<T>, StorageError>
    where
        T: for<'r> FromRow<'r, PgRow> + Send + Unpin,
    {
        fetch_all_on(&self.pool, query).await
    }

    pub async fn fetch_optional<T>(&self, query: &BuiltQuery) -> Result<Option<T>, StorageError>
    where
        T: for<'r> FromRow<'r, PgRow> + Send + Unpin,
    {
        fetch_optional_on(&self.pool, query).await
    }

    /// Run a `SELECT COUNT(*)`-shaped query
    pub async fn fetch_count(&self, query: &BuiltQuery) -> Result<i64, StorageError> {
        let args = to_arguments(&query.params)?;
        let (count,): (i64,) = sqlx::query_as_with(&query.text, args)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    pub async fn execute(&self, query: &BuiltQuery) -> Result<u64, StorageError> {
        execute_on(&self.pool, query).await
    }

    /// Run `work` inside one explicit transaction on one connection.
    ///
    /// Commits when `work` succeeds. On failure the transaction is rolled back
    /// and the original error is returned wrapped in
    /// [`StorageError::Transaction`]; nothing of the partial work is visible.
    ///
    /// ```rust,ignore
    /// db.transaction(|conn| Box::pin(async move {
    ///     execute_on(&mut *conn, &first).await?;
    ///     execute_on(&mut *conn, &second).await
    /// })).await?;
    /// ```
    pub async fn transaction<R, F>(&self, work: F) -> Result<R, StorageError>
    where
        R: Send,
        F: for<'c> FnOnce(&'c mut PgConnection) -> BoxFuture<'c, Result<R, StorageError>> + Send,
    {
        let mut tx = self.pool.begin().await?;

        match work(&mut *tx).await {
            Ok(value) => {
                tx.commit().await?;
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback) = tx.rollback().await {
                    tracing::warn!(error = %rollback, "rollback failed");
                }
                tracing::warn!(error = %err, "transaction rolled back");
                Err(StorageError::Transaction(Box::new(err)))
            }
        }
    }
}
