use std::path::Path;
use std::time::Duration;

use futures::future::BoxFuture;
use serde_json::{Map, Value};
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow, SqliteSynchronous,
};
use sqlx::{Column, Pool, Row, Sqlite, Transaction, TypeInfo, ValueRef};

use crate::error::{AppError, AppResult};

/// Outcome of a statement that mutates rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecResult {
    /// Number of rows changed by the statement.
    pub changes: u64,
    /// Rowid of the last inserted row on this connection.
    pub last_insert_id: i64,
}

/// Single-connection SQLite handle.
///
/// The pool is capped at one connection so every statement and transaction is
/// serialized through the same connection. That keeps `last_insert_id`
/// trustworthy and makes write transactions free of busy-retry loops.
#[derive(Clone)]
pub struct Store {
    pool: Pool<Sqlite>,
}

impl Store {
    /// Open (creating if missing) the database file with the durability
    /// pragmas the app relies on: WAL journal, full synchronous, enforced
    /// foreign keys and a 5s busy timeout.
    pub async fn open(db_path: &Path) -> AppResult<Store> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(|err| {
                tracing::error!(
                    target: "consulta",
                    event = "db_dir_create_failed",
                    error = %err,
                    path = %parent.display()
                );
                AppError::from(err).with_context("path", parent.display().to_string())
            })?;
        }
        tracing::info!(target: "consulta", event = "db_path", path = %db_path.display());

        let opts = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Full)
            .foreign_keys(true)
            .busy_timeout(Duration::from_secs(5))
            .pragma("wal_autocheckpoint", "1000");

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(opts)
            .await
            .map_err(AppError::from)?;

        log_effective_pragmas(&pool).await;

        Ok(Store { pool })
    }

    /// Open an in-memory database. The pool keeps its single connection alive
    /// forever; recycling it would drop the database.
    pub async fn in_memory() -> AppResult<Store> {
        let opts = SqliteConnectOptions::new()
            .in_memory(true)
            .foreign_keys(true)
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(opts)
            .await
            .map_err(AppError::from)?;

        Ok(Store { pool })
    }

    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    /// Run a SELECT and return every row as a JSON object keyed by column name.
    pub async fn query(&self, sql: &str, params: &[Value]) -> AppResult<Vec<Value>> {
        let mut query = sqlx::query(sql);
        for param in params {
            query = bind_value(query, param);
        }
        let rows = query.fetch_all(&self.pool).await.map_err(AppError::from)?;
        Ok(rows.into_iter().map(row_to_value).collect())
    }

    /// Run a SELECT expected to match at most one row.
    pub async fn query_one(&self, sql: &str, params: &[Value]) -> AppResult<Option<Value>> {
        let mut query = sqlx::query(sql);
        for param in params {
            query = bind_value(query, param);
        }
        let row = query
            .fetch_optional(&self.pool)
            .await
            .map_err(AppError::from)?;
        Ok(row.map(row_to_value))
    }

    /// Run a single mutating statement.
    pub async fn execute(&self, sql: &str, params: &[Value]) -> AppResult<ExecResult> {
        let mut query = sqlx::query(sql);
        for param in params {
            query = bind_value(query, param);
        }
        let result = query.execute(&self.pool).await.map_err(AppError::from)?;
        Ok(ExecResult {
            changes: result.rows_affected(),
            last_insert_id: result.last_insert_rowid(),
        })
    }

    /// Execute a multi-statement script as-is. Used for DDL where statements
    /// carry no bound parameters.
    pub async fn exec_batch(&self, script: &str) -> AppResult<()> {
        sqlx::raw_sql(script)
            .execute(&self.pool)
            .await
            .map_err(AppError::from)?;
        Ok(())
    }

    /// Run work inside a transaction. Commits on success, rolls back on error.
    pub async fn run_in_tx<R, E, F>(&self, f: F) -> Result<R, E>
    where
        E: From<sqlx::Error>,
        F: for<'c> FnOnce(&'c mut Transaction<'static, Sqlite>) -> BoxFuture<'c, Result<R, E>>,
    {
        use tracing::{error, info, warn};

        let mut tx = self.pool.begin().await.map_err(E::from)?;
        info!(target: "consulta", event = "db_tx_begin");
        match f(&mut tx).await {
            Ok(val) => {
                tx.commit().await.map_err(E::from)?;
                info!(target: "consulta", event = "db_tx_commit");
                Ok(val)
            }
            Err(e) => {
                if let Err(rb) = tx.rollback().await {
                    error!(target: "consulta", event = "db_tx_rollback_failed", error = %rb);
                } else {
                    warn!(target: "consulta", event = "db_tx_rollback");
                }
                Err(e)
            }
        }
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

async fn log_effective_pragmas(pool: &Pool<Sqlite>) {
    use tracing::{info, warn};

    let (sqlite_ver,): (String,) = sqlx::query_as("select sqlite_version()")
        .fetch_one(pool)
        .await
        .unwrap_or((String::from("unknown"),));

    let jm: (String,) = sqlx::query_as("PRAGMA journal_mode;")
        .fetch_one(pool)
        .await
        .unwrap_or((String::from("unknown"),));

    let sync: (i64,) = sqlx::query_as("PRAGMA synchronous;")
        .fetch_one(pool)
        .await
        .unwrap_or((i64::MIN,));

    let fks: (i64,) = sqlx::query_as("PRAGMA foreign_keys;")
        .fetch_one(pool)
        .await
        .unwrap_or((i64::MIN,));

    let busy: (i64,) = sqlx::query_as("PRAGMA busy_timeout;")
        .fetch_one(pool)
        .await
        .unwrap_or((i64::MIN,));

    info!(
        target: "consulta",
        event = "db_open",
        sqlite_version = %sqlite_ver,
        journal_mode = %jm.0,
        synchronous = %sync.0,
        foreign_keys = %fks.0,
        busy_timeout_ms = %busy.0
    );

    if !jm.0.eq_ignore_ascii_case("wal") {
        warn!(
            target: "consulta",
            event = "db_open_warning",
            msg = "journal_mode != WAL; running with reduced crash safety"
        );
    }
}

/// Bind a JSON value to the next placeholder of a query.
pub fn bind_value<'q>(
    q: sqlx::query::Query<'q, Sqlite, sqlx::sqlite::SqliteArguments<'q>>,
    v: &Value,
) -> sqlx::query::Query<'q, Sqlite, sqlx::sqlite::SqliteArguments<'q>> {
    match v {
        Value::Null => q.bind(Option::<i64>::None),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                q.bind(i)
            } else if let Some(f) = n.as_f64() {
                q.bind(f)
            } else {
                q.bind(Option::<i64>::None)
            }
        }
        Value::Bool(b) => q.bind(*b as i64),
        Value::String(s) => q.bind(s.clone()),
        _ => q.bind(v.to_string()),
    }
}

/// Decode a row into a JSON object using the declared SQLite column types.
pub fn row_to_value(row: SqliteRow) -> Value {
    let mut map = Map::new();
    for col in row.columns() {
        let idx = col.ordinal();
        let v = row.try_get_raw(idx).ok();
        let val = match v {
            Some(raw) => {
                if raw.is_null() {
                    Value::Null
                } else {
                    match raw.type_info().name() {
                        "INTEGER" => row
                            .try_get::<i64, _>(idx)
                            .map(Value::from)
                            .unwrap_or(Value::Null),
                        "REAL" => row
                            .try_get::<f64, _>(idx)
                            .map(Value::from)
                            .unwrap_or(Value::Null),
                        _ => row
                            .try_get::<String, _>(idx)
                            .map(Value::from)
                            .unwrap_or(Value::Null),
                    }
                }
            }
            None => Value::Null,
        };
        map.insert(col.name().to_string(), val);
    }
    Value::Object(map)
}
