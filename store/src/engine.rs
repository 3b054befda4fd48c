//! The storage engine: CRUD over the per-type envelope tables.
//!
//! All operations lazily initialize the engine on first use: the sqlite
//! pool is opened and the schema provisioned exactly once, guarded by a
//! mutex. A provisioning failure leaves the engine uninitialized so the
//! next operation retries.
//!
//! Operations take an optional transaction handle; without one, each
//! operation runs as its own auto-committed unit.

use std::time::Duration;

use async_stream::try_stream;
use futures::stream::BoxStream;
use futures::TryStreamExt;
use serde_json::Value;
use sqlx::query::Query;
use sqlx::sqlite::{
    SqliteArguments, SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous,
};
use sqlx::{Sqlite, SqlitePool};
use tokio::sync::Mutex;

use stash_query::{
    parse_query, sqlite_field_mapper, Document, Entry, EntryId, StoreSchema,
};

use crate::config::StoreConfig;
use crate::cursor::{decode_row, EntryCursor};
use crate::error::{Error, Result};
use crate::provision;

const ENTRY_COLUMNS: &str = "_id, _version, _created_by, _updated_by, _created_at, _updated_at, _json";

/// A caller-managed transaction. Must be used only by the request that
/// began it; dropping it without commit rolls back.
pub type StoreTxn = sqlx::Transaction<'static, Sqlite>;

/// Document store engine for one app, backed by sqlite.
pub struct SqlStore {
    config: StoreConfig,
    schema: StoreSchema,
    prefix: String,
    /// `None` until the first successful initialization.
    state: Mutex<Option<SqlitePool>>,
}

impl SqlStore {
    /// Create an engine. No connection is opened and no DDL is issued
    /// until the first operation.
    pub fn new(config: StoreConfig, schema: StoreSchema) -> Self {
        let prefix = config.table_prefix();
        Self {
            config,
            schema,
            prefix,
            state: Mutex::new(None),
        }
    }

    /// Open the pool and provision the schema, exactly once. Concurrent
    /// first calls serialize on the lock; failures leave the state empty
    /// so the next call retries.
    async fn initialize(&self) -> Result<SqlitePool> {
        let mut state = self.state.lock().await;
        if let Some(pool) = state.as_ref() {
            return Ok(pool.clone());
        }

        let pool = open_pool(&self.config).await?;
        provision::init_store(&pool, &self.prefix, &self.config.app_id, &self.schema).await?;
        *state = Some(pool.clone());
        Ok(pool)
    }

    fn gen_table_name(&self, table: &str) -> String {
        provision::gen_table_name(&self.prefix, table)
    }

    /// Begin a transaction.
    pub async fn begin(&self) -> Result<StoreTxn> {
        let pool = self.initialize().await?;
        Ok(pool.begin().await?)
    }

    /// Commit a transaction. Passing `None` is an explicit error.
    pub async fn commit(&self, tx: Option<StoreTxn>) -> Result<()> {
        match tx {
            Some(tx) => Ok(tx.commit().await?),
            None => Err(Error::NoTransaction("commit")),
        }
    }

    /// Roll back a transaction. Passing `None` is an explicit error.
    pub async fn rollback(&self, tx: Option<StoreTxn>) -> Result<()> {
        match tx {
            Some(tx) => Ok(tx.rollback().await?),
            None => Err(Error::NoTransaction("rollback")),
        }
    }

    /// Insert a new entry, returning the generated id. Sets the entry's
    /// created/updated timestamps to now.
    pub async fn insert(
        &self,
        tx: Option<&mut StoreTxn>,
        table: &str,
        entry: &mut Entry,
    ) -> Result<EntryId> {
        let pool = self.initialize().await?;
        let table = self.gen_table_name(table);

        entry.validate_data()?;
        entry.created_at = now_ms();
        entry.updated_at = entry.created_at;

        let data_json = serde_json::to_string(&entry.data).map_err(|e| Error::Marshal {
            table: table.clone(),
            source: e,
        })?;

        let create_stmt = format!(
            "INSERT INTO {table} (_version, _created_by, _updated_by, _created_at, _updated_at, _json) \
             VALUES (?, ?, ?, ?, ?, ?)"
        );
        let query = sqlx::query(&create_stmt)
            .bind(entry.version)
            .bind(&entry.created_by)
            .bind(&entry.updated_by)
            .bind(entry.created_at)
            .bind(entry.updated_at)
            .bind(data_json);

        let result = match tx {
            Some(tx) => query.execute(&mut **tx).await?,
            None => query.execute(&pool).await?,
        };

        Ok(result.last_insert_rowid())
    }

    /// Point lookup by id.
    pub async fn select_by_id(
        &self,
        tx: Option<&mut StoreTxn>,
        table: &str,
        id: EntryId,
    ) -> Result<Entry> {
        let pool = self.initialize().await?;
        let table = self.gen_table_name(table);

        let query_str = format!("SELECT {ENTRY_COLUMNS} FROM {table} WHERE _id = ?");
        let query = sqlx::query(&query_str).bind(id);

        let row = match tx {
            Some(tx) => query.fetch_optional(&mut **tx).await?,
            None => query.fetch_optional(&pool).await?,
        };

        let row = row.ok_or(Error::NotFound {
            table: table.clone(),
            id,
        })?;
        decode_row(&table, &row)
    }

    /// Return the single entry matching the filter.
    pub async fn select_one(
        &self,
        tx: Option<&mut StoreTxn>,
        table: &str,
        filter: &Document,
    ) -> Result<Entry> {
        let pool = self.initialize().await?;
        let table = self.gen_table_name(table);

        let (filter_str, params) = parse_query(filter, Some(sqlite_field_mapper))?;
        let where_str = if filter_str.is_empty() {
            String::new()
        } else {
            format!(" WHERE {filter_str}")
        };

        let query_str = format!("SELECT {ENTRY_COLUMNS} FROM {table}{where_str}");
        let query = bind_values(sqlx::query(&query_str), &params);

        let row = match tx {
            Some(tx) => query.fetch_optional(&mut **tx).await?,
            None => query.fetch_optional(&pool).await?,
        };

        let row = row.ok_or_else(|| Error::NotFoundByFilter {
            table: table.clone(),
            filter: where_str,
        })?;
        decode_row(&table, &row)
    }

    /// Return a lazy cursor over the entries matching the filter.
    ///
    /// `limit` beyond the configured maximum is an error; `limit <= 0`
    /// falls back to the configured default; negative `offset` is
    /// rejected. All checks run before any query is issued.
    pub async fn select<'a>(
        &self,
        tx: Option<&'a mut StoreTxn>,
        table: &str,
        filter: &Document,
        sort: &[String],
        offset: i64,
        mut limit: i64,
    ) -> Result<EntryCursor<'a>> {
        let pool = self.initialize().await?;
        let table = self.gen_table_name(table);

        if limit > self.config.max_select_limit {
            return Err(Error::LimitExceeded {
                limit,
                max: self.config.max_select_limit,
            });
        }
        if limit <= 0 {
            limit = self.config.default_select_limit;
        }
        if offset < 0 {
            return Err(Error::InvalidOffset(offset));
        }

        let sort_str = if sort.is_empty() {
            String::new()
        } else {
            let sorted = stash_query::gen_sort_string(sort, Some(sqlite_field_mapper))?;
            format!(" ORDER BY {sorted}")
        };

        let (filter_str, params) = parse_query(filter, Some(sqlite_field_mapper))?;
        let where_str = if filter_str.is_empty() {
            String::new()
        } else {
            format!(" WHERE {filter_str}")
        };

        let query_str = format!(
            "SELECT {ENTRY_COLUMNS} FROM {table}{where_str}{sort_str} LIMIT {limit} OFFSET {offset}"
        );
        tracing::trace!("query: {}, params: {:?}", query_str, params);

        let stream: BoxStream<'a, Result<Entry>> = match tx {
            Some(tx) => {
                let cursor_table = table.clone();
                Box::pin(try_stream! {
                    let query = bind_values(sqlx::query(&query_str), &params);
                    let mut rows = query.fetch(&mut **tx);
                    while let Some(row) = rows.try_next().await? {
                        yield decode_row(&cursor_table, &row)?;
                    }
                })
            }
            None => {
                let cursor_table = table.clone();
                Box::pin(try_stream! {
                    let query = bind_values(sqlx::query(&query_str), &params);
                    let mut rows = query.fetch(&pool);
                    while let Some(row) = rows.try_next().await? {
                        yield decode_row(&cursor_table, &row)?;
                    }
                })
            }
        };

        Ok(EntryCursor::new(table, stream))
    }

    /// Return the number of entries matching the filter.
    pub async fn count(
        &self,
        tx: Option<&mut StoreTxn>,
        table: &str,
        filter: &Document,
    ) -> Result<i64> {
        let pool = self.initialize().await?;
        let table = self.gen_table_name(table);

        let (filter_str, params) = parse_query(filter, Some(sqlite_field_mapper))?;
        let where_str = if filter_str.is_empty() {
            String::new()
        } else {
            format!(" WHERE {filter_str}")
        };

        let query_str = format!("SELECT count(_id) FROM {table}{where_str}");
        tracing::trace!("query: {}, params: {:?}", query_str, params);

        let query = bind_values(sqlx::query_scalar(&query_str), &params);
        let count: i64 = match tx {
            Some(tx) => query.fetch_one(&mut **tx).await?,
            None => query.fetch_one(&pool).await?,
        };

        Ok(count)
    }

    /// Update an existing entry with optimistic concurrency: the statement
    /// matches on the entry's pre-update `updated_at`, so a concurrent
    /// writer makes this affect zero rows. Zero affected rows is reported
    /// as a combined not-found-or-conflict error; the two causes are not
    /// distinguishable here.
    pub async fn update(
        &self,
        tx: Option<&mut StoreTxn>,
        table: &str,
        entry: &mut Entry,
    ) -> Result<u64> {
        let pool = self.initialize().await?;
        let table = self.gen_table_name(table);

        entry.validate_data()?;
        let orig_updated_at = entry.updated_at;
        entry.updated_at = now_ms();

        let data_json = serde_json::to_string(&entry.data).map_err(|e| Error::Marshal {
            table: table.clone(),
            source: e,
        })?;

        let update_stmt = format!(
            "UPDATE {table} set _version = ?, _updated_by = ?, _updated_at = ?, _json = ? \
             where _id = ? and _updated_at = ?"
        );
        tracing::trace!(
            "query: {}, id: {} updated_at {}",
            update_stmt,
            entry.id,
            orig_updated_at
        );

        let query = sqlx::query(&update_stmt)
            .bind(entry.version)
            .bind(&entry.updated_by)
            .bind(entry.updated_at)
            .bind(data_json)
            .bind(entry.id)
            .bind(orig_updated_at);

        let result = match tx {
            Some(tx) => query.execute(&mut **tx).await?,
            None => query.execute(&pool).await?,
        };

        let rows = result.rows_affected();
        if rows == 0 {
            return Err(Error::UpdateConflict {
                table,
                id: entry.id,
            });
        }
        Ok(rows)
    }

    /// Delete one entry by id. Zero affected rows is a not-found error.
    pub async fn delete_by_id(
        &self,
        tx: Option<&mut StoreTxn>,
        table: &str,
        id: EntryId,
    ) -> Result<u64> {
        let pool = self.initialize().await?;
        let table = self.gen_table_name(table);

        let delete_stmt = format!("DELETE from {table} where _id = ?");
        let query = sqlx::query(&delete_stmt).bind(id);

        let result = match tx {
            Some(tx) => query.execute(&mut **tx).await?,
            None => query.execute(&pool).await?,
        };

        let rows = result.rows_affected();
        if rows == 0 {
            return Err(Error::NotFound { table, id });
        }
        Ok(rows)
    }

    /// Delete the entries matching the filter, returning the affected-row
    /// count. Zero matches is a normal zero result, not an error.
    pub async fn delete(
        &self,
        tx: Option<&mut StoreTxn>,
        table: &str,
        filter: &Document,
    ) -> Result<u64> {
        let pool = self.initialize().await?;
        let table = self.gen_table_name(table);

        let (filter_str, params) = parse_query(filter, Some(sqlite_field_mapper))?;
        let where_str = if filter_str.is_empty() {
            String::new()
        } else {
            format!(" WHERE {filter_str}")
        };

        let delete_stmt = format!("DELETE FROM {table}{where_str}");
        let query = bind_values(sqlx::query(&delete_stmt), &params);

        let result = match tx {
            Some(tx) => query.execute(&mut **tx).await?,
            None => query.execute(&pool).await?,
        };

        Ok(result.rows_affected())
    }
}

async fn open_pool(config: &StoreConfig) -> Result<SqlitePool> {
    let options = SqliteConnectOptions::new()
        .filename(config.database_path())
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal)
        .busy_timeout(Duration::from_millis(10_000));

    Ok(SqlitePoolOptions::new()
        .max_connections(10)
        .connect_with(options)
        .await?)
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Bind compiled filter parameters onto a query. Values are bound by their
/// JSON shape; lists and maps never reach here since the compiler rejects
/// them as parameter positions.
trait BindValue<'q>: Sized {
    fn bind_json(self, value: &Value) -> Self;
}

impl<'q> BindValue<'q> for Query<'q, Sqlite, SqliteArguments<'q>> {
    fn bind_json(self, value: &Value) -> Self {
        match value {
            Value::Null => self.bind(None::<String>),
            Value::Bool(b) => self.bind(*b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => self.bind(i),
                None => self.bind(n.as_f64().unwrap_or_default()),
            },
            Value::String(s) => self.bind(s.clone()),
            other => self.bind(other.to_string()),
        }
    }
}

impl<'q> BindValue<'q> for sqlx::query::QueryScalar<'q, Sqlite, i64, SqliteArguments<'q>> {
    fn bind_json(self, value: &Value) -> Self {
        match value {
            Value::Null => self.bind(None::<String>),
            Value::Bool(b) => self.bind(*b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => self.bind(i),
                None => self.bind(n.as_f64().unwrap_or_default()),
            },
            Value::String(s) => self.bind(s.clone()),
            other => self.bind(other.to_string()),
        }
    }
}

fn bind_values<'q, Q: BindValue<'q>>(mut query: Q, params: &[Value]) -> Q {
    for value in params {
        query = query.bind_json(value);
    }
    query
}
