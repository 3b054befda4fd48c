//! Schema provisioning: physical table and index DDL plus the etag ledger.
//!
//! Provisioning is idempotent. Tables and indexes use `IF NOT EXISTS` with
//! deterministic names, and a ledger table records a SHA-256 digest of the
//! raw schema declaration so an unchanged schema inserts no new ledger row.

use sha2::{Digest, Sha256};
use sqlx::{Row, SqlitePool};

use stash_query::{gen_sort_string, sqlite_field_mapper, Index, StoreSchema};

use crate::error::{Error, Result};

/// Physical table name for a stored type: quoted `'<prefix>_<type>'`.
pub(crate) fn gen_table_name(prefix: &str, table: &str) -> String {
    format!("'{prefix}_{table}'")
}

fn create_table_stmt(table: &str) -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS {table} (_id INTEGER PRIMARY KEY AUTOINCREMENT, \
         _version INTEGER, _created_by TEXT, _updated_by TEXT, \
         _created_at INTEGER, _updated_at INTEGER, _json JSON)"
    )
}

/// Build the CREATE INDEX statement for one index declaration. The index
/// name is derived from the unmapped field specs so it is stable across
/// runs and does not collide across tables.
pub(crate) fn create_index_stmt(unquoted_table: &str, index: &Index) -> Result<String> {
    let mapped_columns =
        gen_sort_string(&index.fields, Some(sqlite_field_mapper)).map_err(|e| {
            Error::IndexColumns {
                table: unquoted_table.to_string(),
                source: e,
            }
        })?;
    let unmapped_columns = gen_sort_string(&index.fields, None).map_err(|e| Error::IndexColumns {
        table: unquoted_table.to_string(),
        source: e,
    })?;

    let index_name = format!(
        "index_{}_{}",
        unquoted_table,
        unmapped_columns.replace(", ", "_").replace(' ', "_")
    );

    let unique = if index.unique { " UNIQUE " } else { " " };
    Ok(format!(
        "CREATE{unique}INDEX IF NOT EXISTS '{index_name}' ON '{unquoted_table}' ({mapped_columns})"
    ))
}

/// Create the physical tables and indexes for every declared type, then
/// record the schema in the ledger. Any DDL failure aborts provisioning so
/// the engine stays uninitialized and retries on the next operation.
pub(crate) async fn init_store(
    pool: &SqlitePool,
    prefix: &str,
    app_id: &str,
    schema: &StoreSchema,
) -> Result<()> {
    for store_type in schema.types() {
        let table = gen_table_name(prefix, &store_type.name);

        sqlx::query(&create_table_stmt(&table))
            .execute(pool)
            .await
            .map_err(|e| Error::CreateTable {
                table: table.clone(),
                source: e,
            })?;
        tracing::info!("created table {}", table);

        let unquoted_table = table.trim_matches('\'');
        for index in &store_type.indexes {
            let index_stmt = create_index_stmt(unquoted_table, index)?;
            tracing::trace!("index stmt: {}", index_stmt);
            sqlx::query(&index_stmt)
                .execute(pool)
                .await
                .map_err(|e| Error::CreateIndex {
                    table: unquoted_table.to_string(),
                    source: e,
                })?;
        }
    }

    create_schema_info(pool, prefix, app_id, schema).await
}

async fn create_schema_info(
    pool: &SqlitePool,
    prefix: &str,
    app_id: &str,
    schema: &StoreSchema,
) -> Result<()> {
    let schema_table = format!("'{prefix}_schema_log'");
    let create_stmt = format!(
        "CREATE TABLE IF NOT EXISTS {schema_table} (version INTEGER PRIMARY KEY AUTOINCREMENT, \
         created_by TEXT, updated_by TEXT, created_at INTEGER, updated_at INTEGER, \
         main_app TEXT, schema_data BLOB, schema_etag TEXT)"
    );
    sqlx::query(&create_stmt)
        .execute(pool)
        .await
        .map_err(|e| Error::CreateTable {
            table: schema_table.clone(),
            source: e,
        })?;

    let status_query =
        format!("select schema_etag from {schema_table} order by version desc limit 1");
    let latest_etag: Option<String> = sqlx::query(&status_query)
        .fetch_optional(pool)
        .await?
        .map(|row| row.try_get(0))
        .transpose()?;

    let digest = hex::encode(Sha256::digest(schema.raw_bytes()));
    if latest_etag.as_deref() == Some(digest.as_str()) {
        // Existing ledger entry matches the current schema
        tracing::debug!("schema up to date, not inserting new entry");
        return Ok(());
    }

    let now = chrono::Utc::now().timestamp_millis();
    let user_id = "admin";
    let insert_stmt = format!(
        "insert into {schema_table} (created_by, updated_by, created_at, updated_at, \
         main_app, schema_data, schema_etag) values (?, ?, ?, ?, ?, ?, ?)"
    );
    sqlx::query(&insert_stmt)
        .bind(user_id)
        .bind(user_id)
        .bind(now)
        .bind(now)
        .bind(app_id)
        .bind(schema.raw_bytes())
        .bind(&digest)
        .execute(pool)
        .await?;

    Ok(())
}
