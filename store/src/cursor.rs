//! Lazy entry cursor over a live select.
//!
//! A cursor is a forward-only, single-pass stream: each polled row is
//! decoded into an [`Entry`] on the spot. The underlying sqlx fetch stream
//! is owned by the cursor, so dropping it (on completion, early
//! termination or error) releases the database cursor.

use std::pin::Pin;
use std::task::{Context, Poll};

use futures::stream::BoxStream;
use futures::{Stream, StreamExt};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use stash_query::{Document, Entry};

use crate::error::{Error, Result};

/// Stream of decoded entries from one select operation.
///
/// The lifetime covers the transaction the select ran in; cursors produced
/// outside a transaction are `'static`.
pub struct EntryCursor<'a> {
    table: String,
    inner: BoxStream<'a, Result<Entry>>,
}

impl<'a> EntryCursor<'a> {
    pub(crate) fn new(table: String, inner: BoxStream<'a, Result<Entry>>) -> Self {
        Self { table, inner }
    }

    /// The quoted physical table name this cursor reads from.
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Fetch the next entry, or `None` once the cursor is exhausted.
    pub async fn try_next(&mut self) -> Result<Option<Entry>> {
        self.inner.next().await.transpose()
    }

    /// Drain the cursor into a vector. Mainly for tests and small results;
    /// prefer streaming for large selects.
    pub async fn collect_all(mut self) -> Result<Vec<Entry>> {
        let mut entries = Vec::new();
        while let Some(entry) = self.try_next().await? {
            entries.push(entry);
        }
        Ok(entries)
    }
}

impl Stream for EntryCursor<'_> {
    type Item = Result<Entry>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.poll_next_unpin(cx)
    }
}

impl std::fmt::Debug for EntryCursor<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} cursor", self.table)
    }
}

/// Decode one physical row into an entry. Timestamps are stored as epoch
/// milliseconds; the payload column holds the JSON-serialized data map.
pub(crate) fn decode_row(table: &str, row: &SqliteRow) -> Result<Entry> {
    let data_str: String = row.try_get("_json")?;
    let data: Document = if data_str.is_empty() {
        Document::new()
    } else {
        serde_json::from_str(&data_str).map_err(|e| Error::Unmarshal {
            table: table.to_string(),
            source: e,
        })?
    };

    Ok(Entry {
        id: row.try_get("_id")?,
        version: row.try_get("_version")?,
        created_by: row.try_get("_created_by")?,
        updated_by: row.try_get("_updated_by")?,
        created_at: row.try_get("_created_at")?,
        updated_at: row.try_get("_updated_at")?,
        data,
    })
}
