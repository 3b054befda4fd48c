//! Schema-less document storage over sqlite.
//!
//! Each stored type gets one physical table with a fixed envelope
//! (id, version, audit identities, timestamps) and a single JSON payload
//! column. Filters and sort specs are compiled to parameterized SQL by
//! [`stash_query`]; this crate owns the IO side: connection management,
//! schema provisioning, CRUD, transactions and lazy result cursors.
//!
//! ```no_run
//! use stash_query::{Entry, FieldKind, StoreField, StoreSchema, StoreType};
//! use stash_store::{SqlStore, StoreConfig};
//!
//! # async fn demo() -> stash_store::Result<()> {
//! let schema = StoreSchema::new(vec![StoreType::new(
//!     "customer",
//!     vec![StoreField::new("name", FieldKind::String)],
//! )])?;
//! let config = StoreConfig::new("sqlite:/tmp/app.db", "app123")?;
//! let store = SqlStore::new(config, schema);
//!
//! let mut entry = Entry::new([("name".to_string(), "zig".into())].into_iter().collect());
//! let id = store.insert(None, "customer", &mut entry).await?;
//! let fetched = store.select_by_id(None, "customer", id).await?;
//! assert_eq!(fetched.data, entry.data);
//! # Ok(())
//! # }
//! ```

mod config;
mod cursor;
mod engine;
mod error;
mod provision;

pub use config::{StoreConfig, DRIVER_SQLITE, SELECT_DEFAULT_LIMIT, SELECT_MAX_LIMIT};
pub use cursor::EntryCursor;
pub use engine::{SqlStore, StoreTxn};
pub use error::{Error, Result};
