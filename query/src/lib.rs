//! # Stash Query
//!
//! Pure compilers and types for the Stash document store.
//!
//! This crate turns the loosely-typed query documents supplied by app
//! scripts into parameterized SQL fragments. It has no IO: everything here
//! is deterministic and testable without a database.
//!
//! ## Core Concepts
//!
//! ### Entries
//!
//! Documents are stored as entries with six reserved envelope fields
//! (`_id`, `_version`, `_created_by`, `_updated_by`, `_created_at`,
//! `_updated_at`) plus a free-form field map persisted as one JSON column
//! (`_json`).
//!
//! ### Filter DSL
//!
//! Filters are nested JSON objects in a MongoDB-like dialect:
//!
//! - `{"age": 30}` for equality on a field
//! - `{"age": {"$gt": 30, "$lt": 40}}` for comparison operators
//! - `{"$or": [{"city": "NY"}, {"state": "CA"}]}` for logical groups
//!
//! [`parse_query`] compiles a filter into a SQL condition string plus an
//! ordered list of bound parameters. Keys are compiled in lexicographic
//! order so the generated SQL is deterministic.
//!
//! ### Field Mapping
//!
//! Logical field names are translated to physical SQL expressions by a
//! [`FieldMapper`]: envelope columns map to themselves, everything else
//! becomes a JSON path projection against the payload column. Passing
//! `None` keeps names verbatim, which is used for tests and for deriving
//! index names.
//!
//! ### Schema
//!
//! [`StoreSchema`] declares the stored types (fields and indexes) and is
//! validated before any DDL is generated from it.

pub mod entry;
pub mod error;
pub mod field;
pub mod filter;
pub mod schema;
pub mod sort;

pub use entry::Entry;
pub use error::{Error, Result};
pub use field::{sqlite_field_mapper, FieldMapper, JSON_FIELD, RESERVED_FIELDS};
pub use filter::{parse_query, AND_CONDITION, OR_CONDITION};
pub use schema::{FieldKind, Index, StoreField, StoreSchema, StoreType};
pub use sort::{gen_sort_string, SORT_ASCENDING, SORT_DESCENDING};

/// Type aliases for clarity
pub type EntryId = i64;
pub type Version = i64;
pub type UserId = String;
/// Milliseconds since the Unix epoch.
pub type Timestamp = i64;
/// The free-form field map of an entry, and the shape of a filter document.
pub type Document = serde_json::Map<String, serde_json::Value>;
