//! Schema declarations for stored types.
//!
//! A [`StoreSchema`] is the set of types an app declares: each type maps to
//! one physical table, with an ordered field list and optional indexes.
//! Validation runs at load time, before any DDL is generated, so malformed
//! declarations never reach the database.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;

use crate::error::{Error, Result};
use crate::field::{is_reserved, JSON_FIELD};
use crate::sort::{SORT_ASCENDING, SORT_DESCENDING};

/// Declared field types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    Int,
    String,
    Boolean,
    List,
    Dict,
}

impl std::fmt::Display for FieldKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FieldKind::Int => write!(f, "int"),
            FieldKind::String => write!(f, "string"),
            FieldKind::Boolean => write!(f, "boolean"),
            FieldKind::List => write!(f, "list"),
            FieldKind::Dict => write!(f, "dict"),
        }
    }
}

/// One declared field of a stored type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreField {
    pub name: String,
    pub kind: FieldKind,
    /// Optional default supplied by the type declaration.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
}

impl StoreField {
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
            default: None,
        }
    }

    pub fn with_default(name: impl Into<String>, kind: FieldKind, default: Value) -> Self {
        Self {
            name: name.into(),
            kind,
            default: Some(default),
        }
    }
}

/// An index declaration: ordered field specs (`field`, `field:asc` or
/// `field:desc`) plus a uniqueness flag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Index {
    pub fields: Vec<String>,
    pub unique: bool,
}

impl Index {
    pub fn new(fields: Vec<String>, unique: bool) -> Self {
        Self { fields, unique }
    }
}

/// One stored type: maps to a single physical table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreType {
    pub name: String,
    pub fields: Vec<StoreField>,
    #[serde(default)]
    pub indexes: Vec<Index>,
}

impl StoreType {
    pub fn new(name: impl Into<String>, fields: Vec<StoreField>) -> Self {
        Self {
            name: name.into(),
            fields,
            indexes: Vec::new(),
        }
    }

    pub fn with_index(mut self, index: Index) -> Self {
        self.indexes.push(index);
        self
    }
}

/// The full schema declaration for an app session, with the raw declaration
/// bytes used for etag computation during provisioning.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreSchema {
    types: Vec<StoreType>,
    raw: Vec<u8>,
}

impl StoreSchema {
    /// Build and validate a schema. The raw bytes are the canonical JSON
    /// serialization of the type declarations.
    pub fn new(types: Vec<StoreType>) -> Result<Self> {
        let raw = serde_json::to_vec(&types).map_err(|e| Error::SchemaSerialize(e.to_string()))?;
        Self::from_raw(types, raw)
    }

    /// Build and validate a schema using the original declaration bytes
    /// supplied by the host's script-loading layer.
    pub fn from_raw(types: Vec<StoreType>, raw: Vec<u8>) -> Result<Self> {
        validate_types(&types)?;
        Ok(Self { types, raw })
    }

    pub fn types(&self) -> &[StoreType] {
        &self.types
    }

    /// The raw declaration bytes, hashed into the provisioning etag.
    pub fn raw_bytes(&self) -> &[u8] {
        &self.raw
    }
}

/// Split an index/sort field spec into its field name and direction.
/// A `:suffix` that is not `asc` or `desc` (case-insensitive) is an error.
pub fn split_direction(spec: &str) -> Result<(&str, bool)> {
    match spec.rsplit_once(':') {
        None => Ok((spec, false)),
        Some((name, direction)) => {
            let lower = direction.to_lowercase();
            if lower == SORT_ASCENDING {
                Ok((name.trim_end(), false))
            } else if lower == SORT_DESCENDING {
                Ok((name.trim_end(), true))
            } else {
                Err(Error::InvalidSortDirection(spec.to_string()))
            }
        }
    }
}

fn validate_types(types: &[StoreType]) -> Result<()> {
    let mut type_names: HashSet<&str> = HashSet::new();

    for store_type in types {
        if !type_names.insert(store_type.name.as_str()) {
            return Err(Error::DuplicateType(store_type.name.clone()));
        }

        let mut field_names: HashSet<&str> = HashSet::new();
        for field in &store_type.fields {
            if !field_names.insert(field.name.as_str()) {
                return Err(Error::DuplicateField {
                    type_name: store_type.name.clone(),
                    field: field.name.clone(),
                });
            }
        }

        for index in &store_type.indexes {
            for spec in &index.fields {
                let (name, _) = split_direction(spec)?;
                // Dotted specs index a path inside a declared dict field;
                // only the leading segment has to be declared.
                let base = name.split('.').next().unwrap_or(name);
                let declared = field_names.contains(base);
                let envelope = is_reserved(base) && base != JSON_FIELD;
                if !declared && !envelope {
                    return Err(Error::UndeclaredIndexField {
                        type_name: store_type.name.clone(),
                        field: name.to_string(),
                    });
                }
            }
        }
    }

    Ok(())
}
