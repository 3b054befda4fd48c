//! The entry type and the codec between entries and document-model values.

use serde_json::Value;

use crate::error::{Error, Result};
use crate::field::{
    is_reserved, CREATED_AT_FIELD, CREATED_BY_FIELD, ID_FIELD, JSON_FIELD, UPDATED_AT_FIELD,
    UPDATED_BY_FIELD, VERSION_FIELD,
};
use crate::{Document, EntryId, Timestamp, UserId, Version};

/// One logical document: the six envelope fields plus the free-form data
/// map persisted as a single JSON payload.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Entry {
    /// Assigned by the engine on insert.
    pub id: EntryId,
    /// Caller-supplied; persisted verbatim, not auto-incremented.
    pub version: Version,
    pub created_by: UserId,
    pub updated_by: UserId,
    /// Epoch milliseconds, set once at insert.
    pub created_at: Timestamp,
    /// Epoch milliseconds, set by the engine on every successful update.
    /// Also the optimistic-concurrency token.
    pub updated_at: Timestamp,
    pub data: Document,
}

impl Entry {
    /// Create an entry with the given data and a zeroed envelope. The
    /// engine fills in id and timestamps on insert.
    pub fn new(data: Document) -> Self {
        Self {
            data,
            ..Default::default()
        }
    }

    /// Convert to the flat document-model value exposed to calling code:
    /// envelope fields plus every payload key in one object.
    pub fn to_value(&self) -> Value {
        let mut out = Document::new();
        out.insert(ID_FIELD.to_string(), Value::from(self.id));
        out.insert(VERSION_FIELD.to_string(), Value::from(self.version));
        out.insert(
            CREATED_BY_FIELD.to_string(),
            Value::from(self.created_by.clone()),
        );
        out.insert(
            UPDATED_BY_FIELD.to_string(),
            Value::from(self.updated_by.clone()),
        );
        out.insert(CREATED_AT_FIELD.to_string(), Value::from(self.created_at));
        out.insert(UPDATED_AT_FIELD.to_string(), Value::from(self.updated_at));
        for (key, value) in &self.data {
            out.insert(key.clone(), value.clone());
        }
        Value::Object(out)
    }

    /// Decode a document-model value back into an entry. Reserved fields
    /// must carry their expected shapes; all other keys become payload
    /// data.
    pub fn from_value(value: &Value) -> Result<Self> {
        let Some(obj) = value.as_object() else {
            return Err(Error::InvalidDocument(value.clone()));
        };

        let mut entry = Entry::default();
        for (key, value) in obj {
            match key.as_str() {
                ID_FIELD => entry.id = expect_integer(key, value)?,
                VERSION_FIELD => entry.version = expect_integer(key, value)?,
                CREATED_BY_FIELD => entry.created_by = expect_string(key, value)?,
                UPDATED_BY_FIELD => entry.updated_by = expect_string(key, value)?,
                CREATED_AT_FIELD => entry.created_at = expect_integer(key, value)?,
                UPDATED_AT_FIELD => entry.updated_at = expect_integer(key, value)?,
                JSON_FIELD => return Err(Error::ReservedField(key.clone())),
                _ => {
                    entry.data.insert(key.clone(), value.clone());
                }
            }
        }
        Ok(entry)
    }

    /// Check that no reserved envelope name appears inside the data map.
    pub fn validate_data(&self) -> Result<()> {
        for key in self.data.keys() {
            if is_reserved(key) {
                return Err(Error::ReservedField(key.clone()));
            }
        }
        Ok(())
    }
}

fn expect_integer(field: &str, value: &Value) -> Result<i64> {
    value.as_i64().ok_or_else(|| Error::TypeMismatch {
        field: field.to_string(),
        expected: "integer".to_string(),
        got: json_type_name(value).to_string(),
    })
}

fn expect_string(field: &str, value: &Value) -> Result<String> {
    match value {
        Value::String(s) => Ok(s.clone()),
        other => Err(Error::TypeMismatch {
            field: field.to_string(),
            expected: "string".to_string(),
            got: json_type_name(other).to_string(),
        }),
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_i64() || n.is_u64() => "integer",
        Value::Number(_) => "float",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "map",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_entry() -> Entry {
        Entry {
            id: 7,
            version: 2,
            created_by: "alice".into(),
            updated_by: "bob".into(),
            created_at: 1_706_745_600_000,
            updated_at: 1_706_745_700_000,
            data: json!({"name": "Widget", "tags": ["a", "b"], "specs": {"w": 3}})
                .as_object()
                .cloned()
                .unwrap(),
        }
    }

    #[test]
    fn to_value_flattens_envelope_and_payload() {
        let value = sample_entry().to_value();
        assert_eq!(value["_id"], json!(7));
        assert_eq!(value["_version"], json!(2));
        assert_eq!(value["_created_by"], json!("alice"));
        assert_eq!(value["_updated_by"], json!("bob"));
        assert_eq!(value["_created_at"], json!(1_706_745_600_000i64));
        assert_eq!(value["_updated_at"], json!(1_706_745_700_000i64));
        assert_eq!(value["name"], json!("Widget"));
        assert_eq!(value["specs"], json!({"w": 3}));
    }

    #[test]
    fn value_roundtrip() {
        let entry = sample_entry();
        let decoded = Entry::from_value(&entry.to_value()).unwrap();
        assert_eq!(decoded, entry);
    }

    #[test]
    fn from_value_defaults_missing_envelope() {
        let entry = Entry::from_value(&json!({"name": "Widget"})).unwrap();
        assert_eq!(entry.id, 0);
        assert_eq!(entry.version, 0);
        assert_eq!(entry.data["name"], json!("Widget"));
    }

    #[test]
    fn from_value_rejects_bad_id_shape() {
        let err = Entry::from_value(&json!({"_id": "seven"})).unwrap_err();
        assert_eq!(
            err.to_string(),
            "type mismatch for field '_id': expected integer, got string"
        );
    }

    #[test]
    fn from_value_rejects_bad_audit_shape() {
        let err = Entry::from_value(&json!({"_created_by": 42})).unwrap_err();
        assert!(matches!(err, Error::TypeMismatch { field, .. } if field == "_created_by"));
    }

    #[test]
    fn from_value_rejects_payload_column() {
        let err = Entry::from_value(&json!({"_json": {}})).unwrap_err();
        assert_eq!(err, Error::ReservedField("_json".into()));
    }

    #[test]
    fn from_value_rejects_non_object() {
        let err = Entry::from_value(&json!([1, 2])).unwrap_err();
        assert!(matches!(err, Error::InvalidDocument(_)));
    }

    #[test]
    fn validate_data_rejects_reserved_keys() {
        let mut entry = sample_entry();
        entry.data.insert("_id".into(), json!(1));
        let err = entry.validate_data().unwrap_err();
        assert_eq!(err, Error::ReservedField("_id".into()));
    }
}
