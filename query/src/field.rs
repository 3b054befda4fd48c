//! Field mapping from logical names to physical SQL expressions.
//!
//! Every stored type shares the same physical layout: six envelope columns
//! plus one JSON payload column. A [`FieldMapper`] decides how a logical
//! field name in a filter or sort spec is read in SQL: envelope columns
//! are addressed directly, everything else goes through a JSON path
//! projection on the payload column.

use crate::error::{Error, Result};

/// Auto-assigned integer identifier column.
pub const ID_FIELD: &str = "_id";
/// Caller-managed version column, used for optimistic-concurrency messaging.
pub const VERSION_FIELD: &str = "_version";
/// Principal that created the entry.
pub const CREATED_BY_FIELD: &str = "_created_by";
/// Principal that last updated the entry.
pub const UPDATED_BY_FIELD: &str = "_updated_by";
/// Creation timestamp, epoch milliseconds.
pub const CREATED_AT_FIELD: &str = "_created_at";
/// Last-update timestamp, epoch milliseconds. Doubles as the
/// optimistic-concurrency token.
pub const UPDATED_AT_FIELD: &str = "_updated_at";
/// The JSON payload column. Reserved, and not directly queryable.
pub const JSON_FIELD: &str = "_json";

/// The reserved column names present on every stored type's table.
pub const RESERVED_FIELDS: [&str; 7] = [
    ID_FIELD,
    VERSION_FIELD,
    CREATED_BY_FIELD,
    UPDATED_BY_FIELD,
    CREATED_AT_FIELD,
    UPDATED_AT_FIELD,
    JSON_FIELD,
];

/// Check whether a field name is one of the reserved envelope columns.
pub fn is_reserved(field: &str) -> bool {
    RESERVED_FIELDS.contains(&field)
}

/// Maps a logical field name to the expression to be passed in the SQL.
///
/// `None` in the compiler entry points means "use the name verbatim"; that
/// mode exists for tests and index-name derivation, not production queries.
pub type FieldMapper = fn(&str) -> Result<String>;

/// Field mapper for the sqlite backend.
///
/// Envelope columns map to themselves, except the payload column which is
/// rejected. All other names become `_json ->> '<name>'` projections. Names
/// containing an apostrophe are rejected since the name is interpolated
/// into the projection expression.
pub fn sqlite_field_mapper(field: &str) -> Result<String> {
    if is_reserved(field) {
        if field == JSON_FIELD {
            return Err(Error::PayloadFieldQuery(field.to_string()));
        }
        return Ok(field.to_string());
    }

    if field.contains('\'') {
        return Err(Error::FieldApostrophe(field.to_string()));
    }

    Ok(format!("{JSON_FIELD} ->> '{field}'"))
}

/// Apply an optional mapper, falling back to the verbatim name.
pub(crate) fn map_field(field: &str, mapper: Option<FieldMapper>) -> Result<String> {
    match mapper {
        Some(mapper) => mapper(field),
        None => Ok(field.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reserved_fields_map_to_themselves() {
        for field in RESERVED_FIELDS {
            if field == JSON_FIELD {
                continue;
            }
            assert_eq!(sqlite_field_mapper(field).unwrap(), field);
        }
    }

    #[test]
    fn payload_column_rejected() {
        let err = sqlite_field_mapper(JSON_FIELD).unwrap_err();
        assert_eq!(err.to_string(), "querying _json directly is not supported");
    }

    #[test]
    fn payload_fields_use_json_projection() {
        assert_eq!(
            sqlite_field_mapper("city").unwrap(),
            "_json ->> 'city'"
        );
        assert_eq!(
            sqlite_field_mapper("map.key").unwrap(),
            "_json ->> 'map.key'"
        );
    }

    #[test]
    fn apostrophe_rejected() {
        let err = sqlite_field_mapper("a' or 1=1 --").unwrap_err();
        assert!(matches!(err, Error::FieldApostrophe(_)));
    }

    #[test]
    fn no_mapper_is_verbatim() {
        assert_eq!(map_field("anything", None).unwrap(), "anything");
        assert_eq!(map_field(JSON_FIELD, None).unwrap(), JSON_FIELD);
    }
}
