//! Error types for the query compilers and schema validation.

use serde_json::Value;
use thiserror::Error;

/// All possible errors from filter/sort compilation, schema validation and
/// the entry codec. Each variant carries enough context to name the
/// offending field, operator or value in the message.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum Error {
    // Field mapping errors
    #[error("querying {0} directly is not supported")]
    PayloadFieldQuery(String),

    #[error("field path cannot contain an apostrophe: {0}")]
    FieldApostrophe(String),

    // Filter compilation errors
    #[error("invalid condition for {field}, list supported for logical operators only, got: {value}")]
    ListForNonLogical { field: String, value: Value },

    #[error("invalid condition for {operator}, expected list, got: {value}")]
    LogicalExpectsList { operator: String, value: Value },

    #[error("invalid condition for {operator}, expected list of maps, got: {value}")]
    LogicalExpectsListOfMaps { operator: String, value: Value },

    #[error("invalid condition for {0}, expected non-empty list of maps")]
    EmptyLogicalList(String),

    #[error("operator {operator} supported for field conditions only: {value}")]
    OperatorAtTopLevel { operator: String, value: Value },

    #[error("invalid query condition for {field}, only list of maps supported: {value}")]
    ListOfMapsOnly { field: String, value: Value },

    #[error("invalid condition for {field} {key}, list supported for logical operators only, got: {value}")]
    FieldListForNonLogical {
        field: String,
        key: String,
        value: Value,
    },

    #[error("invalid query condition for {field} {key}, map not supported: {value}")]
    FieldMapNotSupported {
        field: String,
        key: String,
        value: Value,
    },

    #[error("invalid query condition for {field} {key}, only list of maps supported: {value}")]
    FieldListOfMapsOnly {
        field: String,
        key: String,
        value: Value,
    },

    #[error("invalid query condition for {field} {key}, only operators supported: {value}")]
    FieldOperatorsOnly {
        field: String,
        key: String,
        value: Value,
    },

    #[error("invalid logical condition for {field} {operator}, only one key supported: {value}")]
    FieldLogicalSingleKey {
        field: String,
        operator: String,
        value: Value,
    },

    #[error("invalid logical condition for {field} {key}, only operators supported: {value}")]
    FieldLogicalOperatorsOnly {
        field: String,
        key: String,
        value: Value,
    },

    #[error("invalid logical condition for {field} {operator}, expected non-empty list")]
    FieldEmptyLogicalList { field: String, operator: String },

    // Sort compilation / index spec errors
    #[error("invalid sort direction in field spec: {0}")]
    InvalidSortDirection(String),

    // Schema validation errors
    #[error("duplicate type name: {0}")]
    DuplicateType(String),

    #[error("duplicate field {field} in type {type_name}")]
    DuplicateField { type_name: String, field: String },

    #[error("index references undeclared field {field} in type {type_name}")]
    UndeclaredIndexField { type_name: String, field: String },

    #[error("error serializing schema: {0}")]
    SchemaSerialize(String),

    // Entry codec errors
    #[error("document value must be an object, got: {0}")]
    InvalidDocument(Value),

    #[error("type mismatch for field '{field}': expected {expected}, got {got}")]
    TypeMismatch {
        field: String,
        expected: String,
        got: String,
    },

    #[error("field {0} is reserved")]
    ReservedField(String),
}

/// Result type for query compilation.
pub type Result<T> = std::result::Result<T, Error>;
