//! The condition compiler: filter documents to SQL fragments.
//!
//! A filter is a JSON object mapping field names to scalar values (plain
//! equality), operator maps (`{"$gt": 30}`) or logical groups
//! (`{"$or": [ ... ]}`). [`parse_query`] compiles it into a SQL condition
//! string with `?` placeholders plus the bound parameters in matching
//! order. Keys are compiled in lexicographic order so the output text is
//! deterministic.

use serde_json::Value;

use crate::error::{Error, Result};
use crate::field::{map_field, FieldMapper};
use crate::Document;

/// Logical conjunction key. Matching is case-insensitive on input.
pub const AND_CONDITION: &str = "$AND";
/// Logical disjunction key. Matching is case-insensitive on input.
pub const OR_CONDITION: &str = "$OR";

/// The fixed comparison-operator table.
fn sql_operator(key: &str) -> Option<&'static str> {
    match key {
        "$gt" => Some(">"),
        "$lt" => Some("<"),
        "$gte" => Some(">="),
        "$lte" => Some("<="),
        "$eq" => Some("="),
        "$ne" => Some("!="),
        "$like" => Some("like"),
        _ => None,
    }
}

fn is_logical_operator(key: &str) -> bool {
    let upper = key.to_uppercase();
    upper == AND_CONDITION || upper == OR_CONDITION
}

/// The emitted joiner is always uppercase regardless of the input key case.
fn joiner_for(operator: &str) -> &'static str {
    if operator.to_uppercase() == OR_CONDITION {
        " OR "
    } else {
        " AND "
    }
}

/// Interpret a JSON array as a list of filter documents, which is the only
/// list shape the DSL accepts.
fn as_condition_list(value: &Value) -> Option<Vec<&Document>> {
    let items = value.as_array()?;
    items.iter().map(|item| item.as_object()).collect()
}

/// Compile a filter document into a SQL condition string and the bound
/// parameters, in placeholder order. An empty filter yields an empty
/// string and no parameters.
pub fn parse_query(
    query: &Document,
    mapper: Option<FieldMapper>,
) -> Result<(String, Vec<Value>)> {
    let mut conditions: Vec<String> = Vec::new();
    let mut params: Vec<Value> = Vec::new();

    let mut keys: Vec<&String> = query.keys().collect();
    keys.sort(); // Sort the keys, mainly for easily testing the generated query

    for key in keys {
        let value = &query[key.as_str()];
        let (condition, sub_params) = parse_condition(key, value, mapper)?;
        conditions.push(condition);
        params.extend(sub_params);
    }

    Ok((conditions.join(" AND "), params))
}

fn parse_condition(
    field: &str,
    value: &Value,
    mapper: Option<FieldMapper>,
) -> Result<(String, Vec<Value>)> {
    match value {
        Value::Array(_) => {
            if let Some(list) = as_condition_list(value) {
                if is_logical_operator(field) {
                    // An empty operand list would compile to " (  ) "
                    if list.is_empty() {
                        return Err(Error::EmptyLogicalList(field.to_string()));
                    }
                    return parse_logical_operator(field, &list, mapper);
                }
                return Err(Error::ListForNonLogical {
                    field: field.to_string(),
                    value: value.clone(),
                });
            }
            if is_logical_operator(field) {
                return Err(Error::LogicalExpectsListOfMaps {
                    operator: field.to_string(),
                    value: value.clone(),
                });
            }
            Err(Error::ListOfMapsOnly {
                field: field.to_string(),
                value: value.clone(),
            })
        }
        Value::Object(map) => {
            if is_logical_operator(field) {
                return Err(Error::LogicalExpectsList {
                    operator: field.to_string(),
                    value: value.clone(),
                });
            }
            if sql_operator(field).is_some() {
                return Err(Error::OperatorAtTopLevel {
                    operator: field.to_string(),
                    value: value.clone(),
                });
            }
            parse_field_condition(field, map, mapper)
        }
        _ => {
            if is_logical_operator(field) {
                return Err(Error::LogicalExpectsListOfMaps {
                    operator: field.to_string(),
                    value: value.clone(),
                });
            }
            if sql_operator(field).is_some() {
                return Err(Error::OperatorAtTopLevel {
                    operator: field.to_string(),
                    value: value.clone(),
                });
            }
            // Simple equality condition
            let mapped = map_field(field, mapper)?;
            Ok((format!("{mapped} = ?"), vec![value.clone()]))
        }
    }
}

fn parse_logical_operator(
    operator: &str,
    query: &[&Document],
    mapper: Option<FieldMapper>,
) -> Result<(String, Vec<Value>)> {
    let mut conditions: Vec<String> = Vec::new();
    let mut params: Vec<Value> = Vec::new();

    for cond in query {
        let (condition, sub_params) = parse_query(cond, mapper)?;
        conditions.push(condition);
        params.extend(sub_params);
    }

    let joined = conditions.join(joiner_for(operator));
    Ok((format!(" ( {joined} ) "), params))
}

fn parse_field_condition(
    field: &str,
    query: &Document,
    mapper: Option<FieldMapper>,
) -> Result<(String, Vec<Value>)> {
    let mut keys: Vec<&String> = query.keys().collect();
    keys.sort(); // Sort the keys, mainly for easily testing the generated query

    let mut conditions: Vec<String> = Vec::new();
    let mut params: Vec<Value> = Vec::new();

    for key in keys {
        let value = &query[key.as_str()];
        match value {
            Value::Array(_) => {
                if let Some(list) = as_condition_list(value) {
                    if is_logical_operator(key) {
                        if list.is_empty() {
                            return Err(Error::FieldEmptyLogicalList {
                                field: field.to_string(),
                                operator: key.to_string(),
                            });
                        }
                        let (condition, sub_params) =
                            parse_field_logical_operator(field, key, &list, mapper)?;
                        conditions.push(condition);
                        params.extend(sub_params);
                    } else {
                        return Err(Error::FieldListForNonLogical {
                            field: field.to_string(),
                            key: key.to_string(),
                            value: value.clone(),
                        });
                    }
                } else {
                    return Err(Error::FieldListOfMapsOnly {
                        field: field.to_string(),
                        key: key.to_string(),
                        value: value.clone(),
                    });
                }
            }
            Value::Object(_) => {
                return Err(Error::FieldMapNotSupported {
                    field: field.to_string(),
                    key: key.to_string(),
                    value: value.clone(),
                });
            }
            _ => {
                let Some(op) = sql_operator(key) else {
                    return Err(Error::FieldOperatorsOnly {
                        field: field.to_string(),
                        key: key.to_string(),
                        value: value.clone(),
                    });
                };

                let mapped = map_field(field, mapper)?;
                conditions.push(format!("{mapped} {op} ?"));
                params.push(value.clone());
            }
        }
    }

    Ok((conditions.join(" AND "), params))
}

fn parse_field_logical_operator(
    field: &str,
    operator: &str,
    query: &[&Document],
    mapper: Option<FieldMapper>,
) -> Result<(String, Vec<Value>)> {
    let mut conditions: Vec<String> = Vec::new();
    let mut params: Vec<Value> = Vec::new();

    let mapped = map_field(field, mapper)?;
    for cond in query {
        if cond.len() != 1 {
            return Err(Error::FieldLogicalSingleKey {
                field: field.to_string(),
                operator: operator.to_string(),
                value: Value::Object((*cond).clone()),
            });
        }

        for (key, value) in cond.iter() {
            let Some(op) = sql_operator(key) else {
                return Err(Error::FieldLogicalOperatorsOnly {
                    field: field.to_string(),
                    key: key.to_string(),
                    value: value.clone(),
                });
            };
            conditions.push(format!("{mapped} {op} ?"));
            params.push(value.clone());
        }
    }

    let joined = conditions.join(joiner_for(operator));
    Ok((format!(" ( {joined} ) "), params))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::sqlite_field_mapper;
    use serde_json::json;

    fn doc(value: Value) -> Document {
        value.as_object().cloned().unwrap_or_default()
    }

    fn check(query: Value, expected_conditions: &str, expected_params: Vec<Value>) {
        let (conditions, params) = parse_query(&doc(query), None).unwrap();
        assert_eq!(conditions, expected_conditions);
        assert_eq!(params, expected_params);
    }

    fn check_error(query: Value, expected: &str) {
        let err = parse_query(&doc(query), None).unwrap_err();
        let msg = err.to_string();
        assert!(
            msg.contains(expected),
            "expected error containing {expected:?}, got {msg:?}"
        );
    }

    #[test]
    fn equality_queries() {
        check(json!({}), "", vec![]);
        check(json!({"age": 30}), "age = ?", vec![json!(30)]);
        check(
            json!({"age": 30, "city": "New York"}),
            "age = ? AND city = ?",
            vec![json!(30), json!("New York")],
        );
        check(
            json!({"age": 30, "city": "New York", "state": "California"}),
            "age = ? AND city = ? AND state = ?",
            vec![json!(30), json!("New York"), json!("California")],
        );
        check(
            json!({"age": 30, "city": "New York", "state": "California", "country": "USA"}),
            "age = ? AND city = ? AND country = ? AND state = ?",
            vec![json!(30), json!("New York"), json!("USA"), json!("California")],
        );
    }

    #[test]
    fn logical_queries() {
        check(
            json!({"age": 30, "$or": [{"city": "New York"}, {"state": "California"}]}),
            " ( city = ? OR state = ? )  AND age = ?",
            vec![json!("New York"), json!("California"), json!(30)],
        );
        check(
            json!({"age": 30, "$or": [{"city": "New York"}]}),
            " ( city = ? )  AND age = ?",
            vec![json!("New York"), json!(30)],
        );
        check(
            json!({"age": 30, "$or": [{"city": "New York"}, {"state": "California"}, {"country": "USA"}]}),
            " ( city = ? OR state = ? OR country = ? )  AND age = ?",
            vec![json!("New York"), json!("California"), json!("USA"), json!(30)],
        );
        check(
            json!({"age": 30, "$and": [{"city": "New York"}, {"state": "California"}], "country": "USA"}),
            " ( city = ? AND state = ? )  AND age = ? AND country = ?",
            vec![json!("New York"), json!("California"), json!(30), json!("USA")],
        );
        // Nested logical groups; joiners are uppercase regardless of key case
        check(
            json!({"age": 30, "$AND": [
                {"city": "New York"},
                {"$OR": [{"state": "California"}, {"country": "USA"}]},
                {"city": "New York"}
            ]}),
            " ( city = ? AND  ( state = ? OR country = ? )  AND city = ? )  AND age = ?",
            vec![
                json!("New York"),
                json!("California"),
                json!("USA"),
                json!("New York"),
                json!(30),
            ],
        );
    }

    #[test]
    fn operator_queries() {
        check(json!({"age": {"$gt": 30}}), "age > ?", vec![json!(30)]);
        check(json!({"age": {"$lt": 30}}), "age < ?", vec![json!(30)]);
        check(json!({"age": {"$gte": 30}}), "age >= ?", vec![json!(30)]);
        check(json!({"age": {"$lte": 30}}), "age <= ?", vec![json!(30)]);
        check(json!({"age": {"$ne": 30}}), "age != ?", vec![json!(30)]);
        check(json!({"age": {"$eq": 30}}), "age = ?", vec![json!(30)]);
        check(
            json!({"name": {"$like": "Al%"}}),
            "name like ?",
            vec![json!("Al%")],
        );
    }

    #[test]
    fn multi_operator_queries() {
        check(
            json!({"age": {"$gt": 30, "$lt": 40}}),
            "age > ? AND age < ?",
            vec![json!(30), json!(40)],
        );
        check(
            json!({"age": {"$gt": 30, "$lt": 40, "$ne": 35}}),
            "age > ? AND age < ? AND age != ?",
            vec![json!(30), json!(40), json!(35)],
        );
        check(
            json!({"city": "New York", "age": {"$gt": 30, "$lt": 40, "$ne": 35}}),
            "age > ? AND age < ? AND age != ? AND city = ?",
            vec![json!(30), json!(40), json!(35), json!("New York")],
        );
        check(
            json!({"age": {"$gt": 30, "$lt": 40, "$and": [{"$ne": 34}, {"$ne": 35}]}}),
            " ( age != ? AND age != ? )  AND age > ? AND age < ?",
            vec![json!(34), json!(35), json!(30), json!(40)],
        );
    }

    #[test]
    fn error_queries() {
        check_error(
            json!({"age": {"$AA": 30, "$lt": 40}}),
            "invalid query condition for age $AA, only operators supported",
        );
        check_error(
            json!({"age": [{"$AA": 30, "$lt": 40}]}),
            "invalid condition for age, list supported for logical operators only, got",
        );
        check_error(
            json!({"$or": {"$gt": 30, "$lt": 40}}),
            "invalid condition for $or, expected list, got",
        );
        check_error(
            json!({"$or": [40]}),
            "invalid condition for $or, expected list of maps, go",
        );
        check_error(
            json!({"$eq": [40]}),
            "operator $eq supported for field conditions only",
        );
        check_error(
            json!({"age": {"abc": 30, "$lt": 40}}),
            "invalid query condition for age abc, only operators supported: 30",
        );
        check_error(
            json!({"age": {"$or": 30, "$lt": 40}}),
            "invalid query condition for age $or, only operators supported: 30",
        );
        check_error(
            json!({"age": 30, "$or": [{"city": {"a": 1}}, {"state": "California"}]}),
            "invalid query condition for city a, only operators supported",
        );
        check_error(
            json!({"age": 30, "$or": [{"city": [{"a": 1}]}, {"state": "California"}]}),
            "invalid condition for city, list supported for logical operators only, got",
        );
        check_error(
            json!({"$eq": {"a": 1}}),
            "operator $eq supported for field conditions onl",
        );
        check_error(
            json!({"age": {"$gt": {"a": 1}}}),
            "invalid query condition for age $gt, map not supported",
        );
        check_error(
            json!({"age": {"$or": [{"$gt": 1, "$lt": 10}]}}),
            "invalid logical condition for age $or, only one key supported",
        );
        check_error(
            json!({"age": {"$or": [{"$AA": 1}]}}),
            "invalid logical condition for age $AA, only operators supported: 1",
        );
    }

    #[test]
    fn empty_logical_lists_rejected() {
        check_error(
            json!({"$or": []}),
            "invalid condition for $or, expected non-empty list of maps",
        );
        check_error(
            json!({"age": 30, "$and": []}),
            "invalid condition for $and, expected non-empty list of maps",
        );
        check_error(
            json!({"age": {"$or": []}}),
            "invalid logical condition for age $or, expected non-empty list",
        );
    }

    #[test]
    fn mapped_queries() {
        let (conditions, params) = parse_query(
            &doc(json!({"age": 30, "city": "New York"})),
            Some(sqlite_field_mapper),
        )
        .unwrap();
        assert_eq!(
            conditions,
            "_json ->> 'age' = ? AND _json ->> 'city' = ?"
        );
        assert_eq!(params, vec![json!(30), json!("New York")]);

        // Envelope columns are addressed directly
        let (conditions, _) =
            parse_query(&doc(json!({"_id": 5})), Some(sqlite_field_mapper)).unwrap();
        assert_eq!(conditions, "_id = ?");
    }

    #[test]
    fn mapped_field_logical_group() {
        let (conditions, params) = parse_query(
            &doc(json!({"age": {"$or": [{"$ne": 34}, {"$ne": 35}]}})),
            Some(sqlite_field_mapper),
        )
        .unwrap();
        assert_eq!(
            conditions,
            " ( _json ->> 'age' != ? OR _json ->> 'age' != ? ) "
        );
        assert_eq!(params, vec![json!(34), json!(35)]);
    }

    #[test]
    fn mapper_errors_propagate() {
        let err = parse_query(&doc(json!({"_json": 1})), Some(sqlite_field_mapper)).unwrap_err();
        assert_eq!(err.to_string(), "querying _json directly is not supported");

        let err = parse_query(
            &doc(json!({"a'b": {"$gt": 1}})),
            Some(sqlite_field_mapper),
        )
        .unwrap_err();
        assert!(matches!(err, Error::FieldApostrophe(_)));
    }
}
