//! Evaluation of MongoDB-style filters, sorts and projections over JSON documents
//!
//! Supported: field equality (dotted paths, array membership), `$eq`, `$ne`,
//! `$gt`, `$gte`, `$lt`, `$lte`, `$in`, `$nin`, `$exists`, `$and`, `$or`.

use super::{Document, DriverError, ID_FIELD};
use serde_json::{Number, Value};
use std::cmp::Ordering;

/// Value at a dotted path
pub fn get_path<'a>(document: &'a Document, path: &str) -> Option<&'a Value> {
    let mut parts = path.split('.');
    let mut current = document.get(parts.next()?)?;
    for part in parts {
        current = match current {
            Value::Object(map) => map.get(part)?,
            Value::Array(items) => items.get(part.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

/// Set a value at a dotted path, creating intermediate objects
pub fn set_path(document: &mut Document, path: &str, value: Value) {
    match path.split_once('.') {
        None => {
            document.insert(path.to_string(), value);
        }
        Some((head, rest)) => {
            let child = document
                .entry(head.to_string())
                .or_insert_with(|| Value::Object(Document::new()));
            if !child.is_object() {
                *child = Value::Object(Document::new());
            }
            if let Value::Object(map) = child {
                set_path(map, rest, value);
            }
        }
    }
}

/// Whether `document` satisfies `filter`
pub fn matches(document: &Document, filter: &Document) -> Result<bool, DriverError> {
    for (key, condition) in filter {
        let matched = match key.as_str() {
            "$and" => {
                let mut all = true;
                for clause in clauses(key, condition)? {
                    if !matches(document, clause)? {
                        all = false;
                        break;
                    }
                }
                all
            }
            "$or" => {
                let mut any = false;
                for clause in clauses(key, condition)? {
                    if matches(document, clause)? {
                        any = true;
                        break;
                    }
                }
                any
            }
            op if op.starts_with('$') => {
                return Err(DriverError::InvalidQuery(format!(
                    "unsupported top-level operator {}",
                    op
                )))
            }
            path => matches_condition(get_path(document, path), condition)?,
        };
        if !matched {
            return Ok(false);
        }
    }
    Ok(true)
}

fn clauses<'a>(key: &str, condition: &'a Value) -> Result<Vec<&'a Document>, DriverError> {
    condition
        .as_array()
        .ok_or_else(|| DriverError::InvalidQuery(format!("{} expects an array", key)))?
        .iter()
        .map(|clause| {
            clause
                .as_object()
                .ok_or_else(|| DriverError::InvalidQuery(format!("{} clauses must be objects", key)))
        })
        .collect()
}

fn is_operator_object(condition: &Value) -> bool {
    match condition {
        Value::Object(map) => !map.is_empty() && map.keys().all(|k| k.starts_with('$')),
        _ => false,
    }
}

fn matches_condition(field: Option<&Value>, condition: &Value) -> Result<bool, DriverError> {
    let Some(operators) = condition.as_object().filter(|_| is_operator_object(condition)) else {
        return Ok(equals(field, condition));
    };

    for (op, operand) in operators {
        let matched = match op.as_str() {
            "$eq" => equals(field, operand),
            "$ne" => !equals(field, operand),
            "$gt" => compare_field(field, operand, |o| o == Ordering::Greater),
            "$gte" => compare_field(field, operand, |o| o != Ordering::Less),
            "$lt" => compare_field(field, operand, |o| o == Ordering::Less),
            "$lte" => compare_field(field, operand, |o| o != Ordering::Greater),
            "$in" => in_list(field, op, operand)?,
            "$nin" => !in_list(field, op, operand)?,
            "$exists" => field.is_some() == operand.as_bool().unwrap_or(true),
            other => {
                return Err(DriverError::InvalidQuery(format!(
                    "unsupported operator {}",
                    other
                )))
            }
        };
        if !matched {
            return Ok(false);
        }
    }
    Ok(true)
}

fn in_list(field: Option<&Value>, op: &str, operand: &Value) -> Result<bool, DriverError> {
    let candidates = operand
        .as_array()
        .ok_or_else(|| DriverError::InvalidQuery(format!("{} expects an array", op)))?;
    Ok(candidates.iter().any(|c| equals(field, c)))
}

/// Equality with MongoDB semantics: a missing field equals `null`, and an
/// array field matches when any element equals the value.
fn equals(field: Option<&Value>, expected: &Value) -> bool {
    match field {
        None => expected.is_null(),
        Some(value) => {
            if values_equal(value, expected) {
                return true;
            }
            match value {
                Value::Array(items) => items.iter().any(|item| values_equal(item, expected)),
                _ => false,
            }
        }
    }
}

fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => compare_numbers(x, y) == Ordering::Equal,
        _ => a == b,
    }
}

fn as_integer(number: &Number) -> Option<i128> {
    number
        .as_i64()
        .map(i128::from)
        .or_else(|| number.as_u64().map(i128::from))
}

/// Integers compare exactly; floats only when either side is one
fn compare_numbers(x: &Number, y: &Number) -> Ordering {
    match (as_integer(x), as_integer(y)) {
        (Some(a), Some(b)) => a.cmp(&b),
        _ => x
            .as_f64()
            .unwrap_or(0.0)
            .partial_cmp(&y.as_f64().unwrap_or(0.0))
            .unwrap_or(Ordering::Equal),
    }
}

fn compare_field(field: Option<&Value>, operand: &Value, accept: impl Fn(Ordering) -> bool) -> bool {
    match field {
        // Range operators only compare values of the same kind
        Some(value) if type_rank(value) == type_rank(operand) => {
            accept(compare_values(value, operand))
        }
        _ => false,
    }
}

fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Number(_) => 1,
        Value::String(_) => 2,
        Value::Object(_) => 3,
        Value::Array(_) => 4,
        Value::Bool(_) => 5,
    }
}

/// Total order over JSON values following the BSON comparison order
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => compare_numbers(x, y),
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Array(x), Value::Array(y)) => {
            for (left, right) in x.iter().zip(y.iter()) {
                let ordering = compare_values(left, right);
                if ordering != Ordering::Equal {
                    return ordering;
                }
            }
            x.len().cmp(&y.len())
        }
        (Value::Object(x), Value::Object(y)) => x.len().cmp(&y.len()),
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}

/// Sort documents in place by a `{ field: 1 | -1 }` document
pub fn sort_documents(documents: &mut [Document], sort: &Document) -> Result<(), DriverError> {
    let mut keys = Vec::with_capacity(sort.len());
    for (field, direction) in sort {
        let descending = match direction.as_i64() {
            Some(1) => false,
            Some(-1) => true,
            _ => {
                return Err(DriverError::InvalidQuery(format!(
                    "sort direction for {} must be 1 or -1",
                    field
                )))
            }
        };
        keys.push((field.as_str(), descending));
    }

    documents.sort_by(|a, b| {
        for (field, descending) in &keys {
            let left = get_path(a, field).unwrap_or(&Value::Null);
            let right = get_path(b, field).unwrap_or(&Value::Null);
            let ordering = compare_values(left, right);
            if ordering != Ordering::Equal {
                return if *descending { ordering.reverse() } else { ordering };
            }
        }
        Ordering::Equal
    });
    Ok(())
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().unwrap_or(0.0) != 0.0,
        _ => true,
    }
}

/// Apply an inclusive (`{ a: 1 }`) or exclusive (`{ a: 0 }`) projection to
/// top-level fields. `_id` is kept unless explicitly excluded.
pub fn project(document: Document, projection: &Document) -> Result<Document, DriverError> {
    if projection.is_empty() {
        return Ok(document);
    }

    let inclusive = projection
        .iter()
        .any(|(field, value)| field != ID_FIELD && is_truthy(value));
    let exclusive = projection
        .iter()
        .any(|(field, value)| field != ID_FIELD && !is_truthy(value));
    if inclusive && exclusive {
        return Err(DriverError::InvalidQuery(
            "projection cannot mix inclusion and exclusion".to_string(),
        ));
    }

    let keep_id = projection.get(ID_FIELD).map_or(true, is_truthy);

    let projected = document
        .into_iter()
        .filter(|(field, _)| {
            if field == ID_FIELD {
                keep_id
            } else if inclusive {
                projection.get(field).is_some_and(is_truthy)
            } else {
                !projection.contains_key(field)
            }
        })
        .collect();
    Ok(projected)
}
