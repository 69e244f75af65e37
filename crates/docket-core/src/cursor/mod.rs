//! Module: cursor
//! Responsibility: keyset continuation cursors.
//! Does not own: token text encoding (see `token`).
//! Boundary: a cursor holds one value per compiled key field, in key order.

mod token;

#[cfg(test)]
mod tests;

pub use token::{CursorDecodeError, decode_token, encode_token};

use crate::{
    ordering::IndexKey,
    predicate::{CompareOp, Predicate},
    types::{ObjectId, Timestamp},
    value::{Document, Value, ValueKind, lookup_path},
};
use serde_json::{Map as JsonMap, Value as JsonValue};
use thiserror::Error as ThisError;

// Tags for store-native cursor values.
const DATE_TAG: &str = "date";
const OID_TAG: &str = "oid";

///
/// CursorError
///

#[derive(Clone, Debug, ThisError, PartialEq)]
pub enum CursorError {
    #[error(transparent)]
    Token(#[from] CursorDecodeError),

    #[error("cursor payload is malformed: {reason}")]
    Payload { reason: String },

    #[error("cursor carries {found} values, ordering expects {expected}")]
    ArityMismatch { expected: usize, found: usize },

    #[error("cursor value at position {position} is not a permitted kind")]
    UnsupportedElement { position: usize },

    #[error("value of kind {kind} at '{path}' cannot appear in a cursor")]
    UnsupportedKeyValue { path: String, kind: ValueKind },
}

/// Encode the cursor for `last_row` (a stored document) under `key`.
pub fn encode_cursor(last_row: &Document, key: &IndexKey) -> Result<String, CursorError> {
    let mut values = Vec::with_capacity(key.len());
    for field in key.fields() {
        let value = lookup_path(last_row, field.path.as_slice()).unwrap_or(&Value::Null);
        values.push(
            cursor_json(value).ok_or_else(|| CursorError::UnsupportedKeyValue {
                path: field.path.to_string(),
                kind: value.kind(),
            })?,
        );
    }

    let payload = serde_json::to_vec(&JsonValue::Array(values)).map_err(|err| {
        CursorError::Payload {
            reason: err.to_string(),
        }
    })?;

    Ok(encode_token(&payload))
}

/// Decode a cursor into its boundary values, validating arity and kinds.
pub fn decode_cursor_values(token: &str, key: &IndexKey) -> Result<Vec<Value>, CursorError> {
    let bytes = decode_token(token)?;
    let json: JsonValue =
        serde_json::from_slice(&bytes).map_err(|err| CursorError::Payload {
            reason: err.to_string(),
        })?;

    let JsonValue::Array(items) = json else {
        return Err(CursorError::Payload {
            reason: "expected an array".to_string(),
        });
    };

    if items.len() != key.len() {
        return Err(CursorError::ArityMismatch {
            expected: key.len(),
            found: items.len(),
        });
    }

    items
        .into_iter()
        .enumerate()
        .map(|(position, item)| {
            cursor_value(item).ok_or(CursorError::UnsupportedElement { position })
        })
        .collect()
}

/// Decode a cursor into the continuation predicate for `key`.
pub fn decode_cursor(token: &str, key: &IndexKey) -> Result<Predicate, CursorError> {
    let values = decode_cursor_values(token, key)?;

    continuation_predicate(key, &values).ok_or(CursorError::ArityMismatch {
        expected: key.len(),
        found: values.len(),
    })
}

/// Lexicographic "strictly after" predicate for boundary `values`.
///
/// Built right to left:
/// `(k1 ≻ v1) OR (k1 = v1 AND ((k2 ≻ v2) OR (k2 = v2 AND (... kn ≻ vn))))`.
#[must_use]
pub fn continuation_predicate(key: &IndexKey, values: &[Value]) -> Option<Predicate> {
    if values.len() != key.len() {
        return None;
    }

    let mut pairs = key.fields().iter().zip(values).rev();
    let (last_field, last_value) = pairs.next()?;
    let mut predicate = Predicate::compare(
        last_field.path.clone(),
        last_field.direction.continuation_op(),
        last_value.clone(),
    );

    for (field, value) in pairs {
        predicate = Predicate::Or(vec![
            Predicate::compare(
                field.path.clone(),
                field.direction.continuation_op(),
                value.clone(),
            ),
            Predicate::And(vec![
                Predicate::compare(field.path.clone(), CompareOp::Eq, value.clone()),
                predicate,
            ]),
        ]);
    }

    Some(predicate)
}

fn cursor_json(value: &Value) -> Option<JsonValue> {
    let json = match value {
        Value::Null => JsonValue::Null,
        Value::Bool(b) => JsonValue::Bool(*b),
        Value::Int(i) => JsonValue::from(*i),
        Value::Float(f) => JsonValue::Number(serde_json::Number::from_f64(*f)?),
        Value::Text(s) => JsonValue::String(s.clone()),
        Value::Timestamp(ts) => tagged(DATE_TAG, JsonValue::from(ts.as_millis())),
        Value::ObjectId(id) => tagged(OID_TAG, JsonValue::String(id.to_hex())),
        Value::Binary(_) | Value::Array(_) | Value::Map(_) => return None,
    };

    Some(json)
}

fn tagged(tag: &str, inner: JsonValue) -> JsonValue {
    let mut map = JsonMap::new();
    map.insert(tag.to_string(), inner);
    JsonValue::Object(map)
}

fn cursor_value(json: JsonValue) -> Option<Value> {
    match json {
        JsonValue::Null => Some(Value::Null),
        JsonValue::Bool(b) => Some(Value::Bool(b)),
        JsonValue::Number(n) => n
            .as_i64()
            .map(Value::Int)
            .or_else(|| n.as_f64().map(Value::Float)),
        JsonValue::String(s) => Some(Value::Text(s)),
        JsonValue::Object(map) if map.len() == 1 => {
            let (tag, inner) = map.into_iter().next()?;
            match (tag.as_str(), inner) {
                (DATE_TAG, JsonValue::Number(ms)) => {
                    ms.as_i64().map(|ms| Value::Timestamp(Timestamp::from_millis(ms)))
                }
                (OID_TAG, JsonValue::String(hex)) => {
                    ObjectId::parse_hex(&hex).ok().map(Value::ObjectId)
                }
                _ => None,
            }
        }
        JsonValue::Array(_) | JsonValue::Object(_) => None,
    }
}
