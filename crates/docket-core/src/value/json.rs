use crate::{
    types::encode_hex,
    value::{Document, Value},
};
use serde_json::{Map as JsonMap, Number, Value as JsonValue};
use thiserror::Error as ThisError;

///
/// JsonNumberError
///
/// A JSON number with no exact `Int` or `Float` form, such as an integer
/// above `i64::MAX`.
///

#[derive(Clone, Debug, Eq, ThisError, PartialEq)]
#[error("number {number} at '{path}' has no exact representation")]
pub struct JsonNumberError {
    pub path: String,
    pub number: String,
}

impl TryFrom<JsonValue> for Value {
    type Error = JsonNumberError;

    fn try_from(json: JsonValue) -> Result<Self, Self::Error> {
        from_json_at(json, &mut Vec::new())
    }
}

/// Build a document from a JSON object.
pub fn document_from_json(map: JsonMap<String, JsonValue>) -> Result<Document, JsonNumberError> {
    map_from_json_at(map, &mut Vec::new())
}

fn from_json_at(json: JsonValue, trail: &mut Vec<String>) -> Result<Value, JsonNumberError> {
    let value = match json {
        JsonValue::Null => Value::Null,
        JsonValue::Bool(b) => Value::Bool(b),
        JsonValue::Number(n) => number_from_json(&n, trail)?,
        JsonValue::String(s) => Value::Text(s),
        JsonValue::Array(items) => {
            let mut out = Vec::with_capacity(items.len());
            for (index, item) in items.into_iter().enumerate() {
                trail.push(index.to_string());
                out.push(from_json_at(item, trail)?);
                trail.pop();
            }
            Value::Array(out)
        }
        JsonValue::Object(map) => Value::Map(map_from_json_at(map, trail)?),
    };

    Ok(value)
}

fn map_from_json_at(
    map: JsonMap<String, JsonValue>,
    trail: &mut Vec<String>,
) -> Result<Document, JsonNumberError> {
    let mut out = Document::new();
    for (key, value) in map {
        trail.push(key);
        let value = from_json_at(value, trail)?;
        if let Some(key) = trail.pop() {
            out.insert(key, value);
        }
    }

    Ok(out)
}

// Integers that only fit `u64` would round through `f64`.
fn number_from_json(n: &Number, trail: &[String]) -> Result<Value, JsonNumberError> {
    if let Some(i) = n.as_i64() {
        return Ok(Value::Int(i));
    }

    match n.as_f64() {
        Some(f) if !n.is_u64() => Ok(Value::Float(f)),
        _ => Err(JsonNumberError {
            path: trail
                .iter()
                .map(|segment| format!("/{}", segment.replace('~', "~0").replace('/', "~1")))
                .collect(),
            number: n.to_string(),
        }),
    }
}

impl Value {
    /// Render as plain JSON for a response body.
    ///
    /// Store-native leaves flatten to text: timestamps as RFC 3339, object ids
    /// and binary as lowercase hex. Non-finite floats become `null`.
    #[must_use]
    pub fn into_json(self) -> JsonValue {
        match self {
            Self::Null => JsonValue::Null,
            Self::Bool(b) => JsonValue::Bool(b),
            Self::Int(i) => JsonValue::Number(i.into()),
            Self::Float(f) => Number::from_f64(f).map_or(JsonValue::Null, JsonValue::Number),
            Self::Text(s) => JsonValue::String(s),
            Self::Timestamp(ts) => JsonValue::String(ts.to_string()),
            Self::Binary(bytes) => JsonValue::String(encode_hex(&bytes)),
            Self::ObjectId(id) => JsonValue::String(id.to_hex()),
            Self::Array(items) => JsonValue::Array(items.into_iter().map(Self::into_json).collect()),
            Self::Map(map) => JsonValue::Object(document_to_json(map)),
        }
    }
}

/// Render a document as a JSON object.
#[must_use]
pub fn document_to_json(doc: Document) -> JsonMap<String, JsonValue> {
    doc.into_iter().map(|(k, v)| (k, v.into_json())).collect()
}
