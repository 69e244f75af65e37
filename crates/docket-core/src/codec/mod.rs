//! Module: codec
//! Responsibility: stored document ↔ entity record conversion.
//! Does not own: key escaping rules (see `key`).


use crate::{
    key::{self, KeyError, MetaField},
    value::{Document, Value},
};
use thiserror::Error as ThisError;

/// Maximum nesting depth accepted when converting documents.
///
/// Value trees cannot be cyclic, so this bound is what keeps an adversarial
/// entity from recursing without limit.
pub const MAX_DOCUMENT_DEPTH: usize = 100;

///
/// CodecError
///

#[derive(Clone, Debug, ThisError, PartialEq)]
pub enum CodecError {
    #[error(transparent)]
    Key(#[from] KeyError),

    #[error("entity is not representable at '{path}': {reason}")]
    UnrepresentableEntity { path: String, reason: String },

    #[error("stored document maps two keys onto '{key}' at '{path}'")]
    DuplicateKey { path: String, key: String },
}

// Direction of a walk; selects which key translation applies.
#[derive(Clone, Copy)]
enum Walk {
    ToEntity,
    ToStorage,
}

/// Convert a stored document into its entity record.
pub fn to_entity(stored: &Document) -> Result<Document, CodecError> {
    convert_map(stored, Walk::ToEntity, 0, &mut Vec::new())
}

/// Convert an entity record into its stored document.
pub fn to_storage(entity: &Document) -> Result<Document, CodecError> {
    convert_map(entity, Walk::ToStorage, 0, &mut Vec::new())
}

/// Read a meta field from a stored document.
#[must_use]
pub fn meta_value(stored: &Document, field: MetaField) -> Option<&Value> {
    stored.get(field.storage_name())
}

/// Current version tag of a stored document, when it carries one.
#[must_use]
pub fn stored_version(stored: &Document) -> Option<&str> {
    meta_value(stored, MetaField::ETag).and_then(Value::as_text)
}

fn convert_map(
    map: &Document,
    walk: Walk,
    depth: usize,
    trail: &mut Vec<String>,
) -> Result<Document, CodecError> {
    guard_depth(depth, trail)?;

    let mut out = Document::new();
    for (key, value) in map {
        let translated = match walk {
            Walk::ToEntity => match key::to_logical(key, depth)? {
                Some(logical) => logical,
                None => continue,
            },
            Walk::ToStorage => key::entity_key_to_storage(key, depth),
        };

        trail.push(key.clone());
        let converted = convert_value(value, walk, depth + 1, trail)?;
        trail.pop();

        if out.insert(translated.clone(), converted).is_some() {
            return Err(CodecError::DuplicateKey {
                path: render_trail(trail),
                key: translated,
            });
        }
    }

    Ok(out)
}

fn convert_value(
    value: &Value,
    walk: Walk,
    depth: usize,
    trail: &mut Vec<String>,
) -> Result<Value, CodecError> {
    match value {
        Value::Map(map) => convert_map(map, walk, depth, trail).map(Value::Map),
        Value::Array(items) => {
            guard_depth(depth, trail)?;
            let mut out = Vec::with_capacity(items.len());
            for (idx, item) in items.iter().enumerate() {
                trail.push(idx.to_string());
                out.push(convert_value(item, walk, depth + 1, trail)?);
                trail.pop();
            }
            Ok(Value::Array(out))
        }
        Value::Float(f) if !f.is_finite() && matches!(walk, Walk::ToStorage) => {
            Err(CodecError::UnrepresentableEntity {
                path: render_trail(trail),
                reason: format!("non-finite number {f}"),
            })
        }
        other => Ok(other.clone()),
    }
}

fn guard_depth(depth: usize, trail: &[String]) -> Result<(), CodecError> {
    if depth > MAX_DOCUMENT_DEPTH {
        return Err(CodecError::UnrepresentableEntity {
            path: render_trail(trail),
            reason: format!("nesting exceeds {MAX_DOCUMENT_DEPTH} levels"),
        });
    }

    Ok(())
}

fn render_trail(trail: &[String]) -> String {
    if trail.is_empty() {
        ".".to_string()
    } else {
        trail.join(".")
    }
}
