//! Module: patch
//! Responsibility: JSON Patch operation model, pointer parsing, and the
//! delta a patch touches.
//! Does not own: applying operations (see `PatchApplier`).


use crate::value::{Document, JsonNumberError, Value, set_path};
use serde::Deserialize;
use serde_json::Value as JsonValue;
use thiserror::Error as ThisError;

///
/// PatchError
///

#[derive(Clone, Debug, Eq, ThisError, PartialEq)]
pub enum PatchError {
    #[error("malformed patch document: {reason}")]
    Malformed { reason: String },

    #[error("malformed JSON pointer '{pointer}'")]
    InvalidPointer { pointer: String },

    #[error("patch could not be applied: {reason}")]
    Apply { reason: String },

    #[error(transparent)]
    Unrepresentable(#[from] JsonNumberError),
}

///
/// PatchOp
///

#[derive(Clone, Debug, PartialEq)]
pub enum PatchOp {
    Add { path: String, value: Value },
    Remove { path: String },
    Replace { path: String, value: Value },
    Move { from: String, path: String },
    Copy { from: String, path: String },
    Test { path: String, value: Value },
}

impl PatchOp {
    /// Target pointer of the operation.
    #[must_use]
    pub fn path(&self) -> &str {
        match self {
            Self::Add { path, .. }
            | Self::Remove { path }
            | Self::Replace { path, .. }
            | Self::Move { path, .. }
            | Self::Copy { path, .. }
            | Self::Test { path, .. } => path,
        }
    }
}

// Wire shape; values are converted once into the tagged tree.
#[derive(Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
enum RawPatchOp {
    Add { path: String, value: JsonValue },
    Remove { path: String },
    Replace { path: String, value: JsonValue },
    Move { from: String, path: String },
    Copy { from: String, path: String },
    Test { path: String, value: JsonValue },
}

impl RawPatchOp {
    fn into_op(self) -> Result<PatchOp, JsonNumberError> {
        let op = match self {
            Self::Add { path, value } => PatchOp::Add {
                path,
                value: Value::try_from(value)?,
            },
            Self::Remove { path } => PatchOp::Remove { path },
            Self::Replace { path, value } => PatchOp::Replace {
                path,
                value: Value::try_from(value)?,
            },
            Self::Move { from, path } => PatchOp::Move { from, path },
            Self::Copy { from, path } => PatchOp::Copy { from, path },
            Self::Test { path, value } => PatchOp::Test {
                path,
                value: Value::try_from(value)?,
            },
        };

        Ok(op)
    }
}

/// Parse a JSON Patch document (an array of operations).
///
/// Operation values must convert exactly; an integer beyond `i64` is an
/// error rather than a rounded float.
pub fn parse_patch(body: JsonValue) -> Result<Vec<PatchOp>, PatchError> {
    let raw: Vec<RawPatchOp> =
        serde_json::from_value(body).map_err(|err| PatchError::Malformed {
            reason: err.to_string(),
        })?;

    raw.into_iter()
        .enumerate()
        .map(|(index, op)| {
            op.into_op().map_err(|err| {
                PatchError::Unrepresentable(JsonNumberError {
                    path: format!("/{index}/value{}", err.path),
                    number: err.number,
                })
            })
        })
        .collect()
}

///
/// PatchApplier
///
/// Applies operations to a document in place. Closures of the same shape
/// implement it.
///

pub trait PatchApplier {
    fn apply(&self, target: &mut Document, ops: &[PatchOp]) -> Result<(), PatchError>;
}

impl<F> PatchApplier for F
where
    F: Fn(&mut Document, &[PatchOp]) -> Result<(), PatchError>,
{
    fn apply(&self, target: &mut Document, ops: &[PatchOp]) -> Result<(), PatchError> {
        self(target, ops)
    }
}

/// Split a JSON pointer into unescaped reference tokens.
pub fn parse_pointer(pointer: &str) -> Result<Vec<String>, PatchError> {
    if pointer.is_empty() {
        return Ok(Vec::new());
    }

    let invalid = || PatchError::InvalidPointer {
        pointer: pointer.to_string(),
    };
    let rest = pointer.strip_prefix('/').ok_or_else(invalid)?;

    rest.split('/')
        .map(|token| unescape_token(token).ok_or_else(invalid))
        .collect()
}

fn unescape_token(token: &str) -> Option<String> {
    let mut out = String::with_capacity(token.len());
    let mut chars = token.chars();
    while let Some(c) = chars.next() {
        if c == '~' {
            match chars.next()? {
                '0' => out.push('~'),
                '1' => out.push('/'),
                _ => return None,
            }
        } else {
            out.push(c);
        }
    }

    Some(out)
}

/// The portion of `patched` touched by `ops`.
///
/// Each touched path is copied from the patched document, truncated at the
/// first value that is not a map. `move` touches both its source and its
/// target; `test` touches nothing. Removed paths appear as `null`.
pub fn patch_delta(patched: &Document, ops: &[PatchOp]) -> Result<Document, PatchError> {
    let mut delta = Document::new();

    for op in ops {
        match op {
            PatchOp::Add { path, .. }
            | PatchOp::Remove { path }
            | PatchOp::Replace { path, .. }
            | PatchOp::Copy { path, .. } => copy_change(path, patched, &mut delta)?,
            PatchOp::Move { from, path } => {
                copy_change(from, patched, &mut delta)?;
                copy_change(path, patched, &mut delta)?;
            }
            PatchOp::Test { .. } => {}
        }
    }

    Ok(delta)
}

fn copy_change(pointer: &str, patched: &Document, delta: &mut Document) -> Result<(), PatchError> {
    let tokens = parse_pointer(pointer)?;
    if tokens.is_empty() {
        delta.extend(patched.clone());
        return Ok(());
    }

    let mut map = patched;
    let mut so_far = Vec::with_capacity(tokens.len());
    let mut found = None;
    for token in tokens {
        let next = map.get(&token);
        so_far.push(token);
        found = next;
        match next {
            Some(Value::Map(child)) => map = child,
            _ => break,
        }
    }

    set_path(delta, &so_far, found.cloned().unwrap_or(Value::Null));

    Ok(())
}

/// Replay the difference between `before` and `after` onto `target`.
///
/// Keys removed in `after` are removed from `target`; changed values are
/// overwritten, descending only where both sides hold maps. Keys of `target`
/// that `before` never showed are left alone.
pub fn reapply_changes(before: &Document, after: &Document, target: &mut Document) {
    for key in before.keys() {
        if !after.contains_key(key) {
            target.remove(key);
        }
    }

    for (key, new_value) in after {
        match (before.get(key), new_value) {
            (Some(old), _) if old == new_value => {}
            (Some(Value::Map(old_map)), Value::Map(new_map)) => {
                let slot = target
                    .entry(key.clone())
                    .or_insert_with(|| Value::Map(Document::new()));
                if let Value::Map(target_map) = slot {
                    reapply_changes(old_map, new_map, target_map);
                } else {
                    *slot = new_value.clone();
                }
            }
            _ => {
                target.insert(key.clone(), new_value.clone());
            }
        }
    }
}
